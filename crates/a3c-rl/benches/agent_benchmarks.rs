//! Agent Benchmarks
//!
//! Hot paths of the actor-critic agent:
//! - Agent::choose_action() - called once per environment step by every worker
//! - Agent::train_network() - one forward/backward pass plus optimizer step
//!   (checkpoint write included, as in training)
//! - Parameters::loss_and_gradients() - the backward pass alone
//!
//! ## Performance Targets
//! - Action selection: < 10µs per decision
//! - Training step on a 200-step episode: < 1ms excluding checkpoint I/O

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use a3c_rl::network::{states_to_array, LossWeights};
use a3c_rl::{Agent, AgentConfig, Observation, Parameters};

fn random_states(rng: &mut StdRng, n: usize) -> Vec<Observation> {
    (0..n)
        .map(|_| {
            [
                rng.gen_range(-2.4..2.4),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-0.2..0.2),
                rng.gen_range(-1.0..1.0),
            ]
        })
        .collect()
}

fn bench_choose_action(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::new(AgentConfig::new(2).with_checkpoint_dir(dir.path()).with_seed(1)).unwrap();
    let state = [0.01, -0.02, 0.03, 0.04];

    c.bench_function("choose_action", |b| {
        b.iter(|| agent.choose_action(black_box(&state)).unwrap());
    });
}

fn bench_loss_and_gradients(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(5);
    let params = Parameters::glorot(2, &mut rng);
    let weights = LossWeights {
        value: 0.5,
        entropy: 0.01,
    };

    let mut group = c.benchmark_group("loss_and_gradients");
    for len in [10usize, 50, 200, 500] {
        let states = states_to_array(&random_states(&mut rng, len));
        let actions: Vec<usize> = (0..len).map(|i| i % 2).collect();
        let targets = Array1::from_elem(len, 1.0);

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| params.loss_and_gradients(black_box(&states), &actions, &targets, weights));
        });
    }
    group.finish();
}

fn bench_train_network(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let agent = Agent::new(AgentConfig::new(2).with_checkpoint_dir(dir.path()).with_seed(2)).unwrap();
    let mut rng = StdRng::seed_from_u64(9);
    let len = 200;
    let before = random_states(&mut rng, len);
    let after = random_states(&mut rng, len);
    let actions: Vec<usize> = (0..len).map(|i| i % 2).collect();
    let rewards = a3c_core::discount_rewards(&vec![1.0; len], 0.99);

    c.bench_function("train_network_200_steps", |b| {
        b.iter(|| {
            agent
                .store_transitions(before.clone(), actions.clone(), after.clone(), rewards.clone())
                .unwrap();
            agent.train_network().unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_choose_action,
    bench_loss_and_gradients,
    bench_train_network
);
criterion_main!(benches);
