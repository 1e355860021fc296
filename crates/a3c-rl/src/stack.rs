//! Thread-safe episode stack shared by producers and the trainer

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use a3c_core::{A3cError, Episode, Result};

/// Episodes waiting to be trained on.
///
/// `push` appends, `pop` removes the most recently pushed episode, so the
/// trainer always sees the freshest trajectory. The lock is held only for
/// the push or pop itself. With a capacity set, pushing onto a full stack
/// drops the oldest episode.
#[derive(Debug, Default)]
pub struct EpisodeStack {
    episodes: Mutex<VecDeque<Episode>>,
    capacity: Option<usize>,
    dropped: AtomicU64,
}

impl EpisodeStack {
    /// Create an unbounded stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack holding at most `capacity` episodes
    pub fn bounded(capacity: usize) -> Self {
        Self {
            episodes: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<Episode>>> {
        self.episodes
            .lock()
            .map_err(|_| A3cError::Internal("episode stack lock poisoned".to_string()))
    }

    /// Add an episode on top of the stack
    pub fn push(&self, episode: Episode) -> Result<()> {
        let mut episodes = self.lock()?;
        if let Some(capacity) = self.capacity {
            if episodes.len() >= capacity {
                episodes.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Episode stack full ({}), dropped oldest episode ({} total)", capacity, dropped);
            }
        }
        episodes.push_back(episode);
        Ok(())
    }

    /// Remove the most recently pushed episode
    pub fn pop(&self) -> Result<Option<Episode>> {
        Ok(self.lock()?.pop_back())
    }

    /// Number of queued episodes
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Episodes discarded by the overflow policy
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode_with_reward(reward: f64) -> Episode {
        Episode::new(
            vec![[0.0; 4]],
            vec![0],
            vec![[0.01, 0.0, 0.0, 0.0]],
            vec![reward],
        )
        .unwrap()
    }

    #[test]
    fn test_push_and_len() {
        let stack = EpisodeStack::new();
        assert_eq!(stack.len().unwrap(), 0);
        assert!(stack.is_empty().unwrap());

        stack.push(episode_with_reward(1.0)).unwrap();
        assert_eq!(stack.len().unwrap(), 1);
        assert!(!stack.is_empty().unwrap());
    }

    #[test]
    fn test_pop_most_recent_first() {
        let stack = EpisodeStack::new();
        for i in 0..3 {
            stack.push(episode_with_reward(i as f64)).unwrap();
        }

        assert_eq!(stack.pop().unwrap().unwrap().reward_sum(), 2.0);
        assert_eq!(stack.pop().unwrap().unwrap().reward_sum(), 1.0);
        assert_eq!(stack.pop().unwrap().unwrap().reward_sum(), 0.0);
        assert!(stack.pop().unwrap().is_none());
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let stack = EpisodeStack::bounded(2);
        for i in 0..4 {
            stack.push(episode_with_reward(i as f64)).unwrap();
        }

        assert_eq!(stack.len().unwrap(), 2);
        assert_eq!(stack.dropped(), 2);
        assert_eq!(stack.capacity(), Some(2));
        assert_eq!(stack.pop().unwrap().unwrap().reward_sum(), 3.0);
        assert_eq!(stack.pop().unwrap().unwrap().reward_sum(), 2.0);
        assert!(stack.pop().unwrap().is_none());
    }

    #[test]
    fn test_unbounded_never_drops() {
        let stack = EpisodeStack::new();
        for i in 0..100 {
            stack.push(episode_with_reward(i as f64)).unwrap();
        }
        assert_eq!(stack.len().unwrap(), 100);
        assert_eq!(stack.dropped(), 0);
        assert!(stack.capacity().is_none());
    }

    #[test]
    fn test_poisoned_lock_is_internal_error() {
        let stack = EpisodeStack::new();
        stack.push(episode_with_reward(1.0)).unwrap();

        std::thread::scope(|scope| {
            let result = scope
                .spawn(|| {
                    let _guard = stack.episodes.lock().unwrap();
                    panic!("panic while holding the stack lock");
                })
                .join();
            assert!(result.is_err());
        });

        assert!(matches!(stack.len(), Err(A3cError::Internal(_))));
        assert!(matches!(stack.is_empty(), Err(A3cError::Internal(_))));
        assert!(matches!(stack.pop(), Err(A3cError::Internal(_))));
    }
}
