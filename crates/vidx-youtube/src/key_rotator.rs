//! Round-robin API key rotation.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

/// A YouTube Data API key. Redacted in `Debug` and `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building requests only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("***{}", tail)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.redacted()).finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

/// Fixed, ordered pool of API keys handed out cyclically.
///
/// Rotation is blind: the rotator does not know which keys are exhausted.
/// An empty pool yields `None` on every call.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<ApiKey>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    /// Build a pool, dropping blank entries and trimming whitespace.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<ApiKey> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(ApiKey)
            .collect();

        if keys.is_empty() {
            warn!("No YouTube API keys configured; fetching will be skipped");
        }

        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build from a comma-separated list, as found in `YOUTUBE_API_KEYS`.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    /// Hand out the next key in the cycle.
    pub fn next(&self) -> Option<ApiKey> {
        let len = self.keys.len();
        if len == 0 {
            return None;
        }

        // fetch_update never fails here because the closure always returns Some
        let index = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % len))
            .unwrap_or(0);

        debug!(key_index = index, pool_size = len, "Using YouTube API key");
        self.keys.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_key_once_per_round_in_order() {
        let rotator = KeyRotator::new(["k1", "k2", "k3"]);

        let round: Vec<String> = (0..3)
            .map(|_| rotator.next().unwrap().expose().to_string())
            .collect();
        assert_eq!(round, vec!["k1", "k2", "k3"]);

        let next_round: Vec<String> = (0..3)
            .map(|_| rotator.next().unwrap().expose().to_string())
            .collect();
        assert_eq!(next_round, round);
    }

    #[test]
    fn test_single_key_repeats() {
        let rotator = KeyRotator::new(["only"]);
        for _ in 0..5 {
            assert_eq!(rotator.next().unwrap().expose(), "only");
        }
    }

    #[test]
    fn test_empty_pool_is_always_none() {
        let rotator = KeyRotator::from_csv("");
        assert!(rotator.is_empty());
        for _ in 0..3 {
            assert!(rotator.next().is_none());
        }
    }

    #[test]
    fn test_csv_trims_and_drops_blanks() {
        let rotator = KeyRotator::from_csv(" a , ,b,, ");
        assert_eq!(rotator.len(), 2);
        assert_eq!(rotator.next().unwrap().expose(), "a");
        assert_eq!(rotator.next().unwrap().expose(), "b");
    }

    #[test]
    fn test_key_is_redacted_in_logs() {
        let key = ApiKey::new("AIzaSyExampleSecret1234");
        assert_eq!(key.to_string(), "***1234");
        assert!(!format!("{:?}", key).contains("Example"));
    }

    #[test]
    fn test_concurrent_callers_stay_fair() {
        use std::collections::HashMap;
        use std::sync::Arc;

        let rotator = Arc::new(KeyRotator::new(["a", "b", "c", "d"]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rotator = Arc::clone(&rotator);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| rotator.next().unwrap().expose().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                *counts.entry(key).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 100));
    }
}
