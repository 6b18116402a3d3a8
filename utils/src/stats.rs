//! Named counters shared between threads.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A fixed set of named counters.
///
/// Names are declared up front; updates to an undeclared name are ignored.
pub struct StatsCounter {
    counters: BTreeMap<&'static str, AtomicU64>,
}

impl StatsCounter {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            counters: names.iter().map(|&n| (n, AtomicU64::new(0))).collect(),
        }
    }

    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Current values, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counters
            .iter()
            .map(|(&k, v)| (k, v.load(Ordering::Relaxed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_declared_names_only() {
        let stats = StatsCounter::new(&["sent", "failed"]);
        stats.increment("sent");
        stats.add("sent", 2);
        stats.increment("bogus");
        assert_eq!(stats.get("sent"), 3);
        assert_eq!(stats.get("failed"), 0);
        assert_eq!(stats.get("bogus"), 0);
        assert_eq!(
            stats.snapshot().into_iter().collect::<Vec<_>>(),
            vec![("failed", 0), ("sent", 3)]
        );
    }

    #[test]
    fn shared_between_threads() {
        let stats = std::sync::Arc::new(StatsCounter::new(&["n"]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.increment("n");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.get("n"), 400);
    }
}
