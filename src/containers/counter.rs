//! Collision-free key generation for unnamed tree entries

use std::collections::HashMap;

/// Generates keys of the form `{stem}{n}` with a running count per stem
///
/// The counter is owned by whoever inserts into the trees (a `Layout`), so
/// generated names only depend on that owner's insertion history.
#[derive(Debug, Clone, Default)]
pub struct KeyCounter {
    counts: HashMap<String, usize>,
}

impl KeyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next `{stem}{n}` for which `taken` is false
    pub fn next_key(&mut self, stem: &str, taken: impl Fn(&str) -> bool) -> String {
        let count = self.counts.entry(stem.to_string()).or_insert(0);
        loop {
            let key = format!("{}{}", stem, count);
            *count += 1;
            if !taken(&key) {
                return key;
            }
        }
    }

    /// Number of keys handed out for `stem` so far, including skipped ones
    pub fn count(&self, stem: &str) -> usize {
        self.counts.get(stem).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_keys() {
        let mut counter = KeyCounter::new();
        assert_eq!(counter.next_key("Box", |_| false), "Box0");
        assert_eq!(counter.next_key("Box", |_| false), "Box1");
        assert_eq!(counter.next_key("Length", |_| false), "Length0");
        assert_eq!(counter.count("Box"), 2);
    }

    #[test]
    fn test_skips_taken_keys() {
        let mut counter = KeyCounter::new();
        let key = counter.next_key("Box", |k| k == "Box0" || k == "Box1");
        assert_eq!(key, "Box2");
    }
}
