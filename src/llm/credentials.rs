// src/llm/credentials.rs
// Cyclic cursor over API keys, advanced when a provider rate-limits us

use std::fmt;

/// Ordered API keys with a persistent cursor.
///
/// The cursor survives across requests: a key that was rate-limited on the
/// previous call is not retried first on the next one.
#[derive(Clone)]
pub struct RotatingCredentialSet {
    credentials: Vec<String>,
    cursor: usize,
}

impl RotatingCredentialSet {
    /// Returns `None` for an empty set; a gateway cannot work without a key.
    pub fn new(credentials: Vec<String>) -> Option<Self> {
        if credentials.is_empty() {
            return None;
        }
        Some(Self {
            credentials,
            cursor: 0,
        })
    }

    /// Split a comma-separated list, ignoring blanks
    pub fn from_csv(list: &str) -> Option<Self> {
        let keys = list
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        Self::new(keys)
    }

    pub fn current(&self) -> &str {
        &self.credentials[self.cursor]
    }

    /// Move to the next key, wrapping around, and return it
    pub fn next(&mut self) -> &str {
        self.cursor = (self.cursor + 1) % self.credentials.len();
        self.current()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Attempts that make up one full rotation
    pub fn max_iter(&self) -> usize {
        self.credentials.len()
    }
}

impl fmt::Debug for RotatingCredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingCredentialSet")
            .field("len", &self.credentials.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> RotatingCredentialSet {
        RotatingCredentialSet::new((0..n).map(|i| format!("key-{}", i)).collect()).unwrap()
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(RotatingCredentialSet::new(vec![]).is_none());
        assert!(RotatingCredentialSet::from_csv(" , ,").is_none());
    }

    #[test]
    fn test_full_rotation_returns_to_start() {
        let mut set = keys(3);
        set.next();
        let start = set.position();
        for _ in 0..set.max_iter() {
            set.next();
        }
        assert_eq!(set.position(), start);
        assert_eq!(set.current(), "key-1");
    }

    #[test]
    fn test_next_wraps() {
        let mut set = keys(2);
        assert_eq!(set.current(), "key-0");
        assert_eq!(set.next(), "key-1");
        assert_eq!(set.next(), "key-0");
    }

    #[test]
    fn test_from_csv_trims() {
        let set = RotatingCredentialSet::from_csv("sk-a, sk-b ,,sk-c").unwrap();
        assert_eq!(set.max_iter(), 3);
        assert_eq!(set.current(), "sk-a");
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", keys(2));
        assert!(!rendered.contains("key-0"));
    }
}
