//! Stable signatures for constructed tasks.

use sha2::{Digest, Sha256};

/// Incremental SHA-256 over length-delimited components.
///
/// Each component is written with a separator, so `["ab", "c"]` and
/// `["a", "bc"]` produce different signatures.
#[derive(Default)]
pub struct Signature {
    hasher: Sha256,
}

impl Signature {
    pub fn new() -> Self {
        Signature {
            hasher: Sha256::new(),
        }
    }

    fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add a list, prefixed with its length.
    pub fn update_list<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        let items: Vec<&str> = items.into_iter().collect();
        self.hasher.update((items.len() as u64).to_le_bytes());
        for item in items {
            self.update_str(item);
        }
        self
    }

    pub fn update_pair(&mut self, key: &str, value: &str) -> &mut Self {
        self.update_str(key).update_str(value)
    }

    /// Hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
