use sha2::{Digest, Sha256};

/// One newsletter edition as fetched from upstream. Read-only to the
/// pipeline; the filtered output is always a new value.
#[derive(Debug, Clone)]
pub struct Issue {
    pub id: String,
    pub raw: String,
}

impl Issue {
    pub fn new(id: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw: raw.into(),
        }
    }

    /// Content digest used by the driver to skip unchanged issues.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct FilteredIssue {
    pub id: String,
    pub content: String,
    pub kept_units: usize,
    /// Ordinals of the units removed (ads plus orphaned wrappers).
    pub dropped_units: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let a = Issue::new("issue-1", "hello");
        let b = Issue::new("issue-2", "hello");
        let c = Issue::new("issue-1", "hello!");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
