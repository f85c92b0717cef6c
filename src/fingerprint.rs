// src/fingerprint.rs
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable SHA-256 over (term, context presence, normalized input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(term: Option<&str>, has_context: bool, raw_input: &str) -> Self {
        let mut hasher = Sha256::new();
        match term {
            Some(t) => {
                hasher.update(b"term:");
                hasher.update(t.trim().to_lowercase().as_bytes());
            }
            None => hasher.update(b"conversation"),
        }
        hasher.update([0u8]);
        hasher.update(if has_context { b"ctx:1" } else { b"ctx:0" });
        hasher.update([0u8]);
        hasher.update(normalize_input(raw_input).as_bytes());
        Self(hasher.finalize().into())
    }

    /// 12 hex chars, enough for logs and headers.
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(12);
        s
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Trim, collapse whitespace, lowercase.
pub fn normalize_input(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_and_case_do_not_change_the_fingerprint() {
        let a = Fingerprint::of(Some("PER"), false, "  PER 이 뭐야  ");
        let b = Fingerprint::of(Some("per"), false, "per 이   뭐야");
        assert_eq!(a, b);
    }

    #[test]
    fn every_component_participates() {
        let base = Fingerprint::of(Some("금리"), false, "금리가 뭐야");
        assert_ne!(base, Fingerprint::of(None, false, "금리가 뭐야"));
        assert_ne!(base, Fingerprint::of(Some("금리"), true, "금리가 뭐야"));
        assert_ne!(base, Fingerprint::of(Some("금리"), false, "금리는 뭐야"));
        assert_eq!(base.to_string().len(), 64);
        assert_eq!(base.short().len(), 12);
    }
}
