use sha2::{Digest, Sha256};

/// One-way masking of PII values. Identical inputs always produce identical
/// digests (under a fixed salt), which is what lets the sink deduplicate
/// redelivered records without ever seeing the raw value.
#[derive(Clone, Default)]
pub struct Masker {
    salt: Option<String>,
}

impl Masker {
    pub fn new(salt: Option<String>) -> Self {
        Self { salt }
    }

    /// Returns the 64-char lowercase hex SHA-256 digest of `value`, prefixed
    /// with the process-wide salt when one is configured. No decode operation
    /// exists anywhere in this crate.
    pub fn mask(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        if let Some(salt) = &self.salt {
            hasher.update(salt.as_bytes());
        }
        hasher.update(value.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn masking_is_deterministic() {
        let masker = Masker::default();
        assert_eq!(masker.mask("1.2.3.4"), masker.mask("1.2.3.4"));
    }

    #[test]
    fn masking_matches_known_digests() {
        let masker = Masker::default();
        assert_eq!(
            masker.mask("1.2.3.4"),
            "6694f83c9f476da31f5df6bcc520034e7e57d421d247b9d34f49edbfc84a764c"
        );
        assert_eq!(
            masker.mask("abc123"),
            "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090"
        );
    }

    #[test]
    fn output_is_always_64_hex_chars() {
        let masker = Masker::default();
        for input in ["", "x", "1.2.3.4", &"long".repeat(1000)] {
            let digest = masker.mask(input);
            assert_eq!(digest.len(), 64);
            assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn empty_input_is_masked_too() {
        assert_eq!(
            Masker::default().mask(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn distinct_inputs_produce_distinct_digests() {
        let masker = Masker::default();
        assert_ne!(masker.mask("10.0.0.1"), masker.mask("10.0.0.2"));
    }

    #[test]
    fn salt_changes_the_digest() {
        let unsalted = Masker::default();
        let salted = Masker::new(Some("pepper".to_string()));
        assert_ne!(unsalted.mask("1.2.3.4"), salted.mask("1.2.3.4"));
        assert_eq!(
            salted.mask("1.2.3.4"),
            "c9f20bed4bec69fd2ce806dbee10606b4857e4ba7b0172e2835569267242ddfd"
        );
    }
}
