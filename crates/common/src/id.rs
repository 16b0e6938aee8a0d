//! ID generation utilities.

use rand::{Rng, distributions::Alphanumeric};
use ulid::Ulid;
use uuid::Uuid;

/// ID generator for documents, blobs and tokens.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new document ID.
    ///
    /// Lowercase ULIDs, so ids created later sort after earlier ones.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a random blob name (UUID v4).
    #[must_use]
    pub fn generate_blob_name(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate an opaque session token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect()
    }

    /// Generate a short numeric code for password reset mails.
    #[must_use]
    pub fn generate_reset_code(&self) -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_blob_name() {
        let name = IdGenerator::new().generate_blob_name();
        assert_eq!(name.len(), 36);
    }

    #[test]
    fn test_generate_token() {
        let id_gen = IdGenerator::new();
        let token = id_gen.generate_token();

        assert_eq!(token.len(), 48);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, id_gen.generate_token());
    }

    #[test]
    fn test_generate_reset_code() {
        let code = IdGenerator::new().generate_reset_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
