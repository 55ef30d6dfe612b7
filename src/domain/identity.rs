//! Anonymous client identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;

/// A client-generated random identifier, persisted locally so a returning
/// reader overwrites their own prior rating instead of appending a new one.
///
/// This is not a security principal: clearing local state mints a fresh id,
/// so it offers no abuse resistance. Acceptable for a personal blog; a
/// higher-stakes deployment would need a real identity scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("client id must not be empty"));
        }
        if trimmed.lines().count() > 1 {
            return Err(DomainError::validation("client id must be a single line"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(ClientId::generate(), ClientId::generate());
    }

    #[test]
    fn parse_trims_and_validates() {
        let id = ClientId::parse("  abc-123\n").expect("client id");
        assert_eq!(id.as_str(), "abc-123");
        assert!(ClientId::parse("   ").is_err());
        assert!(ClientId::parse("two\nlines").is_err());
    }
}
