//! Token source trait and the default UUID-backed implementation.
//!
//! Tokens name ephemeral reply mailboxes. The bus treats them as opaque
//! address segments and only requires them to be unique for the lifetime
//! of the process.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::foundation::error::TokenResult;

/// Produces unique, URL-safe tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Allocates a fresh token.
    async fn allocate(&self) -> TokenResult<String>;
}

/// A shared token source.
pub type BoxedTokenSource = Arc<dyn TokenSource>;

/// Token source producing random v4 UUIDs as 32 lowercase hex characters,
/// optionally preceded by a fixed prefix.
#[derive(Debug, Clone, Default)]
pub struct UuidTokenSource {
    prefix: Option<String>,
}

impl UuidTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `prefix` to every token.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()).filter(|p: &String| !p.is_empty()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn generate(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        match &self.prefix {
            Some(prefix) => format!("{prefix}{id}"),
            None => id,
        }
    }
}

#[async_trait]
impl TokenSource for UuidTokenSource {
    async fn allocate(&self) -> TokenResult<String> {
        Ok(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokens_are_unique_hex() {
        let source = UuidTokenSource::new();
        let a = source.allocate().await.unwrap();
        let b = source.allocate().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_prefix_is_prepended() {
        let source = UuidTokenSource::with_prefix("node1-");
        let token = source.allocate().await.unwrap();
        assert!(token.starts_with("node1-"));
        assert_eq!(token.len(), 38);
        assert_eq!(UuidTokenSource::with_prefix("").prefix(), None);
    }
}
