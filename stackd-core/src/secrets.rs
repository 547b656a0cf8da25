//! Random credential generation.
//!
//! Values are alphanumeric and drawn from the thread-local RNG. They are
//! transient bootstrap credentials that the provisioned system rotates, so no
//! further hardening is applied.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Random alphanumeric string of `len` characters.
pub fn generate(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// A generated credential bound to a template placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    /// Placeholder name (without braces)
    pub token: String,
    /// Number of random characters
    pub len: usize,
    /// Fixed prefix prepended to the random part
    #[serde(default)]
    pub prefix: Option<String>,
}

impl SecretSpec {
    pub fn new(token: impl Into<String>, len: usize) -> Self {
        Self { token: token.into(), len, prefix: None }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn generate(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, generate(self.len)),
            None => generate(self.len),
        }
    }
}

/// Secrets generated for one request, keyed by placeholder name.
#[derive(Clone, Default)]
pub struct SecretSet {
    values: BTreeMap<String, String>,
}

impl SecretSet {
    /// Generate one value per spec.
    pub fn generate(specs: &[SecretSpec]) -> Self {
        let values = specs.iter().map(|spec| (spec.token.clone(), spec.generate())).collect();
        Self { values }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_length_and_charset() {
        for len in [0, 1, 5, 15, 64] {
            let value = generate(len);
            assert_eq!(value.len(), len);
            assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_prefixed_spec() {
        let spec = SecretSpec::new("SSH_USER", 6).with_prefix("db-");
        let value = spec.generate();
        assert!(value.starts_with("db-"));
        assert_eq!(value.len(), 9);
    }

    #[test]
    fn test_secret_set_debug_hides_values() {
        let set = SecretSet::generate(&[SecretSpec::new("DB_PASSWORD", 12)]);
        let value = set.get("DB_PASSWORD").unwrap().to_string();
        let debug = format!("{:?}", set);
        assert!(debug.contains("DB_PASSWORD"));
        assert!(!debug.contains(&value));
        assert_eq!(set.len(), 1);
    }
}
