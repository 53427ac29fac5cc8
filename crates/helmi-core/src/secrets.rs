//! Secret generation for chart values
//!
//! `username` and `password` lookups in chart values are filled with fresh
//! random tokens. A generator lives for exactly one resolution, so the same
//! lookup used for two values yields the same token while separate installs
//! never share one.
//!
//! # Example
//!
//! ```yaml
//! chart-values:
//!   mariadbPassword: "{{ lookup('password', 'mariadb') }}"
//!   metrics.password: "{{ lookup('password', 'mariadb') }}"
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const HEX: &[u8] = b"0123456789abcdef";

// =============================================================================
// SECRET GENERATOR
// =============================================================================

/// Per-call secret cache
///
/// Keys are opaque to the generator; the credential resolver uses
/// `kind:path` so usernames and passwords with the same path stay distinct.
#[derive(Debug)]
pub struct SecretGenerator {
    secrets: HashMap<String, String>,
    rng: StdRng,
}

impl SecretGenerator {
    /// Length of generated tokens
    pub const TOKEN_LENGTH: usize = 32;

    /// Create a new generator with an empty cache
    pub fn new() -> Self {
        Self {
            secrets: HashMap::new(),
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Cached token for `key`, generating one on first use
    pub fn get_or_generate(&mut self, key: &str) -> String {
        self.secrets
            .entry(key.to_string())
            .or_insert_with(|| random_hex(&mut self.rng, Self::TOKEN_LENGTH))
            .clone()
    }

    /// Number of secrets generated so far
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn random_hex(rng: &mut StdRng, length: usize) -> String {
    (0..length)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
