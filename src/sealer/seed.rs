//! Optional seed that makes in-process sealing reproducible.

use crate::config::{MIN_SESSION_KEY_SEED_LEN, SESSION_KEY_SEED_ENV};
use std::fmt;
use tracing::warn;

/// Operator-supplied seed of at least 32 characters.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSeed(String);

impl SessionSeed {
    /// `None` when the value is too short to be used.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.chars().count() < MIN_SESSION_KEY_SEED_LEN {
            return None;
        }
        Some(Self(value))
    }

    /// Read `SESSION_KEY_SEED`, ignoring values that are too short.
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(SESSION_KEY_SEED_ENV).ok()?;
        if value.is_empty() {
            return None;
        }
        let seed = Self::new(value);
        if seed.is_none() {
            warn!(
                "{} is shorter than {} characters and will be ignored",
                SESSION_KEY_SEED_ENV, MIN_SESSION_KEY_SEED_LEN
            );
        }
        seed
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SessionSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSeed(***)")
    }
}
