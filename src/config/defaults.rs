//! Default configuration constants used across the transform.

/// Environment variable holding the optional sealing seed.
pub const SESSION_KEY_SEED_ENV: &str = "SESSION_KEY_SEED";

/// Minimum seed length for deterministic sealing.
pub const MIN_SESSION_KEY_SEED_LEN: usize = 32;

/// Environment variable enabling the ancestor-directory walk for `kubeseal`.
pub const FIND_KUBESEAL_ENV: &str = "FIND_KUBESEAL";

/// Name of the external sealing executable.
pub const KUBESEAL_BINARY: &str = "kubeseal";

/// Default bound on the certificate fetch and the `kubeseal` call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound on directories visited by the ancestor walk.
pub const MAX_ANCESTOR_DEPTH: usize = 64;

/// Maximum size of a certificate bundle (1 MB).
pub const MAX_CERT_BYTES: usize = 1024 * 1024;

/// Maximum size of `kubeseal` output (16 MB).
pub const MAX_SEALER_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

/// Upper bound on `kubeseal` diagnostics kept for error reporting.
pub const MAX_SEALER_STDERR_BYTES: usize = 1024 * 1024;
