//! Hybrid RSA-OAEP + AES-256-GCM sealing primitive.
//!
//! Each value gets a fresh 32-byte session key. The session key is
//! encrypted with RSA-OAEP (SHA-256) under a label naming the secret, and
//! the value is encrypted with AES-256-GCM under the session key. Because a
//! session key encrypts exactly one message, the GCM nonce is fixed at zero.
//!
//! Wire layout: `u16 BE len(rsa) || rsa ciphertext || aes ciphertext+tag`.

use super::seed::SessionSeed;
use crate::errors::{Result, SealError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::rand_core::CryptoRngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;

pub const SESSION_KEY_LEN: usize = 32;
const GCM_NONCE: [u8; 12] = [0u8; 12];

/// Scope label binding a ciphertext to a namespace and name.
pub fn scope_label(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Encrypt `plaintext` for the holder of the private half of `key`.
pub fn hybrid_encrypt<R>(
    rng: &mut R,
    key: &RsaPublicKey,
    plaintext: &[u8],
    label: &str,
) -> Result<Vec<u8>>
where
    R: CryptoRngCore,
{
    let mut session_key = [0u8; SESSION_KEY_LEN];
    rng.fill_bytes(&mut session_key);

    let rsa_ciphertext = key
        .encrypt(rng, Oaep::new_with_label::<Sha256, _>(label), &session_key)
        .map_err(|e| SealError::InvalidCertificate(format!("RSA-OAEP encryption failed: {e}")))?;

    let cipher = Aes256Gcm::new_from_slice(&session_key)
        .map_err(|e| SealError::InvalidSecret(format!("bad session key: {e}")))?;
    let aes_ciphertext = cipher
        .encrypt(Nonce::from_slice(&GCM_NONCE), plaintext)
        .map_err(|e| SealError::InvalidSecret(format!("AES-GCM encryption failed: {e}")))?;

    let rsa_len = u16::try_from(rsa_ciphertext.len()).map_err(|_| {
        SealError::InvalidCertificate("RSA key too large for the sealed format".into())
    })?;

    let mut out = Vec::with_capacity(2 + rsa_ciphertext.len() + aes_ciphertext.len());
    out.extend_from_slice(&rsa_len.to_be_bytes());
    out.extend_from_slice(&rsa_ciphertext);
    out.extend_from_slice(&aes_ciphertext);
    Ok(out)
}

/// Deterministic RNG for one value, derived from the seed and every input
/// that identifies the value: key, scope label, data key and plaintext.
pub fn seeded_rng(
    seed: &SessionSeed,
    key: &RsaPublicKey,
    label: &str,
    data_key: &str,
    plaintext: &[u8],
) -> Result<ChaCha20Rng> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(seed.as_bytes())
        .map_err(|e| SealError::Configuration(format!("unusable session key seed: {e}")))?;

    let modulus = key.n().to_bytes_be();
    let exponent = key.e().to_bytes_be();
    for part in [
        modulus.as_slice(),
        exponent.as_slice(),
        label.as_bytes(),
        data_key.as_bytes(),
        plaintext,
    ] {
        mac.update(&(part.len() as u64).to_be_bytes());
        mac.update(part);
    }

    let digest = mac.finalize().into_bytes();
    let mut rng_seed = [0u8; 32];
    rng_seed.copy_from_slice(&digest);
    Ok(ChaCha20Rng::from_seed(rng_seed))
}
