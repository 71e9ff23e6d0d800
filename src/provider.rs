//! Cryptographic provider capability.
//!
//! Every operation that needs randomness, key generation or signing receives
//! a `&dyn CryptoProvider` explicitly. [`init`] registers the process-wide
//! default once; later calls are no-ops.

use std::sync::{Arc, OnceLock};

use rand_core::RngCore;

use crate::error::{PkiError, Result};
use crate::key::KeyPair;

/// Source of key material, randomness and signatures.
pub trait CryptoProvider: Send + Sync {
    /// Short provider name, for logs and diagnostics.
    fn name(&self) -> &str;

    /// Generates a fresh RSA key pair. Never seeded deterministically.
    fn generate_rsa(&self, bits: usize) -> Result<KeyPair>;

    /// Fills `buf` with cryptographically secure random bytes.
    fn fill_random(&self, buf: &mut [u8]) -> Result<()>;

    /// SHA256withRSA signature over `data`.
    fn sign(&self, key: &KeyPair, data: &[u8]) -> Result<Vec<u8>> {
        key.sign_data(data)
    }
}

/// Provider backed by the rustcrypto crates and the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

/// Name reported by [`RustCryptoProvider`].
pub const RUST_CRYPTO_PROVIDER_NAME: &str = "RustCrypto";

impl CryptoProvider for RustCryptoProvider {
    fn name(&self) -> &str {
        RUST_CRYPTO_PROVIDER_NAME
    }

    fn generate_rsa(&self, bits: usize) -> Result<KeyPair> {
        let mut rng = rand_core::OsRng;
        KeyPair::generate_rsa_with(&mut rng, bits)
    }

    fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
        rand_core::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| PkiError::CryptoProvider(format!("random source failed: {e}")))
    }
}

static DEFAULT_PROVIDER: OnceLock<Arc<dyn CryptoProvider>> = OnceLock::new();

/// Registers [`RustCryptoProvider`] as the process default.
///
/// Returns `true` if this call did the registration, `false` if a provider
/// was already registered.
pub fn init() -> bool {
    install_default(Arc::new(RustCryptoProvider))
}

/// Registers `provider` as the process default unless one already is.
pub fn install_default(provider: Arc<dyn CryptoProvider>) -> bool {
    let name = provider.name().to_owned();
    let mut installed = false;
    DEFAULT_PROVIDER.get_or_init(|| {
        installed = true;
        provider
    });
    if installed {
        tracing::debug!(provider = %name, "registered crypto provider");
    }
    installed
}

/// The registered process default, if [`init`] or [`install_default`] ran.
pub fn default_provider() -> Option<Arc<dyn CryptoProvider>> {
    DEFAULT_PROVIDER.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        assert!(!init());
        assert!(default_provider().is_some());
    }

    #[test]
    fn test_fill_random_is_not_constant() {
        let provider = RustCryptoProvider;
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        provider.fill_random(&mut a).unwrap();
        provider.fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
