//! The HMAC-SHA256 integrity MAC of a PKCS#12 file, keyed through the
//! RFC 7292 appendix B.2 derivation.

use hmac::{Hmac, Mac};
use pkcs12::kdf::{Pkcs12KeyType, derive_key_utf8};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{PkiError, Result};
use crate::password::Password;

/// SHA-256 output length, also the MAC key length.
const MAC_KEY_LEN: usize = 32;

/// Derives the MAC key. The password is fed to the KDF as a terminated
/// BMPString.
pub fn derive_mac_key(
    password: &Password,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<Vec<u8>>> {
    if iterations == 0 {
        return Err(PkiError::InvalidInput(
            "iteration count must be positive".to_string(),
        ));
    }
    let rounds = i32::try_from(iterations)
        .map_err(|_| PkiError::InvalidInput(format!("iteration count {iterations} too large")))?;
    let key = derive_key_utf8::<Sha256>(
        password.as_str(),
        salt,
        Pkcs12KeyType::Mac,
        rounds,
        MAC_KEY_LEN,
    )?;
    Ok(Zeroizing::new(key))
}

fn keyed_mac(password: &Password, salt: &[u8], iterations: u32) -> Result<Hmac<Sha256>> {
    let key = derive_mac_key(password, salt, iterations)?;
    <Hmac<Sha256> as Mac>::new_from_slice(&key).map_err(|e| PkiError::CryptoProvider(e.to_string()))
}

/// HMAC-SHA256 over `data` keyed by the PKCS#12 MAC key.
pub fn mac_sha256(password: &Password, salt: &[u8], iterations: u32, data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = keyed_mac(password, salt, iterations)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Checks `expected` against the MAC of `data` in constant time.
pub fn verify_mac_sha256(
    password: &Password,
    salt: &[u8],
    iterations: u32,
    data: &[u8],
    expected: &[u8],
) -> Result<()> {
    let mut mac = keyed_mac(password, salt, iterations)?;
    mac.update(data);
    mac.verify_slice(expected)
        .map_err(|_| PkiError::Integrity("MAC mismatch, wrong password or damaged file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic_and_sensitive() {
        let password = Password::from("Lf8aQ2mZ7xK4pN9v");
        let salt = [7u8; 16];
        let a = derive_mac_key(&password, &salt, 2048).unwrap();
        let b = derive_mac_key(&password, &salt, 2048).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(a.len(), MAC_KEY_LEN);
        let other_salt = derive_mac_key(&password, &[8u8; 16], 2048).unwrap();
        assert_ne!(*a, *other_salt);
        let other_rounds = derive_mac_key(&password, &salt, 2049).unwrap();
        assert_ne!(*a, *other_rounds);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let password = Password::from("Lf8aQ2mZ7xK4pN9v");
        assert!(matches!(
            derive_mac_key(&password, b"salt", 0),
            Err(PkiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mac_verification() {
        let password = Password::from("Lf8aQ2mZ7xK4pN9v");
        let wrong = Password::from("Lf8aQ2mZ7xK4pN9w");
        let mac = mac_sha256(&password, b"salt", 2048, b"payload").unwrap();
        verify_mac_sha256(&password, b"salt", 2048, b"payload", &mac).unwrap();
        assert!(matches!(
            verify_mac_sha256(&wrong, b"salt", 2048, b"payload", &mac),
            Err(PkiError::Integrity(_))
        ));
    }
}
