use der::Encode;
use rand_core::CryptoRngCore;
use rsa::pkcs1v15::{Signature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{PkiError, Result};

/// Default RSA modulus length.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Public half of an RSA key pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public.clone()
    }

    pub fn as_rsa(&self) -> &RsaPublicKey {
        &self.0
    }

    /// SubjectPublicKeyInfo for embedding in a certificate.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned::from_key(self.0.clone())?)
    }

    /// DER encoded SubjectPublicKeyInfo.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        self.as_spki()?
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| PkiError::DecodingError(e.to_string()))?;
        Ok(PublicKey(public))
    }

    /// SHA-1 over the subjectPublicKey bits (RFC 5280 section 4.2.1.2, method 1).
    ///
    /// Used for the subject and authority key identifiers and as the
    /// PKCS#12 localKeyId.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.as_spki()?;
        Ok(Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec())
    }

    /// Checks a SHA256withRSA (PKCS#1 v1.5) signature.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let verifying_key = RsaVerifyingKey::<Sha256>::new(self.0.clone());
        let signature = Signature::try_from(signature)?;
        verifying_key
            .verify(data, &signature)
            .map_err(|e| PkiError::CertificateError(format!("signature check failed: {e}")))
    }
}

/// An RSA key pair. The private key is wiped when dropped.
#[derive(Clone)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: PublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        Self::generate_rsa_with(&mut rng, bits)
    }

    /// Generate an RSA key pair from the given random source.
    pub fn generate_rsa_with<R: CryptoRngCore + ?Sized>(rng: &mut R, bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(rng, bits)?;
        Ok(Self::from_private(private))
    }

    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = PublicKey(RsaPublicKey::from(&private));
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public.as_spki()
    }

    /// Signs `data` with SHA256withRSA.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key = RsaSigningKey::<Sha256>::new((*self.private).clone());
        let mut rng = rand_core::OsRng;
        let signature = signing_key.try_sign_with_rng(&mut rng, data)?;
        Ok(signature.to_vec())
    }

    /// PKCS#8 PrivateKeyInfo, held in a buffer that is wiped on drop.
    pub fn to_pkcs8_der(&self) -> Result<pkcs8::SecretDocument> {
        Ok(self.private.to_pkcs8_der()?)
    }

    pub fn import_from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| PkiError::DecodingError(e.to_string()))?;
        Ok(Self::from_private(private))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key_pair = KeyPair::generate_rsa(DEFAULT_RSA_BITS).unwrap();
        let signature = key_pair.sign_data(b"to be signed").unwrap();
        assert_eq!(signature.len(), 256);
        key_pair
            .public_key()
            .verify(b"to be signed", &signature)
            .unwrap();
        assert!(key_pair.public_key().verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn test_pkcs8_round_trip_keeps_identifier() {
        let key_pair = KeyPair::generate_rsa(DEFAULT_RSA_BITS).unwrap();
        let der = key_pair.to_pkcs8_der().unwrap();
        let imported = KeyPair::import_from_pkcs8_der(der.as_bytes()).unwrap();
        assert_eq!(
            key_pair.public_key().key_identifier().unwrap(),
            imported.public_key().key_identifier().unwrap()
        );
        assert_eq!(key_pair.public_key().key_identifier().unwrap().len(), 20);
    }
}
