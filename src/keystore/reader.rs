use std::path::Path;

use der::{Decode, Encode};

use super::asn1::{
    AuthenticatedSafe, CertBag, ContentInfo, EncryptedData, PFX_VERSION, Pfx, SafeBag,
    SafeContents,
};
use super::{kdf, oid};
use crate::cert::Certificate;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::password::Password;

/// Largest MAC or PBKDF2 iteration count a file may ask for.
pub const MAX_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Clone)]
struct Entry {
    alias: String,
    local_key_id: Option<Vec<u8>>,
    certificate: Option<Certificate>,
    key: Option<KeyPair>,
}

/// A decoded PKCS#12 file: entries by alias, keys decrypted.
///
/// Only what this crate writes is understood: PBES2 encryption and an
/// HMAC-SHA256 MAC. Keys are paired with certificates by localKeyId and, for
/// bags without one, by friendlyName.
#[derive(Debug, Clone)]
pub struct Pkcs12Store {
    entries: Vec<Entry>,
}

impl Pkcs12Store {
    /// Reads and decodes the file at `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, password: &Password) -> Result<Self> {
        let der = std::fs::read(path.as_ref())?;
        Self::from_der(&der, password)
    }

    /// Decodes a PFX. The MAC is checked before anything is decrypted.
    pub fn from_der(der: &[u8], password: &Password) -> Result<Self> {
        let pfx = Pfx::from_der(der)?;
        if pfx.version != PFX_VERSION {
            return Err(PkiError::DecodingError(format!(
                "unsupported PFX version {}",
                pfx.version
            )));
        }
        let auth_safe_der = pfx.auth_safe.data_payload()?;
        verify_mac(&pfx, &auth_safe_der, password)?;

        let mut store = Pkcs12Store {
            entries: Vec::new(),
        };
        let auth_safe = AuthenticatedSafe::from_der(&auth_safe_der)?;
        for content in &auth_safe {
            let bags = match content.content_type {
                oid::DATA => SafeContents::from_der(&content.data_payload()?)?,
                oid::ENCRYPTED_DATA => {
                    SafeContents::from_der(&decrypt_content(content, password)?)?
                }
                other => {
                    return Err(PkiError::DecodingError(format!(
                        "unsupported content type {other}"
                    )));
                }
            };
            for bag in &bags {
                store.add_bag(bag, password)?;
            }
        }
        Ok(store)
    }

    fn add_bag(&mut self, bag: &SafeBag, password: &Password) -> Result<()> {
        let alias = bag.friendly_name()?;
        let local_key_id = bag.local_key_id()?;
        match bag.bag_id {
            oid::PKCS8_SHROUDED_KEY_BAG => {
                let encrypted = bag
                    .bag_value
                    .to_der()
                    .map_err(|e| PkiError::EncodingError(e.to_string()))?;
                let info = pkcs8::EncryptedPrivateKeyInfo::try_from(encrypted.as_slice())?;
                check_scheme(&info.encryption_algorithm)?;
                let private = info.decrypt(password.as_bytes())?;
                let key = KeyPair::import_from_pkcs8_der(private.as_bytes())?;
                self.entry_for(alias, local_key_id).key = Some(key);
            }
            oid::KEY_BAG => {
                let private = bag
                    .bag_value
                    .to_der()
                    .map_err(|e| PkiError::EncodingError(e.to_string()))?;
                let key = KeyPair::import_from_pkcs8_der(&private)?;
                self.entry_for(alias, local_key_id).key = Some(key);
            }
            oid::CERT_BAG => {
                let cert_bag: CertBag = bag.bag_value.decode_as()?;
                if cert_bag.cert_id != oid::X509_CERTIFICATE {
                    return Err(PkiError::DecodingError(format!(
                        "unsupported certificate type {}",
                        cert_bag.cert_id
                    )));
                }
                let cert = Certificate::from_der(cert_bag.cert_value.as_bytes())?;
                self.entry_for(alias, local_key_id).certificate = Some(cert);
            }
            other => {
                tracing::debug!(bag = %other, "skipping unsupported bag");
            }
        }
        Ok(())
    }

    /// The entry a bag belongs to, created on first sight.
    fn entry_for(&mut self, alias: Option<String>, local_key_id: Option<Vec<u8>>) -> &mut Entry {
        let position = self.entries.iter().position(|entry| match &local_key_id {
            Some(id) => entry.local_key_id.as_ref() == Some(id),
            None => alias.is_some() && entry.alias.as_str() == alias.as_deref().unwrap_or_default(),
        });
        let index = match position {
            Some(index) => index,
            None => {
                let alias = alias
                    .clone()
                    .unwrap_or_else(|| format!("entry{}", self.entries.len()));
                self.entries.push(Entry {
                    alias,
                    local_key_id: local_key_id.clone(),
                    certificate: None,
                    key: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// Aliases in file order.
    pub fn aliases(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.alias.clone()).collect()
    }

    fn entry(&self, alias: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.alias == alias)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entry(alias).is_some()
    }

    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        self.entry(alias)?.certificate.as_ref()
    }

    pub fn key_pair(&self, alias: &str) -> Option<&KeyPair> {
        self.entry(alias)?.key.as_ref()
    }

    /// True if a private key is stored under `alias`.
    pub fn is_key_entry(&self, alias: &str) -> bool {
        self.key_pair(alias).is_some()
    }

    pub fn local_key_id(&self, alias: &str) -> Option<&[u8]> {
        self.entry(alias)?.local_key_id.as_deref()
    }
}

fn verify_mac(pfx: &Pfx, auth_safe_der: &[u8], password: &Password) -> Result<()> {
    let mac_data = pfx
        .mac_data
        .as_ref()
        .ok_or_else(|| PkiError::Integrity("keystore has no MAC".to_string()))?;
    if mac_data.mac.digest_algorithm.oid != oid::SHA256 {
        return Err(PkiError::Integrity(format!(
            "unsupported MAC digest {}",
            mac_data.mac.digest_algorithm.oid
        )));
    }
    check_iterations(u64::from(mac_data.iterations), "MAC")?;
    kdf::verify_mac_sha256(
        password,
        mac_data.mac_salt.as_bytes(),
        mac_data.iterations,
        auth_safe_der,
        mac_data.mac.digest.as_bytes(),
    )
}

fn decrypt_content(content: &ContentInfo, password: &Password) -> Result<Vec<u8>> {
    let encrypted: EncryptedData = content.content.decode_as()?;
    let info = encrypted.encrypted_content_info;
    let ciphertext = info
        .encrypted_content
        .ok_or_else(|| PkiError::DecodingError("encryptedData has no content".to_string()))?;
    let algorithm = info
        .content_encryption_algorithm
        .to_der()
        .map_err(|e| PkiError::EncodingError(e.to_string()))?;
    let scheme = pkcs5::EncryptionScheme::from_der(&algorithm)?;
    check_scheme(&scheme)?;
    Ok(scheme.decrypt(password.as_bytes(), ciphertext.as_bytes())?)
}

fn check_iterations(iterations: u64, what: &str) -> Result<()> {
    if iterations > u64::from(MAX_ITERATIONS) {
        return Err(PkiError::DecodingError(format!(
            "{what} iteration count {iterations} exceeds {MAX_ITERATIONS}"
        )));
    }
    Ok(())
}

/// Rejects PBKDF2 parameters with an iteration count above [`MAX_ITERATIONS`].
fn check_scheme(scheme: &pkcs5::EncryptionScheme<'_>) -> Result<()> {
    if let pkcs5::EncryptionScheme::Pbes2(params) = scheme {
        if let pkcs5::pbes2::Kdf::Pbkdf2(kdf) = &params.kdf {
            check_iterations(u64::from(kdf.iteration_count), "PBKDF2")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_iterations_are_capped() {
        let salt = [1u8; 16];
        let iv = [2u8; 16];
        let within = pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, &salt, &iv).unwrap();
        check_scheme(&pkcs5::EncryptionScheme::Pbes2(within)).unwrap();

        let excessive =
            pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(u32::MAX, &salt, &iv).unwrap();
        assert!(matches!(
            check_scheme(&pkcs5::EncryptionScheme::Pbes2(excessive)),
            Err(PkiError::DecodingError(_))
        ));
    }

    #[test]
    fn test_iteration_limit_is_inclusive() {
        check_iterations(u64::from(MAX_ITERATIONS), "MAC").unwrap();
        assert!(check_iterations(u64::from(MAX_ITERATIONS) + 1, "MAC").is_err());
    }
}
