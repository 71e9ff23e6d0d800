use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode};
use pkcs5::pbes2;
use x509_cert::spki::AlgorithmIdentifierOwned;

use super::asn1::{
    self, AuthenticatedSafe, CertBag, ContentInfo, DigestInfo, EncryptedContentInfo,
    EncryptedData, MacData, PFX_VERSION, Pfx, SafeBag, SafeContents,
};
use super::{kdf, oid};
use crate::cert::Certificate;
use crate::config::DEFAULT_ITERATIONS;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::password::Password;
use crate::provider::CryptoProvider;

/// Salt length for PBKDF2 and for the MAC key derivation.
pub const SALT_LEN: usize = 16;
const AES_IV_LEN: usize = 16;

struct KeyEntry {
    alias: String,
    key: KeyPair,
    local_key_id: Vec<u8>,
}

struct CertEntry {
    alias: String,
    cert: Certificate,
    local_key_id: Option<Vec<u8>>,
}

/// Collects keys and certificates and encodes them as a password protected
/// PKCS#12 file.
///
/// Each private key lands in its own `data` ContentInfo as a
/// pkcs8ShroudedKeyBag. All certificates share one `encryptedData`
/// ContentInfo. Both use PBES2 (PBKDF2-HMAC-SHA256, AES-256-CBC). The whole
/// authSafe is covered by an HMAC-SHA256 MAC.
pub struct Pkcs12Builder<'a> {
    provider: &'a dyn CryptoProvider,
    pbe_iterations: u32,
    mac_iterations: u32,
    keys: Vec<KeyEntry>,
    certs: Vec<CertEntry>,
}

impl<'a> Pkcs12Builder<'a> {
    pub fn new(provider: &'a dyn CryptoProvider) -> Self {
        Self {
            provider,
            pbe_iterations: DEFAULT_ITERATIONS,
            mac_iterations: DEFAULT_ITERATIONS,
            keys: Vec::new(),
            certs: Vec::new(),
        }
    }

    pub fn pbe_iterations(mut self, iterations: u32) -> Self {
        self.pbe_iterations = iterations;
        self
    }

    pub fn mac_iterations(mut self, iterations: u32) -> Self {
        self.mac_iterations = iterations;
        self
    }

    /// Adds a private key and its certificate under `alias`. Both bags carry
    /// the certificate's key identifier as localKeyId.
    pub fn add_key_entry(mut self, alias: &str, key: &KeyPair, cert: &Certificate) -> Result<Self> {
        self.check_alias(alias)?;
        if cert.public_key()? != *key.public_key() {
            return Err(PkiError::InvalidInput(format!(
                "certificate for {alias} does not match its private key"
            )));
        }
        let local_key_id = cert.key_identifier()?;
        self.keys.push(KeyEntry {
            alias: alias.to_string(),
            key: key.clone(),
            local_key_id: local_key_id.clone(),
        });
        self.certs.push(CertEntry {
            alias: alias.to_string(),
            cert: cert.clone(),
            local_key_id: Some(local_key_id),
        });
        Ok(self)
    }

    /// Adds a certificate without a key. Its bag carries friendlyName only.
    pub fn add_certificate(mut self, alias: &str, cert: &Certificate) -> Result<Self> {
        self.check_alias(alias)?;
        self.certs.push(CertEntry {
            alias: alias.to_string(),
            cert: cert.clone(),
            local_key_id: None,
        });
        Ok(self)
    }

    fn check_alias(&self, alias: &str) -> Result<()> {
        if alias.is_empty() {
            return Err(PkiError::InvalidInput("alias must not be empty".to_string()));
        }
        if self.certs.iter().any(|entry| entry.alias == alias) {
            return Err(PkiError::InvalidInput(format!("duplicate alias {alias}")));
        }
        Ok(())
    }

    /// Encodes the PFX in DER, which never uses indefinite lengths.
    pub fn to_der(&self, password: &Password) -> Result<Vec<u8>> {
        if password.is_empty() {
            return Err(PkiError::Precondition("password must not be empty".to_string()));
        }
        if self.pbe_iterations == 0 || self.mac_iterations == 0 {
            return Err(PkiError::InvalidInput(
                "iteration counts must be positive".to_string(),
            ));
        }

        let mut auth_safe: AuthenticatedSafe = Vec::with_capacity(self.keys.len() + 1);
        for entry in &self.keys {
            let bag = self.shrouded_key_bag(entry, password)?;
            let contents: SafeContents = vec![bag];
            auth_safe.push(ContentInfo::data(encode(&contents)?)?);
        }
        if !self.certs.is_empty() {
            let bags = self
                .certs
                .iter()
                .map(cert_bag)
                .collect::<Result<SafeContents>>()?;
            auth_safe.push(self.encrypted_content(&encode(&bags)?, password)?);
        }

        let auth_safe_der = encode(&auth_safe)?;
        let mac_data = self.mac_data(&auth_safe_der, password)?;
        let pfx = Pfx {
            version: PFX_VERSION,
            auth_safe: ContentInfo::data(auth_safe_der)?,
            mac_data: Some(mac_data),
        };
        encode(&pfx)
    }

    fn random<const N: usize>(&self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.provider.fill_random(&mut buf)?;
        Ok(buf)
    }

    fn shrouded_key_bag(&self, entry: &KeyEntry, password: &Password) -> Result<SafeBag> {
        let salt = self.random::<SALT_LEN>()?;
        let iv = self.random::<AES_IV_LEN>()?;
        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(self.pbe_iterations, &salt, &iv)?;

        let private_der = entry.key.to_pkcs8_der()?;
        let private_info = pkcs8::PrivateKeyInfo::try_from(private_der.as_bytes())?;
        let encrypted = private_info.encrypt_with_params(params, password.as_bytes())?;

        Ok(SafeBag {
            bag_id: oid::PKCS8_SHROUDED_KEY_BAG,
            bag_value: Any::from_der(encrypted.as_bytes())?,
            bag_attributes: Some(SetOfVec::try_from(vec![
                asn1::friendly_name(&entry.alias)?,
                asn1::local_key_id(&entry.local_key_id)?,
            ])?),
        })
    }

    fn encrypted_content(&self, plaintext: &[u8], password: &Password) -> Result<ContentInfo> {
        let salt = self.random::<SALT_LEN>()?;
        let iv = self.random::<AES_IV_LEN>()?;
        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(self.pbe_iterations, &salt, &iv)?;
        let ciphertext = params.encrypt(password.as_bytes(), plaintext)?;

        let encrypted_data = EncryptedData {
            version: 0,
            encrypted_content_info: EncryptedContentInfo {
                content_type: oid::DATA,
                content_encryption_algorithm: asn1::to_algorithm_identifier(
                    &pkcs5::EncryptionScheme::from(params),
                )?,
                encrypted_content: Some(OctetString::new(ciphertext)?),
            },
        };
        ContentInfo::encrypted(&encrypted_data)
    }

    fn mac_data(&self, auth_safe_der: &[u8], password: &Password) -> Result<MacData> {
        let salt = self.random::<SALT_LEN>()?;
        let digest = kdf::mac_sha256(password, &salt, self.mac_iterations, auth_safe_der)?;
        Ok(MacData {
            mac: DigestInfo {
                digest_algorithm: sha256_algorithm()?,
                digest: OctetString::new(digest)?,
            },
            mac_salt: OctetString::new(salt.to_vec())?,
            iterations: self.mac_iterations,
        })
    }
}

fn cert_bag(entry: &CertEntry) -> Result<SafeBag> {
    let cert_bag = CertBag {
        cert_id: oid::X509_CERTIFICATE,
        cert_value: OctetString::new(entry.cert.to_der()?)?,
    };
    let mut attributes = vec![asn1::friendly_name(&entry.alias)?];
    if let Some(id) = &entry.local_key_id {
        attributes.push(asn1::local_key_id(id)?);
    }
    Ok(SafeBag {
        bag_id: oid::CERT_BAG,
        bag_value: Any::encode_from(&cert_bag)?,
        bag_attributes: Some(SetOfVec::try_from(attributes)?),
    })
}

/// SHA-256 with explicit NULL parameters, as OpenSSL and Java write it.
pub(crate) fn sha256_algorithm() -> Result<AlgorithmIdentifierOwned> {
    Ok(AlgorithmIdentifierOwned {
        oid: oid::SHA256,
        parameters: Some(Any::encode_from(&der::asn1::Null)?),
    })
}

fn encode<T: Encode>(value: &T) -> Result<Vec<u8>> {
    value
        .to_der()
        .map_err(|e| PkiError::EncodingError(e.to_string()))
}
