//! Keystore provisioning.
//!
//! [`KeystorePackager`] generates every key and certificate of one instance
//! and writes them into `ajettykeystore.<N>`, a PKCS#12 file protected by the
//! operator's password. [`Pkcs12Store`] reads such a file back.

pub mod asn1;
pub mod kdf;
pub mod oid;
pub mod reader;
pub mod writer;

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::cert::params::{
    CaRequest, CertificateRole, DistinguishedName, EndEntityRequest, IntermediateRequest,
    Validity,
};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::config::{Hierarchy, ProvisioningConfig};
use crate::error::{PkiError, Result};
use crate::issuer::{Issuer, LOCALHOST_DNS};
use crate::password::Password;
use crate::provider::CryptoProvider;

pub use reader::Pkcs12Store;
pub use writer::Pkcs12Builder;

/// File name prefix; the instance number is the extension.
pub const KEYSTORE_FILE_PREFIX: &str = "ajettykeystore";

/// `ajettykeystore.<instance>`
pub fn keystore_file_name(instance: u32) -> String {
    format!("{KEYSTORE_FILE_PREFIX}.{instance}")
}

/// Keystore location inside `dir`, or the working directory when `dir` is
/// `None`.
pub fn keystore_path(dir: Option<&Path>, instance: u32) -> PathBuf {
    match dir {
        Some(dir) => dir.join(keystore_file_name(instance)),
        None => PathBuf::from(keystore_file_name(instance)),
    }
}

/// Entry names of one instance's keystore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aliases {
    pub root: String,
    pub ca: String,
    pub https: String,
    pub file_exchange: String,
}

impl Aliases {
    pub fn for_instance(instance: u32) -> Self {
        Self {
            root: format!("AJettyRoot{instance}"),
            ca: format!("AJettyCa{instance}"),
            https: format!("AJettyHttps{instance}"),
            file_exchange: format!("AJettyFileExch{instance}"),
        }
    }
}

/// Everything generated for one instance, before packaging.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Version 1 root of the two-level profile.
    pub root: Option<Certificate>,
    pub ca: CertificateWithPrivateKey,
    pub https: CertificateWithPrivateKey,
    pub file_exchange: CertificateWithPrivateKey,
}

/// Subject names of one instance's certificates.
fn subject(common_name: String, unit: &str, country: &str) -> DistinguishedName {
    DistinguishedName::builder()
        .common_name(common_name)
        .organization_unit(unit.to_string())
        .organization(unit.to_string())
        .country(country.to_string())
        .build()
}

/// Generates and packages the keys and certificates of one instance.
pub struct KeystorePackager<'a> {
    config: &'a ProvisioningConfig,
    provider: &'a dyn CryptoProvider,
}

impl<'a> KeystorePackager<'a> {
    pub fn new(config: &'a ProvisioningConfig, provider: &'a dyn CryptoProvider) -> Self {
        Self { config, provider }
    }

    /// Creates `ajettykeystore.<instance>` in `dir` and returns its path.
    ///
    /// Fails with [`PkiError::FileAlreadyExists`] before generating anything
    /// when the file is already there; an existing file is never touched.
    /// The file appears only once it is complete.
    #[tracing::instrument(skip_all, fields(instance = instance))]
    pub fn create_key_store_with_credentials(
        &self,
        dir: Option<&Path>,
        instance: u32,
        password: &Password,
    ) -> Result<PathBuf> {
        let path = keystore_path(dir, instance);
        if path.exists() {
            return Err(PkiError::FileAlreadyExists(path));
        }
        if password.is_empty() {
            return Err(PkiError::Precondition("password must not be empty".to_string()));
        }
        if self.config.enforce_password_strength {
            password.ensure_strong()?;
        }
        self.config.validate()?;

        tracing::info!(
            path = %path.display(),
            hierarchy = %self.config.hierarchy,
            "provisioning keystore"
        );
        let credentials = self.generate_credentials(instance)?;
        let der = self.package(&credentials, instance, password)?;
        write_atomically(&path, &der)?;
        tracing::info!(path = %path.display(), bytes = der.len(), "keystore written");
        Ok(path)
    }

    /// Generates the keys and certificates of `instance` per the configured
    /// hierarchy. Serials start at 1 and increase in issue order.
    pub fn generate_credentials(&self, instance: u32) -> Result<Credentials> {
        let country = self.config.country.as_str();
        let validity = Validity::for_years(self.config.validity_years)?;
        let bits = self.config.key_bits;

        let ca_label = format!("A-Jetty{instance} CA");
        let ca_subject = subject(ca_label.clone(), &ca_label, country);
        let ca_key = self.provider.generate_rsa(bits)?;

        let (root, ca, mut next_serial) = match self.config.hierarchy {
            Hierarchy::SingleCa => {
                let request = CaRequest::builder()
                    .subject(ca_subject)
                    .validity(validity.clone())
                    .build();
                let cert = Certificate::new_self_signed_ca(&request, &ca_key, self.provider)?;
                (None, CertificateWithPrivateKey { cert, key: ca_key }, 2)
            }
            Hierarchy::RootAndCa => {
                let root_label = format!("A-Jetty{instance} Root CA");
                let root_key = self.provider.generate_rsa(bits)?;
                let request = CaRequest::builder()
                    .subject(subject(root_label.clone(), &root_label, country))
                    .validity(validity.clone())
                    .build();
                let root = CertificateWithPrivateKey {
                    cert: Certificate::new_root_v1(&request, &root_key, self.provider)?,
                    key: root_key,
                };
                let request = IntermediateRequest::builder()
                    .subject(ca_subject)
                    .subject_public_key(ca_key.public_key().clone())
                    .serial_number(2)
                    .validity(validity.clone())
                    .build();
                let cert = root.issue_intermediate_ca(&request, self.provider)?;
                (Some(root.cert), CertificateWithPrivateKey { cert, key: ca_key }, 3)
            }
        };

        let https_label = format!("A-Jetty{instance} HTTPS");
        let https_key = self.provider.generate_rsa(bits)?;
        let request = EndEntityRequest::builder()
            .subject(subject(LOCALHOST_DNS.to_string(), &https_label, country))
            .subject_public_key(https_key.public_key().clone())
            .serial_number(next_serial)
            .validity(validity.clone())
            .role(CertificateRole::HttpsServer)
            .build();
        let https = CertificateWithPrivateKey {
            cert: ca.issue_end_entity(&request, self.provider)?,
            key: https_key,
        };
        next_serial += 1;

        let file_exchange_label = format!("A-Jetty{instance} File Exchanger");
        let file_exchange_key = self.provider.generate_rsa(bits)?;
        let request = EndEntityRequest::builder()
            .subject(subject(
                file_exchange_label.clone(),
                &file_exchange_label,
                country,
            ))
            .subject_public_key(file_exchange_key.public_key().clone())
            .serial_number(next_serial)
            .validity(validity)
            .role(CertificateRole::FileExchange)
            .build();
        let file_exchange = CertificateWithPrivateKey {
            cert: ca.issue_end_entity(&request, self.provider)?,
            key: file_exchange_key,
        };

        Ok(Credentials {
            root,
            ca,
            https,
            file_exchange,
        })
    }

    /// Encodes `credentials` as the PKCS#12 file of `instance`.
    ///
    /// Key bags: HTTPS, file exchange. Certificate bags: HTTPS, file
    /// exchange, CA, then the root when there is one.
    pub fn package(
        &self,
        credentials: &Credentials,
        instance: u32,
        password: &Password,
    ) -> Result<Vec<u8>> {
        let aliases = Aliases::for_instance(instance);
        let mut builder = Pkcs12Builder::new(self.provider)
            .pbe_iterations(self.config.pbe_iterations)
            .mac_iterations(self.config.mac_iterations)
            .add_key_entry(&aliases.https, &credentials.https.key, &credentials.https.cert)?
            .add_key_entry(
                &aliases.file_exchange,
                &credentials.file_exchange.key,
                &credentials.file_exchange.cert,
            )?
            .add_certificate(&aliases.ca, &credentials.ca.cert)?;
        if let Some(root) = &credentials.root {
            builder = builder.add_certificate(&aliases.root, root)?;
        }
        builder.to_der(password)
    }
}

/// Writes `data` to a uniquely named temporary file next to `path`, syncs it,
/// then links it into place. The rename never replaces an existing file, and
/// an unused temporary file is removed on every exit path. The file is
/// readable by the owner only on Unix.
fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| PkiError::InvalidInput(format!("not a file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    prefix.push(file_name);
    prefix.push(".");

    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    restrict_to_owner(temp.as_file())?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;

    temp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            PkiError::FileAlreadyExists(path.to_path_buf())
        } else {
            tracing::warn!(path = %path.display(), error = %e.error, "failed to move keystore into place");
            PkiError::Io(e.error)
        }
    })?;
    Ok(())
}

#[cfg(unix)]
fn restrict_to_owner(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    Ok(file.set_permissions(fs::Permissions::from_mode(0o600))?)
}

#[cfg(not(unix))]
fn restrict_to_owner(_file: &fs::File) -> Result<()> {
    Ok(())
}
