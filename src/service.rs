use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ProvisioningConfig;
use crate::digest;
use crate::error::{PkiError, Result};
use crate::keystore::{Aliases, KeystorePackager, Pkcs12Store};
use crate::password::{self, Password, Rejection};
use crate::provider::{self, CryptoProvider, RustCryptoProvider};

/// File name of the exported CA certificate.
pub const CA_PEM_FILE_NAME: &str = "ajetty-ca.pem";

/// `ajetty-file-exch<instance>.kpub`
pub fn file_exchange_public_key_file_name(instance: u32) -> String {
    format!("ajetty-file-exch{instance}.kpub")
}

/// Paths written by [`CryptoService::export_companion_artifacts`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompanionArtifacts {
    /// PEM encoded CA certificate.
    pub ca_pem: PathBuf,
    /// DER encoded SubjectPublicKeyInfo of the file-exchange key.
    pub file_exchange_public_key: PathBuf,
}

/// Entry point for the embedding application: keystore provisioning,
/// password checks and file digests.
pub struct CryptoService {
    config: ProvisioningConfig,
    provider: Arc<dyn CryptoProvider>,
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new(ProvisioningConfig::default())
    }
}

impl CryptoService {
    /// Service using the registered default provider, or
    /// [`RustCryptoProvider`] when none is registered.
    pub fn new(config: ProvisioningConfig) -> Self {
        let provider = provider::default_provider().unwrap_or_else(|| Arc::new(RustCryptoProvider));
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: ProvisioningConfig, provider: Arc<dyn CryptoProvider>) -> Self {
        Self { config, provider }
    }

    /// Registers the default crypto provider for the process. Safe to call
    /// any number of times; returns `true` only for the call that registered.
    pub fn init() -> bool {
        provider::init()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Password strength verdict: `None` when strong enough, otherwise the
    /// first rule the password breaks.
    pub fn is_password_strong(&self, password: Option<&str>) -> Option<Rejection> {
        password::check_strength(password)
    }

    /// Creates `ajettykeystore.<instance>` in `dir`. See
    /// [`KeystorePackager::create_key_store_with_credentials`].
    pub fn create_key_store_with_credentials(
        &self,
        dir: Option<&Path>,
        instance: u32,
        password: &Password,
    ) -> Result<PathBuf> {
        KeystorePackager::new(&self.config, self.provider.as_ref())
            .create_key_store_with_credentials(dir, instance, password)
    }

    /// SHA-1 of the file at `path`.
    pub fn calculate_sha1(&self, path: impl AsRef<Path>) -> Result<[u8; digest::SHA1_LEN]> {
        digest::sha1_file(path, self.config.digest_buffer_size)
    }

    pub fn open_key_store(&self, path: impl AsRef<Path>, password: &Password) -> Result<Pkcs12Store> {
        Pkcs12Store::load(path, password)
    }

    /// Writes the CA certificate as `ajetty-ca.pem` and the file-exchange
    /// public key as `ajetty-file-exch<instance>.kpub` into `out_dir`.
    /// Existing files are replaced.
    #[tracing::instrument(skip_all, fields(instance = instance))]
    pub fn export_companion_artifacts(
        &self,
        keystore: impl AsRef<Path>,
        instance: u32,
        password: &Password,
        out_dir: impl AsRef<Path>,
    ) -> Result<CompanionArtifacts> {
        let store = self.open_key_store(keystore, password)?;
        let aliases = Aliases::for_instance(instance);
        let ca = store.certificate(&aliases.ca).ok_or_else(|| missing(&aliases.ca))?;
        let file_exchange = store
            .certificate(&aliases.file_exchange)
            .ok_or_else(|| missing(&aliases.file_exchange))?;

        let out_dir = out_dir.as_ref();
        let artifacts = CompanionArtifacts {
            ca_pem: out_dir.join(CA_PEM_FILE_NAME),
            file_exchange_public_key: out_dir.join(file_exchange_public_key_file_name(instance)),
        };
        fs::write(&artifacts.ca_pem, ca.to_pem()?)?;
        fs::write(
            &artifacts.file_exchange_public_key,
            file_exchange.public_key()?.to_spki_der()?,
        )?;
        tracing::info!(
            ca_pem = %artifacts.ca_pem.display(),
            public_key = %artifacts.file_exchange_public_key.display(),
            "exported companion artifacts"
        );
        Ok(artifacts)
    }
}

fn missing(alias: &str) -> PkiError {
    PkiError::Precondition(format!("keystore has no entry {alias}"))
}
