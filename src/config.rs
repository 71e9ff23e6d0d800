//! Provisioning configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! # Example TOML
//!
//! ```toml
//! hierarchy = 2
//! validity_years = 20
//! key_bits = 3072
//! ```

use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::digest::DEFAULT_BUFFER_SIZE;
use crate::error::{PkiError, Result};
use crate::key::DEFAULT_RSA_BITS;

/// Smallest RSA modulus accepted for new keys.
pub const MIN_RSA_BITS: usize = 2048;

/// Default PBKDF2 and PKCS#12 MAC iteration count.
pub const DEFAULT_ITERATIONS: u32 = 2048;

/// Depth of the certificate hierarchy written into a keystore.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Hierarchy {
    /// A self-signed CA signs both end-entity certificates.
    #[default]
    SingleCa,
    /// A version 1 root signs an intermediate CA, which signs the end
    /// entities.
    RootAndCa,
}

impl Hierarchy {
    /// Number of CA levels above the end-entity certificates.
    pub fn levels(self) -> u8 {
        match self {
            Hierarchy::SingleCa => 1,
            Hierarchy::RootAndCa => 2,
        }
    }
}

impl TryFrom<u8> for Hierarchy {
    type Error = PkiError;

    fn try_from(levels: u8) -> Result<Self> {
        match levels {
            1 => Ok(Hierarchy::SingleCa),
            2 => Ok(Hierarchy::RootAndCa),
            other => Err(PkiError::Config(format!(
                "hierarchy must be 1 or 2 levels, got {other}"
            ))),
        }
    }
}

impl From<Hierarchy> for u8 {
    fn from(hierarchy: Hierarchy) -> Self {
        hierarchy.levels()
    }
}

impl std::fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.levels())
    }
}

/// Settings for keystore provisioning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Certificate hierarchy depth, `1` or `2`.
    #[builder(default)]
    pub hierarchy: Hierarchy,

    /// Validity of every certificate, counted from provisioning time.
    #[builder(default = 10)]
    pub validity_years: u32,

    /// RSA modulus length for every generated key.
    #[builder(default = DEFAULT_RSA_BITS)]
    pub key_bits: usize,

    /// PBKDF2 iterations for key and certificate bag encryption.
    #[builder(default = DEFAULT_ITERATIONS)]
    pub pbe_iterations: u32,

    /// Iterations of the PKCS#12 key derivation for the integrity MAC.
    #[builder(default = DEFAULT_ITERATIONS)]
    pub mac_iterations: u32,

    /// Read buffer for file digests.
    #[builder(default = DEFAULT_BUFFER_SIZE)]
    pub digest_buffer_size: usize,

    /// Refuse to provision with a password the strength policy rejects.
    #[builder(default = true)]
    pub enforce_password_strength: bool,

    /// Country attribute of every subject name.
    #[builder(default = "RU".to_string())]
    pub country: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProvisioningConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PkiError::Config(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.validity_years == 0 {
            return Err(PkiError::Config("validity_years must be positive".to_string()));
        }
        if self.key_bits < MIN_RSA_BITS {
            return Err(PkiError::Config(format!(
                "key_bits must be at least {MIN_RSA_BITS}, got {}",
                self.key_bits
            )));
        }
        if self.pbe_iterations == 0 || self.mac_iterations == 0 {
            return Err(PkiError::Config("iteration counts must be positive".to_string()));
        }
        if self.digest_buffer_size == 0 {
            return Err(PkiError::Config(
                "digest_buffer_size must be positive".to_string(),
            ));
        }
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(PkiError::Config(format!(
                "country must be a two-letter code, got {:?}",
                self.country
            )));
        }
        Ok(())
    }
}
