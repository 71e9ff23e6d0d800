#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ajetty_pki::config::{Hierarchy, ProvisioningConfig};
use ajetty_pki::keystore::Pkcs12Store;
use ajetty_pki::password::Password;
use ajetty_pki::service::CryptoService;
use tempfile::TempDir;

/// Passes the strength policy.
pub const PASSWORD: &str = "Lf8aQ2mZ7xK4pN9v";

pub fn password() -> Password {
    Password::new(PASSWORD)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A keystore provisioned into its own scratch directory.
pub struct Provisioned {
    pub dir: TempDir,
    pub path: PathBuf,
    pub instance: u32,
}

impl Provisioned {
    pub fn der(&self) -> Vec<u8> {
        std::fs::read(&self.path).unwrap()
    }

    pub fn open(&self) -> Pkcs12Store {
        Pkcs12Store::load(&self.path, &password()).unwrap()
    }
}

pub fn provision(config: ProvisioningConfig, instance: u32) -> Provisioned {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let service = CryptoService::new(config);
    let path = service
        .create_key_store_with_credentials(Some(dir.path()), instance, &password())
        .unwrap();
    Provisioned {
        dir,
        path,
        instance,
    }
}

/// Single-level keystore for instance 1, created once per test binary.
pub fn single_level() -> &'static Provisioned {
    static STORE: OnceLock<Provisioned> = OnceLock::new();
    STORE.get_or_init(|| provision(ProvisioningConfig::default(), 1))
}

/// Two-level keystore for instance 2, created once per test binary.
pub fn two_level() -> &'static Provisioned {
    static STORE: OnceLock<Provisioned> = OnceLock::new();
    STORE.get_or_init(|| {
        let config = ProvisioningConfig::builder()
            .hierarchy(Hierarchy::RootAndCa)
            .validity_years(20)
            .build();
        provision(config, 2)
    })
}

/// Names of the files in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
