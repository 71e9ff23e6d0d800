//! # ajetty-pki - Local PKI Bootstrap in Pure Rust
//!
//! ajetty-pki provisions the credentials an embedded HTTPS server needs on
//! first run, built entirely with rustcrypto libraries. It generates RSA key
//! pairs, a certificate authority, a `localhost` TLS server certificate and a
//! file-exchange certificate, and packages them into one password-protected
//! PKCS#12 keystore. OpenSSL is only used by the tests, as an independent
//! reader of what this crate writes.
//!
//! ## Keystore Layout
//!
//! `ajettykeystore.<N>` holds, for instance number `N`:
//! - **AJettyHttps\<N\>**: private key and certificate for `localhost` / `127.0.0.1`
//! - **AJettyFileExch\<N\>**: private key and certificate for file exchange
//! - **AJettyCa\<N\>**: the CA certificate
//! - **AJettyRoot\<N\>**: the version 1 root, only in the two-level hierarchy
//!
//! Keys are encrypted with PBES2 (PBKDF2-HMAC-SHA256, AES-256-CBC) and the
//! file is protected by an HMAC-SHA256 MAC.
//!
//! ## Quick Start
//!
//! ### Provisioning a Keystore
//!
//! ```rust,no_run
//! use ajetty_pki::{config::ProvisioningConfig, password::Password, service::CryptoService};
//!
//! # fn main() -> Result<(), ajetty_pki::error::PkiError> {
//! CryptoService::init();
//! let service = CryptoService::new(ProvisioningConfig::default());
//!
//! let password = Password::new("Lf8aQ2mZ7xK4pN9v");
//! if let Some(rejection) = service.is_password_strong(Some(password.as_str())) {
//!     println!("Choose another password: {rejection}");
//!     return Ok(());
//! }
//!
//! let path = service.create_key_store_with_credentials(
//!     Some(std::path::Path::new("/var/lib/ajetty")),
//!     1,
//!     &password,
//! )?;
//! println!("Keystore written to {}", path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing Certificates Directly
//!
//! ```rust,no_run
//! use ajetty_pki::{
//!     cert::{Certificate, CertificateWithPrivateKey},
//!     cert::params::{CaRequest, CertificateRole, DistinguishedName, EndEntityRequest, Validity},
//!     issuer::Issuer,
//!     key::KeyPair,
//!     provider::RustCryptoProvider,
//! };
//!
//! # fn main() -> Result<(), ajetty_pki::error::PkiError> {
//! let provider = RustCryptoProvider;
//! let ca_key = KeyPair::generate_rsa(2048)?;
//! let ca_request = CaRequest::builder()
//!     .subject(DistinguishedName::builder().common_name("Example CA".to_string()).build())
//!     .validity(Validity::for_years(10)?)
//!     .build();
//! let ca = CertificateWithPrivateKey {
//!     cert: Certificate::new_self_signed_ca(&ca_request, &ca_key, &provider)?,
//!     key: ca_key,
//! };
//!
//! let server_key = KeyPair::generate_rsa(2048)?;
//! let request = EndEntityRequest::builder()
//!     .subject(DistinguishedName::builder().common_name("localhost".to_string()).build())
//!     .subject_public_key(server_key.public_key().clone())
//!     .serial_number(2)
//!     .validity(Validity::for_years(10)?)
//!     .role(CertificateRole::HttpsServer)
//!     .build();
//! let server_cert = ca.issue_end_entity(&request, &provider)?;
//! println!("{}", server_cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::PkiError`]:
//!
//! ```rust,no_run
//! use ajetty_pki::{error::PkiError, password::Password, service::CryptoService};
//!
//! let service = CryptoService::default();
//! let password = Password::new("Lf8aQ2mZ7xK4pN9v");
//! match service.create_key_store_with_credentials(None, 1, &password) {
//!     Ok(path) => println!("created {}", path.display()),
//!     Err(PkiError::FileAlreadyExists(path)) => println!("keeping {}", path.display()),
//!     Err(e) if e.is_precondition() => println!("not attempted: {e}"),
//!     Err(e) => println!("provisioning failed: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`service`]: The facade used by the embedding application
//! - [`keystore`]: PKCS#12 provisioning, writing and reading
//! - [`cert`]: Certificate creation, encoding/decoding and extensions
//! - [`issuer`]: Certificate issuing by a CA
//! - [`key`]: RSA key generation, import/export and signatures
//! - [`provider`]: The crypto provider capability and its one-time registration
//! - [`password`]: Password strength policy and the zeroizing password type
//! - [`digest`]: Streaming SHA-1 of files
//! - [`config`]: Provisioning settings, loadable from TOML
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod cert;
pub mod config;
pub mod digest;
pub mod error;
pub mod issuer;
pub mod key;
pub mod keystore;
pub mod password;
pub mod pem_utils;
pub mod provider;
pub mod service;
pub mod tbs_certificate;
