mod util;

use std::fs;

use ajetty_pki::config::ProvisioningConfig;
use ajetty_pki::error::PkiError;
use ajetty_pki::password::Rejection;
use ajetty_pki::provider::{CryptoProvider, RUST_CRYPTO_PROVIDER_NAME, RustCryptoProvider};
use ajetty_pki::service::CryptoService;
use pkcs5::pbes2;

#[test]
fn test_init_registers_provider_once() {
    util::init_tracing();
    CryptoService::init();
    assert!(!CryptoService::init());
    assert_eq!(CryptoService::default().provider_name(), RUST_CRYPTO_PROVIDER_NAME);
}

#[test]
fn test_password_verdicts() {
    let service = CryptoService::default();
    let cases = [
        (None, Some(Rejection::TooShort)),
        (Some(""), Some(Rejection::TooShort)),
        (Some("abc123defghijk"), Some(Rejection::TooShort)),
        (Some("myQwertyKeys9381"), Some(Rejection::WeakPattern)),
        (Some("xyADMINlkjhg8471"), Some(Rejection::WeakPattern)),
        (Some("hjgk!lmnopqrs4192"), Some(Rejection::NotAlphanumeric)),
        (Some("a1b2c3d4e6f7g8h90"), Some(Rejection::TooFewLetters)),
        (Some("aaaaaaaaaabbb193c"), Some(Rejection::TooFewDistinct)),
        (Some("abcdefghijklmnop12"), Some(Rejection::TooFewDigits)),
        (Some("gracailikiki213"), None),
        (Some("deviLWoodgrovE155"), None),
        (Some(util::PASSWORD), None),
    ];
    for (password, expected) in cases {
        assert_eq!(service.is_password_strong(password), expected, "{password:?}");
    }
}

#[test]
fn test_rejection_messages_are_readable() {
    let service = CryptoService::default();
    let rejection = service.is_password_strong(Some("short")).unwrap();
    assert_eq!(rejection.to_string(), "at least 15 letters and digits are required");
}

#[test]
fn test_calculate_sha1_matches_openssl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.bin");
    let mut data = vec![0u8; 10_000];
    RustCryptoProvider.fill_random(&mut data).unwrap();
    fs::write(&path, &data).unwrap();

    for buffer_size in [1, 1024, 4096, 20_000] {
        let config = ProvisioningConfig::builder()
            .digest_buffer_size(buffer_size)
            .build();
        let digest = CryptoService::new(config).calculate_sha1(&path).unwrap();
        assert_eq!(digest, openssl::sha::sha1(&data), "buffer size {buffer_size}");
    }
}

#[test]
fn test_calculate_sha1_of_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty");
    fs::write(&path, b"").unwrap();
    let digest = CryptoService::default().calculate_sha1(&path).unwrap();
    assert_eq!(
        hex::encode(digest),
        "da39a3ee5e6b4b0d3255bfef95601890afd80709"
    );
}

#[test]
fn test_calculate_sha1_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CryptoService::default()
        .calculate_sha1(dir.path().join("absent"))
        .unwrap_err();
    assert!(matches!(err, PkiError::Io(_)));
}

#[test]
fn test_encrypted_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("report.bin");
    let encrypted = dir.path().join("report.bin.enc");
    let decrypted = dir.path().join("report.bin.dec");

    let provider = RustCryptoProvider;
    let mut data = vec![0u8; 3 * 1024 + 17];
    provider.fill_random(&mut data).unwrap();
    fs::write(&original, &data).unwrap();

    let mut salt = [0u8; 16];
    let mut iv = [0u8; 16];
    provider.fill_random(&mut salt).unwrap();
    provider.fill_random(&mut iv).unwrap();
    let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, &salt, &iv).unwrap();

    let ciphertext = params.encrypt(util::PASSWORD, &fs::read(&original).unwrap()).unwrap();
    fs::write(&encrypted, &ciphertext).unwrap();
    let plaintext = params
        .decrypt(util::PASSWORD, &fs::read(&encrypted).unwrap())
        .unwrap();
    fs::write(&decrypted, plaintext).unwrap();

    let service = CryptoService::default();
    let original_sha1 = service.calculate_sha1(&original).unwrap();
    assert_eq!(original_sha1, service.calculate_sha1(&decrypted).unwrap());
    assert_ne!(original_sha1, service.calculate_sha1(&encrypted).unwrap());
}

#[test]
fn test_config_from_toml_drives_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ajetty-pki.toml");
    fs::write(
        &path,
        "hierarchy = 2\nvalidity_years = 5\ndigest_buffer_size = 4096\n",
    )
    .unwrap();
    let config = ProvisioningConfig::from_file(&path).unwrap();
    let service = CryptoService::new(config);
    assert_eq!(service.config().validity_years, 5);
    assert_eq!(service.config().hierarchy.levels(), 2);
}
