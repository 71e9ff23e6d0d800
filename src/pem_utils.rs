use crate::error::{PkiError, Result};

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
///
/// Lines are wrapped at 64 columns and end with LF.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Convert a PEM‑encoded string to DER‑encoded bytes, checking the label.
pub fn pem_to_der(pem_str: &str, expected_label: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str).map_err(|e| PkiError::DecodingError(e.to_string()))?;
    if pem.tag() != expected_label {
        return Err(PkiError::DecodingError(format!(
            "expected PEM label {expected_label}, found {}",
            pem.tag()
        )));
    }
    Ok(pem.contents().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_is_checked() {
        let pem = der_to_pem(&[0x30, 0x00], CERTIFICATE_LABEL);
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(!pem.contains('\r'));
        assert_eq!(pem_to_der(&pem, CERTIFICATE_LABEL).unwrap(), vec![0x30, 0x00]);
        assert!(pem_to_der(&pem, "PUBLIC KEY").is_err());
    }
}
