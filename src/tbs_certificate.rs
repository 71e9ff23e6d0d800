use std::time::{Duration, SystemTime};

use der::Encode;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{PkiError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `version` - V1 for the legacy root, V3 for everything else.
/// * `serial_number` - Small positive serial, unique within one keystore.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The issuer name, copied from the issuer's certificate subject.
/// * `validity` - notBefore / notAfter.
/// * `subject` - The subject name.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions, must be empty for V1.
pub struct TbsCertificate {
    pub version: Version,
    pub serial_number: u64,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        if self.version == Version::V1 && !self.extensions.is_empty() {
            return Err(PkiError::CertificateError(
                "version 1 certificates cannot carry extensions".to_string(),
            ));
        }

        let extensions = if self.version == Version::V3 {
            let extensions = self
                .extensions
                .iter()
                .map(|ext| {
                    Ok(x509_cert::ext::Extension {
                        extn_id: ext.oid,
                        critical: ext.critical,
                        extn_value: OctetString::new(ext.value.clone())?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(extensions)
        } else {
            None
        };

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: self.version,
            serial_number: serial_number(self.serial_number)?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.as_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions,
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.to_tbs_certificate_inner()?
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }
}

/// Encodes `serial` as a positive INTEGER.
pub(crate) fn serial_number(serial: u64) -> Result<SerialNumber> {
    if serial == 0 {
        return Err(PkiError::InvalidInput(
            "serial number must be positive".to_string(),
        ));
    }
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut minimal = bytes[first..].to_vec();
    if minimal[0] & 0x80 != 0 {
        minimal.insert(0, 0);
    }
    Ok(SerialNumber::new(&minimal)?)
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 section 4.1.2.5).
fn to_x509_time(at: time::OffsetDateTime) -> Result<x509_cert::time::Time> {
    let seconds = u64::try_from(at.unix_timestamp())
        .map_err(|_| PkiError::InvalidInput("time before 1970".to_string()))?;
    let system_time = SystemTime::UNIX_EPOCH + Duration::from_secs(seconds);
    if at.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
            system_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}
