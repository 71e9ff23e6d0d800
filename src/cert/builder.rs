use der::Encode;
use der::asn1::BitString;
use x509_cert::Version;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use super::extensions::ToAndFromX509Extension;
use super::params::{ExtensionParam, Validity};
use super::{Certificate, SignatureAlgorithm};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::provider::CryptoProvider;
use crate::tbs_certificate::TbsCertificate;

/// Assembles the to-be-signed part of a certificate field by field and signs
/// it with SHA256withRSA.
///
/// Version defaults to V3. Every other field except extensions must be set
/// before [`CertificateBuilder::sign`].
#[derive(Clone, Debug, Default)]
pub struct CertificateBuilder {
    version: Option<Version>,
    serial_number: Option<u64>,
    issuer: Option<Name>,
    subject: Option<Name>,
    validity: Option<Validity>,
    public_key: Option<PublicKey>,
    extensions: Vec<ExtensionParam>,
}

impl CertificateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn serial_number(mut self, serial_number: u64) -> Self {
        self.serial_number = Some(serial_number);
        self
    }

    pub fn issuer(mut self, issuer: Name) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn subject(mut self, subject: Name) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    pub fn public_key(mut self, public_key: PublicKey) -> Self {
        self.public_key = Some(public_key);
        self
    }

    /// Appends an extension. Extensions are encoded in insertion order.
    pub fn add_extension<E: ToAndFromX509Extension>(
        mut self,
        extension: E,
        critical: bool,
    ) -> Result<Self> {
        let param = ExtensionParam::from_extension(extension, critical)?;
        if self.extensions.iter().any(|ext| ext.oid == param.oid) {
            return Err(PkiError::CertificateError(format!(
                "duplicate extension {}",
                param.oid
            )));
        }
        self.extensions.push(param);
        Ok(self)
    }

    /// Signs the certificate with `signing_key`, drawing the signature from
    /// `provider`.
    pub fn sign(self, signing_key: &KeyPair, provider: &dyn CryptoProvider) -> Result<Certificate> {
        let tbs = TbsCertificate {
            version: self.version.unwrap_or(Version::V3),
            serial_number: required(self.serial_number, "serial number")?,
            signature_algorithm: SignatureAlgorithm::Sha256WithRSA,
            issuer: required(self.issuer, "issuer")?,
            validity: required(self.validity, "validity")?,
            subject: required(self.subject, "subject")?,
            subject_public_key: required(self.public_key, "public key")?,
            extensions: self.extensions,
        };
        if tbs.validity.not_after <= tbs.validity.not_before {
            return Err(PkiError::InvalidInput(
                "validity ends before it starts".to_string(),
            ));
        }

        let tbs_certificate = tbs.to_tbs_certificate_inner()?;
        let tbs_der = tbs_certificate
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))?;
        let signature = provider.sign(signing_key, &tbs_der)?;

        let inner = CertificateInner {
            tbs_certificate,
            signature_algorithm: SignatureAlgorithm::Sha256WithRSA.into(),
            signature: BitString::from_bytes(&signature)
                .map_err(|e| PkiError::EncodingError(e.to_string()))?,
        };
        Ok(Certificate { inner })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| PkiError::InvalidInput(format!("certificate {field} is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::BasicConstraints;
    use crate::cert::params::DistinguishedName;
    use crate::provider::RustCryptoProvider;

    fn name(cn: &str) -> Name {
        DistinguishedName::builder()
            .common_name(cn.to_string())
            .build()
            .as_x509_name()
            .unwrap()
    }

    #[test]
    fn test_missing_serial_is_rejected() {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let result = CertificateBuilder::new()
            .issuer(name("issuer"))
            .subject(name("subject"))
            .validity(Validity::for_days(1).unwrap())
            .public_key(key.public_key().clone())
            .sign(&key, &RustCryptoProvider);
        assert!(matches!(result, Err(PkiError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_extension_is_rejected() {
        let bc = BasicConstraints::end_entity();
        let result = CertificateBuilder::new()
            .add_extension(bc, true)
            .unwrap()
            .add_extension(bc, true);
        assert!(result.is_err());
    }

    #[test]
    fn test_signed_certificate_verifies() {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let cert = CertificateBuilder::new()
            .serial_number(5)
            .issuer(name("self"))
            .subject(name("self"))
            .validity(Validity::for_days(30).unwrap())
            .public_key(key.public_key().clone())
            .sign(&key, &RustCryptoProvider)
            .unwrap();
        cert.verify_signed_by(key.public_key()).unwrap();
        assert_eq!(cert.serial_number().unwrap(), 5);
    }
}
