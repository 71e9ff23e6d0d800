pub mod builder;
pub mod extensions;
pub mod params;

use der::{Decode, Encode};
use x509_cert::Version;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::error::{PkiError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;
use crate::provider::CryptoProvider;
use builder::CertificateBuilder;
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectAltName,
    SubjectKeyIdentifier, ToAndFromX509Extension,
};
use params::{CaRequest, DistinguishedName, ExtensionParam};

/// Serial number of a self-signed certificate.
pub const SELF_SIGNED_SERIAL: u64 = 1;

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RFC 4055 requires the NULL parameter for the RSA PKCS#1 v1.5 signature
    /// algorithms.
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::Any::from(der::AnyRef::from(der::asn1::Null))),
            },
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM
/// formats and to read back the extensions this crate writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, pem_utils::CERTIFICATE_LABEL))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Self { inner })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_utils::pem_to_der(pem, pem_utils::CERTIFICATE_LABEL)?)
    }

    pub fn version(&self) -> Version {
        self.inner.tbs_certificate.version
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject_name(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.subject())
    }

    pub fn issuer_name(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(self.issuer())
    }

    /// The serial number as an integer. Serials wider than 64 bits are rejected.
    pub fn serial_number(&self) -> Result<u64> {
        let bytes = self.inner.tbs_certificate.serial_number.as_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[first..];
        if significant.len() > 8 {
            return Err(PkiError::CertificateError(
                "serial number wider than 64 bits".to_string(),
            ));
        }
        Ok(significant
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Checks the certificate signature under `issuer_key`.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        if self.inner.signature_algorithm.oid != const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
        {
            return Err(PkiError::CertificateError(format!(
                "unsupported signature algorithm {}",
                self.inner.signature_algorithm.oid
            )));
        }
        let tbs = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::CertificateError("signature has unused bits".to_string())
        })?;
        issuer_key.verify(&tbs, signature)
    }

    /// True when issuer equals subject and the certificate verifies under
    /// its own key.
    pub fn is_self_signed(&self) -> bool {
        self.issuer() == self.subject()
            && self
                .public_key()
                .and_then(|key| self.verify_signed_by(&key))
                .is_ok()
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the extension of type `E`, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>())
            .transpose()
    }

    pub fn is_extension_critical<E: ToAndFromX509Extension>(&self) -> Option<bool> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.critical)
    }

    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.extension::<SubjectKeyIdentifier>()?.map(|ski| ski.0))
    }

    pub fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        self.extension::<AuthorityKeyIdentifier>()
    }

    pub fn subject_alt_names(&self) -> Result<Option<SubjectAltName>> {
        self.extension::<SubjectAltName>()
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        self.extension::<BasicConstraints>()
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.extension::<KeyUsage>()
    }

    /// Key identifier of the certified key: the subjectKeyIdentifier when
    /// present, otherwise computed from the public key.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.subject_key_identifier()? {
            Some(ski) => Ok(ski),
            None => self.public_key()?.key_identifier(),
        }
    }

    /// Creates a self-signed CA certificate with serial 1.
    ///
    /// Extensions: subjectKeyIdentifier, basicConstraints (critical) and
    /// keyUsage keyCertSign + cRLSign (critical).
    pub fn new_self_signed_ca(
        request: &CaRequest,
        key: &KeyPair,
        provider: &dyn CryptoProvider,
    ) -> Result<Self> {
        let name = request.subject.as_x509_name()?;
        let cert = CertificateBuilder::new()
            .serial_number(SELF_SIGNED_SERIAL)
            .issuer(name.clone())
            .subject(name)
            .validity(request.validity.clone())
            .public_key(key.public_key().clone())
            .add_extension(
                SubjectKeyIdentifier(key.public_key().key_identifier()?),
                false,
            )?
            .add_extension(BasicConstraints::ca(request.path_len), true)?
            .add_extension(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign), true)?
            .sign(key, provider)?;
        tracing::debug!(
            serial = SELF_SIGNED_SERIAL,
            subject = %request.subject.common_name,
            "issued self-signed CA certificate"
        );
        Ok(cert)
    }

    /// Creates the version 1 self-signed root of the two-level profile.
    /// Version 1 certificates carry no extensions.
    pub fn new_root_v1(
        request: &CaRequest,
        key: &KeyPair,
        provider: &dyn CryptoProvider,
    ) -> Result<Self> {
        let name = request.subject.as_x509_name()?;
        let cert = CertificateBuilder::new()
            .version(Version::V1)
            .serial_number(SELF_SIGNED_SERIAL)
            .issuer(name.clone())
            .subject(name)
            .validity(request.validity.clone())
            .public_key(key.public_key().clone())
            .sign(key, provider)?;
        tracing::debug!(
            serial = SELF_SIGNED_SERIAL,
            subject = %request.subject.common_name,
            "issued v1 root certificate"
        );
        Ok(cert)
    }
}

/// A certificate together with the private key it certifies. The signing
/// side of [`Issuer`].
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_certificate(&self) -> &Certificate {
        &self.cert
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::Validity;
    use crate::provider::RustCryptoProvider;

    fn ca_request(cn: &str) -> CaRequest {
        CaRequest::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name(cn.to_string())
                    .organization(cn.to_string())
                    .country("RU".to_string())
                    .build(),
            )
            .validity(Validity::for_years(10).unwrap())
            .build()
    }

    #[test]
    fn test_self_signed_ca_extensions() {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let ca = Certificate::new_self_signed_ca(&ca_request("A-Jetty3 CA"), &key, &RustCryptoProvider)
            .unwrap();

        assert_eq!(ca.version(), Version::V3);
        assert_eq!(ca.serial_number().unwrap(), 1);
        assert!(ca.is_self_signed());
        assert_eq!(
            ca.subject_key_identifier().unwrap().unwrap(),
            key.public_key().key_identifier().unwrap()
        );
        assert_eq!(ca.basic_constraints().unwrap().unwrap(), BasicConstraints::ca(0));
        assert_eq!(ca.is_extension_critical::<BasicConstraints>(), Some(true));
        assert_eq!(
            ca.key_usage().unwrap().unwrap(),
            KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
        );
        assert!(ca.authority_key_identifier().unwrap().is_none());
    }

    #[test]
    fn test_root_v1_has_no_extensions() {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let root = Certificate::new_root_v1(&ca_request("A-Jetty3 Root"), &key, &RustCryptoProvider)
            .unwrap();
        assert_eq!(root.version(), Version::V1);
        assert!(root.extensions().is_empty());
        assert!(root.is_self_signed());
        assert_eq!(
            root.key_identifier().unwrap(),
            key.public_key().key_identifier().unwrap()
        );
    }

    #[test]
    fn test_der_and_pem_round_trip() {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let ca = Certificate::new_self_signed_ca(&ca_request("A-Jetty4 CA"), &key, &RustCryptoProvider)
            .unwrap();
        let from_der = Certificate::from_der(&ca.to_der().unwrap()).unwrap();
        assert_eq!(from_der, ca);
        let pem = ca.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(Certificate::from_pem(&pem).unwrap(), ca);
    }

    #[test]
    fn test_foreign_key_does_not_verify() {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let other = KeyPair::generate_rsa(2048).unwrap();
        let ca = Certificate::new_self_signed_ca(&ca_request("A-Jetty5 CA"), &key, &RustCryptoProvider)
            .unwrap();
        assert!(ca.verify_signed_by(other.public_key()).is_err());
    }
}
