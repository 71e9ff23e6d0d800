//! The X.509 v3 extensions this crate writes, with typed encode/decode.

use std::net::IpAddr;

use const_oid::AssociatedOid;
use const_oid::db::rfc5912::{ID_KP_CLIENT_AUTH, ID_KP_EMAIL_PROTECTION, ID_KP_SERVER_AUTH};
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::error::PkiError;

pub use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

/// An extension value that can be written into and read back from the
/// `extnValue` OCTET STRING of a certificate.
///
/// # Example
/// ```
/// use ajetty_pki::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName {
///     dns_names: vec!["localhost".to_string()],
///     ip_addresses: vec!["127.0.0.1".parse().unwrap()],
/// };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// `extnID` of the extension.
    const OID: ObjectIdentifier;

    /// DER of the extension value, without the OCTET STRING wrapper.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError>;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError>
    where
        Self: Sized;
}

/// subjectAltName restricted to DNS names and IP addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let dns = self.dns_names.iter().map(|name| {
            Ia5String::new(name.as_str())
                .map(GeneralName::DnsName)
                .map_err(|e| PkiError::InvalidInput(format!("dNSName {name:?}: {e}")))
        });
        let ips = self.ip_addresses.iter().map(|ip| {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            Ok(GeneralName::IpAddress(OctetString::new(octets)?))
        });
        let names = dns.chain(ips).collect::<Result<Vec<_>, PkiError>>()?;
        Ok(pkix::SubjectAltName(names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let mut san = SubjectAltName::default();
        for name in pkix::SubjectAltName::from_der(extension)?.0 {
            match name {
                GeneralName::DnsName(dns) => san.dns_names.push(dns.to_string()),
                GeneralName::IpAddress(octets) => san.ip_addresses.push(ip_from_octets(octets.as_bytes())?),
                other => {
                    return Err(PkiError::CertificateError(format!(
                        "unexpected subjectAltName entry {other:?}"
                    )));
                }
            }
        }
        Ok(san)
    }
}

fn ip_from_octets(bytes: &[u8]) -> Result<IpAddr, PkiError> {
    if let Ok(v4) = <[u8; 4]>::try_from(bytes) {
        return Ok(IpAddr::from(v4));
    }
    <[u8; 16]>::try_from(bytes)
        .map(IpAddr::from)
        .map_err(|_| PkiError::CertificateError(format!("iPAddress of {} bytes", bytes.len())))
}

/// basicConstraints. Always written critical.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl BasicConstraints {
    /// cA=TRUE with the given pathLenConstraint.
    pub fn ca(path_len: u8) -> Self {
        Self {
            is_ca: true,
            max_path_length: Some(path_len),
        }
    }

    /// cA=FALSE.
    pub fn end_entity() -> Self {
        Self::default()
    }
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        Ok(pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        }
        .to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let bc = pkix::BasicConstraints::from_der(extension)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

/// keyUsage bits. Always written critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <pkix::KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        Ok(pkix::KeyUsage::from(self.0).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        Ok(Self(pkix::KeyUsage::from_der(extension)?.0))
    }
}

/// extendedKeyUsage purposes this crate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    EmailProtection,
}

const EKU_OIDS: [(ExtendedKeyUsageOption, ObjectIdentifier); 3] = [
    (ExtendedKeyUsageOption::ServerAuth, ID_KP_SERVER_AUTH),
    (ExtendedKeyUsageOption::ClientAuth, ID_KP_CLIENT_AUTH),
    (ExtendedKeyUsageOption::EmailProtection, ID_KP_EMAIL_PROTECTION),
];

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::EmailProtection => ID_KP_EMAIL_PROTECTION,
        }
    }
}

impl TryFrom<ObjectIdentifier> for ExtendedKeyUsageOption {
    type Error = PkiError;

    fn try_from(oid: ObjectIdentifier) -> Result<Self, PkiError> {
        EKU_OIDS
            .iter()
            .find(|(_, known)| *known == oid)
            .map(|(option, _)| *option)
            .ok_or_else(|| PkiError::CertificateError(format!("unknown extendedKeyUsage {oid}")))
    }
}

/// extendedKeyUsage. Written non-critical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let oids = self.usage.iter().copied().map(ObjectIdentifier::from).collect();
        Ok(pkix::ExtendedKeyUsage(oids).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let usage = pkix::ExtendedKeyUsage::from_der(extension)?
            .0
            .into_iter()
            .map(ExtendedKeyUsageOption::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Self { usage })
    }
}

/// subjectKeyIdentifier: the key identifier of the certified key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        Ok(pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let ski = pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.into_bytes()))
    }
}

/// authorityKeyIdentifier in its full form: the signer's key identifier
/// plus the issuer name and serial of the signer's own certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
    /// Written as a single directoryName.
    pub authority_cert_issuer: Option<Name>,
    /// Serial bytes as they appear in the signer's certificate.
    pub authority_cert_serial_number: Option<Vec<u8>>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, PkiError> {
        let aki = pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: self
                .authority_cert_issuer
                .as_ref()
                .map(|name| vec![GeneralName::DirectoryName(name.clone())]),
            authority_cert_serial_number: self
                .authority_cert_serial_number
                .as_deref()
                .map(SerialNumber::new)
                .transpose()?,
        };
        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, PkiError> {
        let aki = pkix::AuthorityKeyIdentifier::from_der(extension)?;
        let key_identifier = aki
            .key_identifier
            .map(OctetString::into_bytes)
            .ok_or_else(|| PkiError::CertificateError("authorityKeyIdentifier without keyIdentifier".to_string()))?;
        let authority_cert_issuer = aki.authority_cert_issuer.and_then(|names| {
            names.into_iter().find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(dn),
                _ => None,
            })
        });
        Ok(Self {
            key_identifier,
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::DistinguishedName;

    #[test]
    fn test_ca_constraints_survive_decoding() {
        let encoded = BasicConstraints::ca(0).to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(decoded, BasicConstraints::ca(0));
        assert!(!BasicConstraints::end_entity().is_ca);
    }

    #[test]
    fn test_full_authority_key_identifier() {
        let issuer = DistinguishedName::builder()
            .common_name("A-Jetty7 CA".to_string())
            .organization("A-Jetty7 CA".to_string())
            .country("RU".to_string())
            .build()
            .as_x509_name()
            .unwrap();
        let aki = AuthorityKeyIdentifier {
            key_identifier: vec![0xAB; 20],
            authority_cert_issuer: Some(issuer),
            authority_cert_serial_number: Some(vec![1]),
        };
        let encoded = aki.to_x509_extension_value().unwrap();
        assert_eq!(
            AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap(),
            aki
        );
    }

    #[test]
    fn test_key_usage_bits() {
        let ku = KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign);
        let encoded = ku.to_x509_extension_value().unwrap();
        assert_eq!(KeyUsage::from_x509_extension_value(&encoded).unwrap(), ku);
    }

    #[test]
    fn test_unknown_purpose_is_rejected() {
        let eku = pkix::ExtendedKeyUsage(vec![const_oid::db::rfc5912::ID_KP_CODE_SIGNING]);
        let encoded = eku.to_der().unwrap();
        assert!(ExtendedKeyUsage::from_x509_extension_value(&encoded).is_err());
    }

    #[test]
    fn test_localhost_san_encoding() {
        let san = SubjectAltName {
            dns_names: vec!["localhost".to_string()],
            ip_addresses: vec!["127.0.0.1".parse().unwrap()],
        };
        let encoded = san.to_x509_extension_value().unwrap();
        // [2] IA5String "localhost" followed by [7] OCTET STRING 7f000001
        assert!(encoded.windows(11).any(|w| w == b"\x82\x09localhost"));
        assert!(encoded.windows(6).any(|w| w == &[0x87u8, 0x04, 127, 0, 0, 1]));
        assert_eq!(SubjectAltName::from_x509_extension_value(&encoded).unwrap(), san);
    }
}
