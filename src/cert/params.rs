use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::asn1::PrintableStringRef;
use time::OffsetDateTime;
use x509_cert::name::RdnSequence;

use super::extensions::ToAndFromX509Extension;
use crate::error::{PkiError, Result};
use crate::key::PublicKey;

/// What an end-entity certificate is for. Decides keyUsage, extendedKeyUsage
/// and subjectAltName.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateRole {
    /// TLS server identity bound to `localhost` and `127.0.0.1`.
    HttpsServer,
    /// Identity used to sign and encrypt files exchanged with peers.
    FileExchange,
}

/// Request for a CA certificate: self-signed CA, legacy v1 root, or the
/// intermediate CA of the two-level profile.
///
/// # Fields
/// * `subject` - The distinguished name of the CA.
/// * `validity` - Validity window.
/// * `path_len` - basicConstraints pathLenConstraint.
#[derive(Clone, Debug, Builder)]
pub struct CaRequest {
    pub subject: DistinguishedName,
    pub validity: Validity,
    #[builder(default)]
    pub path_len: u8,
}

/// Request for a certificate signed by a CA. The serial number is assigned
/// by the caller and must be distinct within one keystore.
#[derive(Clone, Debug, Builder)]
pub struct EndEntityRequest {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub serial_number: u64,
    pub validity: Validity,
    pub role: CertificateRole,
}

/// Request for the intermediate CA of the two-level profile.
#[derive(Clone, Debug, Builder)]
pub struct IntermediateRequest {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub serial_number: u64,
    pub validity: Validity,
    #[builder(default)]
    pub path_len: u8,
}

/// Subject or issuer name as the provisioning profile uses it: CN is
/// mandatory, every other attribute optional. Empty components are left out
/// of the encoded name.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Encodes the name as an RDN sequence.
    ///
    /// The string form lists CN first; the encoded RDN sequence starts with C.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        use core::str::FromStr;
        let parts = [
            ("CN", Some(&self.common_name)),
            ("OU", self.organization_unit.as_ref()),
            ("O", self.organization.as_ref()),
            ("L", self.locality.as_ref()),
            ("ST", self.state.as_ref()),
            ("C", self.country.as_ref()),
        ];
        let rfc4514_name = parts
            .iter()
            .filter_map(|(key, value)| match value {
                Some(v) if !v.is_empty() => Some(format!("{key}={}", escape_rfc4514(v))),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(",");
        if rfc4514_name.is_empty() {
            return Err(PkiError::InvalidInput(
                "distinguished name has no components".to_string(),
            ));
        }
        RdnSequence::from_str(&rfc4514_name).map_err(|e| PkiError::InvalidInput(e.to_string()))
    }

    /// Reads the known attributes back out of an encoded name.
    ///
    /// Attributes other than CN, OU, O, L, ST and C are ignored.
    pub fn from_x509_name(name: &x509_cert::name::DistinguishedName) -> Self {
        let mut dn = DistinguishedName::default();
        for attr in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
            let Some(value) = attribute_string(&attr.value) else {
                continue;
            };
            match attr.oid {
                rfc4519::CN => dn.common_name = value,
                rfc4519::OU => dn.organization_unit = Some(value),
                rfc4519::O => dn.organization = Some(value),
                rfc4519::L => dn.locality = Some(value),
                rfc4519::ST => dn.state = Some(value),
                rfc4519::C => dn.country = Some(value),
                _ => {}
            }
        }
        dn
    }
}

fn attribute_string(value: &der::Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<String>() {
        return Some(s);
    }
    value
        .decode_as::<PrintableStringRef<'_>>()
        .ok()
        .map(|s| s.as_str().to_string())
}

fn escape_rfc4514(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `notBefore` / `notAfter` pair, kept at whole seconds since that is all a
/// certificate encodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Window of `days` days opening now.
    pub fn for_days(days: i64) -> Result<Self> {
        let now = now_whole_seconds()?;
        Ok(Self {
            not_before: now,
            not_after: now + time::Duration::days(days),
        })
    }

    /// Creates a validity period starting now for the given number of
    /// calendar years. February 29 becomes February 28 in a non-leap year.
    pub fn for_years(years: u32) -> Result<Self> {
        let now = now_whole_seconds()?;
        Ok(Self {
            not_before: now,
            not_after: add_years(now, years)?,
        })
    }
}

fn now_whole_seconds() -> Result<OffsetDateTime> {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .map_err(|e| PkiError::InvalidInput(e.to_string()))
}

fn add_years(start: OffsetDateTime, years: u32) -> Result<OffsetDateTime> {
    let years = i32::try_from(years).map_err(|e| PkiError::InvalidInput(e.to_string()))?;
    let year = start.year() + years;
    start
        .replace_year(year)
        .or_else(|_| start.replace_day(28).and_then(|d| d.replace_year(year)))
        .map_err(|e| PkiError::InvalidInput(format!("validity end out of range: {e}")))
}

/// A certificate extension in raw form: OID, critical flag and the DER of
/// the extnValue contents.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Encodes a typed extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        let value = extension.to_x509_extension_value()?;
        Ok(Self {
            oid: E::OID,
            critical,
            value,
        })
    }

    /// Decodes the raw value as extension `E`.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}
