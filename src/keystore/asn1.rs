//! ASN.1 structures of a PKCS#12 file (RFC 7292) and the PKCS#7 pieces it
//! borrows (RFC 2315).

use der::asn1::{BmpString, OctetString, SetOfVec};
use der::{Any, Decode, Encode, Sequence};
use x509_cert::attr::Attribute;
use x509_cert::spki::AlgorithmIdentifierOwned;

use super::oid;
use crate::error::{PkiError, Result};

/// PFX version written and accepted.
pub const PFX_VERSION: u8 = 3;

/// ```text
/// PFX ::= SEQUENCE {
///     version     INTEGER {v3(3)}(v3,...),
///     authSafe    ContentInfo,
///     macData     MacData OPTIONAL
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Pfx {
    pub version: u8,
    pub auth_safe: ContentInfo,
    pub mac_data: Option<MacData>,
}

/// ```text
/// ContentInfo ::= SEQUENCE {
///     contentType ContentType,
///     content     [0] EXPLICIT ANY DEFINED BY contentType OPTIONAL
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ContentInfo {
    pub content_type: der::asn1::ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    pub content: Any,
}

impl ContentInfo {
    /// `data` content wrapping `payload` in an OCTET STRING.
    pub fn data(payload: Vec<u8>) -> Result<Self> {
        Ok(Self {
            content_type: oid::DATA,
            content: Any::encode_from(&OctetString::new(payload)?)?,
        })
    }

    pub fn encrypted(content: &EncryptedData) -> Result<Self> {
        Ok(Self {
            content_type: oid::ENCRYPTED_DATA,
            content: Any::encode_from(content)?,
        })
    }

    /// Contents of a `data` ContentInfo.
    pub fn data_payload(&self) -> Result<Vec<u8>> {
        if self.content_type != oid::DATA {
            return Err(PkiError::DecodingError(format!(
                "expected data content, found {}",
                self.content_type
            )));
        }
        Ok(self.content.decode_as::<OctetString>()?.into_bytes())
    }
}

/// ```text
/// EncryptedData ::= SEQUENCE {
///     version              INTEGER (0),
///     encryptedContentInfo EncryptedContentInfo
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EncryptedData {
    pub version: u8,
    pub encrypted_content_info: EncryptedContentInfo,
}

/// ```text
/// EncryptedContentInfo ::= SEQUENCE {
///     contentType                ContentType,
///     contentEncryptionAlgorithm ContentEncryptionAlgorithmIdentifier,
///     encryptedContent           [0] IMPLICIT EncryptedContent OPTIONAL
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EncryptedContentInfo {
    pub content_type: der::asn1::ObjectIdentifier,
    pub content_encryption_algorithm: AlgorithmIdentifierOwned,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub encrypted_content: Option<OctetString>,
}

/// ```text
/// SafeBag ::= SEQUENCE {
///     bagId         BAG-TYPE.&id ({PKCS12BagSet}),
///     bagValue      [0] EXPLICIT BAG-TYPE.&Type({PKCS12BagSet}{@bagId}),
///     bagAttributes SET OF PKCS12Attribute OPTIONAL
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SafeBag {
    pub bag_id: der::asn1::ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    pub bag_value: Any,
    pub bag_attributes: Option<SetOfVec<Attribute>>,
}

/// `SafeContents ::= SEQUENCE OF SafeBag`
pub type SafeContents = Vec<SafeBag>;

/// `AuthenticatedSafe ::= SEQUENCE OF ContentInfo`
pub type AuthenticatedSafe = Vec<ContentInfo>;

impl SafeBag {
    /// The first value of the attribute `attr_oid`, if present.
    pub fn attribute(&self, attr_oid: der::asn1::ObjectIdentifier) -> Option<&Any> {
        self.bag_attributes
            .as_ref()?
            .iter()
            .find(|attr| attr.oid == attr_oid)
            .and_then(|attr| attr.values.iter().next())
    }

    pub fn friendly_name(&self) -> Result<Option<String>> {
        self.attribute(oid::FRIENDLY_NAME)
            .map(|value| Ok(value.decode_as::<BmpString>()?.to_string()))
            .transpose()
    }

    pub fn local_key_id(&self) -> Result<Option<Vec<u8>>> {
        self.attribute(oid::LOCAL_KEY_ID)
            .map(|value| Ok(value.decode_as::<OctetString>()?.into_bytes()))
            .transpose()
    }
}

/// ```text
/// CertBag ::= SEQUENCE {
///     certId    BAG-TYPE.&id   ({CertTypes}),
///     certValue [0] EXPLICIT BAG-TYPE.&Type ({CertTypes}{@certId})
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertBag {
    pub cert_id: der::asn1::ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    pub cert_value: OctetString,
}

/// ```text
/// MacData ::= SEQUENCE {
///     mac        DigestInfo,
///     macSalt    OCTET STRING,
///     iterations INTEGER DEFAULT 1
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MacData {
    pub mac: DigestInfo,
    pub mac_salt: OctetString,
    #[asn1(default = "default_mac_iterations")]
    pub iterations: u32,
}

fn default_mac_iterations() -> u32 {
    1
}

/// ```text
/// DigestInfo ::= SEQUENCE {
///     digestAlgorithm DigestAlgorithmIdentifier,
///     digest          Digest
/// }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DigestInfo {
    pub digest_algorithm: AlgorithmIdentifierOwned,
    pub digest: OctetString,
}

/// Single-valued bag attribute.
pub fn attribute(attr_oid: der::asn1::ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid: attr_oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// friendlyName attribute holding `alias` as a BMPString.
pub fn friendly_name(alias: &str) -> Result<Attribute> {
    let name = BmpString::from_utf8(alias)?;
    attribute(oid::FRIENDLY_NAME, Any::encode_from(&name)?)
}

/// localKeyId attribute.
pub fn local_key_id(id: &[u8]) -> Result<Attribute> {
    attribute(oid::LOCAL_KEY_ID, Any::encode_from(&OctetString::new(id)?)?)
}

/// Converts between the algorithm identifier stored in the file and the
/// borrowed forms used by `pkcs5`.
pub fn to_algorithm_identifier<T: Encode>(value: &T) -> Result<AlgorithmIdentifierOwned> {
    let der = value
        .to_der()
        .map_err(|e| PkiError::EncodingError(e.to_string()))?;
    Ok(AlgorithmIdentifierOwned::from_der(&der)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bag_attributes_are_found() {
        let bag = SafeBag {
            bag_id: oid::CERT_BAG,
            bag_value: Any::encode_from(&OctetString::new(vec![1u8, 2, 3]).unwrap()).unwrap(),
            bag_attributes: Some(
                SetOfVec::try_from(vec![
                    friendly_name("AJettyHttps1").unwrap(),
                    local_key_id(&[9, 9, 9]).unwrap(),
                ])
                .unwrap(),
            ),
        };
        let der = bag.to_der().unwrap();
        let decoded = SafeBag::from_der(&der).unwrap();
        assert_eq!(decoded.friendly_name().unwrap().as_deref(), Some("AJettyHttps1"));
        assert_eq!(decoded.local_key_id().unwrap(), Some(vec![9, 9, 9]));
    }

    #[test]
    fn test_bag_without_attributes() {
        let bag = SafeBag {
            bag_id: oid::CERT_BAG,
            bag_value: Any::encode_from(&OctetString::new(vec![7u8]).unwrap()).unwrap(),
            bag_attributes: None,
        };
        let decoded = SafeBag::from_der(&bag.to_der().unwrap()).unwrap();
        assert_eq!(decoded.friendly_name().unwrap(), None);
        assert_eq!(decoded.local_key_id().unwrap(), None);
    }

    #[test]
    fn test_mac_iterations_default_to_one() {
        let mac = MacData {
            mac: DigestInfo {
                digest_algorithm: AlgorithmIdentifierOwned {
                    oid: oid::SHA256,
                    parameters: None,
                },
                digest: OctetString::new(vec![0u8; 32]).unwrap(),
            },
            mac_salt: OctetString::new(vec![1u8; 16]).unwrap(),
            iterations: 1,
        };
        let der = mac.to_der().unwrap();
        let decoded = MacData::from_der(&der).unwrap();
        assert_eq!(decoded.iterations, 1);
    }
}
