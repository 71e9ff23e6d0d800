use std::net::{IpAddr, Ipv4Addr};

use crate::cert::Certificate;
use crate::cert::builder::CertificateBuilder;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificateRole, EndEntityRequest, IntermediateRequest};
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::provider::CryptoProvider;

/// DNS name bound into the HTTPS server certificate.
pub const LOCALHOST_DNS: &str = "localhost";
/// IP address bound into the HTTPS server certificate.
pub const LOCALHOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Represents an entity capable of issuing certificates.
///
/// The issued certificate's issuer name is copied from the subject of
/// [`Issuer::issuer_certificate`], and its authorityKeyIdentifier points at
/// that certificate.
pub trait Issuer {
    /// The certificate of the issuing CA.
    fn issuer_certificate(&self) -> &Certificate;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// authorityKeyIdentifier for certificates signed by this issuer: key
    /// identifier, issuer name and serial of the issuing certificate.
    fn authority_key_identifier(&self) -> Result<AuthorityKeyIdentifier> {
        let cert = self.issuer_certificate();
        Ok(AuthorityKeyIdentifier {
            key_identifier: cert.key_identifier()?,
            authority_cert_issuer: Some(cert.issuer().clone()),
            authority_cert_serial_number: Some(
                cert.inner.tbs_certificate.serial_number.as_bytes().to_vec(),
            ),
        })
    }

    /// Issues an end-entity certificate.
    ///
    /// Both roles get authorityKeyIdentifier, subjectKeyIdentifier,
    /// basicConstraints cA=false (critical) and keyUsage digitalSignature +
    /// keyEncipherment (critical). [`CertificateRole::HttpsServer`] adds
    /// extendedKeyUsage serverAuth and a subjectAltName for `localhost` and
    /// `127.0.0.1`.
    fn issue_end_entity(
        &self,
        request: &EndEntityRequest,
        provider: &dyn CryptoProvider,
    ) -> Result<Certificate> {
        let issuer = self.issuer_certificate();
        check_serial(issuer, request.serial_number)?;

        let mut builder = CertificateBuilder::new()
            .serial_number(request.serial_number)
            .issuer(issuer.subject().clone())
            .subject(request.subject.as_x509_name()?)
            .validity(request.validity.clone())
            .public_key(request.subject_public_key.clone())
            .add_extension(self.authority_key_identifier()?, false)?
            .add_extension(
                SubjectKeyIdentifier(request.subject_public_key.key_identifier()?),
                false,
            )?
            .add_extension(BasicConstraints::end_entity(), true)?
            .add_extension(
                KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
                true,
            )?;

        if request.role == CertificateRole::HttpsServer {
            builder = builder
                .add_extension(
                    ExtendedKeyUsage {
                        usage: vec![ExtendedKeyUsageOption::ServerAuth],
                    },
                    false,
                )?
                .add_extension(
                    SubjectAltName {
                        dns_names: vec![LOCALHOST_DNS.to_string()],
                        ip_addresses: vec![LOCALHOST_IP],
                    },
                    false,
                )?;
        }

        let cert = builder.sign(self.signing_key(), provider)?;
        tracing::debug!(
            serial = request.serial_number,
            subject = %request.subject.common_name,
            role = ?request.role,
            ski = %hex::encode(request.subject_public_key.key_identifier()?),
            "issued end-entity certificate"
        );
        Ok(cert)
    }

    /// Issues the intermediate CA of the two-level profile.
    ///
    /// Extensions: authorityKeyIdentifier, subjectKeyIdentifier,
    /// basicConstraints cA=true (critical) and keyUsage digitalSignature +
    /// keyCertSign + cRLSign (critical).
    fn issue_intermediate_ca(
        &self,
        request: &IntermediateRequest,
        provider: &dyn CryptoProvider,
    ) -> Result<Certificate> {
        let issuer = self.issuer_certificate();
        check_serial(issuer, request.serial_number)?;

        let cert = CertificateBuilder::new()
            .serial_number(request.serial_number)
            .issuer(issuer.subject().clone())
            .subject(request.subject.as_x509_name()?)
            .validity(request.validity.clone())
            .public_key(request.subject_public_key.clone())
            .add_extension(self.authority_key_identifier()?, false)?
            .add_extension(
                SubjectKeyIdentifier(request.subject_public_key.key_identifier()?),
                false,
            )?
            .add_extension(BasicConstraints::ca(request.path_len), true)?
            .add_extension(
                KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyCertSign | KeyUsages::CRLSign),
                true,
            )?
            .sign(self.signing_key(), provider)?;
        tracing::debug!(
            serial = request.serial_number,
            subject = %request.subject.common_name,
            "issued intermediate CA certificate"
        );
        Ok(cert)
    }
}

fn check_serial(issuer: &Certificate, serial: u64) -> Result<()> {
    if issuer.serial_number()? == serial {
        return Err(PkiError::InvalidInput(format!(
            "serial number {serial} is already used by the issuer"
        )));
    }
    Ok(())
}
