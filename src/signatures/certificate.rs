//! Self-signed signing certificates.
//!
//! A fresh certificate is issued for every signing operation. Subject and
//! issuer are the same common name, the validity window runs from one day in
//! the past to ten years ahead (both configurable), and the extensions mark
//! the key for document signing:
//!
//! - KeyUsage: digitalSignature, nonRepudiation (critical)
//! - ExtendedKeyUsage: codeSigning, timeStamping (non-critical)

use super::types::{DigestAlgorithm, SigningCredentials};
use crate::config::SealConfig;
use crate::error::{Error, Result};
use der::asn1::{Any, ObjectIdentifier, SetOfVec, UtcTime};
use const_oid::AssociatedOid;
use der::{Encode, Length, Tag, Writer};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier;
use spki::SubjectPublicKeyInfoOwned;
use std::time::{Duration, SystemTime};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::ext::pkix::{ExtendedKeyUsage, KeyUsage, KeyUsages};
use x509_cert::ext::{AsExtension, Extension};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

/// id-kp-codeSigning
pub const ID_KP_CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
/// id-kp-timeStamping
pub const ID_KP_TIME_STAMPING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");

/// id-at-commonName
pub const ID_AT_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

const SECONDS_PER_DAY: u64 = 86_400;

/// ExtendedKeyUsage encoded with the critical flag cleared.
///
/// `x509-cert` marks an EKU without `anyExtendedKeyUsage` as critical.
struct NonCriticalEku(ExtendedKeyUsage);

impl AssociatedOid for NonCriticalEku {
    const OID: ObjectIdentifier = ExtendedKeyUsage::OID;
}

impl Encode for NonCriticalEku {
    fn encoded_len(&self) -> der::Result<Length> {
        self.0.encoded_len()
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.0.encode(writer)
    }
}

impl AsExtension for NonCriticalEku {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

/// Issue a self-signed certificate for `private_key`.
pub fn issue(private_key: &RsaPrivateKey, config: &SealConfig) -> Result<Certificate> {
    let now = SystemTime::now();
    let not_before = now - Duration::from_secs(config.validity_backdate_days as u64 * SECONDS_PER_DAY);
    let not_after = now + Duration::from_secs(config.validity_days as u64 * SECONDS_PER_DAY);
    let validity = Validity {
        not_before: utc_time(not_before)?,
        not_after: utc_time(not_after)?,
    };

    let subject = subject_name(&config.signer_name)?;
    let public_key = private_key.to_public_key();
    let spki = SubjectPublicKeyInfoOwned::from_key(public_key)
        .map_err(|e| Error::Certificate(format!("public key encoding: {}", e)))?;

    let signer = SigningKey::<Sha256>::new(private_key.clone());
    let mut builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        random_serial()?,
        validity,
        subject,
        spki,
        &signer,
    )
    .map_err(|e| Error::Certificate(e.to_string()))?;

    builder
        .add_extension(&KeyUsage(KeyUsages::DigitalSignature | KeyUsages::NonRepudiation))
        .map_err(|e| Error::Certificate(e.to_string()))?;
    builder
        .add_extension(&NonCriticalEku(ExtendedKeyUsage(vec![
            ID_KP_CODE_SIGNING,
            ID_KP_TIME_STAMPING,
        ])))
        .map_err(|e| Error::Certificate(e.to_string()))?;

    let certificate = builder
        .build::<Signature>()
        .map_err(|e| Error::Certificate(e.to_string()))?;
    log::debug!(
        "issued certificate for {} valid {} days",
        config.signer_name,
        config.validity_days
    );
    Ok(certificate)
}

/// Issue a certificate and pair it with its key.
pub fn issue_credentials(private_key: &RsaPrivateKey, config: &SealConfig) -> Result<SigningCredentials> {
    Ok(SigningCredentials::new(issue(private_key, config)?, private_key.clone()))
}

/// The RSA public key a certificate certifies.
pub fn public_key(certificate: &Certificate) -> Result<RsaPublicKey> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|_| Error::PublicKeyInvalid)
}

/// Whether `certificate` carries a valid signature by `issuer_key`.
///
/// For a self-signed certificate this is the trust anchor check.
pub fn verify_signed_by(certificate: &Certificate, issuer_key: &RsaPublicKey) -> Result<bool> {
    let Some(digest) = DigestAlgorithm::from_rsa_signature_oid(&certificate.signature_algorithm.oid) else {
        log::warn!(
            "certificate signature algorithm {} is not RSA PKCS#1 v1.5",
            certificate.signature_algorithm.oid
        );
        return Ok(false);
    };
    let tbs = certificate
        .tbs_certificate
        .to_der()
        .map_err(|e| Error::Certificate(e.to_string()))?;
    let Some(signature_bytes) = certificate.signature.as_bytes() else {
        return Ok(false);
    };
    Ok(verify_rsa(digest, issuer_key, &tbs, signature_bytes))
}

/// Verify an RSA PKCS#1 v1.5 signature over `message`.
pub(crate) fn verify_rsa(digest: DigestAlgorithm, key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    let key = key.clone();
    match digest {
        DigestAlgorithm::Sha256 => VerifyingKey::<Sha256>::new(key).verify(message, &signature).is_ok(),
        DigestAlgorithm::Sha384 => VerifyingKey::<Sha384>::new(key).verify(message, &signature).is_ok(),
        DigestAlgorithm::Sha512 => VerifyingKey::<Sha512>::new(key).verify(message, &signature).is_ok(),
    }
}

/// Common name from a certificate name, if present.
pub fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == ID_AT_COMMON_NAME)
        .and_then(|atv| {
            atv.value
                .decode_as::<der::asn1::Utf8StringRef<'_>>()
                .map(|s| s.as_str().to_string())
                .or_else(|_| {
                    atv.value
                        .decode_as::<der::asn1::PrintableStringRef<'_>>()
                        .map(|s| s.as_str().to_string())
                })
                .ok()
        })
}

fn utc_time(at: SystemTime) -> Result<Time> {
    UtcTime::from_system_time(at)
        .map(Time::UtcTime)
        .map_err(|e| Error::Certificate(format!("validity time: {}", e)))
}

/// Single-RDN name `CN=<common_name>`, encoded as a UTF8String.
fn subject_name(common_name: &str) -> Result<Name> {
    if common_name.trim().is_empty() {
        return Err(Error::Certificate("signer name must not be empty".to_string()));
    }
    let value = Any::new(Tag::Utf8String, common_name.as_bytes())
        .map_err(|e| Error::Certificate(format!("subject name: {}", e)))?;
    let atv = AttributeTypeAndValue { oid: ID_AT_COMMON_NAME, value };
    let rdn = SetOfVec::try_from(vec![atv])
        .map(RelativeDistinguishedName)
        .map_err(|e| Error::Certificate(format!("subject name: {}", e)))?;
    Ok(RdnSequence(vec![rdn]))
}

/// Positive 16-byte serial number.
fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7F;
    bytes[0] |= 0x01;
    SerialNumber::new(&bytes).map_err(|e| Error::Certificate(format!("serial number: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use std::sync::OnceLock;
    use x509_cert::ext::pkix::ExtendedKeyUsage;

    fn key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
    }

    #[test]
    fn test_self_signed_structure() {
        let config = SealConfig::new();
        let cert = issue(key(), &config).unwrap();
        let tbs = &cert.tbs_certificate;
        assert_eq!(tbs.subject, tbs.issuer);
        assert_eq!(common_name(&tbs.subject).as_deref(), Some(config.signer_name.as_str()));
        assert_eq!(cert.signature_algorithm.oid, crate::signatures::types::SHA_256_WITH_RSA);

        let embedded = public_key(&cert).unwrap();
        assert_eq!(embedded.n(), key().to_public_key().n());
        assert!(verify_signed_by(&cert, &embedded).unwrap());
    }

    #[test]
    fn test_validity_window() {
        let cert = issue(key(), &SealConfig::new()).unwrap();
        let validity = &cert.tbs_certificate.validity;
        let now = SystemTime::now();
        let not_before = validity.not_before.to_system_time();
        let not_after = validity.not_after.to_system_time();
        let backdate = now.duration_since(not_before).unwrap().as_secs();
        assert!((SECONDS_PER_DAY - 60..=SECONDS_PER_DAY + 60).contains(&backdate));
        let ahead = not_after.duration_since(now).unwrap().as_secs();
        assert!((3650 * SECONDS_PER_DAY - 60..=3650 * SECONDS_PER_DAY + 60).contains(&ahead));
    }

    #[test]
    fn test_extensions() {
        let cert = issue(key(), &SealConfig::new()).unwrap();
        let extensions = cert.tbs_certificate.extensions.as_ref().unwrap();
        let key_usage = extensions
            .iter()
            .find(|e| e.extn_id == ObjectIdentifier::new_unwrap("2.5.29.15"))
            .unwrap();
        assert!(key_usage.critical);
        let eku = extensions
            .iter()
            .find(|e| e.extn_id == ObjectIdentifier::new_unwrap("2.5.29.37"))
            .unwrap();
        assert!(!eku.critical);
        let eku = <ExtendedKeyUsage as der::Decode>::from_der(eku.extn_value.as_bytes()).unwrap();
        assert_eq!(eku.0, vec![ID_KP_CODE_SIGNING, ID_KP_TIME_STAMPING]);
    }

    #[test]
    fn test_serials_differ_and_are_positive() {
        let a = issue(key(), &SealConfig::new()).unwrap();
        let b = issue(key(), &SealConfig::new()).unwrap();
        assert_ne!(a.tbs_certificate.serial_number, b.tbs_certificate.serial_number);
        assert!(a.tbs_certificate.serial_number.as_bytes()[0] < 0x80);
    }

    #[test]
    fn test_custom_signer_name() {
        let config = SealConfig::new().with_signer_name("Doe, Jane + Co");
        let cert = issue(key(), &config).unwrap();
        assert_eq!(common_name(&cert.tbs_certificate.subject).as_deref(), Some("Doe, Jane + Co"));
        assert!(subject_name("  ").is_err());
    }

    #[test]
    fn test_foreign_key_does_not_verify() {
        let other = RsaPrivateKey::new(&mut OsRng, 2048).unwrap().to_public_key();
        let cert = issue(key(), &SealConfig::new()).unwrap();
        assert!(!verify_signed_by(&cert, &other).unwrap());
    }
}
