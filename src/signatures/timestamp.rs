//! Signature timestamp tokens.
//!
//! A [`Timestamper`] turns a signature value into an RFC 3161-shaped
//! `TimeStampToken`: a CMS SignedData whose content is a `TSTInfo` naming
//! the time and the SHA-256 of the signature value. The token is attached
//! to the signer as the `signatureTimeStampToken` unsigned attribute.
//!
//! [`LocalClockTimestamper`] issues tokens from the local clock, signed
//! with the signer's own key. There is no time-stamping authority, so the
//! token asserts nothing a third party would trust.

use super::types::{DigestAlgorithm, SigningCredentials};
use crate::error::{Error, Result};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::ContentInfo;
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerIdentifier};
use der::asn1::{Any, GeneralizedTime, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Sequence, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::{Signature, SigningKey};
use sha2::Sha256;
use spki::AlgorithmIdentifierOwned;
use std::time::SystemTime;
use x509_cert::serial_number::SerialNumber;

/// id-aa-signatureTimeStampToken
pub const ID_AA_SIGNATURE_TIME_STAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");
/// id-ct-TSTInfo
pub const ID_CT_TST_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
/// Policy named by locally issued tokens.
pub const LOCAL_TSA_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1.1");
/// id-signedData
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

/// `MessageImprint ::= SEQUENCE { hashAlgorithm, hashedMessage }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    /// Digest algorithm
    pub hash_algorithm: AlgorithmIdentifierOwned,
    /// Digest of the timestamped data
    pub hashed_message: OctetString,
}

/// The mandatory fields of an RFC 3161 `TSTInfo`.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    /// Always 1
    pub version: u8,
    /// TSA policy
    pub policy: ObjectIdentifier,
    /// What was timestamped
    pub message_imprint: MessageImprint,
    /// Token serial number
    pub serial_number: SerialNumber,
    /// When
    pub gen_time: GeneralizedTime,
}

/// Produces timestamp tokens for signature values.
pub trait Timestamper {
    /// DER-encoded `TimeStampToken` (a CMS ContentInfo) over `signature_value`.
    fn timestamp(&self, signature_value: &[u8], credentials: &SigningCredentials) -> Result<Vec<u8>>;
}

/// Issues tokens from the local clock, signed with the signer's key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClockTimestamper;

impl Timestamper for LocalClockTimestamper {
    fn timestamp(&self, signature_value: &[u8], credentials: &SigningCredentials) -> Result<Vec<u8>> {
        let mut serial = [0u8; 8];
        OsRng.fill_bytes(&mut serial);
        serial[0] &= 0x7F;
        serial[0] |= 0x01;

        let tst_info = TstInfo {
            version: 1,
            policy: LOCAL_TSA_POLICY,
            message_imprint: imprint(signature_value)?,
            serial_number: SerialNumber::new(&serial).map_err(asn1)?,
            gen_time: GeneralizedTime::from_system_time(SystemTime::now()).map_err(asn1)?,
        };
        let econtent = Any::new(Tag::OctetString, tst_info.to_der().map_err(asn1)?).map_err(asn1)?;
        let content = EncapsulatedContentInfo {
            econtent_type: ID_CT_TST_INFO,
            econtent: Some(econtent),
        };

        let certificate = credentials.certificate.clone();
        let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: certificate.tbs_certificate.issuer.clone(),
            serial_number: certificate.tbs_certificate.serial_number.clone(),
        });
        let signer = SigningKey::<Sha256>::new(credentials.private_key.clone());
        let signer_info = SignerInfoBuilder::new(&signer, sid, digest_identifier(), &content, None)
            .map_err(|e| Error::Signing(format!("timestamp signer: {:?}", e)))?;

        let token = SignedDataBuilder::new(&content)
            .add_digest_algorithm(digest_identifier())
            .and_then(|b| b.add_certificate(CertificateChoices::Certificate(certificate)))
            .and_then(|b| b.add_signer_info::<SigningKey<Sha256>, Signature>(signer_info))
            .and_then(|b| b.build())
            .map_err(|e| Error::Signing(format!("timestamp token: {:?}", e)))?;
        log::debug!("issued local timestamp token");
        token.to_der().map_err(asn1)
    }
}

/// What a token found on a signature says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampCheck {
    /// Whether the token's imprint matches the signature value
    pub imprint_matches: bool,
    /// `genTime` of the token
    pub gen_time: GeneralizedTime,
}

/// Decode a `TimeStampToken` and compare its imprint with `signature_value`.
pub fn check_token(token: &Any, signature_value: &[u8]) -> Result<TimestampCheck> {
    let content_info: ContentInfo = token.decode_as().map_err(asn1)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Signing("timestamp token is not SignedData".to_string()));
    }
    let signed_data: SignedData = content_info.content.decode_as().map_err(asn1)?;
    let encap = &signed_data.encap_content_info;
    if encap.econtent_type != ID_CT_TST_INFO {
        return Err(Error::Signing("timestamp token does not carry TSTInfo".to_string()));
    }
    let econtent = encap
        .econtent
        .as_ref()
        .ok_or_else(|| Error::Signing("timestamp token has no content".to_string()))?;
    let tst_info = TstInfo::from_der(econtent.value()).map_err(asn1)?;

    let imprint = &tst_info.message_imprint;
    let imprint_matches = match DigestAlgorithm::from_oid(&imprint.hash_algorithm.oid) {
        Some(alg) => alg.digest(signature_value) == imprint.hashed_message.as_bytes(),
        None => false,
    };
    Ok(TimestampCheck {
        imprint_matches,
        gen_time: tst_info.gen_time,
    })
}

fn imprint(signature_value: &[u8]) -> Result<MessageImprint> {
    Ok(MessageImprint {
        hash_algorithm: digest_identifier(),
        hashed_message: OctetString::new(DigestAlgorithm::Sha256.digest(signature_value)).map_err(asn1)?,
    })
}

fn digest_identifier() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: DigestAlgorithm::Sha256.oid(),
        parameters: None,
    }
}

fn asn1(e: der::Error) -> Error {
    Error::Signing(format!("ASN.1: {}", e))
}
