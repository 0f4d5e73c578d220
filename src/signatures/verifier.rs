//! PDF signature verification.
//!
//! Verification looks at the first embedded signature only. The checks run
//! in a fixed order and stop at the first failure:
//!
//! 1. identity: the certificate's public key must equal the expected key
//! 2. trust: the self-signed certificate must verify under its own key
//! 3. coverage: the ByteRange must span the whole file except `/Contents`
//! 4. integrity: the digest of the covered bytes must match the signed
//!    `messageDigest`, and the RSA signature over the signed attributes
//!    must verify
//!
//! The timestamp token, when present, is checked last and only produces a
//! warning.

use super::byterange::ByteRangeCalculator;
use super::certificate::{self, common_name};
use super::timestamp::{check_token, ID_AA_SIGNATURE_TIME_STAMP_TOKEN};
use super::types::{
    DigestAlgorithm, SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus,
};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::keys::keypair::same_public_key;
use crate::object::{Dictionary, Object};
use crate::parser::decode_hex;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Encode, SliceReader};
use rsa::RsaPublicKey;
use std::path::Path;
use std::time::SystemTime;
use x509_cert::Certificate;

/// id-messageDigest
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// Verifier for PDF digital signatures.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    expected_key: Option<RsaPublicKey>,
}

impl SignatureVerifier {
    /// Create a verifier that reports on signatures without an identity check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the signature to be made with `key`.
    pub fn with_expected_key(mut self, key: RsaPublicKey) -> Self {
        self.expected_key = Some(key);
        self
    }

    /// Verify the first signature of the PDF at `path`.
    pub fn verify_file(&self, path: &Path) -> Result<VerificationResult> {
        let data = std::fs::read(path)?;
        self.verify_bytes(&data)
    }

    /// Verify the first signature of a PDF held in memory.
    ///
    /// Structural read errors and a missing signature are errors; everything
    /// else is reported through [`VerificationResult::status`].
    pub fn verify_bytes(&self, pdf: &[u8]) -> Result<VerificationResult> {
        let document = PdfDocument::from_bytes(pdf.to_vec())?;
        let field = document
            .signature_fields()?
            .into_iter()
            .next()
            .ok_or(Error::NoSignatureFound)?;

        let mut result = VerificationResult {
            signature_info: self.extract_signature_info(&field.value),
            ..VerificationResult::default()
        };
        result.signature_info.field_name = field.name;

        let Some(contents) = field.value.get("Contents").and_then(Object::as_string) else {
            return Ok(invalid(result, "signature dictionary has no /Contents"));
        };
        let signed_data = match decode_signed_data(contents) {
            Ok(signed_data) => signed_data,
            Err(e) => {
                log::warn!("malformed signature container: {}", e);
                return Ok(invalid(result, format!("malformed signature container: {}", e)));
            },
        };
        let Some(signer) = signed_data.signer_infos.0.iter().next() else {
            return Ok(invalid(result, "signature container has no signer"));
        };
        let Some(cert) = signer_certificate(&signed_data, signer) else {
            return Ok(invalid(result, "signature container has no certificate"));
        };
        describe_certificate(cert, &mut result.signature_info);
        result.signature_info.digest_algorithm = DigestAlgorithm::from_oid(&signer.digest_alg.oid);

        let embedded_key = match certificate::public_key(cert) {
            Ok(key) => key,
            Err(e) => return Ok(invalid(result, format!("certificate key: {}", e))),
        };
        if let Some(expected) = &self.expected_key {
            if !same_public_key(expected, &embedded_key) {
                log::info!("signature key does not match the expected public key");
                result.status = VerificationStatus::KeyMismatch;
                result
                    .messages
                    .push("Signer key differs from the expected public key".to_string());
                return Ok(result);
            }
            result.identity_matches = true;
        }

        result.certificate_trusted = certificate::verify_signed_by(cert, &embedded_key)?;
        if !result.certificate_trusted {
            return Ok(invalid(result, "certificate does not verify under its own key"));
        }
        result.certificate_expired =
            cert.tbs_certificate.validity.not_after.to_system_time() < SystemTime::now();

        let byte_range = match byte_range_array(&result.signature_info.byte_range) {
            Some(br) => br,
            None => return Ok(invalid(result, "ByteRange must have four integers")),
        };
        match ByteRangeCalculator::validate_byte_range(&byte_range, pdf) {
            Ok(gap) if decode_hex(gap) == contents => {},
            Ok(_) => {
                result.document_modified = true;
                return Ok(invalid(result, "ByteRange gap is not the signature contents"));
            },
            Err(e) => {
                result.document_modified = true;
                return Ok(invalid(result, format!("ByteRange validation failed: {}", e)));
            },
        }

        let Some(digest_algorithm) = result.signature_info.digest_algorithm else {
            return Ok(invalid(
                result,
                format!("unsupported digest algorithm {}", signer.digest_alg.oid),
            ));
        };
        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(pdf, &byte_range)?;
        let digest = digest_algorithm.digest(&signed_bytes);
        if let Err(reason) = check_integrity(signer, digest_algorithm, &digest, &embedded_key) {
            result.document_modified = true;
            return Ok(invalid(result, reason));
        }

        result.status = VerificationStatus::Valid;
        check_timestamp(signer, &mut result);
        if result.certificate_expired {
            result.status = VerificationStatus::ValidWithWarnings;
            result.messages.push("Certificate has expired".to_string());
        }
        log::info!(
            "signature {} verified: {:?}",
            result.signature_info.field_name,
            result.status
        );
        Ok(result)
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, dict: &Dictionary) -> SignatureInfo {
        let text = |key: &str| dict.get(key).and_then(Object::as_string).map(decode_text_string);
        let byte_range: Vec<i64> = match dict.get("ByteRange") {
            Some(Object::Array(items)) => items.iter().filter_map(Object::as_integer).collect(),
            _ => Vec::new(),
        };

        SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            covers_whole_document: byte_range.len() == 4,
            byte_range,
            ..SignatureInfo::default()
        }
    }
}

/// Verify the first signature of `pdf_path` against `public_key`.
///
/// Returns `Ok(false)` when the signature was made with another key or the
/// signed bytes were changed. A PDF without signatures is
/// [`Error::NoSignatureFound`]; unreadable files propagate their error.
pub fn verify(public_key: &RsaPublicKey, pdf_path: &Path) -> Result<bool> {
    let result = SignatureVerifier::new()
        .with_expected_key(public_key.clone())
        .verify_file(pdf_path)?;
    for message in &result.messages {
        log::debug!("{}", message);
    }
    Ok(result.status.is_ok())
}

/// Describe the first signature of `pdf_path` without an identity check.
pub fn inspect(pdf_path: &Path) -> Result<VerificationResult> {
    SignatureVerifier::new().verify_file(pdf_path)
}

fn invalid(mut result: VerificationResult, reason: impl Into<String>) -> VerificationResult {
    let reason = reason.into();
    log::info!("signature rejected: {}", reason);
    result.status = VerificationStatus::Invalid;
    result.messages.push(reason);
    result
}

/// Decode the SignedData inside `/Contents`, ignoring the zero padding
/// that fills the rest of the placeholder.
fn decode_signed_data(contents: &[u8]) -> der::Result<SignedData> {
    let mut reader = SliceReader::new(contents)?;
    let content_info = ContentInfo::decode(&mut reader)?;
    content_info.content.decode_as()
}

/// The certificate named by the signer identifier, else the first one.
fn signer_certificate<'a>(signed_data: &'a SignedData, signer: &SignerInfo) -> Option<&'a Certificate> {
    let certificates: Vec<&Certificate> = signed_data
        .certificates
        .as_ref()?
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect();

    let named = match &signer.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => certificates.iter().find(|cert| {
            cert.tbs_certificate.serial_number == id.serial_number
                && cert.tbs_certificate.issuer == id.issuer
        }),
        SignerIdentifier::SubjectKeyIdentifier(_) => None,
    };
    named.or_else(|| certificates.first()).copied()
}

fn describe_certificate(cert: &Certificate, info: &mut SignatureInfo) {
    info.certificate_cn = common_name(&cert.tbs_certificate.subject);
    let Ok(der) = cert.to_der() else {
        return;
    };
    match x509_parser::parse_x509_certificate(&der) {
        Ok((_, parsed)) => {
            info.certificate_issuer = Some(parsed.issuer().to_string());
            info.valid_from = Some(parsed.validity().not_before.to_string());
            info.valid_to = Some(parsed.validity().not_after.to_string());
        },
        Err(e) => log::debug!("could not describe certificate: {}", e),
    }
}

fn byte_range_array(values: &[i64]) -> Option<[i64; 4]> {
    values.try_into().ok()
}

/// Check the signed digest and the RSA signature of `signer`.
fn check_integrity(
    signer: &SignerInfo,
    digest_algorithm: DigestAlgorithm,
    digest: &[u8],
    key: &RsaPublicKey,
) -> std::result::Result<(), String> {
    let signature = signer.signature.as_bytes();
    let Some(signed_attrs) = &signer.signed_attrs else {
        return Err("signer has no signed attributes".to_string());
    };

    let message_digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .and_then(|value| value.decode_as::<OctetString>().ok())
        .ok_or_else(|| "signed attributes have no message digest".to_string())?;
    if message_digest.as_bytes() != digest {
        return Err("document digest does not match the signed digest".to_string());
    }

    let encoded = signed_attrs
        .to_der()
        .map_err(|e| format!("signed attributes: {}", e))?;
    if certificate::verify_rsa(digest_algorithm, key, &encoded, signature) {
        Ok(())
    } else {
        Err("RSA signature does not verify".to_string())
    }
}

fn check_timestamp(signer: &SignerInfo, result: &mut VerificationResult) {
    let token = signer
        .unsigned_attrs
        .as_ref()
        .and_then(|attrs| attrs.iter().find(|attr| attr.oid == ID_AA_SIGNATURE_TIME_STAMP_TOKEN))
        .and_then(|attr| attr.values.iter().next());
    let Some(token) = token else {
        return;
    };

    result.signature_info.has_timestamp = true;
    match check_token(token, signer.signature.as_bytes()) {
        Ok(check) if check.imprint_matches => result.timestamp_valid = Some(true),
        Ok(_) => {
            result.timestamp_valid = Some(false);
            result.status = VerificationStatus::ValidWithWarnings;
            result
                .messages
                .push("Timestamp does not cover the signature value".to_string());
        },
        Err(e) => {
            result.timestamp_valid = Some(false);
            result.status = VerificationStatus::ValidWithWarnings;
            result.messages.push(format!("Unreadable timestamp: {}", e));
        },
    }
}

/// PDF text string to Rust string: UTF-16BE with BOM, else byte-per-char.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        },
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_sig_dict() -> Dictionary {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("Sig".to_string()));
        dict.insert("Filter".to_string(), Object::Name("Adobe.PPKLite".to_string()));
        dict.insert("SubFilter".to_string(), Object::Name("adbe.pkcs7.detached".to_string()));
        dict.insert("Name".to_string(), Object::String(b"Test Signer".to_vec()));
        dict.insert("Reason".to_string(), Object::String(b"Testing".to_vec()));
        dict.insert("Location".to_string(), Object::String(vec![0xFE, 0xFF, 0x00, 0x5A, 0x00, 0xFC]));
        dict.insert("M".to_string(), Object::String(b"D:20240101120000+00'00'".to_vec()));
        dict.insert(
            "ByteRange".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(200),
                Object::Integer(50),
            ]),
        );
        dict
    }

    #[test]
    fn test_extract_signature_info() {
        let info = SignatureVerifier::new().extract_signature_info(&make_sig_dict());

        assert_eq!(info.signer_name, Some("Test Signer".to_string()));
        assert_eq!(info.reason, Some("Testing".to_string()));
        assert_eq!(info.location, Some("Zü".to_string()));
        assert_eq!(info.signing_time.as_deref(), Some("D:20240101120000+00'00'"));
        assert_eq!(info.sub_filter, Some(SignatureSubFilter::Pkcs7Detached));
        assert_eq!(info.byte_range, vec![0, 100, 200, 50]);
        assert!(info.covers_whole_document);
    }

    #[test]
    fn test_missing_byte_range() {
        let mut dict = make_sig_dict();
        dict.remove("ByteRange");
        let info = SignatureVerifier::new().extract_signature_info(&dict);
        assert!(info.byte_range.is_empty());
        assert!(!info.covers_whole_document);
        assert_eq!(byte_range_array(&info.byte_range), None);
        assert_eq!(byte_range_array(&[0, 1, 2, 3]), Some([0, 1, 2, 3]));
    }

    #[test]
    fn test_decode_signed_data_rejects_garbage() {
        assert!(decode_signed_data(&[0x30, 0x03, 0x02, 0x01, 0x01]).is_err());
        assert!(decode_signed_data(&[0u8; 64]).is_err());
    }

    #[test]
    fn test_invalid_records_reason() {
        let result = invalid(VerificationResult::default(), "broken");
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert_eq!(result.messages, vec!["broken".to_string()]);
    }
}
