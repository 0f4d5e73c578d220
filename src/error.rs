//! Error types for pdfseal.
//!
//! Every failure the core can report has its own variant so that a caller
//! (CLI or GUI) can branch on the condition without inspecting message text.
//! [`Error::kind`] groups the variants into the coarse classes a user
//! interface usually cares about.
//!
//! No variant ever carries a PIN, key material or decrypted bytes.

use std::path::PathBuf;

/// Result type alias for pdfseal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input detected before any I/O (PIN, paths).
    InputValidation,
    /// Removable-media discovery failed.
    MediaDiscovery,
    /// Key, PIN, envelope or signature cryptography failed.
    Cryptographic,
    /// The PDF could not be read, or its signature is absent/unusable.
    Document,
    /// The platform cannot enumerate removable media.
    Platform,
    /// Underlying file-system error.
    Io,
}

/// Error types that can occur in pdfseal.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// PIN is not a string of decimal digits of the required length
    #[error("PIN must consist of exactly 4 decimal digits")]
    InvalidPin,

    /// A required path argument was empty
    #[error("Path for {0} must not be empty")]
    EmptyPath(&'static str),

    /// Signed output would overwrite the input document
    #[error("Output path must differ from input path: {0}")]
    OutputIsInput(PathBuf),

    /// Encrypted envelope cannot even hold a nonce and a tag
    #[error("Encrypted envelope is {len} bytes, at least {min} are required")]
    EnvelopeTooShort {
        /// Actual envelope length
        len: usize,
        /// Minimum envelope length (nonce + tag)
        min: usize,
    },

    /// Envelope encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// AEAD tag did not verify (wrong key or corrupted data)
    #[error("Authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,

    /// Key file missing where a decrypt was requested
    #[error("Key file not found: {0}")]
    KeyFileMissing(PathBuf),

    /// Wrong PIN, malformed PIN or tampered key envelope
    #[error("Key or PIN is invalid")]
    KeyOrPinInvalid,

    /// Decrypted content is not a parseable private key
    #[error("Key file content is not a valid private key")]
    KeyInvalid,

    /// Public key could not be parsed
    #[error("Public key is not a valid RSA public key")]
    PublicKeyInvalid,

    /// RSA key generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// No removable media is mounted
    #[error("No removable media found")]
    NoMediaFound,

    /// None of the media roots holds the key file
    #[error("No key file found on any removable media")]
    NoKeyFound,

    /// More than one media root holds the key file
    #[error("Key file found on {} media; refusing to pick one", .0.len())]
    MultipleKeysFound(Vec<PathBuf>),

    /// Removable media enumeration is not available on this platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Certificate construction or parsing failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Document carries no embedded signature
    #[error("No embedded signature found in document")]
    NoSignatureFound,

    /// Document already carries an embedded signature
    #[error("Document is already signed")]
    AlreadySigned,

    /// Generic signing failure
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPin | Error::EmptyPath(_) | Error::OutputIsInput(_) => {
                ErrorKind::InputValidation
            },
            Error::NoMediaFound | Error::NoKeyFound | Error::MultipleKeysFound(_) => {
                ErrorKind::MediaDiscovery
            },
            Error::UnsupportedPlatform(_) => ErrorKind::Platform,
            Error::EnvelopeTooShort { .. }
            | Error::Encryption(_)
            | Error::AuthenticationFailed
            | Error::KeyOrPinInvalid
            | Error::KeyInvalid
            | Error::PublicKeyInvalid
            | Error::KeyGeneration(_)
            | Error::Certificate(_)
            | Error::Signing(_) => ErrorKind::Cryptographic,
            Error::KeyFileMissing(_) | Error::Io(_) => ErrorKind::Io,
            Error::NoSignatureFound
            | Error::AlreadySigned
            | Error::InvalidHeader(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::InvalidObjectType { .. }
            | Error::InvalidPdf(_)
            | Error::Decode(_)
            | Error::UnsupportedFilter(_)
            | Error::Unsupported(_) => ErrorKind::Document,
        }
    }

    /// Whether this error means the PDF structure could not be read.
    ///
    /// `NoSignatureFound` and `AlreadySigned` are document conditions but
    /// not read failures.
    pub fn is_pdf_read(&self) -> bool {
        matches!(
            self,
            Error::InvalidHeader(_)
                | Error::ParseError { .. }
                | Error::InvalidXref
                | Error::ObjectNotFound(..)
                | Error::InvalidObjectType { .. }
                | Error::InvalidPdf(_)
                | Error::Decode(_)
                | Error::UnsupportedFilter(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
        assert!(err.is_pdf_read());
    }

    #[test]
    fn test_envelope_too_short_message() {
        let err = Error::EnvelopeTooShort { len: 7, min: 32 };
        let msg = format!("{}", err);
        assert!(msg.contains('7'));
        assert!(msg.contains("32"));
    }

    #[test]
    fn test_multiple_keys_message_counts_media() {
        let err = Error::MultipleKeysFound(vec!["/media/a".into(), "/media/b".into()]);
        assert!(format!("{}", err).contains('2'));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidPin.kind(), ErrorKind::InputValidation);
        assert_eq!(Error::NoMediaFound.kind(), ErrorKind::MediaDiscovery);
        assert_eq!(Error::KeyOrPinInvalid.kind(), ErrorKind::Cryptographic);
        assert_eq!(Error::NoSignatureFound.kind(), ErrorKind::Document);
        assert_eq!(Error::UnsupportedPlatform("plan9".into()).kind(), ErrorKind::Platform);
        assert!(!Error::NoSignatureFound.is_pdf_read());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
