//! PDF digital signatures.
//!
//! Signing issues a fresh self-signed certificate for the private key,
//! appends a signature field to the document as an incremental update and
//! embeds a detached CMS (PKCS#7) signature over the file's byte range.
//! Verification reads the first embedded signature back, checks that it was
//! made with an expected public key, and validates integrity with the
//! embedded certificate as the only trust root.
//!
//! ## Signature types supported
//!
//! - PKCS#7 detached signatures (adbe.pkcs7.detached) for signing
//! - adbe.pkcs7.sha1 and ETSI.CAdES.detached are recognised when reading
//!
//! ## Example
//!
//! ```ignore
//! use pdfseal::keys::KeyStore;
//! use pdfseal::signatures::{sign_file, verify};
//!
//! let store = KeyStore::default();
//! let private_key = store.recover(&std::fs::read("E:/private_key.key")?, "1234")?;
//! sign_file(&private_key, "contract.pdf".as_ref(), "contract-signed.pdf".as_ref())?;
//!
//! let public_key = pdfseal::keys::load_public_key("public_key.key".as_ref())?;
//! assert!(verify(&public_key, "contract-signed.pdf".as_ref())?);
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax
//! - RFC 3161 - Time-Stamp Protocol (token format only)

pub mod byterange;
pub mod certificate;
mod signer;
pub mod timestamp;
mod types;
mod verifier;

pub use byterange::ByteRangeCalculator;
pub use certificate::{issue, issue_credentials};
pub use signer::{pdf_date, sign_file, sign_file_with, PdfSigner};
pub use timestamp::{LocalClockTimestamper, Timestamper};
pub use types::{
    DigestAlgorithm, SignOptions, SignatureAppearance, SignatureInfo, SignatureSubFilter,
    SigningCredentials, VerificationResult, VerificationStatus,
};
pub use verifier::{inspect, verify, SignatureVerifier};
