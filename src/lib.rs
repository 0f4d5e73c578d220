// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::match_like_matches_macro)]

//! # pdfseal
//!
//! PIN-protected RSA signing identities and embedded PDF signatures.
//!
//! ## Core Features
//!
//! ### Signing identity
//! - **Keypair generation**: RSA (4096-bit by default), PKCS#1 / SPKI PEM
//! - **PIN protection**: 4-digit PIN → SHA-256 → AES-256-EAX envelope
//!   (`nonce(16) ‖ tag(16) ‖ ciphertext`)
//! - **Removable media**: locate exactly one protected key on USB media
//!   (Linux sysfs, Windows removable drives, or explicit directories)
//!
//! ### Documents
//! - **Signing**: self-signed certificate per signature, detached CMS over
//!   the byte range, appended as an incremental update with a visible widget
//! - **Verification**: identity check against an expected public key, then
//!   integrity against the embedded certificate as trust root
//! - **Reading**: classic and stream cross-reference sections, object
//!   streams, FlateDecode with PNG predictors
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdfseal::keys::KeyStore;
//! use pdfseal::media::platform_provider;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = KeyStore::default();
//! let created = store.create("1234", "/media/usb".as_ref(), "/media/usb".as_ref())?;
//!
//! let private_key = store.retrieve(platform_provider()?.as_ref(), "1234")?;
//! pdfseal::sign(&private_key, "in.pdf".as_ref(), "out.pdf".as_ref())?;
//!
//! let public_key = pdfseal::keys::load_public_key(&created.public_key_path)?;
//! assert!(pdfseal::verify(&public_key, "out.pdf".as_ref())?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Geometry
pub mod geometry;

// PDF writing
pub mod writer;

// Signing identity
pub mod fsutil;
pub mod keys;
pub mod media;

// Digital signatures
pub mod signatures;

// Re-exports
pub use config::SealConfig;
pub use document::PdfDocument;
pub use error::{Error, ErrorKind, Result};
pub use signatures::{sign_file as sign, verify};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
