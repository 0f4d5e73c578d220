//! PIN parsing and PIN-to-key derivation.
//!
//! The symmetric key protecting the private key file is the SHA-256 digest
//! of the PIN's ASCII text. It is never stored, only re-derived.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Number of digits in a PIN.
pub const PIN_LENGTH: usize = 4;

/// Length of a derived key in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

/// A validated PIN: exactly [`PIN_LENGTH`] ASCII decimal digits.
#[derive(Clone)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    /// Validate `text` as a PIN.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfseal::keys::Pin;
    ///
    /// assert!(Pin::parse("0000").is_ok());
    /// assert!(Pin::parse("12a4").is_err());
    /// assert!(Pin::parse("123").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        if text.len() != PIN_LENGTH || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPin);
        }
        Ok(Self(Zeroizing::new(text.to_string())))
    }

    /// The PIN text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the envelope key for this PIN.
    pub fn derive_key(&self) -> DerivedKey {
        DerivedKey::from_digits(self.as_str())
    }
}

impl FromStr for Pin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin([REDACTED])")
    }
}

/// 256-bit symmetric key derived from a PIN.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey(Zeroizing<[u8; DERIVED_KEY_LEN]>);

impl DerivedKey {
    fn from_digits(digits: &str) -> Self {
        let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        key.copy_from_slice(&Sha256::digest(digits.as_bytes()));
        Self(key)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive a key from any non-empty string of decimal digits.
///
/// This is looser than [`Pin::parse`]: the length is not checked. Callers
/// that accept user input should go through [`Pin`].
pub fn derive_key(digits: &str) -> Result<DerivedKey> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidPin);
    }
    Ok(DerivedKey::from_digits(digits))
}
