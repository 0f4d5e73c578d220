//! PIN-protected private key storage.
//!
//! [`KeyStore::create`] generates a keypair, writes the public key in clear
//! and the private key as an envelope sealed with a key derived from the
//! PIN. [`KeyStore::recover`] reverses the second step, and
//! [`KeyStore::retrieve`] first locates the envelope on removable media.
//!
//! The two files are written one after the other. Each write is atomic, but
//! the pair is not: if the private key write fails, the public key file has
//! already been replaced.

use super::envelope;
use super::keypair::{self, Keypair};
use super::pin::Pin;
use crate::config::SealConfig;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::media::MediaProvider;
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Where [`KeyStore::create`] put the two key files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedKeys {
    /// Clear-text public key
    pub public_key_path: PathBuf,
    /// Encrypted private key
    pub private_key_path: PathBuf,
}

/// Creates and recovers PIN-protected keys.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    config: SealConfig,
}

impl KeyStore {
    /// Create a store with the given configuration.
    pub fn new(config: SealConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// Generate a keypair and store it.
    ///
    /// `public_path` and `private_path` may name files or existing
    /// directories; a directory gets the configured file name appended. The
    /// PIN and paths are validated before any key generation or file I/O.
    /// The private key is sealed in memory and never written in clear.
    pub fn create(&self, pin: &str, public_path: &Path, private_path: &Path) -> Result<CreatedKeys> {
        let pin = Pin::parse(pin)?;
        let public_key_path = self.resolve_target(public_path, "public key", &self.config.public_key_file_name)?;
        let private_key_path =
            self.resolve_target(private_path, "private key", &self.config.private_key_file_name)?;

        let keypair = keypair::generate(self.config.key_bits)?;
        let exported = keypair.export()?;
        let sealed = envelope::encrypt(exported.private_pem.as_bytes(), &pin.derive_key())?;

        fsutil::write_atomic(&public_key_path, exported.public_pem.as_bytes())?;
        fsutil::write_atomic_secret(&private_key_path, &sealed)?;
        log::info!(
            "stored public key at {} and protected private key at {}",
            public_key_path.display(),
            private_key_path.display()
        );
        Ok(CreatedKeys {
            public_key_path,
            private_key_path,
        })
    }

    fn resolve_target(&self, path: &Path, what: &'static str, file_name: &str) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(Error::EmptyPath(what));
        }
        if path.is_dir() {
            Ok(path.join(file_name))
        } else {
            Ok(path.to_path_buf())
        }
    }

    /// Decrypt and parse a protected private key.
    ///
    /// A malformed PIN, a wrong PIN and a tampered envelope all yield
    /// [`Error::KeyOrPinInvalid`]; content that decrypts but is not a private
    /// key yields [`Error::KeyInvalid`].
    pub fn recover(&self, encrypted: &[u8], pin: &str) -> Result<RsaPrivateKey> {
        let pin = Pin::parse(pin).map_err(|_| Error::KeyOrPinInvalid)?;
        let plaintext = envelope::decrypt(encrypted, &pin.derive_key()).map_err(|e| {
            log::debug!("key envelope rejected: {}", e);
            Error::KeyOrPinInvalid
        })?;
        let pem = std::str::from_utf8(&plaintext).map_err(|_| Error::KeyInvalid)?;
        let pem = Zeroizing::new(pem.to_string());
        keypair::private_key_from_pem(&pem)
    }

    /// Recover a private key and pair it with its public half.
    pub fn recover_keypair(&self, encrypted: &[u8], pin: &str) -> Result<Keypair> {
        self.recover(encrypted, pin).map(Keypair::from_private_key)
    }

    /// Find the protected key file among the provider's mount points.
    pub fn locate(&self, provider: &dyn MediaProvider) -> Result<PathBuf> {
        let roots = provider.mount_points()?;
        log::debug!("scanning {} media root(s) for {}", roots.len(), self.config.private_key_file_name);
        locate_key_file(&roots, &self.config.private_key_file_name)
    }

    /// Locate, read and recover the private key from removable media.
    ///
    /// The PIN is validated before the media are scanned.
    pub fn retrieve(&self, provider: &dyn MediaProvider, pin: &str) -> Result<RsaPrivateKey> {
        Pin::parse(pin)?;
        let path = self.locate(provider)?;
        let encrypted = std::fs::read(&path)?;
        log::info!("read protected key from {}", path.display());
        self.recover(&encrypted, pin)
    }
}

/// Pick the single root that holds `file_name`.
///
/// Zero roots is [`Error::NoMediaFound`], no root holding the file is
/// [`Error::NoKeyFound`], and more than one is [`Error::MultipleKeysFound`].
pub fn locate_key_file(roots: &[PathBuf], file_name: &str) -> Result<PathBuf> {
    if roots.is_empty() {
        return Err(Error::NoMediaFound);
    }
    let mut found: Vec<PathBuf> = roots
        .iter()
        .map(|root| root.join(file_name))
        .filter(|candidate| candidate.is_file())
        .collect();
    match found.len() {
        0 => Err(Error::NoKeyFound),
        1 => Ok(found.remove(0)),
        _ => Err(Error::MultipleKeysFound(found)),
    }
}
