//! Configuration for key generation and certificate issuance.

/// Default RSA modulus size.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// File name of the PIN-protected private key on removable media.
pub const DEFAULT_PRIVATE_KEY_FILE: &str = "private_key.key";

/// File name of the clear-text public key.
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "public_key.key";

/// Common name used as subject and issuer of every issued certificate.
pub const DEFAULT_SIGNER_NAME: &str = "PDF Seal Signer";

/// Key and certificate configuration.
#[derive(Debug, Clone)]
pub struct SealConfig {
    /// RSA modulus size in bits.
    pub key_bits: usize,

    /// File name of the encrypted private key.
    pub private_key_file_name: String,

    /// File name of the public key.
    pub public_key_file_name: String,

    /// Certificate subject (and issuer) common name.
    pub signer_name: String,

    /// How far in the past the certificate becomes valid.
    pub validity_backdate_days: u32,

    /// How long after issuance the certificate stays valid.
    pub validity_days: u32,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SealConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            private_key_file_name: DEFAULT_PRIVATE_KEY_FILE.to_string(),
            public_key_file_name: DEFAULT_PUBLIC_KEY_FILE.to_string(),
            signer_name: DEFAULT_SIGNER_NAME.to_string(),
            validity_backdate_days: 1,
            validity_days: 3650,
        }
    }

    /// Set the RSA modulus size.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the private key file name.
    pub fn with_private_key_file_name(mut self, name: impl Into<String>) -> Self {
        self.private_key_file_name = name.into();
        self
    }

    /// Set the public key file name.
    pub fn with_public_key_file_name(mut self, name: impl Into<String>) -> Self {
        self.public_key_file_name = name.into();
        self
    }

    /// Set the certificate common name.
    pub fn with_signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = name.into();
        self
    }

    /// Set the certificate validity window.
    pub fn with_validity(mut self, backdate_days: u32, days: u32) -> Self {
        self.validity_backdate_days = backdate_days;
        self.validity_days = days;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SealConfig::default();
        assert_eq!(config.key_bits, 4096);
        assert_eq!(config.private_key_file_name, "private_key.key");
        assert_eq!(config.public_key_file_name, "public_key.key");
        assert_eq!(config.validity_backdate_days, 1);
        assert_eq!(config.validity_days, 3650);
    }

    #[test]
    fn test_builder() {
        let config = SealConfig::new()
            .with_key_bits(2048)
            .with_signer_name("Alice")
            .with_validity(0, 30);
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.signer_name, "Alice");
        assert_eq!(config.validity_days, 30);
    }
}
