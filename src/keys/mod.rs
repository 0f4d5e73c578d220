//! Signing identity: keypair generation and PIN-protected storage.
//!
//! ```text
//! keypair::generate ──► Keypair::export ──► envelope::encrypt(pin.derive_key())
//!                                                    │
//!                          removable media  ◄────────┘  private_key.key
//!                                │
//! KeyStore::retrieve ──► locate_key_file ──► KeyStore::recover ──► RsaPrivateKey
//! ```

pub mod envelope;
pub mod keypair;
pub mod pin;
pub mod store;

pub use keypair::{generate, load_public_key, ExportedKeypair, Keypair};
pub use pin::{derive_key, DerivedKey, Pin};
pub use store::{locate_key_file, CreatedKeys, KeyStore};
