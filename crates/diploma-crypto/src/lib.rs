pub mod canonical;
pub mod error;
pub mod hashing;
pub mod kdf;
pub mod keys;
pub mod signing;

pub use canonical::{CanonicalBytes, SignableFields};
pub use error::CryptoError;
pub use hashing::{hash, hash_hex};
pub use kdf::{hash_password, verify_password};
pub use keys::{KeyPair, PublicKey};
pub use signing::{sign, verify, verify_bytes, Signature};
