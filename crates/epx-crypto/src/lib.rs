pub mod address;
pub mod hash;
pub mod keys;

pub use address::{Address, LEGACY_ADDRESS_VERSIONS};
pub use hash::{ripemd160, sha256, sha512};
pub use keys::{
    CompactSignature, PrivateKey, PublicKey, SignatureError, COMPACT_SIGNATURE_BYTES, KEY_PREFIX,
};
