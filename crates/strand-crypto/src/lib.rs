pub mod encrypt;
pub mod error;
pub mod keys;
pub mod message;
pub mod sign;

pub use encrypt::{decrypt, encrypt, EncryptedPayload};
pub use error::CryptoError;
pub use keys::{EncryptionKeypair, SigningKeypair};
pub use message::{
    create_authenticated_message, create_signed_encrypted_message, verify_and_decrypt, AuthEntry,
    AuthenticatedMessage, SignedEncryptedMessage, VerifiedPlaintext,
};
pub use sign::{canonical_json_bytes, sign_value, verify_value};
