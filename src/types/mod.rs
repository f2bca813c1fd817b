// Copyright 2021 Denis Kasak, Damir Jelić
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod jwk;
mod keys;

pub use jwk::{Jwk, jwk_to_raw, raw_to_jwk};
pub use keys::{
    KeyPair, KeyUsage, P256PublicKey, P256SecretKey, RAW_PUBLIC_KEY_LENGTH, RawPublicKey,
    SECRET_KEY_LENGTH, SharedSecret, UNCOMPRESSED_POINT_TAG,
};
use thiserror::Error;

/// Error type for failures that may occur when decoding, importing or
/// exporting a P-256 key.
#[derive(Error, Debug)]
pub enum KeyError {
    /// A public key wasn't valid URL-safe base64.
    #[error("Failed to decode a public key from base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A private scalar wasn't valid URL-safe base64.
    #[error("Failed to decode a private key from base64url: {0}")]
    Base64PrivateKey(#[from] base64ct::Error),

    /// The key does not contain the expected number of bytes.
    #[error(
        "Failed to decode {key_type} key: \
        Invalid number of bytes for {key_type}, expected {expected_length}, got {length}."
    )]
    InvalidKeyLength {
        /// The type of key being decoded.
        key_type: &'static str,
        /// The expected length of the key.
        expected_length: usize,
        /// The actual length of the key.
        length: usize,
    },

    /// The raw public key doesn't start with the uncompressed point tag.
    #[error("The public key isn't an uncompressed point, expected tag 0x04, got {0:#04x}")]
    InvalidPointTag(u8),

    /// The coordinates don't describe a point on the P-256 curve.
    #[error("The public key isn't a valid point on the P-256 curve")]
    InvalidPoint,

    /// The private scalar is zero or not below the curve order.
    #[error("The private key isn't a valid P-256 scalar")]
    InvalidScalar,

    /// The JSON Web Key doesn't describe a P-256 elliptic curve key.
    #[error("Unsupported JSON Web Key, expected kty \"EC\" and crv \"P-256\", got {kty} and {crv}")]
    UnsupportedJwk {
        /// The `kty` member of the JWK.
        kty: String,
        /// The `crv` member of the JWK.
        crv: String,
    },

    /// A private key was expected but the JWK has no `d` member.
    #[error("The JSON Web Key doesn't contain a private scalar")]
    MissingPrivateKey,

    /// The public key doesn't belong to the private scalar it was paired with.
    #[error("The public key doesn't match the private key")]
    MismatchedPublicKey,

    /// The private key was created as non-extractable and can't be exported.
    #[error("The private key isn't extractable")]
    NotExtractable,

    /// The key pair was created for a different purpose than the one it is
    /// being used for.
    #[error("The key pair has the wrong usage, expected {expected}, got {got}")]
    WrongKeyUsage {
        /// The usage the operation requires.
        expected: KeyUsage,
        /// The usage the key was created with.
        got: KeyUsage,
    },
}
