// Copyright 2021 Damir Jelić
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

//! The Web Push message encryption key derivation, see [RFC 8291, section 3.4].
//!
//! ```text
//! PRK_key = HMAC-SHA-256(auth_secret, ecdh_secret)
//! key_info = "WebPush: info" || 0x00 || ua_public || as_public
//! IKM = HMAC-SHA-256(PRK_key, key_info || 0x01)
//! ```
//!
//! The result is the input keying material of the `aes128gcm` content
//! encoding. Every byte has to match what the user agent computes on its end,
//! a mismatch only shows up as a message the user agent can't decrypt.
//!
//! [RFC 8291, section 3.4]: https://www.rfc-editor.org/rfc/rfc8291#section-3.4

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    KeyDerivationError,
    kdf::{expand, extract},
    types::{RAW_PUBLIC_KEY_LENGTH, RawPublicKey, SharedSecret, UNCOMPRESSED_POINT_TAG},
};

const KEY_INFO_PREFIX: &[u8] = b"WebPush: info\0";

/// The block counter of the single HKDF output block, the content encoding
/// expects it at the end of the info string.
const KEY_INFO_SUFFIX: u8 = 0x01;

/// The length of the derived input keying material.
pub const IKM_LENGTH: usize = 32;

/// Input keying material for the `aes128gcm` content encoding.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Ikm([u8; IKM_LENGTH]);

impl Ikm {
    /// Wrap raw input keying material.
    pub const fn from_bytes(bytes: [u8; IKM_LENGTH]) -> Self {
        Self(bytes)
    }

    /// View the input keying material as a byte array.
    pub const fn as_bytes(&self) -> &[u8; IKM_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Ikm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ikm(<redacted>)")
    }
}

/// Build the HKDF info string binding the derived key to both public keys.
pub fn key_info(subscriber_public_raw: &RawPublicKey, as_public_raw: &RawPublicKey) -> Vec<u8> {
    let mut info =
        Vec::with_capacity(KEY_INFO_PREFIX.len() + 2 * RAW_PUBLIC_KEY_LENGTH + 1);

    info.extend_from_slice(KEY_INFO_PREFIX);
    info.extend_from_slice(subscriber_public_raw);
    info.extend_from_slice(as_public_raw);
    info.push(KEY_INFO_SUFFIX);

    info
}

/// Derive the input keying material for a message to a single subscriber.
///
/// * `as_public_raw` - The raw public key of the application server's ECDH
///   key pair.
/// * `subscriber_public_raw` - The raw `p256dh` key of the subscription.
/// * `auth_secret` - The `auth` secret of the subscription, only used as the
///   HKDF salt so any length is accepted.
/// * `ecdh_secret` - The result of the key agreement between the application
///   server's private key and the subscriber's public key.
pub fn derive_ikm(
    as_public_raw: &RawPublicKey,
    subscriber_public_raw: &[u8],
    auth_secret: &[u8],
    ecdh_secret: &SharedSecret,
) -> Result<Ikm, KeyDerivationError> {
    let subscriber_public_raw: RawPublicKey = subscriber_public_raw.try_into().map_err(|_| {
        KeyDerivationError::InvalidPublicKey(crate::KeyError::InvalidKeyLength {
            key_type: "P-256 public",
            expected_length: RAW_PUBLIC_KEY_LENGTH,
            length: subscriber_public_raw.len(),
        })
    })?;

    if subscriber_public_raw[0] != UNCOMPRESSED_POINT_TAG {
        return Err(KeyDerivationError::InvalidPublicKey(crate::KeyError::InvalidPointTag(
            subscriber_public_raw[0],
        )));
    }

    let prk = extract(auth_secret, ecdh_secret.as_bytes());
    let info = key_info(&subscriber_public_raw, as_public_raw);
    let okm = expand(prk.as_slice(), &info, IKM_LENGTH);

    let mut ikm = [0u8; IKM_LENGTH];
    ikm.copy_from_slice(&okm);

    Ok(Ikm(ikm))
}
