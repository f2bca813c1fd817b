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

//! Encrypted content encodings for the push message body.
//!
//! Web Push messages are encrypted using the `aes128gcm` content encoding
//! from [RFC 8188]. The encoded body starts with a header describing how it was
//! encrypted, followed by the encrypted records:
//!
//! ```text
//! +-----------+--------+-----------+---------------+-------------------+
//! | salt (16) | rs (4) | idlen (1) | keyid (idlen) | records (...)     |
//! +-----------+--------+-----------+---------------+-------------------+
//! ```
//!
//! For Web Push the key id is the application server's raw ECDH public key,
//! the user agent needs it to repeat the key agreement.
//!
//! [RFC 8188]: https://www.rfc-editor.org/rfc/rfc8188

use aes_gcm::{Aes128Gcm as Aes128GcmCipher, KeyInit, aead::Aead};
use thiserror::Error;

use crate::{
    derivation::Ikm,
    kdf::{expand, extract},
};

/// The record size used unless configured otherwise.
pub const DEFAULT_RECORD_SIZE: u32 = 4096;

/// The length of the salt in the encoding header.
pub const SALT_LENGTH: usize = 16;

const TAG_LENGTH: usize = 16;
const KEY_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;

/// The smallest record that can hold the AEAD tag, the padding delimiter and
/// a single byte of data.
const MIN_RECORD_SIZE: u32 = (TAG_LENGTH + 2) as u32;

const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0\x01";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0\x01";

/// Delimiter marking the last record of the message.
const LAST_RECORD_DELIMITER: u8 = 0x02;

/// Error type describing the ways the message body can fail to be encoded.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The record size is too small to hold any data.
    #[error("The record size {0} is too small, records need at least 18 bytes")]
    RecordSizeTooSmall(u32),
    /// The key id doesn't fit into the single length byte of the header.
    #[error("The key id is too long, expected at most 255 bytes, got {0}")]
    KeyIdTooLong(usize),
    /// The payload doesn't fit into a single record.
    #[error("The payload is too large, at most {max} bytes fit into a record, got {length}")]
    PayloadTooLarge {
        /// The largest payload that fits into a record.
        max: usize,
        /// The length of the payload.
        length: usize,
    },
    /// The AEAD encryption failed.
    #[error("The payload couldn't be encrypted")]
    Encryption,
}

/// The per message parameters of the encoding header.
#[derive(Clone, Copy, Debug)]
pub struct EncodingHeader<'a> {
    /// A random salt, it must never be reused with the same input keying
    /// material.
    pub salt: [u8; SALT_LENGTH],
    /// The key id, the application server's raw public key for Web Push.
    pub key_id: &'a [u8],
}

/// A content encoding that turns a payload into an encrypted message body.
pub trait ContentEncoder {
    /// The value of the `Content-Encoding` header for bodies produced by this
    /// encoder.
    fn content_encoding(&self) -> &'static str;

    /// Encrypt the plaintext with the given input keying material.
    fn encode(
        &self,
        plaintext: &[u8],
        ikm: &Ikm,
        header: &EncodingHeader<'_>,
    ) -> Result<Vec<u8>, EncodingError>;
}

/// The `aes128gcm` content encoding, producing a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aes128Gcm {
    record_size: u32,
}

impl Aes128Gcm {
    /// Create an encoder using the given record size.
    pub const fn new(record_size: u32) -> Result<Self, EncodingError> {
        if record_size < MIN_RECORD_SIZE {
            Err(EncodingError::RecordSizeTooSmall(record_size))
        } else {
            Ok(Self { record_size })
        }
    }

    /// The record size written into the header.
    pub const fn record_size(&self) -> u32 {
        self.record_size
    }

    /// The largest payload that fits into a single record.
    pub const fn max_payload_length(&self) -> usize {
        self.record_size as usize - TAG_LENGTH - 1
    }
}

impl Default for Aes128Gcm {
    fn default() -> Self {
        Self { record_size: DEFAULT_RECORD_SIZE }
    }
}

impl ContentEncoder for Aes128Gcm {
    fn content_encoding(&self) -> &'static str {
        "aes128gcm"
    }

    fn encode(
        &self,
        plaintext: &[u8],
        ikm: &Ikm,
        header: &EncodingHeader<'_>,
    ) -> Result<Vec<u8>, EncodingError> {
        let key_id_length = u8::try_from(header.key_id.len())
            .map_err(|_| EncodingError::KeyIdTooLong(header.key_id.len()))?;

        if plaintext.len() > self.max_payload_length() {
            return Err(EncodingError::PayloadTooLarge {
                max: self.max_payload_length(),
                length: plaintext.len(),
            });
        }

        let prk = extract(&header.salt, ikm.as_bytes());
        let cek = expand(prk.as_slice(), CEK_INFO, KEY_LENGTH);
        let nonce = expand(prk.as_slice(), NONCE_INFO, NONCE_LENGTH);

        let mut padded = zeroize::Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
        padded.extend_from_slice(plaintext);
        padded.push(LAST_RECORD_DELIMITER);

        let cipher =
            Aes128GcmCipher::new_from_slice(&cek).map_err(|_| EncodingError::Encryption)?;
        let nonce: [u8; NONCE_LENGTH] =
            nonce.as_slice().try_into().map_err(|_| EncodingError::Encryption)?;

        let ciphertext = cipher
            .encrypt((&nonce).into(), padded.as_slice())
            .map_err(|_| EncodingError::Encryption)?;

        let mut body =
            Vec::with_capacity(SALT_LENGTH + 4 + 1 + header.key_id.len() + ciphertext.len());
        body.extend_from_slice(&header.salt);
        body.extend_from_slice(&self.record_size.to_be_bytes());
        body.push(key_id_length);
        body.extend_from_slice(header.key_id);
        body.extend_from_slice(&ciphertext);

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;
    use crate::utilities::{base64url_decode, base64url_encode};

    const AS_PUBLIC: &str =
        "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";
    const IKM: &str = "S4lYMb_L0FxCeq0WhDx813KgSYqU26kOyzWUdsXYyrg";
    const SALT: &str = "DGv6ra1nlYgDCS1FRnbzlw";
    const PLAINTEXT: &[u8] = b"When I grow up, I want to be a watermelon";
    const BODY: &str = "DGv6ra1nlYgDCS1FRnbzlwAAEABBBP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A_yl95bQpu6cVPTpK4Mqgkf1CXztLVBSt2Ks3oZwbuwXPXLWyouBWLVWGNWQexSgSxsj_Qulcy4a-fN";

    fn ikm() -> Ikm {
        Ikm::from_bytes(base64url_decode(IKM).unwrap().try_into().unwrap())
    }

    fn salt() -> [u8; SALT_LENGTH] {
        base64url_decode(SALT).unwrap().try_into().unwrap()
    }

    #[test]
    fn body_matches_rfc8291_vector() {
        let key_id = base64url_decode(AS_PUBLIC).unwrap();
        let header = EncodingHeader { salt: salt(), key_id: &key_id };

        let body = Aes128Gcm::default().encode(PLAINTEXT, &ikm(), &header).unwrap();

        assert_eq!(base64url_encode(body), BODY);
    }

    #[test]
    fn content_encryption_key_and_nonce_match_rfc8291_vector() {
        let prk = extract(&salt(), ikm().as_bytes());

        let cek = expand(prk.as_slice(), CEK_INFO, KEY_LENGTH);
        let nonce = expand(prk.as_slice(), NONCE_INFO, NONCE_LENGTH);

        assert_eq!(base64url_encode(cek.as_slice()), "oIhVW04MRdy2XN9CiKLxTg");
        assert_eq!(base64url_encode(nonce.as_slice()), "4h_95klXJ5E_qnoN");
    }

    #[test]
    fn body_decrypts_to_the_padded_plaintext() {
        let body = Aes128Gcm::new(128)
            .unwrap()
            .encode(b"ping", &ikm(), &EncodingHeader { salt: [7; SALT_LENGTH], key_id: b"" })
            .unwrap();

        assert_eq!(&body[..SALT_LENGTH], &[7; SALT_LENGTH]);
        assert_eq!(&body[16..20], &128u32.to_be_bytes());
        assert_eq!(body[20], 0);

        let prk = extract(&body[..SALT_LENGTH], ikm().as_bytes());
        let cek = expand(prk.as_slice(), CEK_INFO, KEY_LENGTH);
        let nonce = expand(prk.as_slice(), NONCE_INFO, NONCE_LENGTH);

        let cipher = Aes128GcmCipher::new_from_slice(&cek).unwrap();
        let plaintext = cipher.decrypt(nonce.as_slice().into(), &body[21..]).unwrap();

        assert_eq!(plaintext, b"ping\x02");
    }

    #[test]
    fn tiny_record_size_is_rejected() {
        assert_matches!(Aes128Gcm::new(17), Err(EncodingError::RecordSizeTooSmall(17)));
        assert_eq!(Aes128Gcm::new(18).unwrap().max_payload_length(), 1);
    }

    #[test]
    fn payload_must_fit_into_one_record() {
        let encoder = Aes128Gcm::new(64).unwrap();
        let header = EncodingHeader { salt: salt(), key_id: b"" };

        encoder.encode(&[0; 47], &ikm(), &header).unwrap();
        assert_matches!(
            encoder.encode(&[0; 48], &ikm(), &header),
            Err(EncodingError::PayloadTooLarge { max: 47, length: 48 })
        );
    }

    #[test]
    fn oversized_key_id_is_rejected() {
        let key_id = [0u8; 256];
        let header = EncodingHeader { salt: salt(), key_id: &key_id };

        assert_matches!(
            Aes128Gcm::default().encode(b"", &ikm(), &header),
            Err(EncodingError::KeyIdTooLong(256))
        );
    }
}
