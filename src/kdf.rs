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

//! HMAC-SHA256 based key derivation.
//!
//! The extract step is the one from [RFC 5869]. The expand step feeds
//! `T(i - 1) || info` into the HMAC and does *not* append a block counter,
//! callers that need the RFC 5869 output for the first block append the
//! `0x01` counter to their info string themselves, as the Web Push key
//! derivation does.
//!
//! [RFC 5869]: https://www.rfc-editor.org/rfc/rfc5869

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// The output length of HMAC-SHA256.
pub const HASH_LENGTH: usize = 32;

/// The largest output [`expand()`] supports.
pub const MAX_OUTPUT_LENGTH: usize = 255 * HASH_LENGTH;

const DEFAULT_SALT: [u8; HASH_LENGTH] = [0u8; HASH_LENGTH];

/// Compute the HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; HASH_LENGTH] {
    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);

    mac.finalize().into_bytes().into()
}

/// Concentrate the entropy of `ikm` into a pseudorandom key.
///
/// An empty salt is replaced with a string of zeroes as long as the hash
/// output.
pub fn extract(salt: &[u8], ikm: &[u8]) -> Zeroizing<[u8; HASH_LENGTH]> {
    let salt = if salt.is_empty() { &DEFAULT_SALT[..] } else { salt };

    Zeroizing::new(hmac_sha256(salt, ikm))
}

/// Stretch the pseudorandom key `prk` into `length` bytes bound to `info`.
///
/// # Panics
///
/// If `length` is zero or larger than [`MAX_OUTPUT_LENGTH`].
pub fn expand(prk: &[u8], info: &[u8], length: usize) -> Zeroizing<Vec<u8>> {
    assert!(
        length > 0 && length <= MAX_OUTPUT_LENGTH,
        "The HKDF output length must be between 1 and {MAX_OUTPUT_LENGTH}, got {length}"
    );

    let mut okm = Zeroizing::new(Vec::with_capacity(length + HASH_LENGTH));
    let mut block = Zeroizing::new(Vec::with_capacity(HASH_LENGTH + info.len()));

    while okm.len() < length {
        block.extend_from_slice(info);
        let t = Zeroizing::new(hmac_sha256(prk, &block));

        okm.extend_from_slice(t.as_slice());
        block.clear();
        block.extend_from_slice(t.as_slice());
    }

    okm.truncate(length);

    okm
}
