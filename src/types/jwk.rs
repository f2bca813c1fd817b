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

//! Conversion between the raw uncompressed point encoding of a P-256 public
//! key and its [JSON Web Key] representation.
//!
//! [JSON Web Key]: https://www.rfc-editor.org/rfc/rfc7517

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{KeyError, RAW_PUBLIC_KEY_LENGTH, RawPublicKey, UNCOMPRESSED_POINT_TAG};
use crate::utilities::{base64url_decode, base64url_encode};

const KEY_TYPE_EC: &str = "EC";
const CURVE_P256: &str = "P-256";
const COORDINATE_LENGTH: usize = 32;

/// A P-256 elliptic curve key in the JSON Web Key format.
///
/// All byte fields are URL-safe base64 without padding. The `key_ops` and
/// `ext` members are optional, they are present in keys exported by
/// WebCrypto implementations and are carried along for compatibility.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// The key type, always `EC`.
    pub kty: String,
    /// The curve name, always `P-256`.
    pub crv: String,
    /// The X coordinate of the public point.
    pub x: String,
    /// The Y coordinate of the public point.
    pub y: String,
    /// The private scalar, only present for private keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// The operations this key is intended for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_ops: Vec<String>,
    /// Whether the key was marked as extractable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,
}

impl Jwk {
    /// Build a JWK out of an already validated raw public point.
    pub(crate) fn from_point(raw_public: &RawPublicKey, private_scalar: Option<&[u8]>) -> Self {
        Self {
            kty: KEY_TYPE_EC.to_owned(),
            crv: CURVE_P256.to_owned(),
            x: base64url_encode(&raw_public[1..33]),
            y: base64url_encode(&raw_public[33..65]),
            d: private_scalar.map(Base64UrlUnpadded::encode_string),
            key_ops: Vec::new(),
            ext: None,
        }
    }

    /// Does this JWK carry a private scalar.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("d", &self.d.as_ref().map(|_| "<redacted>"))
            .field("key_ops", &self.key_ops)
            .field("ext", &self.ext)
            .finish()
    }
}

impl Drop for Jwk {
    fn drop(&mut self) {
        if let Some(d) = self.d.as_mut() {
            d.zeroize();
        }
    }
}

/// Convert a raw uncompressed P-256 point, and optionally the matching
/// private scalar, into a [`Jwk`].
///
/// The point must be exactly 65 bytes long and start with the `0x04` tag.
/// The private scalar is only base64url encoded, rejecting scalars outside of
/// the curve order is left to the key import.
pub fn raw_to_jwk(raw_public: &[u8], private_scalar: Option<&[u8]>) -> Result<Jwk, KeyError> {
    let raw_public = check_raw_point(raw_public)?;

    Ok(Jwk::from_point(&raw_public, private_scalar))
}

/// Convert the public part of a [`Jwk`] into a raw uncompressed P-256 point.
pub fn jwk_to_raw(jwk: &Jwk) -> Result<RawPublicKey, KeyError> {
    if jwk.kty != KEY_TYPE_EC || jwk.crv != CURVE_P256 {
        return Err(KeyError::UnsupportedJwk { kty: jwk.kty.clone(), crv: jwk.crv.clone() });
    }

    let x = decode_coordinate(&jwk.x, "JWK x coordinate")?;
    let y = decode_coordinate(&jwk.y, "JWK y coordinate")?;

    let mut raw = [0u8; RAW_PUBLIC_KEY_LENGTH];
    raw[0] = UNCOMPRESSED_POINT_TAG;
    raw[1..33].copy_from_slice(&x);
    raw[33..65].copy_from_slice(&y);

    Ok(raw)
}

pub(super) fn check_raw_point(raw_public: &[u8]) -> Result<RawPublicKey, KeyError> {
    let raw: RawPublicKey = raw_public.try_into().map_err(|_| KeyError::InvalidKeyLength {
        key_type: "P-256 public",
        expected_length: RAW_PUBLIC_KEY_LENGTH,
        length: raw_public.len(),
    })?;

    if raw[0] == UNCOMPRESSED_POINT_TAG { Ok(raw) } else { Err(KeyError::InvalidPointTag(raw[0])) }
}

fn decode_coordinate(encoded: &str, key_type: &'static str) -> Result<Vec<u8>, KeyError> {
    let decoded = base64url_decode(encoded)?;

    if decoded.len() == COORDINATE_LENGTH {
        Ok(decoded)
    } else {
        Err(KeyError::InvalidKeyLength {
            key_type,
            expected_length: COORDINATE_LENGTH,
            length: decoded.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;
    use proptest::prelude::*;

    use super::*;

    const AS_PUBLIC: &str =
        "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";

    #[test]
    fn public_point_to_jwk() {
        let raw = base64url_decode(AS_PUBLIC).unwrap();
        let jwk = raw_to_jwk(&raw, None).unwrap();

        assert!(!jwk.is_private());
        insta::assert_snapshot!(
            serde_json::to_string(&jwk).unwrap(),
            @r#"{"kty":"EC","crv":"P-256","x":"_jP0qw3qcZFNtVgj9ztUlI9BMG2SBzLbuaWaUyhkgiA","y":"Dll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8"}"#
        );
    }

    #[test]
    fn private_scalar_is_encoded_as_d() {
        let raw = base64url_decode(AS_PUBLIC).unwrap();
        let jwk = raw_to_jwk(&raw, Some(&[0xffu8; 32])).unwrap();

        assert!(jwk.is_private());
        assert_eq!(jwk.d.as_deref(), Some("__________________________________________8"));
    }

    #[test]
    fn short_point_is_rejected() {
        let raw = [UNCOMPRESSED_POINT_TAG; 64];

        assert_matches!(
            raw_to_jwk(&raw, None),
            Err(KeyError::InvalidKeyLength { expected_length: 65, length: 64, .. })
        );
    }

    #[test]
    fn compressed_point_tag_is_rejected() {
        let mut raw = base64url_decode(AS_PUBLIC).unwrap();
        raw[0] = 0x02;

        assert_matches!(raw_to_jwk(&raw, None), Err(KeyError::InvalidPointTag(0x02)));
    }

    #[test]
    fn unsupported_curve_is_rejected() {
        let raw = base64url_decode(AS_PUBLIC).unwrap();
        let mut jwk = raw_to_jwk(&raw, None).unwrap();
        jwk.crv = "P-384".to_owned();

        assert_matches!(jwk_to_raw(&jwk), Err(KeyError::UnsupportedJwk { .. }));
    }

    #[test]
    fn truncated_coordinate_is_rejected() {
        let raw = base64url_decode(AS_PUBLIC).unwrap();
        let mut jwk = raw_to_jwk(&raw, None).unwrap();
        jwk.y = base64url_encode([0u8; 31]);

        assert_matches!(
            jwk_to_raw(&jwk),
            Err(KeyError::InvalidKeyLength { expected_length: 32, length: 31, .. })
        );
    }

    #[test]
    fn webcrypto_export_parses() {
        let json = r#"{
            "kty": "EC",
            "crv": "P-256",
            "x": "_jP0qw3qcZFNtVgj9ztUlI9BMG2SBzLbuaWaUyhkgiA",
            "y": "Dll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8",
            "key_ops": ["verify"],
            "ext": true
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.key_ops, ["verify"]);
        assert_eq!(jwk_to_raw(&jwk).unwrap().to_vec(), base64url_decode(AS_PUBLIC).unwrap());
    }

    #[test]
    fn debug_hides_private_scalar() {
        let raw = base64url_decode(AS_PUBLIC).unwrap();
        let jwk = raw_to_jwk(&raw, Some(&[7u8; 32])).unwrap();

        let debug = format!("{jwk:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(jwk.d.as_deref().unwrap()));
    }

    proptest! {
        #[test]
        fn raw_jwk_roundtrip(coordinates in prop::collection::vec(any::<u8>(), 64)) {
            let mut raw = vec![UNCOMPRESSED_POINT_TAG];
            raw.extend_from_slice(&coordinates);

            let jwk = raw_to_jwk(&raw, None).unwrap();
            prop_assert_eq!(jwk_to_raw(&jwk).unwrap().to_vec(), raw);
        }
    }
}
