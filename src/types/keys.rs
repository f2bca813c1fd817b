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

use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{Jwk, KeyError, jwk::check_raw_point, jwk_to_raw, raw_to_jwk};
use crate::utilities::{base64url_decode, base64url_encode};

/// The length of a raw, uncompressed P-256 public key.
pub const RAW_PUBLIC_KEY_LENGTH: usize = 65;

/// The length of a P-256 private scalar.
pub const SECRET_KEY_LENGTH: usize = 32;

/// The leading byte of an uncompressed SEC1 point.
pub const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// A P-256 public key in the uncompressed point encoding: the `0x04` tag
/// followed by the X and the Y coordinate.
pub type RawPublicKey = [u8; RAW_PUBLIC_KEY_LENGTH];

/// The purpose a key pair was created for.
///
/// A key pair is either used to agree on a shared secret with a push
/// subscriber, or to sign VAPID tokens, never both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    /// Elliptic curve Diffie-Hellman, the application server identity used
    /// for message encryption.
    Ecdh,
    /// ECDSA with SHA-256, the VAPID signing identity.
    Ecdsa,
}

impl KeyUsage {
    fn private_key_ops(self) -> &'static [&'static str] {
        match self {
            KeyUsage::Ecdh => &["deriveKey"],
            KeyUsage::Ecdsa => &["sign"],
        }
    }

    fn public_key_ops(self) -> &'static [&'static str] {
        match self {
            KeyUsage::Ecdh => &[],
            KeyUsage::Ecdsa => &["verify"],
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyUsage::Ecdh => f.write_str("ECDH"),
            KeyUsage::Ecdsa => f.write_str("ECDSA"),
        }
    }
}

/// A public key on the P-256 curve.
#[derive(Clone, PartialEq, Eq)]
pub struct P256PublicKey {
    inner: PublicKey,
}

impl P256PublicKey {
    /// Import a public key from its raw, uncompressed point encoding.
    ///
    /// Fails if the input isn't 65 bytes long, doesn't start with the `0x04`
    /// tag, or doesn't describe a point on the curve.
    pub fn from_raw(raw: &[u8]) -> Result<Self, KeyError> {
        let raw = check_raw_point(raw)?;
        let inner = PublicKey::from_sec1_bytes(&raw).map_err(|_| KeyError::InvalidPoint)?;

        Ok(Self { inner })
    }

    /// Import a public key from the base64url encoding of its raw point, the
    /// format browsers use for the `p256dh` subscription key.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let raw = base64url_decode(encoded)?;
        Self::from_raw(&raw)
    }

    /// Import a public key from a [`Jwk`]. A private scalar, if present, is
    /// ignored.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        Self::from_raw(&jwk_to_raw(jwk)?)
    }

    /// Export the public key as a raw, uncompressed point.
    pub fn to_raw(&self) -> RawPublicKey {
        let point = self.inner.to_encoded_point(false);

        let mut raw = [0u8; RAW_PUBLIC_KEY_LENGTH];
        raw.copy_from_slice(point.as_bytes());

        raw
    }

    /// Export the public key as the base64url encoding of its raw point.
    pub fn to_base64(&self) -> String {
        base64url_encode(self.to_raw())
    }

    /// Export the public key as a [`Jwk`], annotated with the operations the
    /// given usage allows.
    pub fn to_jwk(&self, usage: KeyUsage) -> Jwk {
        let mut jwk = Jwk::from_point(&self.to_raw(), None);
        jwk.key_ops = usage.public_key_ops().iter().map(|op| (*op).to_owned()).collect();
        jwk.ext = Some(true);

        jwk
    }

    pub(crate) const fn inner(&self) -> &PublicKey {
        &self.inner
    }
}

impl From<PublicKey> for P256PublicKey {
    fn from(inner: PublicKey) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for P256PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P256PublicKey({})", self.to_base64())
    }
}

/// A private key on the P-256 curve.
///
/// The usage and the extractability of the key are fixed when the key is
/// created or imported, there is no way to change them afterwards.
#[derive(Clone)]
pub struct P256SecretKey {
    inner: SecretKey,
    usage: KeyUsage,
    extractable: bool,
}

impl P256SecretKey {
    pub(crate) const fn new(inner: SecretKey, usage: KeyUsage, extractable: bool) -> Self {
        Self { inner, usage, extractable }
    }

    /// Import a private key from its 32 byte big-endian scalar.
    pub fn from_scalar(
        scalar: &[u8],
        usage: KeyUsage,
        extractable: bool,
    ) -> Result<Self, KeyError> {
        if scalar.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidKeyLength {
                key_type: "P-256 private",
                expected_length: SECRET_KEY_LENGTH,
                length: scalar.len(),
            });
        }

        let inner = SecretKey::from_slice(scalar).map_err(|_| KeyError::InvalidScalar)?;

        Ok(Self::new(inner, usage, extractable))
    }

    /// Import a private key from a [`Jwk`].
    ///
    /// The public coordinates of the JWK must belong to the private scalar.
    /// A JWK that was exported as non-extractable can't be imported as
    /// extractable.
    pub fn from_jwk(jwk: &Jwk, usage: KeyUsage, extractable: bool) -> Result<Self, KeyError> {
        if extractable && jwk.ext == Some(false) {
            return Err(KeyError::NotExtractable);
        }

        let raw_public = jwk_to_raw(jwk)?;
        let encoded_scalar = jwk.d.as_deref().ok_or(KeyError::MissingPrivateKey)?;
        let scalar = Zeroizing::new(Base64UrlUnpadded::decode_vec(encoded_scalar)?);

        let secret_key = Self::from_scalar(&scalar, usage, extractable)?;

        if secret_key.public_key().to_raw() == raw_public {
            Ok(secret_key)
        } else {
            Err(KeyError::MismatchedPublicKey)
        }
    }

    /// The usage this key was created with.
    pub const fn usage(&self) -> KeyUsage {
        self.usage
    }

    /// Can the private scalar of this key be exported.
    pub const fn is_extractable(&self) -> bool {
        self.extractable
    }

    /// Derive the public half of this key.
    pub fn public_key(&self) -> P256PublicKey {
        P256PublicKey { inner: self.inner.public_key() }
    }

    /// Export the private scalar.
    ///
    /// Fails with [`KeyError::NotExtractable`] if the key wasn't created as
    /// extractable.
    pub fn to_scalar(&self) -> Result<Zeroizing<[u8; SECRET_KEY_LENGTH]>, KeyError> {
        if !self.extractable {
            return Err(KeyError::NotExtractable);
        }

        let mut scalar = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        scalar.copy_from_slice(&self.inner.to_bytes());

        Ok(scalar)
    }

    /// Export the private key as a [`Jwk`], including the public
    /// coordinates.
    pub fn to_jwk(&self) -> Result<Jwk, KeyError> {
        let scalar = self.to_scalar()?;

        let mut jwk = raw_to_jwk(&self.public_key().to_raw(), Some(scalar.as_slice()))?;
        jwk.key_ops = self.usage.private_key_ops().iter().map(|op| (*op).to_owned()).collect();
        jwk.ext = Some(self.extractable);

        Ok(jwk)
    }

    /// Check that this key was created for the given usage.
    pub(crate) fn check_usage(&self, expected: KeyUsage) -> Result<(), KeyError> {
        if self.usage == expected {
            Ok(())
        } else {
            Err(KeyError::WrongKeyUsage { expected, got: self.usage })
        }
    }

    pub(crate) const fn inner(&self) -> &SecretKey {
        &self.inner
    }
}

impl fmt::Debug for P256SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P256SecretKey")
            .field("usage", &self.usage)
            .field("extractable", &self.extractable)
            .finish_non_exhaustive()
    }
}

/// A P-256 key pair, either the application server's ECDH identity or its
/// VAPID signing identity.
#[derive(Clone, Debug)]
pub struct KeyPair {
    public_key: P256PublicKey,
    secret_key: P256SecretKey,
}

impl KeyPair {
    pub(crate) fn from_secret_key(secret_key: P256SecretKey) -> Self {
        Self { public_key: secret_key.public_key(), secret_key }
    }

    /// Build a key pair out of a raw public point and the private scalar
    /// belonging to it.
    pub fn from_raw(
        public_raw: &[u8],
        private_scalar: &[u8],
        usage: KeyUsage,
        extractable: bool,
    ) -> Result<Self, KeyError> {
        let public_key = P256PublicKey::from_raw(public_raw)?;
        let jwk = raw_to_jwk(public_raw, Some(private_scalar))?;
        let secret_key = P256SecretKey::from_jwk(&jwk, usage, extractable)?;

        Ok(Self { public_key, secret_key })
    }

    /// Build a key pair out of a public and a private [`Jwk`].
    pub fn from_jwk(
        public_key: &Jwk,
        private_key: &Jwk,
        usage: KeyUsage,
        extractable: bool,
    ) -> Result<Self, KeyError> {
        let public_key = P256PublicKey::from_jwk(public_key)?;
        let secret_key = P256SecretKey::from_jwk(private_key, usage, extractable)?;

        if secret_key.public_key() == public_key {
            Ok(Self { public_key, secret_key })
        } else {
            Err(KeyError::MismatchedPublicKey)
        }
    }

    /// The public half of the key pair.
    pub const fn public_key(&self) -> &P256PublicKey {
        &self.public_key
    }

    /// The private half of the key pair.
    pub const fn secret_key(&self) -> &P256SecretKey {
        &self.secret_key
    }

    /// The usage this key pair was created with.
    pub const fn usage(&self) -> KeyUsage {
        self.secret_key.usage
    }

    /// Export both halves of the key pair as [`Jwk`]s, the public key first.
    pub fn to_jwk(&self) -> Result<(Jwk, Jwk), KeyError> {
        let private_key = self.secret_key.to_jwk()?;
        let public_key = self.public_key.to_jwk(self.usage());

        Ok((public_key, private_key))
    }
}

/// The output of an elliptic curve Diffie-Hellman key agreement, the X
/// coordinate of the shared point.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Wrap raw shared secret bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// View the shared secret as a byte array.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;

    const AS_PUBLIC: &str =
        "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";
    const AS_PRIVATE: &str = "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw";
    const UA_PUBLIC: &str =
        "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";

    fn as_key_pair(extractable: bool) -> KeyPair {
        KeyPair::from_raw(
            &base64url_decode(AS_PUBLIC).unwrap(),
            &base64url_decode(AS_PRIVATE).unwrap(),
            KeyUsage::Ecdh,
            extractable,
        )
        .unwrap()
    }

    #[test]
    fn raw_public_key_roundtrip() {
        let key = P256PublicKey::from_base64(AS_PUBLIC).unwrap();

        assert_eq!(key.to_base64(), AS_PUBLIC);
        assert_eq!(key.to_raw()[0], UNCOMPRESSED_POINT_TAG);
    }

    #[test]
    fn point_off_the_curve_is_rejected() {
        let mut raw = [1u8; RAW_PUBLIC_KEY_LENGTH];
        raw[0] = UNCOMPRESSED_POINT_TAG;

        assert_matches!(P256PublicKey::from_raw(&raw), Err(KeyError::InvalidPoint));
    }

    #[test]
    fn short_public_key_is_rejected() {
        let raw = base64url_decode(AS_PUBLIC).unwrap();

        assert_matches!(
            P256PublicKey::from_raw(&raw[..64]),
            Err(KeyError::InvalidKeyLength { length: 64, .. })
        );
    }

    #[test]
    fn zero_scalar_is_rejected() {
        assert_matches!(
            P256SecretKey::from_scalar(&[0u8; 32], KeyUsage::Ecdsa, true),
            Err(KeyError::InvalidScalar)
        );
    }

    #[test]
    fn key_pair_from_raw_matches_public_key() {
        let key_pair = as_key_pair(false);

        assert_eq!(key_pair.public_key().to_base64(), AS_PUBLIC);
        assert_eq!(key_pair.secret_key().public_key(), *key_pair.public_key());
        assert_eq!(key_pair.usage(), KeyUsage::Ecdh);
    }

    #[test]
    fn key_pair_from_raw_rejects_foreign_public_key() {
        assert_matches!(
            KeyPair::from_raw(
                &base64url_decode(UA_PUBLIC).unwrap(),
                &base64url_decode(AS_PRIVATE).unwrap(),
                KeyUsage::Ecdh,
                false,
            ),
            Err(KeyError::MismatchedPublicKey)
        );
    }

    #[test]
    fn non_extractable_key_cannot_be_exported() {
        let key_pair = as_key_pair(false);

        assert!(!key_pair.secret_key().is_extractable());
        assert_matches!(key_pair.secret_key().to_scalar(), Err(KeyError::NotExtractable));
        assert_matches!(key_pair.to_jwk(), Err(KeyError::NotExtractable));
    }

    #[test]
    fn extractable_key_exports_its_scalar() {
        let key_pair = as_key_pair(true);
        let scalar = key_pair.secret_key().to_scalar().unwrap();

        assert_eq!(base64url_encode(scalar.as_slice()), AS_PRIVATE);
    }

    #[test]
    fn jwk_roundtrip_preserves_key_material() {
        let key_pair = as_key_pair(true);
        let (public_jwk, private_jwk) = key_pair.to_jwk().unwrap();

        assert_eq!(private_jwk.d.as_deref(), Some(AS_PRIVATE));
        assert_eq!(public_jwk.d, None);
        assert_eq!(private_jwk.key_ops, ["deriveKey"]);

        let imported = KeyPair::from_jwk(&public_jwk, &private_jwk, KeyUsage::Ecdh, true).unwrap();

        assert_eq!(imported.public_key(), key_pair.public_key());
        assert_eq!(imported.to_jwk().unwrap(), (public_jwk, private_jwk));
    }

    #[test]
    fn non_extractable_jwk_cannot_be_escalated() {
        let key_pair = as_key_pair(true);
        let (_, mut private_jwk) = key_pair.to_jwk().unwrap();
        private_jwk.ext = Some(false);

        assert_matches!(
            P256SecretKey::from_jwk(&private_jwk, KeyUsage::Ecdh, true),
            Err(KeyError::NotExtractable)
        );
        assert!(P256SecretKey::from_jwk(&private_jwk, KeyUsage::Ecdh, false).is_ok());
    }

    #[test]
    fn public_jwk_is_not_a_private_key() {
        let key_pair = as_key_pair(true);
        let (public_jwk, _) = key_pair.to_jwk().unwrap();

        assert_matches!(
            P256SecretKey::from_jwk(&public_jwk, KeyUsage::Ecdh, true),
            Err(KeyError::MissingPrivateKey)
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let key_pair = as_key_pair(true);

        insta::assert_snapshot!(
            format!("{:?}", key_pair.secret_key()),
            @"P256SecretKey { usage: Ecdh, extractable: true, .. }"
        );
        insta::assert_snapshot!(
            format!("{:?}", SharedSecret::from_bytes([1; 32])),
            @"SharedSecret(<redacted>)"
        );
    }
}
