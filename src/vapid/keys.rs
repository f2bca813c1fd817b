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

use serde::{Deserialize, Serialize};

use super::{VapidClaims, VapidToken};
use crate::{
    CryptoProvider, KeyError, SigningError,
    types::{Jwk, KeyPair, KeyUsage, P256PublicKey, RawPublicKey},
    utilities::base64url_encode,
};

/// The VAPID key pair in its persisted form, a pair of JSON Web Keys.
///
/// This is the format the key generation command writes out:
///
/// ```json
/// { "publicKey": { "kty": "EC", ... }, "privateKey": { "kty": "EC", "d": "...", ... } }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedVapidKeys {
    /// The public key, without the private scalar.
    pub public_key: Jwk,
    /// The private key, including the public coordinates.
    pub private_key: Jwk,
}

/// The ECDSA P-256 key pair used to sign VAPID tokens.
#[derive(Clone, Debug)]
pub struct VapidKeys {
    key_pair: KeyPair,
}

impl VapidKeys {
    /// Generate a new random VAPID key pair.
    ///
    /// Only key pairs created as `extractable` can be exported later on.
    pub fn generate<P: CryptoProvider + ?Sized>(provider: &P, extractable: bool) -> Self {
        let key_pair = provider.generate_key_pair(KeyUsage::Ecdsa, extractable);
        log::info!("Generated a new VAPID key pair {}", key_pair.public_key().to_base64());

        Self { key_pair }
    }

    /// Import a VAPID key pair that was previously exported with
    /// [`VapidKeys::export()`].
    ///
    /// A private key that was exported as non-extractable can't be imported
    /// as extractable.
    pub fn from_exported(
        exported: &ExportedVapidKeys,
        extractable: bool,
    ) -> Result<Self, KeyError> {
        let key_pair = KeyPair::from_jwk(
            &exported.public_key,
            &exported.private_key,
            KeyUsage::Ecdsa,
            extractable,
        )?;

        Ok(Self { key_pair })
    }

    /// Import a VAPID key pair from the raw public point and the private
    /// scalar, the format most other Web Push libraries store the keys in.
    pub fn from_raw(
        public_raw: &[u8],
        private_scalar: &[u8],
        extractable: bool,
    ) -> Result<Self, KeyError> {
        let key_pair = KeyPair::from_raw(public_raw, private_scalar, KeyUsage::Ecdsa, extractable)?;

        Ok(Self { key_pair })
    }

    /// Wrap an existing key pair, it must have been created for signing.
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self, KeyError> {
        key_pair.secret_key().check_usage(KeyUsage::Ecdsa)?;

        Ok(Self { key_pair })
    }

    /// Export the key pair so it can be persisted.
    ///
    /// Fails with [`KeyError::NotExtractable`] if the key pair wasn't created
    /// as extractable.
    pub fn export(&self) -> Result<ExportedVapidKeys, KeyError> {
        let (public_key, private_key) = self.key_pair.to_jwk()?;

        Ok(ExportedVapidKeys { public_key, private_key })
    }

    /// The public half of the key pair.
    pub const fn public_key(&self) -> &P256PublicKey {
        self.key_pair.public_key()
    }

    /// The public key as a raw uncompressed point, the `k` parameter of the
    /// VAPID `Authorization` header.
    pub fn public_key_raw(&self) -> RawPublicKey {
        self.key_pair.public_key().to_raw()
    }

    /// The base64url encoded raw public key.
    ///
    /// Browsers expect this as the `applicationServerKey` option when
    /// subscribing.
    pub fn application_server_key(&self) -> String {
        base64url_encode(self.public_key_raw())
    }

    /// The underlying key pair.
    pub const fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Sign a new VAPID token with the given claims.
    pub fn forge_token<P: CryptoProvider + ?Sized>(
        &self,
        provider: &P,
        claims: &VapidClaims,
    ) -> Result<VapidToken, SigningError> {
        VapidToken::forge(provider, self.key_pair.secret_key(), claims)
    }
}
