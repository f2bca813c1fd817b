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

//! The elliptic curve primitives the application server is built on.
//!
//! Every component that needs randomness, a key agreement, or a signature
//! receives a [`CryptoProvider`] explicitly. [`RustCryptoProvider`] is the one
//! to use in production, [`DeterministicProvider`] replaces the randomness
//! with a seeded generator so that whole push operations can be replayed in
//! tests.

use std::sync::{Mutex, PoisonError};

use p256::{
    SecretKey,
    ecdh::diffie_hellman,
    ecdsa::{Signature, SigningKey, signature::Signer},
};
use rand::{CryptoRng, RngCore, SeedableRng, rngs::StdRng, thread_rng};

use crate::{
    KeyDerivationError, SigningError,
    types::{KeyPair, KeyUsage, P256PublicKey, P256SecretKey, SharedSecret},
};

/// The length of an ES256 signature in its fixed-size `r || s` form.
pub const SIGNATURE_LENGTH: usize = 64;

/// The set of elliptic curve operations the application server needs.
pub trait CryptoProvider {
    /// Generate a fresh P-256 key pair for the given usage.
    fn generate_key_pair(&self, usage: KeyUsage, extractable: bool) -> KeyPair;

    /// Agree on a shared secret between our private key and a peer's public
    /// key.
    ///
    /// Fails if the private key wasn't created for [`KeyUsage::Ecdh`].
    fn ecdh(
        &self,
        secret_key: &P256SecretKey,
        public_key: &P256PublicKey,
    ) -> Result<SharedSecret, KeyDerivationError>;

    /// Sign the message using ECDSA over P-256 with SHA-256.
    ///
    /// The signature is returned as the concatenation of `r` and `s`, the
    /// encoding JOSE mandates for ES256, not as a DER structure. Fails if the
    /// private key wasn't created for [`KeyUsage::Ecdsa`].
    fn sign_es256(
        &self,
        secret_key: &P256SecretKey,
        message: &[u8],
    ) -> Result<[u8; SIGNATURE_LENGTH], SigningError>;

    /// Fill the buffer with random bytes.
    fn fill_random(&self, buffer: &mut [u8]);
}

/// A [`CryptoProvider`] backed by the RustCrypto `p256` crate and the thread
/// local random number generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    /// Create a new [`RustCryptoProvider`].
    pub const fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn generate_key_pair(&self, usage: KeyUsage, extractable: bool) -> KeyPair {
        generate_key_pair(&mut thread_rng(), usage, extractable)
    }

    fn ecdh(
        &self,
        secret_key: &P256SecretKey,
        public_key: &P256PublicKey,
    ) -> Result<SharedSecret, KeyDerivationError> {
        p256_ecdh(secret_key, public_key)
    }

    fn sign_es256(
        &self,
        secret_key: &P256SecretKey,
        message: &[u8],
    ) -> Result<[u8; SIGNATURE_LENGTH], SigningError> {
        es256_sign(secret_key, message)
    }

    fn fill_random(&self, buffer: &mut [u8]) {
        thread_rng().fill_bytes(buffer);
    }
}

/// An in-memory [`CryptoProvider`] whose randomness comes from a seeded
/// generator.
///
/// Two providers created with the same seed generate the same keys and the
/// same salts, in the same order. The ECDH result can additionally be pinned
/// to a fixed value to exercise the key derivation with known inputs.
///
/// **Do not** use this outside of tests, the keys it generates are only as
/// secret as the seed.
#[derive(Debug)]
pub struct DeterministicProvider {
    rng: Mutex<StdRng>,
    ecdh_secret: Option<SharedSecret>,
}

impl DeterministicProvider {
    /// Create a provider seeded with the given value.
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)), ecdh_secret: None }
    }

    /// Make every key agreement return the given secret instead of the real
    /// ECDH result.
    pub fn with_ecdh_secret(mut self, secret: SharedSecret) -> Self {
        self.ecdh_secret = Some(secret);
        self
    }
}

impl CryptoProvider for DeterministicProvider {
    fn generate_key_pair(&self, usage: KeyUsage, extractable: bool) -> KeyPair {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        generate_key_pair(&mut *rng, usage, extractable)
    }

    fn ecdh(
        &self,
        secret_key: &P256SecretKey,
        public_key: &P256PublicKey,
    ) -> Result<SharedSecret, KeyDerivationError> {
        match &self.ecdh_secret {
            Some(secret) => {
                secret_key.check_usage(KeyUsage::Ecdh)?;
                Ok(secret.clone())
            }
            None => p256_ecdh(secret_key, public_key),
        }
    }

    fn sign_es256(
        &self,
        secret_key: &P256SecretKey,
        message: &[u8],
    ) -> Result<[u8; SIGNATURE_LENGTH], SigningError> {
        es256_sign(secret_key, message)
    }

    fn fill_random(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}

fn generate_key_pair(
    rng: &mut (impl CryptoRng + RngCore),
    usage: KeyUsage,
    extractable: bool,
) -> KeyPair {
    let secret_key = P256SecretKey::new(SecretKey::random(rng), usage, extractable);
    log::debug!("Generated a new {usage} key pair, extractable: {extractable}");

    KeyPair::from_secret_key(secret_key)
}

fn p256_ecdh(
    secret_key: &P256SecretKey,
    public_key: &P256PublicKey,
) -> Result<SharedSecret, KeyDerivationError> {
    secret_key.check_usage(KeyUsage::Ecdh)?;

    let shared =
        diffie_hellman(secret_key.inner().to_nonzero_scalar(), public_key.inner().as_affine());

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(shared.raw_secret_bytes());

    Ok(SharedSecret::from_bytes(bytes))
}

fn es256_sign(
    secret_key: &P256SecretKey,
    message: &[u8],
) -> Result<[u8; SIGNATURE_LENGTH], SigningError> {
    secret_key.check_usage(KeyUsage::Ecdsa)?;

    let signing_key = SigningKey::from(secret_key.inner());
    let signature: Signature = signing_key.sign(message);

    let mut bytes = [0u8; SIGNATURE_LENGTH];
    bytes.copy_from_slice(&signature.to_bytes());

    Ok(bytes)
}
