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

//! The sending side of the Web Push protocol
//!
//! This crate implements what an application server needs to deliver
//! encrypted [Web Push] messages to a browser: the message encryption key
//! derivation from [RFC 8291], the [VAPID] sender identification from RFC
//! 8292, and the `aes128gcm` content encoding from [RFC 8188].
//!
//! [Web Push]: https://www.rfc-editor.org/rfc/rfc8030
//! [RFC 8291]: https://www.rfc-editor.org/rfc/rfc8291
//! [VAPID]: https://www.rfc-editor.org/rfc/rfc8292
//! [RFC 8188]: https://www.rfc-editor.org/rfc/rfc8188
//!
//! # Overview
//!
//! An [`ApplicationServer`] holds two long lived P-256 key pairs. The ECDH key
//! pair is mixed into the encryption key of every message, the ECDSA key pair
//! signs the VAPID tokens that identify the server to push services. Once a
//! browser hands over a [`PushSubscription`], the server creates a
//! [`PushSubscriber`] for it, which encrypts and delivers messages to that one
//! subscription.
//!
//! Sending a message goes through the following steps, each one feeding its
//! output into the next one:
//!
//! 1. ECDH between the application server's key and the subscription's
//!    `p256dh` key, computed once per subscriber.
//! 2. Derivation of the input keying material, see the [`derivation`] module.
//! 3. Encryption of the payload using a [`ContentEncoder`].
//! 4. Signing of a VAPID token for the origin of the subscription endpoint.
//! 5. A single HTTP `POST` to the endpoint using a [`PushTransport`].
//!
//! Nothing is sent if any of the steps before the last one fails.
//!
//! # Example
//!
//! ```rust
//! use web_push_server::{
//!     ApplicationServer, PushOptions, PushSubscription, RustCryptoProvider,
//!     transport::{PushRequest, PushResponse, PushTransport, TransportError},
//!     vapid::VapidKeys,
//! };
//!
//! // A real deployment would use the `ReqwestTransport` instead.
//! struct AcceptEverything;
//!
//! impl PushTransport for AcceptEverything {
//!     fn send(&self, _: PushRequest) -> Result<PushResponse, TransportError> {
//!         Ok(PushResponse::new(201))
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let provider = RustCryptoProvider::new();
//!     let vapid_keys = VapidKeys::generate(&provider, false);
//!     let server = ApplicationServer::new(provider, "mailto:admin@example.com", vapid_keys);
//!
//!     // The browser passes this to `pushManager.subscribe()` as the
//!     // `applicationServerKey`.
//!     let _application_server_key = server.vapid_public_key_base64();
//!
//!     let subscription: PushSubscription = serde_json::from_str(
//!         r#"{
//!             "endpoint": "https://push.example.net/push/JzLQ3raZJfFBR0aqvOMsLrt54w4rJUsV",
//!             "keys": {
//!                 "auth": "BTBZMqHH6r4Tts7J_aSIgg",
//!                 "p256dh": "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4"
//!             }
//!         }"#,
//!     )?;
//!
//!     let subscriber = server.subscribe(subscription);
//!     subscriber.push_text_message(&AcceptEverything, "Hello there", &PushOptions::default())?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Persisting the VAPID keys
//!
//! Push services tie every subscription to the VAPID public key it was created
//! with, the VAPID key pair therefore needs to survive restarts. It can be
//! exported as a pair of JSON Web Keys, as long as it was created as
//! extractable.
//!
//! ```rust
//! use web_push_server::{RustCryptoProvider, vapid::VapidKeys};
//!
//! # fn main() -> anyhow::Result<()> {
//! let vapid_keys = VapidKeys::generate(&RustCryptoProvider::new(), true);
//!
//! let exported = vapid_keys.export()?;
//! let json = serde_json::to_string(&exported)?;
//!
//! let imported = VapidKeys::from_exported(&serde_json::from_str(&json)?, true)?;
//! assert_eq!(imported.application_server_key(), vapid_keys.application_server_key());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod server;
mod types;
mod utilities;

pub mod derivation;
pub mod ece;
pub mod kdf;
pub mod provider;
pub mod transport;
pub mod vapid;

pub use base64::DecodeError as Base64DecodeError;
pub use ece::{Aes128Gcm, ContentEncoder, EncodingError};
pub use provider::{CryptoProvider, DeterministicProvider, RustCryptoProvider};
pub use server::{
    ApplicationServer, DEFAULT_TTL, PushDeliveryError, PushError, PushOptions, PushSubscriber,
    PushSubscription, SubscriptionKeys, UnknownUrgency, Urgency,
};
pub use transport::{PushTransport, TransportError};
pub use types::{
    Jwk, KeyError, KeyPair, KeyUsage, P256PublicKey, P256SecretKey, RAW_PUBLIC_KEY_LENGTH,
    RawPublicKey, SECRET_KEY_LENGTH, SharedSecret, UNCOMPRESSED_POINT_TAG, jwk_to_raw, raw_to_jwk,
};
pub use utilities::{base64url_decode, base64url_encode};

/// Error type describing the ways a signature can fail to be created.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The private key can't be used to sign, most likely because it was
    /// created for a key agreement.
    #[error("The key can't be used for signing: {0}")]
    Key(#[from] KeyError),
    /// The token claims couldn't be serialized.
    #[error("The token claims couldn't be serialized: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error type describing the ways the message encryption key derivation can
/// fail.
#[derive(Debug, thiserror::Error)]
pub enum KeyDerivationError {
    /// Our private key can't be used for a key agreement, most likely because
    /// it was created for signing.
    #[error("The key can't be used for a key agreement: {0}")]
    Key(#[from] KeyError),
    /// The subscription contains a public key that isn't a valid P-256 point.
    #[error("The subscription contains an invalid public key: {0}")]
    InvalidPublicKey(KeyError),
    /// The authentication secret of the subscription wasn't valid URL-safe
    /// base64.
    #[error("The subscription contains an invalid auth secret: {0}")]
    InvalidAuthSecret(base64::DecodeError),
}

/// The version of web-push-server that is being used.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");
