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

mod subscriber;

use std::{fmt, str::FromStr, sync::OnceLock};

use serde::{Deserialize, Serialize};
pub use subscriber::PushSubscriber;
use thiserror::Error;

use crate::{
    CryptoProvider, EncodingError, KeyDerivationError, KeyError, RustCryptoProvider,
    SigningError,
    ece::{Aes128Gcm, ContentEncoder},
    transport::{PushResponse, TransportError},
    types::{KeyPair, KeyUsage, RawPublicKey},
    utilities::base64url_encode,
    vapid::VapidKeys,
};

/// The default time to live of a push message, four weeks in seconds.
pub const DEFAULT_TTL: u32 = 2_419_200;

/// The push service rejected the message.
#[derive(Debug, Error)]
#[error(
    "Pushing the message failed: {}{}",
    .response.status,
    .response.reason.as_deref().map(|reason| format!(" {reason}")).unwrap_or_default()
)]
pub struct PushDeliveryError {
    /// The response of the push service.
    pub response: PushResponse,
}

impl PushDeliveryError {
    /// Does the subscription no longer exist.
    ///
    /// Push services respond with `410 Gone` once the user unsubscribed or the
    /// subscription expired. The subscription should be deleted, pushing to it
    /// again will never succeed.
    pub fn is_gone(&self) -> bool {
        self.response.status == 410
    }

    /// The HTTP status the push service responded with.
    pub fn status(&self) -> u16 {
        self.response.status
    }
}

/// Error type describing the ways a push can fail.
#[derive(Debug, Error)]
pub enum PushError {
    /// The subscription endpoint isn't a valid URL.
    #[error("The subscription endpoint isn't a valid URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    /// The subscription endpoint has no origin that could be used as the
    /// VAPID audience.
    #[error("The subscription endpoint {0} has no origin")]
    OpaqueEndpoint(String),
    /// A key couldn't be used.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// The message encryption key couldn't be derived.
    #[error(transparent)]
    KeyDerivation(#[from] KeyDerivationError),
    /// The VAPID token couldn't be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The payload couldn't be encrypted.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The request didn't produce a response.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The push service responded with a non-2xx status.
    #[error(transparent)]
    Delivery(#[from] PushDeliveryError),
}

impl PushError {
    /// Does the subscription no longer exist, see
    /// [`PushDeliveryError::is_gone()`].
    pub fn is_gone(&self) -> bool {
        matches!(self, PushError::Delivery(e) if e.is_gone())
    }
}

/// How urgently a message needs to be delivered, push services use this to
/// save battery on the user's device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// On power and Wi-Fi.
    VeryLow,
    /// On either power or Wi-Fi.
    Low,
    /// On neither power nor Wi-Fi.
    #[default]
    Normal,
    /// Low battery.
    High,
}

impl Urgency {
    /// The value of the `Urgency` header.
    pub const fn as_str(self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The urgency string isn't one of the four known values.
#[derive(Debug, Error)]
#[error("Unknown urgency {0}, expected very-low, low, normal or high")]
pub struct UnknownUrgency(String);

impl FromStr for Urgency {
    type Err = UnknownUrgency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            _ => Err(UnknownUrgency(s.to_owned())),
        }
    }
}

/// Options for a single push message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushOptions {
    /// How urgently the message needs to be delivered.
    pub urgency: Urgency,
    /// How long, in seconds, the push service keeps the message if the user
    /// agent isn't reachable.
    pub ttl: u32,
    /// Messages with the same topic replace each other while they are waiting
    /// for delivery.
    pub topic: Option<String>,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self { urgency: Urgency::default(), ttl: DEFAULT_TTL, topic: None }
    }
}

/// The keys of a [`PushSubscription`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// The base64url encoded authentication secret.
    pub auth: String,
    /// The base64url encoded raw P-256 public key of the user agent.
    pub p256dh: String,
}

/// A push subscription, as produced by `PushSubscription.toJSON()` in the
/// browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    /// The URL messages for this subscription are sent to.
    pub endpoint: String,
    /// When the subscription expires, in milliseconds since the UNIX epoch.
    ///
    /// This is informational, push services report expired subscriptions as
    /// gone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<u64>,
    /// The keys used to encrypt messages for this subscription.
    pub keys: SubscriptionKeys,
}

/// A Web Push application server.
///
/// The application server owns an ECDH key pair, used to encrypt messages,
/// and the VAPID key pair, used to identify itself to push services.
pub struct ApplicationServer<P = RustCryptoProvider> {
    provider: P,
    contact_information: String,
    keys: KeyPair,
    vapid_keys: VapidKeys,
    content_encoder: Box<dyn ContentEncoder + Send + Sync>,
    public_key_raw: OnceLock<RawPublicKey>,
    vapid_public_key_raw: OnceLock<RawPublicKey>,
}

impl<P: CryptoProvider> ApplicationServer<P> {
    /// Create a new application server with a freshly generated,
    /// non-extractable, ECDH key pair.
    ///
    /// The contact information is used verbatim as the `sub` claim of the
    /// VAPID tokens, it should be a `mailto:` or `https:` URI.
    pub fn new(provider: P, contact_information: impl Into<String>, vapid_keys: VapidKeys) -> Self {
        let keys = provider.generate_key_pair(KeyUsage::Ecdh, false);

        Self::from_parts(provider, contact_information.into(), keys, vapid_keys)
    }

    /// Create a new application server using an existing ECDH key pair.
    pub fn with_keys(
        provider: P,
        contact_information: impl Into<String>,
        vapid_keys: VapidKeys,
        keys: KeyPair,
    ) -> Result<Self, KeyError> {
        keys.secret_key().check_usage(KeyUsage::Ecdh)?;

        Ok(Self::from_parts(provider, contact_information.into(), keys, vapid_keys))
    }

    fn from_parts(
        provider: P,
        contact_information: String,
        keys: KeyPair,
        vapid_keys: VapidKeys,
    ) -> Self {
        Self {
            provider,
            contact_information,
            keys,
            vapid_keys,
            content_encoder: Box::new(Aes128Gcm::default()),
            public_key_raw: OnceLock::new(),
            vapid_public_key_raw: OnceLock::new(),
        }
    }

    /// Replace the content encoder, by default the `aes128gcm` encoding with
    /// a record size of 4096 bytes is used.
    pub fn with_content_encoder(
        mut self,
        encoder: impl ContentEncoder + Send + Sync + 'static,
    ) -> Self {
        self.content_encoder = Box::new(encoder);
        self
    }

    /// The contact information put into the VAPID tokens.
    pub fn contact_information(&self) -> &str {
        &self.contact_information
    }

    /// The ECDH key pair of the application server.
    pub const fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// The VAPID key pair of the application server.
    pub const fn vapid_keys(&self) -> &VapidKeys {
        &self.vapid_keys
    }

    /// The raw public key of the ECDH key pair.
    pub fn public_key_raw(&self) -> &RawPublicKey {
        self.public_key_raw.get_or_init(|| self.keys.public_key().to_raw())
    }

    /// The raw public key of the VAPID key pair.
    pub fn vapid_public_key_raw(&self) -> &RawPublicKey {
        self.vapid_public_key_raw.get_or_init(|| self.vapid_keys.public_key_raw())
    }

    /// The base64url encoded raw VAPID public key.
    ///
    /// This is what the receiving side passes to the browser as the
    /// `applicationServerKey`, usually served from a dedicated endpoint.
    pub fn vapid_public_key_base64(&self) -> String {
        base64url_encode(self.vapid_public_key_raw())
    }

    /// Create a subscriber for the given subscription.
    pub fn subscribe(&self, subscription: PushSubscription) -> PushSubscriber<'_, P> {
        PushSubscriber::new(self, subscription)
    }

    pub(crate) const fn provider(&self) -> &P {
        &self.provider
    }

    pub(crate) fn content_encoder(&self) -> &(dyn ContentEncoder + Send + Sync) {
        self.content_encoder.as_ref()
    }
}

impl<P: fmt::Debug> fmt::Debug for ApplicationServer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationServer")
            .field("provider", &self.provider)
            .field("contact_information", &self.contact_information)
            .field("public_key", self.keys.public_key())
            .field("vapid_public_key", self.vapid_keys.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;
    use crate::DeterministicProvider;

    fn server() -> ApplicationServer<DeterministicProvider> {
        let provider = DeterministicProvider::new(42);
        let vapid_keys = VapidKeys::generate(&provider, false);

        ApplicationServer::new(provider, "mailto:admin@example.com", vapid_keys)
    }

    #[test]
    fn subscription_json_parses() {
        let subscription: PushSubscription = serde_json::from_str(
            r#"{
                "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
                "expirationTime": null,
                "keys": { "auth": "BTBZMqHH6r4Tts7J_aSIgg", "p256dh": "BCVx" }
            }"#,
        )
        .unwrap();

        assert_eq!(subscription.endpoint, "https://fcm.googleapis.com/fcm/send/abc");
        assert_eq!(subscription.expiration_time, None);
        assert_eq!(subscription.keys.auth, "BTBZMqHH6r4Tts7J_aSIgg");
    }

    #[test]
    fn raw_public_keys_are_memoized() {
        let server = server();

        let first = server.public_key_raw();
        let second = server.public_key_raw();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, &server.keys().public_key().to_raw());

        let first = server.vapid_public_key_raw();
        let second = server.vapid_public_key_raw();
        assert!(std::ptr::eq(first, second));
        assert_eq!(server.vapid_public_key_base64(), server.vapid_keys().application_server_key());
    }

    #[test]
    fn generated_keys_are_ecdh_and_not_extractable() {
        let server = server();

        assert_eq!(server.keys().usage(), KeyUsage::Ecdh);
        assert!(!server.keys().secret_key().is_extractable());
    }

    #[test]
    fn signing_keys_are_rejected_as_ecdh_keys() {
        let provider = DeterministicProvider::new(1);
        let vapid_keys = VapidKeys::generate(&provider, false);
        let signing_keys = provider.generate_key_pair(KeyUsage::Ecdsa, false);

        assert_matches!(
            ApplicationServer::with_keys(
                provider,
                "mailto:a@example.com",
                vapid_keys,
                signing_keys
            ),
            Err(KeyError::WrongKeyUsage { expected: KeyUsage::Ecdh, got: KeyUsage::Ecdsa })
        );
    }

    #[test]
    fn urgency_strings() {
        for urgency in [Urgency::VeryLow, Urgency::Low, Urgency::Normal, Urgency::High] {
            assert_eq!(urgency.to_string().parse::<Urgency>().unwrap(), urgency);
            assert_eq!(
                serde_json::to_string(&urgency).unwrap(),
                format!("\"{}\"", urgency.as_str())
            );
        }

        assert!("urgent".parse::<Urgency>().is_err());
    }

    #[test]
    fn default_options() {
        let options = PushOptions::default();

        assert_eq!(options.urgency, Urgency::Normal);
        assert_eq!(options.ttl, 2_419_200);
        assert_eq!(options.topic, None);
    }

    #[test]
    fn only_410_is_gone() {
        let gone = PushError::from(PushDeliveryError { response: PushResponse::new(410) });
        let not_found = PushError::from(PushDeliveryError { response: PushResponse::new(404) });

        assert!(gone.is_gone());
        assert!(!not_found.is_gone());
        assert!(!PushError::OpaqueEndpoint("data:,".to_owned()).is_gone());
    }

    #[test]
    fn delivery_error_display() {
        let error = PushDeliveryError {
            response: PushResponse {
                status: 410,
                reason: Some("Gone".to_owned()),
                body: Vec::new(),
            },
        };
        insta::assert_snapshot!(error, @"Pushing the message failed: 410 Gone");

        let error = PushDeliveryError { response: PushResponse::new(503) };
        insta::assert_snapshot!(error, @"Pushing the message failed: 503");
    }

    #[test]
    fn application_server_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<ApplicationServer<RustCryptoProvider>>();
        assert_send_sync::<ApplicationServer<DeterministicProvider>>();
        assert_send_sync::<PushSubscriber<'static, RustCryptoProvider>>();
    }
}
