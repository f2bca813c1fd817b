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

use std::{
    sync::OnceLock,
    time::{SystemTime, UNIX_EPOCH},
};

use url::Url;
use zeroize::Zeroizing;

use super::{ApplicationServer, PushDeliveryError, PushError, PushOptions, PushSubscription};
use crate::{
    CryptoProvider, KeyDerivationError, RustCryptoProvider,
    derivation::{self, Ikm},
    ece::{EncodingHeader, SALT_LENGTH},
    transport::{PushRequest, PushResponse, PushTransport},
    types::{P256PublicKey, SharedSecret},
    utilities::base64url_decode,
    vapid::{VapidClaims, VapidToken},
};

/// A single push subscription of an [`ApplicationServer`].
///
/// The subscriber's public key and the ECDH secret are computed on the first
/// push and reused for every following message.
pub struct PushSubscriber<'a, P = RustCryptoProvider> {
    server: &'a ApplicationServer<P>,
    subscription: PushSubscription,
    public_key: OnceLock<P256PublicKey>,
    ecdh_secret: OnceLock<SharedSecret>,
}

impl<'a, P: CryptoProvider> PushSubscriber<'a, P> {
    pub(super) fn new(server: &'a ApplicationServer<P>, subscription: PushSubscription) -> Self {
        Self { server, subscription, public_key: OnceLock::new(), ecdh_secret: OnceLock::new() }
    }

    /// The subscription this subscriber pushes to.
    pub const fn subscription(&self) -> &PushSubscription {
        &self.subscription
    }

    /// The application server this subscriber belongs to.
    pub const fn server(&self) -> &'a ApplicationServer<P> {
        self.server
    }

    /// The public key of the user agent, the `p256dh` key of the
    /// subscription.
    pub fn public_key(&self) -> Result<&P256PublicKey, KeyDerivationError> {
        if let Some(public_key) = self.public_key.get() {
            return Ok(public_key);
        }

        let public_key = P256PublicKey::from_base64(&self.subscription.keys.p256dh)
            .map_err(KeyDerivationError::InvalidPublicKey)?;

        Ok(self.public_key.get_or_init(|| public_key))
    }

    fn ecdh_secret(&self) -> Result<&SharedSecret, KeyDerivationError> {
        if let Some(secret) = self.ecdh_secret.get() {
            return Ok(secret);
        }

        let secret =
            self.server.provider().ecdh(self.server.keys().secret_key(), self.public_key()?)?;

        Ok(self.ecdh_secret.get_or_init(|| secret))
    }

    /// Derive the input keying material for the content encoding of a
    /// message to this subscriber.
    pub fn derive_ikm(&self) -> Result<Ikm, KeyDerivationError> {
        let auth_secret = Zeroizing::new(
            base64url_decode(&self.subscription.keys.auth)
                .map_err(KeyDerivationError::InvalidAuthSecret)?,
        );

        derivation::derive_ikm(
            self.server.public_key_raw(),
            &self.public_key()?.to_raw(),
            &auth_secret,
            self.ecdh_secret()?,
        )
    }

    /// Forge the VAPID token for this subscription, expiring one hour after
    /// `now`.
    ///
    /// `now` is in seconds since the UNIX epoch. The audience of the token is
    /// the origin of the subscription endpoint.
    pub fn forge_vapid_token_at(&self, now: u64) -> Result<VapidToken, PushError> {
        let endpoint = Url::parse(&self.subscription.endpoint)?;
        self.forge_vapid_token(&endpoint, now)
    }

    fn forge_vapid_token(&self, endpoint: &Url, now: u64) -> Result<VapidToken, PushError> {
        let origin = endpoint.origin();

        if !origin.is_tuple() {
            return Err(PushError::OpaqueEndpoint(endpoint.to_string()));
        }

        let claims = VapidClaims::expiring_after(
            self.server.contact_information(),
            origin.ascii_serialization(),
            now,
        );

        Ok(self.server.vapid_keys().forge_token(self.server.provider(), &claims)?)
    }

    /// Encrypt the payload and send it to the push service.
    ///
    /// Every step has to succeed before the request is sent. A response with
    /// a non-2xx status is returned as a [`PushDeliveryError`], use
    /// [`PushError::is_gone()`] to find out if the subscription should be
    /// deleted.
    pub fn push_message<T: PushTransport + ?Sized>(
        &self,
        transport: &T,
        payload: &[u8],
        options: &PushOptions,
    ) -> Result<PushResponse, PushError> {
        let endpoint = Url::parse(&self.subscription.endpoint)?;

        let ikm = self.derive_ikm()?;

        let mut salt = [0u8; SALT_LENGTH];
        self.server.provider().fill_random(&mut salt);

        let encoder = self.server.content_encoder();
        let header = EncodingHeader { salt, key_id: self.server.public_key_raw() };
        let body = encoder.encode(payload, &ikm, &header)?;

        let token = self.forge_vapid_token(&endpoint, unix_timestamp())?;

        let mut headers = vec![
            ("Authorization", token.authorization_header(self.server.vapid_public_key_raw())),
            ("Content-Encoding", encoder.content_encoding().to_owned()),
            ("Content-Type", "application/octet-stream".to_owned()),
            ("TTL", options.ttl.to_string()),
            ("Urgency", options.urgency.to_string()),
        ];

        if let Some(topic) = &options.topic {
            headers.push(("Topic", topic.clone()));
        }

        let origin = endpoint.origin().ascii_serialization();
        log::debug!("Sending a push message of {} bytes to {origin}", body.len());

        let response = transport.send(PushRequest { endpoint, headers, body })?;

        if response.is_success() {
            log::debug!("The push service at {origin} accepted the message: {}", response.status);
            Ok(response)
        } else {
            let error = PushDeliveryError { response };

            if error.is_gone() {
                log::info!("The subscription at {origin} is gone");
            } else {
                log::warn!("Failed to push a message to {origin}: {error}");
            }

            Err(error.into())
        }
    }

    /// Push a UTF-8 text message, see [`PushSubscriber::push_message()`].
    pub fn push_text_message<T: PushTransport + ?Sized>(
        &self,
        transport: &T,
        text: &str,
        options: &PushOptions,
    ) -> Result<PushResponse, PushError> {
        self.push_message(transport, text.as_bytes(), options)
    }
}

impl<P> std::fmt::Debug for PushSubscriber<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSubscriber")
            .field("endpoint", &self.subscription.endpoint)
            .finish_non_exhaustive()
    }
}

fn unix_timestamp() -> u64 {
    seconds_since_epoch(SystemTime::now())
}

fn seconds_since_epoch(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs(),
        Err(error) => {
            log::warn!(
                "The system clock is {}s before the UNIX epoch, the VAPID token will already \
                 be expired",
                error.duration().as_secs()
            );
            0
        }
    }
}
