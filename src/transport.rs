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

//! The HTTP side of a push, a single `POST` request to the push service.
//!
//! The crate doesn't pick an HTTP client, callers plug one in by implementing
//! [`PushTransport`]. With the `reqwest` feature enabled a blocking
//! implementation based on [`reqwest`] is available as `ReqwestTransport`.

use thiserror::Error;
use url::Url;

/// Error type for requests that didn't produce a response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request couldn't be sent or the response couldn't be read.
    #[cfg(feature = "reqwest")]
    #[error("The push request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// A custom transport failed.
    #[error("The push request failed: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// A fully prepared push request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushRequest {
    /// The subscription endpoint the request is sent to.
    pub endpoint: Url,
    /// The request headers, in the order they were added.
    pub headers: Vec<(&'static str, String)>,
    /// The encrypted message body.
    pub body: Vec<u8>,
}

impl PushRequest {
    /// Get the value of the header with the given name.
    ///
    /// Header names are compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The response of the push service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The reason phrase of the status, if known.
    pub reason: Option<String>,
    /// The response body, push services usually describe errors in it.
    pub body: Vec<u8>,
}

impl PushResponse {
    /// Create a response with the given status and an empty body.
    pub fn new(status: u16) -> Self {
        Self { status, reason: None, body: Vec::new() }
    }

    /// Was the message accepted by the push service.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can deliver a [`PushRequest`].
pub trait PushTransport {
    /// Send the request and wait for the response.
    ///
    /// Any HTTP status is a successful send, interpreting the status is left
    /// to the caller.
    fn send(&self, request: PushRequest) -> Result<PushResponse, TransportError>;
}

impl<T: PushTransport + ?Sized> PushTransport for &T {
    fn send(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        (**self).send(request)
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use super::{PushRequest, PushResponse, PushTransport, TransportError};

    /// A [`PushTransport`] using a blocking [`reqwest::blocking::Client`].
    ///
    /// Timeouts and proxies are configured on the client. The client should be
    /// reused across pushes for connection pooling.
    #[derive(Clone, Debug, Default)]
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        /// Create a transport using a default client.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a transport using the given client.
        pub const fn with_client(client: reqwest::blocking::Client) -> Self {
            Self { client }
        }
    }

    impl PushTransport for ReqwestTransport {
        fn send(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
            let mut builder = self.client.post(request.endpoint);

            for (name, value) in request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.body(request.body).send()?;
            let status = response.status();

            Ok(PushResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().map(ToOwned::to_owned),
                body: response.bytes()?.to_vec(),
            })
        }
    }
}
