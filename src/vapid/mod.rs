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

//! Voluntary Application Server Identification, as defined in [RFC 8292].
//!
//! The application server proves its identity to push services by signing a
//! short lived JSON Web Token with a long lived ECDSA P-256 key pair, the
//! [`VapidKeys`]. The public half of the pair is handed to the browser when it
//! subscribes, the push service then only accepts messages for that
//! subscription if they carry a [`VapidToken`] signed by the matching private
//! key.
//!
//! ```rust
//! use web_push_server::{
//!     RustCryptoProvider,
//!     vapid::{VapidClaims, VapidKeys},
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let provider = RustCryptoProvider::new();
//! let vapid_keys = VapidKeys::generate(&provider, false);
//!
//! let claims =
//!     VapidClaims::new("mailto:admin@example.com", "https://push.example.net", 1_700_003_600);
//! let token = vapid_keys.forge_token(&provider, &claims)?;
//!
//! assert_eq!(token.verify(vapid_keys.public_key())?, claims);
//! # Ok(())
//! # }
//! ```
//!
//! [RFC 8292]: https://www.rfc-editor.org/rfc/rfc8292

mod keys;
mod token;

pub use keys::{ExportedVapidKeys, VapidKeys};
pub use token::{TokenError, VAPID_TOKEN_LIFETIME, VapidClaims, VapidToken};
