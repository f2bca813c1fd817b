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

use std::fmt;

use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    CryptoProvider, SigningError,
    provider::SIGNATURE_LENGTH,
    types::{P256PublicKey, P256SecretKey, RawPublicKey},
    utilities::{base64url_decode, base64url_encode},
};

/// How long a freshly forged VAPID token stays valid, in seconds.
///
/// Push services reject tokens that expire more than 24 hours in the future.
pub const VAPID_TOKEN_LIFETIME: u64 = 3600;

const JWT_TYPE: &str = "JWT";
const JWT_ALGORITHM: &str = "ES256";

/// Error type describing the ways a VAPID token can fail to verify.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token doesn't consist of three dot separated parts.
    #[error("The token isn't a compact JWS, expected 3 parts, got {0}")]
    Malformed(usize),
    /// One of the token parts wasn't valid URL-safe base64.
    #[error("The token contains invalid base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The header or the claims weren't valid JSON.
    #[error("The token contains invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The header describes something else than an ES256 signed JWT.
    #[error("The token header is unsupported, expected JWT and ES256, got {typ} and {alg}")]
    UnsupportedHeader {
        /// The `typ` member of the header.
        typ: String,
        /// The `alg` member of the header.
        alg: String,
    },
    /// The signature has the wrong size.
    #[error("The signature has an invalid length, expected 64, got {0}")]
    InvalidSignatureLength(usize),
    /// The signature doesn't match the signed data and the public key.
    #[error("The signature couldn't be verified: {0}")]
    Signature(#[from] p256::ecdsa::Error),
}

/// The claims of a VAPID token.
///
/// The fields serialize in the order `sub`, `aud`, `exp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidClaims {
    /// The contact information of the application server operator, a
    /// `mailto:` or `https:` URI.
    pub sub: String,
    /// The origin of the push service the token is meant for.
    pub aud: String,
    /// The expiration time, in seconds since the UNIX epoch.
    pub exp: u64,
}

impl VapidClaims {
    /// Create a new set of claims.
    ///
    /// No validation is performed, push services reject tokens with
    /// malformed claims.
    pub fn new(sub: impl Into<String>, aud: impl Into<String>, exp: u64) -> Self {
        Self { sub: sub.into(), aud: aud.into(), exp }
    }

    /// Create claims that expire [`VAPID_TOKEN_LIFETIME`] seconds after
    /// `now`.
    pub fn expiring_after(sub: impl Into<String>, aud: impl Into<String>, now: u64) -> Self {
        Self::new(sub, aud, now.saturating_add(VAPID_TOKEN_LIFETIME))
    }
}

#[derive(Serialize, Deserialize)]
struct JoseHeader {
    typ: String,
    alg: String,
}

impl JoseHeader {
    fn es256() -> Self {
        Self { typ: JWT_TYPE.to_owned(), alg: JWT_ALGORITHM.to_owned() }
    }
}

/// A signed VAPID token, a JSON Web Token in the compact serialization.
#[derive(Clone, PartialEq, Eq)]
pub struct VapidToken(String);

impl VapidToken {
    /// Sign the claims with the VAPID private key.
    ///
    /// The token is `header.claims.signature`, each part base64url encoded.
    /// The signature is the fixed-size `r || s` form of an ECDSA P-256
    /// signature over the ASCII bytes of `header.claims`.
    pub fn forge<P: CryptoProvider + ?Sized>(
        provider: &P,
        secret_key: &P256SecretKey,
        claims: &VapidClaims,
    ) -> Result<Self, SigningError> {
        let header = base64url_encode(serde_json::to_vec(&JoseHeader::es256())?);
        let claims = base64url_encode(serde_json::to_vec(claims)?);

        let signing_input = format!("{header}.{claims}");
        let signature = provider.sign_es256(secret_key, signing_input.as_bytes())?;

        Ok(Self(format!("{signing_input}.{}", base64url_encode(signature))))
    }

    /// Verify the token with the VAPID public key and return its claims.
    ///
    /// The expiration time is returned as is, comparing it to the current
    /// time is up to the caller.
    pub fn verify(&self, public_key: &P256PublicKey) -> Result<VapidClaims, TokenError> {
        let parts: Vec<&str> = self.0.split('.').collect();

        let [header, claims, signature] = parts.as_slice() else {
            return Err(TokenError::Malformed(parts.len()));
        };

        let JoseHeader { typ, alg } =
            serde_json::from_slice::<JoseHeader>(&base64url_decode(header)?)?;

        if typ != JWT_TYPE || alg != JWT_ALGORITHM {
            return Err(TokenError::UnsupportedHeader { typ, alg });
        }

        let signature = base64url_decode(signature)?;

        if signature.len() != SIGNATURE_LENGTH {
            return Err(TokenError::InvalidSignatureLength(signature.len()));
        }

        let signature = Signature::from_slice(&signature)?;
        let signing_input = &self.0[..header.len() + 1 + claims.len()];

        VerifyingKey::from(public_key.inner()).verify(signing_input.as_bytes(), &signature)?;

        Ok(serde_json::from_slice(&base64url_decode(claims)?)?)
    }

    /// The `Authorization` header value for a push request, using the
    /// `vapid` scheme from RFC 8292.
    pub fn authorization_header(&self, vapid_public_raw: &RawPublicKey) -> String {
        format!("vapid t={}, k={}", self.0, base64url_encode(vapid_public_raw))
    }

    /// The token in its compact serialization.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VapidToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for VapidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VapidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VapidToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::{assert_let, assert_matches};

    use super::*;
    use crate::{DeterministicProvider, RustCryptoProvider, types::KeyUsage, vapid::VapidKeys};

    const PUBLIC_KEY: &str =
        "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";

    fn claims() -> VapidClaims {
        VapidClaims::new("mailto:john@example.com", "https://push.example.net", 2_716_428_940)
    }

    fn forge(keys: &VapidKeys) -> VapidToken {
        keys.forge_token(&RustCryptoProvider, &claims()).unwrap()
    }

    fn replace_part(token: &VapidToken, index: usize, part: &str) -> VapidToken {
        let mut parts: Vec<&str> = token.as_str().split('.').collect();
        parts[index] = part;

        VapidToken::from(parts.join("."))
    }

    #[test]
    fn header_and_claims_are_encoded_in_order() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);
        let token = forge(&keys);

        let (signing_input, signature) = token.as_str().rsplit_once('.').unwrap();

        insta::assert_snapshot!(
            signing_input,
            @"eyJ0eXAiOiJKV1QiLCJhbGciOiJFUzI1NiJ9.eyJzdWIiOiJtYWlsdG86am9obkBleGFtcGxlLmNvbSIsImF1ZCI6Imh0dHBzOi8vcHVzaC5leGFtcGxlLm5ldCIsImV4cCI6MjcxNjQyODk0MH0"
        );
        assert_eq!(base64url_decode(signature).unwrap().len(), SIGNATURE_LENGTH);
    }

    #[test]
    fn forged_token_verifies() {
        let keys = VapidKeys::generate(&DeterministicProvider::new(3), false);
        let token = forge(&keys);

        assert_eq!(token.verify(keys.public_key()).unwrap(), claims());
    }

    #[test]
    fn altered_claims_fail_to_verify() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);
        let token = forge(&keys);

        for altered in [
            VapidClaims { sub: "mailto:mallory@example.com".to_owned(), ..claims() },
            VapidClaims { aud: "https://push.example.org".to_owned(), ..claims() },
            VapidClaims { exp: claims().exp + 1, ..claims() },
        ] {
            let altered = base64url_encode(serde_json::to_vec(&altered).unwrap());
            let token = replace_part(&token, 1, &altered);

            assert_matches!(token.verify(keys.public_key()), Err(TokenError::Signature(_)));
        }
    }

    #[test]
    fn altered_signature_fails_to_verify() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);
        let token = forge(&keys);

        let mut signature = base64url_decode(token.as_str().rsplit('.').next().unwrap()).unwrap();
        signature[10] ^= 0x01;
        let token = replace_part(&token, 2, &base64url_encode(&signature));

        assert_matches!(token.verify(keys.public_key()), Err(TokenError::Signature(_)));
    }

    #[test]
    fn foreign_public_key_fails_to_verify() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);
        let token = forge(&keys);

        let foreign = P256PublicKey::from_base64(PUBLIC_KEY).unwrap();

        assert_matches!(token.verify(&foreign), Err(TokenError::Signature(_)));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);

        assert_matches!(
            VapidToken::from("a.b".to_owned()).verify(keys.public_key()),
            Err(TokenError::Malformed(2))
        );

        let token = forge(&keys);
        let none_header = base64url_encode(br#"{"typ":"JWT","alg":"none"}"#);

        assert_let!(
            Err(TokenError::UnsupportedHeader { alg, .. }) =
                replace_part(&token, 0, &none_header).verify(keys.public_key())
        );
        assert_eq!(alg, "none");

        assert_matches!(
            replace_part(&token, 2, "AAAA").verify(keys.public_key()),
            Err(TokenError::InvalidSignatureLength(3))
        );
    }

    #[test]
    fn authorization_header_carries_the_public_key() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);
        let token = forge(&keys);

        assert_eq!(
            token.authorization_header(&keys.public_key_raw()),
            format!("vapid t={token}, k={}", keys.application_server_key())
        );
    }

    #[test]
    fn ecdh_keys_cannot_forge_tokens() {
        let provider = RustCryptoProvider;
        let key_pair = provider.generate_key_pair(KeyUsage::Ecdh, false);

        assert_matches!(
            VapidToken::forge(&provider, key_pair.secret_key(), &claims()),
            Err(SigningError::Key(_))
        );
    }

    #[test]
    fn debug_output_hides_the_token() {
        let keys = VapidKeys::generate(&RustCryptoProvider, false);

        assert_eq!(format!("{:?}", forge(&keys)), "VapidToken(<redacted>)");
    }
}
