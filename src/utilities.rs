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

pub use base64::DecodeError;
use base64::{
    Engine,
    alphabet::{STANDARD, URL_SAFE},
    engine::{
        DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::URL_SAFE_NO_PAD,
    },
};

/// Browsers hand out unpadded base64url, but some server-side tooling pads
/// it or uses the standard alphabet. Accept all of those when decoding, never
/// emit them.
const LENIENT_CONFIG: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&URL_SAFE, LENIENT_CONFIG);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&STANDARD, LENIENT_CONFIG);

/// Decode the input as base64, URL-safe or standard alphabet, with or
/// without padding.
///
/// The alphabets can't be mixed, and if neither alphabet fits the error of
/// the URL-safe attempt is returned.
pub fn base64url_decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, DecodeError> {
    let input = input.as_ref();

    URL_SAFE_LENIENT
        .decode(input)
        .or_else(|error| STANDARD_LENIENT.decode(input).map_err(|_| error))
}

/// Encode the input as URL-safe base64 with no padding.
pub fn base64url_encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;

    #[test]
    fn decoding_accepts_padding() {
        assert_eq!(base64url_decode("YQ").unwrap(), b"a");
        assert_eq!(base64url_decode("YQ==").unwrap(), b"a");
    }

    #[test]
    fn encoding_is_url_safe_and_unpadded() {
        assert_eq!(base64url_encode([0xfb, 0xff]), "-_8");
        assert_eq!(base64url_encode(b"a"), "YQ");
    }

    #[test]
    fn decoding_accepts_standard_alphabet() {
        assert_eq!(base64url_decode("+/8").unwrap(), [0xfb, 0xff]);
        assert_eq!(base64url_decode("+/8=").unwrap(), [0xfb, 0xff]);
        assert_eq!(base64url_decode("-_8").unwrap(), [0xfb, 0xff]);
    }

    #[test]
    fn decoding_rejects_mixed_alphabets() {
        assert_matches!(base64url_decode("+_8"), Err(DecodeError::InvalidByte(..)));
        assert_matches!(base64url_decode("not base64!"), Err(DecodeError::InvalidByte(..)));
    }
}
