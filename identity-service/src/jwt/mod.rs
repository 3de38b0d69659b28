//! JSON Web Token segment model: ordered claim bags for header and payload,
//! base64url encoding and the three segment wire form.

mod header;
mod payload;
mod segment;
mod token;

pub use header::JwtHeader;
pub use payload::JwtPayload;
pub use segment::{ClaimValue, FromClaim, JwtSegment};
pub use token::Jwt;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

/// Unpadded base64url on output, tolerant of padding on input.
pub(crate) const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);
