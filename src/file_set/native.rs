use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum NativeReadError {
    #[error("File is empty")]
    Empty,
    #[error("File could not be decoded as {0}")]
    Undecodable(&'static str),
}

/// Decode raw native track bytes into text, detecting the character encoding.
pub fn decode_native_text(bytes: &[u8]) -> Result<String, NativeReadError> {
    if bytes.is_empty() {
        return Err(NativeReadError::Empty);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding: &'static Encoding = detector.guess(None, true);

    let (decoded, _, had_errors) = encoding.decode(bytes);

    if had_errors {
        warn!("Decoding errors while reading track with {}", encoding.name());
        return Err(NativeReadError::Undecodable(encoding.name()));
    }

    if decoded.trim().is_empty() {
        return Err(NativeReadError::Empty);
    }

    Ok(decoded.into_owned())
}
