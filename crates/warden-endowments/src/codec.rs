//! Text encoding endowment.

use crate::error::{EndowmentError, EndowmentResult};

/// UTF-8 text encoder/decoder handed to snaps.
#[derive(Debug, Default)]
pub struct TextCodec;

impl TextCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode a string to UTF-8 bytes.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    /// Decode UTF-8 bytes to a string.
    ///
    /// # Errors
    ///
    /// Returns [`EndowmentError::Decode`] if the bytes are not valid UTF-8.
    pub fn decode(&self, bytes: &[u8]) -> EndowmentResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| EndowmentError::Decode {
            reason: e.to_string(),
        })
    }
}
