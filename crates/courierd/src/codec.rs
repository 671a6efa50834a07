//! Symmetric payload encoding for the two supported wire formats.
//!
//! The rest of the pipeline only sees [`Codec::encode`] and [`Codec::decode`];
//! which format sits underneath is a static configuration choice.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use courier_config::WireFormat;

/// Failures raised while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was not valid JSON for the requested shape.
    #[error("malformed JSON payload: {0}")]
    DecodeJson(#[source] serde_json::Error),
    /// The payload was not valid MessagePack for the requested shape.
    #[error("malformed MessagePack payload: {0}")]
    DecodeMsgpack(#[source] rmp_serde::decode::Error),
    /// A MessagePack value decoded cleanly but bytes were left over.
    #[error("malformed MessagePack payload: {remaining} trailing bytes")]
    TrailingMsgpack {
        /// Bytes left after the first complete value.
        remaining: usize,
    },
    /// A value could not be rendered as JSON.
    #[error("failed to encode JSON payload: {0}")]
    EncodeJson(#[source] serde_json::Error),
    /// A value could not be rendered as MessagePack.
    #[error("failed to encode MessagePack payload: {0}")]
    EncodeMsgpack(#[source] rmp_serde::encode::Error),
}

impl CodecError {
    /// Whether the error came from reading rather than writing.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::DecodeJson(_) | Self::DecodeMsgpack(_) | Self::TrailingMsgpack { .. }
        )
    }
}

/// Encoder/decoder bound to one wire format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    format: WireFormat,
}

impl Codec {
    /// Builds a codec for the given format.
    #[must_use]
    pub const fn new(format: WireFormat) -> Self {
        Self { format }
    }

    /// Format this codec speaks.
    #[must_use]
    pub const fn format(self) -> WireFormat {
        self.format
    }

    /// MIME type for payloads produced by this codec.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        self.format.content_type()
    }

    /// Serialises `value` in the configured format.
    ///
    /// MessagePack output uses named map fields so that decoders on either
    /// side can address members by key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the value cannot be represented.
    pub fn encode<T>(self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: Serialize + ?Sized,
    {
        match self.format {
            WireFormat::Json => serde_json::to_vec(value).map_err(CodecError::EncodeJson),
            WireFormat::Msgpack => {
                rmp_serde::to_vec_named(value).map_err(CodecError::EncodeMsgpack)
            }
        }
    }

    /// Parses `bytes` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the input is malformed for the configured
    /// format or does not fit the requested shape. Input must hold exactly
    /// one value in either format.
    pub fn decode<T>(self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        match self.format {
            WireFormat::Json => serde_json::from_slice(bytes).map_err(CodecError::DecodeJson),
            WireFormat::Msgpack => decode_msgpack(bytes),
        }
    }
}

fn decode_msgpack<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: DeserializeOwned,
{
    let mut rest = bytes;
    let value = rmp_serde::from_read(&mut rest).map_err(CodecError::DecodeMsgpack)?;
    if rest.is_empty() {
        Ok(value)
    } else {
        Err(CodecError::TrailingMsgpack {
            remaining: rest.len(),
        })
    }
}
