use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Front end serving the primary RPC interface.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Protocol {
    /// Newline-delimited messages over a raw TCP connection.
    #[default]
    Tcp,
    /// One message per `POST` request body.
    Http,
}

/// Encoding used for request and response payloads.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WireFormat {
    /// Self-describing JSON text.
    #[default]
    Json,
    /// Compact MessagePack with named map fields.
    #[strum(to_string = "msgpack", serialize = "messagepack")]
    #[serde(rename = "msgpack", alias = "messagepack")]
    Msgpack,
}

impl WireFormat {
    /// MIME type advertised on HTTP replies.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Msgpack => "application/msgpack",
        }
    }
}

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Errors encountered while parsing one of the selector enums from text.
pub type SelectorParseError = strum::ParseError;
