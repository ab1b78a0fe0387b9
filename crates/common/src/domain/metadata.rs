//! Conversion between the device attribute bag and its stored document form.
//!
//! The storage engine sees the attribute bag as an opaque JSON document. These
//! functions are the only place that knows how to get from one to the other, so
//! both store adapters (and their tests) go through them.

use serde_json::{Map, Value};
use thiserror::Error;

/// String-keyed, arbitrarily nested attribute bag attached to a device
pub type Metadata = Map<String, Value>;

/// Canonical literal stored for an initialized but empty attribute bag
pub const EMPTY_DOCUMENT: &str = "{}";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode metadata document: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode metadata document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unsupported raw kind for metadata document: {0}")]
    ScanKind(String),
}

/// Raw column value as handed over by a storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDocument<'a> {
    Null,
    Bytes(&'a [u8]),
    Text(&'a str),
    /// Any other representation; carries the engine's name for the kind
    Unsupported(&'a str),
}

/// Column value to hand to a storage engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedDocument {
    Null,
    Text(String),
}

impl EncodedDocument {
    pub fn as_raw(&self) -> RawDocument<'_> {
        match self {
            EncodedDocument::Null => RawDocument::Null,
            EncodedDocument::Text(text) => RawDocument::Text(text),
        }
    }
}

/// Decode a stored document into an attribute bag.
///
/// `Null`, zero-length values and a JSON `null` document decode to an empty map.
pub fn decode(raw: RawDocument<'_>) -> Result<Metadata, CodecError> {
    let source = match raw {
        RawDocument::Null => return Ok(Metadata::new()),
        RawDocument::Bytes(bytes) => bytes,
        RawDocument::Text(text) => text.as_bytes(),
        RawDocument::Unsupported(kind) => return Err(CodecError::ScanKind(kind.to_string())),
    };

    if source.is_empty() {
        return Ok(Metadata::new());
    }

    // A stored JSON null is an absent document, not an error
    match serde_json::from_slice::<Value>(source).map_err(CodecError::Decode)? {
        Value::Null => Ok(Metadata::new()),
        Value::Object(map) => Ok(map),
        other => serde_json::from_value(other).map_err(CodecError::Decode),
    }
}

/// Encode an attribute bag for storage.
///
/// `None` encodes to the engine's null; an empty map encodes to [`EMPTY_DOCUMENT`].
pub fn encode(metadata: Option<&Metadata>) -> Result<EncodedDocument, CodecError> {
    match metadata {
        None => Ok(EncodedDocument::Null),
        Some(map) if map.is_empty() => Ok(EncodedDocument::Text(EMPTY_DOCUMENT.to_string())),
        Some(map) => serde_json::to_string(map)
            .map(EncodedDocument::Text)
            .map_err(CodecError::Encode),
    }
}
