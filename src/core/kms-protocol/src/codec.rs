//! Binary and JSON message encodings.
//!
//! One generic pair, [`encode`] and [`decode`], drives every message. The
//! encoding of a body is named by its content type: exactly
//! [`CONTENT_TYPE_BINARY`] selects protobuf, anything else selects JSON.

use prost::Message;

use crate::error::{KmsError, WireError};
use crate::wire::messages::ErrorResponse;
use crate::wire::WireMapping;

/// Content type of protobuf bodies.
pub const CONTENT_TYPE_BINARY: &str = "application/x-protobuf";

/// Content type of JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Protobuf.
    #[default]
    Binary,
    /// Protobuf-style JSON.
    Json,
}

impl Encoding {
    /// Returns the content type naming this encoding.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Binary => CONTENT_TYPE_BINARY,
            Self::Json => CONTENT_TYPE_JSON,
        }
    }

    /// Selects the encoding for a content type.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type == CONTENT_TYPE_BINARY {
            Self::Binary
        } else {
            Self::Json
        }
    }
}

/// Encodes a value.
pub fn encode<T: WireMapping>(value: &T, encoding: Encoding) -> Result<Vec<u8>, WireError> {
    let wire = value.to_wire()?;
    match encoding {
        Encoding::Binary => Ok(wire.encode_to_vec()),
        Encoding::Json => serde_json::to_vec(&wire).map_err(|e| WireError::Encode(e.to_string())),
    }
}

/// Decodes a value, re-checking every wire invariant.
pub fn decode<T: WireMapping>(bytes: &[u8], encoding: Encoding) -> Result<T, WireError> {
    let wire = match encoding {
        Encoding::Binary => T::Wire::decode(bytes).map_err(|e| WireError::Decode(e.to_string()))?,
        Encoding::Json => {
            serde_json::from_slice(bytes).map_err(|e| WireError::Decode(e.to_string()))?
        },
    };
    T::from_wire(wire)
}

/// Checks a received body against its declared content length.
///
/// # Errors
///
/// A negative length is [`KmsError::LengthRequired`]; a body of any other
/// size than declared is malformed.
pub fn read_body(content_length: i64, body: Vec<u8>) -> Result<Vec<u8>, KmsError> {
    let declared = usize::try_from(content_length).map_err(|_| KmsError::LengthRequired)?;
    if body.len() != declared {
        return Err(WireError::Decode(format!(
            "body is {} bytes, content length is {}",
            body.len(),
            declared
        ))
        .into());
    }
    Ok(body)
}

/// Encodes an error as an [`ErrorResponse`] body.
pub fn encode_error(error: &KmsError, encoding: Encoding) -> Result<Vec<u8>, WireError> {
    let response = ErrorResponse {
        code: u32::from(error.status_code()),
        message: error.to_string(),
    };
    match encoding {
        Encoding::Binary => Ok(response.encode_to_vec()),
        Encoding::Json => {
            serde_json::to_vec(&response).map_err(|e| WireError::Encode(e.to_string()))
        },
    }
}

/// Rebuilds the error a server reported with `status`.
///
/// A body that is not an [`ErrorResponse`] is kept as the message.
pub fn decode_error(status: u16, body: &[u8], encoding: Encoding) -> KmsError {
    let decoded = match encoding {
        Encoding::Binary => ErrorResponse::decode(body).ok(),
        Encoding::Json => serde_json::from_slice::<ErrorResponse>(body).ok(),
    };
    let message = match decoded {
        Some(response) => response.message,
        None => String::from_utf8_lossy(body).into_owned(),
    };
    KmsError::Server { status, message }
}
