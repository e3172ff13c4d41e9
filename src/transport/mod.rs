//! Transport layer: HTTP and wire-format details (serialization/deserialization).

mod send;
mod text;
mod token;
mod upload;

pub use send::{decode_send_json_response, encode_send_json_body, encode_send_query};
pub use token::{decode_token_json_response, encode_token_query};
pub use upload::{MEDIA_FIELD, decode_upload_json_response, encode_upload_query};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request body could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}
