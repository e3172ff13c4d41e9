use serde::Deserialize;

use super::TransportError;
use super::text::{TransportTimestamp, non_empty};
use crate::domain::{AccessToken, ErrCode, MediaId, MediaKind, UploadResponse};

/// Multipart field the platform reads the file from.
pub const MEDIA_FIELD: &str = "media";

#[derive(Debug, Clone, Deserialize)]
struct UploadJsonResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default, rename = "type")]
    media_type: Option<String>,
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    created_at: Option<TransportTimestamp>,
}

pub fn encode_upload_query(token: &AccessToken, kind: MediaKind) -> Vec<(String, String)> {
    vec![
        (AccessToken::FIELD.to_owned(), token.as_str().to_owned()),
        (MediaKind::FIELD.to_owned(), kind.as_str().to_owned()),
    ]
}

pub fn decode_upload_json_response(json: &str) -> Result<UploadResponse, TransportError> {
    let parsed: UploadJsonResponse = serde_json::from_str(json)?;
    Ok(UploadResponse {
        errcode: ErrCode::new(parsed.errcode),
        errmsg: non_empty(parsed.errmsg),
        media_type: non_empty(parsed.media_type),
        media_id: parsed.media_id.and_then(|id| MediaId::new(id).ok()),
        created_at: parsed.created_at.map(TransportTimestamp::into_string),
    })
}
