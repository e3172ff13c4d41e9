use serde::Deserialize;

use super::TransportError;
use super::text::non_empty;
use crate::domain::{AccessToken, CorpId, CorpSecret, ErrCode, TokenGrant};

#[derive(Debug, Clone, Deserialize)]
struct TokenJsonResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub fn encode_token_query(corp_id: &CorpId, secret: &CorpSecret) -> Vec<(String, String)> {
    vec![
        (CorpId::FIELD.to_owned(), corp_id.as_str().to_owned()),
        (CorpSecret::FIELD.to_owned(), secret.as_str().to_owned()),
    ]
}

pub fn decode_token_json_response(json: &str) -> Result<TokenGrant, TransportError> {
    let parsed: TokenJsonResponse = serde_json::from_str(json)?;
    Ok(TokenGrant {
        errcode: ErrCode::new(parsed.errcode),
        errmsg: non_empty(parsed.errmsg),
        access_token: parsed
            .access_token
            .and_then(|token| AccessToken::new(token).ok()),
        expires_in: parsed.expires_in,
    })
}
