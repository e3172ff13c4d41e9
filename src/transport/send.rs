use serde::{Deserialize, Serialize};

use super::TransportError;
use super::text::non_empty;
use crate::domain::{
    AccessToken, AgentId, ErrCode, Message, SendMessage, SendOptions, SendOutcome,
};

#[derive(Debug, Serialize)]
struct SendJsonBody<'a> {
    touser: String,
    msgtype: &'static str,
    agentid: u32,
    #[serde(flatten)]
    payload: Payload<'a>,
    #[serde(skip_serializing_if = "is_zero")]
    safe: u8,
    #[serde(skip_serializing_if = "is_zero")]
    enable_id_trans: u8,
    #[serde(skip_serializing_if = "is_zero")]
    enable_duplicate_check: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    duplicate_check_interval: Option<u32>,
}

/// Kind-keyed payload. Each variant name is the JSON key the platform reads,
/// which is also the envelope's `msgtype`.
#[derive(Debug, Serialize)]
enum Payload<'a> {
    #[serde(rename = "text")]
    Text { content: &'a str },
    #[serde(rename = "textcard")]
    TextCard {
        title: &'a str,
        description: &'a str,
        url: &'a str,
        btntxt: &'a str,
    },
    #[serde(rename = "image")]
    Image { media_id: &'a str },
    #[serde(rename = "voice")]
    Voice { media_id: &'a str },
    #[serde(rename = "video")]
    Video {
        media_id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<&'a str>,
    },
    #[serde(rename = "file")]
    File { media_id: &'a str },
}

impl<'a> From<&'a Message> for Payload<'a> {
    fn from(message: &'a Message) -> Self {
        match message {
            Message::Text(content) => Payload::Text {
                content: content.as_str(),
            },
            Message::TextCard(card) => Payload::TextCard {
                title: card.title(),
                description: card.description(),
                url: card.link(),
                btntxt: card.button_label(),
            },
            Message::Image(media_id) => Payload::Image {
                media_id: media_id.as_str(),
            },
            Message::Voice(media_id) => Payload::Voice {
                media_id: media_id.as_str(),
            },
            Message::Video { media_id, details } => Payload::Video {
                media_id: media_id.as_str(),
                title: details.title.as_deref(),
                description: details.description.as_deref(),
            },
            Message::File(media_id) => Payload::File {
                media_id: media_id.as_str(),
            },
        }
    }
}

fn is_zero(value: &u8) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Deserialize)]
struct SendJsonResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    invaliduser: Option<String>,
    #[serde(default)]
    invalidparty: Option<String>,
    #[serde(default)]
    invalidtag: Option<String>,
    #[serde(default)]
    unlicenseduser: Option<String>,
    #[serde(default)]
    msgid: Option<String>,
    #[serde(default)]
    response_code: Option<String>,
}

pub fn encode_send_query(token: &AccessToken) -> Vec<(String, String)> {
    vec![(AccessToken::FIELD.to_owned(), token.as_str().to_owned())]
}

pub fn encode_send_json_body(
    request: &SendMessage,
    agent_id: AgentId,
) -> Result<String, TransportError> {
    let options: &SendOptions = request.options();
    let body = SendJsonBody {
        touser: request.recipient().to_touser(),
        msgtype: request.message().msgtype(),
        agentid: agent_id.value(),
        payload: Payload::from(request.message()),
        safe: u8::from(options.safe),
        enable_id_trans: u8::from(options.enable_id_trans),
        enable_duplicate_check: u8::from(options.enable_duplicate_check),
        duplicate_check_interval: options
            .duplicate_check_interval
            .map(|interval| interval.seconds()),
    };
    serde_json::to_string(&body).map_err(TransportError::Encode)
}

pub fn decode_send_json_response(json: &str) -> Result<SendOutcome, TransportError> {
    let parsed: SendJsonResponse = serde_json::from_str(json)?;
    Ok(SendOutcome {
        errcode: ErrCode::new(parsed.errcode),
        errmsg: non_empty(parsed.errmsg),
        invalid_user: non_empty(parsed.invaliduser),
        invalid_party: non_empty(parsed.invalidparty),
        invalid_tag: non_empty(parsed.invalidtag),
        unlicensed_user: non_empty(parsed.unlicenseduser),
        msgid: non_empty(parsed.msgid),
        response_code: non_empty(parsed.response_code),
    })
}
