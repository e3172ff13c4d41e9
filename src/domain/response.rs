use crate::domain::value::{AccessToken, ErrCode, MediaId, MediaKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub errcode: ErrCode,
    pub errmsg: Option<String>,
    pub access_token: Option<AccessToken>,
    /// Platform-declared token lifetime in seconds.
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub errcode: ErrCode,
    pub errmsg: Option<String>,
    pub media_type: Option<String>,
    pub media_id: Option<MediaId>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Remote reference to an uploaded attachment, typed by its upload category.
pub struct MediaHandle {
    pub kind: MediaKind,
    pub media_id: MediaId,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Platform answer to a message send.
///
/// A decoded answer is returned even when the platform rejected the message;
/// check [`SendOutcome::is_ok`].
pub struct SendOutcome {
    pub errcode: ErrCode,
    pub errmsg: Option<String>,
    pub invalid_user: Option<String>,
    pub invalid_party: Option<String>,
    pub invalid_tag: Option<String>,
    pub unlicensed_user: Option<String>,
    pub msgid: Option<String>,
    pub response_code: Option<String>,
}

impl SendOutcome {
    pub fn is_ok(&self) -> bool {
        self.errcode.is_ok()
    }
}
