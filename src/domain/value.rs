use std::fmt;

use crate::domain::validation::ValidationError;

fn non_empty_trimmed(value: String, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(trimmed.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// WeCom corporation id (`corpid`).
///
/// Invariant: non-empty after trimming.
pub struct CorpId(String);

impl CorpId {
    /// Query parameter name used by the token endpoint (`corpid`).
    pub const FIELD: &'static str = "corpid";

    /// Create a validated [`CorpId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(value.into(), Self::FIELD).map(Self)
    }

    /// Borrow the validated corp id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// Application secret (`corpsecret`).
///
/// Invariant: non-empty after trimming. `Debug` output is redacted.
pub struct CorpSecret(String);

impl CorpSecret {
    /// Query parameter name used by the token endpoint (`corpsecret`).
    pub const FIELD: &'static str = "corpsecret";

    /// Create a validated [`CorpSecret`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(value.into(), Self::FIELD).map(Self)
    }

    /// Borrow the validated secret.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CorpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CorpSecret(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Application id (`agentid`) messages are sent on behalf of.
pub struct AgentId(u32);

impl AgentId {
    /// JSON field name used by the send endpoint (`agentid`).
    pub const FIELD: &'static str = "agentid";

    /// Wrap a numeric agent id.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Parse an agent id from its decimal text form (as found in config files).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidAgentId {
                input: trimmed.to_owned(),
            })
    }

    /// Get the numeric agent id.
    pub fn value(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Member account id inside the corporation (one `touser` entry).
///
/// Invariant: non-empty after trimming, contains no `|` separator and is not the
/// broadcast marker.
pub struct UserId(String);

impl UserId {
    /// JSON field name used by the send endpoint (`touser`).
    pub const FIELD: &'static str = "touser";

    /// Create a validated [`UserId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = non_empty_trimmed(value.into(), Self::FIELD)?;
        if value.contains('|') || value == crate::domain::Recipient::ALL {
            return Err(ValidationError::InvalidUserId { input: value });
        }
        Ok(Self(value))
    }

    /// Borrow the validated user id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Remote media handle id (`media_id`) returned by the upload endpoint.
///
/// Invariant: non-empty after trimming.
pub struct MediaId(String);

impl MediaId {
    /// JSON field name (`media_id`).
    pub const FIELD: &'static str = "media_id";

    /// Create a validated [`MediaId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(value.into(), Self::FIELD).map(Self)
    }

    /// Borrow the validated media id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// Bearer token issued by the token endpoint (`access_token`).
///
/// Invariant: non-empty. `Debug` output is redacted.
pub struct AccessToken(String);

impl AccessToken {
    /// Query parameter name used by upload/send (`access_token`).
    pub const FIELD: &'static str = "access_token";

    /// Create a validated [`AccessToken`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(value.into(), Self::FIELD).map(Self)
    }

    /// Borrow the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Text message content (`text.content`).
///
/// Invariant: non-empty after trimming. The original value (including whitespace) is preserved.
pub struct TextContent(String);

impl TextContent {
    /// JSON field name (`content`).
    pub const FIELD: &'static str = "content";

    /// Create validated text content.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(value))
    }

    /// Borrow the content as provided.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Window for platform-side duplicate suppression, in seconds.
///
/// Invariant: `1..=14400` (four hours).
pub struct DuplicateCheckInterval(u32);

impl DuplicateCheckInterval {
    /// JSON field name (`duplicate_check_interval`).
    pub const FIELD: &'static str = "duplicate_check_interval";

    pub const MIN: u32 = 1;
    pub const MAX: u32 = 14_400;

    /// Create a validated interval.
    pub fn new(seconds: u32) -> Result<Self, ValidationError> {
        if !(Self::MIN..=Self::MAX).contains(&seconds) {
            return Err(ValidationError::OutOfRange {
                field: Self::FIELD,
                min: Self::MIN,
                max: Self::MAX,
                actual: seconds,
            });
        }
        Ok(Self(seconds))
    }

    /// Get the interval in seconds.
    pub fn seconds(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Upload category for binary attachments (`type` on the upload endpoint).
pub enum MediaKind {
    Image,
    Voice,
    Video,
    File,
}

impl MediaKind {
    /// Query parameter name used by the upload endpoint (`type`).
    pub const FIELD: &'static str = "type";

    /// Wire name of the category; also the `msgtype` of the message carrying it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::File => "file",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Platform status code (`errcode`).
///
/// This value is preserved as-is even when the code is unknown to this crate.
pub struct ErrCode(i64);

impl ErrCode {
    /// The success code.
    pub const OK: Self = Self(0);

    /// Construct an error code from its integer representation.
    pub fn new(code: i64) -> Self {
        Self(code)
    }

    /// Get the integer code as provided by the platform.
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns `true` for `errcode == 0`.
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Map this code to a known variant, if one exists.
    pub fn known_kind(self) -> Option<KnownErrCode> {
        KnownErrCode::from_code(self.0)
    }

    /// Returns `true` if this code is considered transient by the crate.
    pub fn is_retryable(self) -> bool {
        matches!(self.known_kind(), Some(kind) if kind.is_retryable())
    }

    /// Returns `true` if the code means the corp credentials were rejected.
    pub fn is_auth_error(self) -> bool {
        matches!(self.known_kind(), Some(kind) if kind.is_auth_error())
    }

    /// Returns `true` if the code means the access token itself is no longer usable.
    pub fn is_token_error(self) -> bool {
        matches!(self.known_kind(), Some(kind) if kind.is_token_error())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
/// Known platform error codes.
///
/// Unknown codes are preserved as [`ErrCode`] and return `None` from [`KnownErrCode::from_code`].
pub enum KnownErrCode {
    SystemBusy,
    Ok,
    InvalidSecret,
    InvalidUserId,
    InvalidMediaType,
    InvalidFileType,
    InvalidFileSize,
    InvalidMediaId,
    InvalidMessageType,
    InvalidCorpId,
    InvalidAccessToken,
    InvalidAgentId,
    MissingAccessToken,
    AccessTokenExpired,
    EmptyMediaFile,
    EmptyTextContent,
    ContentTooLong,
    ApiFrequencyLimit,
    ApiForbidden,
    IpNotAllowed,
    AllRecipientsInvalid,
}

impl KnownErrCode {
    /// Convert a raw integer code into a known variant.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            -1 => Self::SystemBusy,
            0 => Self::Ok,
            40001 => Self::InvalidSecret,
            40003 => Self::InvalidUserId,
            40004 => Self::InvalidMediaType,
            40005 => Self::InvalidFileType,
            40006 => Self::InvalidFileSize,
            40007 => Self::InvalidMediaId,
            40008 => Self::InvalidMessageType,
            40013 => Self::InvalidCorpId,
            40014 => Self::InvalidAccessToken,
            40056 => Self::InvalidAgentId,
            41001 => Self::MissingAccessToken,
            42001 => Self::AccessTokenExpired,
            44001 => Self::EmptyMediaFile,
            44004 => Self::EmptyTextContent,
            45002 => Self::ContentTooLong,
            45009 => Self::ApiFrequencyLimit,
            48002 => Self::ApiForbidden,
            60020 => Self::IpNotAllowed,
            81013 => Self::AllRecipientsInvalid,
            _ => return None,
        })
    }

    /// Whether this status is likely transient and can be retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::SystemBusy | Self::ApiFrequencyLimit)
    }

    /// Whether this status indicates invalid corp credentials.
    pub fn is_auth_error(self) -> bool {
        matches!(self, Self::InvalidSecret | Self::InvalidCorpId)
    }

    /// Whether this status indicates the access token must be fetched again.
    pub fn is_token_error(self) -> bool {
        matches!(
            self,
            Self::InvalidAccessToken | Self::MissingAccessToken | Self::AccessTokenExpired
        )
    }
}
