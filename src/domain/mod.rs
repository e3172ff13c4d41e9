//! Domain layer: strong types with validation and invariants (no I/O).

mod request;
mod response;
mod validation;
mod value;

pub use request::{
    Attachment, Message, Recipient, SEND_MAX_RECIPIENTS, SendMessage, SendOptions, TextCard,
    UserList, VideoDetails,
};
pub use response::{MediaHandle, SendOutcome, TokenGrant, UploadResponse};
pub use validation::ValidationError;
pub use value::{
    AccessToken, AgentId, CorpId, CorpSecret, DuplicateCheckInterval, ErrCode, KnownErrCode,
    MediaId, MediaKind, TextContent, UserId,
};
