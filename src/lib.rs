//! Typed Rust client for pushing WeCom (WeChat Work) application messages.
//!
//! The crate has a domain layer of strong types, a transport layer for
//! wire-format details, and a small client layer that caches the access token
//! and orchestrates uploads and sends.
//!
//! ```rust,no_run
//! use wecom_push::{AgentId, CorpCredentials, Recipient, TextCard, UserId, WeComClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wecom_push::WeComError> {
//!     let credentials = CorpCredentials::new("ww...", "...")?;
//!     let client = WeComClient::new(credentials, AgentId::new(1000002));
//!
//!     let outcome = client
//!         .send_text(Recipient::user(UserId::new("zhangsan")?), "hello")
//!         .await?;
//!     outcome.into_result()?;
//!
//!     let card = TextCard::new("Good morning", "Sunny today")?.url("https://example.com");
//!     client.send_text_card(Recipient::All, card).await?;
//!
//!     client
//!         .send_image(Recipient::All, "./chart.png")
//!         .await?
//!         .into_result()?;
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]

pub mod client;
pub mod domain;
mod transport;

pub use client::{
    CorpCredentials, DEFAULT_LIFETIME_MARGIN, DEFAULT_REFRESH_MARGIN, RefreshPolicy,
    WeComClient, WeComClientBuilder, WeComError,
};
pub use domain::{
    AccessToken, AgentId, Attachment, ErrCode, KnownErrCode, MediaHandle, MediaId, MediaKind,
    Message, Recipient, SendMessage, SendOptions, SendOutcome, TextCard, TextContent, UserId,
    UserList, ValidationError, VideoDetails,
};
