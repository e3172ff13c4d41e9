use crate::domain::validation::ValidationError;
use crate::domain::value::{DuplicateCheckInterval, MediaId, MediaKind, TextContent, UserId};

pub const SEND_MAX_RECIPIENTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Non-empty list of at most [`SEND_MAX_RECIPIENTS`] member accounts.
pub struct UserList(Vec<UserId>);

impl UserList {
    pub const FIELD: &'static str = UserId::FIELD;

    pub fn new(users: Vec<UserId>) -> Result<Self, ValidationError> {
        if users.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        if users.len() > SEND_MAX_RECIPIENTS {
            return Err(ValidationError::TooManyRecipients {
                max: SEND_MAX_RECIPIENTS,
                actual: users.len(),
            });
        }
        Ok(Self(users))
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<UserId> for UserList {
    fn from(user: UserId) -> Self {
        Self(vec![user])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Who a message is delivered to (`touser`).
pub enum Recipient {
    /// Every member visible to the application (`@all`).
    All,
    /// One or more member accounts, joined with `|` on the wire.
    Users(UserList),
}

impl Recipient {
    /// Broadcast marker understood by the platform.
    pub const ALL: &'static str = "@all";

    /// Address a single member.
    pub fn user(user: UserId) -> Self {
        Self::Users(UserList::from(user))
    }

    /// Address several members at once.
    pub fn users(users: Vec<UserId>) -> Result<Self, ValidationError> {
        UserList::new(users).map(Self::Users)
    }

    /// Wire form of the recipient list.
    pub fn to_touser(&self) -> String {
        match self {
            Self::All => Self::ALL.to_owned(),
            Self::Users(users) => users
                .as_slice()
                .iter()
                .map(UserId::as_str)
                .collect::<Vec<_>>()
                .join("|"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Text card (`textcard`): a title, a description and a link button.
pub struct TextCard {
    title: String,
    description: String,
    url: String,
    button_text: String,
}

impl TextCard {
    /// Link target used when none is given.
    pub const DEFAULT_URL: &'static str = "https://";
    /// Button label used when none is given.
    pub const DEFAULT_BUTTON_TEXT: &'static str = "详情";

    /// Create a card with the default link target and button label.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "description",
            });
        }
        Ok(Self {
            title,
            description,
            url: Self::DEFAULT_URL.to_owned(),
            button_text: Self::DEFAULT_BUTTON_TEXT.to_owned(),
        })
    }

    /// Override the link target opened by the card.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override the button label.
    pub fn button_text(mut self, text: impl Into<String>) -> Self {
        self.button_text = text.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn link(&self) -> &str {
        &self.url
    }

    pub fn button_label(&self) -> &str {
        &self.button_text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Optional presentation fields of a video message.
pub struct VideoDetails {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Message payload, one variant per `msgtype`.
///
/// Attachment variants carry a remote [`MediaId`], never inline bytes.
pub enum Message {
    Text(TextContent),
    TextCard(TextCard),
    Image(MediaId),
    Voice(MediaId),
    Video { media_id: MediaId, details: VideoDetails },
    File(MediaId),
}

impl Message {
    /// The `msgtype` tag of this payload.
    pub fn msgtype(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::TextCard(_) => "textcard",
            Self::Image(_) => MediaKind::Image.as_str(),
            Self::Voice(_) => MediaKind::Voice.as_str(),
            Self::Video { .. } => MediaKind::Video.as_str(),
            Self::File(_) => MediaKind::File.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A local file to upload before sending, tagged with the message kind it becomes.
pub enum Attachment {
    Image,
    Voice,
    Video(VideoDetails),
    File,
}

impl Attachment {
    /// Upload category for this attachment.
    pub fn media_kind(&self) -> MediaKind {
        match self {
            Self::Image => MediaKind::Image,
            Self::Voice => MediaKind::Voice,
            Self::Video(_) => MediaKind::Video,
            Self::File => MediaKind::File,
        }
    }

    /// Build the message that references an uploaded handle.
    pub fn into_message(self, media_id: MediaId) -> Message {
        match self {
            Self::Image => Message::Image(media_id),
            Self::Voice => Message::Voice(media_id),
            Self::Video(details) => Message::Video { media_id, details },
            Self::File => Message::File(media_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Optional send flags. All default to the platform's defaults (off).
pub struct SendOptions {
    /// Mark the message confidential (`safe=1`); forwarding is then watermarked.
    pub safe: bool,
    /// Let the platform translate ids in the content (`enable_id_trans=1`).
    pub enable_id_trans: bool,
    /// Suppress identical messages within the check interval.
    pub enable_duplicate_check: bool,
    pub duplicate_check_interval: Option<DuplicateCheckInterval>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One message-send request: recipient, payload and flags.
pub struct SendMessage {
    recipient: Recipient,
    message: Message,
    options: SendOptions,
}

impl SendMessage {
    pub fn new(recipient: Recipient, message: Message) -> Self {
        Self {
            recipient,
            message,
            options: SendOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn options(&self) -> &SendOptions {
        &self.options
    }
}
