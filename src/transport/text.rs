use serde::Deserialize;

/// Upload timestamp (`created_at`): Unix seconds, sent as a quoted string by
/// the platform but accepted as a bare number too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TransportTimestamp {
    Seconds(u64),
    Text(String),
}

impl TransportTimestamp {
    pub fn into_string(self) -> String {
        match self {
            Self::Seconds(seconds) => seconds.to_string(),
            Self::Text(text) => text,
        }
    }
}

/// Treat empty strings the platform sends for "nothing" as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|it| !it.trim().is_empty())
}
