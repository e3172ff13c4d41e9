use std::io;

use tracing_subscriber::EnvFilter;
use wecom_push::{AgentId, CorpCredentials, Recipient, UserId, WeComClient};

pub fn required_env(name: &str) -> Result<String, io::Error> {
    std::env::var(name).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{name} environment variable is required"),
        )
    })
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wecom_push=debug")),
        )
        .init();
}

/// Client from `WECOM_CORP_ID`, `WECOM_CORP_SECRET` and `WECOM_AGENT_ID`.
pub fn client_from_env() -> Result<WeComClient, Box<dyn std::error::Error>> {
    let credentials = CorpCredentials::new(
        required_env("WECOM_CORP_ID")?,
        required_env("WECOM_CORP_SECRET")?,
    )?;
    let agent_id = AgentId::parse(&required_env("WECOM_AGENT_ID")?)?;
    Ok(WeComClient::new(credentials, agent_id))
}

/// `WECOM_TO_USER`, or everyone when unset.
pub fn recipient_from_env() -> Result<Recipient, Box<dyn std::error::Error>> {
    match std::env::var("WECOM_TO_USER") {
        Ok(user) => Ok(Recipient::user(UserId::new(user)?)),
        Err(_) => Ok(Recipient::All),
    }
}
