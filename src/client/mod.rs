//! Client layer: credential caching, attachment uploads and message dispatch.

mod credential;
#[cfg(test)]
mod fake;

use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub use credential::{
    CorpCredentials, DEFAULT_LIFETIME_MARGIN, DEFAULT_REFRESH_MARGIN, RefreshPolicy,
};

use credential::CredentialManager;

use crate::domain::{
    AccessToken, AgentId, Attachment, ErrCode, MediaHandle, MediaKind, Message, Recipient,
    SendMessage, SendOptions, SendOutcome, TextCard, TextContent, ValidationError, VideoDetails,
};

const DEFAULT_API_BASE: &str = "https://qyapi.weixin.qq.com/cgi-bin";
const TOKEN_PATH: &str = "gettoken";
const UPLOAD_PATH: &str = "media/upload";
const SEND_PATH: &str = "message/send";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone)]
struct HttpResponse {
    status: u16,
    body: String,
}

#[derive(Debug, Clone)]
struct MediaFile {
    file_name: String,
    bytes: Vec<u8>,
}

trait HttpTransport: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>>;

    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: String,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>>;

    fn post_multipart<'a>(
        &'a self,
        url: &'a str,
        field: &'static str,
        file: MediaFile,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>>;
}

#[derive(Debug, Clone)]
struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    async fn read(response: reqwest::Response) -> Result<HttpResponse, reqwest::Error> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;
            Ok(Self::read(response).await?)
        })
    }

    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: String,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            Ok(Self::read(response).await?)
        })
    }

    fn post_multipart<'a>(
        &'a self,
        url: &'a str,
        field: &'static str,
        file: MediaFile,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        Box::pin(async move {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str("application/octet-stream")?;
            let form = reqwest::multipart::Form::new().part(field, part);
            let response = self.client.post(url).multipart(form).send().await?;
            Ok(Self::read(response).await?)
        })
    }
}

#[derive(Debug, thiserror::Error)]
/// Errors returned by [`WeComClient`].
///
/// A platform rejection of a message send is not an error: it comes back as a
/// [`SendOutcome`] whose [`SendOutcome::is_ok`] is `false`.
pub enum WeComError {
    /// No access token could be obtained; the cause is the failed fetch, shared
    /// by every caller that waited on it.
    #[error("access token unavailable: {0}")]
    CredentialUnavailable(#[source] Arc<WeComError>),

    /// The local attachment does not exist.
    #[error("attachment not found: {}", .path.display())]
    ResourceNotFound { path: PathBuf },

    /// The local attachment exists but could not be read.
    #[error("failed to read attachment {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The platform answered with a non-zero `errcode`.
    #[error("API error: {errcode:?} {errmsg:?}")]
    Api {
        errcode: ErrCode,
        errmsg: Option<String>,
    },

    /// HTTP client / transport failure (DNS, TLS, timeouts, etc).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// Non-successful HTTP status code returned by the server.
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: u16, body: Option<String> },

    /// A body could not be encoded or parsed as the expected format.
    #[error("parse error: {0}")]
    Parse(#[source] Box<dyn StdError + Send + Sync>),

    /// A configured endpoint is not a valid URL.
    #[error("invalid endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    /// One of the domain constructors rejected an invalid value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl SendOutcome {
    /// Turn a platform rejection into [`WeComError::Api`].
    pub fn into_result(self) -> Result<Self, WeComError> {
        if self.is_ok() {
            return Ok(self);
        }
        Err(WeComError::Api {
            errcode: self.errcode,
            errmsg: self.errmsg,
        })
    }
}

fn build_url(endpoint: &str, query: &[(String, String)]) -> Result<String, WeComError> {
    url::Url::parse_with_params(endpoint, query)
        .map(String::from)
        .map_err(|source| WeComError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            source,
        })
}

fn success_body(response: HttpResponse) -> Result<String, WeComError> {
    if !(200..=299).contains(&response.status) {
        let body = if response.body.trim().is_empty() {
            None
        } else {
            Some(response.body)
        };
        return Err(WeComError::HttpStatus {
            status: response.status,
            body,
        });
    }
    Ok(response.body)
}

#[derive(Debug, Clone)]
/// Builder for [`WeComClient`].
///
/// Use this when you need to customize endpoints, timeouts or the token cache.
pub struct WeComClientBuilder {
    credentials: CorpCredentials,
    agent_id: AgentId,
    token_endpoint: String,
    upload_endpoint: String,
    send_endpoint: String,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    refresh_margin: Duration,
    lifetime_margin: Duration,
    refresh_policy: RefreshPolicy,
}

impl WeComClientBuilder {
    /// Create a builder with the public endpoints and default token margins.
    pub fn new(credentials: CorpCredentials, agent_id: AgentId) -> Self {
        Self {
            credentials,
            agent_id,
            token_endpoint: endpoint(DEFAULT_API_BASE, TOKEN_PATH),
            upload_endpoint: endpoint(DEFAULT_API_BASE, UPLOAD_PATH),
            send_endpoint: endpoint(DEFAULT_API_BASE, SEND_PATH),
            timeout: None,
            user_agent: None,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            lifetime_margin: DEFAULT_LIFETIME_MARGIN,
            refresh_policy: RefreshPolicy::default(),
        }
    }

    /// Point all three endpoints at another API root (a proxy, a test server).
    ///
    /// `base` is the `cgi-bin` root, e.g. `https://qyapi.weixin.qq.com/cgi-bin`.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.token_endpoint = endpoint(&base, TOKEN_PATH);
        self.upload_endpoint = endpoint(&base, UPLOAD_PATH);
        self.send_endpoint = endpoint(&base, SEND_PATH);
        self
    }

    /// Override the `gettoken` endpoint URL.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Override the `media/upload` endpoint URL.
    pub fn upload_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.upload_endpoint = endpoint.into();
        self
    }

    /// Override the `message/send` endpoint URL.
    pub fn send_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.send_endpoint = endpoint.into();
        self
    }

    /// Set an HTTP client timeout applied to the entire request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the HTTP `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// A cached token is handed out only while more than this much of its
    /// lifetime remains. Defaults to [`DEFAULT_REFRESH_MARGIN`].
    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Trimmed off the platform-declared lifetime when a token is stored.
    /// Defaults to [`DEFAULT_LIFETIME_MARGIN`].
    pub fn lifetime_margin(mut self, margin: Duration) -> Self {
        self.lifetime_margin = margin;
        self
    }

    /// Choose how concurrent refreshes are handled.
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Build a [`WeComClient`].
    ///
    /// Fails with [`WeComError::InvalidEndpoint`] if an endpoint is not a URL.
    pub fn build(self) -> Result<WeComClient, WeComError> {
        for endpoint in [
            &self.token_endpoint,
            &self.upload_endpoint,
            &self.send_endpoint,
        ] {
            build_url(endpoint, &[])?;
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent.clone() {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|err| WeComError::Transport(Box::new(err)))?;

        Ok(self.assemble(Arc::new(ReqwestTransport { client })))
    }

    fn assemble(self, http: Arc<dyn HttpTransport>) -> WeComClient {
        let credentials = CredentialManager::new(
            self.credentials,
            self.token_endpoint,
            self.refresh_policy,
            self.refresh_margin,
            self.lifetime_margin,
            Arc::clone(&http),
        );
        WeComClient {
            agent_id: self.agent_id,
            upload_endpoint: self.upload_endpoint,
            send_endpoint: self.send_endpoint,
            credentials: Arc::new(credentials),
            http,
        }
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

#[derive(Clone)]
/// High-level WeCom application-message client.
///
/// Holds one access-token cache; clones share it. Every operation fetches a
/// token first when the cached one is missing or about to expire, then:
/// - text and card messages are sent directly,
/// - image, voice, video and file messages upload the local file first and
///   send a message referencing the returned media id.
pub struct WeComClient {
    agent_id: AgentId,
    upload_endpoint: String,
    send_endpoint: String,
    credentials: Arc<CredentialManager>,
    http: Arc<dyn HttpTransport>,
}

impl WeComClient {
    /// Create a client using the public endpoints.
    ///
    /// For more customization, use [`WeComClient::builder`].
    pub fn new(credentials: CorpCredentials, agent_id: AgentId) -> Self {
        WeComClientBuilder::new(credentials, agent_id).assemble(Arc::new(ReqwestTransport {
            client: reqwest::Client::new(),
        }))
    }

    /// Start building a client with custom settings.
    pub fn builder(credentials: CorpCredentials, agent_id: AgentId) -> WeComClientBuilder {
        WeComClientBuilder::new(credentials, agent_id)
    }

    /// Application id every message is sent on behalf of.
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Return a currently valid access token, fetching one when needed.
    ///
    /// Errors: [`WeComError::CredentialUnavailable`] wrapping the failed fetch. The
    /// cache is left empty so the next call fetches again.
    pub async fn acquire_credential(&self) -> Result<AccessToken, WeComError> {
        self.credentials.acquire().await
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate_credential(&self) {
        self.credentials.invalidate().await;
    }

    /// Upload a local file and return the remote handle.
    ///
    /// The file is checked and read before any network call, so a missing path
    /// costs no round-trip.
    ///
    /// Errors:
    /// - [`WeComError::ResourceNotFound`] / [`WeComError::Io`] for local failures,
    /// - [`WeComError::CredentialUnavailable`] when no token can be obtained,
    /// - [`WeComError::Api`] when the platform rejects the upload.
    pub async fn upload_media(
        &self,
        path: impl AsRef<Path>,
        kind: MediaKind,
    ) -> Result<MediaHandle, WeComError> {
        let file = read_media_file(path.as_ref()).await?;
        let token = self.credentials.acquire().await?;

        let query = crate::transport::encode_upload_query(&token, kind);
        let url = build_url(&self.upload_endpoint, &query)?;

        tracing::debug!(
            %kind,
            file_name = %file.file_name,
            size = file.bytes.len(),
            "uploading media"
        );

        let response = self
            .http
            .post_multipart(&url, crate::transport::MEDIA_FIELD, file)
            .await
            .map_err(WeComError::Transport)?;
        let body = success_body(response)?;

        let parsed = crate::transport::decode_upload_json_response(&body)
            .map_err(|err| WeComError::Parse(Box::new(err)))?;

        if !parsed.errcode.is_ok() {
            self.forget_rejected_token(&token, parsed.errcode).await;
            return Err(WeComError::Api {
                errcode: parsed.errcode,
                errmsg: parsed.errmsg,
            });
        }

        if let Some(answered) = parsed
            .media_type
            .as_deref()
            .filter(|answered| *answered != kind.as_str())
        {
            return Err(WeComError::Parse(
                format!("upload of {kind} answered with media type {answered}").into(),
            ));
        }

        let media_id = parsed
            .media_id
            .ok_or_else(|| WeComError::Parse("upload response has no media_id".into()))?;

        Ok(MediaHandle {
            kind,
            media_id,
            created_at: parsed.created_at,
        })
    }

    /// Send one message.
    ///
    /// Returns the decoded platform answer whether or not the platform accepted
    /// the message; see [`SendOutcome::is_ok`] and [`SendOutcome::into_result`].
    ///
    /// Errors:
    /// - [`WeComError::CredentialUnavailable`] (no send call is made),
    /// - [`WeComError::HttpStatus`] for non-2xx HTTP responses,
    /// - [`WeComError::Transport`] / [`WeComError::Parse`] for broken exchanges.
    pub async fn send(&self, request: SendMessage) -> Result<SendOutcome, WeComError> {
        let token = self.credentials.acquire().await?;

        let body = crate::transport::encode_send_json_body(&request, self.agent_id)
            .map_err(|err| WeComError::Parse(Box::new(err)))?;
        let query = crate::transport::encode_send_query(&token);
        let url = build_url(&self.send_endpoint, &query)?;

        let response = self
            .http
            .post_json(&url, body)
            .await
            .map_err(WeComError::Transport)?;
        let body = success_body(response)?;

        let outcome = crate::transport::decode_send_json_response(&body)
            .map_err(|err| WeComError::Parse(Box::new(err)))?;

        if outcome.is_ok() {
            tracing::debug!(msgtype = request.message().msgtype(), "message sent");
        } else {
            tracing::warn!(
                msgtype = request.message().msgtype(),
                errcode = outcome.errcode.as_i64(),
                errmsg = outcome.errmsg.as_deref().unwrap_or_default(),
                "message rejected"
            );
            self.forget_rejected_token(&token, outcome.errcode).await;
        }

        Ok(outcome)
    }

    /// Send a plain text message.
    pub async fn send_text(
        &self,
        recipient: Recipient,
        content: impl Into<String>,
    ) -> Result<SendOutcome, WeComError> {
        let content = TextContent::new(content)?;
        self.send(SendMessage::new(recipient, Message::Text(content)))
            .await
    }

    /// Send a text card; see [`TextCard`] for the link and button defaults.
    pub async fn send_text_card(
        &self,
        recipient: Recipient,
        card: TextCard,
    ) -> Result<SendOutcome, WeComError> {
        self.send(SendMessage::new(recipient, Message::TextCard(card)))
            .await
    }

    /// Upload `path` and send it as an image.
    pub async fn send_image(
        &self,
        recipient: Recipient,
        path: impl AsRef<Path>,
    ) -> Result<SendOutcome, WeComError> {
        self.send_attachment(recipient, path, Attachment::Image, SendOptions::default())
            .await
    }

    /// Upload `path` and send it as a voice message.
    pub async fn send_voice(
        &self,
        recipient: Recipient,
        path: impl AsRef<Path>,
    ) -> Result<SendOutcome, WeComError> {
        self.send_attachment(recipient, path, Attachment::Voice, SendOptions::default())
            .await
    }

    /// Upload `path` and send it as a video with optional title and description.
    pub async fn send_video(
        &self,
        recipient: Recipient,
        path: impl AsRef<Path>,
        details: VideoDetails,
    ) -> Result<SendOutcome, WeComError> {
        self.send_attachment(
            recipient,
            path,
            Attachment::Video(details),
            SendOptions::default(),
        )
        .await
    }

    /// Upload `path` and send it as a file.
    pub async fn send_file(
        &self,
        recipient: Recipient,
        path: impl AsRef<Path>,
    ) -> Result<SendOutcome, WeComError> {
        self.send_attachment(recipient, path, Attachment::File, SendOptions::default())
            .await
    }

    /// Upload a local file, then send the message referencing it.
    ///
    /// If the upload fails its error is returned and nothing is sent.
    pub async fn send_attachment(
        &self,
        recipient: Recipient,
        path: impl AsRef<Path>,
        attachment: Attachment,
        options: SendOptions,
    ) -> Result<SendOutcome, WeComError> {
        let handle = self.upload_media(path, attachment.media_kind()).await?;
        let message = attachment.into_message(handle.media_id);
        self.send(SendMessage::new(recipient, message).with_options(options))
            .await
    }

    async fn forget_rejected_token(&self, rejected: &AccessToken, errcode: ErrCode) {
        if errcode.is_token_error() && self.credentials.invalidate_token(rejected).await {
            tracing::debug!(errcode = errcode.as_i64(), "dropped rejected access token");
        }
    }
}

async fn read_media_file(path: &Path) -> Result<MediaFile, WeComError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            WeComError::ResourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            WeComError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    if !tokio::fs::try_exists(path).await.map_err(io_error)? {
        return Err(WeComError::ResourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = tokio::fs::read(path).await.map_err(io_error)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_owned());

    Ok(MediaFile { file_name, bytes })
}
