//! Scripted in-memory transport for client tests.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BoxFuture, HttpResponse, HttpTransport, MediaFile};

type Scripted = Result<HttpResponse, String>;

#[derive(Debug)]
struct Script {
    response: Scripted,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<String>,
    pub upload: Option<RecordedUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RecordedUpload {
    pub field: &'static str,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct FakeTransportState {
    requests: Vec<RecordedRequest>,
    token: VecDeque<Script>,
    upload: VecDeque<Script>,
    send: VecDeque<Script>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct FakeTransport {
    state: Arc<Mutex<FakeTransportState>>,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_token(&self, status: u16, body: impl Into<String>) {
        self.state.lock().unwrap().token.push_back(ok(status, body).into());
    }

    pub fn push_token_failure(&self, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .token
            .push_back(failed(message).into());
    }

    pub fn push_upload(&self, status: u16, body: impl Into<String>) {
        self.state.lock().unwrap().upload.push_back(ok(status, body).into());
    }

    pub fn push_send(&self, status: u16, body: impl Into<String>) {
        self.state.lock().unwrap().send.push_back(ok(status, body).into());
    }

    /// Like [`FakeTransport::push_send`], but the answer arrives after `delay`
    /// instead of the transport-wide delay.
    pub fn push_send_after(&self, delay: Duration, status: u16, body: impl Into<String>) {
        self.state.lock().unwrap().send.push_back(Script {
            response: ok(status, body),
            delay: Some(delay),
        });
    }

    pub fn push_send_failure(&self, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .send
            .push_back(failed(message).into());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn token_calls(&self) -> usize {
        self.count("GET")
    }

    pub fn upload_calls(&self) -> usize {
        self.count("POST multipart")
    }

    pub fn send_calls(&self) -> usize {
        self.count("POST json")
    }

    fn count(&self, method: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    fn record(&self, request: RecordedRequest) -> Script {
        let mut state = self.state.lock().unwrap();
        let queue = match request.method {
            "GET" => &mut state.token,
            "POST multipart" => &mut state.upload,
            _ => &mut state.send,
        };
        let scripted = queue.pop_front().unwrap_or_else(|| {
            failed(format!("no scripted response for {}", request.url)).into()
        });
        state.requests.push(request);
        scripted
    }

    fn respond(
        &self,
        request: RecordedRequest,
    ) -> BoxFuture<'_, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        let Script { response, delay } = self.record(request);
        let delay = delay.or(self.delay);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response.map_err(Into::into)
        })
    }
}

impl From<Scripted> for Script {
    fn from(response: Scripted) -> Self {
        Self {
            response,
            delay: None,
        }
    }
}

fn failed(message: impl Into<String>) -> Scripted {
    Err(message.into())
}

fn ok(status: u16, body: impl Into<String>) -> Scripted {
    Ok(HttpResponse {
        status,
        body: body.into(),
    })
}

impl HttpTransport for FakeTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        self.respond(RecordedRequest {
            method: "GET",
            url: url.to_owned(),
            body: None,
            upload: None,
        })
    }

    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: String,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        self.respond(RecordedRequest {
            method: "POST json",
            url: url.to_owned(),
            body: Some(body),
            upload: None,
        })
    }

    fn post_multipart<'a>(
        &'a self,
        url: &'a str,
        field: &'static str,
        file: MediaFile,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        self.respond(RecordedRequest {
            method: "POST multipart",
            url: url.to_owned(),
            body: None,
            upload: Some(RecordedUpload {
                field,
                file_name: file.file_name,
                bytes: file.bytes,
            }),
        })
    }
}
