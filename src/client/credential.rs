//! Access-token cache: decides refresh-vs-reuse and performs the refresh call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{HttpTransport, WeComError, build_url, success_body};
use crate::domain::{AccessToken, CorpId, CorpSecret, ValidationError};

/// Margin subtracted from the remaining lifetime when deciding whether a cached
/// token may still be handed out.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(600);

/// Margin trimmed off the platform-declared `expires_in` when a token is stored.
pub const DEFAULT_LIFETIME_MARGIN: Duration = Duration::from_secs(100);

#[derive(Debug, Clone)]
/// Identity pair used to obtain access tokens (`corpid` + `corpsecret`).
pub struct CorpCredentials {
    corp_id: CorpId,
    secret: CorpSecret,
}

impl CorpCredentials {
    /// Validate that both parts are non-empty after trimming.
    pub fn new(
        corp_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            corp_id: CorpId::new(corp_id)?,
            secret: CorpSecret::new(secret)?,
        })
    }

    pub fn corp_id(&self) -> &CorpId {
        &self.corp_id
    }

    pub fn secret(&self) -> &CorpSecret {
        &self.secret
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How concurrent callers behave when they find the cached token stale.
pub enum RefreshPolicy {
    /// The first caller fetches; the others wait for that fetch and share its
    /// result, including a failure.
    #[default]
    SingleFlight,
    /// Every caller that observes a stale cache fetches on its own. The last
    /// fetch to finish decides the cached state.
    Independent,
}

#[derive(Debug, Clone)]
struct CachedCredential {
    token: AccessToken,
    expires_at: Instant,
}

impl CachedCredential {
    fn is_usable(&self, now: Instant, refresh_margin: Duration) -> bool {
        now.checked_add(refresh_margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

/// Cached token plus the outcome of the most recent fetch. `generation` counts
/// finished fetches so a waiting caller can tell that one completed while it
/// was queued.
#[derive(Debug, Default)]
struct CacheState {
    credential: Option<CachedCredential>,
    last_failure: Option<Arc<WeComError>>,
    generation: u64,
}

pub(super) struct CredentialManager {
    credentials: CorpCredentials,
    token_endpoint: String,
    policy: RefreshPolicy,
    refresh_margin: Duration,
    lifetime_margin: Duration,
    http: Arc<dyn HttpTransport>,
    state: Mutex<CacheState>,
    // Held across a fetch under `RefreshPolicy::SingleFlight`.
    flight: Mutex<()>,
}

impl CredentialManager {
    pub(super) fn new(
        credentials: CorpCredentials,
        token_endpoint: String,
        policy: RefreshPolicy,
        refresh_margin: Duration,
        lifetime_margin: Duration,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            credentials,
            token_endpoint,
            policy,
            refresh_margin,
            lifetime_margin,
            http,
            state: Mutex::new(CacheState::default()),
            flight: Mutex::new(()),
        }
    }

    /// Return a token that is valid by this cache's own accounting, fetching a
    /// new one when needed.
    pub(super) async fn acquire(&self) -> Result<AccessToken, WeComError> {
        let observed = {
            let state = self.state.lock().await;
            if let Some(token) = self.reusable(state.credential.as_ref()) {
                return Ok(token);
            }
            state.generation
        };

        match self.policy {
            RefreshPolicy::SingleFlight => {
                let _flight = self.flight.lock().await;
                if let Some(shared) = self.finished_since(observed).await {
                    return shared;
                }
                self.refresh().await
            }
            RefreshPolicy::Independent => self.refresh().await,
        }
    }

    /// Drop the cached token unconditionally.
    pub(super) async fn invalidate(&self) {
        self.state.lock().await.credential = None;
    }

    /// Drop the cached token only if it is `rejected`; a newer token stored by
    /// another caller survives.
    pub(super) async fn invalidate_token(&self, rejected: &AccessToken) -> bool {
        let mut state = self.state.lock().await;
        let matches = state
            .credential
            .as_ref()
            .is_some_and(|credential| credential.token == *rejected);
        if matches {
            state.credential = None;
        }
        matches
    }

    fn reusable(&self, cached: Option<&CachedCredential>) -> Option<AccessToken> {
        cached
            .filter(|credential| credential.is_usable(Instant::now(), self.refresh_margin))
            .map(|credential| credential.token.clone())
    }

    /// Outcome of a fetch that finished after generation `observed`, if any.
    async fn finished_since(
        &self,
        observed: u64,
    ) -> Option<Result<AccessToken, WeComError>> {
        let state = self.state.lock().await;
        if state.generation == observed {
            return None;
        }
        if let Some(credential) = &state.credential {
            return Some(Ok(credential.token.clone()));
        }
        state
            .last_failure
            .as_ref()
            .map(|failure| Err(WeComError::CredentialUnavailable(Arc::clone(failure))))
    }

    async fn refresh(&self) -> Result<AccessToken, WeComError> {
        let fetched = self.fetch().await;

        let mut state = self.state.lock().await;
        state.generation = state.generation.wrapping_add(1);
        match fetched {
            Ok(credential) => {
                let token = credential.token.clone();
                state.credential = Some(credential);
                state.last_failure = None;
                Ok(token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch access token");
                let failure = Arc::new(err);
                state.credential = None;
                state.last_failure = Some(Arc::clone(&failure));
                Err(WeComError::CredentialUnavailable(failure))
            }
        }
    }

    async fn fetch(&self) -> Result<CachedCredential, WeComError> {
        let fetched_at = Instant::now();
        let query = crate::transport::encode_token_query(
            self.credentials.corp_id(),
            self.credentials.secret(),
        );
        let url = build_url(&self.token_endpoint, &query)?;

        let response = self.http.get(&url).await.map_err(WeComError::Transport)?;
        let body = success_body(response)?;

        let grant = crate::transport::decode_token_json_response(&body)
            .map_err(|err| WeComError::Parse(Box::new(err)))?;

        if !grant.errcode.is_ok() {
            return Err(WeComError::Api {
                errcode: grant.errcode,
                errmsg: grant.errmsg,
            });
        }

        let token = grant
            .access_token
            .ok_or_else(|| WeComError::Parse("token response has no access_token".into()))?;
        let expires_in = grant.expires_in.unwrap_or_default();
        let lifetime = Duration::from_secs(expires_in).saturating_sub(self.lifetime_margin);
        let expires_at = fetched_at.checked_add(lifetime).ok_or_else(|| {
            WeComError::Parse(format!("token expires_in {expires_in} is out of range").into())
        })?;

        tracing::debug!(expires_in, "fetched new access token");

        Ok(CachedCredential { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fake::FakeTransport;
    use super::*;
    use crate::domain::ErrCode;

    const TOKEN_URL: &str = "https://example.invalid/cgi-bin/gettoken";

    const GRANT_T1: &str =
        r#"{"errcode": 0, "errmsg": "ok", "access_token": "T1", "expires_in": 7200}"#;
    const GRANT_T2: &str =
        r#"{"errcode": 0, "errmsg": "ok", "access_token": "T2", "expires_in": 7200}"#;

    fn manager(transport: &FakeTransport, policy: RefreshPolicy) -> CredentialManager {
        CredentialManager::new(
            CorpCredentials::new("ww123", "s3cret").unwrap(),
            TOKEN_URL.to_owned(),
            policy,
            DEFAULT_REFRESH_MARGIN,
            DEFAULT_LIFETIME_MARGIN,
            Arc::new(transport.clone()),
        )
    }

    fn token(value: &str) -> AccessToken {
        AccessToken::new(value).unwrap()
    }

    #[test]
    fn corp_credentials_validate_inputs() {
        assert!(CorpCredentials::new("", "secret").is_err());
        assert!(CorpCredentials::new("ww123", "  ").is_err());

        let credentials = CorpCredentials::new(" ww123 ", " s3cret ").unwrap();
        assert_eq!(credentials.corp_id().as_str(), "ww123");
        assert_eq!(credentials.secret().as_str(), "s3cret");
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_once_then_reuses_cached_token() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        assert_eq!(manager.acquire().await.unwrap(), token("T1"));
        assert_eq!(manager.acquire().await.unwrap(), token("T1"));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(manager.acquire().await.unwrap(), token("T1"));

        assert_eq!(transport.token_calls(), 1);
        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            format!("{TOKEN_URL}?corpid=ww123&corpsecret=s3cret")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_once_the_refresh_margin_is_reached() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        assert_eq!(manager.acquire().await.unwrap(), token("T1"));

        // Stored expiry is 7200 - 100 seconds; tokens are reused until 600
        // seconds before that.
        tokio::time::advance(Duration::from_secs(6499)).await;
        assert_eq!(manager.acquire().await.unwrap(), token("T1"));
        assert_eq!(transport.token_calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 2);

        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_computed_expiry() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        manager.acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(7200 - 99)).await;

        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn platform_rejection_clears_cache_and_next_call_refetches() {
        let transport = FakeTransport::new();
        transport.push_token(200, r#"{"errcode": 40001, "errmsg": "invalid credential"}"#);
        transport.push_token(200, GRANT_T1);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        let err = manager.acquire().await.unwrap_err();
        match err {
            WeComError::CredentialUnavailable(cause) => match cause.as_ref() {
                WeComError::Api { errcode, errmsg } => {
                    assert_eq!(*errcode, ErrCode::new(40001));
                    assert_eq!(errmsg.as_deref(), Some("invalid credential"));
                }
                other => panic!("unexpected cause: {other:?}"),
            },
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(manager.acquire().await.unwrap(), token("T1"));
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_does_not_fall_back_to_stale_token() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        transport.push_token_failure("connection reset");
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        manager.acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(7200)).await;

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            WeComError::CredentialUnavailable(ref cause)
                if matches!(**cause, WeComError::Transport(_))
        ));

        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_success_http_status_is_unavailable() {
        let transport = FakeTransport::new();
        transport.push_token(502, "bad gateway");
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            WeComError::CredentialUnavailable(ref cause)
                if matches!(**cause, WeComError::HttpStatus { status: 502, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_a_fresh_fetch() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        manager.acquire().await.unwrap();
        manager.invalidate().await;

        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lifetime_shorter_than_margin_is_never_reused() {
        let transport = FakeTransport::new();
        transport.push_token(
            200,
            r#"{"errcode": 0, "access_token": "short", "expires_in": 60}"#,
        );
        transport.push_token(200, GRANT_T1);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        assert_eq!(manager.acquire().await.unwrap(), token("short"));
        assert_eq!(manager.acquire().await.unwrap(), token("T1"));
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_coalesces_concurrent_refreshes() {
        let transport = FakeTransport::new().with_delay(Duration::from_millis(500));
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        let (first, second) = tokio::join!(manager.acquire(), manager.acquire());

        assert_eq!(first.unwrap(), token("T1"));
        assert_eq!(second.unwrap(), token("T1"));
        assert_eq!(transport.token_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_shares_a_failed_fetch_with_waiters() {
        let transport = FakeTransport::new().with_delay(Duration::from_millis(500));
        for _ in 0..3 {
            transport.push_token(200, r#"{"errcode": 40001, "errmsg": "invalid credential"}"#);
        }
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        let (first, second, third) =
            tokio::join!(manager.acquire(), manager.acquire(), manager.acquire());

        for result in [first, second, third] {
            assert!(matches!(
                result,
                Err(WeComError::CredentialUnavailable(ref cause))
                    if matches!(**cause, WeComError::Api { .. })
            ));
        }
        assert_eq!(transport.token_calls(), 1);

        // The next caller after the failure starts a new fetch.
        assert!(manager.acquire().await.is_err());
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_expires_in_is_rejected_without_panicking() {
        let transport = FakeTransport::new();
        transport.push_token(
            200,
            r#"{"errcode": 0, "access_token": "T1", "expires_in": 18446744073709551615}"#,
        );
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            WeComError::CredentialUnavailable(ref cause) if matches!(**cause, WeComError::Parse(_))
        ));

        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_refresh_margin_never_reuses_and_never_panics() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = CredentialManager::new(
            CorpCredentials::new("ww123", "s3cret").unwrap(),
            TOKEN_URL.to_owned(),
            RefreshPolicy::SingleFlight,
            Duration::MAX,
            DEFAULT_LIFETIME_MARGIN,
            Arc::new(transport.clone()),
        );

        assert_eq!(manager.acquire().await.unwrap(), token("T1"));
        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidating_a_stale_token_keeps_the_newer_one() {
        let transport = FakeTransport::new();
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::SingleFlight);

        let stale = manager.acquire().await.unwrap();
        manager.invalidate().await;
        assert_eq!(manager.acquire().await.unwrap(), token("T2"));

        assert!(!manager.invalidate_token(&stale).await);
        assert_eq!(manager.acquire().await.unwrap(), token("T2"));
        assert_eq!(transport.token_calls(), 2);

        assert!(manager.invalidate_token(&token("T2")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_policy_fetches_per_caller() {
        let transport = FakeTransport::new().with_delay(Duration::from_millis(500));
        transport.push_token(200, GRANT_T1);
        transport.push_token(200, GRANT_T2);
        let manager = manager(&transport, RefreshPolicy::Independent);

        let (first, second) = tokio::join!(manager.acquire(), manager.acquire());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(transport.token_calls(), 2);
    }
}
