//! In-process fakes of the identity provider and device API for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;
use url::Url;

use crate::auth::{AuthError, Credentials, IdentityProvider, Tokens};

/// Identity provider that counts logins and issues `token-<n>`.
#[derive(Clone)]
pub struct FakeProvider {
    logins: Arc<AtomicUsize>,
    reject: Arc<AtomicBool>,
    expires_in: Arc<AtomicI64>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            logins: Arc::default(),
            reject: Arc::default(),
            expires_in: Arc::new(AtomicI64::new(3600)),
        }
    }
}

impl FakeProvider {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Lifetime in seconds of tokens issued from now on.
    pub fn set_expires_in(&self, secs: i64) {
        self.expires_in.store(secs, Ordering::SeqCst);
    }
}

impl IdentityProvider for FakeProvider {
    async fn login(&self, _credentials: &Credentials) -> Result<Tokens, AuthError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected("Incorrect username or password.".into()));
        }
        let expires_in = self.expires_in.load(Ordering::SeqCst);
        Ok(Tokens::new(format!("token-{n}"), expires_in, Utc::now()))
    }
}

/// What the fake device API saw in one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub email: Option<String>,
}

#[derive(Default)]
struct ApiState {
    responses: VecDeque<(u16, String)>,
    seen: Vec<SeenRequest>,
}

/// Device API answering from a scripted queue of `(status, body)`.
///
/// Once the queue is empty every request gets a 503.
#[derive(Clone)]
pub struct FakeApi {
    url: Url,
    state: Arc<Mutex<ApiState>>,
}

impl FakeApi {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let state = Arc::new(Mutex::new(ApiState {
            responses: responses.into(),
            seen: Vec::new(),
        }));

        let app = Router::new()
            .route("/api/v1/device", get(devices))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{addr}/api/v1/device")).unwrap(),
            state,
        }
    }

    pub fn url(&self) -> Url {
        self.url.clone()
    }

    /// Queue more responses.
    pub fn push(&self, status: u16, body: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back((status, body.into()));
    }

    pub fn requests(&self) -> usize {
        self.state.lock().unwrap().seen.len()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().seen.clone()
    }
}

async fn devices(
    State(state): State<Arc<Mutex<ApiState>>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let mut state = state.lock().unwrap();
    state.seen.push(SeenRequest {
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        email: query.get("email").cloned(),
    });

    let (status, body) = state
        .responses
        .pop_front()
        .unwrap_or((503, "no scripted response".into()));
    (StatusCode::from_u16(status).unwrap(), body)
}

/// A URL nothing is listening on.
pub fn dead_url() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/api/v1/device")).unwrap()
}
