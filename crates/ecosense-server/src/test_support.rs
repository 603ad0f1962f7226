//! In-process fake of the EcoSense cloud for handler tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_test::TestServer;
use ecosense_core::{
    AuthFlow, Coordinator, DeviceClient, ProviderConfig, RadonUnit, ServerConfig, Settings,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

use crate::api::create_router;
use crate::state::AppState;

type Responses = Arc<Mutex<VecDeque<(u16, String)>>>;

/// Serves a password-flow Cognito login at `/` and the device list from a queue.
pub struct FakeCloud {
    base: Url,
}

impl FakeCloud {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let responses: Responses = Arc::new(Mutex::new(responses.into()));
        let app = Router::new()
            .route("/", post(login))
            .route("/api/v1/device", get(devices))
            .with_state(responses);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{addr}/")).unwrap(),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            username: "me@example.com".to_string(),
            password: "right".to_string(),
            unit: RadonUnit::default(),
            poll_interval_secs: 300,
            provider: ProviderConfig {
                api_url: self.base.join("api/v1/device").unwrap(),
                identity_url: Some(self.base.clone()),
                auth_flow: AuthFlow::Password,
                ..ProviderConfig::default()
            },
            server: ServerConfig::default(),
        }
    }
}

async fn login() -> Json<Value> {
    Json(json!({
        "AuthenticationResult": {
            "IdToken": "id-token",
            "ExpiresIn": 3600,
            "TokenType": "Bearer"
        }
    }))
}

async fn devices(State(responses): State<Responses>) -> (StatusCode, String) {
    let (status, body) = responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((503, "no scripted response".into()));
    (StatusCode::from_u16(status).unwrap(), body)
}

/// JSON array body from device objects.
pub fn devices_body(devices: &[Value]) -> String {
    Value::Array(devices.to_vec()).to_string()
}

/// A test server over a coordinator polling `cloud`.
///
/// With `poll_first` the startup refresh runs before the server is built.
pub async fn test_server(cloud: &FakeCloud, poll_first: bool) -> TestServer {
    let settings = cloud.settings();
    let client = DeviceClient::from_settings(&settings).unwrap();
    let coordinator = Arc::new(Coordinator::new(client, settings.poll_interval()));
    if poll_first {
        coordinator.first_refresh().await.unwrap();
    }

    let state = AppState::new(coordinator, &settings).shared();
    TestServer::new(create_router(state)).unwrap()
}
