//! Demo user service.
//!
//! Exercises the whole envelope surface: lookup with present/absent
//! semantics, body validation, business errors raised from status
//! constants, enum token conversion, file download and a raw passthrough
//! endpoint. Configuration is read from `capsule.toml` next to the binary
//! when present.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use capsule_envelope::{
    ApiError, ConvertError, Envelope, EnumRegistry, EnvelopeProperties, FieldError, ResultStatus,
    ServiceError, WireEnum,
};
use capsule_server::{ApiHandler, ApiRequest, ApiServer, HandlerValue, ServerConfig};

const CONFIG_FILE: &str = "capsule.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoConfig {
    bind_address: Option<SocketAddr>,
    envelope: EnvelopeProperties,
}

fn load_config() -> DemoConfig {
    match std::fs::read_to_string(CONFIG_FILE) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => {
                info!("loaded configuration from {CONFIG_FILE}");
                config
            }
            Err(err) => {
                tracing::warn!("ignoring malformed {CONFIG_FILE}: {err}");
                DemoConfig::default()
            }
        },
        Err(_) => DemoConfig::default(),
    }
}

/// Business status vocabulary of this service.
#[derive(Debug, Clone, Copy)]
enum UserStatus {
    PasswordMismatch,
    Suspended,
}

impl ResultStatus for UserStatus {
    fn code(&self) -> i32 {
        match self {
            UserStatus::PasswordMismatch => 801,
            UserStatus::Suspended => 802,
        }
    }

    fn message(&self) -> &str {
        match self {
            UserStatus::PasswordMismatch => "password mismatch",
            UserStatus::Suspended => "account suspended",
        }
    }

    fn name(&self) -> &str {
        match self {
            UserStatus::PasswordMismatch => "PASSWORD_MISMATCH",
            UserStatus::Suspended => "SUSPENDED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gender {
    Male,
    Female,
}

impl WireEnum for Gender {
    const VARIANTS: &'static [Self] = &[Gender::Male, Gender::Female];

    fn name(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

// Accepts short tokens on top of the declared names.
fn gender_factory(token: &str) -> Result<Gender, ConvertError> {
    match token {
        "M" | "MALE" | "0" => Ok(Gender::Male),
        "F" | "FEMALE" | "1" => Ok(Gender::Female),
        other => Err(ConvertError::NoMatch {
            type_name: "Gender",
            token: other.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    gender: &'static str,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

#[derive(Debug, Default)]
struct UserStore {
    users: RwLock<HashMap<u64, User>>,
}

impl UserStore {
    fn seeded() -> Arc<Self> {
        let store = Self::default();
        {
            let mut users = store.users.write().unwrap_or_else(|e| e.into_inner());
            users.insert(
                1,
                User {
                    id: 1,
                    name: "alice".to_string(),
                    gender: "FEMALE",
                },
            );
        }
        Arc::new(store)
    }

    fn get(&self, id: u64) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    fn insert(&self, name: String) -> User {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let id = users.keys().max().copied().unwrap_or(0) + 1;
        let user = User {
            id,
            name,
            gender: "MALE",
        };
        users.insert(id, user.clone());
        user
    }
}

/// `GET /user/{id}` — absent users surface as the not-found envelope.
struct GetUser {
    store: Arc<UserStore>,
}

#[async_trait]
impl ApiHandler for GetUser {
    async fn handle(&self, req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        let id: u64 = req
            .param("id")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| ServiceError::invalid_field("id", "must be a positive integer"))?;
        match self.store.get(id) {
            Some(user) => HandlerValue::json(&user),
            None => Ok(HandlerValue::Empty),
        }
    }
}

/// `POST /user` — field validation, then the password-mismatch business
/// rule.
struct CreateUser {
    store: Arc<UserStore>,
}

#[async_trait]
impl ApiHandler for CreateUser {
    async fn handle(&self, req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        let body: NewUser = req.json_body()?;
        let mut errors = Vec::new();
        if body.name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be blank"));
        }
        if body.password.is_empty() {
            errors.push(FieldError::new("password", "must not be empty"));
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }
        if body.password != body.confirm_password {
            return Err(ApiError::from_status(&UserStatus::PasswordMismatch).into());
        }
        let user = self.store.insert(body.name);
        HandlerValue::json(&user)
    }
}

/// `GET /fail` — a handler returning a failure envelope as its normal
/// value, without raising an error.
struct AlwaysFail;

#[async_trait]
impl ApiHandler for AlwaysFail {
    async fn handle(&self, _req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        Ok(HandlerValue::Envelope(Envelope::fail(&UserStatus::Suspended)))
    }
}

/// `GET /exception` — the same outcome raised as an error, translated on
/// the way out.
struct AlwaysRaise;

#[async_trait]
impl ApiHandler for AlwaysRaise {
    async fn handle(&self, _req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        Err(ApiError::from_status(&UserStatus::PasswordMismatch).into())
    }
}

/// `GET /gender?value=<token>` — converts through the shared registry.
struct GenderLookup {
    registry: Arc<EnumRegistry>,
}

#[async_trait]
impl ApiHandler for GenderLookup {
    async fn handle(&self, req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        let token = req.query("value").unwrap_or("");
        let gender: Option<Gender> = self.registry.convert_str(token)?;
        match gender {
            Some(g) => Ok(HandlerValue::Value(json!({"gender": g.name()}))),
            None => Ok(HandlerValue::Empty),
        }
    }
}

/// `GET /file` — download endpoint; the payload leaves as-is with
/// attachment headers, never wrapped.
struct ExportUsers {
    store: Arc<UserStore>,
}

#[async_trait]
impl ApiHandler for ExportUsers {
    async fn handle(&self, _req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        let users: Vec<User> = {
            let guard = self.store.users.read().unwrap_or_else(|e| e.into_inner());
            guard.values().cloned().collect()
        };
        let bytes = serde_json::to_vec_pretty(&users)
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(HandlerValue::File(Envelope::file("用户列表.json", bytes)))
    }
}

/// `GET /raw` — bypasses envelope wrapping entirely.
struct RawPing;

#[async_trait]
impl ApiHandler for RawPing {
    async fn handle(&self, _req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        let response = http::Response::builder()
            .status(StatusCode::OK)
            .header(http::header::CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from_static(b"pong")))
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(HandlerValue::Raw(response))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let demo = load_config();
    let mut config = ServerConfig {
        envelope: demo.envelope,
        ..Default::default()
    };
    if let Some(addr) = demo.bind_address {
        config.bind_address = addr;
    }

    let store = UserStore::seeded();
    let builder = capsule_server::ApiServerBuilder::with_config(config);
    let registry = builder.registry();
    registry.register_factory::<Gender, _>(gender_factory);

    let server: ApiServer = builder
        .route(Method::GET, "/user/{id}", GetUser { store: store.clone() })
        .route(Method::POST, "/user", CreateUser { store: store.clone() })
        .route(Method::GET, "/fail", AlwaysFail)
        .route(Method::GET, "/exception", AlwaysRaise)
        .route(Method::GET, "/gender", GenderLookup { registry })
        .route(Method::GET, "/file", ExportUsers { store })
        .route(Method::GET, "/raw", RawPing)
        .build()?;

    server.serve().await?;
    Ok(())
}
