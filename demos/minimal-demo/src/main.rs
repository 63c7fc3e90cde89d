//! Smallest possible capsule service: one endpoint that succeeds and one
//! that raises a business error, with everything else left at defaults.

use async_trait::async_trait;
use http::Method;
use serde_json::json;

use capsule_envelope::{ApiError, ServiceError};
use capsule_server::{ApiHandler, ApiRequest, ApiServer, HandlerValue};

struct Hello;

#[async_trait]
impl ApiHandler for Hello {
    async fn handle(&self, _req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        Ok(HandlerValue::Value(json!({"hello": "world"})))
    }
}

struct Broken;

#[async_trait]
impl ApiHandler for Broken {
    async fn handle(&self, _req: ApiRequest) -> Result<HandlerValue, ServiceError> {
        Err(ApiError::new(901, "test failure").into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let server: ApiServer = ApiServer::builder()
        .route(Method::GET, "/hello", Hello)
        .route(Method::GET, "/broken", Broken)
        .build()?;

    server.serve().await?;
    Ok(())
}
