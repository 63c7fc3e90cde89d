//! HTTP server wiring.
//!
//! The builder is the composition root: it resolves the envelope
//! configuration once, assembles the response pipeline in its fixed order
//! (normalizer, then writer) and freezes the whole arrangement into an
//! [`ApiServer`] that is cheap to clone across connections.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use capsule_envelope::{
    ApiError, EnumRegistry, EnvelopeProperties, ErrorTranslator, ServiceError, StatusCatalog,
};

use crate::handler::{ApiHandler, HandlerValue};
use crate::normalize::ResponseNormalizer;
use crate::pipeline::{MediaType, Outcome, ResponseContext, ResponsePipeline};
use crate::request::ApiRequest;
use crate::router::Router;
use crate::write::JsonBodyWriter;

const DEFAULT_MAX_BODY: usize = 1024 * 1024;

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub envelope: EnvelopeProperties,
    /// Request bodies above this size are rejected as parse failures.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: ([127, 0, 0, 1], 8080).into(),
            envelope: EnvelopeProperties::default(),
            max_body_size: DEFAULT_MAX_BODY,
        }
    }
}

/// Builder for [`ApiServer`].
pub struct ApiServerBuilder {
    config: ServerConfig,
    router: Router,
    registry: Arc<EnumRegistry>,
}

impl ApiServerBuilder {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            registry: Arc::new(EnumRegistry::new()),
        }
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn properties(mut self, props: EnvelopeProperties) -> Self {
        self.config.envelope = props;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Register a handler for a method and path pattern.
    pub fn route<H>(mut self, method: Method, pattern: &str, handler: H) -> Self
    where
        H: ApiHandler + 'static,
    {
        self.router.route(method, pattern, Arc::new(handler));
        self
    }

    /// Shared enum conversion registry, for factory registration before the
    /// server starts.
    pub fn registry(&self) -> Arc<EnumRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn build(self) -> Result<ApiServer, ServiceError> {
        let normalizer = ResponseNormalizer::from_properties(&self.config.envelope)?;
        let pipeline = ResponsePipeline::new(vec![
            Arc::new(normalizer),
            Arc::new(JsonBodyWriter::new()),
        ]);
        Ok(ApiServer {
            inner: Arc::new(ServerInner {
                catalog: StatusCatalog::from_properties(&self.config.envelope),
                translator: ErrorTranslator::new(),
                config: self.config,
                router: self.router,
                registry: self.registry,
                pipeline,
            }),
        })
    }
}

impl Default for ApiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ServerInner {
    config: ServerConfig,
    router: Router,
    registry: Arc<EnumRegistry>,
    catalog: StatusCatalog,
    translator: ErrorTranslator,
    pipeline: ResponsePipeline,
}

/// The assembled server. Cloning shares all state.
#[derive(Clone)]
pub struct ApiServer {
    inner: Arc<ServerInner>,
}

impl ApiServer {
    pub fn builder() -> ApiServerBuilder {
        ApiServerBuilder::new()
    }

    pub fn registry(&self) -> Arc<EnumRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn pipeline_stage_names(&self) -> Vec<&'static str> {
        self.inner.pipeline.stage_names()
    }

    /// Produce the response for one request. Every path through here ends
    /// in a well-formed response; handler errors are translated into error
    /// envelopes rather than surfaced to the transport.
    pub async fn respond<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let target = format!("{} {}", parts.method, parts.uri.path());
        let media = MediaType::negotiate(&parts.headers);

        let outcome = match self.dispatch(parts, body).await {
            Ok(value) => Outcome::Value(value),
            Err(err) => Outcome::Error(self.inner.translator.translate(&err, &target)),
        };

        let mut cx = ResponseContext::new(media, outcome);
        if let Err(err) = self.inner.pipeline.run(&mut cx) {
            error!(request = %target, "response pipeline failed: {err}");
            return pipeline_failure();
        }
        cx.finish()
    }

    async fn dispatch<B>(
        &self,
        parts: http::request::Parts,
        body: B,
    ) -> Result<HandlerValue, ServiceError>
    where
        B: hyper::body::Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some((handler, params)) = self
            .inner
            .router
            .match_request(&parts.method, parts.uri.path())
        else {
            return Err(ServiceError::Business(ApiError::from_resolved(
                self.inner.catalog.not_found().clone(),
            )));
        };
        let bytes = collect_body(body, self.inner.config.max_body_size).await?;
        let request = ApiRequest::from_parts(parts, bytes, params);
        handler.handle(request).await
    }

    /// Bind and serve until the task is cancelled.
    pub async fn serve(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.inner.config.bind_address).await?;
        info!("listening on {}", self.inner.config.bind_address);
        info!(
            "response pipeline: {}",
            self.inner.pipeline.stage_names().join(" -> ")
        );

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("new connection from {peer_addr}");

            let server = self.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move {
                        Ok::<_, std::convert::Infallible>(server.respond(req).await)
                    }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let text = err.to_string();
                    if text.contains("connection closed before message completed") {
                        debug!("client disconnected: {err}");
                    } else {
                        error!("error serving connection: {err}");
                    }
                }
            });
        }
    }
}

impl fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiServer")
            .field("bind_address", &self.inner.config.bind_address)
            .field("stages", &self.inner.pipeline.stage_names())
            .finish()
    }
}

async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, ServiceError>
where
    B: hyper::body::Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let collected = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|err| ServiceError::BodyParse {
            field: None,
            detail: err.to_string(),
        })?;
    Ok(collected.to_bytes())
}

/// Last-resort response when the pipeline itself fails.
fn pipeline_failure() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(
        br#"{"code":500,"message":"Internal Server Error"}"#,
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
