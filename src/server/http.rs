//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Bodies are collected up
//! to the configured limit before routing, so [`dispatch`] only ever sees
//! `Request<Bytes>`.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::routes::{self, error_response, HttpResponse};
use crate::services::Context;
use crate::types::QuireError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub ctx: Context,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, ctx: Context) -> Self {
        Self {
            args,
            ctx,
            started_at: Instant::now(),
        }
    }
}

pub async fn run(state: Arc<AppState>) -> Result<(), QuireError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Quire listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - do not expose this instance");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

fn is_multipart(req: &Request<Incoming>) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Collect the body up to `limit` bytes
async fn collect_body(req: Request<Incoming>, limit: usize) -> Result<Request<Bytes>, QuireError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(QuireError::PayloadTooLarge(limit));
    }

    let (parts, body) = req.into_parts();
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            QuireError::PayloadTooLarge(limit)
        } else {
            QuireError::validation(format!("Failed to read body: {}", e))
        }
    })?;
    Ok(Request::from_parts(parts, collected.to_bytes()))
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<HttpResponse, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    info!("[{}] {} {}", addr, method, path);

    let limit = if is_multipart(&req) {
        state.args.max_upload_bytes
    } else {
        state.args.max_json_bytes
    };

    let response = match collect_body(req, limit).await {
        Ok(req) => dispatch(&state, req).await,
        Err(e) => error_response(&e),
    };

    debug!("[{}] {} {} -> {}", addr, method, path, response.status());
    Ok(response)
}

/// Route a request with a collected body
pub async fn dispatch(state: &AppState, req: Request<Bytes>) -> HttpResponse {
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let ctx = &state.ctx;

    let handled = match (req.method(), segments.first().copied()) {
        (&Method::OPTIONS, _) => Some(routes::preflight_response()),

        (&Method::GET, Some("health") | Some("healthz")) if segments.len() == 1 => {
            Some(routes::health_check(state))
        }
        (&Method::GET, Some("version")) if segments.len() == 1 => Some(routes::version_info()),

        (_, Some("auth")) => routes::handle_auth_request(ctx, &req, &segments).await,
        (_, Some("users")) => routes::handle_users_request(ctx, &req, &segments).await,
        (_, Some("approvals")) => routes::handle_approvals_request(ctx, &req, &segments).await,
        (_, Some("groups")) => routes::handle_groups_request(ctx, &req, &segments).await,
        (
            _,
            Some("thesis") | Some("thesis_progress") | Some("feedback") | Some("assignhelp")
            | Some("thesis_defer") | Some("thesis_correction"),
        ) => routes::handle_thesis_request(ctx, &req, &segments).await,
        (_, Some("students")) => routes::handle_proposals_request(ctx, &req, &segments).await,
        (_, Some("domainlist") | Some("expertise")) => {
            routes::handle_catalogue_request(ctx, &req, &segments).await
        }
        (_, Some("synopsis")) => routes::handle_synopsis_request(ctx, &req, &segments).await,
        (_, Some("meeting")) => routes::handle_meeting_request(ctx, &req, &segments).await,
        (_, Some("resources")) => routes::handle_resources_request(ctx, &req, &segments).await,
        (_, Some("files")) => routes::handle_files_request(ctx, &req, &segments).await,
        (_, Some("email")) => routes::handle_mail_request(ctx, &req, &segments).await,
        _ => None,
    };

    handled.unwrap_or_else(|| routes::not_found_response(&path))
}
