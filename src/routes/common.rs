//! Response builders and request helpers shared by the route handlers
//!
//! Handlers receive the request with its body already collected, so parsing
//! here is synchronous except for multipart forms.

use bytes::Bytes;
use futures::stream;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, warn};

use crate::auth::{extract_token_from_header, Actor, TokenPurpose};
use crate::db::AccountStatus;
use crate::services::{Context, Upload};
use crate::types::{QuireError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;
pub type HttpResponse = Response<BoxBody>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn with_cors(mut response: HttpResponse) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

fn response_with(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    with_cors(response)
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_string(body) {
        Ok(json) => response_with(status, "application/json", json),
        Err(e) => error_response(&QuireError::Internal(format!("response encoding failed: {}", e))),
    }
}

/// Raw file contents
pub fn bytes_response(data: Bytes, content_type: &'static str) -> HttpResponse {
    response_with(StatusCode::OK, content_type, data)
}

/// The single translation point from errors to HTTP responses.
/// Server-side detail is logged, never returned.
pub fn error_response(err: &QuireError) -> HttpResponse {
    let status = err.status_code();
    if err.is_server_side() {
        error!("Request failed ({}): {}", err.code(), err);
    } else if status == StatusCode::CONFLICT {
        warn!("Request conflict: {}", err);
    }

    json_response(
        status,
        &ErrorResponse {
            error: err.public_message(),
            code: err.code(),
        },
    )
}

pub fn not_found_response(path: &str) -> HttpResponse {
    error_response(&QuireError::not_found(format!("No route for {}", path)))
}

pub fn preflight_response() -> HttpResponse {
    let mut response = with_cors(Response::new(full_body(Bytes::new())));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

/// Identity from the `Authorization: Bearer` session token
///
/// The token only names the account. Role and status are read from the user
/// store on every request, so a demoted or disabled account loses its access
/// immediately.
pub async fn authenticate(ctx: &Context, req: &Request<Bytes>) -> Result<Actor> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let token = extract_token_from_header(header)
        .ok_or_else(|| QuireError::Unauthorized("Missing bearer token".into()))?;
    let claims = ctx.jwt.claims_for(token, TokenPurpose::Session)?;

    let user = ctx
        .stores
        .users
        .get(&claims.sub)
        .await?
        .ok_or_else(|| QuireError::Unauthorized("Account no longer exists".into()))?;
    match user.status {
        AccountStatus::Active => Ok(Actor::new(user.user_id, user.role)),
        AccountStatus::Pending => Err(QuireError::forbidden("Account is awaiting administrator approval")),
        AccountStatus::Disabled => Err(QuireError::forbidden("Account is disabled")),
    }
}

pub fn parse_json<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    let body = req.body();
    if body.is_empty() {
        return Err(QuireError::validation("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| QuireError::validation(format!("Invalid JSON: {}", e)))
}

/// Like [`parse_json`], but an empty body yields the default value
pub fn parse_json_or_default<T: DeserializeOwned + Default>(req: &Request<Bytes>) -> Result<T> {
    if req.body().is_empty() {
        return Ok(T::default());
    }
    parse_json(req)
}

pub fn parse_query<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    serde_urlencoded::from_str(req.uri().query().unwrap_or(""))
        .map_err(|e| QuireError::validation(format!("Invalid query: {}", e)))
}

/// Integer path parameter
pub fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| QuireError::validation(format!("Invalid {}: {}", what, value)))
}

/// Text fields and the first file of a multipart form
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl MultipartForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require_file(self) -> Result<Upload> {
        self.file
            .ok_or_else(|| QuireError::validation("A file is required"))
    }
}

pub async fn read_multipart(req: &Request<Bytes>) -> Result<MultipartForm> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| QuireError::validation("Expected a multipart/form-data body"))?;

    let body = req.body().clone();
    let mut multipart = multer::Multipart::new(
        stream::once(async move { Ok::<Bytes, std::io::Error>(body) }),
        boundary,
    );

    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await?;
                if form.file.is_none() {
                    form.file = Some(Upload { file_name, data });
                }
            }
            None => {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_request(body: &str) -> Request<Bytes> {
        Request::builder()
            .header("content-type", "multipart/form-data; boundary=XyZ")
            .body(Bytes::from(body.replace('\n', "\r\n")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_multipart_fields_and_file() {
        let req = multipart_request(
            "--XyZ\n\
             Content-Disposition: form-data; name=\"stage\"\n\
             \n\
             P1\n\
             --XyZ\n\
             Content-Disposition: form-data; name=\"report\"; filename=\"p1.pdf\"\n\
             Content-Type: application/pdf\n\
             \n\
             %PDF\n\
             --XyZ--\n",
        );
        let form = read_multipart(&req).await.unwrap();
        assert_eq!(form.field("stage"), Some("P1"));
        let file = form.require_file().unwrap();
        assert_eq!(file.file_name, "p1.pdf");
        assert_eq!(&file.data[..], b"%PDF");
    }

    #[tokio::test]
    async fn test_read_multipart_requires_boundary() {
        let req = Request::builder()
            .header("content-type", "application/json")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        assert!(matches!(
            read_multipart(&req).await.unwrap_err(),
            QuireError::Validation(_)
        ));
    }

    #[test]
    fn test_error_response_hides_server_detail() {
        let response = error_response(&QuireError::Database("connection refused at 10.0.0.3".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = error_response(&QuireError::workflow("Submit P1 first"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_id(" 42 ", "group id").unwrap(), 42);
        assert!(parse_id("x", "group id").is_err());

        let empty = Request::new(Bytes::new());
        assert!(parse_json::<serde_json::Value>(&empty).is_err());
        let value: HashMap<String, String> = parse_json_or_default(&empty).unwrap();
        assert!(value.is_empty());
    }
}
