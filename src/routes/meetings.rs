//! Meeting routes
//!
//! - GET /meeting, /meeting/:faculty_id
//! - POST /meeting/book (201 when the book is created, 200 when appended)
//! - PUT /meeting/:faculty_id/:student_id
//! - DELETE /meeting/expired

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::routes::common::{authenticate, error_response, json_response, parse_json, HttpResponse};
use crate::services::{meetings, Context};
use crate::types::Result;

pub async fn handle_meeting_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::GET, ["meeting"]) => json_response(StatusCode::OK, &meetings::list(ctx).await?),
        (&Method::POST, ["meeting", "book"]) => {
            let (book, created) = meetings::book(ctx, &actor, parse_json(req)?).await?;
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            json_response(status, &book)
        }
        (&Method::DELETE, ["meeting", "expired"]) => {
            let removed = meetings::purge_expired(ctx, &actor).await?;
            json_response(StatusCode::OK, &json!({ "removed": removed }))
        }
        (&Method::GET, ["meeting", faculty_id]) => {
            json_response(StatusCode::OK, &meetings::get(ctx, faculty_id).await?)
        }
        (&Method::PUT, ["meeting", faculty_id, student_id]) => {
            let book = meetings::update_event(ctx, &actor, faculty_id, student_id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &book)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
