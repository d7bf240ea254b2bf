//! Mail routes
//!
//! - POST /email/send (staff)
//! - POST /email/toall (admin)

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::routes::common::{authenticate, error_response, json_response, parse_json, HttpResponse};
use crate::services::{mail, Context};
use crate::types::Result;

pub async fn handle_mail_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::POST, ["email", "send"]) => {
            mail::send_direct(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::OK, &json!({ "sent": true }))
        }
        (&Method::POST, ["email", "toall"]) => {
            let recipients = mail::broadcast(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::OK, &json!({ "sent": true, "recipients": recipients }))
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
