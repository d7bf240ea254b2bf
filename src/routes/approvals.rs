//! Approval routes
//!
//! - POST/GET /approvals
//! - GET/PUT /approvals/:user_id (PUT decides the account)

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};

use crate::routes::common::{authenticate, error_response, json_response, parse_json, HttpResponse};
use crate::services::{approvals, Context};
use crate::types::Result;

pub async fn handle_approvals_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::POST, ["approvals"]) => {
            let filed = approvals::request(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &filed)
        }
        (&Method::GET, ["approvals"]) => json_response(StatusCode::OK, &approvals::list(ctx, &actor).await?),
        (&Method::GET, ["approvals", user_id]) => {
            json_response(StatusCode::OK, &approvals::for_user(ctx, &actor, user_id).await?)
        }
        (&Method::PUT, ["approvals", user_id]) => {
            let profile = approvals::decide_account(ctx, &actor, user_id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &profile)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
