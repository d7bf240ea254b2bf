//! Proposal routes
//!
//! - POST/GET /students/propose (GET accepts `?faculty_id=`)
//! - GET/PUT/DELETE /students/propose/:id
//! - POST /students/propose/status/:id

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::routes::common::{authenticate, error_response, json_response, parse_json, parse_query, HttpResponse};
use crate::services::{proposals, Context};
use crate::types::Result;

pub async fn handle_proposals_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let ["students", "propose", rest @ ..] = path else {
        return Ok(None);
    };
    let actor = authenticate(ctx, req).await?;

    let response = match (req.method(), rest) {
        (&Method::POST, []) => {
            let proposal = proposals::create(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &proposal)
        }
        (&Method::GET, []) => {
            let list = proposals::list(ctx, &actor, parse_query(req)?).await?;
            json_response(StatusCode::OK, &list)
        }
        (&Method::POST, ["status", id]) => {
            let proposal = proposals::update_status(ctx, &actor, id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &proposal)
        }
        (&Method::GET, [id]) => json_response(StatusCode::OK, &proposals::get(ctx, id).await?),
        (&Method::PUT, [id]) => {
            let proposal = proposals::update(ctx, &actor, id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &proposal)
        }
        (&Method::DELETE, [id]) => {
            proposals::delete(ctx, &actor, id).await?;
            json_response(StatusCode::OK, &json!({ "deleted": id }))
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
