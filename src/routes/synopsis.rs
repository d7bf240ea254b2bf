//! Synopsis routes
//!
//! - GET/POST /synopsis
//! - GET /synopsis/:sup_id
//! - PUT/DELETE /synopsis/entry/:syn_id

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::routes::common::{authenticate, error_response, json_response, parse_id, parse_json, HttpResponse};
use crate::services::{synopsis, Context};
use crate::types::Result;

pub async fn handle_synopsis_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::GET, ["synopsis"]) => json_response(StatusCode::OK, &synopsis::list(ctx).await?),
        (&Method::POST, ["synopsis"]) => {
            let entry = synopsis::create(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &entry)
        }
        (&Method::PUT, ["synopsis", "entry", syn_id]) => {
            let syn_id = parse_id(syn_id, "synopsis id")?;
            let entry = synopsis::update(ctx, &actor, syn_id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &entry)
        }
        (&Method::DELETE, ["synopsis", "entry", syn_id]) => {
            let syn_id = parse_id(syn_id, "synopsis id")?;
            synopsis::delete(ctx, &actor, syn_id).await?;
            json_response(StatusCode::OK, &json!({ "deleted": syn_id }))
        }
        (&Method::GET, ["synopsis", sup_id]) => {
            json_response(StatusCode::OK, &synopsis::by_supervisor(ctx, sup_id).await?)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
