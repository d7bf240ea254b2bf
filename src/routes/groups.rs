//! Group routes
//!
//! - GET/POST   /groups
//! - GET        /groups/student/:student_id
//! - GET/PUT/DELETE /groups/:id (PUT adds a member)
//! - DELETE     /groups/:id/members/:student_id

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::routes::common::{authenticate, error_response, json_response, parse_id, parse_json, HttpResponse};
use crate::services::{groups, Context};
use crate::types::Result;

pub async fn handle_groups_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::GET, ["groups"]) => json_response(StatusCode::OK, &groups::list(ctx).await?),
        (&Method::POST, ["groups"]) => {
            let group = groups::create(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &group)
        }
        (&Method::GET, ["groups", "student", student_id]) => {
            json_response(StatusCode::OK, &groups::lookup_by_student(ctx, student_id).await?)
        }
        (&Method::GET, ["groups", id]) => {
            json_response(StatusCode::OK, &groups::get(ctx, parse_id(id, "group id")?).await?)
        }
        (&Method::PUT, ["groups", id]) => {
            let id = parse_id(id, "group id")?;
            let group = groups::add_member(ctx, &actor, id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &group)
        }
        (&Method::DELETE, ["groups", id]) => {
            let id = parse_id(id, "group id")?;
            groups::delete(ctx, &actor, id).await?;
            json_response(StatusCode::OK, &json!({ "deleted": id }))
        }
        (&Method::DELETE, ["groups", id, "members", student_id]) => {
            let id = parse_id(id, "group id")?;
            let group = groups::remove_member(ctx, &actor, id, student_id).await?;
            json_response(StatusCode::OK, &group)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
