//! Thesis routes
//!
//! Registration and records:
//! - POST /thesis/register
//! - GET  /thesis, /thesis/:id
//! - PUT  /thesis/:id (administrative override)
//!
//! Progress and review:
//! - GET  /thesis_progress, /thesis_progress/:id
//! - PUT|POST /thesis_progress/:id (multipart: `stage`, report file)
//! - GET  /feedback/:id, /feedback/:id/:stage
//! - PUT|DELETE /feedback/:id
//! - PUT  /assignhelp/:group_id
//!
//! Defer and correction:
//! - GET|PUT /thesis_defer, PUT /thesis_defer/decision, /thesis_defer/reset
//! - PUT /thesis_correction/request, /approve, /reset, /:id

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::auth::Actor;
use crate::routes::common::{
    authenticate, error_response, json_response, parse_id, parse_json, read_multipart, HttpResponse,
};
use crate::services::{thesis, Context};
use crate::types::{QuireError, Result};
use crate::workflow::Stage;

pub async fn handle_thesis_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match path {
        ["thesis", ..] => thesis_records(ctx, &actor, req, &path[1..]).await?,
        ["thesis_progress", ..] => progress(ctx, &actor, req, &path[1..]).await?,
        ["feedback", ..] => feedback(ctx, &actor, req, &path[1..]).await?,
        ["thesis_defer", ..] => defer(ctx, &actor, req, &path[1..]).await?,
        ["thesis_correction", ..] => correction(ctx, &actor, req, &path[1..]).await?,
        ["assignhelp", group_id] if req.method() == Method::PUT => {
            let group_id = parse_id(group_id, "group id")?;
            let saved = thesis::assign_assistant(ctx, &actor, group_id, parse_json(req)?).await?;
            Some(json_response(StatusCode::OK, &saved))
        }
        _ => None,
    };
    Ok(response)
}

async fn thesis_records(
    ctx: &Context,
    actor: &Actor,
    req: &Request<Bytes>,
    rest: &[&str],
) -> Result<Option<HttpResponse>> {
    let response = match (req.method(), rest) {
        (&Method::POST, ["register"]) => {
            let outcome = thesis::register(ctx, actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &outcome)
        }
        (&Method::GET, []) => json_response(StatusCode::OK, &thesis::list(ctx).await?),
        (&Method::GET, [id]) => {
            json_response(StatusCode::OK, &thesis::get(ctx, parse_id(id, "thesis id")?).await?)
        }
        (&Method::PUT, [id]) => {
            let id = parse_id(id, "thesis id")?;
            json_response(StatusCode::OK, &thesis::patch(ctx, actor, id, parse_json(req)?).await?)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}

async fn progress(ctx: &Context, actor: &Actor, req: &Request<Bytes>, rest: &[&str]) -> Result<Option<HttpResponse>> {
    let response = match (req.method(), rest) {
        (&Method::GET, []) => json_response(StatusCode::OK, &thesis::progress_list(ctx).await?),
        (&Method::GET, [id]) => json_response(
            StatusCode::OK,
            &thesis::progress_get(ctx, parse_id(id, "thesis id")?).await?,
        ),
        (&Method::PUT, [id]) | (&Method::POST, [id]) => {
            let id = parse_id(id, "thesis id")?;
            let form = read_multipart(req).await?;
            let stage: Stage = form
                .field("stage")
                .ok_or_else(|| QuireError::validation("stage is required"))?
                .parse()?;
            let saved = thesis::submit_stage_report(ctx, actor, id, stage, form.require_file()?).await?;
            json_response(StatusCode::OK, &saved)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}

async fn feedback(ctx: &Context, actor: &Actor, req: &Request<Bytes>, rest: &[&str]) -> Result<Option<HttpResponse>> {
    let response = match (req.method(), rest) {
        (&Method::GET, [id]) => json_response(
            StatusCode::OK,
            &thesis::get_feedback(ctx, parse_id(id, "thesis id")?).await?,
        ),
        (&Method::GET, [id, stage]) => {
            let stage: Stage = stage.parse()?;
            let text = thesis::get_stage_feedback(ctx, parse_id(id, "thesis id")?, stage).await?;
            json_response(StatusCode::OK, &json!({ "stage": stage, "feedback": text }))
        }
        (&Method::PUT, [id]) => {
            let id = parse_id(id, "thesis id")?;
            let saved = thesis::update_feedback(ctx, actor, id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &saved)
        }
        (&Method::DELETE, [id]) => {
            let saved = thesis::clear_feedback(ctx, actor, parse_id(id, "thesis id")?).await?;
            json_response(StatusCode::OK, &saved)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}

async fn defer(ctx: &Context, actor: &Actor, req: &Request<Bytes>, rest: &[&str]) -> Result<Option<HttpResponse>> {
    let response = match (req.method(), rest) {
        (&Method::GET, []) => json_response(StatusCode::OK, &thesis::list_defer(ctx, actor).await?),
        (&Method::PUT, []) => {
            json_response(StatusCode::OK, &thesis::request_defer(ctx, actor, parse_json(req)?).await?)
        }
        (&Method::PUT, ["decision"]) => {
            json_response(StatusCode::OK, &thesis::decide_defer(ctx, actor, parse_json(req)?).await?)
        }
        (&Method::PUT, ["reset"]) => {
            json_response(StatusCode::OK, &thesis::reset_defer(ctx, actor, parse_json(req)?).await?)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}

async fn correction(ctx: &Context, actor: &Actor, req: &Request<Bytes>, rest: &[&str]) -> Result<Option<HttpResponse>> {
    if req.method() != Method::PUT {
        return Ok(None);
    }
    let saved = match rest {
        ["request"] => thesis::request_correction(ctx, actor, parse_json(req)?).await?,
        ["approve"] => thesis::approve_correction(ctx, actor, parse_json(req)?).await?,
        ["reset"] => thesis::reset_correction(ctx, actor, parse_json(req)?).await?,
        [id] => thesis::apply_correction(ctx, actor, parse_id(id, "thesis id")?, parse_json(req)?).await?,
        _ => return Ok(None),
    };
    Ok(Some(json_response(StatusCode::OK, &saved)))
}
