//! Account routes
//!
//! - POST /auth/register, /auth/login, /auth/forgot, /auth/reset (public)
//! - GET  /auth/me
//! - PUT  /auth/password
//! - GET  /users, /users/:id, /users/:id/dashboard
//! - PUT  /users/:id
//! - POST /users/:id/picture (multipart `image`)

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde_json::json;

use crate::routes::common::{
    authenticate, error_response, json_response, parse_json, read_multipart, HttpResponse,
};
use crate::services::{accounts, Context};
use crate::types::Result;

pub async fn handle_auth_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route_auth(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route_auth(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let response = match (req.method(), path) {
        (&Method::POST, ["auth", "register"]) => {
            let profile = accounts::register(ctx, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &profile)
        }
        (&Method::POST, ["auth", "login"]) => {
            json_response(StatusCode::OK, &accounts::login(ctx, parse_json(req)?).await?)
        }
        (&Method::POST, ["auth", "forgot"]) => {
            accounts::forgot_password(ctx, parse_json(req)?).await?;
            json_response(
                StatusCode::OK,
                &json!({ "message": "If the account exists, a reset link has been sent" }),
            )
        }
        (&Method::POST, ["auth", "reset"]) => {
            accounts::reset_password(ctx, parse_json(req)?).await?;
            json_response(StatusCode::OK, &json!({ "message": "Password updated" }))
        }
        (&Method::GET, ["auth", "me"]) => {
            let actor = authenticate(ctx, req).await?;
            json_response(StatusCode::OK, &accounts::me(ctx, &actor).await?)
        }
        (&Method::PUT, ["auth", "password"]) => {
            let actor = authenticate(ctx, req).await?;
            accounts::change_password(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::OK, &json!({ "message": "Password changed" }))
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}

pub async fn handle_users_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route_users(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route_users(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::GET, ["users"]) => json_response(StatusCode::OK, &accounts::list_users(ctx, &actor).await?),
        (&Method::GET, ["users", id]) => json_response(StatusCode::OK, &accounts::get_user(ctx, id).await?),
        (&Method::PUT, ["users", id]) => {
            let profile = accounts::update_profile(ctx, &actor, id, parse_json(req)?).await?;
            json_response(StatusCode::OK, &profile)
        }
        (&Method::POST, ["users", id, "picture"]) => {
            let image = read_multipart(req).await?.require_file()?;
            json_response(StatusCode::OK, &accounts::upload_picture(ctx, &actor, id, image).await?)
        }
        (&Method::GET, ["users", id, "dashboard"]) => {
            json_response(StatusCode::OK, &accounts::dashboard(ctx, &actor, id).await?)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
