//! Domain catalogue and expertise routes
//!
//! - GET/POST /domainlist, POST /domainlist/enlist
//! - PUT/DELETE /domainlist/:id_no
//! - GET/POST/PUT /expertise, PUT /expertise/clear, GET /expertise/:sup_id

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde::Deserialize;

use crate::routes::common::{
    authenticate, error_response, json_response, parse_id, parse_json, parse_json_or_default, HttpResponse,
};
use crate::services::{catalogue, Context};
use crate::types::Result;

#[derive(Debug, Default, Deserialize)]
struct ClearRequest {
    #[serde(default)]
    sup_id: Option<String>,
}

pub async fn handle_catalogue_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::GET, ["domainlist"]) => json_response(StatusCode::OK, &catalogue::list_domains(ctx).await?),
        (&Method::POST, ["domainlist"]) => {
            let entry = catalogue::register_domain(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &entry)
        }
        (&Method::POST, ["domainlist", "enlist"]) => {
            let enlisted = catalogue::enlist(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &enlisted)
        }
        (&Method::PUT, ["domainlist", id_no]) => {
            let id_no = parse_id(id_no, "domain id")?;
            let entry = catalogue::update_domain(ctx, &actor, id_no, parse_json(req)?).await?;
            json_response(StatusCode::OK, &entry)
        }
        (&Method::DELETE, ["domainlist", id_no]) => {
            let entry = catalogue::delete_domain(ctx, &actor, parse_id(id_no, "domain id")?).await?;
            json_response(StatusCode::OK, &entry)
        }

        (&Method::GET, ["expertise"]) => json_response(StatusCode::OK, &catalogue::list_expertise(ctx).await?),
        (&Method::POST, ["expertise"]) => {
            let entry = catalogue::register_expertise(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::CREATED, &entry)
        }
        (&Method::PUT, ["expertise"]) => {
            let entry = catalogue::update_expertise(ctx, &actor, parse_json(req)?).await?;
            json_response(StatusCode::OK, &entry)
        }
        (&Method::PUT, ["expertise", "clear"]) => {
            let clear: ClearRequest = parse_json_or_default(req)?;
            let entry = catalogue::clear_expertise(ctx, &actor, clear.sup_id.as_deref()).await?;
            json_response(StatusCode::OK, &entry)
        }
        (&Method::GET, ["expertise", sup_id]) => {
            json_response(StatusCode::OK, &catalogue::get_expertise(ctx, sup_id).await?)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}
