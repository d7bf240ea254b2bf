//! Resource and stored file routes
//!
//! - GET/POST /resources (POST is multipart: `title`, file)
//! - DELETE /resources/:id
//! - GET /resources/download/:name
//! - GET /files/:area/:name (public)

use bytes::Bytes;
use hyper::{Method, Request, StatusCode};

use crate::routes::common::{
    authenticate, bytes_response, error_response, json_response, read_multipart, HttpResponse,
};
use crate::services::{resources, Context, FileArea};
use crate::types::Result;

pub async fn handle_resources_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    route(ctx, req, path)
        .await
        .unwrap_or_else(|e| Some(error_response(&e)))
}

async fn route(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Result<Option<HttpResponse>> {
    let actor = authenticate(ctx, req).await?;
    let response = match (req.method(), path) {
        (&Method::GET, ["resources"]) => json_response(StatusCode::OK, &resources::list(ctx).await?),
        (&Method::POST, ["resources"]) => {
            let form = read_multipart(req).await?;
            let title = form.field("title").unwrap_or_default().to_string();
            let resource = resources::upload(ctx, &actor, &title, form.require_file()?).await?;
            json_response(StatusCode::CREATED, &resource)
        }
        (&Method::GET, ["resources", "download", name]) => {
            let (data, content_type) = resources::download(ctx, FileArea::Resources, name).await?;
            bytes_response(data, content_type)
        }
        (&Method::DELETE, ["resources", id]) => {
            json_response(StatusCode::OK, &resources::delete(ctx, &actor, id).await?)
        }
        _ => return Ok(None),
    };
    Ok(Some(response))
}

/// Serve a stored upload. Unknown areas are not found.
pub async fn handle_files_request(ctx: &Context, req: &Request<Bytes>, path: &[&str]) -> Option<HttpResponse> {
    let (&Method::GET, ["files", area, name]) = (req.method(), path) else {
        return None;
    };
    let served = async {
        let area: FileArea = area.parse()?;
        resources::download(ctx, area, name).await
    };
    Some(match served.await {
        Ok((data, content_type)) => bytes_response(data, content_type),
        Err(e) => error_response(&e),
    })
}
