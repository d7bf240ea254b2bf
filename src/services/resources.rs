//! Shared course resources
//!
//! Staff upload documents (templates, guidelines, slides) that every user
//! can list and download.

use bytes::Bytes;
use tracing::info;

use crate::auth::Actor;
use crate::db::{Query, ResourceDoc};
use crate::services::files::content_type;
use crate::services::{require_staff, require_text, Context, FileArea, Upload};
use crate::types::{QuireError, Result};

/// Newest first
pub async fn list(ctx: &Context) -> Result<Vec<ResourceDoc>> {
    let mut resources = ctx.stores.resources.find(&Query::all()).await?;
    resources.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
    Ok(resources)
}

pub async fn upload(ctx: &Context, actor: &Actor, title: &str, file: Upload) -> Result<ResourceDoc> {
    require_staff(actor)?;
    let title = require_text(title, "title")?;
    if file.data.is_empty() {
        return Err(QuireError::validation("A non-empty file is required"));
    }

    let stored = ctx
        .files
        .save(FileArea::Resources, &file.file_name, &file.data)
        .await?;
    let path = stored.public_path();

    match ctx
        .stores
        .resources
        .insert(ResourceDoc::new(title, path.clone(), &actor.user_id))
        .await
    {
        Ok(resource) => {
            info!("Resource {} uploaded by {} at {}", resource.id, actor.user_id, path);
            Ok(resource)
        }
        Err(e) => {
            ctx.files.remove(&path).await;
            Err(e)
        }
    }
}

pub async fn delete(ctx: &Context, actor: &Actor, id: &str) -> Result<ResourceDoc> {
    require_staff(actor)?;
    let resource = ctx
        .stores
        .resources
        .delete(&id.to_string())
        .await?
        .ok_or_else(|| QuireError::not_found(format!("Resource {} not found", id)))?;

    ctx.files.remove(&resource.file_path).await;
    info!("Resource {} deleted by {}", resource.id, actor.user_id);
    Ok(resource)
}

/// File contents and content type for a stored upload
pub async fn download(ctx: &Context, area: FileArea, name: &str) -> Result<(Bytes, &'static str)> {
    let data = ctx.files.read(area, name).await?;
    Ok((data, content_type(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::*;
    use crate::services::StoredFile;

    fn pdf(name: &str) -> Upload {
        Upload {
            file_name: name.into(),
            data: Bytes::from_static(b"%PDF-1.7 guidelines"),
        }
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let (ctx, _mailer, _dir) = test_context().await;

        let err = upload(&ctx, &student("s1"), "Guide", pdf("guide.pdf")).await.unwrap_err();
        assert!(matches!(err, QuireError::Forbidden(_)));

        let resource = upload(&ctx, &faculty("f1"), " Thesis guide ", pdf("guide.pdf")).await.unwrap();
        assert_eq!(resource.title, "Thesis guide");
        assert!(resource.file_path.starts_with("/files/resources/"));
        assert!(resource.file_path.ends_with(".pdf"));

        let stored = StoredFile::from_public_path(&resource.file_path).unwrap();
        let (data, kind) = download(&ctx, stored.area, &stored.name).await.unwrap();
        assert_eq!(&data[..], b"%PDF-1.7 guidelines");
        assert_eq!(kind, "application/pdf");

        assert_eq!(list(&ctx).await.unwrap().len(), 1);
        delete(&ctx, &faculty("f1"), &resource.id).await.unwrap();
        assert!(list(&ctx).await.unwrap().is_empty());
        assert!(matches!(
            download(&ctx, stored.area, &stored.name).await.unwrap_err(),
            QuireError::NotFound(_)
        ));
        assert!(matches!(
            delete(&ctx, &admin(), &resource.id).await.unwrap_err(),
            QuireError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (ctx, _mailer, _dir) = test_context().await;
        let empty = Upload {
            file_name: "empty.pdf".into(),
            data: Bytes::new(),
        };
        let err = upload(&ctx, &admin(), "Empty", empty).await.unwrap_err();
        assert!(matches!(err, QuireError::Validation(_)));
    }
}
