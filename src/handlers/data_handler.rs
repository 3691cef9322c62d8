use actix_multipart::Multipart;
use actix_web::{post, web, HttpResponse, Responder};
use futures::TryStreamExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::table::{PageQuery, PageRequest};
use crate::services::csv_loader::load_table;

const MISSING_FILE: &str = "Missing file field. Submit multipart form-data with key 'file'.";

#[post("/api/data")]
async fn parse_uploaded_csv(
    config: web::Data<Config>,
    query: web::Query<PageQuery>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let content = read_file_field(&mut payload, config.max_upload_bytes)
        .await?
        .ok_or_else(|| AppError::Validation(MISSING_FILE.into()))?;

    let request = PageRequest::from_params(query.page.as_deref(), query.per_page.as_deref())?;
    let table = load_table(&content)?;
    let page = table.page(request)?;

    info!(
        "Parsed upload: {} rows, {} columns, returning {} rows",
        page.total,
        page.columns.len(),
        page.data.len()
    );
    Ok(HttpResponse::Ok().json(page))
}

/// Bytes of the `file` field, or `None` if the form has no such field.
async fn read_file_field(
    payload: &mut Multipart,
    max_bytes: usize,
) -> Result<Option<Vec<u8>>, AppError> {
    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Rejected multipart upload: {}", e);
                return Ok(None);
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let mut content = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?
        {
            if content.len() + chunk.len() > max_bytes {
                return Err(AppError::Validation(format!(
                    "Uploaded file exceeds the {max_bytes} byte limit."
                )));
            }
            content.extend_from_slice(&chunk);
        }
        return Ok(Some(content));
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(parse_uploaded_csv);
}
