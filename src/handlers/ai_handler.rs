use std::sync::Arc;

use actix_web::{post, web, HttpResponse, Responder};
use futures::TryStreamExt;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;
use crate::models::coach::{ChatRequest, CoachRequest};
use crate::services::assistant::Assistant;

#[post("/api/ai/coach")]
async fn coach(
    config: web::Data<Config>,
    assistant: web::Data<Arc<Assistant>>,
    payload: web::Payload,
) -> Result<impl Responder, AppError> {
    let body = read_body(payload, config.max_upload_bytes).await?;
    let request = CoachRequest::from_body(&json_object(&body)?);
    debug!(
        "Coach request with {} insights and {} chars of notes",
        request.insights.len(),
        request.trader_notes.len()
    );
    Ok(HttpResponse::Ok().json(assistant.coach(&request).await))
}

#[post("/api/ai/chat")]
async fn chat(
    config: web::Data<Config>,
    assistant: web::Data<Arc<Assistant>>,
    payload: web::Payload,
) -> Result<impl Responder, AppError> {
    let body = read_body(payload, config.max_upload_bytes).await?;
    let request = ChatRequest::from_body(&json_object(&body)?)
        .ok_or_else(|| AppError::Validation("Field 'message' is required.".into()))?;
    debug!("Chat request with {} history turns", request.history.len());
    Ok(HttpResponse::Ok().json(assistant.chat(&request).await))
}

/// Collects the request body, capped at `max_bytes`.
async fn read_body(mut payload: web::Payload, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let mut body = Vec::new();
    while let Some(chunk) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read request body: {e}")))?
    {
        if body.len() + chunk.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "Request body exceeds the {max_bytes} byte limit."
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn json_object(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(AppError::Validation("Expected JSON body.".into())),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(coach).service(chat);
}
