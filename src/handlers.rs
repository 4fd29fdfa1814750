// src/handlers.rs
use crate::{AppState, errors::ShotlistError, models::*};
use actix_web::{HttpRequest, HttpResponse, http::header, web};
use log::{error, info};
use uuid::Uuid;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/generate", web::post().to(generate))
            .route("/revise", web::post().to(revise)),
    )
    .route("/health", web::get().to(health_check));
}

/// Malformed JSON bodies are reported in the same shape as other errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(32 * 1024 * 1024)
        .error_handler(|err, _req| ShotlistError::Validation(err.to_string()).into())
}

fn bearer_credential(req: &HttpRequest) -> Result<String, ShotlistError> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, key)| key.trim())
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(ShotlistError::MissingCredential)
}

pub async fn generate(
    req: HttpRequest,
    body: web::Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ShotlistError> {
    let credential = bearer_credential(&req)?;
    let request = body.into_inner();

    if request.images.len() > MAX_ATTACHMENTS {
        return Err(ShotlistError::Validation(format!(
            "At most {} reference images are allowed, got {}",
            MAX_ATTACHMENTS,
            request.images.len()
        )));
    }

    let request_id = Uuid::new_v4();
    info!(
        "Generate {}: {} image(s), {} prompt(s)",
        request_id,
        request.images.len(),
        request.prompt_count
    );

    let result = data
        .pipeline
        .generate(&request, &credential)
        .await
        .inspect_err(|e| error!("Generate {} failed: {}", request_id, e))?;

    Ok(HttpResponse::Ok().json(GenerateResponse {
        request_id,
        prompts: result.prompts,
        visual_style_cues: result.visual_style_cues,
        created_at: chrono::Utc::now(),
    }))
}

pub async fn revise(
    req: HttpRequest,
    body: web::Json<RevisionRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ShotlistError> {
    let credential = bearer_credential(&req)?;
    let request = body.into_inner();

    // Held until the revision finishes, whatever the outcome.
    let _permit = match request.card_id.as_deref() {
        Some(card_id) => Some(data.revision_locks.try_acquire(card_id)?),
        None => None,
    };

    let request_id = Uuid::new_v4();
    info!(
        "Revise {}: card {}",
        request_id,
        request.card_id.as_deref().unwrap_or("-")
    );

    let prompt = data
        .pipeline
        .revise(&request, &credential)
        .await
        .inspect_err(|e| error!("Revise {} failed: {}", request_id, e))?;

    Ok(HttpResponse::Ok().json(ReviseResponse {
        request_id,
        prompt,
        created_at: chrono::Utc::now(),
    }))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "shotlist",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
