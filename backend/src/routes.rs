use std::any::Any;
use std::panic::AssertUnwindSafe;

use actix_web::{HttpResponse, error, web};
use futures::FutureExt;
use serde_json::json;
use shared::{ErrorResponse, NO_DETECTION_CODE, PlanRequest, PredictRequest, PredictionResponse};

use crate::aggregator::{Aggregator, PredictError, Prediction};
use crate::conditions::ConditionCatalog;
use crate::consensus::GENERIC_LABEL;
use crate::plan::PlanService;

const NO_DETECTION_MESSAGE: &str =
    "No acne was detected in this image. Please upload a clear, well-lit photo of the affected area.";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/predict-acne").route(web::post().to(predict_acne)))
        .service(web::resource("/api/generate-treatment").route(web::post().to(generate_treatment)))
        .service(web::resource("/api/conditions/{label}").route(web::get().to(condition_profile)))
        .service(web::resource("/api/health").route(web::get().to(health)));
}

/// Room for the data-URI header and the other request fields.
const JSON_ENVELOPE_BYTES: usize = 64 * 1024;

/// Largest request body that can carry an image of `max_upload_bytes` decoded
/// bytes. Base64 grows the payload by 4/3.
pub fn json_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.div_ceil(3).saturating_mul(4).saturating_add(JSON_ENVELOPE_BYTES)
}

/// JSON extractor settings: body limit sized for base64 images of at most
/// `max_upload_bytes` and a JSON error body for malformed requests.
pub fn json_config(max_upload_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(json_body_limit(max_upload_bytes))
        .error_handler(|err, _req| {
            let response = HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid request body".to_string(),
                message: None,
                details: Some(err.to_string()),
            });
            error::InternalError::from_response(err, response).into()
        })
}

fn error_response(error: &str, details: Option<String>) -> ErrorResponse {
    ErrorResponse {
        error: error.to_string(),
        message: None,
        details,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn to_response(prediction: Prediction) -> PredictionResponse {
    let consensus = prediction.consensus;
    PredictionResponse {
        request_id: prediction.request_id.to_string(),
        prediction: consensus.final_label.unwrap_or_else(|| GENERIC_LABEL.to_string()),
        severity: consensus.severity_label.to_string(),
        severity_num: consensus.severity_grade,
        severity_defaulted: consensus.severity_defaulted,
        per_adapter_labels: consensus.per_adapter_labels,
        api_errors: consensus.per_adapter_errors,
    }
}

async fn predict_acne(aggregator: web::Data<Aggregator>, body: web::Json<PredictRequest>) -> HttpResponse {
    if body.image_data.trim().is_empty() {
        return HttpResponse::BadRequest().json(error_response("Image data is required", None));
    }

    let outcome = AssertUnwindSafe(aggregator.predict(&body.image_data))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(prediction)) if prediction.consensus.is_no_detection() => {
            HttpResponse::UnprocessableEntity().json(ErrorResponse {
                error: NO_DETECTION_CODE.to_string(),
                message: Some(NO_DETECTION_MESSAGE.to_string()),
                details: None,
            })
        }
        Ok(Ok(prediction)) => HttpResponse::Ok().json(to_response(prediction)),
        Ok(Err(PredictError::InvalidInput(e))) => {
            HttpResponse::BadRequest().json(error_response("Invalid image data", Some(e.to_string())))
        }
        Ok(Err(e @ PredictError::Internal(_))) => {
            log::error!("Prediction failed: {}", e);
            HttpResponse::InternalServerError()
                .json(error_response("Failed to predict acne type", Some(e.to_string())))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log::error!("Prediction pipeline panicked: {}", message);
            HttpResponse::InternalServerError().json(error_response("Failed to predict acne type", Some(message)))
        }
    }
}

async fn generate_treatment(plans: web::Data<PlanService>, body: web::Json<PlanRequest>) -> HttpResponse {
    let category = body.acne_type.trim();
    if category.is_empty() {
        return HttpResponse::BadRequest().json(error_response("Acne type is required", None));
    }

    let plan = plans.generate(category, body.skin_type.as_deref(), body.mode).await;
    HttpResponse::Ok().json(plan)
}

async fn condition_profile(conditions: web::Data<ConditionCatalog>, path: web::Path<String>) -> HttpResponse {
    HttpResponse::Ok().json(conditions.lookup(&path.into_inner()))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
