//! Search handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

use super::response::PesquisaResponse;
use crate::AppState;
use sourcefinder_common::{
    errors::{AppError, Result},
    pipeline,
};

/// Body of `POST /pesquisa/`
#[derive(Debug, Deserialize, Validate)]
pub struct PesquisaRequest {
    #[validate(
        required(message = "O campo termo é obrigatório."),
        custom(function = "validate_termo")
    )]
    pub termo: Option<String>,
}

fn validate_termo(termo: &str) -> std::result::Result<(), ValidationError> {
    pipeline::validate_topic(termo).map(|_| ()).map_err(|e| {
        let message = match e {
            AppError::Validation { message, .. } => message,
            other => other.to_string(),
        };
        ValidationError::new("termo").with_message(Cow::Owned(message))
    })
}

/// First field error as an `AppError::Validation`
fn validation_error(errors: ValidationErrors) -> AppError {
    let first = errors.field_errors().into_iter().next().map(|(field, errs)| {
        let message = errs
            .first()
            .and_then(|e| e.message.as_ref())
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("invalid value for {}", field));
        (field.to_string(), message)
    });

    match first {
        Some((field, message)) => AppError::Validation {
            message,
            field: Some(field),
        },
        None => AppError::Validation {
            message: errors.to_string(),
            field: None,
        },
    }
}

fn json_error(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(e) => AppError::Validation {
            message: e.body_text(),
            field: None,
        },
        other => AppError::InvalidFormat {
            message: other.body_text(),
        },
    }
}

/// Run the pipeline for a topic and return the stored result
pub async fn create_pesquisa(
    State(state): State<AppState>,
    body: std::result::Result<Json<PesquisaRequest>, JsonRejection>,
) -> Result<Json<PesquisaResponse>> {
    let Json(request) = body.map_err(json_error)?;
    request.validate().map_err(validation_error)?;

    let termo = request.termo.unwrap_or_default();

    let pipeline = state.pipeline.as_ref().ok_or_else(|| AppError::Configuration {
        message: "generative-text API key is not configured".to_string(),
    })?;

    let run = pipeline.run_search(&termo).await?;

    tracing::info!(
        search_id = run.aggregate.search.id,
        state = run.state.as_str(),
        sources = run.aggregate.sources.len(),
        "Search request served"
    );

    Ok(Json(PesquisaResponse::from(run.aggregate)))
}

/// Get one search by ID
pub async fn get_pesquisa(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PesquisaResponse>> {
    let aggregate = state
        .store
        .find_search(id)
        .await?
        .ok_or(AppError::SearchNotFound { id })?;

    Ok(Json(PesquisaResponse::from(aggregate)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(termo: Option<&str>) -> PesquisaRequest {
        PesquisaRequest {
            termo: termo.map(str::to_string),
        }
    }

    #[test]
    fn test_termo_rules() {
        assert!(request(Some("rust")).validate().is_ok());
        assert!(request(Some("  ab  ")).validate().is_err());
        assert!(request(Some(&"x".repeat(256))).validate().is_err());
        assert!(request(None).validate().is_err());
    }

    #[test]
    fn test_validation_error_names_field() {
        let errors = request(Some("a")).validate().unwrap_err();
        match validation_error(errors) {
            AppError::Validation { message, field } => {
                assert_eq!(field.as_deref(), Some("termo"));
                assert!(message.contains("pelo menos 3"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
