//! Service error taxonomy and its HTTP mapping.

use service_core::error::AppError;
use thiserror::Error;

use crate::services::providers::ProviderError;
use crate::services::session_store::StoreError;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("{0}")]
    Validation(String),

    #[error("LLM call failed: {0}")]
    UpstreamLlm(#[from] ProviderError),

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            KbError::UpstreamLlm(ProviderError::Timeout(secs)) => {
                AppError::UpstreamTimeout(format!("LLM call exceeded {}s", secs))
            }
            KbError::UpstreamLlm(e) => AppError::UpstreamError(e.to_string()),
            KbError::StoreUnavailable(e) => AppError::StoreUnavailable(e.to_string()),
        }
    }
}
