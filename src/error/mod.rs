use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::store::StoreError;

pub const VALIDATION_CODE: &str = "VALIDATION/INVALID_INPUT";
pub const NOT_FOUND_CODE: &str = "NOT_FOUND";
pub const NOT_ONBOARDED_CODE: &str = "HOUSEHOLD/NOT_ONBOARDED";
pub const CODE_EXHAUSTED_CODE: &str = "HOUSEHOLD/CODE_EXHAUSTED";
pub const UNAUTHENTICATED_CODE: &str = "AUTH/UNAUTHENTICATED";
pub const STATS_OVERFLOW_CODE: &str = "STATS/OVERFLOW";
pub const STORE_FAILURE_CODE: &str = "STORE/FAILURE";

/// Typed failure returned by every core operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("member {member_id} has not joined a household")]
    NotOnboarded { member_id: String },
    #[error("no unused join code found after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },
    #[error("no member is signed in")]
    Unauthenticated,
    #[error("{field} total does not fit in a 64-bit integer")]
    StatsOverflow { field: &'static str },
    #[error("store failure: {0}")]
    Store(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            key: key.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => CoreError::not_found("record", String::new()),
            other => CoreError::Store(other.to_string()),
        }
    }
}

/// Serializable error handed to outer surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(type = "Record<string, string>")]
    pub context: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
}

impl AppError {
    /// Used when an upstream error carries no code of its own.
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let mut pairs: Vec<_> = self.context.iter().collect();
            pairs.sort();
            write!(f, " ({pairs:?})")?;
        }
        Ok(())
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<CoreError> for AppError {
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        match error {
            CoreError::Validation { field, reason } => AppError::new(VALIDATION_CODE, message)
                .with_context("field", field)
                .with_context("reason", reason),
            CoreError::NotFound { entity, key } => {
                let app_error =
                    AppError::new(NOT_FOUND_CODE, message).with_context("entity", entity);
                if key.is_empty() {
                    app_error
                } else {
                    app_error.with_context("key", key)
                }
            }
            CoreError::NotOnboarded { member_id } => {
                AppError::new(NOT_ONBOARDED_CODE, message).with_context("member_id", member_id)
            }
            CoreError::CodeGenerationExhausted { attempts } => {
                AppError::new(CODE_EXHAUSTED_CODE, message)
                    .with_context("attempts", attempts.to_string())
            }
            CoreError::Unauthenticated => AppError::new(UNAUTHENTICATED_CODE, message),
            CoreError::StatsOverflow { field } => {
                AppError::new(STATS_OVERFLOW_CODE, message).with_context("field", field)
            }
            CoreError::Store(_) => AppError::new(STORE_FAILURE_CODE, message),
        }
    }
}

/// Walks the `anyhow` chain; a `CoreError` anywhere in it keeps its code.
impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }
            if let Some(core) = err.downcast_ref::<CoreError>() {
                return AppError::from(core.clone());
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}
