use thiserror::Error;

use crate::expr::ExprError;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid expression in {field}: {source} (expression: {expression:?})")]
    InvalidExpression {
        field: String,
        expression: String,
        #[source]
        source: ExprError,
    },

    #[error("missing required field {field}")]
    MissingRequiredField { field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("invalid attribute name '{name}': {reason}")]
    InvalidAttributeName { name: String, reason: String },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Domain(#[from] wipp_domain::DomainError),

    #[error("{} validation errors: {}", .0.len(), render_all(.0))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Flatten into the individual problems.
    pub fn errors(&self) -> Vec<&ValidationError> {
        match self {
            ValidationError::Multiple(all) => all.iter().flat_map(|e| e.errors()).collect(),
            single => vec![single],
        }
    }

    pub fn is_invalid_expression(&self) -> bool {
        self.errors()
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidExpression { .. }))
    }
}

fn render_all(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
