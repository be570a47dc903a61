mod error;
pub mod expr;
mod validate;

pub use error::ValidationError;
pub use expr::{validate_expression, ExprError};
pub use validate::{check_attribute_name, check_identifier, check_pem, validate, ValidatedConfig};
