use thiserror::Error;

use crate::types::SourceKind;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("exactly one credential source must be set, found {}", render_kinds(.populated))]
    ConflictingVariant { populated: Vec<SourceKind> },
}

fn render_kinds(kinds: &[SourceKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
