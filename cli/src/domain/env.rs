//! `${VAR}` interpolation of an agent's env template.
//!
//! Values are substituted textually and later handed to the child as
//! process environment, never spliced into a shell command.

use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::domain::error::ValidationError;
use crate::domain::validate::Violation;

#[allow(clippy::expect_used)]
static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

#[allow(clippy::expect_used)]
static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Result of interpolating a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnv {
    /// Final `NAME=value` pairs in template order.
    pub vars: IndexMap<String, String>,
    /// Referenced variables that were unset or empty, deduplicated.
    pub missing: Vec<String>,
}

/// Variable names referenced by `value`, in order of appearance.
#[must_use]
pub fn references(value: &str) -> Vec<&str> {
    REFERENCE
        .captures_iter(value)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Substitute every `${VAR}` in every template value from `env`.
///
/// Unset references become empty strings and are listed in `missing`.
///
/// # Errors
///
/// Returns a [`ValidationError`] when a template key is not a valid
/// environment variable name.
pub fn interpolate(
    template: &IndexMap<String, String>,
    env: &HashMap<String, String>,
) -> Result<ResolvedEnv, ValidationError> {
    let mut resolved = ResolvedEnv::default();
    for (name, value) in template {
        if !ENV_NAME.is_match(name) {
            return Err(ValidationError {
                field_name: format!("env var name '{name}'"),
                reason: Violation::InvalidCharacters {
                    expected: "letters, digits and underscores",
                },
            });
        }
        let substituted = REFERENCE.replace_all(value, |caps: &regex::Captures<'_>| {
            let var = &caps[1];
            match env.get(var) {
                Some(v) if !v.is_empty() => v.clone(),
                _ => {
                    if !resolved.missing.iter().any(|m| m == var) {
                        resolved.missing.push(var.to_string());
                    }
                    String::new()
                }
            }
        });
        resolved.vars.insert(name.clone(), substituted.into_owned());
    }
    Ok(resolved)
}
