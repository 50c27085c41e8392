//! Resolve user-typed agent and cloud names against the manifest.
//!
//! Pure functions, no I/O, no async.

use std::fmt;

use spawn_common::Manifest;

use crate::domain::error::{ResolutionError, Suggestion};

/// Maximum edit distance for a "did you mean" suggestion.
pub const SUGGESTION_MAX_DISTANCE: usize = 3;

/// Which manifest map a name is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Agent,
    Cloud,
}

impl EntityKind {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Agent => Self::Cloud,
            Self::Cloud => Self::Agent,
        }
    }

    #[must_use]
    pub fn with_article(self) -> &'static str {
        match self {
            Self::Agent => "an agent",
            Self::Cloud => "a cloud",
        }
    }

    /// Command that lists every entity of this kind.
    #[must_use]
    pub fn list_command(self) -> &'static str {
        match self {
            Self::Agent => "spawn agents",
            Self::Cloud => "spawn clouds",
        }
    }

    /// `(key, display name)` pairs in manifest order.
    fn entries(self, manifest: &Manifest) -> Vec<(&str, &str)> {
        match self {
            Self::Agent => manifest
                .agents
                .iter()
                .map(|(k, a)| (k.as_str(), a.name.as_str()))
                .collect(),
            Self::Cloud => manifest
                .clouds
                .iter()
                .map(|(k, c)| (k.as_str(), c.name.as_str()))
                .collect(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Agent => "agent",
            Self::Cloud => "cloud",
        })
    }
}

/// Which kind of suggestion an unresolved name produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    SameKind,
    CrossKind,
    None,
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Canonical manifest key.
    Resolved { key: String },
    /// No match; `suggestion` is a manifest key of the kind given by `suggestion_kind`.
    Unresolved {
        suggestion: Option<String>,
        suggestion_kind: SuggestionKind,
    },
}

/// Resolve `input` to a manifest key of `kind`.
///
/// Order: exact key, case-insensitive key, case-insensitive display name,
/// then same-kind suggestion, then cross-kind suggestion.
#[must_use]
pub fn resolve(kind: EntityKind, input: &str, manifest: &Manifest) -> Resolution {
    let entries = kind.entries(manifest);

    if let Some((key, _)) = entries.iter().find(|(key, _)| *key == input) {
        return Resolution::Resolved {
            key: (*key).to_string(),
        };
    }

    let lowered = input.to_lowercase();
    if let Some((key, _)) = entries.iter().find(|(key, _)| key.to_lowercase() == lowered) {
        return Resolution::Resolved {
            key: (*key).to_string(),
        };
    }
    if let Some((key, _)) = entries
        .iter()
        .find(|(_, name)| !name.is_empty() && name.to_lowercase() == lowered)
    {
        return Resolution::Resolved {
            key: (*key).to_string(),
        };
    }

    let same_kind_keys = entries.iter().map(|(key, _)| *key);
    if let Some(key) = closest(&lowered, same_kind_keys.map(|k| (k, k))) {
        return Resolution::Unresolved {
            suggestion: Some(key.to_string()),
            suggestion_kind: SuggestionKind::SameKind,
        };
    }

    let other = kind.opposite().entries(manifest);
    let cross_candidates = other
        .iter()
        .flat_map(|(key, name)| [(*key, *key), (*key, *name)]);
    if let Some(key) = closest(&lowered, cross_candidates) {
        return Resolution::Unresolved {
            suggestion: Some(key.to_string()),
            suggestion_kind: SuggestionKind::CrossKind,
        };
    }

    Resolution::Unresolved {
        suggestion: None,
        suggestion_kind: SuggestionKind::None,
    }
}

/// Resolve, or build a [`ResolutionError`] with a display-named suggestion.
///
/// # Errors
///
/// Returns [`ResolutionError::Unknown`] when `input` does not resolve.
pub fn resolve_key(
    kind: EntityKind,
    input: &str,
    manifest: &Manifest,
) -> Result<String, ResolutionError> {
    match resolve(kind, input, manifest) {
        Resolution::Resolved { key } => Ok(key),
        Resolution::Unresolved {
            suggestion,
            suggestion_kind,
        } => {
            let suggestion = suggestion.map(|key| {
                let cross_kind = suggestion_kind == SuggestionKind::CrossKind;
                let owner = if cross_kind { kind.opposite() } else { kind };
                let display_name = display_name(owner, &key, manifest);
                Suggestion {
                    key,
                    display_name,
                    cross_kind,
                }
            });
            Err(ResolutionError::Unknown {
                kind,
                input: input.to_string(),
                suggestion,
            })
        }
    }
}

/// Display name for a key, falling back to the key itself.
#[must_use]
pub fn display_name(kind: EntityKind, key: &str, manifest: &Manifest) -> String {
    let name = match kind {
        EntityKind::Agent => manifest.agent(key).map(|a| a.name.as_str()),
        EntityKind::Cloud => manifest.cloud(key).map(|c| c.name.as_str()),
    };
    match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => key.to_string(),
    }
}

/// First `(key, text)` candidate whose `text` is within the suggestion
/// distance of `input`, minimising distance. Ties keep the earliest.
fn closest<'a>(input: &str, candidates: impl Iterator<Item = (&'a str, &'a str)>) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for (key, text) in candidates {
        let distance = levenshtein(input, &text.to_lowercase());
        if distance > SUGGESTION_MAX_DISTANCE {
            continue;
        }
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((key, distance));
        }
    }
    best.map(|(key, _)| key)
}

/// Classic edit distance over chars.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
