//! Pure input validation, no I/O, no async.
//!
//! Every validator returns a [`ValidationOutcome`]; expected bad input is
//! never an `Err`. Callers convert with [`ValidationOutcome::into_result`]
//! at the point where a bad value becomes fatal.

use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};

use crate::domain::error::ValidationError;

/// Maximum identifier length (agent / cloud keys, bare shell tokens).
pub const MAX_IDENTIFIER_LEN: usize = 64;
/// Maximum POSIX username length.
pub const MAX_USERNAME_LEN: usize = 32;
/// Maximum provider server identifier length.
pub const MAX_SERVER_ID_LEN: usize = 128;
/// Maximum launch command length.
pub const MAX_LAUNCH_CMD_LEN: usize = 1024;
/// Maximum prompt size in bytes.
pub const MAX_PROMPT_LEN: usize = 10 * 1024;

/// Connection targets that are not network addresses.
pub const CONNECTION_SENTINELS: &[&str] =
    &["localhost", "sprite-console", "modal-sandbox", "daytona-sandbox"];

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9_-]+$").expect("valid regex")
});

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9.-]+$").expect("valid regex")
});

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z_][a-z0-9_-]*\$?$").expect("valid regex")
});

static SERVER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex")
});

/// `source <path> 2>/dev/null`
static SOURCE_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^source[ \t]+[A-Za-z0-9_./~${}-]+[ \t]+2>/dev/null$").expect("valid regex")
});

/// `export PATH=...`
static EXPORT_PATH_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^export[ \t]+PATH=[A-Za-z0-9_./:~${}-]+$").expect("valid regex")
});

/// One lowercase binary name followed by bare arguments.
static LAUNCH_BINARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z][a-z0-9._-]*([ \t]+[A-Za-z0-9_./=:@,+-]+)*$").expect("valid regex")
});

/// Textual deny-list for downloaded scripts. Matches inside comments too.
const DESTRUCTIVE_PATTERNS: &[(&str, &str)] = &[
    (r"rm\s+-rf\s+/(?:[^\w]|$)", "recursive delete of the filesystem root"),
    (r"(?:^|[\s;&|(])dd\s+[^\n]*\bof=/dev/", "raw disk write with dd"),
    (r"(?:^|[\s;&|(])dd\s+if=", "raw disk read with dd"),
    (r"\bmkfs(?:\.[A-Za-z0-9]+)?\b", "filesystem creation with mkfs"),
    (r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:", "fork bomb"),
];

static DESTRUCTIVE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    RegexSet::new(DESTRUCTIVE_PATTERNS.iter().map(|(p, _)| *p)).expect("valid regex set")
});

/// Shell escape vectors rejected in prompts.
const PROMPT_INJECTION_PATTERNS: &[(&str, &str)] = &[
    (r"\$\(", "command substitution $(...)"),
    (r"`", "backtick command substitution"),
    (r"\|\s*(?:bash|sh)\b", "piping into a shell"),
];

static PROMPT_INJECTION_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    RegexSet::new(PROMPT_INJECTION_PATTERNS.iter().map(|(p, _)| *p)).expect("valid regex set")
});

/// Why a value was rejected. One variant per violation class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Empty,
    TooLong { max: usize },
    InvalidCharacters { expected: &'static str },
    PathTraversal,
    ShellMetacharacters,
    DisallowedSyntax(&'static str),
    MissingShebang,
    DestructiveOperation(&'static str),
    InjectionAttempt(&'static str),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "required but was empty"),
            Self::TooLong { max } => write!(f, "too long (maximum {max} characters)"),
            Self::InvalidCharacters { expected } => {
                write!(f, "contains invalid characters (expected {expected})")
            }
            Self::PathTraversal => write!(f, "contains a path traversal sequence"),
            Self::ShellMetacharacters => write!(f, "contains shell metacharacters"),
            Self::DisallowedSyntax(what) => write!(f, "uses disallowed syntax: {what}"),
            Self::MissingShebang => write!(f, "does not start with a shebang (#!)"),
            Self::DestructiveOperation(what) => write!(f, "contains a destructive operation: {what}"),
            Self::InjectionAttempt(what) => write!(f, "looks like an injection attempt: {what}"),
        }
    }
}

/// Result of a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid {
        reason: Violation,
        field_name: String,
    },
}

impl ValidationOutcome {
    fn invalid(field_name: &str, reason: Violation) -> Self {
        Self::Invalid {
            reason,
            field_name: field_name.to_string(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The violation, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&Violation> {
        match self {
            Self::Valid => None,
            Self::Invalid { reason, .. } => Some(reason),
        }
    }

    /// Convert into a `Result` for `?` propagation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] carrying the field and violation.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid { reason, field_name } => Err(ValidationError { field_name, reason }),
        }
    }
}

/// Validate a manifest key or any value interpolated as a bare shell token.
#[must_use]
pub fn validate_identifier(s: &str, field_name: &str) -> ValidationOutcome {
    if s.is_empty() {
        return ValidationOutcome::invalid(field_name, Violation::Empty);
    }
    if s.len() > MAX_IDENTIFIER_LEN {
        return ValidationOutcome::invalid(field_name, Violation::TooLong { max: MAX_IDENTIFIER_LEN });
    }
    if !IDENTIFIER_RE.is_match(s) {
        return ValidationOutcome::invalid(
            field_name,
            Violation::InvalidCharacters {
                expected: "lowercase letters, digits, '-' or '_'",
            },
        );
    }
    ValidationOutcome::Valid
}

/// Validate a connection target: IPv4, IPv6, hostname, or a known sentinel.
#[must_use]
pub fn validate_connection_ip(s: &str) -> ValidationOutcome {
    const FIELD: &str = "connection IP";
    if s.is_empty() {
        return ValidationOutcome::invalid(FIELD, Violation::Empty);
    }
    if CONNECTION_SENTINELS.contains(&s) || s.parse::<IpAddr>().is_ok() {
        return ValidationOutcome::Valid;
    }
    if s.contains([';', '|', '`', '&', '$', '(', ')', '<', '>', '\'', '"', ' ']) {
        return ValidationOutcome::invalid(FIELD, Violation::ShellMetacharacters);
    }
    if s.contains(['/', '\\']) {
        return ValidationOutcome::invalid(FIELD, Violation::PathTraversal);
    }
    if s.len() > 253 {
        return ValidationOutcome::invalid(FIELD, Violation::TooLong { max: 253 });
    }
    if !HOSTNAME_RE.is_match(s) {
        return ValidationOutcome::invalid(
            FIELD,
            Violation::InvalidCharacters {
                expected: "an IP address or hostname",
            },
        );
    }
    ValidationOutcome::Valid
}

/// Validate a POSIX username (trailing `$` allowed for system accounts).
#[must_use]
pub fn validate_username(s: &str) -> ValidationOutcome {
    const FIELD: &str = "username";
    if s.is_empty() {
        return ValidationOutcome::invalid(FIELD, Violation::Empty);
    }
    if s.len() > MAX_USERNAME_LEN {
        return ValidationOutcome::invalid(FIELD, Violation::TooLong { max: MAX_USERNAME_LEN });
    }
    if !USERNAME_RE.is_match(s) {
        return ValidationOutcome::invalid(
            FIELD,
            Violation::InvalidCharacters {
                expected: "a lowercase POSIX username",
            },
        );
    }
    ValidationOutcome::Valid
}

/// Validate a provider-assigned server id or a user-chosen server name.
#[must_use]
pub fn validate_server_identifier(s: &str) -> ValidationOutcome {
    const FIELD: &str = "server identifier";
    if s.is_empty() {
        return ValidationOutcome::invalid(FIELD, Violation::Empty);
    }
    if s.len() > MAX_SERVER_ID_LEN {
        return ValidationOutcome::invalid(FIELD, Violation::TooLong { max: MAX_SERVER_ID_LEN });
    }
    if s.contains("../") || s.starts_with('/') || s.contains('\\') {
        return ValidationOutcome::invalid(FIELD, Violation::PathTraversal);
    }
    if !SERVER_ID_RE.is_match(s) {
        return ValidationOutcome::invalid(
            FIELD,
            Violation::InvalidCharacters {
                expected: "letters, digits, '.', '-' or '_'",
            },
        );
    }
    ValidationOutcome::Valid
}

/// Validate an agent launch command against the allow-list grammar.
///
/// Grammar: zero or more `source <path> 2>/dev/null;` / `export PATH=...;`
/// clauses, then exactly one lowercase binary with bare arguments. Blank
/// input is valid; the caller substitutes the manifest default.
#[must_use]
pub fn validate_launch_cmd(s: &str) -> ValidationOutcome {
    const FIELD: &str = "launch command";
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return ValidationOutcome::Valid;
    }
    if s.len() > MAX_LAUNCH_CMD_LEN {
        return ValidationOutcome::invalid(FIELD, Violation::TooLong { max: MAX_LAUNCH_CMD_LEN });
    }
    for (needle, what) in [
        ("`", "backticks"),
        ("$(", "command substitution"),
        ("&&", "'&&' chaining"),
        ("||", "'||' chaining"),
        ("|", "pipes"),
        ("\n", "line breaks"),
        ("\r", "line breaks"),
    ] {
        if trimmed.contains(needle) {
            return ValidationOutcome::invalid(FIELD, Violation::DisallowedSyntax(what));
        }
    }

    let mut clauses: Vec<&str> = trimmed.split(';').map(str::trim).collect();
    if clauses.last().is_some_and(|c| c.is_empty()) {
        clauses.pop();
    }
    let Some((binary, preamble)) = clauses.split_last() else {
        return ValidationOutcome::invalid(FIELD, Violation::DisallowedSyntax("no command to run"));
    };
    for clause in preamble {
        if !(SOURCE_CLAUSE_RE.is_match(clause) || EXPORT_PATH_CLAUSE_RE.is_match(clause)) {
            return ValidationOutcome::invalid(
                FIELD,
                Violation::DisallowedSyntax("only 'source' and 'export PATH=' may precede the command"),
            );
        }
    }
    if !LAUNCH_BINARY_RE.is_match(binary) {
        return ValidationOutcome::invalid(
            FIELD,
            Violation::DisallowedSyntax("the command must be one lowercase binary with plain arguments"),
        );
    }
    ValidationOutcome::Valid
}

/// Validate a downloaded provisioning script before it can be executed.
#[must_use]
pub fn validate_script_content(s: &str) -> ValidationOutcome {
    const FIELD: &str = "script";
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return ValidationOutcome::invalid(FIELD, Violation::Empty);
    }
    if !trimmed.starts_with("#!") {
        return ValidationOutcome::invalid(FIELD, Violation::MissingShebang);
    }
    if let Some(idx) = DESTRUCTIVE_SET.matches(trimmed).into_iter().next() {
        return ValidationOutcome::invalid(
            FIELD,
            Violation::DestructiveOperation(DESTRUCTIVE_PATTERNS[idx].1),
        );
    }
    ValidationOutcome::Valid
}

/// Validate a free-text prompt. Permissive about prose, strict about shell escapes.
#[must_use]
pub fn validate_prompt(s: &str) -> ValidationOutcome {
    const FIELD: &str = "prompt";
    if s.len() > MAX_PROMPT_LEN {
        return ValidationOutcome::invalid(FIELD, Violation::TooLong { max: MAX_PROMPT_LEN });
    }
    if let Some(idx) = PROMPT_INJECTION_SET.matches(s).into_iter().next() {
        return ValidationOutcome::invalid(
            FIELD,
            Violation::InjectionAttempt(PROMPT_INJECTION_PATTERNS[idx].1),
        );
    }
    ValidationOutcome::Valid
}
