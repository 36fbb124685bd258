// ABOUTME: Statement classification and deny-list scanning for the SQL safety validator
// ABOUTME: Deny-lists are plain data so they can be extended without touching the scan logic
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::OnceLock;

use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Coarse classification of a single SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// A read-only `SELECT` (including CTEs and set operations over selects).
    Select,
    /// `PRAGMA ...` — allowed through for embedded-backend introspection.
    Pragma,
    /// `DESCRIBE`/`SHOW` — allowed through for schema introspection.
    Describe,
    /// Anything else (DML, DDL, transactions, unparsable text).
    Other,
}

/// Why a query was rejected, used by the tool layer to render tailored
/// remediation guidance instead of a bare "denied".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// The query was empty or whitespace-only.
    Empty,
    /// More than one statement was present (`;`-separated).
    MultipleStatements,
    /// The statement type itself isn't allowed (DML/DDL/etc).
    DisallowedStatementType,
    /// A deny-listed keyword appeared as a standalone token.
    DangerousKeyword(String),
    /// A known SQL-injection shape matched.
    InjectionPattern(String),
    /// A suspicious system identifier/table/function name appeared.
    SuspiciousIdentifier(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "query is empty"),
            Self::MultipleStatements => write!(f, "only a single statement is allowed"),
            Self::DisallowedStatementType => {
                write!(f, "only SELECT (and PRAGMA/DESCRIBE/SHOW for introspection) is allowed")
            }
            Self::DangerousKeyword(keyword) => write!(f, "disallowed keyword: {keyword}"),
            Self::InjectionPattern(description) => write!(f, "suspicious pattern: {description}"),
            Self::SuspiciousIdentifier(name) => write!(f, "disallowed identifier: {name}"),
        }
    }
}

/// Keywords that must not appear as a standalone token anywhere in the
/// statement, even inside an otherwise well-formed `SELECT`.
const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "TRUNCATE", "CREATE", "REPLACE",
    "GRANT", "REVOKE", "EXEC", "EXECUTE", "ATTACH", "DETACH", "COPY", "VACUUM",
    "CALL", "MERGE", "LOAD", "INTO OUTFILE", "INTO DUMPFILE",
];

/// `(pattern, human description)` pairs describing common injection shapes
/// that a naive single-statement check wouldn't catch.
fn injection_patterns() -> &'static Vec<(Regex, &'static str)> {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"(?i)--").unwrap(), "SQL line comment"),
            (Regex::new(r"(?i)/\*").unwrap(), "SQL block comment"),
            (Regex::new(r"(?i)\bunion\s+(all\s+)?select\b").unwrap(), "stacked UNION SELECT"),
            (Regex::new(r"(?i)\b1\s*=\s*1\b").unwrap(), "tautology (1=1)"),
            (Regex::new(r"(?i)\bor\s+1\s*=\s*1\b").unwrap(), "tautology (OR 1=1)"),
            (Regex::new(r"(?i)\band\s+1\s*=\s*1\b").unwrap(), "tautology (AND 1=1)"),
            (Regex::new(r"(?i)\bor\s+'1'\s*=\s*'1'").unwrap(), "tautology (OR '1'='1')"),
            (Regex::new(r"(?i)\band\s+'1'\s*=\s*'1'").unwrap(), "tautology (AND '1'='1')"),
            (Regex::new(r"(?i)\bxp_cmdshell\b").unwrap(), "shell execution procedure"),
            (Regex::new(r"(?i)\bwaitfor\b").unwrap(), "time-based blind injection probe (WAITFOR)"),
            (Regex::new(r"(?i)\bsleep\s*\(").unwrap(), "time-based blind injection probe"),
            (Regex::new(r"(?i)\bbenchmark\s*\(").unwrap(), "benchmark-based blind injection probe"),
            (Regex::new(r"(?i)\bload_file\s*\(").unwrap(), "file-read injection probe (LOAD_FILE)"),
            (Regex::new(r"(?i)\binformation_schema\.(?:tables|columns)\b.*\bsleep\b").unwrap(), "schema probing combined with delay"),
            (Regex::new(r";\s*\S").unwrap(), "trailing statement after semicolon"),
        ]
    })
}

/// Substrings with no legitimate place in the clinical schema; their
/// presence marks a query as out-of-domain (spec section 4.3 step 7).
const SUSPICIOUS_IDENTIFIERS: &[&str] = &[
    "password",
    "admin",
    "user",
    "login",
    "auth",
    "token",
    "credential",
    "secret",
    "key",
    "hash",
    "salt",
    "session",
    "cookie",
];

/// Validate a single SQL statement per spec section 4.3.
///
/// # Errors
///
/// Returns the first [`RejectionReason`] found, in the order: empty check,
/// multi-statement check, dangerous keyword scan, injection pattern scan,
/// suspicious identifier scan, then statement-type classification.
pub fn validate(sql: &str) -> Result<StatementKind, RejectionReason> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(RejectionReason::Empty);
    }

    let upper = format!(" {} ", trimmed.to_uppercase());
    for keyword in DANGEROUS_KEYWORDS {
        if upper.contains(&format!(" {keyword} ")) {
            return Err(RejectionReason::DangerousKeyword((*keyword).to_owned()));
        }
    }

    for (pattern, description) in injection_patterns() {
        if pattern.is_match(trimmed) {
            return Err(RejectionReason::InjectionPattern((*description).to_owned()));
        }
    }

    let lower = trimmed.to_lowercase();
    for identifier in SUSPICIOUS_IDENTIFIERS {
        if lower.contains(identifier) {
            return Err(RejectionReason::SuspiciousIdentifier((*identifier).to_owned()));
        }
    }

    classify(trimmed)
}

fn classify(trimmed: &str) -> Result<StatementKind, RejectionReason> {
    let upper = trimmed.to_uppercase();
    if upper.starts_with("PRAGMA") {
        return Ok(StatementKind::Pragma);
    }
    if upper.starts_with("DESCRIBE") || upper.starts_with("SHOW") {
        return Ok(StatementKind::Describe);
    }

    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, trimmed)
        .map_err(|_| RejectionReason::DisallowedStatementType)?;

    if statements.len() > 1 {
        return Err(RejectionReason::MultipleStatements);
    }
    match statements.first() {
        Some(Statement::Query(_)) => Ok(StatementKind::Select),
        _ => Err(RejectionReason::DisallowedStatementType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_plain_select() {
        assert_eq!(
            validate("SELECT * FROM icustays LIMIT 10").unwrap(),
            StatementKind::Select
        );
    }

    #[test]
    fn allows_pragma_table_info() {
        assert_eq!(
            validate("PRAGMA table_info(icustays)").unwrap(),
            StatementKind::Pragma
        );
    }

    #[test]
    fn rejects_empty_query() {
        assert_eq!(validate("   ").unwrap_err(), RejectionReason::Empty);
    }

    #[test]
    fn rejects_drop_table() {
        let err = validate("DROP TABLE icustays").unwrap_err();
        assert!(matches!(err, RejectionReason::DangerousKeyword(_) | RejectionReason::DisallowedStatementType));
    }

    #[test]
    fn rejects_stacked_statements() {
        let err = validate("SELECT 1; SELECT 2").unwrap_err();
        assert!(matches!(
            err,
            RejectionReason::MultipleStatements | RejectionReason::InjectionPattern(_)
        ));
    }

    #[test]
    fn rejects_sql_comment_injection() {
        let err = validate("SELECT * FROM icustays -- drop everything").unwrap_err();
        assert!(matches!(err, RejectionReason::InjectionPattern(_)));
    }

    #[test]
    fn rejects_union_select_injection() {
        let err = validate("SELECT id FROM icustays UNION SELECT password FROM users").unwrap_err();
        assert!(matches!(err, RejectionReason::InjectionPattern(_)));
    }

    #[test]
    fn rejects_suspicious_identifier() {
        let err = validate("SELECT password_hash FROM icustays").unwrap_err();
        assert_eq!(
            err,
            RejectionReason::SuspiciousIdentifier("password".to_owned())
        );
    }

    #[test]
    fn rejects_bare_tautology() {
        let err = validate("SELECT * FROM icustays WHERE 1=1").unwrap_err();
        assert!(matches!(err, RejectionReason::InjectionPattern(_)));
    }

    #[test]
    fn rejects_quoted_tautology() {
        let err =
            validate("SELECT * FROM icustays WHERE subject_id = 1 OR '1'='1'").unwrap_err();
        assert!(matches!(err, RejectionReason::InjectionPattern(_)));
    }

    #[test]
    fn rejects_insert() {
        let err = validate("INSERT INTO icustays VALUES (1)").unwrap_err();
        assert!(matches!(err, RejectionReason::DangerousKeyword(_)));
    }
}
