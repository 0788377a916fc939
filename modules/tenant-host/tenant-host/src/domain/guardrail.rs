//! Static pre-execution check for raw tenant statements.
//!
//! A textual denylist, not a parser: it rejects stacked statements and the
//! keywords that reach outside a tenant's own database file (attaching or
//! detaching schemas, engine pragmas, storage reclamation), plus any reference
//! to the host bookkeeping tables kept in the same database. Obfuscated forms
//! that the engine would still accept are not caught here.

use std::sync::LazyLock;

use regex::Regex;

use super::error::DomainError;

/// Blocked keywords, matched case-insensitively on word boundaries.
pub const BLOCKED_KEYWORDS: [&str; 4] = ["ATTACH", "DETACH", "PRAGMA", "VACUUM"];

static BLOCKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern, covered by tests
    Regex::new(r"(?i)\b(ATTACH|DETACH|PRAGMA|VACUUM)\b").unwrap()
});

/// Tables owned by the host inside every tenant database.
pub const RESERVED_TABLES: [&str; 3] = ["host_task_locks", "host_settings", "host_selftest"];

static RESERVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern, covered by tests
    Regex::new(r"(?i)\b(host_task_locks|host_settings|host_selftest)\b").unwrap()
});

/// Reject `statement` unless it is a single statement free of blocked keywords
/// and host tables.
///
/// # Errors
/// Returns `DomainError::GuardrailViolation` naming the reason.
pub fn assert_allowed(statement: &str) -> Result<(), DomainError> {
    if statement.trim().is_empty() {
        return Err(DomainError::guardrail("empty statement"));
    }
    if statement.contains(';') {
        return Err(DomainError::guardrail("multiple statements are not allowed"));
    }
    if let Some(m) = BLOCKED_RE.find(statement) {
        return Err(DomainError::guardrail(format!(
            "keyword {} is not allowed",
            m.as_str().to_ascii_uppercase()
        )));
    }
    if let Some(m) = RESERVED_RE.find(statement) {
        return Err(DomainError::guardrail(format!(
            "table {} is reserved for the host",
            m.as_str().to_ascii_lowercase()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn reason(statement: &str) -> String {
        match assert_allowed(statement) {
            Err(DomainError::GuardrailViolation { reason }) => reason,
            other => panic!("expected rejection for {statement:?}, got {other:?}"),
        }
    }

    #[test]
    fn rejects_stacked_statements() {
        assert_eq!(
            reason("DROP TABLE x; DROP TABLE y;"),
            "multiple statements are not allowed"
        );
        assert_eq!(
            reason("SELECT 1;"),
            "multiple statements are not allowed"
        );
    }

    #[test]
    fn rejects_blocked_keywords_in_any_case() {
        assert_eq!(reason("PRAGMA foreign_keys=OFF"), "keyword PRAGMA is not allowed");
        assert_eq!(
            reason("attach database '/tmp/other.db' as o"),
            "keyword ATTACH is not allowed"
        );
        assert_eq!(reason("Detach o"), "keyword DETACH is not allowed");
        assert_eq!(reason("vacuum"), "keyword VACUUM is not allowed");
        assert_eq!(
            reason("SELECT * FROM pragma_table_info('notes') WHERE 1 = 1 OR pragma = 1"),
            "keyword PRAGMA is not allowed"
        );
    }

    #[test]
    fn rejects_empty_statements() {
        assert_eq!(reason(""), "empty statement");
        assert_eq!(reason("  \n\t"), "empty statement");
    }

    #[test]
    fn accepts_plain_single_statements() {
        for ok in [
            "SELECT * FROM notes WHERE id = ?",
            "INSERT INTO notes(body) VALUES (?)",
            "UPDATE attachments SET vacuumed = 1 WHERE id = ?",
            "CREATE TABLE IF NOT EXISTS moods (id INTEGER PRIMARY KEY, score INTEGER)",
        ] {
            assert!(assert_allowed(ok).is_ok(), "{ok} should pass");
        }
    }

    #[test]
    fn rejects_host_tables() {
        assert_eq!(
            reason("UPDATE host_task_locks SET session_id = 'me'"),
            "table host_task_locks is reserved for the host"
        );
        assert_eq!(
            reason("DELETE FROM \"HOST_SETTINGS\""),
            "table host_settings is reserved for the host"
        );
        assert_eq!(
            reason("SELECT * FROM [host_selftest]"),
            "table host_selftest is reserved for the host"
        );
        assert!(assert_allowed("SELECT ghost_settings, host_name FROM hosts").is_ok());
    }

    #[test]
    fn reserved_list_matches_pattern() {
        for table in RESERVED_TABLES {
            assert!(assert_allowed(&format!("SELECT * FROM {table}")).is_err());
        }
    }

    #[test]
    fn keyword_list_matches_pattern() {
        for kw in BLOCKED_KEYWORDS {
            assert!(assert_allowed(&format!("{kw} x")).is_err());
        }
    }
}
