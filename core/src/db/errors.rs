use anyhow::Error as AnyError;
use sqlx::{Error as SqlxError, error::ErrorKind};

const SQLITE_UNIQUE_VIOLATION: &str = "2067";
const SQLITE_PRIMARY_KEY_VIOLATION: &str = "1555";

/// Returns `true` if any error in the chain is a uniqueness violation.
pub fn is_unique_violation(err: &AnyError) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<SqlxError>()
            .is_some_and(matches_sqlx_unique)
    })
}

fn matches_sqlx_unique(err: &SqlxError) -> bool {
    let SqlxError::Database(db_err) = err else {
        return false;
    };

    if matches!(db_err.kind(), ErrorKind::UniqueViolation) {
        return true;
    }

    db_err.code().is_some_and(|code| {
        matches!(
            code.as_ref(),
            SQLITE_UNIQUE_VIOLATION | SQLITE_PRIMARY_KEY_VIOLATION
        )
    }) || db_err
        .message()
        .to_ascii_lowercase()
        .contains("unique constraint failed")
}
