use rusqlite::ErrorCode;

// Extended result codes, see https://sqlite.org/rescode.html
const CONSTRAINT_CHECK: i32 = 275;
const CONSTRAINT_FOREIGNKEY: i32 = 787;
const CONSTRAINT_PRIMARYKEY: i32 = 1555;
const CONSTRAINT_UNIQUE: i32 = 2067;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("caller does not own this {0}")]
    Forbidden(&'static str),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("uniqueness violated: {0}")]
    Conflict(String),

    /// A foreign key pointed at a row that does not exist.
    #[error("dangling reference: {0}")]
    InvalidReference(String),

    #[error("transaction deadline exceeded")]
    DeadlineExceeded,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &err {
            if code.code == ErrorCode::ConstraintViolation {
                let detail = msg.clone().unwrap_or_else(|| code.to_string());
                match code.extended_code {
                    CONSTRAINT_UNIQUE | CONSTRAINT_PRIMARYKEY => return Self::Conflict(detail),
                    CONSTRAINT_FOREIGNKEY => return Self::InvalidReference(detail),
                    CONSTRAINT_CHECK => {
                        return Self::Validation("value violates a column constraint".into());
                    }
                    _ => {}
                }
            }
        }
        Self::Sqlite(err)
    }
}
