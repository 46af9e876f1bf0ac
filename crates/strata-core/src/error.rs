use thiserror::Error;

/// Schema model validation errors.
///
/// These are fatal: they are raised before any diff is computed or any
/// DDL is executed, and are never recovered at runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("foreign key '{foreign_key}' on table '{table}' references missing {target}")]
    DanglingForeignKey {
        table: String,
        foreign_key: String,
        target: String,
    },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: NameKind, name: String },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },
}

/// What kind of identifier collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Table,
    Column,
    Index,
    ForeignKey,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameKind::Table => write!(f, "table"),
            NameKind::Column => write!(f, "column"),
            NameKind::Index => write!(f, "index"),
            NameKind::ForeignKey => write!(f, "foreign key"),
        }
    }
}

/// Migration history store errors.
///
/// Recoverable by the caller re-checking state; the runner surfaces them
/// without retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("migration '{0}' is already applied")]
    AlreadyApplied(String),

    #[error("migration '{requested}' is not the latest applied (latest is '{latest}')")]
    NotLatest { requested: String, latest: String },

    #[error("applied history is not a prefix of the known migrations: {0}")]
    HistoryDiverged(String),
}

/// Errors surfaced by the database driver boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("statement not supported by backend: {0}")]
    SyntaxUnsupported(String),

    #[error("statement failed: {0}")]
    Execution(String),
}

/// A failure while applying or reverting a single migration.
///
/// Always names the migration and the operation index so an operator can
/// inspect the target database before retrying.
#[derive(Error, Debug)]
#[error("migration '{migration_id}' failed at operation {operation_index}: {source}")]
pub struct RunError {
    pub migration_id: String,
    pub operation_index: usize,
    #[source]
    pub source: DriverError,
}

/// Top-level error type for strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("plan error: {0}")]
    Plan(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StrataError {
    fn from(e: serde_json::Error) -> Self {
        StrataError::Serialization(e.to_string())
    }
}

/// Result type alias using StrataError.
pub type Result<T> = std::result::Result<T, StrataError>;
