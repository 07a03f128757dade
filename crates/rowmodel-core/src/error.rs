//! Error types for rowmodel operations.

use std::fmt;

/// The primary error type for all rowmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Failed to open or configure the engine connection
    Connection(ConnectionError),
    /// Statement execution errors, carrying the offending SQL
    Query(QueryError),
    /// Value/kind mismatches and unsupported engine column types
    Type(TypeError),
    /// Transaction begin/commit misuse
    Transaction(TransactionError),
    /// Schema definition, lookup and migration errors
    Schema(SchemaError),
    /// The engine accepted a write but the written row could not be read back
    Consistency(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, not null)
    Constraint,
    /// Database is busy or locked
    Busy,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    /// Model (table) name, when the mismatch concerns a model field
    pub model: Option<String>,
    /// Field or result column name
    pub column: Option<String>,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// BEGIN while a transaction is already open on the connection
    AlreadyActive,
    /// COMMIT/ROLLBACK without an open transaction
    NotActive,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Two fields share a name
    DuplicateField,
    /// A primary key is listed twice
    DuplicateKey,
    /// A primary key names a field that does not exist
    UnknownKey,
    /// Nullable field declared with a default
    InvalidDefault,
    /// Serial/nullable primary key constraints violated
    InvalidKey,
    /// Foreign key on an unknown field, duplicated, or with an unusable target
    InvalidForeignKey,
    /// Model or field name is not a plain SQL identifier
    InvalidIdentifier,
    /// Name-indexed access to a field the model does not declare
    FieldNotFound,
    /// Migration id registered twice
    DuplicateMigration,
    /// Migration id below 1
    InvalidMigration,
    /// A migration action failed
    Migration,
}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }
}

impl Error {
    /// Shorthand for a schema error without a source.
    pub fn schema(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Error::Schema(SchemaError::new(kind, message))
    }

    /// Shorthand for a "field not found" lookup error.
    pub fn field_not_found(model: &str, field: &str) -> Self {
        Error::schema(
            SchemaErrorKind::FieldNotFound,
            format!("field '{}' not found in '{}'", field, model),
        )
    }

    /// Errors that indicate a configuration or engine invariant violation
    /// rather than a bad operation input.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Schema(e) => !matches!(
                e.kind,
                SchemaErrorKind::FieldNotFound | SchemaErrorKind::Migration
            ),
            Error::Consistency(_) => true,
            _ => false,
        }
    }

    /// Is this a value/kind mismatch?
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::Type(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Get the schema error kind, if this is a schema error
    pub fn schema_kind(&self) -> Option<SchemaErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e),
            Error::Schema(e) => write!(f, "Schema error: {}", e),
            Error::Consistency(msg) => write!(f, "Consistency error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Schema(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.sql {
            write!(f, "{}: {}", self.message, sql)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.model, &self.column) {
            (Some(model), Some(col)) => write!(
                f,
                "incompatible value for field '{}' in '{}': expected {}, found {}",
                col, model, self.expected, self.actual
            ),
            (None, Some(col)) => write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            ),
            _ => write!(f, "expected {}, found {}", self.expected, self.actual),
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

/// Result type alias for rowmodel operations.
pub type Result<T> = std::result::Result<T, Error>;
