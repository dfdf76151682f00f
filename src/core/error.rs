use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Cannot migrate from version {0}: {1}")]
    UnsupportedVersion(u32, String),

    #[error("Row count mismatch in table '{0}': expected {1}, found {2}")]
    CountMismatch(String, usize, usize),

    #[error("Transform failed for table '{0}': {1}")]
    Transform(String, String),

    #[error("Asset {0} failed for '{1}': {2}")]
    Asset(&'static str, String, String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid migration plan: {0}")]
    InvalidPlan(String),

    #[error("Store '{0}' is locked by another process (gave up after {1} attempts)")]
    Locked(String, u32),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Migration to version {0} failed: {1}")]
    StepFailed(u32, Box<MigrateError>),
}

pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    /// Wraps an error with the version boundary it occurred at, unless it
    /// already carries one.
    pub fn at_step(self, version: u32) -> Self {
        match self {
            Self::StepFailed(_, _) => self,
            other => Self::StepFailed(version, Box::new(other)),
        }
    }

    /// Wraps an error with the table whose transform raised it, unless it
    /// is already table-scoped.
    pub fn in_table(self, table: &str) -> Self {
        match self {
            Self::Transform(_, _) | Self::CountMismatch(_, _, _) => self,
            other => Self::Transform(table.to_string(), other.to_string()),
        }
    }

    /// The innermost error, unwrapping step attribution.
    pub fn root_cause(&self) -> &MigrateError {
        match self {
            Self::StepFailed(_, inner) => inner.root_cause(),
            other => other,
        }
    }
}
