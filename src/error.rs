use thiserror::Error;

use crate::model::ModelError;

/// The kind of data-store call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOp {
    Query,
    Insert,
    Update,
    Delete,
    Tx,
    Commit,
}

impl DbOp {
    pub fn code(self) -> &'static str {
        match self {
            DbOp::Query => "db_query_failed",
            DbOp::Insert => "db_insert_failed",
            DbOp::Update => "db_update_failed",
            DbOp::Delete => "db_delete_failed",
            DbOp::Tx => "db_tx_failed",
            DbOp::Commit => "db_commit_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{source}")]
    Db {
        op: DbOp,
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Db { op, .. } => op.code(),
            StoreError::NotFound(_) => "not_found",
            StoreError::MissingField(_) | StoreError::Invalid(_) | StoreError::Model(_) => {
                "bad_params"
            }
        }
    }
}

/// Builds a `map_err` adapter tagging a rusqlite error with the operation and table.
pub(crate) fn db_err(op: DbOp, table: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |source| StoreError::Db { op, table, source }
}

pub type StoreResult<T> = Result<T, StoreError>;
