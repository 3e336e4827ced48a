// database/error.rs - error taxonomy for store and schema operations

use std::fmt;

/// The store operation an error was raised from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ping,
    ListCollections,
    CreateCollection(String),
    ListIndexes(String),
    CreateIndex { collection: String, index: String },
    Insert(String),
    DropDatabase,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Ping => write!(f, "ping store"),
            Step::ListCollections => write!(f, "list collections"),
            Step::CreateCollection(name) => write!(f, "create collection {}", name),
            Step::ListIndexes(name) => write!(f, "list indexes on {}", name),
            Step::CreateIndex { collection, index } => {
                write!(f, "create index {} on {}", index, collection)
            }
            Step::Insert(name) => write!(f, "insert into {}", name),
            Step::DropDatabase => write!(f, "drop database"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("store unavailable during {step}: {reason}")]
    StoreUnavailable { step: Step, reason: String },
    #[error("permission denied during {step}: {reason}")]
    PermissionDenied { step: Step, reason: String },
    #[error("index {index} on {collection} conflicts with an existing index: {reason}")]
    IndexConflict {
        collection: String,
        index: String,
        reason: String,
    },
    #[error("collection {collection} conflicts with an existing namespace: {reason}")]
    CollectionConflict { collection: String, reason: String },
    #[error("duplicate key in {collection}: {reason}")]
    DuplicateKey { collection: String, reason: String },
    #[error("store error during {step}: {reason}")]
    Store { step: Step, reason: String },
}

impl Error {
    /// The step that failed, where the variant records one.
    pub fn step(&self) -> Option<&Step> {
        match self {
            Error::StoreUnavailable { step, .. }
            | Error::PermissionDenied { step, .. }
            | Error::Store { step, .. } => Some(step),
            _ => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey { .. })
    }
}
