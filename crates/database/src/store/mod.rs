// database/store/mod.rs - the store handle the bootstrapper operates on

use crate::error::Error;
use crate::schema::IndexSpec;
use async_trait::async_trait;
use serde::Serialize;

pub mod memory;
pub mod mongo;

/// Name of the index every collection carries on `_id`.
pub const ID_INDEX: &str = "_id_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionKind {
    Collection,
    View,
    Timeseries,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingCollection {
    pub name: String,
    pub kind: CollectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingIndex {
    pub name: String,
    /// Key fields in declaration order, with their direction.
    pub keys: Vec<(String, i32)>,
    pub unique: bool,
    /// Set when the index is sparse, partial or collated, so it does not
    /// cover every document the way a plain index does.
    pub restricted: bool,
}

impl ExistingIndex {
    pub fn from_spec(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name(),
            keys: vec![(spec.field.to_string(), 1)],
            unique: spec.unique,
            restricted: false,
        }
    }

    /// True when the index covers exactly the spec's field, ascending.
    pub fn has_keys_of(&self, spec: &IndexSpec) -> bool {
        matches!(self.keys.as_slice(), [(field, 1)] if field == spec.field)
    }

    pub fn satisfies(&self, spec: &IndexSpec) -> bool {
        self.has_keys_of(spec) && self.unique == spec.unique && !self.restricted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Created {
    New,
    Existed,
}

/// Schema-level operations against one database. Implementations report
/// failures through the [`Error`] taxonomy and never retry.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    fn database_name(&self) -> &str;

    async fn ping(&self) -> Result<(), Error>;

    async fn list_collections(&self) -> Result<Vec<ExistingCollection>, Error>;

    /// Creating a collection that already exists is not an error.
    async fn create_collection(&self, name: &str) -> Result<Created, Error>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>, Error>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), Error>;

    async fn drop_database(&self) -> Result<(), Error>;
}
