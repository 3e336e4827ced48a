// database/lib.rs - schema bootstrapping for the dominios_db document store

pub mod bootstrap;
pub mod domains;
pub mod error;
pub mod pending;
pub mod schema;
pub mod store;

pub use bootstrap::{ensure, verify, Drift, Outcome, Report, Target};
pub use error::{Error, Step};
pub use schema::{CollectionSpec, IndexSpec, DATABASE_NAME, DOMAIN_SCHEMA};
pub use store::{memory::MemoryStore, mongo::MongoStore, SchemaStore};
