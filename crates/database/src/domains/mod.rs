// database/domains/mod.rs - document shapes for the per-domain collections

use serde::Serialize;

pub mod model;

/// A document type stored in exactly one collection.
pub trait DomainDocument: Serialize {
    const COLLECTION: &'static str;
}
