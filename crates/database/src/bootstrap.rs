// database/bootstrap.rs - idempotent creation and verification of collections and indexes

use crate::error::Error;
use crate::schema::{CollectionSpec, IndexSpec};
use crate::store::{CollectionKind, Created, ExistingIndex, SchemaStore, ID_INDEX};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Collection { collection: String },
    Index { collection: String, index: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub target: Target,
    pub outcome: Outcome,
}

/// What a run of [`ensure`] did, in the order it did it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub database: String,
    pub steps: Vec<StepReport>,
}

impl Report {
    fn record(&mut self, target: Target, outcome: Outcome) {
        match (&target, outcome) {
            (Target::Collection { collection }, Outcome::Created) => {
                info!("Created collection {}", collection)
            }
            (Target::Collection { collection }, Outcome::AlreadyPresent) => {
                info!("Collection {} already exists", collection)
            }
            (Target::Index { collection, index }, Outcome::Created) => {
                info!("Created index {} on {}", index, collection)
            }
            (Target::Index { collection, index }, Outcome::AlreadyPresent) => {
                info!("Index {} on {} already exists", index, collection)
            }
        }
        self.steps.push(StepReport { target, outcome });
    }

    fn count(&self, collections: bool, outcome: Outcome) -> usize {
        self.steps
            .iter()
            .filter(|step| step.outcome == outcome)
            .filter(|step| matches!(step.target, Target::Collection { .. }) == collections)
            .count()
    }

    pub fn created_collections(&self) -> usize {
        self.count(true, Outcome::Created)
    }

    pub fn created_indexes(&self) -> usize {
        self.count(false, Outcome::Created)
    }

    /// True when the store already matched the schema.
    pub fn is_noop(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.outcome == Outcome::AlreadyPresent)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} collections created, {} already present; {} indexes created, {} already present",
            self.database,
            self.created_collections(),
            self.count(true, Outcome::AlreadyPresent),
            self.created_indexes(),
            self.count(false, Outcome::AlreadyPresent),
        )
    }
}

/// Ensures every collection and index in `schema` exists. Stops at the first
/// failing step; existing indexes are never dropped or altered.
pub async fn ensure<S>(store: &S, schema: &[CollectionSpec]) -> Result<Report, Error>
where
    S: SchemaStore + ?Sized,
{
    let mut report = Report {
        database: store.database_name().to_string(),
        steps: Vec::new(),
    };

    store.ping().await?;
    info!("Connected to database: {}", store.database_name());

    let existing = store.list_collections().await?;

    info!("Creating collections.");
    for collection in schema {
        let outcome = match existing.iter().find(|c| c.name == collection.name) {
            Some(found) if found.kind == CollectionKind::Collection => Outcome::AlreadyPresent,
            Some(found) => {
                return Err(Error::CollectionConflict {
                    collection: collection.name.to_string(),
                    reason: format!("namespace exists as {:?}", found.kind),
                })
            }
            None => match store.create_collection(collection.name).await? {
                Created::New => Outcome::Created,
                // Created concurrently by another run.
                Created::Existed => Outcome::AlreadyPresent,
            },
        };
        report.record(
            Target::Collection {
                collection: collection.name.to_string(),
            },
            outcome,
        );
    }

    info!("Creating indexes.");
    for collection in schema {
        let indexes = store.list_indexes(collection.name).await?;

        for spec in collection.indexes {
            let outcome = match find_index(&indexes, spec) {
                IndexState::Present => Outcome::AlreadyPresent,
                IndexState::Conflicting(found) => {
                    return Err(Error::IndexConflict {
                        collection: collection.name.to_string(),
                        index: spec.name(),
                        reason: format!(
                            "existing index {} has keys {:?}, unique={} and restricted={}",
                            found.name, found.keys, found.unique, found.restricted
                        ),
                    })
                }
                IndexState::Missing => {
                    store.create_index(collection.name, spec).await?;
                    Outcome::Created
                }
            };
            report.record(
                Target::Index {
                    collection: collection.name.to_string(),
                    index: spec.name(),
                },
                outcome,
            );
        }
    }

    info!("Database initialization complete: {}", report);
    Ok(report)
}

enum IndexState<'a> {
    Present,
    Conflicting(&'a ExistingIndex),
    Missing,
}

// An index with the right keys and uniqueness counts under any name; a name or
// key collision with anything else is a conflict.
fn find_index<'a>(indexes: &'a [ExistingIndex], spec: &IndexSpec) -> IndexState<'a> {
    if indexes.iter().any(|index| index.satisfies(spec)) {
        return IndexState::Present;
    }
    match indexes
        .iter()
        .find(|index| index.name == spec.name() || index.has_keys_of(spec))
    {
        Some(found) => IndexState::Conflicting(found),
        None => IndexState::Missing,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDrift {
    pub collection: String,
    pub index: String,
}

/// Differences between a store and a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub missing_collections: Vec<String>,
    /// Schema names held by a view or time-series collection.
    pub mismatched_collections: Vec<String>,
    pub unexpected_collections: Vec<String>,
    pub missing_indexes: Vec<IndexDrift>,
    pub mismatched_indexes: Vec<IndexDrift>,
    pub unexpected_indexes: Vec<IndexDrift>,
}

impl Drift {
    pub fn is_clean(&self) -> bool {
        self.missing_collections.is_empty()
            && self.mismatched_collections.is_empty()
            && self.unexpected_collections.is_empty()
            && self.missing_indexes.is_empty()
            && self.mismatched_indexes.is_empty()
            && self.unexpected_indexes.is_empty()
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "schema matches");
        }
        for name in &self.missing_collections {
            writeln!(f, "missing collection {}", name)?;
        }
        for name in &self.mismatched_collections {
            writeln!(f, "collection {} is not a plain collection", name)?;
        }
        for name in &self.unexpected_collections {
            writeln!(f, "unexpected collection {}", name)?;
        }
        for (label, entries) in [
            ("missing", &self.missing_indexes),
            ("mismatched", &self.mismatched_indexes),
            ("unexpected", &self.unexpected_indexes),
        ] {
            for entry in entries {
                writeln!(f, "{} index {} on {}", label, entry.index, entry.collection)?;
            }
        }
        Ok(())
    }
}

/// Compares the store against `schema` without modifying it.
pub async fn verify<S>(store: &S, schema: &[CollectionSpec]) -> Result<Drift, Error>
where
    S: SchemaStore + ?Sized,
{
    store.ping().await?;
    let existing = store.list_collections().await?;
    let mut drift = Drift::default();

    for found in &existing {
        if found.name.starts_with("system.") {
            continue;
        }
        if !schema.iter().any(|c| c.name == found.name) {
            drift.unexpected_collections.push(found.name.clone());
        }
    }

    for collection in schema {
        match existing.iter().find(|c| c.name == collection.name) {
            None => {
                drift.missing_collections.push(collection.name.to_string());
                continue;
            }
            Some(found) if found.kind != CollectionKind::Collection => {
                drift.mismatched_collections.push(collection.name.to_string());
                continue;
            }
            Some(_) => {}
        }

        let indexes = store.list_indexes(collection.name).await?;
        let entry = |index: String| IndexDrift {
            collection: collection.name.to_string(),
            index,
        };

        for spec in collection.indexes {
            match find_index(&indexes, spec) {
                IndexState::Present => {}
                IndexState::Conflicting(_) => drift.mismatched_indexes.push(entry(spec.name())),
                IndexState::Missing => drift.missing_indexes.push(entry(spec.name())),
            }
        }

        for index in &indexes {
            let declared = collection
                .indexes
                .iter()
                .any(|spec| index.name == spec.name() || index.has_keys_of(spec));
            if index.name != ID_INDEX && !declared {
                drift.unexpected_indexes.push(entry(index.name.clone()));
            }
        }
    }

    debug!("Verified {} collections", schema.len());
    Ok(drift)
}
