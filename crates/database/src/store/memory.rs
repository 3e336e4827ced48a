// database/store/memory.rs - in-process SchemaStore with MongoDB-like index semantics

use super::{CollectionKind, Created, ExistingCollection, ExistingIndex, SchemaStore, ID_INDEX};
use crate::domains::DomainDocument;
use crate::error::{Error, Step};
use crate::schema::IndexSpec;
use async_trait::async_trait;
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct MemoryCollection {
    kind: CollectionKind,
    indexes: Vec<ExistingIndex>,
    documents: Vec<Document>,
}

impl MemoryCollection {
    fn new(kind: CollectionKind) -> Self {
        let indexes = match kind {
            CollectionKind::View => Vec::new(),
            _ => vec![ExistingIndex {
                name: ID_INDEX.to_string(),
                keys: vec![("_id".to_string(), 1)],
                unique: true,
                restricted: false,
            }],
        };
        Self {
            kind,
            indexes,
            documents: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, MemoryCollection>,
    unreachable: bool,
    read_only: bool,
    race_next_create: bool,
}

/// A database held in memory. Collections are kept in name order.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::schema::DATABASE_NAME)
    }
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every subsequent operation fails with [`Error::StoreUnavailable`].
    #[cfg(any(test, feature = "test-util"))]
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Schema-modifying operations and inserts fail with [`Error::PermissionDenied`].
    #[cfg(any(test, feature = "test-util"))]
    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
    }

    /// The next `create_collection` finds its collection already created, as
    /// if another run got there between listing and creating.
    #[cfg(any(test, feature = "test-util"))]
    pub fn race_next_create(&self) {
        self.state().race_next_create = true;
    }

    /// Registers a view under `name`, occupying the namespace.
    #[cfg(any(test, feature = "test-util"))]
    pub fn add_view(&self, name: &str) {
        self.state()
            .collections
            .insert(name.to_string(), MemoryCollection::new(CollectionKind::View));
    }

    /// Adds an index as-is, bypassing the checks `create_index` applies.
    #[cfg(any(test, feature = "test-util"))]
    pub fn add_index(&self, collection: &str, index: ExistingIndex) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(CollectionKind::Collection))
            .indexes
            .push(index);
    }

    /// Inserts a raw document, creating the collection implicitly as MongoDB does.
    pub fn insert_document(&self, collection: &str, mut document: Document) -> Result<(), Error> {
        let step = Step::Insert(collection.to_string());
        let mut state = self.state();
        check_reachable(&state, &step)?;
        check_writable(&state, &step)?;

        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(CollectionKind::Collection));
        if target.kind == CollectionKind::View {
            return Err(Error::Store {
                step,
                reason: format!("namespace {} is a view", collection),
            });
        }

        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }

        for index in target.indexes.iter().filter(|index| index.unique) {
            let key = index_key(&document, index);
            if target
                .documents
                .iter()
                .any(|existing| index_key(existing, index) == key)
            {
                return Err(Error::DuplicateKey {
                    collection: collection.to_string(),
                    reason: format!("E11000 duplicate key error index: {} dup key: {:?}", index.name, key),
                });
            }
        }

        target.documents.push(document);
        Ok(())
    }

    pub fn insert<T: DomainDocument>(&self, document: &T) -> Result<(), Error> {
        let document = bson::to_document(document).map_err(|e| Error::Store {
            step: Step::Insert(T::COLLECTION.to_string()),
            reason: e.to_string(),
        })?;
        self.insert_document(T::COLLECTION, document)
    }

    pub fn count_documents(&self, collection: &str) -> usize {
        self.state()
            .collections
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }
}

fn check_reachable(state: &State, step: &Step) -> Result<(), Error> {
    if state.unreachable {
        return Err(Error::StoreUnavailable {
            step: step.clone(),
            reason: "no reachable servers".to_string(),
        });
    }
    Ok(())
}

fn check_writable(state: &State, step: &Step) -> Result<(), Error> {
    if state.read_only {
        return Err(Error::PermissionDenied {
            step: step.clone(),
            reason: "not authorized to modify the database".to_string(),
        });
    }
    Ok(())
}

/// Resolves a dot-notation path. Missing fields index as null.
fn lookup<'a>(document: &'a Document, path: &str) -> &'a Bson {
    let mut segments = path.split('.');
    let mut current = segments.next().and_then(|first| document.get(first));
    for segment in segments {
        current = match current {
            Some(Bson::Document(inner)) => inner.get(segment),
            _ => None,
        };
    }
    current.unwrap_or(&Bson::Null)
}

fn index_key<'a>(document: &'a Document, index: &ExistingIndex) -> Vec<&'a Bson> {
    index
        .keys
        .iter()
        .map(|(field, _)| lookup(document, field))
        .collect()
}

#[async_trait]
impl SchemaStore for MemoryStore {
    fn database_name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), Error> {
        check_reachable(&self.state(), &Step::Ping)
    }

    async fn list_collections(&self) -> Result<Vec<ExistingCollection>, Error> {
        let state = self.state();
        check_reachable(&state, &Step::ListCollections)?;
        Ok(state
            .collections
            .iter()
            .map(|(name, collection)| ExistingCollection {
                name: name.clone(),
                kind: collection.kind,
            })
            .collect())
    }

    async fn create_collection(&self, name: &str) -> Result<Created, Error> {
        let step = Step::CreateCollection(name.to_string());
        let mut state = self.state();
        check_reachable(&state, &step)?;
        check_writable(&state, &step)?;

        if std::mem::take(&mut state.race_next_create) {
            state
                .collections
                .entry(name.to_string())
                .or_insert_with(|| MemoryCollection::new(CollectionKind::Collection));
        }

        match state.collections.get(name).map(|c| c.kind) {
            Some(CollectionKind::Collection) => Ok(Created::Existed),
            Some(kind) => Err(Error::CollectionConflict {
                collection: name.to_string(),
                reason: format!("namespace exists as {:?}", kind),
            }),
            None => {
                state.collections.insert(
                    name.to_string(),
                    MemoryCollection::new(CollectionKind::Collection),
                );
                Ok(Created::New)
            }
        }
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>, Error> {
        let step = Step::ListIndexes(collection.to_string());
        let state = self.state();
        check_reachable(&state, &step)?;
        match state.collections.get(collection) {
            Some(c) if c.kind == CollectionKind::View => Err(Error::Store {
                step,
                reason: format!(
                    "namespace {}.{} is a view, not a collection",
                    self.name, collection
                ),
            }),
            Some(c) => Ok(c.indexes.clone()),
            None => Err(Error::Store {
                step,
                reason: format!("ns does not exist: {}.{}", self.name, collection),
            }),
        }
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), Error> {
        let step = Step::CreateIndex {
            collection: collection.to_string(),
            index: index.name(),
        };
        let mut state = self.state();
        check_reachable(&state, &step)?;
        check_writable(&state, &step)?;

        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| MemoryCollection::new(CollectionKind::Collection));
        let wanted = ExistingIndex::from_spec(index);
        let conflict = |reason: String| Error::IndexConflict {
            collection: collection.to_string(),
            index: wanted.name.clone(),
            reason,
        };

        if let Some(existing) = target.indexes.iter().find(|i| i.name == wanted.name) {
            if *existing == wanted {
                return Ok(());
            }
            return Err(conflict(format!(
                "an index named {} already exists with different options",
                existing.name
            )));
        }
        if let Some(existing) = target.indexes.iter().find(|i| i.keys == wanted.keys) {
            return Err(conflict(format!(
                "index with the same keys already exists as {}",
                existing.name
            )));
        }

        if wanted.unique {
            let mut seen = Vec::with_capacity(target.documents.len());
            for document in &target.documents {
                let key = index_key(document, &wanted);
                if seen.contains(&key) {
                    return Err(Error::DuplicateKey {
                        collection: collection.to_string(),
                        reason: format!("cannot build unique index {}", wanted.name),
                    });
                }
                seen.push(key);
            }
        }

        target.indexes.push(wanted);
        Ok(())
    }

    async fn drop_database(&self) -> Result<(), Error> {
        let mut state = self.state();
        check_reachable(&state, &Step::DropDatabase)?;
        check_writable(&state, &Step::DropDatabase)?;
        state.collections.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn lookup_follows_dot_paths() {
        let document = doc! { "procesado_por": { "lynx": true } };
        assert_eq!(lookup(&document, "procesado_por.lynx"), &Bson::Boolean(true));
        assert_eq!(lookup(&document, "procesado_por.main"), &Bson::Null);
        assert_eq!(lookup(&document, "missing.path"), &Bson::Null);
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates_on_nested_fields() {
        let store = MemoryStore::default();
        store
            .create_index("c", &IndexSpec::unique("empresa.nif"))
            .await
            .unwrap();

        store
            .insert_document("c", doc! { "empresa": { "nif": "B12345678" } })
            .unwrap();
        let err = store
            .insert_document("c", doc! { "empresa": { "nif": "B12345678" } })
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn missing_fields_collide_as_null() {
        let store = MemoryStore::default();
        store
            .create_index("c", &IndexSpec::unique("dominio"))
            .await
            .unwrap();

        store.insert_document("c", doc! { "otro": 1 }).unwrap();
        assert!(store.insert_document("c", doc! { "otro": 2 }).is_err());
    }

    #[tokio::test]
    async fn unique_index_build_fails_over_existing_duplicates() {
        let store = MemoryStore::default();
        store.insert_document("c", doc! { "dominio": "a.es" }).unwrap();
        store.insert_document("c", doc! { "dominio": "a.es" }).unwrap();

        let err = store
            .create_index("c", &IndexSpec::unique("dominio"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn views_reject_index_listing_and_inserts() {
        let store = MemoryStore::default();
        store.add_view("v");
        assert!(store.list_indexes("v").await.is_err());
        assert!(store.insert_document("v", doc! { "dominio": "a.es" }).is_err());
    }

    #[tokio::test]
    async fn read_only_store_still_answers_reads() {
        let store = MemoryStore::default();
        store.create_collection("c").await.unwrap();
        store.set_read_only(true);

        assert_eq!(store.list_collections().await.unwrap().len(), 1);
        assert!(matches!(
            store.create_collection("d").await,
            Err(Error::PermissionDenied { .. })
        ));
    }

    #[tokio::test]
    async fn restricted_index_conflicts_with_plain_declaration() {
        let store = MemoryStore::default();
        store.add_index(
            "c",
            ExistingIndex {
                restricted: true,
                ..ExistingIndex::from_spec(&IndexSpec::unique("dominio"))
            },
        );

        let err = store
            .create_index("c", &IndexSpec::unique("dominio"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexConflict { .. }));
    }

    #[tokio::test]
    async fn raced_create_reports_existing_collection() {
        let store = MemoryStore::default();
        store.race_next_create();

        assert_eq!(store.create_collection("c").await.unwrap(), Created::Existed);
        assert_eq!(store.create_collection("d").await.unwrap(), Created::New);
    }
}
