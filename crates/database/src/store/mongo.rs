// database/store/mongo.rs - SchemaStore backed by a live MongoDB deployment

use super::{CollectionKind, Created, ExistingCollection, ExistingIndex, SchemaStore};
use crate::domains::DomainDocument;
use crate::error::{Error, Step};
use crate::schema::IndexSpec;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    results::CollectionType,
    Client, Database, IndexModel,
};
use tracing::debug;

// Server error codes the bootstrapper distinguishes.
const HOST_UNREACHABLE: i32 = 6;
const HOST_NOT_FOUND: i32 = 7;
const UNAUTHORIZED: i32 = 13;
const AUTHENTICATION_FAILED: i32 = 18;
const NAMESPACE_EXISTS: i32 = 48;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
const NETWORK_TIMEOUT: i32 = 89;
const DUPLICATE_KEY: i32 = 11000;

/// A MongoDB database handle. The client is owned by the caller; cloning a
/// `Client` shares its connection pool.
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    database: String,
}

impl MongoStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Parses the URI and builds a client. No connection is made until the
    /// first operation, so reachability is only known after [`SchemaStore::ping`].
    pub async fn connect(uri: &str, database: &str) -> Result<Self, Error> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| classify(e, Step::Ping))?;
        Ok(Self::new(client, database))
    }

    pub fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    /// Inserts a document into its collection, surfacing unique index
    /// violations as [`Error::DuplicateKey`].
    pub async fn insert<T>(&self, document: &T) -> Result<(), Error>
    where
        T: DomainDocument + Send + Sync,
    {
        self.database()
            .collection::<T>(T::COLLECTION)
            .insert_one(document, None)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, Step::Insert(T::COLLECTION.to_string())))
    }
}

#[async_trait]
impl SchemaStore for MongoStore {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<(), Error> {
        debug!("Pinging database {}", self.database);
        self.database()
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, Step::Ping))
    }

    async fn list_collections(&self) -> Result<Vec<ExistingCollection>, Error> {
        let specs: Vec<_> = self
            .database()
            .list_collections(None, None)
            .await
            .map_err(|e| classify(e, Step::ListCollections))?
            .try_collect()
            .await
            .map_err(|e| classify(e, Step::ListCollections))?;

        Ok(specs
            .into_iter()
            .map(|spec| ExistingCollection {
                name: spec.name,
                kind: match spec.collection_type {
                    CollectionType::Collection => CollectionKind::Collection,
                    CollectionType::View => CollectionKind::View,
                    CollectionType::Timeseries => CollectionKind::Timeseries,
                    #[allow(unreachable_patterns)]
                    _ => CollectionKind::Other,
                },
            })
            .collect())
    }

    async fn create_collection(&self, name: &str) -> Result<Created, Error> {
        debug!("Creating collection {}", name);
        match self.database().create_collection(name, None).await {
            Ok(()) => Ok(Created::New),
            Err(e) if command_code(&e) == Some(NAMESPACE_EXISTS) => Ok(Created::Existed),
            Err(e) => Err(classify(e, Step::CreateCollection(name.to_string()))),
        }
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>, Error> {
        let step = || Step::ListIndexes(collection.to_string());
        let models: Vec<IndexModel> = self
            .database()
            .collection::<Document>(collection)
            .list_indexes(None)
            .await
            .map_err(|e| classify(e, step()))?
            .try_collect()
            .await
            .map_err(|e| classify(e, step()))?;

        Ok(models.into_iter().map(existing_index).collect())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), Error> {
        debug!("Creating index {} on {}", index.name(), collection);
        let mut keys = Document::new();
        keys.insert(index.field, 1);

        let mut options = IndexOptions::builder().name(index.name()).build();
        options.unique = index.unique.then_some(true);

        let model = IndexModel::builder().keys(keys).options(options).build();

        self.database()
            .collection::<Document>(collection)
            .create_index(model, None)
            .await
            .map(|_| ())
            .map_err(|e| {
                classify(
                    e,
                    Step::CreateIndex {
                        collection: collection.to_string(),
                        index: index.name(),
                    },
                )
            })
    }

    async fn drop_database(&self) -> Result<(), Error> {
        self.database()
            .drop(None)
            .await
            .map_err(|e| classify(e, Step::DropDatabase))
    }
}

fn existing_index(model: IndexModel) -> ExistingIndex {
    let keys = model
        .keys
        .iter()
        .map(|(field, direction)| (field.clone(), direction_of(direction)))
        .collect();
    let (name, unique, restricted) = match model.options {
        Some(options) => (
            options.name.unwrap_or_default(),
            options.unique.unwrap_or(false),
            options.sparse.unwrap_or(false)
                || options.partial_filter_expression.is_some()
                || options.collation.is_some(),
        ),
        None => (String::new(), false, false),
    };
    ExistingIndex {
        name,
        keys,
        unique,
        restricted,
    }
}

// Special index types ("text", "2dsphere", ...) map to 0 so they never match an ascending spec.
fn direction_of(value: &Bson) -> i32 {
    match value {
        Bson::Int32(v) => *v,
        Bson::Int64(v) => *v as i32,
        Bson::Double(v) => *v as i32,
        _ => 0,
    }
}

fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match *err.kind {
        ErrorKind::Command(ref command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(ref write)) => Some(write.code),
        _ => None,
    }
}

/// Maps a driver error raised during `step` onto the error taxonomy.
pub fn classify(err: mongodb::error::Error, step: Step) -> Error {
    let reason = err.to_string();

    if let Some(code) = command_code(&err) {
        return classify_code(code, reason, step);
    }

    match *err.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::DnsResolve { .. } => {
            Error::StoreUnavailable { step, reason }
        }
        ErrorKind::Authentication { .. } => Error::PermissionDenied { step, reason },
        _ => Error::Store { step, reason },
    }
}

fn classify_code(code: i32, reason: String, step: Step) -> Error {
    match (code, step) {
        (UNAUTHORIZED | AUTHENTICATION_FAILED, step) => Error::PermissionDenied { step, reason },
        (HOST_UNREACHABLE | HOST_NOT_FOUND | NETWORK_TIMEOUT, step) => {
            Error::StoreUnavailable { step, reason }
        }
        (
            INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT,
            Step::CreateIndex { collection, index },
        ) => Error::IndexConflict {
            collection,
            index,
            reason,
        },
        (DUPLICATE_KEY, Step::Insert(collection)) => Error::DuplicateKey { collection, reason },
        (_, step) => Error::Store { step, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_index_step() -> Step {
        Step::CreateIndex {
            collection: "dominios_actuales".to_string(),
            index: "dominio_1".to_string(),
        }
    }

    #[test]
    fn option_conflicts_become_index_conflicts() {
        for code in [INDEX_OPTIONS_CONFLICT, INDEX_KEY_SPECS_CONFLICT] {
            let err = classify_code(code, "conflict".to_string(), create_index_step());
            assert_eq!(
                err,
                Error::IndexConflict {
                    collection: "dominios_actuales".to_string(),
                    index: "dominio_1".to_string(),
                    reason: "conflict".to_string(),
                }
            );
        }
    }

    #[test]
    fn unauthorized_is_permission_denied() {
        let err = classify_code(UNAUTHORIZED, "not authorized".to_string(), Step::ListCollections);
        assert!(matches!(err, Error::PermissionDenied { step: Step::ListCollections, .. }));
    }

    #[test]
    fn network_codes_are_unavailable() {
        let err = classify_code(HOST_UNREACHABLE, "unreachable".to_string(), Step::Ping);
        assert!(matches!(err, Error::StoreUnavailable { step: Step::Ping, .. }));
    }

    #[test]
    fn duplicate_key_on_insert() {
        let err = classify_code(
            DUPLICATE_KEY,
            "E11000".to_string(),
            Step::Insert("dominios_lynx".to_string()),
        );
        assert!(err.is_duplicate_key());
    }

    #[test]
    fn namespace_exists_outside_create_is_a_plain_store_error() {
        let step = Step::CreateCollection("dominios_lynx".to_string());
        let err = classify_code(NAMESPACE_EXISTS, "exists".to_string(), step.clone());
        assert_eq!(
            err,
            Error::Store {
                step,
                reason: "exists".to_string(),
            }
        );
    }

    #[test]
    fn unknown_codes_keep_the_step() {
        let err = classify_code(2, "bad value".to_string(), create_index_step());
        assert_eq!(err.step(), Some(&create_index_step()));
    }

    #[test]
    fn index_model_conversion_reads_name_and_uniqueness() {
        let model = IndexModel::builder()
            .keys(doc! { "dominio": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("dominio_1".to_string())
                    .build(),
            )
            .build();

        let existing = existing_index(model);
        assert!(existing.satisfies(&IndexSpec::unique("dominio")));
        assert_eq!(existing.name, "dominio_1");
    }

    #[test]
    fn partial_unique_index_is_restricted() {
        let model = IndexModel::builder()
            .keys(doc! { "dominio": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("dominio_1".to_string())
                    .partial_filter_expression(doc! { "dominio": { "$type": "int" } })
                    .build(),
            )
            .build();

        let existing = existing_index(model);
        assert!(existing.restricted);
        assert!(existing.has_keys_of(&IndexSpec::unique("dominio")));
        assert!(!existing.satisfies(&IndexSpec::unique("dominio")));
    }

    #[test]
    fn sparse_unique_index_is_restricted() {
        let model = IndexModel::builder()
            .keys(doc! { "dominio": 1 })
            .options(IndexOptions::builder().unique(true).sparse(true).build())
            .build();

        assert!(!existing_index(model).satisfies(&IndexSpec::unique("dominio")));
    }

    #[test]
    fn text_indexes_have_no_direction() {
        assert_eq!(direction_of(&Bson::String("text".to_string())), 0);
        assert_eq!(direction_of(&Bson::Double(1.0)), 1);
    }
}
