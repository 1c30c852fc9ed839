//! Persistence of submitted messages.
//!
//! Provides the `MessageStore` append contract with two backends:
//! - `MongoStore`: opens a fresh document-store connection per append
//! - `MemoryStore`: keeps records in process, for local runs and tests

use chrono::Local;
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::Client;
use serde::Serialize;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

/// Timestamp layout stored in the `date` field (microsecond precision).
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A single submitted message, as written to the `messages` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub date: String,
    pub username: String,
    pub message: String,
}

impl MessageRecord {
    /// Build a record stamped with the current local time.
    pub fn new(username: &str, message: &str) -> Self {
        Self {
            date: Local::now().format(DATE_FORMAT).to_string(),
            username: username.trim().to_string(),
            message: message.trim().to_string(),
        }
    }
}

/// Append-only sink for message records.
pub trait MessageStore: Send + Sync + 'static {
    /// Persist one record.
    fn append(&self, record: &MessageRecord)
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Document store backend.
///
/// Every append parses the connection string, connects, inserts one
/// document and shuts the client down again. No connection is reused.
pub struct MongoStore {
    uri: String,
    database: String,
    collection: String,
    timeout: Duration,
}

impl MongoStore {
    pub fn new(uri: &str, database: &str, collection: &str, timeout: Duration) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            timeout,
        }
    }

    async fn connect(&self) -> Result<Client, StoreError> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(StoreError::Connect)?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(self.timeout);
        Client::with_options(options).map_err(StoreError::Connect)
    }
}

impl MessageStore for MongoStore {
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let client = self.connect().await?;
        let result = client
            .database(&self.database)
            .collection::<MessageRecord>(&self.collection)
            .insert_one(record)
            .await;
        client.shutdown().await;

        let inserted = result.map_err(StoreError::Insert)?;
        debug!(id = %inserted.inserted_id, "Inserted message document");
        info!(
            collection = %self.collection,
            username = %record.username,
            "Message saved"
        );
        Ok(())
    }
}

/// In-process backend.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<MessageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far.
    #[cfg(test)]
    pub fn records(&self) -> Vec<MessageRecord> {
        match self.records.read() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MessageStore for MemoryStore {
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.push(record.clone());
        info!(count = records.len(), username = %record.username, "Message saved in memory");
        Ok(())
    }
}

/// Persistence errors
#[derive(Debug)]
pub enum StoreError {
    /// Could not reach or configure the store.
    Connect(mongodb::error::Error),
    /// The store rejected the insert.
    Insert(mongodb::error::Error),
    /// The in-memory store lock was poisoned by a panicking writer.
    Poisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connect(e) => write!(f, "store unavailable: {}", e),
            StoreError::Insert(e) => write!(f, "insert failed: {}", e),
            StoreError::Poisoned => write!(f, "store unavailable: lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_record_trims_and_stamps() {
        let record = MessageRecord::new("  Alice ", "\tHello\n");
        assert_eq!(record.username, "Alice");
        assert_eq!(record.message, "Hello");

        let parsed = NaiveDateTime::parse_from_str(&record.date, DATE_FORMAT).unwrap();
        assert_eq!(parsed.format(DATE_FORMAT).to_string(), record.date);
        // microseconds: "YYYY-MM-DD HH:MM:SS.ffffff"
        assert_eq!(record.date.len(), 26);
    }

    #[tokio::test]
    async fn test_memory_store_appends() {
        let store = MemoryStore::new();
        store.append(&MessageRecord::new("a", "one")).await.unwrap();
        store.append(&MessageRecord::new("b", "two")).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].username, "a");
        assert_eq!(records[1].message, "two");
    }

    #[tokio::test]
    async fn test_mongo_store_bad_uri() {
        let store = MongoStore::new("not-a-uri", "db", "messages", Duration::from_millis(100));
        let err = store
            .append(&MessageRecord::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connect(_)));
        assert!(err.to_string().starts_with("store unavailable"));
    }
}
