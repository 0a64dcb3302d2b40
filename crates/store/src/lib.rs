use async_trait::async_trait;
use penmark_contracts::{
    AuditActor, AuditEventType, Document, DocumentMeta, Field, InsertedField, Recipient,
    RequestMetadata,
};

pub mod config;
pub mod memory;
mod pg;

pub use config::StoreConfig;
pub use memory::MemoryStore;
pub use pg::PgFieldStore;

#[derive(Debug)]
pub enum StoreError {
    Timeout,
    /// The guarded field update matched no row: the field was already
    /// inserted by the time the write ran. Concurrency losers land here.
    AlreadyInserted,
    Decode(String),
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Timeout => "ERR_STORE_TIMEOUT",
            StoreError::AlreadyInserted => "ERR_ALREADY_INSERTED",
            StoreError::Decode(_) => "ERR_STORE_DECODE",
            StoreError::Sqlx(_) => "ERR_STORE",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::AlreadyInserted => write!(f, "field has already been inserted"),
            StoreError::Decode(message) => write!(f, "store decode error: {}", message),
            StoreError::Sqlx(err) => write!(f, "store sql error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Sqlx(value)
    }
}

/// A field resolved by (token, field id), joined with its document and
/// recipient. Resolving one of these is the only way into the pipeline.
#[derive(Debug, Clone)]
pub struct FieldContext {
    pub document: Document,
    pub recipient: Recipient,
    pub field: Field,
}

#[derive(Debug, Clone, Copy)]
pub struct SignatureWrite<'a> {
    pub recipient_id: i64,
    pub signature_image_as_base64: Option<&'a str>,
    pub typed_signature: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct AuditEventWrite<'a> {
    pub event_type: AuditEventType,
    pub document_id: i64,
    pub actor: &'a AuditActor,
    pub request_metadata: Option<&'a RequestMetadata>,
    pub payload: serde_json::Value,
}

/// Everything the persister writes in one transaction: the guarded field
/// update, an optional signature upsert, and exactly one audit event.
#[derive(Debug, Clone)]
pub struct InsertFieldRecord<'a> {
    pub field_id: i64,
    pub custom_text: Option<&'a str>,
    pub signature: Option<SignatureWrite<'a>>,
    pub audit: AuditEventWrite<'a>,
}

#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Lookup resolver: field by id, scoped to the recipient holding the
    /// token. `None` when the combination does not resolve.
    async fn find_field_for_token(
        &self,
        token: &str,
        field_id: i64,
    ) -> Result<Option<FieldContext>, StoreError>;

    async fn find_document_meta(
        &self,
        document_id: i64,
    ) -> Result<Option<DocumentMeta>, StoreError>;

    /// Transactional persister. All three writes commit together or not at
    /// all; a lost compare-and-set surfaces as `AlreadyInserted`.
    async fn insert_field(
        &self,
        record: InsertFieldRecord<'_>,
    ) -> Result<InsertedField, StoreError>;
}
