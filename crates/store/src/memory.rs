//! In-memory store with the same compare-and-set semantics as the Postgres
//! store. Used by the pipeline tests and handy for local experiments; not a
//! durability layer.

use std::collections::HashMap;

use chrono::Utc;
use penmark_contracts::canonical;
use penmark_contracts::{
    AuditActor, Document, DocumentMeta, Field, InsertedField, Recipient, RequestMetadata, Signature,
};
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::{FieldContext, FieldStore, InsertFieldRecord, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAuditEvent {
    pub event_id: String,
    pub event_type: String,
    pub document_id: i64,
    pub actor: AuditActor,
    pub request_metadata: Option<RequestMetadata>,
    pub payload: serde_json::Value,
    pub payload_hash: String,
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<i64, Document>,
    recipients: HashMap<i64, Recipient>,
    fields: HashMap<i64, Field>,
    signatures: HashMap<i64, Signature>,
    meta: HashMap<i64, DocumentMeta>,
    audit_events: Vec<StoredAuditEvent>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_document(&self, document: Document) {
        self.inner.lock().await.documents.insert(document.id, document);
    }

    pub async fn put_recipient(&self, recipient: Recipient) {
        self.inner
            .lock()
            .await
            .recipients
            .insert(recipient.id, recipient);
    }

    pub async fn put_field(&self, field: Field) {
        self.inner.lock().await.fields.insert(field.id, field);
    }

    pub async fn put_document_meta(&self, document_id: i64, meta: DocumentMeta) {
        self.inner.lock().await.meta.insert(document_id, meta);
    }

    pub async fn field(&self, field_id: i64) -> Option<Field> {
        self.inner.lock().await.fields.get(&field_id).cloned()
    }

    pub async fn signature(&self, field_id: i64) -> Option<Signature> {
        self.inner.lock().await.signatures.get(&field_id).cloned()
    }

    pub async fn audit_events(&self) -> Vec<StoredAuditEvent> {
        self.inner.lock().await.audit_events.clone()
    }
}

#[async_trait::async_trait]
impl FieldStore for MemoryStore {
    async fn find_field_for_token(
        &self,
        token: &str,
        field_id: i64,
    ) -> Result<Option<FieldContext>, StoreError> {
        let inner = self.inner.lock().await;

        let Some(field) = inner.fields.get(&field_id) else {
            return Ok(None);
        };
        let recipient = field
            .recipient_id
            .and_then(|id| inner.recipients.get(&id))
            .filter(|recipient| recipient.token == token);
        let Some(recipient) = recipient else {
            return Ok(None);
        };
        let Some(document) = inner.documents.get(&field.document_id) else {
            return Ok(None);
        };

        Ok(Some(FieldContext {
            document: document.clone(),
            recipient: recipient.clone(),
            field: field.clone(),
        }))
    }

    async fn find_document_meta(
        &self,
        document_id: i64,
    ) -> Result<Option<DocumentMeta>, StoreError> {
        Ok(self.inner.lock().await.meta.get(&document_id).cloned())
    }

    async fn insert_field(
        &self,
        record: InsertFieldRecord<'_>,
    ) -> Result<InsertedField, StoreError> {
        // Single lock for the whole write set mirrors the transaction
        // boundary of the Postgres store.
        let mut inner = self.inner.lock().await;

        let Some(field) = inner.fields.get_mut(&record.field_id) else {
            return Err(StoreError::Decode(format!(
                "unknown field id {}",
                record.field_id
            )));
        };
        if field.inserted {
            return Err(StoreError::AlreadyInserted);
        }

        field.custom_text = record.custom_text.map(str::to_string);
        field.inserted = true;
        let field = field.clone();

        let signature = match record.signature {
            Some(write) => {
                let signature = Signature {
                    field_id: record.field_id,
                    recipient_id: write.recipient_id,
                    signature_image_as_base64: write
                        .signature_image_as_base64
                        .map(str::to_string),
                    typed_signature: write.typed_signature.map(str::to_string),
                    created_at: Utc::now(),
                };
                inner.signatures.insert(record.field_id, signature.clone());
                Some(signature)
            }
            None => None,
        };

        let payload_hash = canonical::hash_canonical_json(&record.audit.payload);
        inner.audit_events.push(StoredAuditEvent {
            event_id: Ulid::new().to_string(),
            event_type: record.audit.event_type.as_str().to_string(),
            document_id: record.audit.document_id,
            actor: record.audit.actor.clone(),
            request_metadata: record.audit.request_metadata.cloned(),
            payload: record.audit.payload.clone(),
            payload_hash,
        });

        Ok(InsertedField { field, signature })
    }
}
