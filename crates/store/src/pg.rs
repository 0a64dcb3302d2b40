use std::time::Duration;

use chrono::{DateTime, Utc};
use penmark_contracts::canonical;
use penmark_contracts::{
    Document, DocumentAuthOptions, DocumentMeta, DocumentStatus, Field, FieldType, InsertedField,
    Recipient, RecipientAuthOptions, RecipientRole, Signature, SigningStatus,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::Row;
use ulid::Ulid;

use crate::{FieldContext, FieldStore, InsertFieldRecord, StoreError};

const FIELD_CONTEXT_QUERY: &str = "\
SELECT \
  f.id AS field_id, f.secondary_id, f.document_id AS field_document_id, f.recipient_id, \
  f.field_type, f.custom_text, f.inserted, \
  d.id AS document_id, d.status AS document_status, d.deleted_at, \
  d.auth_options AS document_auth_options, \
  r.id AS recipient_pk, r.document_id AS recipient_document_id, r.token, r.email, r.name, \
  r.role, r.signing_status, r.auth_options AS recipient_auth_options \
FROM penmark_fields f \
JOIN penmark_recipients r ON r.id = f.recipient_id \
JOIN penmark_documents d ON d.id = f.document_id \
WHERE f.id = $1 AND r.token = $2";

const FIELD_UPDATE_QUERY: &str = "\
UPDATE penmark_fields \
SET custom_text = $2, inserted = TRUE \
WHERE id = $1 AND inserted = FALSE \
RETURNING id, secondary_id, document_id, recipient_id, field_type, custom_text, inserted";

const SIGNATURE_UPSERT_QUERY: &str = "\
INSERT INTO penmark_signatures \
  (field_id, recipient_id, signature_image_as_base64, typed_signature) \
VALUES ($1, $2, $3, $4) \
ON CONFLICT (field_id) DO UPDATE SET \
  signature_image_as_base64 = EXCLUDED.signature_image_as_base64, \
  typed_signature = EXCLUDED.typed_signature \
RETURNING field_id, recipient_id, signature_image_as_base64, typed_signature, created_at";

const AUDIT_INSERT_QUERY: &str = "\
INSERT INTO penmark_audit_events \
  (event_id, event_type, document_id, actor_email, actor_name, request_ip, \
   request_user_agent, requested_at, payload_json, payload_hash) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

/// Postgres-backed store. Every write runs inside `write_timeout`; a timed
/// out transaction is dropped and rolls back server-side.
#[derive(Clone)]
pub struct PgFieldStore {
    pool: sqlx::PgPool,
    write_timeout: Duration,
}

impl PgFieldStore {
    pub async fn connect(db_url: &str, write_timeout: Duration) -> Result<Self, StoreError> {
        let pool = tokio::time::timeout(
            Duration::from_secs(2),
            PgPoolOptions::new().max_connections(8).connect(db_url),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(Self {
            pool,
            write_timeout,
        })
    }

    pub async fn connect_and_migrate(
        db_url: &str,
        write_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store = Self::connect(db_url, write_timeout).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tokio::time::timeout(Duration::from_secs(10), migrate(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl FieldStore for PgFieldStore {
    async fn find_field_for_token(
        &self,
        token: &str,
        field_id: i64,
    ) -> Result<Option<FieldContext>, StoreError> {
        let row = tokio::time::timeout(
            self.write_timeout,
            sqlx::query(FIELD_CONTEXT_QUERY)
                .bind(field_id)
                .bind(token)
                .fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(field_context_from_row(&row)?))
    }

    async fn find_document_meta(
        &self,
        document_id: i64,
    ) -> Result<Option<DocumentMeta>, StoreError> {
        let row = tokio::time::timeout(
            self.write_timeout,
            sqlx::query(
                "SELECT timezone, date_format FROM penmark_document_meta WHERE document_id = $1",
            )
            .bind(document_id)
            .fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(DocumentMeta {
            timezone: row.try_get("timezone")?,
            date_format: row.try_get("date_format")?,
        }))
    }

    async fn insert_field(
        &self,
        record: InsertFieldRecord<'_>,
    ) -> Result<InsertedField, StoreError> {
        let event_id = Ulid::new().to_string();
        let payload_hash = canonical::hash_canonical_json(&record.audit.payload);

        let inserted = tokio::time::timeout(self.write_timeout, async {
            let mut tx = self.pool.begin().await?;

            // Linearization point: the guard re-checks `inserted` at write
            // time, so a racing second request matches zero rows.
            let updated = sqlx::query(FIELD_UPDATE_QUERY)
                .bind(record.field_id)
                .bind(record.custom_text)
                .fetch_optional(&mut *tx)
                .await?;

            let Some(updated) = updated else {
                return Err(StoreError::AlreadyInserted);
            };
            let field = field_from_row(&updated)?;

            let signature = match record.signature {
                Some(write) => {
                    let row = sqlx::query(SIGNATURE_UPSERT_QUERY)
                        .bind(record.field_id)
                        .bind(write.recipient_id)
                        .bind(write.signature_image_as_base64)
                        .bind(write.typed_signature)
                        .fetch_one(&mut *tx)
                        .await?;
                    Some(signature_from_row(&row)?)
                }
                None => None,
            };

            let metadata = record.audit.request_metadata;
            sqlx::query(AUDIT_INSERT_QUERY)
                .bind(&event_id)
                .bind(record.audit.event_type.as_str())
                .bind(record.audit.document_id)
                .bind(&record.audit.actor.email)
                .bind(&record.audit.actor.name)
                .bind(metadata.and_then(|m| m.ip.as_deref()))
                .bind(metadata.and_then(|m| m.user_agent.as_deref()))
                .bind(metadata.and_then(|m| m.requested_at))
                .bind(&record.audit.payload)
                .bind(&payload_hash)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok::<_, StoreError>(InsertedField { field, signature })
        })
        .await
        .map_err(|_| StoreError::Timeout)??;

        tracing::info!(
            field_id = record.field_id,
            document_id = record.audit.document_id,
            event_id = %event_id,
            "field inserted"
        );

        Ok(inserted)
    }
}

async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn decode_enum<T: serde::de::DeserializeOwned>(
    column: &'static str,
    raw: &str,
) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| StoreError::Decode(format!("unrecognized {} value `{}`", column, raw)))
}

fn decode_json_opt<T: serde::de::DeserializeOwned>(
    column: &'static str,
    value: Option<serde_json::Value>,
) -> Result<Option<T>, StoreError> {
    match value {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|_| StoreError::Decode(format!("malformed {} json", column))),
    }
}

fn field_from_row(row: &PgRow) -> Result<Field, StoreError> {
    let field_type: String = row.try_get("field_type")?;
    Ok(Field {
        id: row.try_get("id")?,
        secondary_id: row.try_get("secondary_id")?,
        document_id: row.try_get("document_id")?,
        recipient_id: row.try_get("recipient_id")?,
        field_type: decode_enum::<FieldType>("field_type", &field_type)?,
        custom_text: row.try_get("custom_text")?,
        inserted: row.try_get("inserted")?,
    })
}

fn signature_from_row(row: &PgRow) -> Result<Signature, StoreError> {
    Ok(Signature {
        field_id: row.try_get("field_id")?,
        recipient_id: row.try_get("recipient_id")?,
        signature_image_as_base64: row.try_get("signature_image_as_base64")?,
        typed_signature: row.try_get("typed_signature")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn field_context_from_row(row: &PgRow) -> Result<FieldContext, StoreError> {
    let document_status: String = row.try_get("document_status")?;
    let role: String = row.try_get("role")?;
    let signing_status: String = row.try_get("signing_status")?;
    let field_type: String = row.try_get("field_type")?;

    let document = Document {
        id: row.try_get("document_id")?,
        status: decode_enum::<DocumentStatus>("document_status", &document_status)?,
        deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
        auth_options: decode_json_opt::<DocumentAuthOptions>(
            "document_auth_options",
            row.try_get("document_auth_options")?,
        )?,
    };

    let recipient = Recipient {
        id: row.try_get("recipient_pk")?,
        document_id: row.try_get("recipient_document_id")?,
        token: row.try_get("token")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: decode_enum::<RecipientRole>("role", &role)?,
        signing_status: decode_enum::<SigningStatus>("signing_status", &signing_status)?,
        auth_options: decode_json_opt::<RecipientAuthOptions>(
            "recipient_auth_options",
            row.try_get("recipient_auth_options")?,
        )?,
    };

    let field = Field {
        id: row.try_get("field_id")?,
        secondary_id: row.try_get("secondary_id")?,
        document_id: row.try_get("field_document_id")?,
        recipient_id: row.try_get("recipient_id")?,
        field_type: decode_enum::<FieldType>("field_type", &field_type)?,
        custom_text: row.try_get("custom_text")?,
        inserted: row.try_get("inserted")?,
    };

    Ok(FieldContext {
        document,
        recipient,
        field,
    })
}
