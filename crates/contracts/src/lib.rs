use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod canonical;

/// Timezone applied to DATE fields when the document carries no meta row.
/// Timezones are fixed UTC offsets, not named tz database zones.
pub const DEFAULT_DOCUMENT_TIMEZONE: &str = "+00:00";

/// strftime pattern applied to DATE fields when the document carries no
/// configured format ("2024-01-31 04:05 PM").
pub const DEFAULT_DOCUMENT_DATE_FORMAT: &str = "%Y-%m-%d %I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Completed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Completed => "COMPLETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningStatus {
    NotSigned,
    Signed,
}

impl SigningStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SigningStatus::NotSigned => "NOT_SIGNED",
            SigningStatus::Signed => "SIGNED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientRole {
    Signer,
    Approver,
    Viewer,
    Cc,
}

impl RecipientRole {
    pub fn as_str(self) -> &'static str {
        match self {
            RecipientRole::Signer => "SIGNER",
            RecipientRole::Approver => "APPROVER",
            RecipientRole::Viewer => "VIEWER",
            RecipientRole::Cc => "CC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Signature,
    FreeSignature,
    Date,
    Email,
    Name,
    Text,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Signature => "SIGNATURE",
            FieldType::FreeSignature => "FREE_SIGNATURE",
            FieldType::Date => "DATE",
            FieldType::Email => "EMAIL",
            FieldType::Name => "NAME",
            FieldType::Text => "TEXT",
        }
    }

    /// SIGNATURE and FREE_SIGNATURE persist a signature artifact instead of
    /// `custom_text`. FREE_SIGNATURE remains exempt from action
    /// authorization; signature-shaped does not imply authorization-required.
    pub fn is_signature(self) -> bool {
        matches!(self, FieldType::Signature | FieldType::FreeSignature)
    }
}

/// Secondary credential required on top of token possession before a
/// recipient may complete an action-authorized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionAuthMethod {
    Account,
    Passkey,
    TwoFactorAuth,
    ExplicitNone,
}

impl ActionAuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionAuthMethod::Account => "ACCOUNT",
            ActionAuthMethod::Passkey => "PASSKEY",
            ActionAuthMethod::TwoFactorAuth => "TWO_FACTOR_AUTH",
            ActionAuthMethod::ExplicitNone => "EXPLICIT_NONE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAuthOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_action_auth: Option<ActionAuthMethod>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientAuthOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_auth: Option<ActionAuthMethod>,
}

/// Caller-supplied evidence for the action-auth challenge. PASSKEY payloads
/// are opaque here; the challenge verifier owns their shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionAuthEvidence {
    ExplicitNone,
    Account,
    Passkey { payload: serde_json::Value },
    TwoFactorAuth { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_options: Option<DocumentAuthOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: i64,
    pub document_id: i64,
    pub token: String,
    pub email: String,
    pub name: String,
    pub role: RecipientRole,
    pub signing_status: SigningStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_options: Option<RecipientAuthOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    /// Stable external identifier, carried into audit payloads so the trail
    /// survives re-numbering of the primary key.
    pub secondary_id: String,
    pub document_id: i64,
    pub recipient_id: Option<i64>,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    pub inserted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub field_id: i64,
    pub recipient_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_image_as_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typed_signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Signature {
    /// The persisted artifact, whichever representation is present.
    pub fn artifact(&self) -> Option<&str> {
        self.signature_image_as_base64
            .as_deref()
            .or(self.typed_signature.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

impl DocumentMeta {
    pub fn timezone_or_default(&self) -> &str {
        self.timezone
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_TIMEZONE)
    }

    pub fn date_format_or_default(&self) -> &str {
        self.date_format
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_DATE_FORMAT)
    }
}

/// Request provenance recorded verbatim into the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    DocumentFieldInserted,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventType::DocumentFieldInserted => "DOCUMENT_FIELD_INSERTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    pub email: String,
    pub name: String,
}

/// Type-tagged recording of what was written into the field. Signature
/// variants carry the artifact, text-like variants carry the custom text.
/// One variant per `FieldType`; consumers must match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldValuePayload {
    Signature(String),
    FreeSignature(String),
    Date(String),
    Email(String),
    Name(String),
    Text(String),
}

impl FieldValuePayload {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValuePayload::Signature(_) => FieldType::Signature,
            FieldValuePayload::FreeSignature(_) => FieldType::FreeSignature,
            FieldValuePayload::Date(_) => FieldType::Date,
            FieldValuePayload::Email(_) => FieldType::Email,
            FieldValuePayload::Name(_) => FieldType::Name,
            FieldValuePayload::Text(_) => FieldType::Text,
        }
    }

    pub fn data(&self) -> &str {
        match self {
            FieldValuePayload::Signature(data)
            | FieldValuePayload::FreeSignature(data)
            | FieldValuePayload::Date(data)
            | FieldValuePayload::Email(data)
            | FieldValuePayload::Name(data)
            | FieldValuePayload::Text(data) => data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSecurity {
    #[serde(rename = "type")]
    pub method: ActionAuthMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInsertedPayload {
    pub recipient_id: i64,
    pub recipient_email: String,
    pub recipient_name: String,
    pub recipient_role: RecipientRole,
    pub field_id: String,
    pub field: FieldValuePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_security: Option<FieldSecurity>,
}

/// Result of a completed insertion. The signature sub-record is attached
/// explicitly instead of being patched onto the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedField {
    pub field: Field,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}
