//! Completes a single field of a signing workflow as one indivisible
//! operation: resolve by token, validate preconditions, authorize signature
//! fields, normalize the value, persist field + signature + audit entry
//! atomically.

use penmark_auth::AuthError;
use penmark_contracts::{ActionAuthEvidence, RequestMetadata};
use penmark_store::StoreError;

mod normalize;
mod preconditions;
mod sign;

pub use normalize::{normalize_value, NormalizedValue};
pub use preconditions::check_preconditions;
pub use sign::sign_field_with_token;

#[derive(Debug, Clone, PartialEq)]
pub struct SignFieldRequest {
    pub token: String,
    pub field_id: i64,
    pub value: String,
    /// The value is a pre-encoded signature image rather than typed text.
    pub is_base64: bool,
    /// Acting authenticated user, absent for public signing flows.
    pub user_id: Option<i64>,
    pub auth_evidence: Option<ActionAuthEvidence>,
    pub request_metadata: Option<RequestMetadata>,
}

/// Which precondition rejected the request. Ordering of the checks is part
/// of the contract; see `check_preconditions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    RecipientMismatch,
    DocumentDeleted,
    DocumentNotPending,
    RecipientAlreadySigned,
    FieldAlreadyInserted,
}

impl ConflictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictReason::RecipientMismatch => "RECIPIENT_MISMATCH",
            ConflictReason::DocumentDeleted => "DOCUMENT_DELETED",
            ConflictReason::DocumentNotPending => "DOCUMENT_NOT_PENDING",
            ConflictReason::RecipientAlreadySigned => "RECIPIENT_ALREADY_SIGNED",
            ConflictReason::FieldAlreadyInserted => "FIELD_ALREADY_INSERTED",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ConflictReason::RecipientMismatch => "field is not assigned to this recipient",
            ConflictReason::DocumentDeleted => "document has been deleted",
            ConflictReason::DocumentNotPending => "document is no longer open for signing",
            ConflictReason::RecipientAlreadySigned => "recipient has already signed",
            ConflictReason::FieldAlreadyInserted => "field has already been inserted",
        }
    }
}

#[derive(Debug)]
pub enum SignFieldError {
    /// The (token, field) combination does not resolve.
    NotFound,
    Conflict(ConflictReason),
    /// The authorization capability denied the signature action.
    Unauthorized,
    Validation(&'static str),
    /// The authorization capability itself failed.
    Authorizer(AuthError),
    Store(StoreError),
}

impl SignFieldError {
    pub fn code(&self) -> &'static str {
        match self {
            SignFieldError::NotFound => "ERR_NOT_FOUND",
            SignFieldError::Conflict(_) => "ERR_CONFLICT",
            SignFieldError::Unauthorized => "ERR_UNAUTHORIZED",
            SignFieldError::Validation(_) => "ERR_VALIDATION",
            SignFieldError::Authorizer(_) => "ERR_AUTH_UNAVAILABLE",
            SignFieldError::Store(err) => err.code(),
        }
    }
}

impl std::fmt::Display for SignFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignFieldError::NotFound => write!(f, "field not found for token"),
            SignFieldError::Conflict(reason) => write!(f, "{}", reason.message()),
            SignFieldError::Unauthorized => write!(f, "invalid authentication values"),
            SignFieldError::Validation(message) => write!(f, "{}", message),
            SignFieldError::Authorizer(err) => write!(f, "authorization capability failed: {}", err),
            SignFieldError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SignFieldError {}

impl From<AuthError> for SignFieldError {
    fn from(value: AuthError) -> Self {
        SignFieldError::Authorizer(value)
    }
}

impl From<StoreError> for SignFieldError {
    fn from(value: StoreError) -> Self {
        // The compare-and-set loser observes the same conflict a pre-read
        // `inserted` flag would have produced.
        match value {
            StoreError::AlreadyInserted => {
                SignFieldError::Conflict(ConflictReason::FieldAlreadyInserted)
            }
            other => SignFieldError::Store(other),
        }
    }
}
