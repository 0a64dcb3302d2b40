use chrono::Utc;
use penmark_auth::{AuthActionKind, AuthorizationRequest, RecipientAuthorizer};
use penmark_contracts::{
    AuditActor, AuditEventType, FieldInsertedPayload, FieldSecurity, FieldType, FieldValuePayload,
    InsertedField,
};
use penmark_store::{AuditEventWrite, FieldStore, InsertFieldRecord, SignatureWrite};

use crate::normalize::{normalize_value, NormalizedValue};
use crate::preconditions::check_preconditions;
use crate::{SignFieldError, SignFieldRequest};

/// The whole operation: lookup, validate, authorize, normalize, persist.
/// Strictly sequential; no write happens before authorization resolves, and
/// the persist step commits field, signature, and audit entry together.
pub async fn sign_field_with_token<S, A>(
    store: &S,
    authorizer: &A,
    request: SignFieldRequest,
) -> Result<InsertedField, SignFieldError>
where
    S: FieldStore + ?Sized,
    A: RecipientAuthorizer + ?Sized,
{
    let ctx = store
        .find_field_for_token(&request.token, request.field_id)
        .await?
        .ok_or(SignFieldError::NotFound)?;

    if let Err(err) = check_preconditions(&ctx) {
        tracing::warn!(
            field_id = ctx.field.id,
            document_id = ctx.document.id,
            code = err.code(),
            "field insertion rejected"
        );
        return Err(err);
    }

    // Only SIGNATURE fields carry authorization risk; every other type,
    // FREE_SIGNATURE included, bypasses the capability entirely.
    let effective_auth = penmark_auth::effective_action_auth(
        ctx.field.field_type,
        ctx.document.auth_options.as_ref(),
        ctx.recipient.auth_options.as_ref(),
    );

    if ctx.field.field_type == FieldType::Signature {
        let authorized = authorizer
            .is_recipient_authorized(AuthorizationRequest {
                kind: AuthActionKind::Action,
                document: &ctx.document,
                recipient: &ctx.recipient,
                user_id: request.user_id,
                evidence: request.auth_evidence.as_ref(),
            })
            .await?;

        if !authorized {
            tracing::warn!(
                field_id = ctx.field.id,
                document_id = ctx.document.id,
                "signature action not authorized"
            );
            return Err(SignFieldError::Unauthorized);
        }
    }

    let meta = store
        .find_document_meta(ctx.document.id)
        .await?
        .unwrap_or_default();

    let normalized = normalize_value(
        ctx.field.field_type,
        &request.value,
        request.is_base64,
        &meta,
        Utc::now(),
    )?;

    let recorded = recorded_payload(ctx.field.field_type, &normalized);
    let actor = AuditActor {
        email: ctx.recipient.email.clone(),
        name: ctx.recipient.name.clone(),
    };
    let payload = FieldInsertedPayload {
        recipient_id: ctx.recipient.id,
        recipient_email: ctx.recipient.email.clone(),
        recipient_name: ctx.recipient.name.clone(),
        recipient_role: ctx.recipient.role,
        field_id: ctx.field.secondary_id.clone(),
        field: recorded,
        field_security: effective_auth.map(|method| FieldSecurity { method }),
    };
    let payload = serde_json::to_value(&payload)
        .map_err(|_| SignFieldError::Validation("audit payload failed to serialize"))?;

    let signature = ctx.field.field_type.is_signature().then(|| SignatureWrite {
        recipient_id: ctx.recipient.id,
        signature_image_as_base64: normalized.signature_image_as_base64.as_deref(),
        typed_signature: normalized.typed_signature.as_deref(),
    });

    let inserted = store
        .insert_field(InsertFieldRecord {
            field_id: ctx.field.id,
            custom_text: normalized.custom_text.as_deref(),
            signature,
            audit: AuditEventWrite {
                event_type: AuditEventType::DocumentFieldInserted,
                document_id: ctx.document.id,
                actor: &actor,
                request_metadata: request.request_metadata.as_ref(),
                payload,
            },
        })
        .await?;

    Ok(inserted)
}

/// What the audit trail records for the field, dispatched exhaustively so a
/// new field type cannot silently fall through.
fn recorded_payload(field_type: FieldType, normalized: &NormalizedValue) -> FieldValuePayload {
    let artifact = || normalized.artifact().unwrap_or_default().to_string();
    let text = || {
        normalized
            .custom_text
            .clone()
            .unwrap_or_default()
    };

    match field_type {
        FieldType::Signature => FieldValuePayload::Signature(artifact()),
        FieldType::FreeSignature => FieldValuePayload::FreeSignature(artifact()),
        FieldType::Date => FieldValuePayload::Date(text()),
        FieldType::Email => FieldValuePayload::Email(text()),
        FieldType::Name => FieldValuePayload::Name(text()),
        FieldType::Text => FieldValuePayload::Text(text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_payload_carries_artifact_for_signature_types() {
        let normalized = NormalizedValue {
            typed_signature: Some("Jane Doe".to_string()),
            ..NormalizedValue::default()
        };
        assert_eq!(
            recorded_payload(FieldType::Signature, &normalized),
            FieldValuePayload::Signature("Jane Doe".to_string())
        );
        assert_eq!(
            recorded_payload(FieldType::FreeSignature, &normalized),
            FieldValuePayload::FreeSignature("Jane Doe".to_string())
        );
    }

    #[test]
    fn recorded_payload_carries_custom_text_for_text_like_types() {
        let normalized = NormalizedValue {
            custom_text: Some("2024-01-31 04:05 PM".to_string()),
            ..NormalizedValue::default()
        };
        assert_eq!(
            recorded_payload(FieldType::Date, &normalized),
            FieldValuePayload::Date("2024-01-31 04:05 PM".to_string())
        );
    }
}
