use penmark_contracts::{DocumentStatus, SigningStatus};
use penmark_store::FieldContext;

use crate::{ConflictReason, SignFieldError};

/// Eligibility checks over the resolved context, in precedence order:
/// recipient association, soft deletion, document status, recipient signing
/// status, field insertion flag. All five are terminal for the request.
pub fn check_preconditions(ctx: &FieldContext) -> Result<(), SignFieldError> {
    let FieldContext {
        document,
        recipient,
        field,
    } = ctx;

    // Unreachable given the lookup join; kept because the join is not the
    // only conceivable implementation of `FieldStore`.
    if field.recipient_id != Some(recipient.id) || recipient.document_id != document.id {
        return Err(SignFieldError::Conflict(ConflictReason::RecipientMismatch));
    }

    if document.deleted_at.is_some() {
        return Err(SignFieldError::Conflict(ConflictReason::DocumentDeleted));
    }

    if document.status != DocumentStatus::Pending {
        return Err(SignFieldError::Conflict(ConflictReason::DocumentNotPending));
    }

    if recipient.signing_status == SigningStatus::Signed {
        return Err(SignFieldError::Conflict(
            ConflictReason::RecipientAlreadySigned,
        ));
    }

    if field.inserted {
        return Err(SignFieldError::Conflict(
            ConflictReason::FieldAlreadyInserted,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use penmark_contracts::{
        Document, DocumentStatus, Field, FieldType, Recipient, RecipientRole, SigningStatus,
    };

    use super::*;

    fn eligible_context() -> FieldContext {
        FieldContext {
            document: Document {
                id: 1,
                status: DocumentStatus::Pending,
                deleted_at: None,
                auth_options: None,
            },
            recipient: Recipient {
                id: 10,
                document_id: 1,
                token: "tok_jane".to_string(),
                email: "jane@example.com".to_string(),
                name: "Jane Doe".to_string(),
                role: RecipientRole::Signer,
                signing_status: SigningStatus::NotSigned,
                auth_options: None,
            },
            field: Field {
                id: 100,
                secondary_id: "field_100".to_string(),
                document_id: 1,
                recipient_id: Some(10),
                field_type: FieldType::Text,
                custom_text: None,
                inserted: false,
            },
        }
    }

    fn conflict_reason(ctx: &FieldContext) -> ConflictReason {
        match check_preconditions(ctx) {
            Err(SignFieldError::Conflict(reason)) => reason,
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn eligible_context_passes() {
        check_preconditions(&eligible_context()).expect("context should be eligible");
    }

    #[test]
    fn each_precondition_rejects() {
        let mut ctx = eligible_context();
        ctx.field.recipient_id = None;
        assert_eq!(conflict_reason(&ctx), ConflictReason::RecipientMismatch);

        let mut ctx = eligible_context();
        ctx.document.deleted_at = Some(Utc::now());
        assert_eq!(conflict_reason(&ctx), ConflictReason::DocumentDeleted);

        let mut ctx = eligible_context();
        ctx.document.status = DocumentStatus::Completed;
        assert_eq!(conflict_reason(&ctx), ConflictReason::DocumentNotPending);

        let mut ctx = eligible_context();
        ctx.recipient.signing_status = SigningStatus::Signed;
        assert_eq!(conflict_reason(&ctx), ConflictReason::RecipientAlreadySigned);

        let mut ctx = eligible_context();
        ctx.field.inserted = true;
        assert_eq!(conflict_reason(&ctx), ConflictReason::FieldAlreadyInserted);
    }

    #[test]
    fn deletion_takes_precedence_over_status_and_insertion() {
        let mut ctx = eligible_context();
        ctx.document.deleted_at = Some(Utc::now());
        ctx.document.status = DocumentStatus::Completed;
        ctx.field.inserted = true;
        assert_eq!(conflict_reason(&ctx), ConflictReason::DocumentDeleted);
    }
}
