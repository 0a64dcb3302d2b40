use async_trait::async_trait;
use penmark_contracts::{
    ActionAuthEvidence, ActionAuthMethod, Document, DocumentAuthOptions, FieldType, Recipient,
    RecipientAuthOptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuthError {}

/// Which check is being performed. Reaching the pipeline at all is gated by
/// token possession, so this subsystem only ever issues `Action` checks;
/// `Access` exists for authorizers shared with a document-viewing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthActionKind {
    Access,
    Action,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub kind: AuthActionKind,
    pub document: &'a Document,
    pub recipient: &'a Recipient,
    /// Absent for unauthenticated public signing flows.
    pub user_id: Option<i64>,
    pub evidence: Option<&'a ActionAuthEvidence>,
}

/// External capability deciding whether a recipient may perform an action.
/// Implementations own the challenge mechanics (OTP stores, passkey
/// assertions); the pipeline only consumes the boolean.
#[async_trait]
pub trait RecipientAuthorizer: Send + Sync {
    async fn is_recipient_authorized(
        &self,
        request: AuthorizationRequest<'_>,
    ) -> Result<bool, AuthError>;
}

/// Recipient-level action auth overrides the document-level default; neither
/// present means no secondary credential is required.
pub fn derived_action_auth(
    document: Option<&DocumentAuthOptions>,
    recipient: Option<&RecipientAuthOptions>,
) -> Option<ActionAuthMethod> {
    recipient
        .and_then(|opts| opts.action_auth)
        .or_else(|| document.and_then(|opts| opts.global_action_auth))
}

/// The derivation above, overridden to "no requirement" for every field type
/// except SIGNATURE. Exhaustive so a new field type must take a position.
pub fn effective_action_auth(
    field_type: FieldType,
    document: Option<&DocumentAuthOptions>,
    recipient: Option<&RecipientAuthOptions>,
) -> Option<ActionAuthMethod> {
    match field_type {
        FieldType::Signature => derived_action_auth(document, recipient),
        FieldType::FreeSignature
        | FieldType::Date
        | FieldType::Email
        | FieldType::Name
        | FieldType::Text => None,
    }
}

/// Whether the supplied evidence satisfies a required method, for the methods
/// this crate can decide without an external challenge store.
pub fn evidence_satisfies(
    method: ActionAuthMethod,
    user_id: Option<i64>,
    evidence: Option<&ActionAuthEvidence>,
) -> Option<bool> {
    match method {
        ActionAuthMethod::Account => Some(user_id.is_some()),
        ActionAuthMethod::ExplicitNone => {
            Some(matches!(evidence, Some(ActionAuthEvidence::ExplicitNone)))
        }
        ActionAuthMethod::Passkey | ActionAuthMethod::TwoFactorAuth => None,
    }
}

/// Built-in authorizer covering the methods that need no challenge verifier.
/// PASSKEY and TWO_FACTOR_AUTH are refused here; deployments wanting them
/// supply their own `RecipientAuthorizer` backed by the challenge service.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidencePolicy;

#[async_trait]
impl RecipientAuthorizer for EvidencePolicy {
    async fn is_recipient_authorized(
        &self,
        request: AuthorizationRequest<'_>,
    ) -> Result<bool, AuthError> {
        let method = match request.kind {
            AuthActionKind::Action => derived_action_auth(
                request.document.auth_options.as_ref(),
                request.recipient.auth_options.as_ref(),
            ),
            // Access gating happens before a token resolves a field; no
            // access policy is modeled on these records.
            AuthActionKind::Access => None,
        };

        let Some(method) = method else {
            return Ok(true);
        };

        match evidence_satisfies(method, request.user_id, request.evidence) {
            Some(verdict) => Ok(verdict),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_action_auth_overrides_document_level() {
        let document = DocumentAuthOptions {
            global_action_auth: Some(ActionAuthMethod::TwoFactorAuth),
        };
        let recipient = RecipientAuthOptions {
            action_auth: Some(ActionAuthMethod::Account),
        };

        assert_eq!(
            derived_action_auth(Some(&document), Some(&recipient)),
            Some(ActionAuthMethod::Account)
        );
        assert_eq!(
            derived_action_auth(Some(&document), None),
            Some(ActionAuthMethod::TwoFactorAuth)
        );
        assert_eq!(derived_action_auth(None, None), None);
    }

    #[test]
    fn only_signature_fields_carry_an_auth_requirement() {
        let document = DocumentAuthOptions {
            global_action_auth: Some(ActionAuthMethod::Account),
        };

        assert_eq!(
            effective_action_auth(FieldType::Signature, Some(&document), None),
            Some(ActionAuthMethod::Account)
        );

        for field_type in [
            FieldType::FreeSignature,
            FieldType::Date,
            FieldType::Email,
            FieldType::Name,
            FieldType::Text,
        ] {
            assert_eq!(
                effective_action_auth(field_type, Some(&document), None),
                None,
                "{} must be exempt from action auth",
                field_type.as_str()
            );
        }
    }

    #[test]
    fn evidence_satisfies_decides_local_methods_only() {
        assert_eq!(
            evidence_satisfies(ActionAuthMethod::Account, Some(7), None),
            Some(true)
        );
        assert_eq!(
            evidence_satisfies(ActionAuthMethod::Account, None, None),
            Some(false)
        );
        assert_eq!(
            evidence_satisfies(
                ActionAuthMethod::ExplicitNone,
                None,
                Some(&ActionAuthEvidence::ExplicitNone)
            ),
            Some(true)
        );
        assert_eq!(evidence_satisfies(ActionAuthMethod::Passkey, Some(7), None), None);
        assert_eq!(
            evidence_satisfies(ActionAuthMethod::TwoFactorAuth, Some(7), None),
            None
        );
    }
}
