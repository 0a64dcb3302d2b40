use penmark_auth::{AuthActionKind, AuthorizationRequest, EvidencePolicy, RecipientAuthorizer};
use penmark_contracts::{
    ActionAuthEvidence, ActionAuthMethod, Document, DocumentAuthOptions, DocumentStatus, Recipient,
    RecipientAuthOptions, RecipientRole, SigningStatus,
};

fn document(action_auth: Option<ActionAuthMethod>) -> Document {
    Document {
        id: 1,
        status: DocumentStatus::Pending,
        deleted_at: None,
        auth_options: Some(DocumentAuthOptions {
            global_action_auth: action_auth,
        }),
    }
}

fn recipient(action_auth: Option<ActionAuthMethod>) -> Recipient {
    Recipient {
        id: 10,
        document_id: 1,
        token: "tok_recipient".to_string(),
        email: "jane@example.com".to_string(),
        name: "Jane Doe".to_string(),
        role: RecipientRole::Signer,
        signing_status: SigningStatus::NotSigned,
        auth_options: action_auth.map(|method| RecipientAuthOptions {
            action_auth: Some(method),
        }),
    }
}

#[tokio::test]
async fn allows_when_no_method_is_required() {
    let document = document(None);
    let recipient = recipient(None);

    let authorized = EvidencePolicy
        .is_recipient_authorized(AuthorizationRequest {
            kind: AuthActionKind::Action,
            document: &document,
            recipient: &recipient,
            user_id: None,
            evidence: None,
        })
        .await
        .expect("policy should not error");

    assert!(authorized);
}

#[tokio::test]
async fn account_method_requires_an_acting_user() {
    let document = document(Some(ActionAuthMethod::Account));
    let recipient = recipient(None);

    let with_user = EvidencePolicy
        .is_recipient_authorized(AuthorizationRequest {
            kind: AuthActionKind::Action,
            document: &document,
            recipient: &recipient,
            user_id: Some(42),
            evidence: None,
        })
        .await
        .expect("policy should not error");
    assert!(with_user);

    let without_user = EvidencePolicy
        .is_recipient_authorized(AuthorizationRequest {
            kind: AuthActionKind::Action,
            document: &document,
            recipient: &recipient,
            user_id: None,
            evidence: None,
        })
        .await
        .expect("policy should not error");
    assert!(!without_user);
}

#[tokio::test]
async fn challenge_backed_methods_are_refused_without_a_verifier() {
    let document = document(None);
    let recipient = recipient(Some(ActionAuthMethod::TwoFactorAuth));

    let verdict = EvidencePolicy
        .is_recipient_authorized(AuthorizationRequest {
            kind: AuthActionKind::Action,
            document: &document,
            recipient: &recipient,
            user_id: Some(42),
            evidence: Some(&ActionAuthEvidence::TwoFactorAuth {
                token: "123456".to_string(),
            }),
        })
        .await
        .expect("policy should not error");

    assert!(!verdict, "2FA cannot be decided without the challenge store");
}

#[tokio::test]
async fn recipient_override_beats_document_default() {
    let document = document(Some(ActionAuthMethod::TwoFactorAuth));
    let recipient = recipient(Some(ActionAuthMethod::ExplicitNone));

    let verdict = EvidencePolicy
        .is_recipient_authorized(AuthorizationRequest {
            kind: AuthActionKind::Action,
            document: &document,
            recipient: &recipient,
            user_id: None,
            evidence: Some(&ActionAuthEvidence::ExplicitNone),
        })
        .await
        .expect("policy should not error");

    assert!(verdict);
}
