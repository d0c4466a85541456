//! Decision procedure through the engine facade

mod common;

use common::{init_tracing, team_doc_config, team_doc_data, FailingStore, Host};
use sacl_authz::{
    AccessContext, AclStore, AuthzError, DecisionReason, OwnerRef, PolicyRegistry, Security,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

async fn engine_with(store: &FailingStore) -> Security {
    Security::new(
        team_doc_config(),
        Arc::new(store.clone()),
        Arc::new(team_doc_data()),
    )
    .await
    .unwrap()
}

// ============================================================================
// DECISION CONTENTS
// ============================================================================

#[tokio::test]
async fn test_decision_records_action_and_scopes() {
    init_tracing();
    let host = Host::new().await;
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();

    let ctx = AccessContext::new("Doc", "create")
        .with_principal("u")
        .with_payload(json!({"id": "d1", "teamId": "t1"}));
    let decision = host.security.evaluate(&ctx).await.unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.reason, DecisionReason::Granted);
    assert_eq!(decision.action.as_deref(), Some("DOC:MANAGE"));
    assert_eq!(decision.current_owner, Some(OwnerRef::new("Team", "t1")));
    assert_eq!(decision.target_owner, Some(OwnerRef::new("Team", "t1")));
}

#[tokio::test]
async fn test_update_uses_write_action() {
    let host = Host::new().await;
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();
    host.create("Doc", "u", json!({"id": "d1", "teamId": "t1"}))
        .await
        .unwrap();
    host.assign("v", "member", &OwnerRef::new("Team", "t1")).await;

    let update = AccessContext::new("Doc", "updateAttributes")
        .with_instance("d1")
        .with_principal("v")
        .with_payload(json!({"title": "x"}));
    let decision = host.security.evaluate(&update).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.action.as_deref(), Some("DOC:WRITE"));
    assert_eq!(decision.reason, DecisionReason::DeniedInCurrent);

    let update = update.with_principal("u");
    assert!(host.security.decide(&update).await.unwrap());
}

#[tokio::test]
async fn test_moving_a_document_needs_both_teams() {
    let host = Host::new().await;
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();
    host.create("Team", "w", json!({"id": "t2"})).await.unwrap();
    host.create("Doc", "u", json!({"id": "d1", "teamId": "t1"}))
        .await
        .unwrap();

    let mv = AccessContext::new("Doc", "updateAttributes")
        .with_instance("d1")
        .with_principal("u")
        .with_payload(json!({"teamId": "t2"}));
    let decision = host.security.evaluate(&mv).await.unwrap();
    assert_eq!(decision.reason, DecisionReason::DeniedInTarget);

    host.assign("u", "manager", &OwnerRef::new("Team", "t2")).await;
    let decision = host.security.evaluate(&mv).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.target_owner, Some(OwnerRef::new("Team", "t2")));
}

#[tokio::test]
async fn test_user_acts_on_itself() {
    let host = Host::new().await;

    let ctx = AccessContext::new("User", "updateAttributes")
        .with_instance("u")
        .with_principal("u");
    let decision = host.security.evaluate(&ctx).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.reason, DecisionReason::SelfAccess);

    let other = AccessContext::new("User", "updateAttributes")
        .with_instance("v")
        .with_principal("u");
    assert!(!host.security.decide(&other).await.unwrap());
}

#[tokio::test]
async fn test_note_scoped_by_polymorphic_owner() {
    let host = Host::new().await;
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();

    let ctx = AccessContext::new("Note", "create")
        .with_principal("u")
        .with_payload(json!({"id": "n1", "ownerType": "Team", "ownerId": "t1"}));
    let decision = host.security.evaluate(&ctx).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.action.as_deref(), Some("NOTE:MANAGE"));

    // Notes owned by the user itself short-circuit
    let own = AccessContext::new("Note", "create")
        .with_principal("v")
        .with_payload(json!({"id": "n2", "owner": "User:v"}));
    let decision = host.security.evaluate(&own).await.unwrap();
    assert_eq!(decision.reason, DecisionReason::SelfAccess);
}

// ============================================================================
// FAIL-OPEN
// ============================================================================

#[tokio::test]
async fn test_fail_open_is_counted() {
    let host = Host::new().await;
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();
    host.create("Doc", "u", json!({"id": "d0"})).await.unwrap();

    let metrics = host.security.get_metrics().await.unwrap();
    assert_eq!(metrics.fail_open, 1);
    assert_eq!(metrics.total_decisions, 2);

    let prometheus = host.security.export_prometheus().await.unwrap();
    assert!(prometheus.contains("sacl_fail_open_total 1"));
}

#[tokio::test]
async fn test_fail_closed_rejects_unresolved_owner() {
    let mut config = team_doc_config();
    config.fail_open_on_unresolved = false;
    let host = Host::with_config(config).await;

    // Founding a team does not depend on fail-open
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();
    let metrics = host.security.get_metrics().await.unwrap();
    assert_eq!(metrics.fail_open, 0);

    let err = host
        .create("Doc", "u", json!({"id": "d0"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::AccessDenied { .. }));

    // Admins still pass
    host.make_admin("root").await;
    host.create("Doc", "root", json!({"id": "d0"})).await.unwrap();
}

// ============================================================================
// STORE FAILURES
// ============================================================================

#[tokio::test]
async fn test_is_allowed_failure_propagates() {
    init_tracing();
    let store = FailingStore::new();
    let security = engine_with(&store).await;
    security
        .after_create("Team", &json!({"id": "t1"}), Some("u"))
        .await
        .unwrap();

    store.fail_is_allowed.store(true, Ordering::SeqCst);
    let ctx = AccessContext::new("Doc", "create")
        .with_principal("u")
        .with_payload(json!({"teamId": "t1"}));

    let err = security.evaluate(&ctx).await.unwrap_err();
    assert!(matches!(err, AuthzError::Store(_)));

    let metrics = security.get_metrics().await.unwrap();
    assert_eq!(metrics.error_count, 1);
    assert_eq!(metrics.total_decisions, 0);
}

#[tokio::test]
async fn test_has_role_failure_propagates() {
    let store = FailingStore::new();
    let security = engine_with(&store).await;

    store.fail_has_role.store(true, Ordering::SeqCst);
    let ctx = AccessContext::new("Doc", "create")
        .with_principal("u")
        .with_payload(json!({"teamId": "t1"}));

    assert!(matches!(
        security.decide(&ctx).await,
        Err(AuthzError::Store(_))
    ));
}

#[tokio::test]
async fn test_anonymous_needs_no_store() {
    let store = FailingStore::new();
    let security = engine_with(&store).await;
    store.fail_has_role.store(true, Ordering::SeqCst);
    store.fail_is_allowed.store(true, Ordering::SeqCst);

    let ctx = AccessContext::new("Doc", "find");
    let decision = security.evaluate(&ctx).await.unwrap();
    assert_eq!(decision.reason, DecisionReason::Anonymous);
}

// ============================================================================
// POLICY REGISTRY AND INTERCEPTORS
// ============================================================================

#[tokio::test]
async fn test_authorize_maps_denial_to_error() {
    let host = Host::new().await;
    let ctx = AccessContext::new("Doc", "deleteById")
        .with_instance("missing")
        .with_principal("v")
        .with_payload(json!({"teamId": "t9"}));

    match host.security.authorize(&ctx).await {
        Err(AuthzError::AccessDenied {
            principal, method, ..
        }) => {
            assert_eq!(principal, "v");
            assert_eq!(method, "deleteById");
        }
        other => panic!("expected AccessDenied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_installed_policy_decides_for_dynamic_role() {
    let host = Host::new().await;
    let registry = PolicyRegistry::new();
    host.security.install(&registry).await.unwrap();
    assert_eq!(registry.roles().await, vec!["$sacl"]);

    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();
    let ctx = AccessContext::new("Doc", "create")
        .with_principal("u")
        .with_payload(json!({"teamId": "t1"}));
    assert!(registry.decide("$sacl", &ctx).await.unwrap());
    assert!(!registry
        .decide("$sacl", &ctx.clone().with_principal("v"))
        .await
        .unwrap());

    // One policy per role
    assert!(host.security.install(&registry).await.is_err());
}

#[tokio::test]
async fn test_rejected_write_is_not_provisioned() {
    let host = Host::new().await;
    host.create("Team", "u", json!({"id": "t1"})).await.unwrap();

    let ctx = AccessContext::new("Doc", "create")
        .with_principal("v")
        .with_payload(json!({"id": "d1", "teamId": "t1"}));
    assert!(host.chain.before_write(&ctx).await.is_err());

    let roles = host
        .acl
        .find_roles(&OwnerRef::new("Team", "t1"), &["member".to_string()])
        .await
        .unwrap();
    assert!(host
        .acl
        .granted_actions(&roles[0], &OwnerRef::new("Doc", "d1"))
        .is_empty());
}
