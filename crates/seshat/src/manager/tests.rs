use std::sync::Arc;

use async_trait::async_trait;
use seshat_core::{RecordId, SessionData, SessionRecord, SessionToken, StoredSessionRecord};
use seshat_db::{BackendSnafu, Database, MemRecordStore, StoreResult};
use seshat_util_error::BoxedErrorResult;
use tempfile::tempdir;

use super::*;
use crate::config::MaxAge;
use crate::gate::{AuthorizationGate, DenyReason, Outcome, Principal};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

fn mem_manager(max_age: MaxAge) -> SessionManager<MemRecordStore> {
    SessionManager::builder()
        .store(MemRecordStore::new())
        .config(SessionConfig::builder().max_age(max_age).build())
        .build()
}

fn admin_data() -> SessionData {
    let mut data = SessionData::new();
    data.insert("role".into(), serde_json::json!("admin"));
    data
}

async fn created_at(
    manager: &SessionManager<impl RecordStore>,
    token: &SessionToken,
) -> BoxedErrorResult<Timestamp> {
    Ok(manager.store().find_by_token(token).await?[0].inner.created_at)
}

/// Store that is always down
#[derive(Debug)]
struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert(&self, _record: SessionRecord) -> StoreResult<RecordId> {
        BackendSnafu { msg: "store is down" }.fail()
    }

    async fn find_by_token(&self, _token: &SessionToken) -> StoreResult<Vec<StoredSessionRecord>> {
        BackendSnafu { msg: "store is down" }.fail()
    }

    async fn delete_by_ids(&self, _ids: &[RecordId]) -> StoreResult<Vec<RecordId>> {
        BackendSnafu { msg: "store is down" }.fail()
    }

    async fn find_created_before(
        &self,
        _cutoff: Timestamp,
        _limit: usize,
    ) -> StoreResult<Vec<StoredSessionRecord>> {
        BackendSnafu { msg: "store is down" }.fail()
    }

    async fn count(&self) -> StoreResult<usize> {
        BackendSnafu { msg: "store is down" }.fail()
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn session_lifecycle() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::default());

    let token = manager.create_session("alice", Some(admin_data())).await?;
    assert!(token.is_well_formed());

    assert_eq!(
        manager.validate_session(&token).await?,
        Validation::valid("alice".into(), Some(admin_data()))
    );

    assert_eq!(
        manager.delete_session(&token).await?,
        Deletion { removed_count: 1 }
    );
    assert_eq!(
        manager.validate_session(&token).await?,
        Validation::invalid()
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn identical_requests_get_distinct_tokens() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::default());

    let a = manager.create_session("alice", Some(admin_data())).await?;
    let b = manager.create_session("alice", Some(admin_data())).await?;
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), seshat_core::TOKEN_LEN);
    assert_eq!(manager.count_sessions().await?, 2);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn empty_username_is_rejected_before_storage() -> BoxedErrorResult<()> {
    let manager = SessionManager::builder().store(FailingStore).build();

    let res = manager.create_session("", None).await;
    assert!(matches!(res, Err(SessionError::EmptyUsername)));

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unknown_and_empty_tokens_are_invalid() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::default());
    manager.create_session("alice", None).await?;

    assert!(!manager.validate_session(&"nope".into()).await?.is_valid());
    assert!(!manager.validate_session(&"".into()).await?.is_valid());
    assert_eq!(manager.delete_session(&"nope".into()).await?.removed_count, 0);
    assert_eq!(manager.delete_session(&"".into()).await?.removed_count, 0);
    assert_eq!(manager.count_sessions().await?, 1);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn session_expires_exactly_at_max_age() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::from_days(1));
    let token = manager.create_session("alice", None).await?;
    let created = created_at(&manager, &token).await?;

    let at = |offset_ms: u64| Timestamp::from_unix_millis(created.as_unix_millis() + offset_ms);

    assert!(manager.validate_session_at(&token, at(0)).await?.is_valid());
    assert!(
        manager
            .validate_session_at(&token, at(DAY_MS - 1))
            .await?
            .is_valid()
    );
    assert!(
        !manager
            .validate_session_at(&token, at(DAY_MS))
            .await?
            .is_valid()
    );
    assert!(
        !manager
            .validate_session_at(&token, at(DAY_MS * 365))
            .await?
            .is_valid()
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn session_from_the_future_is_valid() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::from_secs(1));
    let token = manager.create_session("alice", None).await?;
    let created = created_at(&manager, &token).await?;

    let before = Timestamp::from_unix_millis(created.as_unix_millis() - 10_000);
    assert!(manager.validate_session_at(&token, before).await?.is_valid());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn first_stored_record_decides() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::from_days(1));
    let now = Timestamp::now();

    let store = manager.store();
    store
        .insert(SessionRecord {
            token: "dup".into(),
            username: "old".into(),
            created_at: Timestamp::ZERO,
            data: None,
        })
        .await?;
    store
        .insert(SessionRecord {
            token: "dup".into(),
            username: "fresh".into(),
            created_at: now,
            data: None,
        })
        .await?;

    assert!(!manager.validate_session_at(&"dup".into(), now).await?.is_valid());

    // Delete takes out every record with the token
    assert_eq!(manager.delete_session(&"dup".into()).await?.removed_count, 2);
    assert_eq!(manager.count_sessions().await?, 0);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn sweep_removes_only_expired_records() -> BoxedErrorResult<()> {
    let manager = SessionManager::builder()
        .store(MemRecordStore::new())
        .config(
            SessionConfig::builder()
                .max_age(MaxAge::from_days(1))
                .sweep_batch_size(2)
                .build(),
        )
        .build();
    let now = Timestamp::from_unix_millis(100 * DAY_MS);

    for (i, age_ms) in [5 * DAY_MS, 2 * DAY_MS, DAY_MS, DAY_MS, DAY_MS - 1, 0]
        .into_iter()
        .enumerate()
    {
        manager
            .store()
            .insert(SessionRecord {
                token: SessionToken::from(format!("t{i}")),
                username: format!("user{i}"),
                created_at: Timestamp::from_unix_millis(now.as_unix_millis() - age_ms),
                data: None,
            })
            .await?;
    }

    let outcome = manager.sweep_at(now).await?;
    assert_eq!(
        outcome,
        SweepOutcome {
            scanned: 4,
            removed: 4
        }
    );
    assert_eq!(manager.count_sessions().await?, 2);
    for token in ["t4", "t5"] {
        assert!(manager.validate_session_at(&token.into(), now).await?.is_valid());
    }

    assert_eq!(manager.sweep_at(now).await?, SweepOutcome::default());

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn sweep_with_huge_max_age_is_a_noop() -> BoxedErrorResult<()> {
    let manager = mem_manager(MaxAge::default());
    manager
        .store()
        .insert(SessionRecord {
            token: "epoch".into(),
            username: "alice".into(),
            created_at: Timestamp::ZERO,
            data: None,
        })
        .await?;

    let outcome = manager.sweep_at(Timestamp::from_unix_millis(1_000)).await?;
    assert_eq!(outcome, SweepOutcome::default());
    assert_eq!(manager.count_sessions().await?, 1);

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn storage_failures_propagate() -> BoxedErrorResult<()> {
    let manager = SessionManager::builder().store(FailingStore).build();
    let token = SessionToken::from("whatever");

    assert!(matches!(
        manager.create_session("alice", None).await,
        Err(SessionError::Storage { .. })
    ));
    assert!(matches!(
        manager.validate_session(&token).await,
        Err(SessionError::Storage { .. })
    ));
    assert!(matches!(
        manager.delete_session(&token).await,
        Err(SessionError::Storage { .. })
    ));
    assert!(matches!(
        manager.sweep().await,
        Err(SessionError::Storage { .. })
    ));

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn gate_decisions() -> BoxedErrorResult<()> {
    let manager = Arc::new(mem_manager(MaxAge::default()));
    let gate = AuthorizationGate::new(manager.clone());

    let token = manager.create_session("alice", Some(admin_data())).await?;

    assert_eq!(
        gate.authorize(Some(token.as_str())).await,
        Outcome::Allow(Principal {
            username: "alice".into(),
            data: Some(admin_data()),
        })
    );
    assert_eq!(
        gate.authorize(None).await,
        Outcome::Deny(DenyReason::Unauthorized)
    );
    assert_eq!(
        gate.authorize(Some("")).await,
        Outcome::Deny(DenyReason::Unauthorized)
    );
    assert_eq!(
        gate.authorize(Some("not-a-token")).await,
        Outcome::Deny(DenyReason::Unauthorized)
    );

    manager.delete_session(&token).await?;
    assert_eq!(
        gate.authorize(Some(token.as_str())).await.into_result(),
        Err(DenyReason::Unauthorized)
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn gate_reports_storage_failure_as_internal_error() -> BoxedErrorResult<()> {
    let gate = AuthorizationGate::new(Arc::new(
        SessionManager::builder().store(FailingStore).build(),
    ));

    let outcome = gate.authorize(Some("whatever")).await;
    assert_eq!(outcome, Outcome::Deny(DenyReason::InternalError));
    assert_eq!(DenyReason::InternalError.as_str(), "internal_error");
    assert_eq!(DenyReason::Unauthorized.as_str(), "unauthorized");

    // No token means no store round trip, so no internal error either
    assert_eq!(
        gate.authorize(None).await,
        Outcome::Deny(DenyReason::Unauthorized)
    );

    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn works_on_top_of_redb() -> BoxedErrorResult<()> {
    let dir = tempdir()?;
    let db = Arc::new(Database::open(dir.path().join("sessions.redb")).await?);
    let manager = SessionManager::builder().store(db.clone()).build();

    let token = manager.create_session("alice", Some(admin_data())).await?;
    let validation = manager.validate_session(&token).await?;
    assert_eq!(validation.username.as_deref(), Some("alice"));
    assert_eq!(validation.data, Some(admin_data()));
    assert_eq!(db.count().await?, 1);

    assert_eq!(manager.delete_session(&token).await?.removed_count, 1);
    assert_eq!(db.count().await?, 0);

    Ok(())
}

#[test]
fn token_extraction_prefers_body() {
    use crate::gate::extract_token;

    assert_eq!(extract_token(Some("b"), Some("q")), Some("b"));
    assert_eq!(extract_token(Some(""), Some("q")), Some("q"));
    assert_eq!(extract_token(None, Some("q")), Some("q"));
    assert_eq!(extract_token(None, Some("")), None);
    assert_eq!(extract_token(None, None), None);
}

#[test]
fn json_session_data() {
    assert_eq!(session_data_from_json(r#"{"role":"admin"}"#).ok(), Some(admin_data()));
    assert!(matches!(
        session_data_from_json("[1,2]"),
        Err(SessionError::InvalidData { .. })
    ));
}
