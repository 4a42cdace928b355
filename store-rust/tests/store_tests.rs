use futures::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use veemee_sdk::{
    api::ApiContext,
    veemee_sdk_test::{MockCall, MockPersonasResult, MockVeemeeApi},
    ApiError, ContextRow, CredentialStore, DeletedFromState, MemoryCredentialStore, Persona,
    SkinId, WastebasketPolicy, ACTIVE_CONTEXT_KEY, JWT_KEY,
};
use veemee_store::{
    ContextPatch, ContextStore, FetchOptions, HydrationState, NewContext, StoreParams,
};

const TOKEN: &str = "test-token";

fn persona(id: i64, name: &str) -> Persona {
    Persona {
        id,
        display_name: name.to_string(),
        slug: name.to_lowercase(),
        task_count: 0,
        context_id: None,
    }
}

fn api_context(id: i64, name: &str, order: Option<i64>) -> ApiContext {
    ApiContext {
        id,
        name: Some(name.to_string()),
        order,
        ..ApiContext::default()
    }
}

fn signed_in() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_values([(JWT_KEY, TOKEN)]))
}

fn params(api: &Arc<MockVeemeeApi>, credentials: &Arc<MemoryCredentialStore>) -> StoreParams {
    ContextStore::builder(api.clone(), credentials.clone())
}

/// Store hydrated with the seed contexts (no token stored).
async fn seeded_store(api: &Arc<MockVeemeeApi>) -> (ContextStore, Arc<MemoryCredentialStore>) {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let store = params(api, &credentials).build();
    store.hydrate().await;
    (store, credentials)
}

/// Store hydrated from the API with the given contexts.
async fn loaded_store(
    api: &Arc<MockVeemeeApi>,
    contexts: Vec<ApiContext>,
) -> (ContextStore, Arc<MemoryCredentialStore>) {
    let credentials = signed_in();
    api.enqueue_contexts(Ok(contexts));
    let store = params(api, &credentials).build();
    store.hydrate().await;
    (store, credentials)
}

async fn persisted_active_id(credentials: &MemoryCredentialStore) -> Option<String> {
    credentials
        .get(ACTIVE_CONTEXT_KEY)
        .await
        .expect("read credential")
}

/// Polls until the persister has written `expected`.
async fn eventually_persisted(
    credentials: &MemoryCredentialStore,
    expected: Option<&str>,
) -> bool {
    for _ in 0..100 {
        if persisted_active_id(credentials).await.as_deref() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn ids(rows: &[ContextRow]) -> Vec<i64> {
    rows.iter().map(|row| row.id).collect()
}

#[tokio::test]
async fn new_store_exposes_loading_sentinel() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let store = params(&api, &credentials).build();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.hydration, HydrationState::Uninitialized);
    assert!(!snapshot.hydrated);
    assert!(!snapshot.contexts_loaded);
    assert_eq!(snapshot.contexts, vec![ContextRow::loading()]);
    assert_eq!(snapshot.active_context_id, None);
    assert!(store.visible_contexts().is_empty());
}

#[tokio::test]
async fn hydrate_without_token_uses_seed_contexts() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;

    let snapshot = store.snapshot();
    assert!(snapshot.hydrated);
    assert!(snapshot.contexts_loaded);
    assert_eq!(ids(&snapshot.contexts), vec![1, 2]);
    assert_eq!(snapshot.contexts[0].name, "Test 1");
    assert_eq!(snapshot.contexts[0].skin_id, SkinId::Tide);
    assert_eq!(snapshot.contexts[1].skin_id, SkinId::Geo);
    assert_eq!(snapshot.active_context_id, None);
    assert!(api.tracked_calls().is_empty());
}

#[tokio::test]
async fn hydrate_falls_back_to_seed_when_request_fails() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = signed_in();
    api.enqueue_contexts(Err(ApiError::InvalidInput("boom".to_string())));
    let store = params(&api, &credentials).build();

    store.hydrate().await;

    assert_eq!(ids(&store.contexts()), vec![1, 2]);
    assert_eq!(
        api.tracked_calls(),
        vec![MockCall::ListContexts {
            token: TOKEN.to_string()
        }]
    );
}

#[tokio::test]
async fn hydrate_falls_back_to_seed_when_response_is_malformed() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = signed_in();
    api.enqueue_contexts(Err(ApiError::Invariant(
        "veemee",
        "response has no contexts array".to_string(),
    )));
    let store = params(&api, &credentials).build();

    store.hydrate().await;

    assert_eq!(ids(&store.contexts()), vec![1, 2]);
}

#[tokio::test]
async fn hydrate_normalizes_and_sorts_contexts() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(
        &api,
        vec![
            api_context(3, "Work", Some(2)),
            ApiContext {
                id: 4,
                handle: Some("later".to_string()),
                skin_id: Some("tide".to_string()),
                ..ApiContext::default()
            },
            api_context(5, "Home", Some(1)),
        ],
    )
    .await;

    let contexts = store.contexts();
    assert_eq!(ids(&contexts), vec![5, 3, 4]);
    assert_eq!(contexts[2].name, "later");
    assert_eq!(contexts[2].skin_id, SkinId::Tide);
    assert_eq!(contexts[0].skin_id, SkinId::Simple);
}

#[tokio::test]
async fn hydrate_runs_once() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;

    store.hydrate().await;

    assert_eq!(api.tracked_calls().len(), 1);
    assert_eq!(ids(&store.contexts()), vec![1]);
}

#[tokio::test]
async fn failed_reload_keeps_loaded_contexts() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, credentials) = loaded_store(
        &api,
        vec![api_context(10, "Work", Some(1)), api_context(11, "Home", Some(2))],
    )
    .await;
    store.switch_context(11);
    assert!(eventually_persisted(&credentials, Some("11")).await);

    api.enqueue_contexts(Err(ApiError::Invariant(
        "veemee",
        "response has no contexts array".to_string(),
    )));
    store.reload_contexts().await;

    assert_eq!(ids(&store.contexts()), vec![10, 11]);
    assert_eq!(store.active_context_id(), Some(11));

    credentials.delete(JWT_KEY).await.expect("delete token");
    store.reload_contexts().await;

    assert_eq!(ids(&store.contexts()), vec![10, 11]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(persisted_active_id(&credentials).await.as_deref(), Some("11"));
}

#[tokio::test]
async fn successful_reload_replaces_contexts() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(10, "Work", Some(1))]).await;
    store.switch_context(10);

    api.enqueue_contexts(Ok(vec![api_context(12, "New", Some(1))]));
    store.reload_contexts().await;

    assert_eq!(ids(&store.contexts()), vec![12]);
    assert_eq!(store.active_context_id(), Some(12));
}

#[tokio::test]
async fn hydrate_restores_persisted_active_context() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::with_values([(
        ACTIVE_CONTEXT_KEY,
        "2",
    )]));
    let store = params(&api, &credentials).build();

    store.hydrate().await;

    assert_eq!(store.active_context_id(), Some(2));
    assert_eq!(
        store.active_context().map(|row| row.name),
        Some("Test 2".to_string())
    );
}

#[tokio::test]
async fn hydrate_falls_back_when_persisted_context_is_gone() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::with_values([(
        ACTIVE_CONTEXT_KEY,
        "42",
    )]));
    let store = params(&api, &credentials).build();

    store.hydrate().await;

    assert_eq!(store.active_context_id(), Some(1));
    assert!(eventually_persisted(&credentials, Some("1")).await);
}

#[tokio::test]
async fn hydrate_ignores_unreadable_persisted_id() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::with_values([(
        ACTIVE_CONTEXT_KEY,
        "not-a-number",
    )]));
    let store = params(&api, &credentials).build();

    store.hydrate().await;

    assert!(store.hydrated());
    assert_eq!(store.active_context_id(), None);
}

#[tokio::test]
async fn switch_context_ignores_unselectable_ids() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;

    store.switch_context(2);
    assert_eq!(store.active_context_id(), Some(2));

    store.switch_context(99);
    store.switch_context(ContextRow::LOADING_ID);
    assert_eq!(store.active_context_id(), Some(2));

    store.archive_context(1);
    store.switch_context(1);
    assert_eq!(store.active_context_id(), Some(2));
}

#[tokio::test]
async fn archiving_active_context_falls_back_to_lowest_order() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;
    store.switch_context(2);

    store.archive_context(2);

    assert_eq!(store.active_context_id(), Some(1));
    assert_eq!(ids(&store.archived_contexts()), vec![2]);
    assert_eq!(ids(&store.visible_contexts()), vec![1]);

    store.unarchive_context(2);
    assert!(store.archived_contexts().is_empty());
    assert_eq!(store.active_context_id(), Some(1));
}

#[tokio::test]
async fn archiving_last_visible_context_clears_selection() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;
    store.switch_context(1);

    store.archive_context(2);
    store.archive_context(1);

    assert_eq!(store.active_context_id(), None);
    assert!(store.active_context().is_none());
}

#[tokio::test]
async fn create_context_takes_next_id_and_becomes_active() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(
        &api,
        vec![api_context(5, "Five", Some(1)), api_context(7, "Seven", Some(2))],
    )
    .await;

    let id = store.create_context(NewContext::new("Eight"));

    assert_eq!(id, 8);
    assert_eq!(store.active_context_id(), Some(8));
    let created = store.context(8).expect("created context");
    assert_eq!(created.name, "Eight");
    assert_eq!(created.skin_id, SkinId::Simple);
    assert!(created.is_visible());
}

#[tokio::test]
async fn create_context_counts_hidden_rows() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;
    store.delete_context(2);

    let id = store.create_context(NewContext::new("Next").skin_id(SkinId::Geo).order(0));

    assert_eq!(id, 3);
    let created = store.context(3).expect("created context");
    assert_eq!(created.skin_id, SkinId::Geo);
    assert_eq!(created.order, Some(0));
}

#[tokio::test]
async fn update_context_merges_set_fields() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;

    store.update_context(1, ContextPatch::default().name("Renamed").order(None));
    store.update_context(99, ContextPatch::default().name("Ghost"));

    let row = store.context(1).expect("context 1");
    assert_eq!(row.name, "Renamed");
    assert_eq!(row.order, None);
    assert_eq!(row.skin_id, SkinId::Tide);
    assert!(store.context(99).is_none());
}

#[tokio::test]
async fn delete_and_restore_return_context_to_previous_state() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;
    store.switch_context(1);

    store.archive_context(1);
    store.delete_context(1);

    let deleted = store.context(1).expect("deleted row");
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());
    assert_eq!(deleted.deleted_from_state, Some(DeletedFromState::Archived));
    assert_eq!(ids(&store.wastebasket()), vec![1]);
    assert!(store.archived_contexts().is_empty());
    assert_eq!(store.active_context_id(), Some(2));

    store.restore_context(1);

    let restored = store.context(1).expect("restored row");
    assert!(restored.is_archived);
    assert!(!restored.is_deleted);
    assert_eq!(restored.deleted_at, None);
    assert_eq!(restored.deleted_from_state, None);
    assert!(store.wastebasket().is_empty());
}

#[tokio::test]
async fn deleting_twice_keeps_first_deletion() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;

    store.delete_context(2);
    let first = store.context(2).and_then(|row| row.deleted_at);
    store.delete_context(2);
    store.delete_context(99);

    let row = store.context(2).expect("row");
    assert_eq!(row.deleted_at, first);
    assert_eq!(row.deleted_from_state, Some(DeletedFromState::Active));
}

#[tokio::test]
async fn purge_removes_context_and_falls_back() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;
    store.switch_context(1);

    store.delete_context(1);
    store.purge_context(1);

    assert!(store.context(1).is_none());
    assert!(store.wastebasket().is_empty());
    assert_eq!(store.active_context_id(), Some(2));
}

#[tokio::test]
async fn wastebasket_policy_is_stored() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let store = params(&api, &credentials)
        .wastebasket_policy(WastebasketPolicy {
            retention_days: Some(30),
        })
        .build();
    assert_eq!(store.wastebasket_policy().retention_days, Some(30));

    store.set_wastebasket_policy(WastebasketPolicy::default());

    assert_eq!(store.snapshot().wastebasket_policy.retention_days, None);
}

#[tokio::test]
async fn active_selection_is_persisted_after_hydration() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, credentials) = seeded_store(&api).await;

    store.switch_context(2);
    assert!(eventually_persisted(&credentials, Some("2")).await);

    store.archive_context(1);
    store.archive_context(2);
    assert!(eventually_persisted(&credentials, None).await);
}

#[tokio::test]
async fn selection_is_not_persisted_before_hydration() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let store = params(&api, &credentials).build();

    store.create_context(NewContext::new("Early"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(persisted_active_id(&credentials).await, None);
}

#[tokio::test]
async fn flush_writes_current_selection() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let store = params(&api, &credentials).build();
    store.create_context(NewContext::new("Early"));

    store.flush().await;

    assert_eq!(persisted_active_id(&credentials).await.as_deref(), Some("1"));
}

#[tokio::test]
async fn snapshots_stream_yields_current_and_updates() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;
    let mut snapshots = store.snapshots();

    let first = snapshots.next().await.expect("current snapshot");
    assert_eq!(first.active_context_id, None);

    store.switch_context(2);
    let next = snapshots.next().await.expect("updated snapshot");
    assert_eq!(next.active_context_id, Some(2));
    assert_eq!(next.active_context.map(|row| row.id), Some(2));
}

#[tokio::test]
async fn fresh_personas_are_not_refetched() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.reset();
    api.set_personas(1, vec![persona(10, "Writer")]);

    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;

    assert_eq!(api.tracked_persona_context_ids(), vec![1]);
    assert_eq!(store.personas_for(1), vec![persona(10, "Writer")]);
    assert!(store.snapshot().personas_fetched_at.contains_key(&1));

    store.fetch_personas_for_context(1, FetchOptions::force()).await;

    assert_eq!(api.tracked_persona_context_ids(), vec![1, 1]);
}

#[tokio::test]
async fn expired_personas_are_refetched() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = signed_in();
    api.enqueue_contexts(Ok(vec![api_context(1, "One", Some(1))]));
    let store = params(&api, &credentials)
        .persona_ttl(Duration::from_millis(20))
        .build();
    store.hydrate().await;
    api.set_personas(1, vec![persona(10, "Writer")]);

    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;

    assert_eq!(api.tracked_persona_context_ids(), vec![1, 1]);
}

#[tokio::test]
async fn loading_flag_is_set_while_fetching() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.enqueue_personas(
        1,
        MockPersonasResult::personas(vec![persona(10, "Writer")])
            .delayed(Duration::from_millis(50)),
    );

    assert!(!store.is_loading_personas(1));
    tokio::join!(
        store.fetch_personas_for_context(1, FetchOptions::default()),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(store.is_loading_personas(1));
            assert!(store.snapshot().is_loading_personas(1));
        }
    );

    assert!(!store.is_loading_personas(1));
    assert_eq!(store.personas_for(1), vec![persona(10, "Writer")]);
}

#[tokio::test]
async fn concurrent_fetches_for_same_context_share_one_request() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.set_personas(1, vec![persona(10, "Writer")])
        .set_latency(Some(Duration::from_millis(30)));

    tokio::join!(
        store.fetch_personas_for_context(1, FetchOptions::default()),
        store.fetch_personas_for_context(1, FetchOptions::force()),
    );

    assert_eq!(api.tracked_persona_context_ids(), vec![1]);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_personas() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.enqueue_personas(1, vec![persona(10, "Writer")])
        .enqueue_personas(
            1,
            MockPersonasResult::error(ApiError::InvalidInput("offline".to_string())),
        );

    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    let fetched_at = store.snapshot().personas_fetched_at.get(&1).copied();
    store.fetch_personas_for_context(1, FetchOptions::force()).await;

    assert_eq!(store.personas_for(1), vec![persona(10, "Writer")]);
    assert_eq!(store.snapshot().personas_fetched_at.get(&1).copied(), fetched_at);
    assert!(!store.is_loading_personas(1));
}

#[tokio::test]
async fn fetch_without_token_caches_empty_list() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = seeded_store(&api).await;

    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;

    assert!(api.tracked_calls().is_empty());
    assert!(store.personas_for(1).is_empty());
    assert!(store.snapshot().personas_fetched_at.contains_key(&1));
}

#[tokio::test]
async fn fetch_ignores_non_positive_ids() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.reset();

    store
        .fetch_personas_for_context(0, FetchOptions::force())
        .await;
    store
        .fetch_personas_for_context(ContextRow::LOADING_ID, FetchOptions::force())
        .await;

    assert!(api.tracked_calls().is_empty());
    assert!(store.snapshot().personas_loading_by_context_id.is_empty());
}

#[tokio::test]
async fn prefetch_bounds_concurrency_and_dedups() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(
        &api,
        (1..=5)
            .map(|id| api_context(id, &format!("Context {id}"), Some(id)))
            .collect(),
    )
    .await;
    api.reset();
    for id in 1..=5 {
        api.set_personas(id, vec![persona(id * 10, "Writer")]);
    }
    api.set_latency(Some(Duration::from_millis(20)));

    store
        .prefetch_personas_for_contexts([1, 2, 3, 2, 4, 0, -1, 5, 1])
        .await;

    let mut fetched = api.tracked_persona_context_ids();
    fetched.sort_unstable();
    assert_eq!(fetched, vec![1, 2, 3, 4, 5]);
    assert!(api.max_in_flight() <= 3);
    assert_eq!(api.max_in_flight(), 3);
    for id in 1..=5 {
        assert_eq!(store.personas_for(id), vec![persona(id * 10, "Writer")]);
    }
}

#[tokio::test]
async fn prefetch_honours_configured_concurrency() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = signed_in();
    api.enqueue_contexts(Ok(vec![]));
    let store = params(&api, &credentials).prefetch_concurrency(1).build();
    store.hydrate().await;
    for id in 1..=4 {
        api.set_personas(id, vec![]);
    }
    api.set_latency(Some(Duration::from_millis(5)));

    store.prefetch_personas_for_contexts(1..=4).await;

    assert_eq!(api.tracked_persona_context_ids(), vec![1, 2, 3, 4]);
    assert_eq!(api.max_in_flight(), 1);
}

#[tokio::test]
async fn response_for_purged_context_is_discarded() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(
        &api,
        vec![api_context(1, "One", Some(1)), api_context(2, "Two", Some(2))],
    )
    .await;
    api.enqueue_personas(
        2,
        MockPersonasResult::personas(vec![persona(20, "Stale")])
            .delayed(Duration::from_millis(50)),
    );

    tokio::join!(
        store.fetch_personas_for_context(2, FetchOptions::default()),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.purge_context(2);
        }
    );

    assert!(store.personas_for(2).is_empty());
    assert!(!store.snapshot().personas_fetched_at.contains_key(&2));
    assert!(!store.is_loading_personas(2));
}

#[tokio::test]
async fn invalidated_personas_are_refetched() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.set_personas(1, vec![persona(10, "Writer")]);

    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    store.invalidate_personas(1);
    assert!(store.personas_for(1).is_empty());
    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;

    assert_eq!(api.tracked_persona_context_ids(), vec![1, 1]);
    assert_eq!(store.personas_for(1), vec![persona(10, "Writer")]);
}

#[tokio::test]
async fn cancelled_fetch_releases_loading_flag() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.enqueue_personas(
        1,
        MockPersonasResult::personas(vec![persona(10, "Writer")])
            .delayed(Duration::from_secs(5)),
    );
    let cancel = CancellationToken::new();

    tokio::join!(
        store.fetch_personas_for_context(1, FetchOptions::default().with_cancel(cancel.clone())),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        }
    );

    assert!(!store.is_loading_personas(1));
    assert!(store.personas_for(1).is_empty());
    assert!(!store.snapshot().personas_fetched_at.contains_key(&1));
    assert_eq!(api.in_flight(), 0);
}

#[tokio::test]
async fn dropped_fetch_releases_loading_flag() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, _) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    api.enqueue_personas(
        1,
        MockPersonasResult::personas(vec![persona(10, "Writer")])
            .delayed(Duration::from_secs(5)),
    );

    let result = tokio::time::timeout(
        Duration::from_millis(10),
        store.fetch_personas_for_context(1, FetchOptions::default()),
    )
    .await;

    assert!(result.is_err());
    assert!(!store.is_loading_personas(1));

    api.set_personas(1, vec![persona(11, "Editor")]);
    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    assert_eq!(store.personas_for(1), vec![persona(11, "Editor")]);
}

#[tokio::test]
async fn sign_out_drops_token_personas_and_session() {
    let api = Arc::new(MockVeemeeApi::new());
    let (store, credentials) = loaded_store(&api, vec![api_context(1, "One", Some(1))]).await;
    store.switch_context(1);
    api.set_personas(1, vec![persona(10, "Writer")]);
    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    assert!(store.session().take_intro());

    store.sign_out().await.expect("sign out");

    assert_eq!(credentials.get(JWT_KEY).await.expect("read"), None);
    assert!(store.personas_for(1).is_empty());
    assert!(store.snapshot().personas_by_context_id.is_empty());
    assert!(!store.session().intro_shown());
    assert_eq!(ids(&store.contexts()), vec![1]);
    assert_eq!(store.active_context_id(), Some(1));

    store
        .fetch_personas_for_context(1, FetchOptions::default())
        .await;
    assert_eq!(api.tracked_persona_context_ids(), vec![1]);
    assert!(store.snapshot().personas_fetched_at.contains_key(&1));
}

#[tokio::test]
async fn intro_is_shown_once_per_session() {
    let api = Arc::new(MockVeemeeApi::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let store = params(&api, &credentials).build();

    assert!(store.session().take_intro());
    assert!(!store.session().take_intro());
    assert!(store.clone().session().intro_shown());

    let other = params(&api, &credentials).build();
    assert!(other.session().take_intro());
}
