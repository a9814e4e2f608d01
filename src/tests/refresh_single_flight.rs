// Concurrent 401s collapse into one refresh call, every parked request is
// replayed with the new access token.

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::task::JoinSet;
    use tokio::time::Instant;

    use crate::request::{ApiRequest, Envelope};
    use crate::tests::common::{
        stale_client, wait_until, Backend, FRESH_ACCESS, REFRESH_TOKEN, ROTATED_REFRESH_TOKEN,
    };
    use serde_json::Value;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn three_simultaneous_401s_refresh_once_and_replay_all() {
        let backend = Backend::new();
        let (handle, addr) = backend.spawn().await;
        let client = stale_client(addr);

        let mut set = JoinSet::new();
        for id in 1..=3 {
            let client = client.clone();
            set.spawn(async move { client.send(&ApiRequest::get(format!("/items/{}", id))).await });
        }
        while let Some(result) = set.join_next().await {
            let response = result.unwrap().expect("request should succeed after refresh");
            let envelope: Envelope<Value> = response.envelope().unwrap();
            assert!(envelope.success);
        }

        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(backend.calls_with("/items", FRESH_ACCESS), 3);
        assert_eq!(client.store().get_access().as_deref(), Some(FRESH_ACCESS));
        // no rotation from the backend, old refresh token kept
        assert_eq!(client.store().get_refresh().as_deref(), Some(REFRESH_TOKEN));
        assert!(!client.coordinator().is_refreshing());
        assert_eq!(client.coordinator().queue_len(), 0);

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_concurrent_401s_still_one_refresh() {
        let backend = Backend::new().rotating();
        let (handle, addr) = backend.spawn().await;
        let client = stale_client(addr);

        let mut set = JoinSet::new();
        for id in 0..25 {
            let client = client.clone();
            set.spawn(async move { client.send(&ApiRequest::get(format!("/items/{}", id))).await });
        }
        let mut succeeded = 0;
        while let Some(result) = set.join_next().await {
            assert!(result.unwrap().is_ok());
            succeeded += 1;
        }

        assert_eq!(succeeded, 25);
        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(client.store().get_refresh().as_deref(), Some(ROTATED_REFRESH_TOKEN));

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parked_requests_keep_observation_order() {
        let backend = Backend::new().refresh_delay(Duration::from_millis(600));
        let (handle, addr) = backend.spawn().await;
        let client = stale_client(addr);

        let mut handles = Vec::new();
        for (position, id) in ["a", "b", "c"].into_iter().enumerate() {
            let task_client = client.clone();
            handles.push(tokio::spawn(async move {
                task_client.send(&ApiRequest::get(format!("/items/{}", id))).await
            }));
            let coordinator = client.coordinator().clone();
            wait_until(|| coordinator.queue_len() == position + 1).await;
        }

        assert!(client.coordinator().is_refreshing());
        assert_eq!(
            client.coordinator().queued(),
            vec!["GET /items/a", "GET /items/b", "GET /items/c"]
        );

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(backend.refresh_count(), 1);
        // nothing was replayed before the refresh stored the new token
        for id in ["a", "b", "c"] {
            let auths = backend.authorizations(&format!("/items/{}", id));
            assert_eq!(auths.len(), 2);
            assert_eq!(auths[1].as_deref(), Some("Bearer access-fresh"));
        }

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn valid_requests_are_not_delayed_by_a_refresh() {
        let backend = Backend::new().refresh_delay(Duration::from_millis(1000));
        let (handle, addr) = backend.spawn().await;
        let client = stale_client(addr);

        let parked = {
            let client = client.clone();
            tokio::spawn(async move { client.send(&ApiRequest::get("/items/slow")).await })
        };
        let coordinator = client.coordinator().clone();
        wait_until(|| coordinator.is_refreshing()).await;

        let start = Instant::now();
        client.send(&ApiRequest::get("/open")).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(client.coordinator().is_refreshing());

        assert!(parked.await.unwrap().is_ok());
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn late_401_after_refresh_replays_without_second_refresh() {
        let backend = Backend::new().refresh_delay(Duration::from_millis(10));
        let (handle, addr) = backend.spawn().await;
        let client = stale_client(addr);

        client.send(&ApiRequest::get("/items/1")).await.unwrap();
        assert_eq!(backend.refresh_count(), 1);

        // a request that left with the old token before the refresh settled
        let late = ApiRequest::get("/items/2");
        let token = client
            .coordinator()
            .recover(&late, Some(crate::tests::common::STALE_ACCESS))
            .await
            .unwrap();

        assert_eq!(token, FRESH_ACCESS);
        assert_eq!(backend.refresh_count(), 1);
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separately_built_clients_refresh_independently() {
        let backend = Backend::new();
        let (handle, addr) = backend.spawn().await;
        let first = stale_client(addr);
        let second = stale_client(addr);

        first.send(&ApiRequest::get("/items/1")).await.unwrap();
        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(first.store().get_access().as_deref(), Some(FRESH_ACCESS));
        assert_eq!(
            second.store().get_access().as_deref(),
            Some(crate::tests::common::STALE_ACCESS)
        );
        assert!(!second.coordinator().is_refreshing());

        second.send(&ApiRequest::get("/items/2")).await.unwrap();
        assert_eq!(backend.refresh_count(), 2);
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn refreshed_pair_is_written_through_to_the_credential_file() {
        use crate::client::ApiClient;
        use crate::store::persistence::FilePersistence;
        use crate::store::{CredentialPair, CredentialStore};

        let backend = Backend::new().refresh_delay(Duration::from_millis(10));
        let (handle, addr) = backend.spawn().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::open(FilePersistence::new(&path)).unwrap();
        store.set(crate::tests::common::STALE_ACCESS, REFRESH_TOKEN);
        let client = ApiClient::builder(format!("http://{}", addr))
            .store(store)
            .build()
            .unwrap();

        client.send(&ApiRequest::get("/items/1")).await.unwrap();

        let reopened = CredentialStore::open(FilePersistence::new(&path)).unwrap();
        assert_eq!(reopened.get(), Some(CredentialPair::new(FRESH_ACCESS, REFRESH_TOKEN)));
        handle.abort();
    }
}
