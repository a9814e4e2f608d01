// Local relay forwards through the authenticated client.

#[cfg(test)]
mod test {
    use http::StatusCode;
    use serde_json::Value;

    use crate::config::settings::MetricsConfig;
    use crate::observability::metrics::get_metrics;
    use crate::server::server::{router, AppState};
    use crate::tests::common::{build_reqwest_client, spawn_axum, stale_client, Backend, FRESH_ACCESS};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn relay_attaches_and_refreshes_credentials() {
        let backend = Backend::new();
        let (backend_handle, backend_addr) = backend.spawn().await;
        let client = stale_client(backend_addr);

        let metrics_config = MetricsConfig { path: "/metrics".to_owned(), is_enabled: true };
        let app = router(AppState::new(get_metrics(), client.clone()), &metrics_config);
        let (relay_handle, relay_addr) = spawn_axum(app).await;
        let http = build_reqwest_client();

        let res = http
            .get(format!("http://{}/api/items/7?expand=true", relay_addr))
            .header("authorization", "Bearer from-the-browser")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["data"]["id"], "7");

        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(backend.calls_with("/items/7", FRESH_ACCESS), 1);
        assert_eq!(backend.calls_with("/items/7", "from-the-browser"), 0);

        let res = http
            .get(format!("http://{}/api/broken", relay_addr))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "boom");

        let session: Value = http
            .get(format!("http://{}/session", relay_addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(session["data"]["established"], true);

        let metrics = http
            .get(format!("http://{}/metrics", relay_addr))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(metrics.contains("tokenrelay_refresh_calls_total"));

        relay_handle.abort();
        backend_handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn relay_reports_expired_session_as_401_envelope() {
        let backend = Backend::new().refresh_status(StatusCode::UNAUTHORIZED);
        let (backend_handle, backend_addr) = backend.spawn().await;
        let client = stale_client(backend_addr);

        let app = router(AppState::new(get_metrics(), client.clone()), &MetricsConfig::default());
        let (relay_handle, relay_addr) = spawn_axum(app).await;

        let res = build_reqwest_client()
            .post(format!("http://{}/api/items/1", relay_addr))
            .json(&serde_json::json!({"name": "x"}))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().starts_with("session expired"));
        assert!(!client.store().is_established());

        relay_handle.abort();
        backend_handle.abort();
    }
}
