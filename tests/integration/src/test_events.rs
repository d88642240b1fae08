//! Server event integration tests.

#[cfg(test)]
mod tests {
    use geoip_core::ServerEvent;

    use crate::{TestServer, http_client, local_config};

    #[tokio::test]
    async fn test_should_emit_listening_event_per_socket() {
        let server = TestServer::start(local_config()).await;
        let addr = server.running().plain_addr().expect("plain listener");

        let listening: Vec<_> = server
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Listening(l) => Some(l),
                ServerEvent::Lookup(_) => None,
            })
            .collect();
        assert_eq!(listening.len(), 1);
        assert!(!listening[0].uses_tls);
        assert_eq!(listening[0].port, addr.port());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_emit_lookup_event_with_request() {
        let server = TestServer::start(local_config()).await;

        let resp = http_client()
            .get(server.url("/location/8.8.8.8?lang=en"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);

        let lookups: Vec<_> = server
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Lookup(l) => Some(l),
                ServerEvent::Listening(_) => None,
            })
            .collect();
        assert_eq!(lookups.len(), 1);
        let event = &lookups[0];
        assert_eq!(event.ip, "8.8.8.8");
        assert_eq!(event.geo.code, "US");
        assert_eq!(event.request.query("lang"), Some("en"));
        assert!(event.request.remote_addr.is_some());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_not_emit_lookup_event_on_rejection() {
        let mut config = local_config();
        config.secret_key = Some("abc".to_owned());
        let server = TestServer::start(config).await;

        for path in ["/location/8.8.8.8", "/location/8.8.8.8?signature=0000"] {
            let resp = http_client()
                .get(server.url(path))
                .send()
                .await
                .expect("request");
            assert_eq!(resp.status(), 400);
        }
        assert_eq!(server.lookup_count(), 0);

        server.stop().await;
    }
}
