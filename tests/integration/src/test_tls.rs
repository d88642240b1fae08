//! HTTPS listener integration tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geoip_core::ServerEvent;
    use tokio::net::TcpStream;

    use crate::{TestServer, TlsMaterial, http_client, https_client, https_url, local_config};

    #[tokio::test]
    async fn test_should_serve_same_pipeline_over_tls() {
        let material = TlsMaterial::generate().expect("generate certificates");
        let mut config = local_config();
        config.secret_key = Some("abc".to_owned());
        config.tls = Some(material.tls_config());
        let server = TestServer::start(config).await;

        let tls_addr = server.running().tls_addr().expect("tls listener");
        let client = https_client(&material.ca_der, tls_addr);

        let ok = client
            .get(https_url(
                tls_addr,
                "/location/8.8.8.8?signature=31eb70dfd0f63982e9f5e884e9efd124e0de7365",
            ))
            .send()
            .await
            .expect("https request");
        assert_eq!(ok.status(), 200);
        assert_eq!(
            ok.headers().get("content-type").expect("content-type"),
            "application/json"
        );
        let body: serde_json::Value = ok.json().await.expect("json body");
        assert_eq!(body["code"], "US");

        let rejected = client
            .get(https_url(tls_addr, "/location/8.8.8.8"))
            .send()
            .await
            .expect("https request");
        assert_eq!(rejected.status(), 400);

        // The plain listener serves alongside.
        let resp = http_client()
            .get(server.url("/location/8.8.8.8"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_emit_listening_events_for_both_listeners() {
        let material = TlsMaterial::generate().expect("generate certificates");
        let mut config = local_config();
        config.tls = Some(material.tls_config());
        let server = TestServer::start(config).await;

        let flags: Vec<bool> = server
            .events()
            .iter()
            .filter_map(|e| match e {
                ServerEvent::Listening(l) => Some(l.uses_tls),
                ServerEvent::Lookup(_) => None,
            })
            .collect();
        assert_eq!(flags, [true, false]);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_shut_down_with_idle_tls_connection() {
        let material = TlsMaterial::generate().expect("generate certificates");
        let mut config = local_config();
        config.tls = Some(material.tls_config());
        let server = TestServer::start(config).await;

        let tls_addr = server.running().tls_addr().expect("tls listener");
        let _idle = TcpStream::connect(tls_addr).await.expect("connect");
        // Let the listener accept the socket and start the handshake.
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(5), server.stop())
            .await
            .expect("shutdown completes with a stalled handshake");
    }
}
