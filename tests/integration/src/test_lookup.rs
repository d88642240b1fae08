//! Lookup outcome integration tests.

#[cfg(test)]
mod tests {
    use crate::{TestServer, http_client, local_config};

    async fn get(server: &TestServer, path: &str) -> (u16, serde_json::Value) {
        let resp = http_client()
            .get(server.url(path))
            .send()
            .await
            .expect("request");
        let status = resp.status().as_u16();
        let body = resp.json().await.expect("json body");
        (status, body)
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_address_without_record() {
        let server = TestServer::start(local_config()).await;
        let (status, body) = get(&server, "/location/192.168.1.1").await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "not found");
        assert_eq!(server.lookup_count(), 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_malformed_address() {
        let server = TestServer::start(local_config()).await;
        let (status, body) = get(&server, "/location/999.1.1.1").await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "invalid ip");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_resolve_ipv6_address() {
        let server = TestServer::start(local_config()).await;
        let (status, body) = get(&server, "/location/2001:4860:4860::8888").await;
        assert_eq!(status, 200);
        assert_eq!(body["code"], "US");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_answer_head_without_body() {
        let server = TestServer::start(local_config()).await;
        let resp = http_client()
            .head(server.url("/location/8.8.8.8"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").expect("content-type"),
            "application/json"
        );
        assert!(resp.bytes().await.expect("body").is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_serve_custom_lookup_path() {
        let mut config = local_config();
        config.lookup_path = "/geo/:ip/country".to_owned();
        let server = TestServer::start(config).await;

        let (status, body) = get(&server, "/geo/8.8.8.8/country").await;
        assert_eq!(status, 200);
        assert_eq!(body["code"], "US");

        let (status, _) = get(&server, "/location/8.8.8.8").await;
        assert_eq!(status, 404);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_tag_responses_with_request_id() {
        let server = TestServer::start(local_config()).await;
        let resp = http_client()
            .get(server.url("/location/8.8.8.8"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.headers().get("server").unwrap(), "geoip-server");
        assert!(resp.headers().get("x-request-id").is_some());
        server.stop().await;
    }
}
