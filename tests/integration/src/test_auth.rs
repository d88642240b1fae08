//! Signature authentication integration tests.

#[cfg(test)]
mod tests {
    use geoip_auth::sign;
    use geoip_core::ServerConfig;

    use crate::{TestServer, http_client};

    fn secured() -> ServerConfig {
        let mut config = crate::local_config();
        config.secret_key = Some("abc".to_owned());
        config
    }

    #[tokio::test]
    async fn test_should_reject_request_without_signature() {
        let server = TestServer::start(secured()).await;

        let resp = http_client()
            .get(server.url("/location/8.8.8.8"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["error"], "signature missing");
        assert_eq!(body["message"], "No signature specified in request.");
        assert_eq!(server.lookup_count(), 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_accept_known_signature() {
        let server = TestServer::start(secured()).await;

        let resp = http_client()
            .get(server.url(
                "/location/8.8.8.8?signature=31eb70dfd0f63982e9f5e884e9efd124e0de7365",
            ))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["code"], "US");
        assert_eq!(body["name"], "United States");
        assert_eq!(body["ipstart"], "8.8.8.0");
        assert_eq!(body["ipend"], "8.8.8.255");
        assert_eq!(server.lookup_count(), 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_wrong_signature() {
        let server = TestServer::start(secured()).await;

        let resp = http_client()
            .get(server.url("/location/8.8.8.8?signature=0000"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["error"], "invalid signature");
        assert_eq!(server.lookup_count(), 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_accept_signature_over_extra_params() {
        let server = TestServer::start(secured()).await;
        let tag = sign([("callback", "cb"), ("lang", "en")], "1.2.3.4", "abc");

        let resp = http_client()
            .get(server.url(&format!(
                "/location/1.2.3.4?lang=en&callback=cb&signature={tag}"
            )))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);

        let resp = http_client()
            .get(server.url(&format!(
                "/location/1.2.3.4?lang=fr&callback=cb&signature={tag}"
            )))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_accept_signature_header() {
        let server = TestServer::start(secured()).await;
        let tag = sign::<_, &str, &str>([], "8.8.8.8", "abc");

        let resp = http_client()
            .get(server.url("/location/8.8.8.8"))
            .header("x-signature", &tag)
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);

        let resp = http_client()
            .get(server.url("/location/8.8.8.8?signature=0000"))
            .header("x-signature", &tag)
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400, "query signature must win over header");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_serve_unsigned_requests_without_secret() {
        let server = TestServer::start(crate::local_config()).await;

        let resp = http_client()
            .get(server.url("/location/1.2.3.4"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["code"], "AU");

        server.stop().await;
    }
}
