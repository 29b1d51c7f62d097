// src/client_tests.rs

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::KronosClient;
    use crate::config::KronosConfig;
    use crate::error::{user_message, KronosError};
    use crate::leave::{LeaveApi, LeaveStatus};

    fn config_for(server: &MockServer) -> KronosConfig {
        KronosConfig {
            api_base_url: server.uri(),
            token_url: format!("{}/oauth/token", server.uri()),
            client_id: "kronos-web".to_string(),
            client_secret: "segreto".to_string(),
            username: "mrossi".to_string(),
            password: "password".to_string(),
            request_timeout_secs: 5,
        }
    }

    async fn seeded_client(server: &MockServer) -> Arc<KronosClient> {
        let client = KronosClient::new(config_for(server)).expect("Failed to create test client");
        client
            .auth()
            .seed("valid-token", Some("refresh-1"), Utc::now() + Duration::hours(1))
            .await;
        client
    }

    fn leave_body(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "employee_id": "u1",
            "leave_type": "vacation",
            "start_date": "2026-09-07",
            "end_date": "2026-09-11",
            "status": status
        })
    }

    #[tokio::test]
    async fn test_validation_error_array_is_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/leaves/L1/cancel"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "errors": [
                    { "field": "reason", "message": "troppo corto" },
                    { "field": "start_date", "message": "nel passato" }
                ]
            })))
            .mount(&server)
            .await;

        let api = LeaveApi::new(seeded_client(&server).await);
        let result = api.cancel("L1", "motivo valido").await;

        match result {
            Err(e @ KronosError::Validation(_)) => {
                assert_eq!(
                    user_message(&e),
                    "reason: troppo corto; start_date: nel passato"
                );
            }
            other => panic!("Expected Validation error but got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detail_field_takes_domain_error_precedence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/leaves/L1/cancel"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "detail": "Saldo insufficiente" })),
            )
            .mount(&server)
            .await;

        let api = LeaveApi::new(seeded_client(&server).await);
        let result = api.cancel("L1", "motivo valido").await;

        match result {
            Err(KronosError::Api { message, .. }) => assert_eq!(message, "Saldo insufficiente"),
            other => panic!("Expected Api error but got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nested_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/leaves/L1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Richiesta malformata" }
            })))
            .mount(&server)
            .await;

        let api = LeaveApi::new(seeded_client(&server).await);
        match api.get("L1").await {
            Err(KronosError::Api { message, .. }) => assert_eq!(message, "Richiesta malformata"),
            other => panic!("Expected Api error but got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_maps_to_network_error() {
        // Nothing listens on this port.
        let config = KronosConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            token_url: "http://127.0.0.1:9/oauth/token".to_string(),
            client_id: "kronos-web".to_string(),
            client_secret: "segreto".to_string(),
            username: "mrossi".to_string(),
            password: "password".to_string(),
            request_timeout_secs: 2,
        };
        let client = KronosClient::new(config).unwrap();
        client
            .auth()
            .seed("valid-token", None, Utc::now() + Duration::hours(1))
            .await;

        let api = LeaveApi::new(client);
        match api.get("L1").await {
            Err(e @ KronosError::Request(_)) => {
                assert_eq!(user_message(&e), "Impossibile contattare il server");
            }
            other => panic!("Expected Request error but got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_401_triggers_refresh_and_single_retry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/leaves/L1"))
            .and(header("authorization", "Bearer stale-token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "refresh_token": "refresh-2",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/leaves/L1"))
            .and(header("authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(leave_body("L1", "pending")))
            .mount(&server)
            .await;

        let client = KronosClient::new(config_for(&server)).unwrap();
        client
            .auth()
            .seed("stale-token", Some("refresh-1"), Utc::now() + Duration::hours(1))
            .await;

        let api = LeaveApi::new(client);
        let request = api.get("L1").await.unwrap();
        assert_eq!(request.status, LeaveStatus::Pending);

        let token_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/oauth/token")
            .count();
        assert_eq!(token_calls, 1, "exactly one refresh round-trip");
    }

    #[tokio::test]
    async fn test_second_401_is_surfaced_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/leaves/L1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = KronosClient::new(config_for(&server)).unwrap();
        client
            .auth()
            .seed("stale-token", Some("refresh-1"), Utc::now() + Duration::hours(1))
            .await;

        let api = LeaveApi::new(client);
        match api.get("L1").await {
            Err(KronosError::Api { status, .. }) => assert_eq!(status.as_u16(), 401),
            other => panic!("Expected Api error but got: {:?}", other),
        }

        let api_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/api/v1/leaves/L1")
            .count();
        assert_eq!(api_calls, 2, "one original call plus one replay, never more");
    }

    #[tokio::test]
    async fn test_proactive_refresh_before_decoded_expiry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "refresh_token": "refresh-2",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/leaves/L1"))
            .and(header("authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(leave_body("L1", "pending")))
            .mount(&server)
            .await;

        let client = KronosClient::new(config_for(&server)).unwrap();
        // Expires in 5 s: inside the 10 s proactive buffer, so the client
        // must renew before sending the API call.
        client
            .auth()
            .seed("old-token", Some("refresh-1"), Utc::now() + Duration::seconds(5))
            .await;

        let api = LeaveApi::new(client);
        let request = api.get("L1").await.unwrap();
        assert_eq!(request.id, "L1");

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].url.path(), "/oauth/token", "token renewal came first");
    }
}
