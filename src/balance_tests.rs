// src/balance_tests.rs

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::balance::{
        apply_transactions, BalanceAdjustment, BalanceTransaction, BalanceType, LeaveBalance,
        WalletController,
    };
    use crate::cache::{CacheScope, QueryCache};
    use crate::client::KronosClient;
    use crate::config::KronosConfig;
    use crate::error::KronosError;
    use crate::notify::{RecordingNotifier, ToastLevel};

    fn transaction(id: &str, amount: f64) -> BalanceTransaction {
        BalanceTransaction {
            id: id.to_string(),
            balance_type: BalanceType::VacationCurrent,
            amount,
            reason: "correzione manuale da audit".to_string(),
            expiry_date: None,
            created_at: Utc::now(),
        }
    }

    fn balance_body(id: &str, available: f64) -> serde_json::Value {
        let bucket = |avail: f64| json!({ "accrued": 20.0, "used": 5.0, "available": avail });
        json!({
            "id": id,
            "user_id": "u1",
            "year": 2026,
            "vacation_current_year": bucket(available),
            "vacation_previous_year": bucket(2.0),
            "rol_hours": bucket(12.0),
            "permit_hours": bucket(24.0)
        })
    }

    struct Harness {
        server: MockServer,
        cache: Arc<QueryCache>,
        notifier: Arc<RecordingNotifier>,
        wallet: WalletController,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let config = KronosConfig {
            api_base_url: server.uri(),
            token_url: format!("{}/oauth/token", server.uri()),
            client_id: "kronos-web".to_string(),
            client_secret: "segreto".to_string(),
            username: "mrossi".to_string(),
            password: "password".to_string(),
            request_timeout_secs: 5,
        };
        let client = KronosClient::new(config).expect("Failed to create test client");
        client
            .auth()
            .seed("test-token", None, Utc::now() + Duration::hours(1))
            .await;
        let cache = Arc::new(QueryCache::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let wallet = WalletController::new(client, cache.clone(), notifier.clone());
        Harness {
            server,
            cache,
            notifier,
            wallet,
        }
    }

    #[test]
    fn test_apply_transactions_sums_signed_amounts() {
        let ledger = [transaction("t1", 5.0), transaction("t2", -2.0)];
        assert_eq!(apply_transactions(10.0, &ledger), 13.0);
        assert_eq!(apply_transactions(10.0, &[]), 10.0);
    }

    #[test]
    fn test_adjustment_reason_minimum_length() {
        let short = BalanceAdjustment {
            balance_type: BalanceType::Rol,
            amount: 4.0,
            reason: "ok".to_string(),
            expiry_date: None,
        };
        match short.validate() {
            Err(KronosError::Precondition(message)) => {
                assert!(message.contains("10 caratteri"), "got '{}'", message)
            }
            other => panic!("Expected Precondition error but got: {:?}", other),
        }

        // Padding with whitespace does not help.
        let padded = BalanceAdjustment {
            reason: "  ok      ".to_string(),
            ..short.clone()
        };
        assert!(padded.validate().is_err());

        let valid = BalanceAdjustment {
            reason: "correzione manuale da audit".to_string(),
            ..short
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_adjustment_amount_must_be_finite() {
        for amount in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let adjustment = BalanceAdjustment {
                balance_type: BalanceType::Permit,
                amount,
                reason: "correzione manuale da audit".to_string(),
                expiry_date: None,
            };
            assert!(matches!(
                adjustment.validate(),
                Err(KronosError::Precondition(_))
            ));
        }
    }

    #[test]
    fn test_balance_type_wire_names() {
        assert_eq!(
            serde_json::to_value(BalanceType::VacationCurrent).unwrap(),
            json!("vacation_current")
        );
        let parsed: BalanceType = serde_json::from_value(json!("rol")).unwrap();
        assert_eq!(parsed, BalanceType::Rol);
    }

    #[test]
    fn test_bucket_accessor_maps_all_types() {
        let balance: LeaveBalance = serde_json::from_value(balance_body("B1", 15.0)).unwrap();
        assert_eq!(balance.bucket(BalanceType::VacationCurrent).available, 15.0);
        assert_eq!(balance.bucket(BalanceType::VacationPrevious).available, 2.0);
        assert_eq!(balance.bucket(BalanceType::Rol).available, 12.0);
        assert_eq!(balance.bucket(BalanceType::Permit).available, 24.0);
    }

    #[tokio::test]
    async fn test_invalid_adjustment_never_reaches_the_network() {
        let h = harness().await;
        let adjustment = BalanceAdjustment {
            balance_type: BalanceType::VacationCurrent,
            amount: 1.0,
            reason: "breve".to_string(),
            expiry_date: None,
        };

        let result = h.wallet.adjust("u1", 2026, &adjustment).await;
        assert!(matches!(result, Err(KronosError::Precondition(_))));

        let received = h.server.received_requests().await.unwrap();
        assert!(received.is_empty(), "guard must run before any HTTP call");

        let events = h.notifier.events();
        assert_eq!(events.last().unwrap().0, ToastLevel::Error);
    }

    #[tokio::test]
    async fn test_adjust_success_reloads_balance_and_ledger() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/balances/u1/adjust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(balance_body("B1", 16.0)))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/balances/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(balance_body("B1", 16.0)))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/balances/transactions/B1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "t1",
                    "balance_type": "vacation_current",
                    "amount": 1.0,
                    "reason": "correzione manuale da audit",
                    "created_at": "2026-08-20T09:00:00Z"
                }
            ])))
            .mount(&h.server)
            .await;

        // Stale entry that the adjustment must replace.
        h.cache.put(
            CacheScope::Balance("u1".to_string()),
            &json!({"stale": true}),
        );

        let adjustment = BalanceAdjustment {
            balance_type: BalanceType::VacationCurrent,
            amount: 1.0,
            reason: "correzione manuale da audit".to_string(),
            expiry_date: None,
        };
        let (balance, transactions) = h.wallet.adjust("u1", 2026, &adjustment).await.unwrap();

        assert_eq!(balance.bucket(BalanceType::VacationCurrent).available, 16.0);
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount, 1.0);

        // Cache now holds the reloaded snapshot, not the stale entry.
        let cached = h
            .cache
            .get::<LeaveBalance>(&CacheScope::Balance("u1".to_string()))
            .unwrap();
        assert_eq!(cached.id, "B1");
        assert!(h
            .cache
            .get::<Vec<BalanceTransaction>>(&CacheScope::Transactions("B1".to_string()))
            .is_some());

        let events = h.notifier.events();
        assert_eq!(
            events.last().unwrap(),
            &(ToastLevel::Success, "Saldo aggiornato".to_string())
        );
    }

    #[tokio::test]
    async fn test_snapshot_serves_from_cache_once_loaded() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/balances/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(balance_body("B1", 7.5)))
            .mount(&h.server)
            .await;

        let first = h.wallet.snapshot("u1").await.unwrap();
        let second = h.wallet.snapshot("u1").await.unwrap();
        assert_eq!(first.id, second.id);

        let calls = h
            .server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/api/v1/balances/u1")
            .count();
        assert_eq!(calls, 1, "second read must come from the cache");
    }
}
