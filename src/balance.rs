// src/balance.rs

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{CacheScope, QueryCache};
use crate::client::KronosClient;
use crate::error::{user_message, KronosError};
use crate::notify::{Notifier, ToastLevel};

/// Adjustment reasons are audit records; the server enforces this too, the
/// client just fails fast.
pub const MIN_ADJUSTMENT_REASON_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceType {
    /// AC: current-year vacation bucket.
    VacationCurrent,
    /// AP: previous-year vacation bucket.
    VacationPrevious,
    Rol,
    Permit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BalanceBucket {
    pub accrued: f64,
    pub used: f64,
    pub available: f64,
}

/// Per-user, per-year balance snapshot. Mutated only server-side (accrual
/// jobs, manual adjustments, rollovers); the client displays it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    pub vacation_current_year: BalanceBucket,
    pub vacation_previous_year: BalanceBucket,
    pub rol_hours: BalanceBucket,
    pub permit_hours: BalanceBucket,
}

impl LeaveBalance {
    pub fn bucket(&self, balance_type: BalanceType) -> &BalanceBucket {
        match balance_type {
            BalanceType::VacationCurrent => &self.vacation_current_year,
            BalanceType::VacationPrevious => &self.vacation_previous_year,
            BalanceType::Rol => &self.rol_hours,
            BalanceType::Permit => &self.permit_hours,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub user_id: String,
    pub year: i32,
    pub vacation_days_available: f64,
    pub rol_hours_available: f64,
    pub permit_hours_available: f64,
}

/// Append-only ledger entry. Never edited or deleted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: String,
    pub balance_type: BalanceType,
    pub amount: f64,
    pub reason: String,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Net availability after a ledger slice: prior balance plus the signed
/// amounts, each transaction counted exactly once.
pub fn apply_transactions(prior_available: f64, transactions: &[BalanceTransaction]) -> f64 {
    prior_available + transactions.iter().map(|t| t.amount).sum::<f64>()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub balance_type: BalanceType,
    pub amount: f64,
    pub reason: String,
    pub expiry_date: Option<NaiveDate>,
}

impl BalanceAdjustment {
    pub fn validate(&self) -> Result<(), KronosError> {
        if !self.amount.is_finite() {
            return Err(KronosError::Precondition(
                "L'importo non è valido".to_string(),
            ));
        }
        if self.reason.trim().chars().count() < MIN_ADJUSTMENT_REASON_CHARS {
            return Err(KronosError::Precondition(format!(
                "La causale deve contenere almeno {} caratteri",
                MIN_ADJUSTMENT_REASON_CHARS
            )));
        }
        Ok(())
    }
}

/// Thin wrapper over the `/balances` endpoint family.
#[derive(Clone)]
pub struct BalanceApi {
    client: Arc<KronosClient>,
}

impl BalanceApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn my_balance(&self) -> Result<LeaveBalance, KronosError> {
        self.client.get("/balances/me").await
    }

    pub async fn balance(&self, user_id: &str) -> Result<LeaveBalance, KronosError> {
        self.client.get(&format!("/balances/{}", user_id)).await
    }

    pub async fn summary(&self, user_id: &str) -> Result<BalanceSummary, KronosError> {
        self.client
            .get(&format!("/balances/{}/summary", user_id))
            .await
    }

    pub async fn adjust(
        &self,
        user_id: &str,
        year: i32,
        adjustment: &BalanceAdjustment,
    ) -> Result<LeaveBalance, KronosError> {
        let mut body = serde_json::to_value(adjustment)?;
        body["year"] = serde_json::json!(year);
        self.client
            .post(&format!("/balances/{}/adjust", user_id), &body)
            .await
    }

    pub async fn transactions(
        &self,
        balance_id: &str,
    ) -> Result<Vec<BalanceTransaction>, KronosError> {
        self.client
            .get(&format!("/balances/transactions/{}", balance_id))
            .await
    }
}

/// Wallet display & adjustment controller. Adjustments are audit-critical:
/// no optimistic update, always a full reload of balance and ledger after a
/// successful post.
pub struct WalletController {
    api: BalanceApi,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
}

impl WalletController {
    pub fn new(
        client: Arc<KronosClient>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api: BalanceApi::new(client),
            cache,
            notifier,
        }
    }

    pub async fn snapshot(&self, user_id: &str) -> Result<LeaveBalance, KronosError> {
        let scope = CacheScope::Balance(user_id.to_string());
        if let Some(cached) = self.cache.get::<LeaveBalance>(&scope) {
            return Ok(cached);
        }
        let balance = self.api.balance(user_id).await?;
        self.cache.put(scope, &balance);
        Ok(balance)
    }

    /// Transaction history, newest first as returned by the server.
    pub async fn transactions(
        &self,
        balance_id: &str,
    ) -> Result<Vec<BalanceTransaction>, KronosError> {
        let scope = CacheScope::Transactions(balance_id.to_string());
        if let Some(cached) = self.cache.get::<Vec<BalanceTransaction>>(&scope) {
            return Ok(cached);
        }
        let transactions = self.api.transactions(balance_id).await?;
        self.cache.put(scope, &transactions);
        Ok(transactions)
    }

    /// Posts a manual adjustment. Guards run before any network call; on
    /// success both the snapshot and the ledger are reloaded from the
    /// server and the caches refreshed.
    pub async fn adjust(
        &self,
        user_id: &str,
        year: i32,
        adjustment: &BalanceAdjustment,
    ) -> Result<(LeaveBalance, Vec<BalanceTransaction>), KronosError> {
        let result = async {
            adjustment.validate()?;
            self.api.adjust(user_id, year, adjustment).await?;

            self.cache
                .invalidate(&CacheScope::Balance(user_id.to_string()));
            self.cache
                .invalidate_matching(|scope| matches!(scope, CacheScope::Transactions(_)));

            let balance = self.api.balance(user_id).await?;
            let transactions = self.api.transactions(&balance.id).await?;
            self.cache
                .put(CacheScope::Balance(user_id.to_string()), &balance);
            self.cache
                .put(CacheScope::Transactions(balance.id.clone()), &transactions);
            info!("Balance adjustment applied for user {}", user_id);
            Ok((balance, transactions))
        }
        .await;

        match &result {
            Ok(_) => self.notifier.notify(ToastLevel::Success, "Saldo aggiornato"),
            Err(e) => self.notifier.notify(ToastLevel::Error, &user_message(e)),
        }
        result
    }
}
