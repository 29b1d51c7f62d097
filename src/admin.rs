// src/admin.rs
//
// System-configuration surfaces: company closures, holiday tables and the
// global settings screen. All thin wrappers; authorization is server-side.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::QueryCache;
use crate::calendar::HolidayScope;
use crate::client::KronosClient;
use crate::error::KronosError;

/// Company-wide or departmental scheduled non-working period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Closure {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// None means company-wide.
    #[serde(default)]
    pub department: Option<String>,
    /// Whether the closure days are deducted from leave balances.
    pub consumes_balance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department: Option<String>,
    pub consumes_balance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub scope: HolidayScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayDraft {
    pub name: String,
    pub date: NaiveDate,
    pub scope: HolidayScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub company_name: String,
    pub vacation_days_per_year: f64,
    pub rol_hours_per_month: f64,
    pub permit_hours_per_year: f64,
    pub approval_required: bool,
}

#[derive(Clone)]
pub struct ClosuresApi {
    client: Arc<KronosClient>,
}

impl ClosuresApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Closure>, KronosError> {
        self.client.get("/closures").await
    }

    pub async fn create(&self, draft: &ClosureDraft) -> Result<Closure, KronosError> {
        self.client
            .post("/closures", &serde_json::to_value(draft)?)
            .await
    }

    pub async fn update(&self, id: &str, draft: &ClosureDraft) -> Result<Closure, KronosError> {
        self.client
            .put(&format!("/closures/{}", id), &serde_json::to_value(draft)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), KronosError> {
        self.client.delete(&format!("/closures/{}", id)).await
    }
}

#[derive(Clone)]
pub struct HolidaysApi {
    client: Arc<KronosClient>,
}

impl HolidaysApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Holiday>, KronosError> {
        self.client.get("/holidays").await
    }

    pub async fn create(&self, draft: &HolidayDraft) -> Result<Holiday, KronosError> {
        self.client
            .post("/holidays", &serde_json::to_value(draft)?)
            .await
    }

    pub async fn update(&self, id: &str, draft: &HolidayDraft) -> Result<Holiday, KronosError> {
        self.client
            .put(&format!("/holidays/{}", id), &serde_json::to_value(draft)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), KronosError> {
        self.client.delete(&format!("/holidays/{}", id)).await
    }
}

#[derive(Clone)]
pub struct SystemConfigApi {
    client: Arc<KronosClient>,
}

impl SystemConfigApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> Result<SystemConfig, KronosError> {
        self.client.get("/config").await
    }

    pub async fn update(&self, config: &SystemConfig) -> Result<SystemConfig, KronosError> {
        self.client
            .put("/config", &serde_json::to_value(config)?)
            .await
    }

    /// Asks the server to drop its caches, then drops the local query cache
    /// so the next reads re-fetch.
    pub async fn clear_cache(&self, cache: &QueryCache) -> Result<(), KronosError> {
        self.client.post_no_content("/config/cache/clear", None).await?;
        cache.clear();
        info!("Server and local caches cleared");
        Ok(())
    }
}
