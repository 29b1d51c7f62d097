// src/leave.rs

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::KronosClient;
use crate::error::KronosError;

/// Server-authoritative request lifecycle status. The client mirrors it for
/// UI gating only; transitions are requested, never computed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Draft,
    Submitted,
    Pending,
    Approved,
    ApprovedConditional,
    Rejected,
    Cancelled,
    Revoked,
    Reopened,
    Recalled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Draft => "draft",
            LeaveStatus::Submitted => "submitted",
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::ApprovedConditional => "approved_conditional",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
            LeaveStatus::Revoked => "revoked",
            LeaveStatus::Reopened => "reopened",
            LeaveStatus::Recalled => "recalled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Vacation,
    Rol,
    Permit,
    Sickness,
    Unpaid,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Vacation => "vacation",
            LeaveType::Rol => "rol",
            LeaveType::Permit => "permit",
            LeaveType::Sickness => "sickness",
            LeaveType::Unpaid => "unpaid",
        }
    }

    /// Sickness requests carry the certificate protocol number.
    pub fn requires_protocol(&self) -> bool {
        matches!(self, LeaveType::Sickness)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: String,
    pub employee_id: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub half_day_start: bool,
    #[serde(default)]
    pub half_day_end: bool,
    pub status: LeaveStatus,
    #[serde(default)]
    pub employee_notes: Option<String>,
    #[serde(default)]
    pub approver_notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub protocol_number: Option<String>,
    /// Id of the linked approval-workflow record, when one exists. Related
    /// to but distinct from the leave request id.
    #[serde(default)]
    pub approval_request_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Draft payload for create/update. The server assigns id, employee and
/// status; the client validates the protocol-number rule before sending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveDraft {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub half_day_start: bool,
    #[serde(default)]
    pub half_day_end: bool,
    #[serde(default)]
    pub employee_notes: Option<String>,
    #[serde(default)]
    pub protocol_number: Option<String>,
}

impl LeaveDraft {
    pub fn validate(&self) -> Result<(), KronosError> {
        if self.end_date < self.start_date {
            return Err(KronosError::Precondition(
                "La data di fine non può precedere la data di inizio".to_string(),
            ));
        }
        if self.leave_type.requires_protocol()
            && self
                .protocol_number
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Err(KronosError::Precondition(
                "Il numero di protocollo è obbligatorio per questo tipo di assenza".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkingDays {
    pub working_days: f64,
}

/// Thin typed wrapper over the `/leaves` endpoint family. One function per
/// server operation, no business logic; transport errors propagate unchanged
/// for the caller to format.
#[derive(Clone)]
pub struct LeaveApi {
    client: Arc<KronosClient>,
}

impl LeaveApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn list(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        status: Option<LeaveStatus>,
    ) -> Result<Vec<LeaveRequest>, KronosError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }
        self.client.get_query("/leaves", &query).await
    }

    pub async fn get(&self, id: &str) -> Result<LeaveRequest, KronosError> {
        self.client.get(&format!("/leaves/{}", id)).await
    }

    pub async fn create(&self, draft: &LeaveDraft) -> Result<LeaveRequest, KronosError> {
        self.client
            .post("/leaves", &serde_json::to_value(draft)?)
            .await
    }

    pub async fn update(&self, id: &str, draft: &LeaveDraft) -> Result<LeaveRequest, KronosError> {
        self.client
            .put(&format!("/leaves/{}", id), &serde_json::to_value(draft)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), KronosError> {
        self.client.delete(&format!("/leaves/{}", id)).await
    }

    pub async fn submit(&self, id: &str) -> Result<LeaveRequest, KronosError> {
        self.client
            .post_no_body(&format!("/leaves/{}/submit", id))
            .await
    }

    pub async fn cancel(&self, id: &str, reason: &str) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(&format!("/leaves/{}/cancel", id), &json!({ "reason": reason }))
            .await
    }

    pub async fn revoke(&self, id: &str, reason: &str) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(&format!("/leaves/{}/revoke", id), &json!({ "reason": reason }))
            .await
    }

    pub async fn reopen(&self, id: &str, notes: Option<&str>) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(&format!("/leaves/{}/reopen", id), &json!({ "notes": notes }))
            .await
    }

    pub async fn recall(
        &self,
        id: &str,
        reason: &str,
        recall_date: NaiveDate,
    ) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(
                &format!("/leaves/{}/recall", id),
                &json!({ "reason": reason, "recall_date": recall_date }),
            )
            .await
    }

    pub async fn accept_condition(
        &self,
        id: &str,
        accept: bool,
    ) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(
                &format!("/leaves/{}/accept-condition", id),
                &json!({ "accept": accept }),
            )
            .await
    }

    /// Asks the server to compute the working days a request would consume.
    /// Balance arithmetic stays server-side; this is display-only.
    pub async fn calculate_days(&self, draft: &LeaveDraft) -> Result<WorkingDays, KronosError> {
        self.client
            .post("/leaves/calculate-days", &serde_json::to_value(draft)?)
            .await
    }
}
