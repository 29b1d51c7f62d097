// src/approvals.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::KronosClient;
use crate::error::KronosError;
use crate::leave::LeaveRequest;

/// Condition attached to a conditional approval. Closed set; the codes are
/// the ones the approval workflow understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Ricollocazione: different dates proposed by the approver.
    Ric,
    /// Reperibilità: employee must stay reachable.
    Rep,
    /// Parziale: only part of the requested span is approved.
    Par,
    /// Modalità: approved with a different leave type.
    Mod,
    /// Alternanza: approved alternating with a colleague's leave.
    Alt,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Ric => "ric",
            ConditionType::Rep => "rep",
            ConditionType::Par => "par",
            ConditionType::Mod => "mod",
            ConditionType::Alt => "alt",
        }
    }
}

/// Client for the approval-request entity: the pending-decision record tied
/// to a leave request. Decisions go through here, not the leave endpoints.
#[derive(Clone)]
pub struct ApprovalsApi {
    client: Arc<KronosClient>,
}

impl ApprovalsApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn approve(
        &self,
        approval_request_id: &str,
        notes: Option<&str>,
    ) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(
                &format!("/approvals/{}/approve", approval_request_id),
                &json!({ "notes": notes }),
            )
            .await
    }

    pub async fn reject(
        &self,
        approval_request_id: &str,
        reason: &str,
    ) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(
                &format!("/approvals/{}/reject", approval_request_id),
                &json!({ "reason": reason }),
            )
            .await
    }

    pub async fn conditional_approve(
        &self,
        approval_request_id: &str,
        condition_type: ConditionType,
        condition_details: &str,
    ) -> Result<LeaveRequest, KronosError> {
        self.client
            .post(
                &format!("/approvals/{}/conditional", approval_request_id),
                &json!({
                    "condition_type": condition_type,
                    "condition_details": condition_details,
                }),
            )
            .await
    }
}
