// src/lifecycle.rs

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::info;

use crate::approvals::{ApprovalsApi, ConditionType};
use crate::cache::{CacheScope, QueryCache};
use crate::client::KronosClient;
use crate::error::{user_message, KronosError};
use crate::leave::{LeaveApi, LeaveDraft, LeaveRequest, LeaveStatus};
use crate::notify::{Notifier, ToastLevel};

/// Tag of the action currently outstanding. Advisory only: the server stays
/// the source of truth and the user can always re-trigger after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTag {
    SaveDraft,
    Submit,
    Cancel,
    Delete,
    Approve,
    Reject,
    ConditionalApprove,
    Revoke,
    Reopen,
    Recall,
    AcceptCondition,
}

impl ActionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTag::SaveDraft => "save_draft",
            ActionTag::Submit => "submit",
            ActionTag::Cancel => "cancel",
            ActionTag::Delete => "delete",
            ActionTag::Approve => "approve",
            ActionTag::Reject => "reject",
            ActionTag::ConditionalApprove => "conditional_approve",
            ActionTag::Revoke => "revoke",
            ActionTag::Reopen => "reopen",
            ActionTag::Recall => "recall",
            ActionTag::AcceptCondition => "accept_condition",
        }
    }
}

// Resets the loading slot when the action ends, on success and on error.
struct ActionGuard<'a> {
    slot: &'a Mutex<Option<ActionTag>>,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().expect("action slot lock poisoned") = None;
    }
}

/// Orchestrates user-triggered lifecycle transitions: client-side guards
/// before any network call, the repository/approvals round-trip, cache
/// invalidation on success, and the toast on both outcomes.
pub struct LeaveLifecycle {
    leaves: LeaveApi,
    approvals: ApprovalsApi,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    action: Mutex<Option<ActionTag>>,
}

impl LeaveLifecycle {
    pub fn new(
        client: Arc<KronosClient>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            leaves: LeaveApi::new(client.clone()),
            approvals: ApprovalsApi::new(client),
            cache,
            notifier,
            action: Mutex::new(None),
        }
    }

    /// The action currently in flight, if any. UI disables triggers while
    /// this is set.
    pub fn current_action(&self) -> Option<ActionTag> {
        *self.action.lock().expect("action slot lock poisoned")
    }

    fn begin(&self, tag: ActionTag) -> Result<ActionGuard<'_>, KronosError> {
        let mut slot = self.action.lock().expect("action slot lock poisoned");
        if let Some(active) = *slot {
            return Err(KronosError::ActionInFlight(active.as_str()));
        }
        *slot = Some(tag);
        Ok(ActionGuard { slot: &self.action })
    }

    // Invalidated after every successful mutation: the request itself, the
    // request list, the calendar projection, and every balance snapshot.
    fn after_mutation(&self, leave_id: &str) {
        self.cache.invalidate_many(&[
            CacheScope::Leave(leave_id.to_string()),
            CacheScope::LeaveList,
            CacheScope::CalendarRange,
        ]);
        self.cache.invalidate_matching(|scope| {
            matches!(
                scope,
                CacheScope::Balance(_) | CacheScope::Transactions(_)
            )
        });
        info!("Invalidated caches after mutation of leave {}", leave_id);
    }

    fn report<T>(
        &self,
        result: Result<T, KronosError>,
        success_message: &str,
    ) -> Result<T, KronosError> {
        match &result {
            Ok(_) => self.notifier.notify(ToastLevel::Success, success_message),
            Err(e) => self.notifier.notify(ToastLevel::Error, &user_message(e)),
        }
        result
    }

    pub async fn save_draft(
        &self,
        id: Option<&str>,
        draft: &LeaveDraft,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::SaveDraft)?;
            draft.validate()?;
            let saved = match id {
                Some(id) => self.leaves.update(id, draft).await?,
                None => self.leaves.create(draft).await?,
            };
            self.after_mutation(&saved.id);
            Ok(saved)
        }
        .await;
        self.report(result, "Bozza salvata")
    }

    pub async fn submit(&self, id: &str) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Submit)?;
            let updated = self.leaves.submit(id).await?;
            self.after_mutation(id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiesta inviata")
    }

    pub async fn cancel(&self, id: &str, reason: &str) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Cancel)?;
            require_text(reason, "Il motivo è obbligatorio")?;
            let updated = self.leaves.cancel(id, reason.trim()).await?;
            self.after_mutation(id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiesta annullata")
    }

    /// Deletion is permitted only while the request is still a draft; the
    /// caller navigates away on success.
    pub async fn delete(&self, request: &LeaveRequest) -> Result<(), KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Delete)?;
            if request.status != LeaveStatus::Draft {
                return Err(KronosError::Precondition(
                    "Solo le bozze possono essere eliminate".to_string(),
                ));
            }
            self.leaves.delete(&request.id).await?;
            self.after_mutation(&request.id);
            Ok(())
        }
        .await;
        self.report(result, "Bozza eliminata")
    }

    /// Decisions go through the approvals collaborator, keyed by the
    /// approval-request id, which is related to but distinct from the leave
    /// id. A missing link is a client-side invariant violation: fail locally
    /// with zero HTTP calls.
    pub async fn approve(
        &self,
        approval_request_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Approve)?;
            let approval_id = require_approval_link(approval_request_id)?;
            let updated = self.approvals.approve(approval_id, notes).await?;
            self.after_mutation(&updated.id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiesta approvata")
    }

    pub async fn reject(
        &self,
        approval_request_id: Option<&str>,
        reason: &str,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Reject)?;
            let approval_id = require_approval_link(approval_request_id)?;
            require_text(reason, "Il motivo è obbligatorio")?;
            let updated = self.approvals.reject(approval_id, reason.trim()).await?;
            self.after_mutation(&updated.id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiesta respinta")
    }

    pub async fn conditional_approve(
        &self,
        approval_request_id: Option<&str>,
        condition_type: ConditionType,
        condition_details: &str,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::ConditionalApprove)?;
            let approval_id = require_approval_link(approval_request_id)?;
            require_text(
                condition_details,
                "Specificare i dettagli della condizione",
            )?;
            let updated = self
                .approvals
                .conditional_approve(approval_id, condition_type, condition_details.trim())
                .await?;
            self.after_mutation(&updated.id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiesta approvata con condizione")
    }

    pub async fn revoke(&self, id: &str, reason: &str) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Revoke)?;
            require_text(reason, "Il motivo è obbligatorio")?;
            let updated = self.leaves.revoke(id, reason.trim()).await?;
            self.after_mutation(id);
            Ok(updated)
        }
        .await;
        self.report(result, "Approvazione revocata")
    }

    pub async fn reopen(
        &self,
        id: &str,
        notes: Option<&str>,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Reopen)?;
            let updated = self.leaves.reopen(id, notes).await?;
            self.after_mutation(id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiesta riaperta")
    }

    /// Recall shortens an approved future request; the server notifies the
    /// employee. Requires both a reason and the new effective date.
    pub async fn recall(
        &self,
        id: &str,
        reason: &str,
        recall_date: Option<NaiveDate>,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::Recall)?;
            require_text(reason, "Il motivo è obbligatorio")?;
            let recall_date = recall_date.ok_or_else(|| {
                KronosError::Precondition("La data di richiamo è obbligatoria".to_string())
            })?;
            let updated = self.leaves.recall(id, reason.trim(), recall_date).await?;
            self.after_mutation(id);
            Ok(updated)
        }
        .await;
        self.report(result, "Richiamo registrato")
    }

    pub async fn accept_condition(
        &self,
        id: &str,
        accept: bool,
    ) -> Result<LeaveRequest, KronosError> {
        let result = async {
            let _guard = self.begin(ActionTag::AcceptCondition)?;
            let updated = self.leaves.accept_condition(id, accept).await?;
            self.after_mutation(id);
            Ok(updated)
        }
        .await;
        self.report(result, "Risposta registrata")
    }
}

fn require_text(value: &str, message: &str) -> Result<(), KronosError> {
    if value.trim().is_empty() {
        return Err(KronosError::Precondition(message.to_string()));
    }
    Ok(())
}

fn require_approval_link(approval_request_id: Option<&str>) -> Result<&str, KronosError> {
    match approval_request_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(KronosError::Precondition(
            "Richiesta di approvazione non trovata".to_string(),
        )),
    }
}
