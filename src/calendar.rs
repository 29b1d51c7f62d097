// src/calendar.rs

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::cache::{CacheScope, QueryCache};
use crate::client::KronosClient;
use crate::error::KronosError;
use crate::leave::LeaveStatus;

/// The fetched window extends this far beyond the visible range on both
/// sides, so month navigation does not wait on the network.
pub const RANGE_BUFFER_MONTHS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayScope {
    National,
    Local,
}

/// Personal-event category, carried in the event metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    #[default]
    Generic,
    Meeting,
    Reminder,
    Birthday,
    Anniversary,
    Training,
    Medical,
}

/// Per-`item_type` metadata as a closed tagged variant, so the
/// classification switch below is checked for exhaustiveness at compile
/// time instead of reading an open map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "item_type", content = "metadata", rename_all = "snake_case")]
pub enum ItemDetails {
    Holiday {
        scope: HolidayScope,
    },
    Closure {
        #[serde(default)]
        department: Option<String>,
    },
    Leave {
        status: LeaveStatus,
        #[serde(default)]
        employee_name: Option<String>,
    },
    Event {
        calendar_id: String,
        #[serde(default)]
        category: EventCategory,
    },
    Trip {
        #[serde(default)]
        destination: Option<String>,
    },
}

/// Read projection assembled server-side from holiday/closure/leave/event
/// records. Ephemeral: re-derived on every fetch, never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarDayItem {
    pub id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(flatten)]
    pub details: ItemDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarDayView {
    pub date: NaiveDate,
    pub items: Vec<CalendarDayItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    Read,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarShare {
    pub user_id: String,
    pub permission: SharePermission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCalendar {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub color: String,
    pub is_owner: bool,
    #[serde(default)]
    pub shares: Vec<CalendarShare>,
}

/// User-chosen visibility filters for the aggregated view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFilters {
    pub show_national_holidays: bool,
    pub show_local_holidays: bool,
    pub show_company_closures: bool,
    pub show_team_leaves: bool,
    pub hidden_calendars: HashSet<String>,
}

impl Default for CalendarFilters {
    fn default() -> Self {
        Self {
            show_national_holidays: true,
            show_local_holidays: true,
            show_company_closures: true,
            show_team_leaves: true,
            hidden_calendars: HashSet::new(),
        }
    }
}

/// Visual treatment bucket, one per classification (leaves split by status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleBucket {
    Holiday,
    Closure,
    LeaveApproved,
    LeavePending,
    LeaveDefault,
    Event,
    Trip,
}

/// Flat, render-ready event. `starts_on`/`ends_on` let the consumer
/// reconstruct multi-day spans from the single start-date emission.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableEvent {
    pub id: String,
    pub title: String,
    pub icon: &'static str,
    pub style: StyleBucket,
    pub color: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

fn passes_filters(details: &ItemDetails, filters: &CalendarFilters) -> bool {
    match details {
        ItemDetails::Holiday { scope } => match scope {
            HolidayScope::National => filters.show_national_holidays,
            HolidayScope::Local => filters.show_local_holidays,
        },
        ItemDetails::Closure { .. } => filters.show_company_closures,
        ItemDetails::Leave { .. } => filters.show_team_leaves,
        ItemDetails::Event { calendar_id, .. } => !filters.hidden_calendars.contains(calendar_id),
        ItemDetails::Trip { .. } => true,
    }
}

fn style_bucket(details: &ItemDetails) -> StyleBucket {
    match details {
        ItemDetails::Holiday { .. } => StyleBucket::Holiday,
        ItemDetails::Closure { .. } => StyleBucket::Closure,
        ItemDetails::Leave { status, .. } => match status {
            LeaveStatus::Approved | LeaveStatus::ApprovedConditional => StyleBucket::LeaveApproved,
            LeaveStatus::Pending => StyleBucket::LeavePending,
            _ => StyleBucket::LeaveDefault,
        },
        ItemDetails::Event { .. } => StyleBucket::Event,
        ItemDetails::Trip { .. } => StyleBucket::Trip,
    }
}

fn icon_for(details: &ItemDetails) -> &'static str {
    match details {
        ItemDetails::Holiday { .. } => "flag",
        ItemDetails::Closure { .. } => "lock",
        ItemDetails::Leave { .. } => "palm",
        ItemDetails::Event { .. } => "calendar",
        ItemDetails::Trip { .. } => "plane",
    }
}

fn label_prefix(details: &ItemDetails) -> &'static str {
    match details {
        ItemDetails::Holiday { .. } => "Festività: ",
        ItemDetails::Closure { .. } => "Chiusura: ",
        ItemDetails::Trip { .. } => "Trasferta: ",
        ItemDetails::Leave { .. } | ItemDetails::Event { .. } => "",
    }
}

fn default_color(style: StyleBucket) -> &'static str {
    match style {
        StyleBucket::Holiday => "#d32f2f",
        StyleBucket::Closure => "#616161",
        StyleBucket::LeaveApproved => "#2e7d32",
        StyleBucket::LeavePending => "#f9a825",
        StyleBucket::LeaveDefault => "#90a4ae",
        StyleBucket::Event => "#1565c0",
        StyleBucket::Trip => "#6a1b9a",
    }
}

/// Pure re-derivation of the renderable event list from the fetched day
/// views, the visibility filters and the user's calendars. Idempotent:
/// identical inputs always yield the identical output list.
///
/// Span policy: a multi-day item is emitted only on its start date (the
/// consumer rebuilds the span from `starts_on`/`ends_on`); holidays are
/// single-day by construction so the check never drops them.
pub fn flatten_day_views(
    day_views: &[CalendarDayView],
    filters: &CalendarFilters,
    calendars: &[UserCalendar],
) -> Vec<RenderableEvent> {
    let calendar_colors: HashMap<&str, &str> = calendars
        .iter()
        .map(|c| (c.id.as_str(), c.color.as_str()))
        .collect();

    let mut events = Vec::new();
    for day in day_views {
        for item in &day.items {
            if !passes_filters(&item.details, filters) {
                continue;
            }
            let is_holiday = matches!(item.details, ItemDetails::Holiday { .. });
            if !is_holiday && day.date != item.start_date {
                continue;
            }

            let style = style_bucket(&item.details);
            let color = item
                .color
                .clone()
                .or_else(|| match &item.details {
                    ItemDetails::Event { calendar_id, .. } => calendar_colors
                        .get(calendar_id.as_str())
                        .map(|c| c.to_string()),
                    _ => None,
                })
                .unwrap_or_else(|| default_color(style).to_string());

            events.push(RenderableEvent {
                id: item.id.clone(),
                title: format!("{}{}", label_prefix(&item.details), item.title),
                icon: icon_for(&item.details),
                style,
                color,
                starts_on: item.start_date,
                ends_on: item.end_date,
            });
        }
    }

    events.sort_by(|a, b| a.starts_on.cmp(&b.starts_on).then_with(|| a.title.cmp(&b.title)));
    events
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDraft {
    pub name: String,
    pub color: String,
}

/// Thin wrapper over the `/calendar` endpoint family.
#[derive(Clone)]
pub struct CalendarApi {
    client: Arc<KronosClient>,
}

impl CalendarApi {
    pub fn new(client: Arc<KronosClient>) -> Self {
        Self { client }
    }

    pub async fn range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarDayView>, KronosError> {
        self.client
            .get_query(
                "/calendar/range",
                &[("from", from.to_string()), ("to", to.to_string())],
            )
            .await
    }

    pub async fn list_calendars(&self) -> Result<Vec<UserCalendar>, KronosError> {
        self.client.get("/calendar/calendars").await
    }

    pub async fn create_calendar(
        &self,
        draft: &CalendarDraft,
    ) -> Result<UserCalendar, KronosError> {
        self.client
            .post("/calendar/calendars", &serde_json::to_value(draft)?)
            .await
    }

    pub async fn update_calendar(
        &self,
        id: &str,
        draft: &CalendarDraft,
    ) -> Result<UserCalendar, KronosError> {
        self.client
            .put(
                &format!("/calendar/calendars/{}", id),
                &serde_json::to_value(draft)?,
            )
            .await
    }

    pub async fn delete_calendar(&self, id: &str) -> Result<(), KronosError> {
        self.client
            .delete(&format!("/calendar/calendars/{}", id))
            .await
    }

    pub async fn share_calendar(
        &self,
        id: &str,
        user_id: &str,
        permission: SharePermission,
    ) -> Result<(), KronosError> {
        self.client
            .post_no_content(
                &format!("/calendar/calendars/{}/share", id),
                Some(&json!({ "user_id": user_id, "permission": permission })),
            )
            .await
    }

    pub async fn unshare_calendar(&self, id: &str, user_id: &str) -> Result<(), KronosError> {
        self.client
            .delete(&format!("/calendar/calendars/{}/share/{}", id, user_id))
            .await
    }
}

// What the view last fetched, kept in the query cache so a navigation
// within the buffered window needs no round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedRange {
    from: NaiveDate,
    to: NaiveDate,
    day_views: Vec<CalendarDayView>,
}

struct ViewState {
    day_views: Vec<CalendarDayView>,
    calendars: Vec<UserCalendar>,
    filters: CalendarFilters,
}

/// Stateful range fetcher behind the aggregation view. Every fetch takes a
/// monotonically increasing ticket; a response that arrives after a newer
/// fetch started is discarded instead of overwriting fresher state.
pub struct CalendarView {
    api: CalendarApi,
    cache: Arc<QueryCache>,
    fetch_seq: AtomicU64,
    state: Mutex<ViewState>,
}

impl CalendarView {
    pub fn new(client: Arc<KronosClient>, cache: Arc<QueryCache>) -> Self {
        Self {
            api: CalendarApi::new(client),
            cache,
            fetch_seq: AtomicU64::new(0),
            state: Mutex::new(ViewState {
                day_views: Vec::new(),
                calendars: Vec::new(),
                filters: CalendarFilters::default(),
            }),
        }
    }

    pub fn filters(&self) -> CalendarFilters {
        self.state.lock().expect("view state lock poisoned").filters.clone()
    }

    /// Changing filters never re-fetches: the flattening is a pure function
    /// of already-fetched state.
    pub fn set_filters(&self, filters: CalendarFilters) -> Vec<RenderableEvent> {
        let mut state = self.state.lock().expect("view state lock poisoned");
        state.filters = filters;
        flatten_day_views(&state.day_views, &state.filters, &state.calendars)
    }

    pub async fn refresh_calendars(&self) -> Result<Vec<UserCalendar>, KronosError> {
        let calendars = match self.cache.get::<Vec<UserCalendar>>(&CacheScope::Calendars) {
            Some(cached) => cached,
            None => {
                let fetched = self.api.list_calendars().await?;
                self.cache.put(CacheScope::Calendars, &fetched);
                fetched
            }
        };
        let mut state = self.state.lock().expect("view state lock poisoned");
        state.calendars = calendars.clone();
        Ok(calendars)
    }

    /// Fetches the visible range widened by one month on each side and
    /// returns the flattened event list, or `None` when this fetch was
    /// superseded by a newer one while in flight.
    pub async fn load_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Vec<RenderableEvent>>, KronosError> {
        let buffered_from = from
            .checked_sub_months(Months::new(RANGE_BUFFER_MONTHS))
            .unwrap_or(from);
        let buffered_to = to
            .checked_add_months(Months::new(RANGE_BUFFER_MONTHS))
            .unwrap_or(to);

        if let Some(cached) = self.cache.get::<CachedRange>(&CacheScope::CalendarRange) {
            if cached.from <= buffered_from && cached.to >= buffered_to {
                debug!("Calendar range served from cache");
                let mut state = self.state.lock().expect("view state lock poisoned");
                state.day_views = cached.day_views;
                return Ok(Some(flatten_day_views(
                    &state.day_views,
                    &state.filters,
                    &state.calendars,
                )));
            }
        }

        let ticket = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let day_views = self.api.range(buffered_from, buffered_to).await?;
        if self.fetch_seq.load(Ordering::SeqCst) != ticket {
            debug!("Discarding superseded calendar range response");
            return Ok(None);
        }

        self.cache.put(
            CacheScope::CalendarRange,
            &CachedRange {
                from: buffered_from,
                to: buffered_to,
                day_views: day_views.clone(),
            },
        );

        let mut state = self.state.lock().expect("view state lock poisoned");
        state.day_views = day_views;
        Ok(Some(flatten_day_views(
            &state.day_views,
            &state.filters,
            &state.calendars,
        )))
    }

    /// Re-derives the event list from current state without touching the
    /// network.
    pub fn current_events(&self) -> Vec<RenderableEvent> {
        let state = self.state.lock().expect("view state lock poisoned");
        flatten_day_views(&state.day_views, &state.filters, &state.calendars)
    }
}
