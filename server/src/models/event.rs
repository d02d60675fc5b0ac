use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an event.
///
/// `Canceled` and `Completed` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "event_status", rename_all = "UPPERCASE")]
pub enum EventStatus {
    Pending,
    Active,
    Canceled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "PENDING",
            EventStatus::Active => "ACTIVE",
            EventStatus::Canceled => "CANCELED",
            EventStatus::Completed => "COMPLETED",
        }
    }

    /// Statuses reachable in one step from `self`.
    pub fn allowed_transitions(&self) -> &'static [EventStatus] {
        match self {
            EventStatus::Pending => &[EventStatus::Active, EventStatus::Canceled],
            EventStatus::Active => &[EventStatus::Completed, EventStatus::Canceled],
            EventStatus::Canceled | EventStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub total_tickets: i32,
    pub price: Decimal,
    pub status: EventStatus,
    pub created_by: Uuid,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub total_tickets: i32,
    pub price: Decimal,
    pub logo_url: Option<String>,
}

/// Partial update of an event. Status is absent; it only moves through
/// the status state machine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub total_tickets: Option<i32>,
    pub price: Option<Decimal>,
    pub logo_url: Option<String>,
}

impl EventPatch {
    /// Copies every provided field onto `event`.
    pub fn apply_to(self, event: &mut Event) {
        if let Some(name) = self.name {
            event.name = name;
        }
        if let Some(description) = self.description {
            event.description = Some(description);
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(start_time) = self.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            event.end_time = end_time;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(total_tickets) = self.total_tickets {
            event.total_tickets = total_tickets;
        }
        if let Some(price) = self.price {
            event.price = price;
        }
        if let Some(logo_url) = self.logo_url {
            event.logo_url = Some(logo_url);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEventStatus {
    pub status: EventStatus,
}

/// Query filters for listing events. `start_date`/`end_date` bound the event
/// date inclusively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub search: Option<String>,
    pub status: Option<EventStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl EventFilter {
    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(status) = self.status {
            if event.status != status {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if event.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.date > end {
                return false;
            }
        }
        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                event.name.to_lowercase().contains(&term)
                    || event.location.to_lowercase().contains(&term)
                    || event
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
        }
    }
}

/// Event listing entry with its live seat counts.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub tickets_sold: i64,
    pub tickets_remaining: i64,
}

impl EventSummary {
    pub fn new(event: Event, tickets_sold: i64) -> Self {
        let tickets_remaining = (i64::from(event.total_tickets) - tickets_sold).max(0);
        Self {
            event,
            tickets_sold,
            tickets_remaining,
        }
    }
}
