use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Identity record of a person holding (or having held) registrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub cpf: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "registration_status", rename_all = "UPPERCASE")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "PENDING",
            RegistrationStatus::Confirmed => "CONFIRMED",
            RegistrationStatus::Canceled => "CANCELED",
        }
    }

    /// Counts against the event capacity and the per-event CPF uniqueness.
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Canceled)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding of a ticket to an event, owned by the user who booked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub qr_code: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking request: the event plus the identity of the person attending.
#[derive(Debug, Clone, Deserialize)]
pub struct BookSeat {
    pub event_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub cpf: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub cpf: Option<String>,
}

impl TicketPatch {
    pub fn apply_to(self, ticket: &mut Ticket) {
        if let Some(full_name) = self.full_name {
            ticket.full_name = full_name;
        }
        if let Some(email) = self.email {
            ticket.email = email;
        }
        if let Some(phone) = self.phone {
            ticket.phone = phone;
        }
        if let Some(birth_date) = self.birth_date {
            ticket.birth_date = birth_date;
        }
        if let Some(cpf) = self.cpf {
            ticket.cpf = cpf;
        }
    }
}

/// Identifies a registration for confirm/cancel requests.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegistrationRef {
    pub event_id: Uuid,
    pub ticket_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketFilter {
    pub event_id: Uuid,
    pub search: Option<String>,
}

impl TicketFilter {
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                ticket.cpf.contains(&term) || ticket.full_name.to_lowercase().contains(&term)
            }
        }
    }
}

/// Row of an event's attendee list.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TicketListItem {
    pub id: Uuid,
    pub full_name: String,
    pub cpf: String,
    pub status: RegistrationStatus,
}

/// A registration as seen from its ticket, with the event schedule inlined.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TicketRegistration {
    pub event_id: Uuid,
    pub event_name: String,
    pub date: NaiveDate,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RegistrationStatus,
    pub qr_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketDetails {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub registrations: Vec<TicketRegistration>,
}
