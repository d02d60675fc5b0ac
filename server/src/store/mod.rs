//! Persistence seam.
//!
//! Business rules live in `services`; a store only has to provide
//! transactional reads and writes plus two guarantees the services cannot
//! provide themselves:
//!
//! - a transaction that read an event through [`StoreTx::lock_event`] is
//!   serialized against every other transaction that locks the same event;
//! - inserting a second non-cancelled registration for the same
//!   `(event, cpf)` fails with [`AppError::Conflict`](crate::utils::error::AppError),
//!   even when two transactions race past the service-level check.
//!
//! Dropping a transaction without calling [`StoreTx::commit`] rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CallerId, Event, EventFilter, EventStatus, EventSummary, Page, Registration,
    RegistrationStatus, SessionToken, Ticket, TicketDetails, TicketFilter, TicketListItem,
};
use crate::utils::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DUPLICATE_CPF_MESSAGE: &str = "duplicate registration for this CPF in this event";

#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> AppResult<Self::Tx>;

    async fn find_event(&self, id: Uuid) -> AppResult<Option<Event>>;

    /// Events matching `filter`, newest first, with the total match count.
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> AppResult<(Vec<EventSummary>, i64)>;

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> AppResult<(Vec<TicketListItem>, i64)>;

    async fn find_ticket_details(&self, id: Uuid) -> AppResult<Option<TicketDetails>>;

    async fn find_session(&self, token_hash: &str) -> AppResult<Option<SessionToken>>;

    async fn insert_session(&self, session: &SessionToken) -> AppResult<()>;

    /// Replaces the fingerprint and expiry of an existing session. Returns
    /// `false` when `old_hash` is unknown.
    async fn rotate_session(
        &self,
        old_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn delete_session(&self, token_hash: &str) -> AppResult<()>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Reads the event and holds it for the rest of the transaction.
    async fn lock_event(&mut self, id: Uuid) -> AppResult<Option<Event>>;

    async fn insert_event(&mut self, event: &Event) -> AppResult<()>;

    /// Writes every column of `event` if its stored status still equals
    /// `expected`. Returns whether a row was written.
    async fn update_event(&mut self, event: &Event, expected: EventStatus) -> AppResult<bool>;

    /// Compare-and-set on the event status alone.
    async fn transition_event(
        &mut self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Deletes an event's registrations, then the event.
    async fn delete_event(&mut self, id: Uuid) -> AppResult<()>;

    /// Number of registrations for the event whose status is not CANCELED.
    async fn count_active_registrations(&mut self, event_id: Uuid) -> AppResult<i64>;

    /// Whether a non-cancelled registration for `event_id` references a
    /// ticket with this CPF, ignoring `exclude_ticket`.
    async fn cpf_registered(
        &mut self,
        event_id: Uuid,
        cpf: &str,
        exclude_ticket: Option<Uuid>,
    ) -> AppResult<bool>;

    async fn lock_ticket(&mut self, id: Uuid) -> AppResult<Option<Ticket>>;

    async fn insert_ticket(&mut self, ticket: &Ticket) -> AppResult<()>;

    /// Writes the identity fields and propagates a CPF change to the
    /// ticket's registrations.
    async fn update_ticket(&mut self, ticket: &Ticket) -> AppResult<()>;

    /// Deletes a ticket together with its registrations.
    async fn delete_ticket(&mut self, id: Uuid) -> AppResult<()>;

    /// Events in which the ticket holds a non-cancelled registration.
    async fn active_event_ids(&mut self, ticket_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn insert_registration(&mut self, registration: &Registration) -> AppResult<()>;

    async fn find_registration(
        &mut self,
        event_id: Uuid,
        ticket_id: Uuid,
    ) -> AppResult<Option<Registration>>;

    /// Moves a registration `from` → `to` only if it is still owned by
    /// `owner` and still in `from`. Returns the updated row, or `None` when
    /// no row matched.
    async fn transition_registration(
        &mut self,
        event_id: Uuid,
        ticket_id: Uuid,
        owner: CallerId,
        from: RegistrationStatus,
        to: RegistrationStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Registration>>;

    async fn commit(self) -> AppResult<()>;
}
