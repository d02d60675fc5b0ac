//! In-process [`Store`] used by the test suite and for running the API
//! without a database.
//!
//! A transaction owns the state mutex for its whole lifetime and works on a
//! copy, so transactions are fully serialized and an uncommitted one leaves
//! no trace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreTx, DUPLICATE_CPF_MESSAGE};
use crate::models::{
    CallerId, Event, EventFilter, EventStatus, EventSummary, Page, Registration,
    RegistrationStatus, SessionToken, Ticket, TicketDetails, TicketFilter, TicketListItem,
    TicketRegistration,
};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    events: HashMap<Uuid, Event>,
    tickets: HashMap<Uuid, Ticket>,
    registrations: Vec<Registration>,
    sessions: HashMap<String, SessionToken>,
}

impl MemoryState {
    fn active_count(&self, event_id: Uuid) -> i64 {
        self.registrations
            .iter()
            .filter(|r| r.event_id == event_id && r.status.is_active())
            .count() as i64
    }

    fn cpf_of(&self, ticket_id: Uuid) -> Option<&str> {
        self.tickets.get(&ticket_id).map(|t| t.cpf.as_str())
    }

    fn cpf_registered(&self, event_id: Uuid, cpf: &str, exclude: Option<Uuid>) -> bool {
        self.registrations.iter().any(|r| {
            r.event_id == event_id
                && r.status.is_active()
                && Some(r.ticket_id) != exclude
                && self.cpf_of(r.ticket_id) == Some(cpf)
        })
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let items = items.into_iter().skip(skip).take(page.limit as usize).collect();
    (items, total)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }

    async fn find_event(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> AppResult<(Vec<EventSummary>, i64)> {
        let state = self.state.lock().await;
        let mut events: Vec<&Event> = state.events.values().filter(|e| filter.matches(e)).collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let summaries = events
            .into_iter()
            .map(|e| EventSummary::new(e.clone(), state.active_count(e.id)))
            .collect();
        Ok(paginate(summaries, page))
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> AppResult<(Vec<TicketListItem>, i64)> {
        let state = self.state.lock().await;
        let mut rows: Vec<(&Ticket, RegistrationStatus)> = state
            .registrations
            .iter()
            .filter(|r| r.event_id == filter.event_id)
            .filter_map(|r| state.tickets.get(&r.ticket_id).map(|t| (t, r.status)))
            .filter(|(t, _)| filter.matches(t))
            .collect();
        rows.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        let items = rows
            .into_iter()
            .map(|(t, status)| TicketListItem {
                id: t.id,
                full_name: t.full_name.clone(),
                cpf: t.cpf.clone(),
                status,
            })
            .collect();
        Ok(paginate(items, page))
    }

    async fn find_ticket_details(&self, id: Uuid) -> AppResult<Option<TicketDetails>> {
        let state = self.state.lock().await;
        let Some(ticket) = state.tickets.get(&id) else {
            return Ok(None);
        };
        let registrations = state
            .registrations
            .iter()
            .filter(|r| r.ticket_id == id)
            .filter_map(|r| {
                state.events.get(&r.event_id).map(|e| TicketRegistration {
                    event_id: e.id,
                    event_name: e.name.clone(),
                    date: e.date,
                    location: e.location.clone(),
                    start_time: e.start_time,
                    end_time: e.end_time,
                    status: r.status,
                    qr_code: r.qr_code.clone(),
                })
            })
            .collect();
        Ok(Some(TicketDetails {
            ticket: ticket.clone(),
            registrations,
        }))
    }

    async fn find_session(&self, token_hash: &str) -> AppResult<Option<SessionToken>> {
        Ok(self.state.lock().await.sessions.get(token_hash).cloned())
    }

    async fn insert_session(&self, session: &SessionToken) -> AppResult<()> {
        self.state
            .lock()
            .await
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn rotate_session(
        &self,
        old_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(mut session) = state.sessions.remove(old_hash) else {
            return Ok(false);
        };
        session.token_hash = new_hash.to_string();
        session.expires_at = expires_at;
        state.sessions.insert(new_hash.to_string(), session);
        Ok(true)
    }

    async fn delete_session(&self, token_hash: &str) -> AppResult<()> {
        self.state.lock().await.sessions.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_event(&mut self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn insert_event(&mut self, event: &Event) -> AppResult<()> {
        if self.working.events.contains_key(&event.id) {
            return Err(AppError::Conflict(format!("Event {} already exists", event.id)));
        }
        self.working.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&mut self, event: &Event, expected: EventStatus) -> AppResult<bool> {
        match self.working.events.get_mut(&event.id) {
            Some(stored) if stored.status == expected => {
                *stored = event.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_event(
        &mut self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        match self.working.events.get_mut(&id) {
            Some(stored) if stored.status == from => {
                stored.status = to;
                stored.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_event(&mut self, id: Uuid) -> AppResult<()> {
        self.working.registrations.retain(|r| r.event_id != id);
        self.working.events.remove(&id);
        Ok(())
    }

    async fn count_active_registrations(&mut self, event_id: Uuid) -> AppResult<i64> {
        Ok(self.working.active_count(event_id))
    }

    async fn cpf_registered(
        &mut self,
        event_id: Uuid,
        cpf: &str,
        exclude_ticket: Option<Uuid>,
    ) -> AppResult<bool> {
        Ok(self.working.cpf_registered(event_id, cpf, exclude_ticket))
    }

    async fn lock_ticket(&mut self, id: Uuid) -> AppResult<Option<Ticket>> {
        Ok(self.working.tickets.get(&id).cloned())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> AppResult<()> {
        self.working.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> AppResult<()> {
        // Same guarantee as the partial unique index in Postgres.
        let clash = self
            .working
            .registrations
            .iter()
            .filter(|r| r.ticket_id == ticket.id && r.status.is_active())
            .any(|r| {
                self.working
                    .cpf_registered(r.event_id, &ticket.cpf, Some(ticket.id))
            });
        if clash {
            return Err(AppError::Conflict(DUPLICATE_CPF_MESSAGE.to_string()));
        }
        self.working.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn delete_ticket(&mut self, id: Uuid) -> AppResult<()> {
        self.working.registrations.retain(|r| r.ticket_id != id);
        self.working.tickets.remove(&id);
        Ok(())
    }

    async fn active_event_ids(&mut self, ticket_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .working
            .registrations
            .iter()
            .filter(|r| r.ticket_id == ticket_id && r.status.is_active())
            .map(|r| r.event_id)
            .collect())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> AppResult<()> {
        let Some(cpf) = self.working.cpf_of(registration.ticket_id) else {
            return Err(AppError::NotFound(format!(
                "Ticket {} not found",
                registration.ticket_id
            )));
        };
        if registration.status.is_active()
            && self
                .working
                .cpf_registered(registration.event_id, cpf, None)
        {
            return Err(AppError::Conflict(DUPLICATE_CPF_MESSAGE.to_string()));
        }
        let key_taken = self.working.registrations.iter().any(|r| {
            r.event_id == registration.event_id && r.ticket_id == registration.ticket_id
        });
        if key_taken {
            return Err(AppError::Conflict(
                "Ticket is already registered for this event".to_string(),
            ));
        }
        self.working.registrations.push(registration.clone());
        Ok(())
    }

    async fn find_registration(
        &mut self,
        event_id: Uuid,
        ticket_id: Uuid,
    ) -> AppResult<Option<Registration>> {
        Ok(self
            .working
            .registrations
            .iter()
            .find(|r| r.event_id == event_id && r.ticket_id == ticket_id)
            .cloned())
    }

    async fn transition_registration(
        &mut self,
        event_id: Uuid,
        ticket_id: Uuid,
        owner: CallerId,
        from: RegistrationStatus,
        to: RegistrationStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Registration>> {
        let row = self.working.registrations.iter_mut().find(|r| {
            r.event_id == event_id
                && r.ticket_id == ticket_id
                && r.user_id == owner.as_uuid()
                && r.status == from
        });
        Ok(row.map(|r| {
            r.status = to;
            r.updated_at = at;
            r.clone()
        }))
    }

    async fn commit(self) -> AppResult<()> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
