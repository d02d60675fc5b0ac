use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CallerId, CreateEvent, Event, EventFilter, EventPatch, EventStatus, EventSummary, Page,
    Paginated,
};
use crate::services::auth::EnvironmentGuard;
use crate::services::clock::Clock;
use crate::services::tickets::TicketInventory;
use crate::services::validation::{
    ensure_non_negative_price, ensure_not_in_past, ensure_positive_capacity, ensure_present,
    ensure_time_order,
};
use crate::store::{Store, StoreTx};
use crate::utils::error::{AppError, AppResult};

fn event_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Event {id} not found"))
}

fn describe(statuses: &[EventStatus]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(EventStatus::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Owns event creation, edits, and the event status state machine.
pub struct EventLifecycleManager<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    guard: Arc<dyn EnvironmentGuard>,
}

impl<S: Store> Clone for EventLifecycleManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<S: Store> EventLifecycleManager<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, guard: Arc<dyn EnvironmentGuard>) -> Self {
        Self {
            store,
            clock,
            guard,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_event(&self, input: CreateEvent, caller: CallerId) -> AppResult<Event> {
        ensure_present("name", &input.name)?;
        ensure_present("location", &input.location)?;
        ensure_not_in_past(input.date, self.clock.today())?;
        ensure_time_order(input.start_time, input.end_time)?;
        ensure_positive_capacity(input.total_tickets)?;
        ensure_non_negative_price(input.price)?;

        let now = self.clock.now();
        let event = Event {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            date: input.date,
            start_time: input.start_time,
            end_time: input.end_time,
            location: input.location,
            total_tickets: input.total_tickets,
            price: input.price,
            status: EventStatus::Pending,
            created_by: caller.as_uuid(),
            logo_url: input.logo_url,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_event(&event).await?;
        tx.commit().await?;

        info!(event_id = %event.id, created_by = %caller, "Event created");
        Ok(event)
    }

    pub async fn get_event(&self, id: Uuid) -> AppResult<Event> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| event_not_found(id))
    }

    pub async fn list_events(
        &self,
        filter: EventFilter,
        page: Page,
    ) -> AppResult<Paginated<EventSummary>> {
        let (events, total) = self.store.list_events(&filter, page).await?;
        Ok(Paginated::new(events, total, page))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_event(&self, id: Uuid, patch: EventPatch) -> AppResult<Event> {
        let mut tx = self.store.begin().await?;
        let mut event = tx.lock_event(id).await?.ok_or_else(|| event_not_found(id))?;
        let now = self.clock.now();

        if event.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Cannot edit an event that is {}",
                event.status
            )));
        }
        if event.status == EventStatus::Active && now >= event.start_time {
            return Err(AppError::InvalidState(
                "Cannot edit an event that is already in progress".to_string(),
            ));
        }

        if let Some(name) = &patch.name {
            ensure_present("name", name)?;
        }
        if let Some(location) = &patch.location {
            ensure_present("location", location)?;
        }
        if let Some(date) = patch.date {
            ensure_not_in_past(date, self.clock.today())?;
        }
        ensure_time_order(
            patch.start_time.unwrap_or(event.start_time),
            patch.end_time.unwrap_or(event.end_time),
        )?;
        if let Some(total_tickets) = patch.total_tickets {
            // Zero is reported against the sold count; negatives are bad input.
            if total_tickets < 0 {
                ensure_positive_capacity(total_tickets)?;
            }
            let sold = TicketInventory::<S>::sold_count(&mut tx, id).await?;
            if i64::from(total_tickets) < sold {
                return Err(AppError::InvalidState(format!(
                    "Cannot reduce capacity to {total_tickets} tickets: {total_tickets} < {sold} sold"
                )));
            }
            ensure_positive_capacity(total_tickets)?;
        }
        if let Some(price) = patch.price {
            ensure_non_negative_price(price)?;
        }

        let expected = event.status;
        patch.apply_to(&mut event);
        event.updated_at = now;

        if !tx.update_event(&event, expected).await? {
            return Err(AppError::Conflict(
                "Event was modified concurrently, retry the request".to_string(),
            ));
        }
        tx.commit().await?;

        info!(event_id = %id, "Event updated");
        Ok(event)
    }

    #[instrument(skip(self))]
    pub async fn update_event_status(&self, id: Uuid, next: EventStatus) -> AppResult<Event> {
        let mut tx = self.store.begin().await?;
        let mut event = tx.lock_event(id).await?.ok_or_else(|| event_not_found(id))?;
        let current = event.status;
        let now = self.clock.now();

        if current == next {
            return Err(AppError::InvalidState(format!(
                "Event is already in that status ({current})"
            )));
        }
        if !current.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "Cannot move event from {current} to {next}; allowed: {}",
                describe(current.allowed_transitions())
            )));
        }
        if next == EventStatus::Active && event.date < now.date_naive() {
            return Err(AppError::InvalidState(
                "Cannot activate event: its date already passed".to_string(),
            ));
        }
        if next == EventStatus::Completed && now < event.end_time {
            return Err(AppError::InvalidState(
                "Cannot complete event before its end time".to_string(),
            ));
        }

        if !tx.transition_event(id, current, next, now).await? {
            return Err(AppError::Conflict(
                "Event status changed concurrently, retry the request".to_string(),
            ));
        }
        tx.commit().await?;

        event.status = next;
        event.updated_at = now;
        info!(event_id = %id, from = %current, to = %next, "Event status changed");
        Ok(event)
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, id: Uuid) -> AppResult<()> {
        self.guard.assert_mutable_environment()?;

        let mut tx = self.store.begin().await?;
        if tx.lock_event(id).await?.is_none() {
            return Err(event_not_found(id));
        }
        tx.delete_event(id).await?;
        tx.commit().await?;

        info!(event_id = %id, "Event deleted with its registrations");
        Ok(())
    }
}
