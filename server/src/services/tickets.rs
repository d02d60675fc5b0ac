use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    BookSeat, CallerId, Event, Page, Paginated, Registration, RegistrationStatus, Ticket, TicketDetails,
    TicketFilter, TicketListItem, TicketPatch,
};
use crate::services::auth::EnvironmentGuard;
use crate::services::booking_window::{check_cancel, check_confirm};
use crate::services::clock::Clock;
use crate::services::validation::{
    ensure_birth_date, ensure_email, ensure_present, normalize_cpf, qr_token,
};
use crate::store::{Store, StoreTx, DUPLICATE_CPF_MESSAGE};
use crate::utils::error::{AppError, AppResult};

fn ticket_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Ticket {id} not found"))
}

fn registration_not_found(event_id: Uuid, ticket_id: Uuid) -> AppError {
    AppError::NotFound(format!(
        "No registration of ticket {ticket_id} for event {event_id}"
    ))
}

#[derive(Debug, Clone, Copy)]
enum Closing {
    Confirm,
    Cancel,
}

impl Closing {
    fn target(self) -> RegistrationStatus {
        match self {
            Closing::Confirm => RegistrationStatus::Confirmed,
            Closing::Cancel => RegistrationStatus::Canceled,
        }
    }

    fn check_window(self, now: DateTime<Utc>, event: &Event) -> AppResult<()> {
        match self {
            Closing::Confirm => check_confirm(now, event),
            Closing::Cancel => check_cancel(now, event),
        }
    }
}

/// Registration side of the system: seat booking, attendee identity, and
/// the PENDING → CONFIRMED / CANCELED transitions.
pub struct TicketInventory<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    guard: Arc<dyn EnvironmentGuard>,
}

impl<S: Store> Clone for TicketInventory<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<S: Store> TicketInventory<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, guard: Arc<dyn EnvironmentGuard>) -> Self {
        Self {
            store,
            clock,
            guard,
        }
    }

    /// Seats taken in an event: registrations that are not CANCELED.
    pub async fn sold_count(tx: &mut S::Tx, event_id: Uuid) -> AppResult<i64> {
        tx.count_active_registrations(event_id).await
    }

    #[instrument(skip(self, input), fields(event_id = %input.event_id))]
    pub async fn book_seat(&self, input: BookSeat, caller: CallerId) -> AppResult<Registration> {
        ensure_present("full_name", &input.full_name)?;
        ensure_present("phone", &input.phone)?;
        ensure_email(&input.email)?;
        ensure_birth_date(input.birth_date, self.clock.today())?;
        let cpf = normalize_cpf(&input.cpf)?;

        let mut tx = self.store.begin().await?;
        let event = tx
            .lock_event(input.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", input.event_id)))?;

        let sold = Self::sold_count(&mut tx, event.id).await?;
        if sold >= i64::from(event.total_tickets) {
            warn!(event_id = %event.id, sold, "Booking rejected: sold out");
            return Err(AppError::Conflict(format!(
                "Event is sold out ({sold} of {} tickets taken)",
                event.total_tickets
            )));
        }
        if tx.cpf_registered(event.id, &cpf, None).await? {
            return Err(AppError::Conflict(DUPLICATE_CPF_MESSAGE.to_string()));
        }

        let now = self.clock.now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            full_name: input.full_name,
            email: input.email,
            phone: input.phone,
            birth_date: input.birth_date,
            cpf,
            created_at: now,
            updated_at: now,
        };
        let registration = Registration {
            event_id: event.id,
            ticket_id: ticket.id,
            user_id: caller.as_uuid(),
            qr_code: qr_token(&ticket.cpf),
            status: RegistrationStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        tx.insert_ticket(&ticket).await?;
        tx.insert_registration(&registration).await?;
        tx.commit().await?;

        info!(
            event_id = %event.id,
            ticket_id = %ticket.id,
            booked_by = %caller,
            seats_left = i64::from(event.total_tickets) - sold - 1,
            "Seat booked"
        );
        Ok(registration)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_ticket_identity(
        &self,
        id: Uuid,
        mut patch: TicketPatch,
    ) -> AppResult<Ticket> {
        if let Some(full_name) = &patch.full_name {
            ensure_present("full_name", full_name)?;
        }
        if let Some(phone) = &patch.phone {
            ensure_present("phone", phone)?;
        }
        if let Some(email) = &patch.email {
            ensure_email(email)?;
        }
        if let Some(birth_date) = patch.birth_date {
            ensure_birth_date(birth_date, self.clock.today())?;
        }
        patch.cpf = patch.cpf.as_deref().map(normalize_cpf).transpose()?;

        let mut tx = self.store.begin().await?;
        let mut ticket = tx.lock_ticket(id).await?.ok_or_else(|| ticket_not_found(id))?;

        if let Some(cpf) = patch.cpf.as_deref().filter(|cpf| *cpf != ticket.cpf) {
            for event_id in tx.active_event_ids(id).await? {
                if tx.cpf_registered(event_id, cpf, Some(id)).await? {
                    return Err(AppError::Conflict(DUPLICATE_CPF_MESSAGE.to_string()));
                }
            }
        }

        patch.apply_to(&mut ticket);
        ticket.updated_at = self.clock.now();
        tx.update_ticket(&ticket).await?;
        tx.commit().await?;

        info!(ticket_id = %id, "Ticket identity updated");
        Ok(ticket)
    }

    pub async fn confirm_entry(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        caller: CallerId,
    ) -> AppResult<Registration> {
        self.close_registration(event_id, ticket_id, caller, Closing::Confirm)
            .await
    }

    pub async fn cancel_ticket(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        caller: CallerId,
    ) -> AppResult<Registration> {
        self.close_registration(event_id, ticket_id, caller, Closing::Cancel)
            .await
    }

    /// Moves a PENDING registration to `target`. Ownership and status are
    /// read first so NotFound, InvalidState and AuthError stay distinct; the
    /// write itself is still conditioned on owner and PENDING.
    #[instrument(skip(self))]
    async fn close_registration(
        &self,
        event_id: Uuid,
        ticket_id: Uuid,
        caller: CallerId,
        closing: Closing,
    ) -> AppResult<Registration> {
        let target = closing.target();
        let mut tx = self.store.begin().await?;
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| registration_not_found(event_id, ticket_id))?;
        let registration = tx
            .find_registration(event_id, ticket_id)
            .await?
            .ok_or_else(|| registration_not_found(event_id, ticket_id))?;

        if registration.status != RegistrationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Registration already confirmed or cancelled ({})",
                registration.status
            )));
        }

        let now = self.clock.now();
        closing.check_window(now, &event)?;

        if registration.user_id != caller.as_uuid() {
            warn!(%event_id, %ticket_id, %caller, "Registration change by non-owner refused");
            return Err(AppError::AuthError(
                "Registration belongs to another user".to_string(),
            ));
        }

        let updated = tx
            .transition_registration(
                event_id,
                ticket_id,
                caller,
                RegistrationStatus::Pending,
                target,
                now,
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Registration changed concurrently, retry the request".to_string())
            })?;
        tx.commit().await?;

        info!(%event_id, %ticket_id, status = %target, "Registration closed");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn remove_ticket_identity(&self, id: Uuid) -> AppResult<()> {
        self.guard.assert_mutable_environment()?;

        let mut tx = self.store.begin().await?;
        if tx.lock_ticket(id).await?.is_none() {
            return Err(ticket_not_found(id));
        }
        tx.delete_ticket(id).await?;
        tx.commit().await?;

        info!(ticket_id = %id, "Ticket removed with its registrations");
        Ok(())
    }

    pub async fn list_tickets(
        &self,
        filter: TicketFilter,
        page: Page,
    ) -> AppResult<Paginated<TicketListItem>> {
        if self.store.find_event(filter.event_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Event {} not found",
                filter.event_id
            )));
        }
        let (items, total) = self.store.list_tickets(&filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn get_ticket(&self, id: Uuid) -> AppResult<TicketDetails> {
        self.store
            .find_ticket_details(id)
            .await?
            .ok_or_else(|| ticket_not_found(id))
    }
}
