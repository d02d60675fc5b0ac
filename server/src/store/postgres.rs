use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{Store, StoreTx, DUPLICATE_CPF_MESSAGE};
use crate::config::Config;
use crate::models::{
    CallerId, Event, EventFilter, EventStatus, EventSummary, Page, Registration,
    RegistrationStatus, SessionToken, Ticket, TicketDetails, TicketFilter, TicketListItem,
    TicketRegistration,
};
use crate::utils::error::{AppError, AppResult};

const EVENT_COLUMNS: &str = "id, name, description, date, start_time, end_time, location, \
     total_tickets, price, status, created_by, logo_url, created_at, updated_at";

const REGISTRATION_COLUMNS: &str =
    "event_id, ticket_id, user_id, qr_code, status, created_at, updated_at";

#[derive(FromRow)]
struct EventWithSold {
    #[sqlx(flatten)]
    event: Event,
    tickets_sold: i64,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `ILIKE` pattern matching `term` literally anywhere in the column.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_event_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    qb.push(" WHERE TRUE");
    if let Some(term) = filter.search_term() {
        let pattern = contains_pattern(term);
        qb.push(" AND (e.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR e.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR e.location ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(status) = filter.status {
        qb.push(" AND e.status = ").push_bind(status);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND e.date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND e.date <= ").push_bind(end);
    }
}

fn push_ticket_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    qb.push(" WHERE r.event_id = ").push_bind(filter.event_id);
    if let Some(term) = filter.search_term() {
        let pattern = contains_pattern(term);
        qb.push(" AND (t.cpf ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR t.full_name ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn find_event(&self, id: Uuid) -> AppResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> AppResult<(Vec<EventSummary>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        push_event_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT e.*, (SELECT COUNT(*) FROM registrations r \
             WHERE r.event_id = e.id AND r.status <> 'CANCELED') AS tickets_sold \
             FROM events e",
        );
        push_event_filters(&mut select, filter);
        select
            .push(" ORDER BY e.created_at DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select.build_query_as::<EventWithSold>().fetch_all(&self.pool).await?;
        let summaries = rows
            .into_iter()
            .map(|row| EventSummary::new(row.event, row.tickets_sold))
            .collect();
        Ok((summaries, total))
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> AppResult<(Vec<TicketListItem>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM registrations r JOIN tickets t ON t.id = r.ticket_id",
        );
        push_ticket_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT t.id, t.full_name, t.cpf, r.status \
             FROM registrations r JOIN tickets t ON t.id = r.ticket_id",
        );
        push_ticket_filters(&mut select, filter);
        select
            .push(" ORDER BY t.created_at DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select.build_query_as::<TicketListItem>().fetch_all(&self.pool).await?;
        Ok((items, total))
    }

    async fn find_ticket_details(&self, id: Uuid) -> AppResult<Option<TicketDetails>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(ticket) = ticket else {
            return Ok(None);
        };

        let registrations = sqlx::query_as::<_, TicketRegistration>(
            r#"
            SELECT e.id AS event_id, e.name AS event_name, e.date, e.location,
                   e.start_time, e.end_time, r.status, r.qr_code
            FROM registrations r
            JOIN events e ON e.id = r.event_id
            WHERE r.ticket_id = $1
            ORDER BY e.date
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(TicketDetails {
            ticket,
            registrations,
        }))
    }

    async fn find_session(&self, token_hash: &str) -> AppResult<Option<SessionToken>> {
        let session = sqlx::query_as::<_, SessionToken>(
            "SELECT user_id, token_hash, expires_at FROM auth_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn insert_session(&self, session: &SessionToken) -> AppResult<()> {
        sqlx::query("INSERT INTO auth_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_write(e, "Session token already exists"))?;
        Ok(())
    }

    async fn rotate_session(
        &self,
        old_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE auth_tokens SET token_hash = $2, expires_at = $3 WHERE token_hash = $1",
        )
        .bind(old_hash)
        .bind(new_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_write(e, "Session token already exists"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_session(&self, token_hash: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_event(&mut self, id: Uuid) -> AppResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(event)
    }

    async fn insert_event(&mut self, event: &Event) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events
                (id, name, description, date, start_time, end_time, location,
                 total_tickets, price, status, created_by, logo_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location)
        .bind(event.total_tickets)
        .bind(event.price)
        .bind(event.status)
        .bind(event.created_by)
        .bind(&event.logo_url)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::from_write(e, "Event already exists"))?;
        Ok(())
    }

    async fn update_event(&mut self, event: &Event, expected: EventStatus) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET name = $2, description = $3, date = $4, start_time = $5, end_time = $6,
                location = $7, total_tickets = $8, price = $9, logo_url = $10, updated_at = $11
            WHERE id = $1 AND status = $12
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location)
        .bind(event.total_tickets)
        .bind(event.price)
        .bind(&event.logo_url)
        .bind(event.updated_at)
        .bind(expected)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::from_write(e, "Event was modified concurrently"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn transition_event(
        &mut self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE events SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::from_write(e, "Event was modified concurrently"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_event(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM registrations WHERE event_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn count_active_registrations(&mut self, event_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status <> 'CANCELED'",
        )
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn cpf_registered(
        &mut self,
        event_id: Uuid,
        cpf: &str,
        exclude_ticket: Option<Uuid>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM registrations
                WHERE event_id = $1
                  AND cpf = $2
                  AND status <> 'CANCELED'
                  AND ($3::uuid IS NULL OR ticket_id <> $3)
            )
            "#,
        )
        .bind(event_id)
        .bind(cpf)
        .bind(exclude_ticket)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn lock_ticket(&mut self, id: Uuid) -> AppResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(ticket)
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, full_name, email, phone, birth_date, cpf, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(ticket.id)
        .bind(&ticket.full_name)
        .bind(&ticket.email)
        .bind(&ticket.phone)
        .bind(ticket.birth_date)
        .bind(&ticket.cpf)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE tickets
            SET full_name = $2, email = $3, phone = $4, birth_date = $5, cpf = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(ticket.id)
        .bind(&ticket.full_name)
        .bind(&ticket.email)
        .bind(&ticket.phone)
        .bind(ticket.birth_date)
        .bind(&ticket.cpf)
        .bind(ticket.updated_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("UPDATE registrations SET cpf = $2 WHERE ticket_id = $1 AND cpf <> $2")
            .bind(ticket.id)
            .bind(&ticket.cpf)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::from_write(e, DUPLICATE_CPF_MESSAGE))?;
        Ok(())
    }

    async fn delete_ticket(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM registrations WHERE ticket_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn active_event_ids(&mut self, ticket_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT event_id FROM registrations WHERE ticket_id = $1 AND status <> 'CANCELED'",
        )
        .bind(ticket_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn insert_registration(&mut self, registration: &Registration) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO registrations
                (event_id, ticket_id, user_id, cpf, qr_code, status, created_at, updated_at)
            SELECT $1, t.id, $3, t.cpf, $4, $5, $6, $7
            FROM tickets t
            WHERE t.id = $2
            "#,
        )
        .bind(registration.event_id)
        .bind(registration.ticket_id)
        .bind(registration.user_id)
        .bind(&registration.qr_code)
        .bind(registration.status)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::from_write(e, DUPLICATE_CPF_MESSAGE))?;

        if result.rows_affected() < 1 {
            return Err(AppError::NotFound(format!(
                "Ticket {} not found",
                registration.ticket_id
            )));
        }
        Ok(())
    }

    async fn find_registration(
        &mut self,
        event_id: Uuid,
        ticket_id: Uuid,
    ) -> AppResult<Option<Registration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 AND ticket_id = $2 FOR UPDATE"
        );
        let registration = sqlx::query_as::<_, Registration>(&sql)
            .bind(event_id)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(registration)
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
        let sql = format!(
            "UPDATE registrations SET status = $5, updated_at = $6 \
             WHERE event_id = $1 AND ticket_id = $2 AND user_id = $3 AND status = $4 \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        let registration = sqlx::query_as::<_, Registration>(&sql)
            .bind(event_id)
            .bind(ticket_id)
            .bind(owner.as_uuid())
            .bind(from)
            .bind(to)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(registration)
    }

    async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::from_write(e, "Transaction conflicted, retry the request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_wildcards_match_literally() {
        assert_eq!(contains_pattern("jazz"), "%jazz%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }
}
