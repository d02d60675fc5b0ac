use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::Caller;
use crate::models::{BookSeat, Page, PageParams, RegistrationRef, TicketFilter, TicketPatch};
use crate::state::AppState;
use crate::store::Store;
use crate::utils::error::AppResult;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub event_id: Uuid,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_tickets<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Query(query): Query<ListTicketsQuery>,
) -> AppResult<Response> {
    let page = Page::try_from(PageParams {
        page: query.page,
        limit: query.limit,
    })?;
    let filter = TicketFilter {
        event_id: query.event_id,
        search: query.search,
    };
    let tickets = state.tickets.list_tickets(filter, page).await?;
    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn book_seat<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Json(input): Json<BookSeat>,
) -> AppResult<Response> {
    let registration = state.tickets.book_seat(input, caller).await?;
    Ok(created(registration, "Seat booked"))
}

pub async fn get_ticket<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let ticket = state.tickets.get_ticket(id).await?;
    Ok(success(ticket, "Ticket retrieved"))
}

pub async fn update_ticket<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<TicketPatch>,
) -> AppResult<Response> {
    let ticket = state.tickets.update_ticket_identity(id, patch).await?;
    Ok(success(ticket, "Ticket updated"))
}

pub async fn confirm_entry<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Json(target): Json<RegistrationRef>,
) -> AppResult<Response> {
    let registration = state
        .tickets
        .confirm_entry(target.event_id, target.ticket_id, caller)
        .await?;
    Ok(success(registration, "Entry confirmed"))
}

pub async fn cancel_ticket<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Json(target): Json<RegistrationRef>,
) -> AppResult<Response> {
    let registration = state
        .tickets
        .cancel_ticket(target.event_id, target.ticket_id, caller)
        .await?;
    Ok(success(registration, "Registration cancelled"))
}

pub async fn delete_ticket<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    state.tickets.remove_ticket_identity(id).await?;
    Ok(empty_success("Ticket deleted"))
}
