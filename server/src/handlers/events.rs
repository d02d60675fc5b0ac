use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::Caller;
use crate::models::{
    CreateEvent, EventFilter, EventPatch, EventStatus, Page, PageParams, UpdateEventStatus,
};
use crate::state::AppState;
use crate::store::Store;
use crate::utils::error::AppResult;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    pub search: Option<String>,
    pub status: Option<EventStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListEventsQuery {
    fn split(self) -> AppResult<(EventFilter, Page)> {
        let page = Page::try_from(PageParams {
            page: self.page,
            limit: self.limit,
        })?;
        let filter = EventFilter {
            search: self.search,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
        };
        Ok((filter, page))
    }
}

pub async fn list_events<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Query(query): Query<ListEventsQuery>,
) -> AppResult<Response> {
    let (filter, page) = query.split()?;
    let events = state.events.list_events(filter, page).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn create_event<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Json(input): Json<CreateEvent>,
) -> AppResult<Response> {
    let event = state.events.create_event(input, caller).await?;
    Ok(created(event, "Event created"))
}

pub async fn get_event<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let event = state.events.get_event(id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn update_event<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> AppResult<Response> {
    let event = state.events.update_event(id, patch).await?;
    Ok(success(event, "Event updated"))
}

pub async fn update_event_status<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEventStatus>,
) -> AppResult<Response> {
    let event = state.events.update_event_status(id, body.status).await?;
    Ok(success(event, "Event status updated"))
}

pub async fn delete_event<S: Store>(
    State(state): State<AppState<S>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    state.events.delete_event(id).await?;
    Ok(empty_success("Event deleted"))
}
