use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{auth, events, health_check, tickets};
use crate::state::AppState;
use crate::store::Store;

pub fn create_routes<S: Store>(state: AppState<S>, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/events", event_routes())
        .nest("/tickets", ticket_routes())
        .nest("/auth", auth_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.environment))
        .layer(create_cors_layer(config))
}

fn event_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(events::list_events::<S>).post(events::create_event::<S>))
        .route(
            "/:id",
            get(events::get_event::<S>)
                .patch(events::update_event::<S>)
                .delete(events::delete_event::<S>),
        )
        .route("/:id/status", patch(events::update_event_status::<S>))
}

fn ticket_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(tickets::list_tickets::<S>).post(tickets::book_seat::<S>))
        .route("/confirm", patch(tickets::confirm_entry::<S>))
        .route("/cancel", patch(tickets::cancel_ticket::<S>))
        .route(
            "/:id",
            get(tickets::get_ticket::<S>)
                .patch(tickets::update_ticket::<S>)
                .delete(tickets::delete_ticket::<S>),
        )
}

fn auth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/refresh", post(auth::refresh_session::<S>))
        .route("/logout", post(auth::logout::<S>))
}
