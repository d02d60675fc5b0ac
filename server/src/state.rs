use std::sync::Arc;

use crate::services::{
    Clock, EnvironmentGuard, EventLifecycleManager, SessionAuth, TicketInventory,
};
use crate::store::Store;

/// Shared handler state: the services, all over one store.
pub struct AppState<S: Store> {
    pub events: EventLifecycleManager<S>,
    pub tickets: TicketInventory<S>,
    pub auth: SessionAuth<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, guard: Arc<dyn EnvironmentGuard>) -> Self {
        Self {
            events: EventLifecycleManager::new(store.clone(), clock.clone(), guard.clone()),
            tickets: TicketInventory::new(store.clone(), clock.clone(), guard),
            auth: SessionAuth::new(store, clock),
        }
    }
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            tickets: self.tickets.clone(),
            auth: self.auth.clone(),
        }
    }
}
