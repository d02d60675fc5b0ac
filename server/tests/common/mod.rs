#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use boxoffice_server::config::AppEnvironment;
use boxoffice_server::models::{BookSeat, CallerId, CreateEvent, Event, Registration};
use boxoffice_server::services::Clock;
use boxoffice_server::state::AppState;
use boxoffice_server::store::MemoryStore;

/// Clock the test moves by hand.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn event_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 7, 20).unwrap()
}

pub fn on_event_day(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&event_day().and_hms_opt(hour, minute, 0).unwrap())
}

/// A week before the event day.
pub fn week_before() -> DateTime<Utc> {
    on_event_day(12, 0) - Duration::days(7)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub state: AppState<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::in_environment(AppEnvironment::Test)
    }

    pub fn in_environment(environment: AppEnvironment) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(week_before()));
        let state = AppState::new(store.clone(), clock.clone(), Arc::new(environment));
        Self {
            store,
            clock,
            state,
        }
    }

    pub async fn create_event(&self, total_tickets: i32) -> Event {
        self.state
            .events
            .create_event(new_event(total_tickets), organizer())
            .await
            .unwrap()
    }

    pub async fn book(&self, event_id: Uuid, cpf: &str, caller: CallerId) -> Registration {
        self.state
            .tickets
            .book_seat(seat(event_id, cpf), caller)
            .await
            .unwrap()
    }
}

pub fn organizer() -> CallerId {
    CallerId(Uuid::from_u128(1))
}

pub fn attendee() -> CallerId {
    CallerId(Uuid::new_v4())
}

pub fn new_event(total_tickets: i32) -> CreateEvent {
    CreateEvent {
        name: "Rust Meetup".to_string(),
        description: Some("Monthly meetup".to_string()),
        date: event_day(),
        start_time: on_event_day(18, 0),
        end_time: on_event_day(22, 0),
        location: "Sao Paulo".to_string(),
        total_tickets,
        price: Decimal::new(4990, 2),
        logo_url: None,
    }
}

pub fn seat(event_id: Uuid, cpf: &str) -> BookSeat {
    BookSeat {
        event_id,
        full_name: "Maria Silva".to_string(),
        email: "maria@example.com".to_string(),
        phone: "+55 11 99999-0000".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
        cpf: cpf.to_string(),
    }
}
