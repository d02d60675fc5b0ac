pub mod auth;
pub mod booking_window;
pub mod clock;
pub mod events;
pub mod tickets;
pub mod validation;

pub use auth::{CallerResolver, EnvironmentGuard, SessionAuth};
pub use clock::{Clock, FixedClock, SystemClock};
pub use events::EventLifecycleManager;
pub use tickets::TicketInventory;
