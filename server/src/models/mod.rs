pub mod event;
pub mod pagination;
pub mod ticket;
pub mod user;

pub use event::{
    CreateEvent, Event, EventFilter, EventPatch, EventStatus, EventSummary, UpdateEventStatus,
};
pub use pagination::{Page, PageMeta, PageParams, Paginated};
pub use ticket::{
    BookSeat, Registration, RegistrationRef, RegistrationStatus, Ticket, TicketDetails,
    TicketFilter, TicketListItem, TicketPatch, TicketRegistration,
};
pub use user::{CallerId, IssuedToken, SessionToken};
