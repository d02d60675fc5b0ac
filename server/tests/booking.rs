mod common;

use chrono::Duration;
use uuid::Uuid;

use boxoffice_server::config::AppEnvironment;
use boxoffice_server::models::{
    CallerId, EventPatch, Page, RegistrationStatus, TicketFilter, TicketPatch,
};
use boxoffice_server::services::validation::qr_token;
use boxoffice_server::utils::error::AppError;

use common::{attendee, event_day, on_event_day, seat, Harness};

#[tokio::test]
async fn test_book_seat_creates_pending_registration() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    let caller = attendee();

    let registration = h.book(event.id, "123.456.789-01", caller).await;

    assert_eq!(registration.status, RegistrationStatus::Pending);
    assert_eq!(registration.user_id, caller.as_uuid());
    assert_eq!(registration.qr_code, qr_token("12345678901"));

    let details = h.state.tickets.get_ticket(registration.ticket_id).await.unwrap();
    assert_eq!(details.ticket.cpf, "12345678901");
    assert_eq!(details.registrations.len(), 1);
    assert_eq!(details.registrations[0].event_name, event.name);
}

#[tokio::test]
async fn test_book_seat_validates_attendee() {
    let h = Harness::new();
    let event = h.create_event(10).await;

    let bad_cpf = seat(event.id, "1234");
    let mut bad_email = seat(event.id, "12345678901");
    bad_email.email = "maria.example.com".to_string();
    let mut unborn = seat(event.id, "12345678901");
    unborn.birth_date = event_day();
    let mut blank_name = seat(event.id, "12345678901");
    blank_name.full_name = "   ".to_string();

    for input in [bad_cpf, bad_email, unborn, blank_name] {
        let err = h.state.tickets.book_seat(input, attendee()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)), "{err:?}");
    }

    let err = h
        .state
        .tickets
        .book_seat(seat(Uuid::new_v4(), "12345678901"), attendee())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_same_cpf_cannot_book_twice() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    h.book(event.id, "12345678901", attendee()).await;

    let err = h
        .state
        .tickets
        .book_seat(seat(event.id, "123.456.789-01"), attendee())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(msg) if msg.contains("duplicate registration")));
}

#[tokio::test]
async fn test_cancelled_cpf_can_book_again() {
    let h = Harness::new();
    let event = h.create_event(1).await;
    let caller = attendee();
    let first = h.book(event.id, "12345678901", caller).await;

    h.state
        .tickets
        .cancel_ticket(event.id, first.ticket_id, caller)
        .await
        .unwrap();

    let second = h.book(event.id, "12345678901", caller).await;
    assert_ne!(second.ticket_id, first.ticket_id);
    assert_eq!(second.qr_code, first.qr_code);
}

#[tokio::test]
async fn test_sold_out_event_rejects_booking() {
    let h = Harness::new();
    let event = h.create_event(2).await;
    h.book(event.id, "11111111111", attendee()).await;
    h.book(event.id, "22222222222", attendee()).await;

    let err = h
        .state
        .tickets
        .book_seat(seat(event.id, "33333333333"), attendee())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(msg) if msg.contains("sold out")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_never_oversell() {
    let h = Harness::new();
    let event = h.create_event(1).await;

    let handles: Vec<_> = ["11111111111", "22222222222", "33333333333", "44444444444"]
        .into_iter()
        .map(|cpf| {
            let tickets = h.state.tickets.clone();
            let input = seat(event.id, cpf);
            tokio::spawn(async move { tickets.book_seat(input, attendee()).await })
        })
        .collect();

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(AppError::Conflict(msg)) => assert!(msg.contains("sold out")),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(booked, 1);

    let listed = h
        .state
        .tickets
        .list_tickets(
            TicketFilter {
                event_id: event.id,
                search: None,
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(listed.meta.total, 1);
}

#[tokio::test]
async fn test_confirm_only_during_event_hours() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    let caller = attendee();
    let registration = h.book(event.id, "12345678901", caller).await;
    let tickets = &h.state.tickets;

    let err = tickets
        .confirm_entry(event.id, registration.ticket_id, caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(msg) if msg.contains("event day")));

    h.clock.set(on_event_day(17, 59));
    let err = tickets
        .confirm_entry(event.id, registration.ticket_id, caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(msg) if msg.contains("event hours")));

    h.clock.set(on_event_day(18, 0));
    let confirmed = tickets
        .confirm_entry(event.id, registration.ticket_id, caller)
        .await
        .unwrap();
    assert_eq!(confirmed.status, RegistrationStatus::Confirmed);

    let err = tickets
        .confirm_entry(event.id, registration.ticket_id, caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(msg) if msg.contains("already confirmed or cancelled")));
}

#[tokio::test]
async fn test_cancel_closes_on_event_day() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    let caller = attendee();
    let registration = h.book(event.id, "12345678901", caller).await;

    h.clock.set(on_event_day(0, 0));
    let err = h
        .state
        .tickets
        .cancel_ticket(event.id, registration.ticket_id, caller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(msg) if msg.contains("event day already reached")));

    h.clock.set(on_event_day(0, 0) - Duration::seconds(1));
    let cancelled = h
        .state
        .tickets
        .cancel_ticket(event.id, registration.ticket_id, caller)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RegistrationStatus::Canceled);
}

#[tokio::test]
async fn test_non_owner_cannot_cancel() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    let owner = attendee();
    let registration = h.book(event.id, "12345678901", owner).await;
    let stranger = CallerId(Uuid::new_v4());

    let err = h
        .state
        .tickets
        .cancel_ticket(event.id, registration.ticket_id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AuthError(_)));

    let details = h.state.tickets.get_ticket(registration.ticket_id).await.unwrap();
    assert_eq!(details.registrations[0].status, RegistrationStatus::Pending);

    let err = h
        .state
        .tickets
        .cancel_ticket(event.id, Uuid::new_v4(), owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_cancelled_seat_is_released() {
    let h = Harness::new();
    let event = h.create_event(1).await;
    let caller = attendee();
    let registration = h.book(event.id, "11111111111", caller).await;
    h.state
        .tickets
        .cancel_ticket(event.id, registration.ticket_id, caller)
        .await
        .unwrap();

    h.book(event.id, "22222222222", attendee()).await;

    let patch = EventPatch {
        total_tickets: Some(1),
        ..Default::default()
    };
    assert!(h.state.events.update_event(event.id, patch).await.is_ok());
}

#[tokio::test]
async fn test_identity_update_rechecks_cpf() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    h.book(event.id, "11111111111", attendee()).await;
    let other = h.book(event.id, "22222222222", attendee()).await;

    let clash = TicketPatch {
        cpf: Some("111.111.111-11".to_string()),
        ..Default::default()
    };
    let err = h
        .state
        .tickets
        .update_ticket_identity(other.ticket_id, clash)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(msg) if msg.contains("duplicate registration")));

    let rename = TicketPatch {
        full_name: Some("Maria S. Souza".to_string()),
        cpf: Some("22222222222".to_string()),
        ..Default::default()
    };
    let ticket = h
        .state
        .tickets
        .update_ticket_identity(other.ticket_id, rename)
        .await
        .unwrap();
    assert_eq!(ticket.full_name, "Maria S. Souza");
    assert_eq!(ticket.cpf, "22222222222");
}

#[tokio::test]
async fn test_list_tickets_searches_by_name_or_cpf() {
    let h = Harness::new();
    let event = h.create_event(10).await;
    h.book(event.id, "11111111111", attendee()).await;
    let mut joao = seat(event.id, "22222222222");
    joao.full_name = "Joao Pereira".to_string();
    h.state.tickets.book_seat(joao, attendee()).await.unwrap();

    let by_name = h
        .state
        .tickets
        .list_tickets(
            TicketFilter {
                event_id: event.id,
                search: Some("joao".to_string()),
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_name.data.len(), 1);
    assert_eq!(by_name.data[0].cpf, "22222222222");

    let by_cpf = h
        .state
        .tickets
        .list_tickets(
            TicketFilter {
                event_id: event.id,
                search: Some("1111".to_string()),
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_cpf.data.len(), 1);

    let err = h
        .state
        .tickets
        .list_tickets(
            TicketFilter {
                event_id: Uuid::new_v4(),
                search: None,
            },
            Page::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_remove_ticket_identity_is_gated() {
    let prod = Harness::in_environment(AppEnvironment::Production);
    let event = prod.create_event(10).await;
    let registration = prod.book(event.id, "12345678901", attendee()).await;
    let err = prod
        .state
        .tickets
        .remove_ticket_identity(registration.ticket_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let dev = Harness::new();
    let event = dev.create_event(1).await;
    let registration = dev.book(event.id, "12345678901", attendee()).await;
    dev.state
        .tickets
        .remove_ticket_identity(registration.ticket_id)
        .await
        .unwrap();
    assert!(matches!(
        dev.state.tickets.get_ticket(registration.ticket_id).await,
        Err(AppError::NotFound(_))
    ));
    dev.book(event.id, "12345678901", attendee()).await;
}
