//! Time windows in which a registration may change status.
//!
//! Confirmation happens at the door: on the event day, between its start
//! and end time (both inclusive). Cancellation is only possible strictly
//! before the event day. Calendar days are compared in UTC.

use chrono::{DateTime, Utc};

use crate::models::Event;
use crate::utils::error::{AppError, AppResult};

pub fn can_confirm(now: DateTime<Utc>, event: &Event) -> bool {
    is_event_day(now, event) && within_event_hours(now, event)
}

pub fn can_cancel(now: DateTime<Utc>, event: &Event) -> bool {
    event.date > now.date_naive()
}

pub fn check_confirm(now: DateTime<Utc>, event: &Event) -> AppResult<()> {
    if !is_event_day(now, event) {
        return Err(AppError::InvalidState(format!(
            "Entry can only be confirmed on the event day ({})",
            event.date
        )));
    }
    if !within_event_hours(now, event) {
        return Err(AppError::InvalidState(format!(
            "Entry can only be confirmed during event hours ({} - {})",
            event.start_time, event.end_time
        )));
    }
    Ok(())
}

pub fn check_cancel(now: DateTime<Utc>, event: &Event) -> AppResult<()> {
    if !can_cancel(now, event) {
        return Err(AppError::InvalidState(
            "Registration cannot be cancelled: event day already reached".to_string(),
        ));
    }
    Ok(())
}

fn is_event_day(now: DateTime<Utc>, event: &Event) -> bool {
    now.date_naive() == event.date
}

fn within_event_hours(now: DateTime<Utc>, event: &Event) -> bool {
    event.start_time <= now && now <= event.end_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn event_on(date: NaiveDate, start_hour: u32, end_hour: u32) -> Event {
        let at = |h: u32| Utc.from_utc_datetime(&date.and_hms_opt(h, 0, 0).unwrap());
        Event {
            id: Uuid::new_v4(),
            name: "Show".into(),
            description: None,
            date,
            start_time: at(start_hour),
            end_time: at(end_hour),
            location: "Arena".into(),
            total_tickets: 100,
            price: Decimal::ZERO,
            status: EventStatus::Active,
            created_by: Uuid::new_v4(),
            logo_url: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2031, 7, 20).unwrap()
    }

    #[test]
    fn test_confirm_inside_hours_on_event_day() {
        let event = event_on(day(), 18, 22);
        assert!(can_confirm(event.start_time, &event));
        assert!(can_confirm(event.start_time + Duration::hours(2), &event));
        assert!(can_confirm(event.end_time, &event));
    }

    #[test]
    fn test_confirm_rejected_outside_hours() {
        let event = event_on(day(), 18, 22);
        let early = event.start_time - Duration::minutes(1);
        let late = event.end_time + Duration::seconds(1);
        assert!(!can_confirm(early, &event));
        assert!(!can_confirm(late, &event));

        let err = check_confirm(early, &event).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(msg) if msg.contains("event hours")));
    }

    #[test]
    fn test_confirm_rejected_on_other_day() {
        let event = event_on(day(), 18, 22);
        let day_before = event.start_time - Duration::days(1);
        let err = check_confirm(day_before, &event).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(msg) if msg.contains("event day")));
    }

    #[test]
    fn test_cancel_only_strictly_before_event_day() {
        let event = event_on(day(), 18, 22);
        let midnight = Utc.from_utc_datetime(&day().and_hms_opt(0, 0, 0).unwrap());

        assert!(can_cancel(midnight - Duration::seconds(1), &event));
        assert!(!can_cancel(midnight, &event));
        assert!(!can_cancel(event.end_time + Duration::days(3), &event));
        assert!(check_cancel(midnight, &event).is_err());
    }
}
