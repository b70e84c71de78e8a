use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use crate::models::{day_of_week, AvailabilityRule, DaySchedule, DoctorError, Slot};
use crate::repository::AvailabilityStore;

/// Expands weekly rules into concrete slots for a date.
///
/// Each active rule is walked from `start_time` in `slot_duration` steps; a
/// slot is emitted only when it ends at or before `end_time`, so a trailing
/// partial slot is dropped. The result is sorted by start time.
pub fn generate_slots(doctor_id: Uuid, date: NaiveDate, rules: &[AvailabilityRule]) -> Vec<Slot> {
    let weekday = day_of_week(date);
    let mut slots = Vec::new();

    for rule in rules
        .iter()
        .filter(|r| r.is_active && r.doctor_id == doctor_id && r.day_of_week == weekday)
    {
        if rule.slot_duration <= 0 {
            continue;
        }
        let step = Duration::minutes(rule.slot_duration as i64);
        let mut current = rule.start_time;

        loop {
            let (end, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 || end > rule.end_time {
                break;
            }
            slots.push(Slot {
                doctor_id,
                date,
                start_time: current,
                end_time: end,
                is_available: true,
            });
            current = end;
        }
    }

    slots.sort_by_key(|s| s.start_time);
    slots
}

/// Loads rules and leaves and produces the unannotated slot list for a day.
#[derive(Clone)]
pub struct SlotGenerator {
    store: Arc<dyn AvailabilityStore>,
}

impl SlotGenerator {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self { store }
    }

    pub async fn day_schedule(&self, doctor_id: Uuid, date: NaiveDate) -> Result<DaySchedule, DoctorError> {
        let rules = self.store.active_rules_for_day(doctor_id, day_of_week(date)).await?;
        let has_rules_for_day = !rules.is_empty();

        let on_leave = self.store.leave_covering(doctor_id, date).await?.is_some();

        let slots = if on_leave {
            Vec::new()
        } else {
            generate_slots(doctor_id, date, &rules)
        };

        debug!(
            "Generated {} slots for doctor {} on {} (rules: {}, on leave: {})",
            slots.len(), doctor_id, date, has_rules_for_day, on_leave
        );

        Ok(DaySchedule {
            doctor_id,
            date,
            has_rules_for_day,
            on_leave,
            slots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleWindow;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2030-01-07 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn rule(doctor_id: Uuid, start: NaiveTime, end: NaiveTime, duration: i32) -> AvailabilityRule {
        AvailabilityRule::new(
            doctor_id,
            RuleWindow {
                day_of_week: 1,
                start_time: start,
                end_time: end,
                slot_duration: duration,
            },
        )
    }

    #[test]
    fn test_even_window_produces_full_slots() {
        let doctor = Uuid::new_v4();
        let slots = generate_slots(doctor, monday(), &[rule(doctor, t(9, 0), t(11, 0), 30)]);

        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30)]);
        assert_eq!(slots.last().unwrap().end_time, t(11, 0));
        assert!(slots.iter().all(|s| s.is_available));
    }

    #[test]
    fn test_partial_trailing_slot_is_dropped() {
        let doctor = Uuid::new_v4();
        let slots = generate_slots(doctor, monday(), &[rule(doctor, t(9, 0), t(10, 0), 25)]);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].start_time, t(9, 25));
        assert_eq!(slots[1].end_time, t(9, 50));
    }

    #[test]
    fn test_inactive_and_other_weekday_rules_are_ignored() {
        let doctor = Uuid::new_v4();
        let mut inactive = rule(doctor, t(9, 0), t(10, 0), 30);
        inactive.is_active = false;

        let tuesday = NaiveDate::from_ymd_opt(2030, 1, 8).unwrap();
        assert!(generate_slots(doctor, monday(), &[inactive]).is_empty());
        assert!(generate_slots(doctor, tuesday, &[rule(doctor, t(9, 0), t(10, 0), 30)]).is_empty());
    }

    #[test]
    fn test_multiple_rules_are_merged_in_order() {
        let doctor = Uuid::new_v4();
        let rules = vec![
            rule(doctor, t(14, 0), t(15, 0), 30),
            rule(doctor, t(9, 0), t(10, 0), 30),
        ];
        let starts: Vec<NaiveTime> = generate_slots(doctor, monday(), &rules)
            .iter()
            .map(|s| s.start_time)
            .collect();
        assert_eq!(starts, vec![t(9, 0), t(9, 30), t(14, 0), t(14, 30)]);
    }

    #[test]
    fn test_window_ending_at_midnight_does_not_wrap() {
        let doctor = Uuid::new_v4();
        let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        let slots = generate_slots(doctor, monday(), &[rule(doctor, t(23, 0), end, 30)]);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, t(23, 0));
    }

    #[test]
    fn test_every_slot_lies_inside_its_rule() {
        let doctor = Uuid::new_v4();
        for duration in [5, 7, 15, 20, 45, 60] {
            let r = rule(doctor, t(8, 10), t(12, 40), duration);
            for slot in generate_slots(doctor, monday(), std::slice::from_ref(&r)) {
                assert!(slot.start_time >= r.start_time);
                assert!(slot.end_time <= r.end_time);
                let offset = (slot.start_time - r.start_time).num_minutes();
                assert_eq!(offset % duration as i64, 0);
                assert_eq!((slot.end_time - slot.start_time).num_minutes(), duration as i64);
            }
        }
    }
}
