pub mod clock;
pub mod ledger;
pub mod lifecycle;
pub mod notification;
pub mod scheduling;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ledger::BookingLedger;
pub use lifecycle::AppointmentLifecycle;
pub use notification::NotificationFeed;
pub use scheduling::SchedulingService;
