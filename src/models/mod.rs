pub mod block;
pub mod booking;
pub mod cleaner;
pub mod command;
pub mod interval;
pub mod property;

pub use block::{AvailabilityBlock, BlockSource};
pub use booking::{Booking, BookingStatus};
pub use cleaner::{Cleaner, SyncStatus};
pub use command::AgentCommand;
pub use interval::{format_minutes, parse_time, TimeRange};
pub use property::{Owner, Property};
