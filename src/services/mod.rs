pub mod agent;
pub mod ai;
pub mod availability;
pub mod cache;
pub mod calendar;
pub mod guard;
pub mod lifecycle;
pub mod sync;
