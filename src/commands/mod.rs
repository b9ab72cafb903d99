pub mod calendars;
pub mod capabilities;
pub mod expand;
pub mod sync;
