mod error;
mod time;
mod types;

pub use error::EventError;
pub use time::{parse_instant, resolve_zone};
pub use types::{Event, ParsedEvent, RawEvent, RawPayload};
