//! Best-effort reader for iCalendar feeds.
//!
//! A document is split into its `VEVENT` blocks and the calendar-level
//! remainder, each block is decoded field by field, and `RRULE`s are expanded
//! into a bounded list of concrete occurrences.
//!
//! ```no_run
//! use ics_feed::Parser;
//!
//! let parser = Parser::from_file("calendar.ics")?;
//! for event in parser.events() {
//!     println!("{} {}", event.start, event.summary);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

#[macro_use]
extern crate pest_derive;

pub mod components;
pub mod document;
pub mod error;
pub mod parameters;
pub mod parser;
pub mod property;
pub mod recurrence;
pub mod timezone;

pub use components::{Attendee, Calendar, CalendarRef, Event, Geo};
pub use document::{Parser, ParserOptions};
pub use error::ParseError;
pub use timezone::{ChronoTzResolver, TimezoneResolver};

/// Timed date-time literal, always read as UTC wall-clock digits.
pub const ICS_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Date-only literal used by whole-day events.
pub const ICS_FORMAT_WHOLE_DAY: &str = "%Y%m%d";

/// Human readable instant format, used for generated identifiers.
pub const YMD_HIS: &str = "%Y-%m-%d %H:%M:%S";

/// Occurrence budget of a rule that has no `COUNT`.
pub const MAX_REPEATS: u32 = 10;

/// Hard limit on derived occurrences per recurring event, on top of the
/// rule's own `COUNT`/`UNTIL`.
pub const EXPANSION_CAP: u32 = 10;
