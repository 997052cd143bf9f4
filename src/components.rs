use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;

use crate::{
    parser::{field, find_properties, find_property, Property},
    property::{
        parse_duration_field, parse_geo, parse_number_field, parse_time_field,
        parse_timestamp_field,
    },
    YMD_HIS,
};

/// Identifies the calendar an event was read into. Resolve it with
/// [`crate::Parser::calendar_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CalendarRef(pub(crate) usize);

impl CalendarRef {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    /// `X-WR-CALNAME`
    pub name: String,
    /// `X-WR-CALDESC`
    pub description: String,
    /// `VERSION`, or 0 when absent or not a number.
    pub version: f64,
    /// `X-WR-TIMEZONE`, UTC when it could not be resolved.
    pub timezone: Tz,
    /// Where the document was fetched from, empty for files and strings.
    pub url: String,

    events: Vec<Event>,
}

impl Calendar {
    /// Reads the calendar-level properties out of the text that is left once
    /// the `VEVENT` blocks have been removed. The timezone is resolved by the
    /// caller.
    pub fn from_info(info: &str, url: &str, timezone: Tz) -> Calendar {
        Calendar {
            name: field(info, "X-WR-CALNAME"),
            description: field(info, "X-WR-CALDESC"),
            version: parse_version(info),
            timezone,
            url: url.to_string(),
            events: Vec::new(),
        }
    }

    /// Events in the order they were produced: each base event followed by
    /// its derived occurrences.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }
}

fn parse_version(info: &str) -> f64 {
    field(info, "VERSION")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geo {
    pub latitude: f64,
    pub longitude: f64,
}

/// A participant of an event. Organizers only ever have `email` and `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attendee {
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub user_type: String,
}

impl Attendee {
    /// Decodes an `ATTENDEE` property.
    pub fn from_property(property: &Property) -> Attendee {
        let parameters = property.parameter_set();
        let param = |value: Option<&str>| value.unwrap_or_default().trim().to_string();

        Attendee {
            email: parse_mailto(&property.value),
            name: param(parameters.get_common_name()),
            role: param(parameters.get_role()),
            status: param(parameters.get_participation_status()),
            user_type: param(parameters.get_user_type()),
        }
    }

    /// Decodes an `ORGANIZER` property.
    pub fn organizer_from_property(property: &Property) -> Attendee {
        Attendee {
            email: parse_mailto(&property.value),
            name: property
                .parameter_set()
                .get_common_name()
                .unwrap_or_default()
                .trim()
                .to_string(),
            ..Attendee::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
            && self.name.is_empty()
            && self.role.is_empty()
            && self.status.is_empty()
            && self.user_type.is_empty()
    }
}

/// Whatever follows the first `mailto:` in a calendar address, empty when
/// there is none. The scheme may sit behind stray text when a parameter value
/// contained an unquoted colon.
fn parse_mailto(value: &str) -> String {
    match value.to_ascii_lowercase().find("mailto:") {
        Some(index) => value[index + "mailto:".len()..].trim().to_string(),
        None => String::new(),
    }
}

/// All non-empty `ATTENDEE`s of an event block.
pub fn parse_attendees(block: &str) -> Vec<Attendee> {
    find_properties(block, "ATTENDEE")
        .iter()
        .map(Attendee::from_property)
        .filter(|a| !a.is_empty())
        .collect()
}

pub fn parse_organizer(block: &str) -> Option<Attendee> {
    find_property(block, "ORGANIZER")
        .map(|p| Attendee::organizer_from_property(&p))
        .filter(|a| !a.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Generated from `imported_id`, `start` and `sequence`; distinct for
    /// every occurrence of a series.
    pub id: String,
    /// The `UID` from the feed.
    pub imported_id: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub class: String,
    pub location: String,
    pub sequence: u32,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_tzid: String,
    pub end_tzid: String,
    pub whole_day: bool,
    /// Raw `RRULE` value, empty for single events.
    pub rrule: String,
    pub geo: Option<Geo>,
    pub attendees: Vec<Attendee>,
    pub organizer: Option<Attendee>,
    pub calendar: CalendarRef,
}

impl Event {
    /// Builds the event described by one `VEVENT` block.
    ///
    /// Every field is decoded on its own. The only interplay is between the
    /// times: an end before the start is replaced by start plus `DURATION`,
    /// and the event is whole-day when both ends sit on midnight.
    pub fn from_block(block: &str, calendar: CalendarRef) -> Event {
        let (start, start_tzid) = parse_time_field(block, "DTSTART");
        let (mut end, end_tzid) = parse_time_field(block, "DTEND");

        if end < start {
            let duration = parse_duration_field(block);
            end = start.checked_add_signed(duration).unwrap_or(start);
        }

        let mut event = Event {
            id: String::new(),
            imported_id: field(block, "UID"),
            summary: field(block, "SUMMARY"),
            description: field(block, "DESCRIPTION"),
            status: field(block, "STATUS"),
            class: field(block, "CLASS"),
            location: field(block, "LOCATION"),
            sequence: parse_number_field(block, "SEQUENCE"),
            created: parse_timestamp_field(block, "CREATED"),
            last_modified: parse_timestamp_field(block, "LAST-MODIFIED"),
            start,
            end,
            start_tzid,
            end_tzid,
            whole_day: is_midnight(start) && is_midnight(end),
            rrule: field(block, "RRULE"),
            geo: parse_geo(block),
            attendees: parse_attendees(block),
            organizer: parse_organizer(block),
            calendar,
        };
        event.id = event.generate_id();

        event
    }

    /// Combines the imported UID, start and sequence number.
    pub fn generate_id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.imported_id,
            self.start.format(YMD_HIS),
            self.sequence
        )
    }

    /// A derived occurrence of this event.
    ///
    /// Everything is copied from `self` except `start`, `end`, `sequence`,
    /// and the generated `id`, which are replaced. Attendees, organizer and
    /// geo are copied by value, so occurrences share them by equality only.
    pub fn occurrence(&self, start: DateTime<Utc>, end: DateTime<Utc>, sequence: u32) -> Event {
        let mut event = Event {
            start,
            end,
            sequence,
            ..self.clone()
        };
        event.id = event.generate_id();

        event
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_recurring(&self) -> bool {
        !self.rrule.is_empty()
    }
}

fn is_midnight(instant: DateTime<Utc>) -> bool {
    instant.hour() == 0 && instant.minute() == 0 && instant.second() == 0
}
