//! The entry point: turning whole documents into calendars and events.

use std::{fmt, fs, path::Path};

use anyhow::{bail, Context, Error};
use chrono_tz::Tz;
use log::{debug, info, warn};
use url::Url;

use crate::{
    components::{Calendar, CalendarRef, Event},
    error::ParseError,
    parser::{explode, field},
    property::RecurRule,
    recurrence,
    timezone::{ChronoTzResolver, TimezoneResolver},
    EXPANSION_CAP, MAX_REPEATS,
};

/// Limits applied while expanding recurring events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Occurrences generated for a rule without `COUNT`.
    pub max_repeats: u32,
    /// Most occurrences generated for any single rule.
    pub expansion_cap: u32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_repeats: MAX_REPEATS,
            expansion_cap: EXPANSION_CAP,
        }
    }
}

/// Holds everything read so far: the calendars (one per parsed document),
/// their events, and the problems that were recovered from.
///
/// Reading a string never fails. Only [`Parser::from_file`] and
/// [`Parser::from_url`] can return an error, and they do so before any
/// parsing happens.
pub struct Parser {
    calendars: Vec<Calendar>,
    errors: Vec<ParseError>,
    options: ParserOptions,
    resolver: Box<dyn TimezoneResolver + Send + Sync>,
}

impl Parser {
    pub fn new() -> Parser {
        Parser::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Parser {
        Parser {
            calendars: Vec::new(),
            errors: Vec::new(),
            options,
            resolver: Box::new(ChronoTzResolver),
        }
    }

    /// Replaces the timezone lookup used for `X-WR-TIMEZONE`.
    pub fn with_resolver<R>(mut self, resolver: R) -> Parser
    where
        R: TimezoneResolver + Send + Sync + 'static,
    {
        self.resolver = Box::new(resolver);
        self
    }

    /// Parses a document that has already been read.
    pub fn from_string(content: &str) -> Parser {
        let mut parser = Parser::new();
        parser.parse_str(content);
        parser
    }

    /// Reads a local file and parses it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Parser, Error> {
        let mut parser = Parser::new();
        parser.parse_file(path)?;
        Ok(parser)
    }

    /// Fetches a document with a blocking HTTP GET and parses it.
    pub fn from_url(url: &str) -> Result<Parser, Error> {
        let mut parser = Parser::new();
        parser.parse_url(url)?;
        Ok(parser)
    }

    pub fn parse_str(&mut self, content: &str) -> &Calendar {
        self.parse_ical_content(content, "")
    }

    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<&Calendar, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading calendar file {}", path.display()))?;

        Ok(self.parse_ical_content(&content, ""))
    }

    pub fn parse_url(&mut self, url: &str) -> Result<&Calendar, Error> {
        let parsed = Url::parse(url).with_context(|| format!("invalid calendar url {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported scheme for calendar url {}", url);
        }

        info!("Fetching calendar {}", parsed);
        let response = reqwest::blocking::get(parsed.clone())
            .with_context(|| format!("fetching calendar {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("fetching calendar {}: HTTP {}", url, status);
        }

        let content = response
            .text()
            .with_context(|| format!("reading calendar body from {}", url))?;

        Ok(self.parse_ical_content(&content, url))
    }

    /// All calendars, in the order they were parsed.
    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    /// Every event of every calendar: base events followed by their derived
    /// occurrences.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.calendars.iter().flat_map(|c| c.events())
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn calendar_of(&self, event: &Event) -> Option<&Calendar> {
        self.calendars.get(event.calendar.index())
    }

    fn parse_ical_content(&mut self, content: &str, url: &str) -> &Calendar {
        let calendar_ref = CalendarRef(self.calendars.len());

        let (events_data, info) = explode(content);
        let timezone = self.parse_timezone(&info);
        let mut calendar = Calendar::from_info(&info, url, timezone);

        debug!(
            "Calendar {:?}: {} event blocks",
            calendar.name,
            events_data.len()
        );

        for event_data in events_data {
            let event = Event::from_block(event_data, calendar_ref);
            debug!("Decoded event {} starting {}", event.imported_id, event.start);

            let occurrences = if event.is_recurring() {
                let rule = RecurRule::parse(&event.rrule);
                recurrence::expand(&event, &rule, &self.options)
            } else {
                Vec::new()
            };

            calendar.push_event(event);
            for occurrence in occurrences {
                calendar.push_event(occurrence);
            }
        }

        self.calendars.push(calendar);
        &self.calendars[calendar_ref.index()]
    }

    fn parse_timezone(&mut self, info: &str) -> Tz {
        let name = field(info, "X-WR-TIMEZONE");

        match self.resolver.resolve(&name) {
            Ok(tz) => tz,
            Err(err) => {
                warn!("{}, falling back to UTC", err);
                self.errors.push(err);
                Tz::UTC
            }
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("calendars", &self.calendars)
            .field("errors", &self.errors)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        let parser = Parser::from_string("");
        assert_eq!(parser.calendars().len(), 1);
        assert_eq!(parser.events().count(), 0);
        assert!(parser.errors().is_empty());
        assert_eq!(parser.calendars()[0].timezone, Tz::UTC);
    }

    #[test]
    fn unknown_timezone_is_recorded() {
        let parser = Parser::from_string("BEGIN:VCALENDAR\nX-WR-TIMEZONE:Nowhere/Special\nEND:VCALENDAR\n");
        assert_eq!(parser.calendars()[0].timezone, Tz::UTC);
        assert_eq!(parser.errors().len(), 1);
        assert!(matches!(
            &parser.errors()[0],
            ParseError::UnknownTimezone { name, .. } if name == "Nowhere/Special"
        ));
    }

    #[test]
    fn custom_resolver() {
        let mut parser = Parser::new().with_resolver(|name: &str| -> Result<Tz, ParseError> {
            Err(ParseError::UnknownTimezone {
                name: name.to_string(),
                reason: "offline".to_string(),
            })
        });
        parser.parse_str("X-WR-TIMEZONE:Europe/Paris\n");
        assert_eq!(parser.errors().len(), 1);
        assert_eq!(parser.calendars()[0].timezone, Tz::UTC);
    }

    #[test]
    fn several_documents_accumulate() {
        let mut parser = Parser::new();
        parser.parse_str("X-WR-CALNAME:One\nBEGIN:VEVENT\nUID:a\nEND:VEVENT\n");
        parser.parse_str("X-WR-CALNAME:Two\nBEGIN:VEVENT\nUID:b\nEND:VEVENT\n");

        let names: Vec<&str> = parser.calendars().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two"]);

        let events: Vec<&Event> = parser.events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(parser.calendar_of(events[1]).map(|c| c.name.as_str()), Some("Two"));
    }

    #[test]
    fn bad_url_fails_before_parsing() {
        assert!(Parser::from_url("not a url").is_err());
        assert!(Parser::from_url("ftp://example.org/cal.ics").is_err());
    }

    #[test]
    fn missing_file_fails() {
        let err = Parser::from_file("/definitely/not/here.ics").unwrap_err();
        assert!(err.to_string().contains("reading calendar file"));
    }
}
