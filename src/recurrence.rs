//! Expansion of a recurring event into its occurrences.
//!
//! A cursor starts at the base event and moves one frequency step at a time.
//! At each position the `BYMONTH`/`BYDAY` filters pick the days that become
//! occurrences. Expansion stops when the rule's `COUNT` is used up, when the
//! hard cap is reached, or when the cursor has moved past `UNTIL`.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Duration, Utc};
use log::{debug, trace, warn};

use crate::{
    components::Event,
    document::ParserOptions,
    property::{weekday_to_ics, RecurRule},
};

/// Positions in a row that may pass without producing a candidate before a
/// series is abandoned, e.g. `FREQ=YEARLY;BYMONTH=2` on an event in March.
const MAX_IDLE_STEPS: u32 = 10_000;

/// Every occurrence of `base` produced by `rule`, in order, and not including
/// `base` itself.
///
/// Occurrences that start after `UNTIL` still use up the rule's budget and
/// sequence numbers but are not returned.
pub fn expand(base: &Event, rule: &RecurRule, options: &ParserOptions) -> Vec<Event> {
    let mut iter = RecurIter::new(base, rule, options);

    let occurrences: Vec<Event> = iter
        .by_ref()
        .filter(|occurrence| {
            let keep = rule.within_until(occurrence.start);
            if !keep {
                trace!(
                    "Dropping occurrence {} of {}: starts after UNTIL",
                    occurrence.sequence,
                    base.imported_id
                );
            }
            keep
        })
        .collect();

    if iter.stopped_by_cap() {
        warn!(
            "Stopped expanding {} after {} occurrences ({:?})",
            base.imported_id, iter.emitted, base.rrule
        );
    }

    debug!(
        "Expanded {} into {} occurrences ({} computed)",
        base.imported_id,
        occurrences.len(),
        iter.emitted
    );

    occurrences
}

/// Iterator over every computed occurrence of a series, including the ones
/// past `UNTIL`.
pub struct RecurIter<'a> {
    base: &'a Event,
    rule: &'a RecurRule,
    span: Duration,
    units_per_step: u32,
    step: u32,
    idle_steps: u32,
    queue: VecDeque<DateTime<Utc>>,
    remaining: u32,
    emitted: u32,
    cap: u32,
    exhausted: bool,
}

impl<'a> RecurIter<'a> {
    pub fn new(base: &'a Event, rule: &'a RecurRule, options: &ParserOptions) -> RecurIter<'a> {
        RecurIter {
            base,
            rule,
            span: base.end - base.start,
            units_per_step: rule.frequency.units_per_step(rule.interval),
            step: 0,
            idle_steps: 0,
            queue: VecDeque::new(),
            remaining: rule.count.unwrap_or(options.max_repeats),
            emitted: 0,
            cap: options.expansion_cap,
            exhausted: false,
        }
    }

    /// Whether the hard cap, rather than the rule, ended the series.
    pub fn stopped_by_cap(&self) -> bool {
        self.emitted >= self.cap && self.remaining > 0
    }

    /// Moves the cursor one step and queues the days it yields.
    fn advance(&mut self) {
        let cursor = match self
            .units_per_step
            .checked_mul(self.step)
            .and_then(|units| self.rule.frequency.advance_date(self.base.start, units))
        {
            Some(cursor) => cursor,
            None => {
                self.exhausted = true;
                return;
            }
        };

        if self.step > 0 && !self.rule.within_until(cursor) {
            self.exhausted = true;
            return;
        }

        // A rule that cannot move gets a single pass.
        if self.units_per_step == 0 {
            self.exhausted = true;
        }
        self.step += 1;

        if self.rule.matches_month(cursor) {
            self.queue_days(cursor);
        }

        if self.queue.is_empty() {
            self.idle_steps += 1;
            if self.idle_steps >= MAX_IDLE_STEPS {
                debug!(
                    "Giving up on {} after {} positions without a match",
                    self.base.imported_id, MAX_IDLE_STEPS
                );
                self.exhausted = true;
            }
        } else {
            self.idle_steps = 0;
        }
    }

    fn queue_days(&mut self, cursor: DateTime<Utc>) {
        let base_start = self.base.start;

        if self.rule.by_day.is_empty() {
            if cursor != base_start {
                self.queue.push_back(cursor);
            }
            return;
        }

        // Every frequency looks at the week that starts at the cursor, so
        // overlapping windows may yield the same day more than once.
        for offset in 0..7 {
            let day = match Duration::try_days(offset).and_then(|d| cursor.checked_add_signed(d)) {
                Some(day) => day,
                None => break,
            };

            if self.rule.matches_day(day) && day != base_start {
                trace!(
                    "{} matches {} on {}",
                    weekday_to_ics(day.weekday()),
                    self.base.imported_id,
                    day
                );
                self.queue.push_back(day);
            }
        }
    }
}

impl Iterator for RecurIter<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if self.remaining == 0 || self.emitted >= self.cap {
                return None;
            }

            if let Some(start) = self.queue.pop_front() {
                self.remaining -= 1;
                self.emitted += 1;

                let end = start.checked_add_signed(self.span).unwrap_or(start);
                return Some(self.base.occurrence(start, end, self.emitted));
            }

            if self.exhausted {
                return None;
            }

            self.advance();
        }
    }
}
