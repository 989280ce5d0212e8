// Copyright 2020 Joyent, Inc.

//! Calendar-based repetition of a temporal scope.
//!
//! A schedule wraps one [`When`](crate::scope::When) with crontab-like
//! sets of months, days, days of week, hours, minutes, and seconds, and
//! is used to specify repetitions of single measurements in a
//! specification. Designed to be broadly compatible with LMAP
//! calendar-based scheduling. An empty set leaves its field unfiltered.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::scope::{ScopeError, When};

pub const KEY_WHEN: &str = "when";
pub const KEY_MONTHS: &str = "months";
pub const KEY_DAYS: &str = "days";
pub const KEY_WEEKDAYS: &str = "weekdays";
pub const KEY_HOURS: &str = "hours";
pub const KEY_MINUTES: &str = "minutes";
pub const KEY_SECONDS: &str = "seconds";

const SET_SEP: &str = ",";

// Monday is 0, matching chrono's days-from-Monday numbering.
const DOW_LABEL: [&str; 7] = ["mo", "tu", "we", "th", "fr", "sa", "so"];

/// Parse a comma-separated set of integers. Duplicates collapse.
pub fn parse_numset(text: &str) -> Result<BTreeSet<u32>, ScopeError> {
    let mut set = BTreeSet::new();
    for token in text.split(SET_SEP) {
        let n = token
            .trim()
            .parse::<u32>()
            .map_err(|_| ScopeError::MalformedNumberSet(text.to_string()))?;
        set.insert(n);
    }
    Ok(set)
}

pub fn unparse_numset(set: &BTreeSet<u32>) -> String {
    let tokens: Vec<String> = set.iter().map(|n| n.to_string()).collect();
    tokens.join(SET_SEP)
}

/// Parse a comma-separated set of two-letter weekday abbreviations.
pub fn parse_wdayset(text: &str) -> Result<BTreeSet<u32>, ScopeError> {
    let mut set = BTreeSet::new();
    for token in text.split(SET_SEP) {
        let token = token.trim();
        match DOW_LABEL.iter().position(|&label| label == token) {
            Some(day) => {
                set.insert(day as u32);
            }
            None => return Err(ScopeError::UnknownWeekday(token.to_string())),
        }
    }
    Ok(set)
}

pub fn unparse_wdayset(set: &BTreeSet<u32>) -> String {
    let labels: Vec<&str> = set
        .iter()
        .filter_map(|&day| DOW_LABEL.get(day as usize).cloned())
        .collect();
    labels.join(SET_SEP)
}

/// A temporal scope refined by calendar filters, yielding the recurring
/// instants at which an enclosing specification should execute. The
/// wrapped [`When`] bounds the repetition and supplies the step period;
/// the schedule has no temporal meaning without it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Schedule {
    when: When,
    months: BTreeSet<u32>,
    days: BTreeSet<u32>,
    weekdays: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    minutes: BTreeSet<u32>,
    seconds: BTreeSet<u32>,
}

impl Schedule {
    /// An unfiltered schedule: every instant within `when`, at the
    /// period step.
    pub fn new(when: When) -> Schedule {
        Schedule {
            when,
            months: BTreeSet::new(),
            days: BTreeSet::new(),
            weekdays: BTreeSet::new(),
            hours: BTreeSet::new(),
            minutes: BTreeSet::new(),
            seconds: BTreeSet::new(),
        }
    }

    pub fn with_months(mut self, months: BTreeSet<u32>) -> Schedule {
        self.months = months;
        self
    }

    pub fn with_days(mut self, days: BTreeSet<u32>) -> Schedule {
        self.days = days;
        self
    }

    pub fn with_weekdays(mut self, weekdays: BTreeSet<u32>) -> Schedule {
        self.weekdays = weekdays;
        self
    }

    pub fn with_hours(mut self, hours: BTreeSet<u32>) -> Schedule {
        self.hours = hours;
        self
    }

    pub fn with_minutes(mut self, minutes: BTreeSet<u32>) -> Schedule {
        self.minutes = minutes;
        self
    }

    pub fn with_seconds(mut self, seconds: BTreeSet<u32>) -> Schedule {
        self.seconds = seconds;
        self
    }

    pub fn when(&self) -> &When {
        &self.when
    }

    /// Build a schedule from its wire mapping. The `when` key is
    /// mandatory; absent filter keys leave their fields unfiltered.
    pub fn from_map(map: &Map<String, Value>) -> Result<Schedule, ScopeError> {
        let when = match str_entry(map, KEY_WHEN)? {
            Some(text) => text.parse::<When>()?,
            None => {
                return Err(ScopeError::InvalidScope(String::from(
                    "a schedule requires a when",
                )))
            }
        };
        let mut sched = Schedule::new(when);
        if let Some(text) = str_entry(map, KEY_MONTHS)? {
            sched.months = parse_numset(text)?;
        }
        if let Some(text) = str_entry(map, KEY_DAYS)? {
            sched.days = parse_numset(text)?;
        }
        if let Some(text) = str_entry(map, KEY_WEEKDAYS)? {
            sched.weekdays = parse_wdayset(text)?;
        }
        if let Some(text) = str_entry(map, KEY_HOURS)? {
            sched.hours = parse_numset(text)?;
        }
        if let Some(text) = str_entry(map, KEY_MINUTES)? {
            sched.minutes = parse_numset(text)?;
        }
        if let Some(text) = str_entry(map, KEY_SECONDS)? {
            sched.seconds = parse_numset(text)?;
        }
        Ok(sched)
    }

    /// Render the wire mapping: only the `when` and the non-empty
    /// filter fields appear.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(KEY_WHEN.to_string(), Value::String(self.when.to_string()));
        if !self.months.is_empty() {
            map.insert(
                KEY_MONTHS.to_string(),
                Value::String(unparse_numset(&self.months)),
            );
        }
        if !self.days.is_empty() {
            map.insert(
                KEY_DAYS.to_string(),
                Value::String(unparse_numset(&self.days)),
            );
        }
        if !self.weekdays.is_empty() {
            map.insert(
                KEY_WEEKDAYS.to_string(),
                Value::String(unparse_wdayset(&self.weekdays)),
            );
        }
        if !self.hours.is_empty() {
            map.insert(
                KEY_HOURS.to_string(),
                Value::String(unparse_numset(&self.hours)),
            );
        }
        if !self.minutes.is_empty() {
            map.insert(
                KEY_MINUTES.to_string(),
                Value::String(unparse_numset(&self.minutes)),
            );
        }
        if !self.seconds.is_empty() {
            map.insert(
                KEY_SECONDS.to_string(),
                Value::String(unparse_numset(&self.seconds)),
            );
        }
        map
    }

    /// Iterate the instants this schedule matches, starting from a
    /// reference instant (truncated to whole seconds). Any `now`-relative
    /// scope is resolved against that same instant, once. The sequence
    /// ends only when the scope is exhausted; an unbounded scope yields
    /// forever and must be bounded by the caller.
    pub fn instants(&self, tzero: NaiveDateTime) -> ScheduleIter {
        let tzero = tzero.with_nanosecond(0).unwrap_or(tzero);
        let step = self
            .when
            .period()
            .unwrap_or_else(|| Duration::seconds(1));

        // fast forward if the reference instant falls before the scope,
        // so iteration begins at the scope's start
        let mut cursor = tzero;
        let lag = self.when.sort_scope(cursor, tzero);
        if lag < Duration::zero() {
            cursor = cursor - lag;
        }

        ScheduleIter {
            schedule: self,
            tzero,
            cursor: Some(cursor),
            step,
        }
    }

    fn matches(&self, t: NaiveDateTime) -> bool {
        (self.seconds.is_empty() || self.seconds.contains(&t.second()))
            && (self.minutes.is_empty() || self.minutes.contains(&t.minute()))
            && (self.hours.is_empty() || self.hours.contains(&t.hour()))
            && (self.days.is_empty() || self.days.contains(&t.day()))
            && (self.weekdays.is_empty()
                || self
                    .weekdays
                    .contains(&t.weekday().num_days_from_monday()))
            && (self.months.is_empty() || self.months.contains(&t.month()))
    }
}

/// Lazy iterator over a schedule's matching instants. Termination on
/// scope exit is the only way the sequence ends.
pub struct ScheduleIter<'a> {
    schedule: &'a Schedule,
    tzero: NaiveDateTime,
    cursor: Option<NaiveDateTime>,
    step: Duration,
}

impl<'a> Iterator for ScheduleIter<'a> {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        loop {
            let t = self.cursor?;
            if !self.schedule.when.in_scope(t, self.tzero) {
                self.cursor = None;
                return None;
            }
            self.cursor = Some(t + self.step);
            if self.schedule.matches(t) {
                return Some(t);
            }
        }
    }
}

fn str_entry<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ScopeError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or_else(|| {
            ScopeError::InvalidScope(format!("schedule key {} must be a string", key))
        }),
    }
}

impl Serialize for Schedule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let map = self.to_map();
        let mut ser = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in &map {
            ser.serialize_entry(key, value)?;
        }
        ser.end()
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D>(deserializer: D) -> Result<Schedule, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::deserialize(deserializer)?;
        Schedule::from_map(&map).map_err(de::Error::custom)
    }
}
