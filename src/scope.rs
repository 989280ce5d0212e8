// Copyright 2020 Joyent, Inc.

//! Temporal scoping: when a measurement can be, should be, or was run.
//!
//! The "when" section of an mPlane message defines when a capability,
//! specification, or result is valid. A scope is a start endpoint plus an
//! extent (nothing, an end endpoint, or a duration) plus an optional
//! repetition period, and it is rendered on the wire in the canonical
//! string form documented at the crate root.
//!
//! Everything in this module is pure: any query that needs the current
//! time takes the reference instant as an explicit argument, so callers
//! capture the clock once per logical operation and tests inject fixed
//! instants.

use std::error::Error as StdError;
use std::fmt;
use std::io::{Error, ErrorKind};
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

pub const TIME_PAST: &str = "past";
pub const TIME_NOW: &str = "now";
pub const TIME_FUTURE: &str = "future";

const RANGE_SEP: &str = " ... ";
const DURATION_SEP: &str = " + ";
const PERIOD_SEP: &str = " / ";

const FMT_MICROSECOND: &str = "%Y-%m-%d %H:%M:%S%.6f";
const FMT_MICROSECOND_IN: &str = "%Y-%m-%d %H:%M:%S%.f";
const FMT_SECOND: &str = "%Y-%m-%d %H:%M:%S";
const FMT_MINUTE: &str = "%Y-%m-%d %H:%M";
const FMT_DATE: &str = "%Y-%m-%d";

const DUR_SECLABEL: [(i64, char); 4] =
    [(86400, 'd'), (3600, 'h'), (60, 'm'), (1, 's')];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScopeError {
    MalformedTemporalValue(String),
    MalformedDuration(String),
    MalformedNumberSet(String),
    UnknownWeekday(String),
    InvalidScope(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScopeError::MalformedTemporalValue(text) => {
                write!(f, "{:?} does not appear to be an mPlane timestamp", text)
            }
            ScopeError::MalformedDuration(text) => {
                write!(f, "{:?} does not appear to be an mPlane duration", text)
            }
            ScopeError::MalformedNumberSet(text) => {
                write!(f, "{:?} is not a comma-separated set of integers", text)
            }
            ScopeError::UnknownWeekday(text) => {
                write!(f, "unknown weekday abbreviation {:?}", text)
            }
            ScopeError::InvalidScope(text) => {
                write!(f, "invalid temporal scope: {}", text)
            }
        }
    }
}

impl StdError for ScopeError {}

impl From<ScopeError> for Error {
    fn from(err: ScopeError) -> Error {
        Error::new(ErrorKind::Other, err.to_string())
    }
}

/// One endpoint of a temporal scope: a marker keyword for the
/// indeterminate past, the present, or the indeterminate future, or an
/// absolute civil timestamp. Markers are resolved to concrete instants
/// only at evaluation time, never at parse time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeValue {
    Past,
    Now,
    Future,
    Absolute(NaiveDateTime),
}

impl TimeValue {
    /// Resolve this endpoint against a reference instant. `Past` and
    /// `Future` have no concrete resolution.
    fn resolve(self, tzero: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeValue::Past | TimeValue::Future => None,
            TimeValue::Now => Some(tzero),
            TimeValue::Absolute(t) => Some(t),
        }
    }
}

/// Rendering precision for absolute timestamps.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Precision {
    Date,
    Minutes,
    Seconds,
    Microseconds,
}

impl Precision {
    fn format_str(self) -> &'static str {
        match self {
            Precision::Date => FMT_DATE,
            Precision::Minutes => FMT_MINUTE,
            Precision::Seconds => FMT_SECOND,
            Precision::Microseconds => FMT_MICROSECOND,
        }
    }
}

/// Parse a temporal value: one of the marker keywords, or a civil
/// timestamp with date, minute, second, or microsecond precision. The
/// most precise sub-pattern present in the input selects the format the
/// whole input must then match.
pub fn parse_time(text: &str) -> Result<TimeValue, ScopeError> {
    match text {
        TIME_PAST => Ok(TimeValue::Past),
        TIME_NOW => Ok(TimeValue::Now),
        TIME_FUTURE => Ok(TimeValue::Future),
        _ => parse_instant(text).map(TimeValue::Absolute),
    }
}

fn parse_instant(text: &str) -> Result<NaiveDateTime, ScopeError> {
    let parsed = if text.contains('.') {
        NaiveDateTime::parse_from_str(text, FMT_MICROSECOND_IN)
    } else {
        match text.matches(':').count() {
            2 => NaiveDateTime::parse_from_str(text, FMT_SECOND),
            1 => NaiveDateTime::parse_from_str(text, FMT_MINUTE),
            _ => NaiveDate::parse_from_str(text, FMT_DATE)
                .map(|date| date.and_hms(0, 0, 0)),
        }
    };
    parsed.map_err(|_| ScopeError::MalformedTemporalValue(text.to_string()))
}

/// Render a temporal value: markers by their keyword regardless of the
/// requested precision, absolute timestamps at the given precision.
pub fn unparse_time(value: TimeValue, precision: Precision) -> String {
    match value {
        TimeValue::Past => TIME_PAST.to_string(),
        TimeValue::Now => TIME_NOW.to_string(),
        TimeValue::Future => TIME_FUTURE.to_string(),
        TimeValue::Absolute(t) => t.format(precision.format_str()).to_string(),
    }
}

/// Parse a compact duration: any subset of `<n>d`, `<n>h`, `<n>m`,
/// `<n>s` components, in that fixed order, summed in seconds. An empty
/// string is an error; `0s` is the only spelling of the zero duration.
pub fn parse_dur(text: &str) -> Result<Duration, ScopeError> {
    if text.is_empty() {
        return Err(ScopeError::MalformedDuration(text.to_string()));
    }

    let mut secs: i64 = 0;
    let mut rest = text;
    for &(unit_secs, label) in DUR_SECLABEL.iter() {
        if let Some(at) = rest.find(label) {
            let digits = &rest[..at];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(ScopeError::MalformedDuration(text.to_string()));
            }
            let count = digits
                .parse::<i64>()
                .map_err(|_| ScopeError::MalformedDuration(text.to_string()))?;
            secs += unit_secs * count;
            rest = &rest[at + 1..];
        }
    }

    if rest.is_empty() {
        Ok(Duration::seconds(secs))
    } else {
        Err(ScopeError::MalformedDuration(text.to_string()))
    }
}

/// Render a duration greedily, largest unit first. Not the inverse of
/// [`parse_dur`] verbatim (`90m` comes back as `1h30m`) but stable under
/// a second round trip.
pub fn unparse_dur(dur: Duration) -> String {
    let mut secs = dur.num_seconds();
    let mut out = String::new();
    for &(unit_secs, label) in DUR_SECLABEL.iter() {
        if secs >= unit_secs {
            let count = secs / unit_secs;
            out.push_str(&count.to_string());
            out.push(label);
            secs -= count * unit_secs;
        }
    }
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}

/// How a temporal scope extends beyond its start: not at all, to an
/// explicit end endpoint, or for a fixed length of time. The tagged
/// representation keeps "end" and "duration" mutually exclusive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Extent {
    Singleton,
    EndsAt(TimeValue),
    LastsFor(Duration),
}

/// The temporal scope of a capability, specification, or result: the
/// window during which the message is valid or the measurement should
/// run, plus an optional repetition period. Immutable once constructed;
/// re-scoping a message means building a new `When`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct When {
    start: TimeValue,
    extent: Extent,
    period: Option<Duration>,
}

impl When {
    /// Build a scope from explicit fields. A scope may not begin at
    /// `future` and may not end at `past`.
    pub fn new(start: TimeValue, extent: Extent) -> Result<When, ScopeError> {
        if start == TimeValue::Future {
            return Err(ScopeError::InvalidScope(String::from(
                "a scope may not begin in the indeterminate future",
            )));
        }
        if extent == Extent::EndsAt(TimeValue::Past) {
            return Err(ScopeError::InvalidScope(String::from(
                "a scope may not end in the indeterminate past",
            )));
        }
        Ok(When {
            start,
            extent,
            period: None,
        })
    }

    /// Attach a repetition period, consuming the scope.
    pub fn with_period(mut self, period: Duration) -> When {
        self.period = Some(period);
        self
    }

    pub fn start(&self) -> TimeValue {
        self.start
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// True if the scope starts at the moment it is evaluated.
    pub fn is_immediate(&self) -> bool {
        self.start == TimeValue::Now
    }

    /// True if the scope denotes exactly one instant. Used in scheduling
    /// an enclosing specification; has no meaning for capabilities or
    /// results.
    pub fn is_singleton(&self) -> bool {
        self.extent == Extent::Singleton
    }

    /// Resolve the scope to concrete bounds against a reference instant.
    /// `None` on either side means the scope is unbounded on that side;
    /// a singleton resolves to a zero-width window.
    pub fn resolve(
        &self,
        tzero: NaiveDateTime,
    ) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let start = self.start.resolve(tzero);
        let end = match self.extent {
            Extent::Singleton => start,
            Extent::EndsAt(value) => value.resolve(tzero),
            Extent::LastsFor(dur) => start.map(|s| s + dur),
        };
        (start, end)
    }

    /// The length of the scope. An explicit duration wins; a singleton
    /// has zero length; a scope unbounded on either side has no defined
    /// length.
    pub fn duration(&self, tzero: NaiveDateTime) -> Option<Duration> {
        match self.extent {
            Extent::LastsFor(dur) => Some(dur),
            Extent::Singleton => Some(Duration::zero()),
            Extent::EndsAt(_) => match self.resolve(tzero) {
                (Some(start), Some(end)) => Some(end - start),
                _ => None,
            },
        }
    }

    /// Delays, relative to `tzero`, for timers signalling the start and
    /// end of this scope.
    ///
    /// The start delay is zero if the start has already passed or the
    /// scope is immediate. The end delay prioritizes an explicit end
    /// time, then an explicit duration, and is `None` when the scope has
    /// no scheduled end (unbounded or singleton). If the scope has
    /// already expired both delays are `None`: do not schedule.
    ///
    /// Used in scheduling an enclosing specification for execution; has
    /// no meaning for capabilities or results.
    pub fn timer_delays(
        &self,
        tzero: NaiveDateTime,
    ) -> (Option<Duration>, Option<Duration>) {
        let (start, end) = self.resolve(tzero);

        let sd = match start {
            Some(s) if s > tzero => s - tzero,
            _ => Duration::zero(),
        };

        let ed = match self.extent {
            Extent::EndsAt(TimeValue::Future) => None,
            Extent::EndsAt(_) => end.map(|e| e - tzero),
            Extent::LastsFor(dur) => Some(sd + dur),
            Extent::Singleton => None,
        };

        match ed {
            Some(e) if e < Duration::zero() => (None, None),
            _ => (Some(sd), ed),
        }
    }

    /// Signed offset of `t` relative to this scope: negative if `t`
    /// falls before the scope, positive if after it, zero if within
    /// `[start, end]` inclusive. An unbounded side imposes no limit.
    pub fn sort_scope(&self, t: NaiveDateTime, tzero: NaiveDateTime) -> Duration {
        let (start, end) = self.resolve(tzero);
        if let Some(s) = start {
            if t < s {
                return t - s;
            }
        }
        if let Some(e) = end {
            if t > e {
                return t - e;
            }
        }
        Duration::zero()
    }

    /// True if `t` falls within this scope.
    pub fn in_scope(&self, t: NaiveDateTime, tzero: NaiveDateTime) -> bool {
        self.sort_scope(t, tzero) == Duration::zero()
    }
}

fn split_sep<'a>(text: &'a str, sep: &str) -> (&'a str, Option<&'a str>) {
    match text.find(sep) {
        Some(at) => (&text[..at], Some(&text[at + sep.len()..])),
        None => (text, None),
    }
}

impl FromStr for When {
    type Err = ScopeError;

    fn from_str(text: &str) -> Result<When, ScopeError> {
        // Separate the period from the value first, then try to split
        // the remainder as duration or range.
        let (text, period) = match split_sep(text, PERIOD_SEP) {
            (left, Some(right)) => (left, Some(parse_dur(right)?)),
            (left, None) => (left, None),
        };

        let (start_text, extent) = match split_sep(text, DURATION_SEP) {
            (left, Some(right)) => (left, Extent::LastsFor(parse_dur(right)?)),
            (left, None) => match split_sep(left, RANGE_SEP) {
                (l, Some(r)) => (l, Extent::EndsAt(parse_time(r)?)),
                (l, None) => (l, Extent::Singleton),
            },
        };

        let when = When::new(parse_time(start_text)?, extent)?;
        Ok(match period {
            Some(p) => when.with_period(p),
            None => when,
        })
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&unparse_time(self.start, Precision::Microseconds))?;
        match self.extent {
            Extent::Singleton => (),
            Extent::EndsAt(end) => {
                f.write_str(RANGE_SEP)?;
                f.write_str(&unparse_time(end, Precision::Microseconds))?;
            }
            Extent::LastsFor(dur) => {
                f.write_str(DURATION_SEP)?;
                f.write_str(&unparse_dur(dur))?;
            }
        }
        if let Some(period) = self.period {
            f.write_str(PERIOD_SEP)?;
            f.write_str(&unparse_dur(period))?;
        }
        Ok(())
    }
}

impl Serialize for When {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for When {
    fn deserialize<D>(deserializer: D) -> Result<When, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    fn ts(text: &str) -> NaiveDateTime {
        match parse_time(text).expect("test timestamp must parse") {
            TimeValue::Absolute(t) => t,
            other => panic!("expected an absolute timestamp, got {:?}", other),
        }
    }

    fn when(text: &str) -> When {
        text.parse().expect("test scope must parse")
    }

    #[test]
    fn parse_time_markers() {
        assert_eq!(parse_time("past"), Ok(TimeValue::Past));
        assert_eq!(parse_time("now"), Ok(TimeValue::Now));
        assert_eq!(parse_time("future"), Ok(TimeValue::Future));
    }

    #[test]
    fn parse_time_precision_tiers() {
        assert_eq!(ts("2013-09-20"), ts("2013-09-20 00:00:00"));
        assert_eq!(
            unparse_time(parse_time("2013-07-30 21:29").unwrap(), Precision::Seconds),
            "2013-07-30 21:29:00"
        );
        assert_eq!(
            unparse_time(
                parse_time("2013-07-30 21:29:17").unwrap(),
                Precision::Microseconds
            ),
            "2013-07-30 21:29:17.000000"
        );
        assert_eq!(
            unparse_time(
                parse_time("2013-07-30 21:29:17.100000").unwrap(),
                Precision::Microseconds
            ),
            "2013-07-30 21:29:17.100000"
        );
    }

    #[test]
    fn parse_time_rejects_garbage() {
        for bad in &["then", "2013-09", "2013-09-20 25:00", "2013-09-20 12:30:71"] {
            match parse_time(bad) {
                Err(ScopeError::MalformedTemporalValue(_)) => (),
                other => panic!("{:?} parsed as {:?}", bad, other),
            }
        }
    }

    #[test]
    fn unparse_time_markers_ignore_precision() {
        assert_eq!(unparse_time(TimeValue::Past, Precision::Date), "past");
        assert_eq!(unparse_time(TimeValue::Future, Precision::Microseconds), "future");
    }

    #[test]
    fn dur_components_sum() {
        // 1d2h3m4s is 93784 seconds
        assert_eq!(parse_dur("1d2h3m4s"), Ok(Duration::seconds(93784)));
        assert_eq!(unparse_dur(Duration::seconds(93784)), "1d2h3m4s");
        assert_eq!(parse_dur("90m"), Ok(Duration::seconds(5400)));
        assert_eq!(unparse_dur(Duration::seconds(5400)), "1h30m");
        assert_eq!(parse_dur("0s"), Ok(Duration::zero()));
        assert_eq!(unparse_dur(Duration::zero()), "0s");
    }

    #[test]
    fn dur_rejects_malformed() {
        for bad in &["", "5", "d", "2h1d", "-5s", "1d2x", "1h 30m"] {
            match parse_dur(bad) {
                Err(ScopeError::MalformedDuration(_)) => (),
                other => panic!("{:?} parsed as {:?}", bad, other),
            }
        }
    }

    #[test]
    fn when_parse_shapes() {
        let w = when("now");
        assert!(w.is_immediate());
        assert!(w.is_singleton());
        assert_eq!(w.period(), None);

        let w = when("now + 5s");
        assert_eq!(w.extent(), Extent::LastsFor(Duration::seconds(5)));

        let w = when("2013-09-20 ... 2013-10-05");
        assert_eq!(
            w.extent(),
            Extent::EndsAt(TimeValue::Absolute(ts("2013-10-05")))
        );

        let w = when("now + 600s / 15s");
        assert_eq!(w.extent(), Extent::LastsFor(Duration::seconds(600)));
        assert_eq!(w.period(), Some(Duration::seconds(15)));

        let w = when("past ... future");
        assert_eq!(w.start(), TimeValue::Past);
        assert_eq!(w.extent(), Extent::EndsAt(TimeValue::Future));

        let w = when("past ... now");
        assert_eq!(w.extent(), Extent::EndsAt(TimeValue::Now));
    }

    #[test]
    fn when_rejects_inverted_markers() {
        assert!("future".parse::<When>().is_err());
        assert!("future + 5s".parse::<When>().is_err());
        assert!("now ... past".parse::<When>().is_err());
    }

    #[test]
    fn when_display_round_trips() {
        for text in &[
            "now",
            "past",
            "now + 5s",
            "now + 600s / 15s",
            "past ... future",
            "past ... now / 1h",
            "2013-09-20 00:00:00.000000 ... 2013-10-05 00:00:00.000000",
            "2017-02-03 12:30:00.000000 + 1d2h3m4s / 30s",
        ] {
            let w: When = text.parse().unwrap();
            assert_eq!(&w.to_string(), text);
            assert_eq!(w.to_string().parse::<When>(), Ok(w));
        }
    }

    #[test]
    fn immediate_duration_delays() {
        // "now + 5s" evaluated at T: start timer fires immediately, end
        // timer five seconds later
        let t = ts("2014-03-01 08:00:00");
        let w = when("now + 5s");
        assert_eq!(
            w.timer_delays(t),
            (Some(Duration::zero()), Some(Duration::seconds(5)))
        );
        assert_eq!(w.duration(t), Some(Duration::seconds(5)));
    }

    #[test]
    fn range_membership() {
        let any = ts("2020-01-01 00:00:00");
        let w = when("2013-09-20 ... 2013-10-05");
        assert!(w.in_scope(ts("2013-09-25"), any));
        assert!(w.in_scope(ts("2013-09-20"), any));
        assert!(w.in_scope(ts("2013-10-05"), any));
        assert!(!w.in_scope(ts("2013-10-06"), any));
        assert!(!w.in_scope(ts("2013-09-19 23:59:59"), any));
    }

    #[test]
    fn sort_scope_signs() {
        let any = ts("2020-01-01 00:00:00");
        let w = when("2013-09-20 ... 2013-10-05");
        assert_eq!(
            w.sort_scope(ts("2013-09-19"), any),
            Duration::seconds(-86400)
        );
        assert_eq!(w.sort_scope(ts("2013-09-25"), any), Duration::zero());
        assert_eq!(
            w.sort_scope(ts("2013-10-06"), any),
            Duration::seconds(86400)
        );
    }

    #[test]
    fn open_sides_are_unbounded() {
        let any = ts("2020-01-01 00:00:00");
        let w = when("past ... future");
        assert!(w.in_scope(ts("1970-01-01"), any));
        assert!(w.in_scope(ts("2999-12-31"), any));
        assert_eq!(w.resolve(any), (None, None));
        assert_eq!(w.duration(any), None);
        // no scheduled end, never expires
        assert_eq!(w.timer_delays(any), (Some(Duration::zero()), None));
    }

    #[test]
    fn expired_scope_reports_no_delays() {
        let w = when("2013-09-20 ... 2013-10-05");
        assert_eq!(w.timer_delays(ts("2013-10-06")), (None, None));
        assert_eq!(w.timer_delays(ts("2019-01-01")), (None, None));

        // at or before the start both delays are armed
        let (sd, ed) = w.timer_delays(ts("2013-09-20"));
        assert_eq!(sd, Some(Duration::zero()));
        assert_eq!(ed, Some(Duration::days(15)));
    }

    #[test]
    fn singleton_never_ends() {
        let w = when("2013-09-20 12:00:00");
        let before = ts("2013-09-20 00:00:00");
        let after = ts("2019-01-01 00:00:00");
        assert!(w.is_singleton());
        assert_eq!(w.duration(before), Some(Duration::zero()));
        assert_eq!(w.duration(after), Some(Duration::zero()));
        assert_eq!(
            w.timer_delays(before),
            (Some(Duration::seconds(12 * 3600)), None)
        );
        assert_eq!(w.timer_delays(after), (Some(Duration::zero()), None));
    }

    #[test]
    fn ends_at_now_resolves_to_reference() {
        let t = ts("2014-03-01 08:00:00");
        let w = when("past ... now");
        assert_eq!(w.resolve(t), (None, Some(t)));
        assert!(w.in_scope(ts("2010-01-01"), t));
        assert!(!w.in_scope(ts("2014-03-01 08:00:01"), t));
    }

    fn arbitrary_when(
        start_kind: u8,
        extent_kind: u8,
        period_secs: Option<u16>,
        offset: u32,
        len: u32,
    ) -> When {
        let base = ts("2014-01-01 00:00:00")
            + Duration::seconds(i64::from(offset % 100_000_000));
        let start = match start_kind % 3 {
            0 => TimeValue::Past,
            1 => TimeValue::Now,
            _ => TimeValue::Absolute(base),
        };
        let len = Duration::seconds(i64::from(len % 1_000_000));
        let extent = match extent_kind % 5 {
            0 => Extent::Singleton,
            1 => Extent::EndsAt(TimeValue::Future),
            2 => Extent::EndsAt(TimeValue::Now),
            3 => Extent::EndsAt(TimeValue::Absolute(base + len)),
            _ => Extent::LastsFor(len),
        };
        let w = When::new(start, extent).expect("generated scope is valid");
        match period_secs {
            Some(p) => w.with_period(Duration::seconds(i64::from(p))),
            None => w,
        }
    }

    quickcheck! {
        fn prop_dur_round_trip(secs: u32) -> bool {
            let dur = Duration::seconds(i64::from(secs));
            parse_dur(&unparse_dur(dur)) == Ok(dur)
        }

        fn prop_when_round_trip(
            start_kind: u8,
            extent_kind: u8,
            period_secs: Option<u16>,
            offset: u32,
            len: u32
        ) -> bool {
            let w = arbitrary_when(start_kind, extent_kind, period_secs, offset, len);
            w.to_string().parse::<When>() == Ok(w)
        }

        fn prop_expiry_monotonic(offset: u32, len: u32, after: u32) -> bool {
            // a concrete range reports no delays for any tzero past its
            // end, and both delays at or before its start
            let start = ts("2014-01-01 00:00:00")
                + Duration::seconds(i64::from(offset % 100_000_000));
            let end = start + Duration::seconds(i64::from(len % 1_000_000));
            let w = When::new(
                TimeValue::Absolute(start),
                Extent::EndsAt(TimeValue::Absolute(end)),
            )
            .unwrap();

            let expired = end + Duration::seconds(i64::from(after % 1_000_000) + 1);
            let early = start - Duration::seconds(i64::from(after % 1_000_000));

            let (sd, ed) = w.timer_delays(early);
            w.timer_delays(expired) == (None, None)
                && sd.map_or(false, |d| d >= Duration::zero())
                && ed.map_or(false, |d| d >= sd.unwrap())
        }

        fn prop_singleton_invariant(offset: u32, tz: u32) -> bool {
            let start = ts("2014-01-01 00:00:00")
                + Duration::seconds(i64::from(offset % 100_000_000));
            let tzero = ts("2010-01-01 00:00:00")
                + Duration::seconds(i64::from(tz % 500_000_000));
            let w = When::new(TimeValue::Absolute(start), Extent::Singleton).unwrap();
            w.is_singleton()
                && w.duration(tzero) == Some(Duration::zero())
                && w.timer_delays(tzero).1 == None
        }
    }
}
