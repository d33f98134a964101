//! Date parsing and rendering under configured format policies.
//!
//! Policies are written with moment-style tokens (`DD-MM-YYYY`, `HH:mm`,
//! `[at] h:mm A`) and compiled to chrono strftime patterns once, when the
//! [`DateFormatter`] is built. Rendering happens in the configured display
//! timezone and locale.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Locale, NaiveDate, NaiveDateTime, Offset, TimeDelta,
    TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, keys};
use crate::i18n::Translations;

pub const DEFAULT_TIME_FORMAT: &str = "HH:mm";
pub const DEFAULT_DATE_FORMAT: &str = "DD-MM-YYYY";
pub const DEFAULT_COVERAGE_DATE_FORMAT: &str = "HH:mm DD/MM";

const INPUT_DATE_PATTERN: &str = "%Y-%m-%d";
const MONTH_PATTERN: &str = "%B";

/// A named format, kept both as written and as a strftime pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPolicy {
    source: String,
    pattern: String,
}

impl FormatPolicy {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            pattern: moment_to_strftime(source),
        }
    }

    /// The policy as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled chrono pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A parsed point in time, or the invalid moment.
///
/// Invalid moments render as the empty string under every policy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Moment(Option<DateTime<Tz>>);

impl Moment {
    pub fn invalid() -> Self {
        Moment(None)
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// The instant in the display timezone.
    pub fn datetime(&self) -> Option<&DateTime<Tz>> {
        self.0.as_ref()
    }

    /// Calendar day in the display timezone.
    pub fn calendar_day(&self) -> Option<NaiveDate> {
        self.0.as_ref().map(|dt| dt.date_naive())
    }

    /// Whole minutes from `self` to `later`, truncated toward zero.
    pub fn minutes_until(&self, later: &Moment) -> Option<i64> {
        match (&self.0, &later.0) {
            (Some(a), Some(b)) => Some(b.signed_duration_since(a).num_minutes()),
            _ => None,
        }
    }

    fn in_zone(&self, tz: Tz) -> Self {
        Moment(self.0.as_ref().map(|dt| dt.with_timezone(&tz)))
    }
}

/// Anything that can be read as a point in time.
///
/// Strings are parsed leniently; values that can't be read become
/// [`Moment::invalid`] instead of failing.
pub trait DateInput {
    fn to_moment(&self, tz: Tz) -> Moment;
}

impl DateInput for str {
    fn to_moment(&self, tz: Tz) -> Moment {
        parse_str(self, tz)
    }
}

impl DateInput for String {
    fn to_moment(&self, tz: Tz) -> Moment {
        parse_str(self, tz)
    }
}

impl DateInput for Moment {
    fn to_moment(&self, tz: Tz) -> Moment {
        self.in_zone(tz)
    }
}

impl DateInput for DateTime<Utc> {
    fn to_moment(&self, tz: Tz) -> Moment {
        Moment(Some(self.with_timezone(&tz)))
    }
}

impl DateInput for DateTime<FixedOffset> {
    fn to_moment(&self, tz: Tz) -> Moment {
        Moment(Some(self.with_timezone(&tz)))
    }
}

impl DateInput for DateTime<Tz> {
    fn to_moment(&self, tz: Tz) -> Moment {
        Moment(Some(self.with_timezone(&tz)))
    }
}

impl DateInput for NaiveDateTime {
    fn to_moment(&self, tz: Tz) -> Moment {
        Moment(Some(localize(self, tz)))
    }
}

impl DateInput for NaiveDate {
    fn to_moment(&self, tz: Tz) -> Moment {
        Moment(Some(localize(&self.and_time(chrono::NaiveTime::MIN), tz)))
    }
}

impl<T: DateInput> DateInput for Option<T> {
    fn to_moment(&self, tz: Tz) -> Moment {
        match self {
            Some(value) => value.to_moment(tz),
            None => Moment::invalid(),
        }
    }
}

impl<T: DateInput + ?Sized> DateInput for &T {
    fn to_moment(&self, tz: Tz) -> Moment {
        (**self).to_moment(tz)
    }
}

/// Wall-clock time in `tz`. Ambiguous times take the earlier instant; times
/// skipped by a DST gap move forward by the gap.
fn localize(naive: &NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(naive).earliest() {
        return dt;
    }
    let before = tz.offset_from_utc_datetime(&(*naive - TimeDelta::days(1))).fix();
    let utc = *naive - TimeDelta::seconds(i64::from(before.local_minus_utc()));
    tz.from_utc_datetime(&utc)
}

fn parse_str(raw: &str, tz: Tz) -> Moment {
    let raw = raw.trim();
    if raw.is_empty() {
        return Moment::invalid();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Moment(Some(dt.with_timezone(&tz)));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, pattern) {
            return Moment(Some(dt.with_timezone(&tz)));
        }
    }
    for pattern in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Moment(Some(localize(&dt, tz)));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, INPUT_DATE_PATTERN) {
        return date.to_moment(tz);
    }
    Moment::invalid()
}

/// The resolved time, date and coverage policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePolicies {
    pub time: FormatPolicy,
    pub date: FormatPolicy,
    pub coverage: FormatPolicy,
}

impl DatePolicies {
    pub fn new(time: &str, date: &str, coverage: &str) -> Self {
        Self {
            time: FormatPolicy::new(time),
            date: FormatPolicy::new(date),
            coverage: FormatPolicy::new(coverage),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            &config.get_str(keys::TIME_FORMAT, DEFAULT_TIME_FORMAT),
            &config.get_str(keys::DATE_FORMAT, DEFAULT_DATE_FORMAT),
            &config.get_str(keys::COVERAGE_DATE_FORMAT, DEFAULT_COVERAGE_DATE_FORMAT),
        )
    }

    /// `"{time} {date}"`.
    pub fn datetime(&self) -> FormatPolicy {
        FormatPolicy::new(&format!("{} {}", self.time.source(), self.date.source()))
    }
}

impl Default for DatePolicies {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIME_FORMAT,
            DEFAULT_DATE_FORMAT,
            DEFAULT_COVERAGE_DATE_FORMAT,
        )
    }
}

/// Renders dates under the configured policies.
#[derive(Clone)]
pub struct DateFormatter {
    time: FormatPolicy,
    date: FormatPolicy,
    datetime: FormatPolicy,
    coverage: FormatPolicy,
    tz: Tz,
    locale: Locale,
    clock: Arc<dyn Clock>,
    translations: Translations,
}

impl std::fmt::Debug for DateFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateFormatter")
            .field("time", &self.time.source)
            .field("date", &self.date.source)
            .field("coverage", &self.coverage.source)
            .field("tz", &self.tz)
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self::new(DatePolicies::default())
    }
}

impl DateFormatter {
    /// Formatter in UTC, `en_US`, reading the wall clock.
    pub fn new(policies: DatePolicies) -> Self {
        let datetime = policies.datetime();
        Self {
            time: policies.time,
            date: policies.date,
            datetime,
            coverage: policies.coverage,
            tz: Tz::UTC,
            locale: Locale::en_US,
            clock: Arc::new(SystemClock),
            translations: Translations::new(),
        }
    }

    /// Resolve policies, timezone, locale and translations from configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let policies = DatePolicies::from_config(config);
        log::debug!(
            "date policies: time={:?} date={:?} coverage={:?}",
            policies.time.source(),
            policies.date.source(),
            policies.coverage.source()
        );
        Self::new(policies)
            .with_timezone_name(&config.get_str(keys::TIMEZONE, "UTC"))
            .with_locale_name(&config.get_str(keys::LOCALE, "en_US"))
            .with_translations(Translations::from_config(config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// Set the display timezone by IANA name, keeping the current one if unknown.
    pub fn with_timezone_name(self, name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => self.with_timezone(tz),
            Err(_) => {
                log::warn!("unknown timezone '{}', keeping {}", name, self.tz);
                self
            }
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Set the locale by name (`en_US`, `cs-CZ`), keeping the current one if unknown.
    pub fn with_locale_name(self, name: &str) -> Self {
        match Locale::try_from(name.replace('-', "_").as_str()) {
            Ok(locale) => self.with_locale(locale),
            Err(_) => {
                log::warn!("unknown locale '{}', keeping {:?}", name, self.locale);
                self
            }
        }
    }

    pub fn with_translations(mut self, translations: Translations) -> Self {
        self.translations = translations;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn time_policy(&self) -> &FormatPolicy {
        &self.time
    }

    pub fn date_policy(&self) -> &FormatPolicy {
        &self.date
    }

    pub fn datetime_policy(&self) -> &FormatPolicy {
        &self.datetime
    }

    pub fn coverage_policy(&self) -> &FormatPolicy {
        &self.coverage
    }

    pub(crate) fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Read a date-like value in the display timezone.
    pub fn parse(&self, input: impl DateInput) -> Moment {
        input.to_moment(self.tz)
    }

    /// Read a string rendered under `policy`, falling back to [`Self::parse`].
    pub fn parse_with_policy(&self, input: &str, policy: &FormatPolicy) -> Moment {
        let raw = input.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, policy.pattern()) {
            return dt.to_moment(self.tz);
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, policy.pattern()) {
            return date.to_moment(self.tz);
        }
        self.parse(raw)
    }

    /// Today's calendar day in the display timezone.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.tz).date_naive()
    }

    pub fn is_today(&self, value: impl DateInput) -> bool {
        self.parse(value).calendar_day() == Some(self.today())
    }

    /// Strictly before today's calendar day. Empty or unreadable input is not in the past.
    pub fn is_in_past(&self, value: impl DateInput) -> bool {
        self.parse(value)
            .calendar_day()
            .is_some_and(|day| day < self.today())
    }

    /// Time only for today's values, date otherwise.
    pub fn short_date(&self, value: impl DateInput) -> String {
        let moment = self.parse(value);
        if moment.calendar_day() == Some(self.today()) {
            self.render(&moment, &self.time)
        } else {
            self.render(&moment, &self.date)
        }
    }

    pub fn full_date(&self, value: impl DateInput) -> String {
        self.render(&self.parse(value), &self.datetime)
    }

    pub fn locale_date(&self, value: impl DateInput) -> String {
        self.render(&self.parse(value), &self.datetime)
    }

    /// `YYYY-MM-DD` for date input controls; empty for absent input.
    pub fn date_input_value(&self, value: impl DateInput) -> String {
        self.render_pattern(&self.parse(value), INPUT_DATE_PATTERN)
    }

    pub fn format_time(&self, value: impl DateInput) -> String {
        self.render(&self.parse(value), &self.time)
    }

    pub fn format_date(&self, value: impl DateInput) -> String {
        self.render(&self.parse(value), &self.date)
    }

    pub fn format_coverage_date(&self, value: impl DateInput) -> String {
        self.render(&self.parse(value), &self.coverage)
    }

    /// `"{monday} - {sunday}"` of the ISO week containing `value`.
    pub fn format_week(&self, value: impl DateInput) -> String {
        let Some(dt) = self.parse(value).0 else {
            return String::new();
        };
        let offset = u64::from(dt.weekday().num_days_from_monday());
        let start = dt.clone().checked_sub_days(Days::new(offset));
        let end = start.clone().and_then(|s| s.checked_add_days(Days::new(6)));
        match (start, end) {
            (Some(start), Some(end)) => format!(
                "{} - {}",
                self.render(&Moment(Some(start)), &self.date),
                self.render(&Moment(Some(end)), &self.date)
            ),
            _ => String::new(),
        }
    }

    /// Full month name in the configured locale.
    pub fn format_month(&self, value: impl DateInput) -> String {
        self.render_pattern(&self.parse(value), MONTH_PATTERN)
    }

    pub(crate) fn render(&self, moment: &Moment, policy: &FormatPolicy) -> String {
        self.render_pattern(moment, policy.pattern())
    }

    fn render_pattern(&self, moment: &Moment, pattern: &str) -> String {
        let Some(dt) = moment.datetime() else {
            return String::new();
        };
        let mut out = String::new();
        if write!(out, "{}", dt.format_localized(pattern, self.locale)).is_err() {
            log::warn!("cannot render date with pattern {:?}", pattern);
            return String::new();
        }
        out
    }
}

/// Translate a moment-style format into a chrono strftime pattern.
///
/// Text in square brackets and unrecognised letters are copied literally.
pub fn moment_to_strftime(format: &str) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::with_capacity(format.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '['
            && let Some(len) = chars[i + 1..].iter().position(|&ch| ch == ']')
        {
            for &lit in &chars[i + 1..i + 1 + len] {
                push_literal(&mut out, lit);
            }
            i += len + 2;
            continue;
        }

        if c.is_ascii_alphabetic() {
            if c == 'D' && chars.get(i + 1) == Some(&'o') {
                // no ordinal suffixes in strftime
                out.push_str("%-d");
                i += 2;
                continue;
            }
            let run = chars[i..].iter().take_while(|&&ch| ch == c).count();
            match token_pattern(c, run) {
                Some(spec) => out.push_str(spec),
                None => (0..run).for_each(|_| push_literal(&mut out, c)),
            }
            i += run;
            continue;
        }

        push_literal(&mut out, c);
        i += 1;
    }

    out
}

fn token_pattern(token: char, run: usize) -> Option<&'static str> {
    let spec = match (token, run) {
        ('Y', 4) => "%Y",
        ('Y', 2) => "%y",
        ('M', 4) => "%B",
        ('M', 3) => "%b",
        ('M', 2) => "%m",
        ('M', 1) => "%-m",
        ('D', 4) => "%j",
        ('D', 3) => "%-j",
        ('D', 2) => "%d",
        ('D', 1) => "%-d",
        ('d', 4) => "%A",
        ('d', 3) => "%a",
        ('d', 1) => "%w",
        ('E', 1) => "%u",
        ('W', 2) => "%V",
        ('W', 1) => "%-V",
        ('H', 2) => "%H",
        ('H', 1) => "%-H",
        ('h', 2) => "%I",
        ('h', 1) => "%-I",
        ('m', 2) => "%M",
        ('m', 1) => "%-M",
        ('s', 2) => "%S",
        ('s', 1) => "%-S",
        ('A', 1) => "%p",
        ('a', 1) => "%P",
        ('Z', 1) => "%:z",
        ('Z', 2) => "%z",
        ('X', 1) => "%s",
        _ => return None,
    };
    Some(spec)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
