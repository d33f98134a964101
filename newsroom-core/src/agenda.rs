//! Agenda event date labels.

use serde::{Deserialize, Serialize};

use crate::dates::{DateFormatter, DateInput, Moment};

/// Minutes in a day, minus one: the span of an event that runs 00:00 to 23:59.
pub const DAY_IN_MINUTES: i64 = 24 * 60 - 1;

/// Start and end of an agenda event. `end >= start` is assumed, not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaDate {
    pub start: Moment,
    pub end: Moment,
}

/// Raw `dates` record of an agenda item, as received from upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaDates {
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// The two labels shown for an agenda event.
///
/// `primary` describes the event's time span; `secondary` is the date the
/// event is listed under, empty when the primary label is self-contained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgendaLabel {
    pub primary: String,
    pub secondary: String,
}

impl AgendaLabel {
    fn new(primary: String, secondary: String) -> Self {
        Self { primary, secondary }
    }
}

impl DateFormatter {
    /// Parse an event's start and end in the display timezone.
    pub fn agenda_date(&self, start: impl DateInput, end: impl DateInput) -> AgendaDate {
        AgendaDate {
            start: self.parse(start),
            end: self.parse(end),
        }
    }

    /// Read a raw `dates` record. A missing end means a point event.
    pub fn agenda_date_from_record(&self, dates: &AgendaDates) -> AgendaDate {
        let start = self.parse(dates.start.as_str());
        let end = match &dates.end {
            Some(end) => self.parse(end.as_str()),
            None => start.clone(),
        };
        AgendaDate { start, end }
    }

    /// Label an agenda event by its duration.
    ///
    /// Branches are tried in order: multi-day (longer than
    /// [`DAY_IN_MINUTES`]), all-day (exactly [`DAY_IN_MINUTES`]), point
    /// event (zero minutes), then a same-day time range. `group` is a date
    /// rendered under the date policy; only multi-day events use it.
    /// Events whose bounds can't be read fall through to the time range.
    pub fn format_agenda_date(&self, agenda: &AgendaDate, group: Option<&str>) -> AgendaLabel {
        let AgendaDate { start, end } = agenda;
        let duration = start.minutes_until(end);
        let time = |m: &Moment| self.format_time(m);
        let date = |m: &Moment| self.format_date(m);

        match duration {
            Some(minutes) if minutes > DAY_IN_MINUTES => {
                let group_label = group
                    .filter(|g| !g.is_empty())
                    .map(|g| date(&self.parse_with_policy(g, self.date_policy())))
                    .unwrap_or_default();
                AgendaLabel::new(
                    format!(
                        "({} {} - {} {})",
                        time(start),
                        date(start),
                        time(end),
                        date(end)
                    ),
                    group_label,
                )
            }
            Some(DAY_IN_MINUTES) => {
                AgendaLabel::new(self.translations().gettext("ALL DAY", &[]), date(start))
            }
            Some(0) => AgendaLabel::new(format!("{} {}", time(start), date(start)), String::new()),
            _ => AgendaLabel::new(format!("{} - {}", time(start), time(end)), date(start)),
        }
    }
}
