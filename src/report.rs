//! Session reporting across meters and calendar periods.

use crate::sessions::SessionInterval;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Calendar month key (`YYYY-MM`) of a timestamp.
pub fn month_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

/// Monday of the week containing `timestamp`.
pub fn week_start(timestamp: DateTime<Utc>) -> NaiveDate {
    let date = timestamp.date_naive();
    let offset = u64::from(date.weekday().num_days_from_monday());
    // Subtracting at most six days only fails at the very start of the calendar.
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

type WeekMap = BTreeMap<NaiveDate, Vec<SessionInterval>>;

/// Sessions grouped by meter, calendar month and week.
///
/// A session is filed under the month and the week its start falls in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionReport {
    meters: BTreeMap<String, BTreeMap<String, WeekMap>>,
}

impl SessionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// File one session under `meter`.
    pub fn insert(&mut self, meter: &str, session: SessionInterval) {
        self.meters
            .entry(meter.to_string())
            .or_default()
            .entry(month_key(session.start))
            .or_default()
            .entry(week_start(session.start))
            .or_default()
            .push(session);
    }

    pub fn extend(&mut self, meter: &str, sessions: impl IntoIterator<Item = SessionInterval>) {
        for session in sessions {
            self.insert(meter, session);
        }
    }

    /// Meters with at least one session, sorted.
    pub fn meters(&self) -> impl Iterator<Item = &str> {
        self.meters.keys().map(String::as_str)
    }

    /// Meters with sessions in `month`, sorted.
    pub fn meters_in_month(&self, month: &str) -> Vec<&str> {
        self.meters
            .iter()
            .filter(|(_, months)| months.contains_key(month))
            .map(|(meter, _)| meter.as_str())
            .collect()
    }

    /// Week starts with sessions in `month` for the selected meters.
    ///
    /// `None` selects every meter; selected meters without data in the month
    /// are ignored.
    pub fn week_starts(&self, month: &str, meters: Option<&[&str]>) -> BTreeSet<NaiveDate> {
        self.meters
            .iter()
            .filter(|(meter, _)| meters.is_none_or(|sel| sel.contains(&meter.as_str())))
            .filter_map(|(_, months)| months.get(month))
            .flat_map(|weeks| weeks.keys().copied())
            .collect()
    }

    /// Sessions of one meter in one week of a month.
    pub fn sessions(&self, meter: &str, month: &str, week_start: NaiveDate) -> &[SessionInterval] {
        self.meters
            .get(meter)
            .and_then(|months| months.get(month))
            .and_then(|weeks| weeks.get(&week_start))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every session of one meter in time order of filing.
    pub fn meter_sessions(&self, meter: &str) -> Vec<SessionInterval> {
        self.meters
            .get(meter)
            .into_iter()
            .flat_map(|months| months.values())
            .flat_map(|weeks| weeks.values())
            .flatten()
            .copied()
            .collect()
    }

    /// Total number of sessions.
    pub fn len(&self) -> usize {
        self.meters
            .values()
            .flat_map(|months| months.values())
            .flat_map(|weeks| weeks.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
