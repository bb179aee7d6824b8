//! Rules-based US equities calendar (NYSE full-day closures).

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use chrono_tz::{America::New_York, Tz};

use tickfill_market_data::TradingHours;

use super::MarketCalendar;
use crate::constants::DEFAULT_DATA_DELAY_SECS;

/// Unscheduled full-day closures (national days of mourning, weather, 9/11).
const SPECIAL_CLOSURES: &[(i32, u32, u32)] = &[
    (2001, 9, 11),
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),
    (2007, 1, 2),
    (2012, 10, 29),
    (2012, 10, 30),
    (2018, 12, 5),
    (2025, 1, 9),
];

/// NYSE calendar computed from holiday rules, US/Eastern, extended session.
#[derive(Clone, Debug)]
pub struct UsEquityCalendar {
    session: TradingHours,
    data_delay: i64,
}

impl UsEquityCalendar {
    pub fn new() -> Self {
        Self {
            session: TradingHours::extended(),
            data_delay: DEFAULT_DATA_DELAY_SECS,
        }
    }

    pub fn with_session(mut self, session: TradingHours) -> Self {
        self.session = session;
        self
    }

    pub fn with_data_delay(mut self, seconds: i64) -> Self {
        self.data_delay = seconds;
        self
    }

    /// Name of the holiday closing the exchange on `date`, if any.
    pub fn holiday(&self, date: NaiveDate) -> Option<&'static str> {
        if SPECIAL_CLOSURES
            .iter()
            .any(|&(y, m, d)| date.year() == y && date.month() == m && date.day() == d)
        {
            return Some("Special closure");
        }

        holidays(date.year())
            .into_iter()
            .find(|(holiday, _)| *holiday == date)
            .map(|(_, name)| name)
    }
}

impl Default for UsEquityCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketCalendar for UsEquityCalendar {
    fn timezone(&self) -> Tz {
        New_York
    }

    fn session(&self) -> TradingHours {
        self.session
    }

    fn data_delay(&self) -> i64 {
        self.data_delay
    }

    fn is_open_date(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && self.holiday(date).is_none()
    }
}

/// Full-day NYSE holidays of `year`, as observed.
fn holidays(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let fixed = |month, day| NaiveDate::from_ymd_opt(year, month, day);
    let nth = |month, weekday, n| NaiveDate::from_weekday_of_month_opt(year, month, weekday, n);

    let mut days = vec![
        // Not moved back to Friday when it falls on a Saturday
        (
            fixed(1, 1).map(|d| match d.weekday() {
                Weekday::Sun => d + Duration::days(1),
                _ => d,
            }),
            "New Year's Day",
        ),
        (nth(2, Weekday::Mon, 3), "Washington's Birthday"),
        (easter_sunday(year).map(|d| d - Duration::days(2)), "Good Friday"),
        (last_weekday_of_month(year, 5, Weekday::Mon), "Memorial Day"),
        (fixed(7, 4).map(observed), "Independence Day"),
        (nth(9, Weekday::Mon, 1), "Labor Day"),
        (nth(11, Weekday::Thu, 4), "Thanksgiving Day"),
        (fixed(12, 25).map(observed), "Christmas Day"),
    ];

    if year >= 1998 {
        days.push((nth(1, Weekday::Mon, 3), "Martin Luther King Jr. Day"));
    }
    if year >= 2022 {
        days.push((fixed(6, 19).map(observed), "Juneteenth"));
    }

    days.into_iter()
        .filter_map(|(date, name)| date.map(|d| (d, name)))
        .collect()
}

/// Saturday holidays move to Friday, Sunday holidays to Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    let last = next_month - Duration::days(1);
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(i64::from(back)))
}

/// Gregorian Easter Sunday (anonymous algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
