use chrono::NaiveDate;

use super::MarketCalendar;
use crate::errors::CalendarError;

/// Sorted index of open dates, searched by bisection.
///
/// The index position difference of two open dates is the number of
/// session boundaries between them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenDateIndex {
    dates: Vec<NaiveDate>,
}

impl OpenDateIndex {
    pub fn from_dates(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }

    /// Index every open date in `[start, end]`.
    pub fn build(calendar: &dyn MarketCalendar, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            dates: calendar.open_dates_between(start, end),
        }
    }

    pub fn position(&self, date: NaiveDate) -> Result<usize, CalendarError> {
        self.dates
            .binary_search(&date)
            .map_err(|_| self.missing(date))
    }

    /// Number of open dates in `(from, to]`.
    pub fn open_days_between(&self, from: NaiveDate, to: NaiveDate) -> Result<i64, CalendarError> {
        let start = self.position(from)?;
        let end = self.position(to)?;
        Ok(end as i64 - start as i64)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn missing(&self, date: NaiveDate) -> CalendarError {
        let bound = |d: Option<&NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
        CalendarError::MissingOpenDate {
            date,
            first: bound(self.dates.first()),
            last: bound(self.dates.last()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::UsEquityCalendar;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_open_days_between_counts_sessions() {
        let calendar = UsEquityCalendar::new();
        let index = OpenDateIndex::build(&calendar, date(2024, 1, 1), date(2024, 1, 31));

        // Jan 1 holiday, Jan 15 MLK day
        assert_eq!(index.dates()[0], date(2024, 1, 2));
        assert!(!index.contains(date(2024, 1, 15)));
        // Fri -> Mon across a weekend is one session boundary
        assert_eq!(index.open_days_between(date(2024, 1, 5), date(2024, 1, 8)), Ok(1));
        assert_eq!(index.open_days_between(date(2024, 1, 2), date(2024, 1, 4)), Ok(2));
    }

    #[test]
    fn test_missing_date_is_an_error() {
        let index = OpenDateIndex::from_dates(vec![date(2024, 1, 3), date(2024, 1, 2)]);
        assert_eq!(index.position(date(2024, 1, 2)), Ok(0));
        assert_eq!(
            index.open_days_between(date(2024, 1, 2), date(2024, 1, 6)),
            Err(CalendarError::MissingOpenDate {
                date: date(2024, 1, 6),
                first: "2024-01-02".to_string(),
                last: "2024-01-03".to_string(),
            })
        );
    }
}
