//! Cruise date correction (ETL-time)
//!
//! The NCEI cruise table carries free-text date ranges such as
//! `28 Nov-3 Jan 2014; 5 Feb-20 Mar 2014`. They are resolved here into the
//! comma-separated, leg-parallel `start_date` / `end_date` columns served by
//! the cruise endpoint.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

lazy_static! {
    /// Curated (start, end) values for cruises whose date text is ambiguous
    /// or known to be wrong. Values are used verbatim.
    pub static ref DATE_OVERRIDES: HashMap<&'static str, (&'static str, &'static str)> = {
        let entries: [(&str, (&str, &str)); 30] = [
            ("06AQ19950707", ("1995-07-07", "1995-09-20")),
            ("18DL20030913", ("2003-09-13", "2003-10-14")),
            ("18DL20031015", ("2003-10-15", "2003-11-25")),
            ("18HS19900906", ("1990-09-06", "1990-09-19")),
            ("06MM20060523", ("2006-05-23", "2006-06-28")),
            ("316N19871123", ("1987-12-18", "1989-04-19")),
            ("316N19961102", ("1996-11-02", "1996-12-05")),
            ("31WT19841001", ("1984-10-01", "1984-10-22")),
            ("33AT20120419", ("2012-04-19", "2012-05-01")),
            ("45CE20090206", ("2009-02-06", "2009-02-14")),
            ("45CE20100209", ("2010-02-09", "2010-02-16")),
            ("90MS19811009", ("1981-10-09", "1981-11-25")),
            ("316N19950829", ("1995-08-29", "1996-10-16")),
            ("318M19771204", ("1977-12-04", "1978-04-24")),
            ("35MF19850224", ("1985-02-24", "1987-02-20")),
            ("41SS19940301", ("1994-03-01", "1995-05-03")),
            ("18EN19850212", ("1981-02-11", "1981-02-11")),
            ("18PZ19860711", ("1982-07-10", "1982-07-10")),
            ("318M19730822", ("1973-08-22", "1974-06-09")),
            ("320619960830", ("1996-08-30", "1996-09-24")),
            ("320619970113", ("1997-01-13", "1997-02-11")),
            ("320619970404", ("1997-04-04", "1997-05-12")),
            ("33RR19971020", ("1997-10-20", "1997-11-24")),
            ("49UF20090610", ("2009-06-10", "2009-08-12")),
            ("49UP20131128", ("2013-11-28", "2013-12-23")),
            ("74JC19990315", ("1999-03-15", "1999-04-23")),
            ("OMEX1NS", ("1993-04", "1995-11")),
            ("ZZIC2005SWYD", ("2005", "2009")),
            ("49HH19910813", ("1991-08-13,1991-09-17", "1991-09-01,1991-10-02")),
            ("49NZ20030803", ("2003-08-03,2003-09-09", "2003-09-05,2003-10-16")),
        ];
        entries.into_iter().collect()
    };

    static ref YEAR: Regex = Regex::new(r"\d{4}").expect("static regex");
    static ref SEPT: Regex = Regex::new(r"(?i)\bsept\b").expect("static regex");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("static regex");
}

const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d %Y",
    "%d %b %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%B %d %Y",
    "%Y %b %d",
    "%d/%b/%Y",
];

/// Leg-parallel, comma-joined start and end dates of one cruise
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CruiseDates {
    pub start_date: String,
    pub end_date: String,
}

impl CruiseDates {
    fn legs(list: &str) -> impl Iterator<Item = &str> {
        list.split(',').map(str::trim).filter(|d| !d.is_empty())
    }

    /// Earliest leg start and latest leg end, compared as ISO strings.
    pub fn envelope(&self) -> Option<(String, String)> {
        let start = Self::legs(&self.start_date).min()?;
        let end = Self::legs(&self.end_date).max()?;
        Some((start.to_string(), end.to_string()))
    }

    /// Both lists are populated and have the same number of legs.
    pub fn is_well_formed(&self) -> bool {
        let starts = Self::legs(&self.start_date).count();
        starts > 0 && starts == Self::legs(&self.end_date).count()
    }
}

/// Requested date window of a cruise query. A cruise matches only when the
/// window contains its whole leg envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, dates: &CruiseDates) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some((first, last)) = dates.envelope() else {
            return false;
        };
        let after_start = self
            .start
            .map_or(true, |s| first.as_str() >= s.format("%Y-%m-%d").to_string().as_str());
        let before_end = self
            .end
            .map_or(true, |e| last.as_str() <= e.format("%Y-%m-%d").to_string().as_str());
        after_start && before_end
    }
}

/// Resolve a cruise's raw date text into start/end lists.
pub fn correct_dates(expocode: &str, raw: &str) -> CruiseDates {
    if let Some((start, end)) = DATE_OVERRIDES.get(expocode.trim()) {
        return CruiseDates {
            start_date: start.to_string(),
            end_date: end.to_string(),
        };
    }

    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for period in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match parse_period(period) {
            Some((start, end)) => {
                starts.push(start.format("%Y-%m-%d").to_string());
                ends.push(end.format("%Y-%m-%d").to_string());
            }
            None => debug!(expocode, period, "skipping unparseable date period"),
        }
    }

    CruiseDates {
        start_date: starts.join(","),
        end_date: ends.join(","),
    }
}

/// Parse one `start-end` period.
pub fn parse_period(period: &str) -> Option<(NaiveDate, NaiveDate)> {
    let mut period = period.replace(['\u{2013}', '\u{2014}'], "-");
    if period.matches('-').count() > 1 {
        // the first hyphen separates a day range
        period = period.replacen('-', "/", 1);
    }
    let mut parts = period.split('-');
    let (start, end) = match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => (start.trim(), end.trim()),
        _ => return None,
    };

    let end_date = parse_date_token(end)?;
    if YEAR.is_match(start) {
        return Some((parse_date_token(start)?, end_date));
    }

    // Borrow the end's year. A range crossing New Year starts the year
    // before, as does a 29 Feb that only exists in that year.
    let year: i32 = YEAR.find(end)?.as_str().parse().ok()?;
    let start_date = match parse_date_token(&format!("{} {}", start, year)) {
        Some(date) if date <= end_date => date,
        _ => parse_date_token(&format!("{} {}", start, year - 1))?,
    };
    Some((start_date, end_date))
}

/// Parse a single date token in any of the layouts seen in the cruise table.
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let cleaned = token.replace(',', " ");
    let cleaned = SEPT.replace_all(&cleaned, "Sep");
    let cleaned = SPACES.replace_all(cleaned.trim(), " ");

    // `%d %Y` happily reads "Jun 1993" as day 19 of year 93
    let year: Option<i32> = YEAR.find(&cleaned).and_then(|m| m.as_str().parse().ok());
    let parse = |text: &str, fmt: &str| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .filter(|date| year.map_or(true, |y| date.year() == y))
    };

    if let Some(date) = DATE_FORMATS.iter().find_map(|fmt| parse(&*cleaned, *fmt)) {
        return Some(date);
    }
    // month and year only: first of the month
    let month_year = format!("1 {}", cleaned);
    ["%d %b %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| parse(month_year.as_str(), *fmt))
}
