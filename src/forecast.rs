use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastPeriod {
    Month,
    Year,
}

impl ForecastPeriod {
    pub fn target_date(&self, reference: NaiveDate) -> Result<NaiveDate> {
        match self {
            ForecastPeriod::Month => first_of_next_month(reference),
            ForecastPeriod::Year => first_of_next_year(reference),
        }
    }
}

pub fn first_of_next_month(date: NaiveDate) -> Result<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| out_of_range(date))
}

pub fn first_of_next_year(date: NaiveDate) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).ok_or_else(|| out_of_range(date))
}

/// Transit charts are cast at noon of the target day.
pub fn transit_moment(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default())
}

/// Secondary progression: one day after birth stands for one year of life.
pub fn progressed_date(birth: NaiveDateTime, age_years: u32) -> Result<NaiveDateTime> {
    birth
        .checked_add_signed(ChronoDuration::days(i64::from(age_years)))
        .ok_or_else(|| {
            AstrologyError::InvalidInput(format!(
                "progression of {} years from {} is out of range",
                age_years, birth
            ))
        })
}

fn out_of_range(date: NaiveDate) -> AstrologyError {
    AstrologyError::InvalidInput(format!("no forecast date follows {}", date))
}
