use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

static PERIOD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").expect("period pattern compiles"));

/// Year-quarter bucket, rendered as `2024-Q1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    pub year: i32,
    pub quarter: u32,
}

impl PeriodKey {
    pub fn new(year: i32, quarter: u32) -> Result<Self, AppError> {
        if !(1..=4).contains(&quarter) {
            return Err(AppError::validation(format!(
                "quarter must be between 1 and 4, got {quarter}"
            )));
        }
        Ok(Self { year, quarter })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: quarter_of_month(date.month()),
        }
    }

    pub fn previous(&self) -> Self {
        if self.quarter == 1 {
            Self {
                year: self.year - 1,
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }
}

pub fn quarter_of_month(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

impl FromStr for PeriodKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = PERIOD_PATTERN.captures(value.trim()).ok_or_else(|| {
            AppError::validation(format!("period '{value}' is not in YYYY-Qn form"))
        })?;
        let year = captures[1]
            .parse::<i32>()
            .map_err(|err| AppError::validation(format!("invalid period year: {err}")))?;
        let quarter = captures[2]
            .parse::<u32>()
            .map_err(|err| AppError::validation(format!("invalid period quarter: {err}")))?;
        Self::new(year, quarter)
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Bucket size used when building score histories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    #[default]
    Quarter,
    Year,
}

impl PeriodGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodGranularity::Quarter => "quarter",
            PeriodGranularity::Year => "year",
        }
    }

    pub fn bucket_label(&self, date: NaiveDate) -> String {
        match self {
            PeriodGranularity::Quarter => PeriodKey::from_date(date).to_string(),
            PeriodGranularity::Year => date.year().to_string(),
        }
    }
}
