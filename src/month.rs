//! Billing months (`YYYY-MM`) and the month-specifier grammar: a single
//! month, an inclusive `start:end` range, or a comma-separated list.

use std::fmt;
use std::str::FromStr;

use crate::{CostdropError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(CostdropError::MonthFormat {
                token: format!("{year:04}-{month:02}"),
                reason: "month must be between 01 and 12".to_string(),
            });
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = CostdropError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason: &str| CostdropError::MonthFormat {
            token: s.to_string(),
            reason: reason.to_string(),
        };

        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(malformed("expected YYYY-MM (e.g. '2024-08')"));
        }
        if !bytes[..4].iter().all(u8::is_ascii_digit) || !bytes[5..].iter().all(u8::is_ascii_digit)
        {
            return Err(malformed("expected YYYY-MM (e.g. '2024-08')"));
        }

        let year: i32 = s[..4].parse().map_err(|_| malformed("invalid year"))?;
        let month: u32 = s[5..].parse().map_err(|_| malformed("invalid month"))?;
        Month::new(year, month)
    }
}

/// Resolve a month specifier into an ordered, duplicate-free month sequence.
///
/// Accepted forms: `2024-08`, `2024-08:2024-10` (inclusive range), and
/// `2024-08,2024-09,2024-11` (list; duplicates collapsed, result sorted).
pub fn resolve_months(input: &str) -> Result<Vec<Month>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CostdropError::EmptyMonths);
    }

    if input.contains(':') {
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() != 2 {
            return Err(CostdropError::MonthFormat {
                token: input.to_string(),
                reason: "range must have exactly one ':' separator".to_string(),
            });
        }
        let start: Month = parts[0].trim().parse()?;
        let end: Month = parts[1].trim().parse()?;
        if start > end {
            return Err(CostdropError::MonthRangeOrder { start, end });
        }

        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.next();
        }
        return Ok(months);
    }

    if input.contains(',') {
        let mut months = input
            .split(',')
            .map(|token| token.trim().parse())
            .collect::<Result<Vec<Month>>>()?;
        months.sort();
        months.dedup();
        return Ok(months);
    }

    Ok(vec![input.parse()?])
}
