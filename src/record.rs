// Revenue record model and the YYYYMM period key

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One hospital's revenue for one month in one category.
/// Read-only from the engine's point of view; rows are written by the importer only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueRecord {
    pub id: i64,

    // ========================================================================
    // IDENTITY & FILTER DIMENSIONS
    // ========================================================================
    pub hospital_code: String,
    pub hospital_name: String,
    pub region: String,
    pub category: String,

    /// Canonical `YYYYMM` period key
    pub year_month: String,

    /// Revenue for the month (non-negative)
    #[serde(rename = "revenue")]
    pub revenue_amount: f64,

    // ========================================================================
    // DESCRIPTIVE ATTRIBUTES (never filtered on)
    // ========================================================================
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_date: Option<String>,
    #[serde(default)]
    pub hospital_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_area_m2: Option<f64>,
    #[serde(default)]
    pub address: String,

    // ========================================================================
    // PAYMENT ACTIVITY
    // ========================================================================
    #[serde(default)]
    pub transaction_count: i64,
    #[serde(default)]
    pub avg_payment: f64,
    #[serde(default)]
    pub weekday_ratio: f64,
    #[serde(default)]
    pub weekend_ratio: f64,
    #[serde(default)]
    pub weekdays: WeekdayShares,
}

/// Share of the month's revenue per day of week.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeekdayShares {
    pub monday: f64,
    pub tuesday: f64,
    pub wednesday: f64,
    pub thursday: f64,
    pub friday: f64,
    pub saturday: f64,
    pub sunday: f64,
}

impl WeekdayShares {
    pub const NAMES: [&'static str; 7] = [
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
    ];

    pub fn values(&self) -> [f64; 7] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
    }
}

impl RevenueRecord {
    /// Minimal record with the fields every query touches; the rest defaulted.
    pub fn new(
        hospital_code: &str,
        hospital_name: &str,
        region: &str,
        category: &str,
        year_month: &str,
        revenue_amount: f64,
    ) -> Self {
        RevenueRecord {
            hospital_code: hospital_code.to_string(),
            hospital_name: hospital_name.to_string(),
            region: region.to_string(),
            category: category.to_string(),
            year_month: year_month.to_string(),
            revenue_amount,
            ..Default::default()
        }
    }

    /// Parsed period, `None` when the stored value is malformed.
    pub fn period(&self) -> Option<YearMonth> {
        YearMonth::parse(&self.year_month)
    }

    /// Reason this record cannot take part in aggregation, if any.
    pub fn integrity_fault(&self) -> Option<String> {
        if self.period().is_none() {
            return Some(format!("malformed yearMonth '{}'", self.year_month));
        }
        if !self.revenue_amount.is_finite() || self.revenue_amount < 0.0 {
            return Some(format!("invalid revenue {}", self.revenue_amount));
        }
        None
    }
}

// ============================================================================
// YEAR-MONTH
// ============================================================================

/// Validated `YYYYMM` period. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: u16,
    month: u8,
}

impl YearMonth {
    /// Parse a canonical `YYYYMM` value: exactly six ASCII digits, month 01-12.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let year: i32 = value[..4].parse().ok()?;
        let month: u32 = value[4..].parse().ok()?;

        // Let chrono reject month 00 / 13+
        NaiveDate::from_ymd_opt(year, month, 1)?;

        Some(YearMonth {
            year: year as u16,
            month: month as u8,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// `YYYY-MM` rendering used for the `month` field of trend points.
    pub fn dashed(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_year_month() {
        let ym = YearMonth::parse("202312").unwrap();
        assert_eq!(ym.year(), 2023);
        assert_eq!(ym.month(), 12);
        assert_eq!(ym.to_string(), "202312");
        assert_eq!(ym.dashed(), "2023-12");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(YearMonth::parse("2023-12").is_none());
        assert!(YearMonth::parse("20231").is_none());
        assert!(YearMonth::parse("2023123").is_none());
        assert!(YearMonth::parse("202313").is_none());
        assert!(YearMonth::parse("202300").is_none());
        assert!(YearMonth::parse("abcdef").is_none());
        assert!(YearMonth::parse("").is_none());
    }

    #[test]
    fn test_year_month_orders_chronologically() {
        let mut months: Vec<YearMonth> = ["202401", "202312", "202302", "202301"]
            .iter()
            .filter_map(|s| YearMonth::parse(s))
            .collect();
        months.sort();

        let rendered: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(rendered, vec!["202301", "202302", "202312", "202401"]);
    }

    #[test]
    fn test_integrity_fault() {
        let ok = RevenueRecord::new("H1", "Central", "North", "General", "202312", 0.0);
        assert!(ok.integrity_fault().is_none(), "zero revenue is valid data");

        let bad_month = RevenueRecord::new("H1", "Central", "North", "General", "2023-12", 10.0);
        assert!(bad_month.integrity_fault().is_some());

        let negative = RevenueRecord::new("H1", "Central", "North", "General", "202312", -1.0);
        assert!(negative.integrity_fault().is_some());

        let nan = RevenueRecord::new("H1", "Central", "North", "General", "202312", f64::NAN);
        assert!(nan.integrity_fault().is_some());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = RevenueRecord::new("H1", "Central Hospital", "North", "General", "202312", 1500.0);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["hospitalCode"], "H1");
        assert_eq!(json["hospitalName"], "Central Hospital");
        assert_eq!(json["region"], "North");
        assert_eq!(json["yearMonth"], "202312");
        assert_eq!(json["revenue"], 1500.0);
        assert!(json.get("openingDate").is_none());
    }
}
