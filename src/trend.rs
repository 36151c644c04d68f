// 📈 Trend Assembler - chronological ordering and truncation of grouped stats

use crate::aggregation::AggregateStat;
use crate::record::YearMonth;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Statistics for one period of a trend series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub period: YearMonth,
    pub stats: AggregateStat,
}

impl TrendPoint {
    pub fn new(period: YearMonth, stats: AggregateStat) -> Self {
        TrendPoint { period, stats }
    }
}

/// Flat JSON: `{ "month": "YYYY-MM", "yearMonth": "YYYYMM", ...stats }`
impl Serialize for TrendPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.stats.len() + 2))?;
        map.serialize_entry("month", &self.period.dashed())?;
        map.serialize_entry("yearMonth", &self.period.to_string())?;
        for (name, value) in self.stats.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Order grouped stats strictly ascending by period. Groups sharing a period
/// are merged, the later group's values winning on equal names.
pub fn assemble(groups: impl IntoIterator<Item = (YearMonth, AggregateStat)>) -> Vec<TrendPoint> {
    let mut by_period: BTreeMap<YearMonth, AggregateStat> = BTreeMap::new();
    for (period, stats) in groups {
        by_period.entry(period).or_default().extend(stats);
    }

    by_period
        .into_iter()
        .map(|(period, stats)| TrendPoint::new(period, stats))
        .collect()
}

/// Keep the `limit` most recent periods of an ascending series, still ascending.
pub fn latest(mut points: Vec<TrendPoint>, limit: usize) -> Vec<TrendPoint> {
    if points.len() > limit {
        let excess = points.len() - limit;
        points.drain(..excess);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(year_month: &str, value: u64) -> (YearMonth, AggregateStat) {
        let mut stats = AggregateStat::new();
        stats.insert_count("count", value);
        (YearMonth::parse(year_month).unwrap(), stats)
    }

    fn periods(points: &[TrendPoint]) -> Vec<String> {
        points.iter().map(|p| p.period.dashed()).collect()
    }

    #[test]
    fn test_assemble_sorts_ascending() {
        let points = assemble(vec![point("202403", 3), point("202312", 1), point("202401", 2)]);
        assert_eq!(periods(&points), vec!["2023-12", "2024-01", "2024-03"]);
    }

    #[test]
    fn test_assemble_merges_duplicate_periods() {
        let points = assemble(vec![point("202301", 1), point("202302", 2), point("202301", 5)]);
        assert_eq!(periods(&points), vec!["2023-01", "2023-02"]);
        assert_eq!(points[0].stats.get("count"), Some(5.0));
    }

    #[test]
    fn test_latest_keeps_most_recent_ascending() {
        let points = assemble((1..=9).map(|m| point(&format!("2023{:02}", m), m)));

        let kept = latest(points, 3);
        assert_eq!(periods(&kept), vec!["2023-07", "2023-08", "2023-09"]);
    }

    #[test]
    fn test_latest_with_short_series() {
        let points = assemble(vec![point("202301", 1)]);
        assert_eq!(latest(points, 5).len(), 1);
        assert!(latest(Vec::new(), 5).is_empty());
    }

    #[test]
    fn test_trend_point_serializes_flat() {
        let (period, stats) = point("202306", 4);
        let json = serde_json::to_value(TrendPoint::new(period, stats)).unwrap();

        assert_eq!(json["month"], "2023-06");
        assert_eq!(json["yearMonth"], "202306");
        assert_eq!(json["count"], 4);
    }
}
