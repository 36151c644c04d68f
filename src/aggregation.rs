// 📊 Aggregation Engine - sums, averages and counts over filtered records
//
// Statistics are an open name → value map rather than a fixed struct, so new
// figures can be added without changing the response contract.
//
// Accumulators are streaming: they are fed from inside a store scan, so the
// scan's deadline also bounds the aggregation.

use crate::record::{RevenueRecord, WeekdayShares, YearMonth};
use crate::trend::{self, TrendPoint};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// AGGREGATE STAT
// ============================================================================

/// A single statistic. Counts stay integral in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(u64),
    Amount(f64),
}

impl StatValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            StatValue::Count(n) => *n as f64,
            StatValue::Amount(v) => *v,
        }
    }
}

/// Ordered mapping from statistic name to a non-negative value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateStat(BTreeMap<String, StatValue>);

impl AggregateStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_count(&mut self, name: &str, value: u64) {
        self.0.insert(name.to_string(), StatValue::Count(value));
    }

    /// Negative and non-finite amounts are stored as 0.
    pub fn insert_amount(&mut self, name: &str, value: f64) {
        let value = if value.is_finite() && value > 0.0 { value } else { 0.0 };
        self.0.insert(name.to_string(), StatValue::Amount(value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).map(StatValue::as_f64)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StatValue)> {
        self.0.iter()
    }

    /// Fold another stat map into this one, overwriting equal names.
    pub fn extend(&mut self, other: AggregateStat) {
        self.0.extend(other.0);
    }
}

fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Skip records that cannot be aggregated, logging the data fault.
fn admissible(record: &RevenueRecord) -> Option<YearMonth> {
    match record.integrity_fault() {
        Some(fault) => {
            tracing::warn!(
                id = record.id,
                code = %record.hospital_code,
                %fault,
                "skipping record in aggregation"
            );
            None
        }
        None => record.period(),
    }
}

// ============================================================================
// GLOBAL SUMMARY
// ============================================================================

/// Running totals for the global statistics query.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    count: u64,
    hospitals: HashSet<String>,
    total_revenue: f64,
    max_revenue: Option<f64>,
    min_revenue: Option<f64>,
    total_transactions: u64,
    weekday_ratio_sum: f64,
    weekend_ratio_sum: f64,
    skipped: u64,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &RevenueRecord) {
        if admissible(record).is_none() {
            self.skipped += 1;
            return;
        }

        let revenue = record.revenue_amount;
        self.count += 1;
        self.hospitals.insert(record.hospital_code.clone());
        self.total_revenue += revenue;
        self.max_revenue = Some(self.max_revenue.map_or(revenue, |m| m.max(revenue)));
        self.min_revenue = Some(self.min_revenue.map_or(revenue, |m| m.min(revenue)));
        self.total_transactions += record.transaction_count.max(0) as u64;
        self.weekday_ratio_sum += record.weekday_ratio.max(0.0);
        self.weekend_ratio_sum += record.weekend_ratio.max(0.0);
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn finish(self) -> AggregateStat {
        let mut stat = AggregateStat::new();
        stat.insert_count("recordCount", self.count);
        stat.insert_count("hospitalCount", self.hospitals.len() as u64);
        stat.insert_count("totalTransactions", self.total_transactions);
        stat.insert_amount("totalRevenue", self.total_revenue);
        stat.insert_amount("avgRevenue", mean(self.total_revenue, self.count));
        stat.insert_amount("maxRevenue", self.max_revenue.unwrap_or(0.0));
        stat.insert_amount("minRevenue", self.min_revenue.unwrap_or(0.0));
        stat.insert_amount("avgWeekdayRatio", mean(self.weekday_ratio_sum, self.count));
        stat.insert_amount("avgWeekendRatio", mean(self.weekend_ratio_sum, self.count));
        stat
    }
}

/// Global statistics over `records`.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a RevenueRecord>) -> AggregateStat {
    let mut summary = Summary::new();
    for record in records {
        summary.add(record);
    }
    summary.finish()
}

// ============================================================================
// BY MONTH
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MonthTotals {
    count: u64,
    total_revenue: f64,
    total_transactions: u64,
    weekday_sums: [f64; 7],
}

/// Running per-month totals for the monthly trend query.
#[derive(Debug, Clone, Default)]
pub struct MonthlyAccumulator {
    months: BTreeMap<YearMonth, MonthTotals>,
}

impl MonthlyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &RevenueRecord) {
        let Some(period) = admissible(record) else {
            return;
        };

        let totals = self.months.entry(period).or_default();
        totals.count += 1;
        totals.total_revenue += record.revenue_amount;
        totals.total_transactions += record.transaction_count.max(0) as u64;
        for (sum, share) in totals.weekday_sums.iter_mut().zip(record.weekdays.values()) {
            *sum += share.max(0.0);
        }
    }

    pub fn finish(self) -> BTreeMap<YearMonth, AggregateStat> {
        self.months
            .into_iter()
            .map(|(period, totals)| {
                let mut stat = AggregateStat::new();
                stat.insert_count("count", totals.count);
                stat.insert_count("totalTransactions", totals.total_transactions);
                stat.insert_amount("totalRevenue", totals.total_revenue);
                stat.insert_amount("avgRevenue", mean(totals.total_revenue, totals.count));
                for (name, sum) in WeekdayShares::NAMES.iter().zip(totals.weekday_sums) {
                    stat.insert_amount(&format!("avg{}", capitalize(name)), mean(sum, totals.count));
                }
                (period, stat)
            })
            .collect()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One stat map per month present in `records`; absent months are omitted.
pub fn aggregate_by_month<'a>(
    records: impl IntoIterator<Item = &'a RevenueRecord>,
) -> BTreeMap<YearMonth, AggregateStat> {
    let mut acc = MonthlyAccumulator::new();
    for record in records {
        acc.add(record);
    }
    acc.finish()
}

// ============================================================================
// BY HOSPITAL
// ============================================================================

#[derive(Debug, Clone, Default)]
struct HospitalMonth {
    count: u64,
    revenue: f64,
    transactions: u64,
    avg_payment_sum: f64,
}

/// Running per-month totals for a single hospital. Records of other
/// hospitals are ignored.
#[derive(Debug, Clone)]
pub struct HospitalAccumulator {
    code: String,
    months: BTreeMap<YearMonth, HospitalMonth>,
}

impl HospitalAccumulator {
    pub fn new(code: &str) -> Self {
        HospitalAccumulator {
            code: code.to_string(),
            months: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, record: &RevenueRecord) {
        if record.hospital_code != self.code {
            return;
        }
        let Some(period) = admissible(record) else {
            return;
        };

        let month = self.months.entry(period).or_default();
        month.count += 1;
        month.revenue += record.revenue_amount;
        month.transactions += record.transaction_count.max(0) as u64;
        month.avg_payment_sum += record.avg_payment.max(0.0);
    }

    /// Chronologically ascending trend points.
    pub fn finish(self) -> Vec<TrendPoint> {
        let groups = self.months.into_iter().map(|(period, month)| {
            let mut stat = AggregateStat::new();
            stat.insert_count("count", month.count);
            stat.insert_count("transactionCount", month.transactions);
            stat.insert_amount("revenue", month.revenue);
            stat.insert_amount("avgPayment", mean(month.avg_payment_sum, month.count));
            (period, stat)
        });
        trend::assemble(groups)
    }
}

/// Monthly trend of one hospital. An unknown code yields an empty series.
pub fn aggregate_by_hospital<'a>(
    records: impl IntoIterator<Item = &'a RevenueRecord>,
    hospital_code: &str,
) -> Vec<TrendPoint> {
    let mut acc = HospitalAccumulator::new(hospital_code);
    for record in records {
        acc.add(record);
    }
    acc.finish()
}
