// Revenue Engine - the four query shapes plus the health probe over one store handle

use crate::aggregation::{AggregateStat, HospitalAccumulator, MonthlyAccumulator, Summary};
use crate::deadline::Deadline;
use crate::error::{QueryError, QueryResult};
use crate::filter::{Predicate, QueryFilter};
use crate::health::{self, HealthReport};
use crate::pagination::{paginate, Page, Paginator, QuerySettings};
use crate::record::RevenueRecord;
use crate::store::{RecordStore, SortOrder};
use crate::trend::{self, TrendPoint};
use std::ops::ControlFlow;
use std::sync::Arc;

/// Stateless query façade. Cheap to clone; every clone shares the store.
#[derive(Clone)]
pub struct RevenueEngine {
    store: Arc<dyn RecordStore>,
    settings: QuerySettings,
}

impl RevenueEngine {
    pub fn new(store: Arc<dyn RecordStore>, settings: QuerySettings) -> Self {
        RevenueEngine { store, settings }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Filtered records, newest period first, at most `filter.limit`
    /// (or the default record limit).
    pub fn records(
        &self,
        filter: &QueryFilter,
        deadline: &Deadline,
    ) -> QueryResult<Page<RevenueRecord>> {
        let predicate = Predicate::compile(filter)?;
        let limit = self
            .settings
            .resolve(filter.limit, self.settings.record_limit)?;

        let mut paginator = Paginator::new(limit);
        self.store
            .scan(&predicate, SortOrder::NewestFirst, deadline, &mut |record| {
                match record.integrity_fault() {
                    Some(fault) => {
                        tracing::warn!(id = record.id, %fault, "skipping record in retrieval");
                        ControlFlow::Continue(())
                    }
                    None => paginator.push(record),
                }
            })?;

        let page = paginator.finish();
        tracing::debug!(count = page.count(), limit, "records query");
        Ok(page)
    }

    /// Global statistics for the filtered set.
    pub fn stats(&self, filter: &QueryFilter, deadline: &Deadline) -> QueryResult<AggregateStat> {
        let predicate = Predicate::compile(filter)?;

        let mut summary = Summary::new();
        self.store
            .scan(&predicate, SortOrder::Natural, deadline, &mut |record| {
                summary.add(&record);
                ControlFlow::Continue(())
            })?;

        if summary.skipped() > 0 {
            tracing::warn!(skipped = summary.skipped(), "stats query skipped malformed records");
        }
        Ok(summary.finish())
    }

    /// Per-month statistics for the filtered set, ascending by month.
    pub fn monthly_stats(
        &self,
        filter: &QueryFilter,
        deadline: &Deadline,
    ) -> QueryResult<Page<TrendPoint>> {
        let predicate = Predicate::compile(filter)?;

        let mut acc = MonthlyAccumulator::new();
        self.store
            .scan(&predicate, SortOrder::OldestFirst, deadline, &mut |record| {
                acc.add(&record);
                ControlFlow::Continue(())
            })?;

        let points = trend::assemble(acc.finish());
        tracing::debug!(months = points.len(), "monthly stats query");
        Ok(paginate(points, usize::MAX))
    }

    /// Monthly trend of one hospital: the `limit` most recent months, ascending.
    /// An unknown code is an empty page, not an error.
    pub fn hospital_trend(
        &self,
        code: &str,
        limit: Option<u32>,
        deadline: &Deadline,
    ) -> QueryResult<Page<TrendPoint>> {
        let code = code.trim();
        if code.is_empty() {
            return Err(QueryError::invalid("hospital code is required"));
        }
        let limit = self.settings.resolve(limit, self.settings.trend_limit)?;

        let predicate = Predicate::compile(&QueryFilter::new().hospital_code(code))?;
        let mut acc = HospitalAccumulator::new(code);
        self.store
            .scan(&predicate, SortOrder::OldestFirst, deadline, &mut |record| {
                acc.add(&record);
                ControlFlow::Continue(())
            })?;

        let points = trend::latest(acc.finish(), limit);
        tracing::debug!(code, months = points.len(), limit, "hospital trend query");
        Ok(paginate(points, limit))
    }

    /// Store reachability and total record count. Bypasses filtering.
    pub fn health(&self, deadline: &Deadline) -> HealthReport {
        health::report(self.store.as_ref(), deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(code: &str, region: &str, category: &str, year_month: &str, revenue: f64) -> RevenueRecord {
        RevenueRecord::new(code, "Central Hospital", region, category, year_month, revenue)
    }

    fn engine_with(records: Vec<RevenueRecord>) -> (RevenueEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(records));
        let engine = RevenueEngine::new(store.clone(), QuerySettings::default());
        (engine, store)
    }

    fn eight_north_general_plus_noise() -> Vec<RevenueRecord> {
        let mut records: Vec<RevenueRecord> = (0..8)
            .map(|i| record(&format!("H{}", i), "North", "General", "202312", 100.0 * i as f64))
            .collect();
        records.push(record("S1", "South", "General", "202312", 50.0));
        records.push(record("N9", "North", "Dermatology", "202312", 60.0));
        records.push(record("N8", "North", "General", "202311", 70.0));
        records
    }

    #[test]
    fn test_records_respects_limit_and_filter() {
        let (engine, _) = engine_with(eight_north_general_plus_noise());
        let filter = QueryFilter::new()
            .region("North")
            .category("General")
            .year_month("202312")
            .limit(5);

        let page = engine.records(&filter, &Deadline::none()).unwrap();

        assert_eq!(page.count(), 5);
        assert_eq!(page.data().len(), 5);
        assert!(page.data().iter().all(|r| r.region == "North"));
        assert!(page.data().iter().all(|r| r.category == "General"));

        let revenues: Vec<f64> = page.data().iter().map(|r| r.revenue_amount).collect();
        assert_eq!(revenues, vec![700.0, 600.0, 500.0, 400.0, 300.0]);
    }

    #[test]
    fn test_records_default_limit_applies() {
        let records = (0..150)
            .map(|i| record(&format!("H{}", i), "North", "General", "202312", i as f64))
            .collect();
        let (engine, _) = engine_with(records);

        let page = engine.records(&QueryFilter::new(), &Deadline::none()).unwrap();
        assert_eq!(page.count(), 100);
    }

    #[test]
    fn test_records_skip_malformed_rows() {
        let (engine, _) = engine_with(vec![
            record("H1", "North", "General", "202312", 10.0),
            record("H2", "North", "General", "bad", 10.0),
        ]);

        let page = engine.records(&QueryFilter::new(), &Deadline::none()).unwrap();
        assert_eq!(page.count(), 1);
        assert_eq!(page.data()[0].hospital_code, "H1");
    }

    #[test]
    fn test_records_invalid_filter() {
        let (engine, _) = engine_with(eight_north_general_plus_noise());

        let bad_month = engine.records(&QueryFilter::new().year_month("2023-12"), &Deadline::none());
        assert!(matches!(bad_month, Err(QueryError::InvalidFilter(_))));

        let zero_limit = engine.records(&QueryFilter::new().limit(0), &Deadline::none());
        assert!(matches!(zero_limit, Err(QueryError::InvalidFilter(_))));
    }

    #[test]
    fn test_stats_over_filtered_set() {
        let (engine, _) = engine_with(eight_north_general_plus_noise());
        let filter = QueryFilter::new().region("North").category("General").year_month("202312");

        let stats = engine.stats(&filter, &Deadline::none()).unwrap();
        assert_eq!(stats.get("recordCount"), Some(8.0));
        assert_eq!(stats.get("totalRevenue"), Some(2800.0));
        assert_eq!(stats.get("avgRevenue"), Some(350.0));
        assert!(stats.iter().all(|(_, v)| v.as_f64() >= 0.0));
    }

    #[test]
    fn test_stats_with_no_matches_is_zeroed() {
        let (engine, _) = engine_with(eight_north_general_plus_noise());
        let stats = engine
            .stats(&QueryFilter::new().region("Nowhere"), &Deadline::none())
            .unwrap();

        assert_eq!(stats.get("recordCount"), Some(0.0));
        assert_eq!(stats.get("avgRevenue"), Some(0.0));
    }

    #[test]
    fn test_monthly_stats_two_distinct_months() {
        let (engine, _) = engine_with(vec![
            record("H1", "North", "General", "202301", 100.0),
            record("H2", "North", "General", "202302", 200.0),
            record("H3", "North", "General", "202301", 300.0),
        ]);

        let page = engine.monthly_stats(&QueryFilter::new(), &Deadline::none()).unwrap();
        let months: Vec<String> = page.data().iter().map(|p| p.period.dashed()).collect();

        assert_eq!(months, vec!["2023-01", "2023-02"]);
        assert_eq!(page.count(), 2);
        assert_eq!(page.data()[0].stats.get("count"), Some(2.0));
    }

    #[test]
    fn test_hospital_trend_keeps_most_recent_ascending() {
        let records = (1..=12)
            .map(|m| record("H1", "North", "General", &format!("2023{:02}", m), m as f64))
            .chain(std::iter::once(record("H2", "North", "General", "202312", 5.0)))
            .collect();
        let (engine, _) = engine_with(records);

        let page = engine.hospital_trend("H1", Some(5), &Deadline::none()).unwrap();
        let months: Vec<String> = page.data().iter().map(|p| p.period.to_string()).collect();

        assert_eq!(page.count(), 5);
        assert_eq!(months, vec!["202308", "202309", "202310", "202311", "202312"]);
    }

    #[test]
    fn test_hospital_trend_unknown_code_is_empty() {
        let (engine, _) = engine_with(eight_north_general_plus_noise());

        let page = engine.hospital_trend("UNKNOWN", None, &Deadline::none()).unwrap();
        assert_eq!(page.count(), 0);
        assert!(page.data().is_empty());
    }

    #[test]
    fn test_hospital_trend_requires_code() {
        let (engine, _) = engine_with(Vec::new());
        let result = engine.hospital_trend("  ", None, &Deadline::none());
        assert!(matches!(result, Err(QueryError::InvalidFilter(_))));
    }

    #[test]
    fn test_store_outage_is_an_error_not_empty() {
        let (engine, store) = engine_with(eight_north_general_plus_noise());
        store.set_online(false);

        assert!(matches!(
            engine.records(&QueryFilter::new(), &Deadline::none()),
            Err(QueryError::StoreUnavailable(_))
        ));
        assert!(matches!(
            engine.stats(&QueryFilter::new(), &Deadline::none()),
            Err(QueryError::StoreUnavailable(_))
        ));

        let health = engine.health(&Deadline::none());
        assert_ne!(health.status, "ok");
    }

    #[test]
    fn test_health_total_covers_retrievable_records() {
        let (engine, _) = engine_with(eight_north_general_plus_noise());

        let health = engine.health(&Deadline::none());
        let page = engine.records(&QueryFilter::new().limit(1_000), &Deadline::none()).unwrap();

        assert_eq!(health.status, "ok");
        assert_eq!(health.total_records, 11);
        assert!(page.count() as u64 <= health.total_records);
    }
}
