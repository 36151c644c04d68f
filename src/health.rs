// Health Reporter - store reachability and record volume

use crate::deadline::Deadline;
use crate::store::RecordStore;
use serde::Serialize;

pub const STATUS_OK: &str = "ok";
pub const STATUS_DEGRADED: &str = "degraded";
pub const DATABASE_CONNECTED: &str = "connected";
pub const DATABASE_UNREACHABLE: &str = "unreachable";
pub const DATABASE_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub total_records: u64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Probe the store. Never reports `ok` unless both ping and count succeed.
pub fn report(store: &dyn RecordStore, deadline: &Deadline) -> HealthReport {
    if !store.ping() {
        tracing::warn!("health probe: store unreachable");
        return HealthReport {
            status: STATUS_DEGRADED.to_string(),
            database: DATABASE_UNREACHABLE.to_string(),
            total_records: 0,
        };
    }

    match store.count(deadline) {
        Ok(total_records) => HealthReport {
            status: STATUS_OK.to_string(),
            database: DATABASE_CONNECTED.to_string(),
            total_records,
        },
        Err(e) => {
            tracing::warn!(error = %e, "health probe: count failed");
            HealthReport {
                status: STATUS_DEGRADED.to_string(),
                database: DATABASE_ERROR.to_string(),
                total_records: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RevenueRecord;
    use crate::store::MemoryStore;
    use std::time::Instant;

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            RevenueRecord::new("H1", "Central", "North", "General", "202312", 10.0),
            RevenueRecord::new("H2", "Riverside", "South", "General", "202312", 20.0),
        ])
    }

    #[test]
    fn test_healthy_store() {
        let report = report(&store(), &Deadline::none());
        assert!(report.is_healthy());
        assert_eq!(report.database, DATABASE_CONNECTED);
        assert_eq!(report.total_records, 2);
    }

    #[test]
    fn test_unreachable_store_is_degraded() {
        let store = store();
        store.set_online(false);

        let report = report(&store, &Deadline::none());
        assert_ne!(report.status, STATUS_OK);
        assert_eq!(report.database, DATABASE_UNREACHABLE);
        assert_eq!(report.total_records, 0);
    }

    #[test]
    fn test_count_failure_is_degraded() {
        let report = report(&store(), &Deadline::at(Instant::now()));
        assert!(!report.is_healthy());
        assert_eq!(report.database, DATABASE_ERROR);
    }

    #[test]
    fn test_report_json_shape() {
        let json = serde_json::to_value(report(&store(), &Deadline::none())).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], "connected");
        assert_eq!(json["totalRecords"], 2);
    }
}
