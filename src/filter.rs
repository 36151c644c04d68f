// 🔎 Filter Evaluator - query parameters → predicate over records
//
// Conjunctive exact-equality matching. The same predicate is evaluated
// in-process (MemoryStore) and pushed down as a SQL WHERE clause (SqliteStore).

use crate::error::{QueryError, QueryResult};
use crate::record::{RevenueRecord, YearMonth};
use serde::{Deserialize, Serialize};

// ============================================================================
// QUERY FILTER
// ============================================================================

/// Request-scoped filter. Every field is optional; `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    pub region: Option<String>,
    pub category: Option<String>,
    pub year_month: Option<String>,
    pub hospital_name: Option<String>,
    pub hospital_code: Option<String>,
    pub limit: Option<u32>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn year_month(mut self, year_month: &str) -> Self {
        self.year_month = Some(year_month.to_string());
        self
    }

    pub fn hospital_name(mut self, name: &str) -> Self {
        self.hospital_name = Some(name.to_string());
        self
    }

    pub fn hospital_code(mut self, code: &str) -> Self {
        self.hospital_code = Some(code.to_string());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// PREDICATE
// ============================================================================

/// Record field a condition constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Region,
    Category,
    YearMonth,
    HospitalName,
    HospitalCode,
}

impl Field {
    /// Column name in the `hospital_revenue` table
    pub fn column(&self) -> &'static str {
        match self {
            Field::Region => "region",
            Field::Category => "category",
            Field::YearMonth => "year_month",
            Field::HospitalName => "hospital_name",
            Field::HospitalCode => "code",
        }
    }

    fn value_of<'a>(&self, record: &'a RevenueRecord) -> &'a str {
        match self {
            Field::Region => &record.region,
            Field::Category => &record.category,
            Field::YearMonth => &record.year_month,
            Field::HospitalName => &record.hospital_name,
            Field::HospitalCode => &record.hospital_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub value: String,
}

/// Compiled, validated filter. Admits every record when it has no conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    /// Predicate that admits all records (the health probe and unfiltered scans).
    pub fn all() -> Self {
        Self::default()
    }

    /// Validate a filter and turn its present fields into equality conditions.
    pub fn compile(filter: &QueryFilter) -> QueryResult<Self> {
        let mut conditions = Vec::new();

        let mut push = |field: Field, value: &Option<String>| {
            if let Some(value) = value {
                conditions.push(Condition {
                    field,
                    value: value.clone(),
                });
            }
        };

        push(Field::Region, &filter.region);
        push(Field::Category, &filter.category);
        push(Field::HospitalName, &filter.hospital_name);
        push(Field::HospitalCode, &filter.hospital_code);

        if let Some(year_month) = &filter.year_month {
            let period = YearMonth::parse(year_month).ok_or_else(|| {
                QueryError::invalid(format!(
                    "yearMonth must be YYYYMM with month 01-12, got '{}'",
                    year_month
                ))
            })?;
            conditions.push(Condition {
                field: Field::YearMonth,
                value: period.to_string(),
            });
        }

        Ok(Predicate { conditions })
    }

    pub fn matches(&self, record: &RevenueRecord) -> bool {
        self.conditions
            .iter()
            .all(|c| c.field.value_of(record) == c.value)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// SQL rendering: (`WHERE ...` or empty string, bound values in order).
    pub fn where_clause(&self) -> (String, Vec<String>) {
        if self.conditions.is_empty() {
            return (String::new(), Vec::new());
        }

        let clauses: Vec<String> = self
            .conditions
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c.field.column(), i + 1))
            .collect();
        let values = self.conditions.iter().map(|c| c.value.clone()).collect();

        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_general() -> RevenueRecord {
        RevenueRecord::new("H001", "Central Hospital", "North", "General", "202312", 1200.0)
    }

    #[test]
    fn test_empty_filter_admits_everything() {
        let predicate = Predicate::compile(&QueryFilter::new()).unwrap();
        assert!(predicate.is_empty());
        assert!(predicate.matches(&north_general()));
        assert_eq!(predicate.where_clause(), (String::new(), Vec::new()));
    }

    #[test]
    fn test_conjunctive_matching() {
        let filter = QueryFilter::new()
            .region("North")
            .category("General")
            .year_month("202312");
        let predicate = Predicate::compile(&filter).unwrap();

        assert!(predicate.matches(&north_general()));

        let mut other_category = north_general();
        other_category.category = "Dermatology".to_string();
        assert!(!predicate.matches(&other_category));

        let mut other_month = north_general();
        other_month.year_month = "202311".to_string();
        assert!(!predicate.matches(&other_month));
    }

    #[test]
    fn test_matching_is_exact_and_case_sensitive() {
        let predicate = Predicate::compile(&QueryFilter::new().region("north")).unwrap();
        assert!(!predicate.matches(&north_general()));

        let predicate = Predicate::compile(&QueryFilter::new().hospital_name("Central")).unwrap();
        assert!(!predicate.matches(&north_general()), "no substring matching");
    }

    #[test]
    fn test_hospital_code_condition() {
        let predicate = Predicate::compile(&QueryFilter::new().hospital_code("H001")).unwrap();
        assert!(predicate.matches(&north_general()));

        let predicate = Predicate::compile(&QueryFilter::new().hospital_code("H999")).unwrap();
        assert!(!predicate.matches(&north_general()));
    }

    #[test]
    fn test_malformed_year_month_is_invalid_filter() {
        for bad in ["2023-12", "20231", "202313", "latest"] {
            let result = Predicate::compile(&QueryFilter::new().year_month(bad));
            assert!(
                matches!(result, Err(QueryError::InvalidFilter(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_where_clause_binds_in_order() {
        let filter = QueryFilter::new().region("North").year_month("202312");
        let (sql, values) = Predicate::compile(&filter).unwrap().where_clause();

        assert_eq!(sql, " WHERE region = ?1 AND year_month = ?2");
        assert_eq!(values, vec!["North".to_string(), "202312".to_string()]);
    }

    #[test]
    fn test_limit_does_not_constrain_records() {
        let predicate = Predicate::compile(&QueryFilter::new().limit(1)).unwrap();
        assert!(predicate.is_empty());
    }
}
