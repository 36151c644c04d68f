use crate::record::{RevenueRecord, WeekdayShares, YearMonth};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Column list shared by every record SELECT; order matches `record_from_row`.
pub const RECORD_COLUMNS: &str = "id, code, hospital_name, region, category, year_month, revenue,
    country, opening_date, hospital_type, status, closing_date, total_area_m2, address,
    transaction_count, avg_payment, weekday_ratio, weekend_ratio,
    monday, tuesday, wednesday, thursday, friday, saturday, sunday";

/// CSV row as exported by the revenue matching pipeline.
/// Headers are the original Korean ones; English aliases are accepted too.
/// Numbers are kept as text and parsed leniently.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CsvRow {
    #[serde(rename = "YearMonth", alias = "yearMonth", alias = "year_month")]
    pub year_month: String,

    #[serde(rename = "국가", alias = "country", default)]
    pub country: String,

    #[serde(rename = "코드", alias = "code", default)]
    pub code: String,

    #[serde(rename = "의원명", alias = "hospitalName", alias = "hospital_name", default)]
    pub hospital_name: String,

    #[serde(rename = "개설일자", alias = "openingDate", default)]
    pub opening_date: String,

    #[serde(rename = "종별코드명", alias = "hospitalType", alias = "type", default)]
    pub hospital_type: String,

    #[serde(rename = "상태", alias = "status", default)]
    pub status: String,

    #[serde(rename = "폐업일자", alias = "closingDate", default)]
    pub closing_date: String,

    #[serde(rename = "오픈닥터_진료과", alias = "category", default)]
    pub category: String,

    #[serde(rename = "총면적m2", alias = "totalAreaM2", default)]
    pub total_area_m2: String,

    #[serde(rename = "정제주소", alias = "address", default)]
    pub address: String,

    #[serde(rename = "지역", alias = "region", default)]
    pub region: String,

    #[serde(rename = "매출액", alias = "revenue", default)]
    pub revenue: String,

    #[serde(rename = "거래건수", alias = "transactionCount", default)]
    pub transaction_count: String,

    #[serde(rename = "평균결재액", alias = "avgPayment", default)]
    pub avg_payment: String,

    #[serde(rename = "주중비율", alias = "weekdayRatio", default)]
    pub weekday_ratio: String,

    #[serde(rename = "주말비율", alias = "weekendRatio", default)]
    pub weekend_ratio: String,

    #[serde(rename = "월요일", alias = "monday", default)]
    pub monday: String,
    #[serde(rename = "화요일", alias = "tuesday", default)]
    pub tuesday: String,
    #[serde(rename = "수요일", alias = "wednesday", default)]
    pub wednesday: String,
    #[serde(rename = "목요일", alias = "thursday", default)]
    pub thursday: String,
    #[serde(rename = "금요일", alias = "friday", default)]
    pub friday: String,
    #[serde(rename = "토요일", alias = "saturday", default)]
    pub saturday: String,
    #[serde(rename = "일요일", alias = "sunday", default)]
    pub sunday: String,
}

/// Lenient number parsing: blanks, garbage and negatives become 0,
/// thousands separators are ignored.
fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}

fn parse_count(raw: &str) -> i64 {
    parse_amount(raw).trunc() as i64
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Region is the first token of the cleaned address ("서울특별시 강남구 ..." → "서울특별시").
pub fn region_from_address(address: &str) -> String {
    address.split_whitespace().next().unwrap_or_default().to_string()
}

impl CsvRow {
    /// Convert to a record, or explain why the row cannot be stored.
    pub fn into_record(self) -> std::result::Result<RevenueRecord, String> {
        let year_month = self.year_month.trim().to_string();
        if YearMonth::parse(&year_month).is_none() {
            return Err(format!("malformed YearMonth '{}'", self.year_month));
        }

        let code = self.code.trim().to_string();
        if code.is_empty() {
            return Err("missing hospital code".to_string());
        }

        let region = match self.region.trim() {
            "" => region_from_address(&self.address),
            explicit => explicit.to_string(),
        };

        Ok(RevenueRecord {
            id: 0,
            hospital_code: code,
            hospital_name: self.hospital_name.trim().to_string(),
            region,
            category: self.category.trim().to_string(),
            year_month,
            revenue_amount: parse_amount(&self.revenue),
            country: self.country.trim().to_string(),
            opening_date: optional_text(&self.opening_date),
            hospital_type: self.hospital_type.trim().to_string(),
            status: self.status.trim().to_string(),
            closing_date: optional_text(&self.closing_date),
            total_area_m2: optional_text(&self.total_area_m2).map(|v| parse_amount(&v)),
            address: self.address.trim().to_string(),
            transaction_count: parse_count(&self.transaction_count),
            avg_payment: parse_amount(&self.avg_payment),
            weekday_ratio: parse_amount(&self.weekday_ratio),
            weekend_ratio: parse_amount(&self.weekend_ratio),
            weekdays: WeekdayShares {
                monday: parse_amount(&self.monday),
                tuesday: parse_amount(&self.tuesday),
                wednesday: parse_amount(&self.wednesday),
                thursday: parse_amount(&self.thursday),
                friday: parse_amount(&self.friday),
                saturday: parse_amount(&self.saturday),
                sunday: parse_amount(&self.sunday),
            },
        })
    }
}

/// Compute idempotency hash for duplicate detection on re-import
pub fn compute_idempotency_hash(record: &RevenueRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        record.year_month, record.hospital_code, record.category, record.hospital_name
    ));
    format!("{:x}", hasher.finalize())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS hospital_revenue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            year_month TEXT NOT NULL,
            country TEXT,
            code TEXT NOT NULL,
            hospital_name TEXT,
            opening_date TEXT,
            hospital_type TEXT,
            status TEXT,
            closing_date TEXT,
            category TEXT,
            total_area_m2 REAL,
            address TEXT,
            region TEXT,
            revenue REAL NOT NULL DEFAULT 0,
            transaction_count INTEGER,
            avg_payment REAL,
            weekday_ratio REAL,
            weekend_ratio REAL,
            monday REAL,
            tuesday REAL,
            wednesday REAL,
            thursday REAL,
            friday REAL,
            saturday REAL,
            sunday REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes (one per filter dimension + the common composite)
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_year_month ON hospital_revenue(year_month);
         CREATE INDEX IF NOT EXISTS idx_region ON hospital_revenue(region);
         CREATE INDEX IF NOT EXISTS idx_category ON hospital_revenue(category);
         CREATE INDEX IF NOT EXISTS idx_hospital_name ON hospital_revenue(hospital_name);
         CREATE INDEX IF NOT EXISTS idx_code ON hospital_revenue(code);
         CREATE INDEX IF NOT EXISTS idx_composite ON hospital_revenue(year_month, region, category);",
    )?;

    Ok(())
}

/// Load a revenue CSV. Rows that cannot become valid records are skipped
/// with a warning; the second value is the number skipped.
pub fn load_csv(csv_path: &Path) -> Result<(Vec<RevenueRecord>, usize)> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut records = Vec::new();
    let mut rejected = 0;

    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to deserialize row {}", line + 2))?;

        match row.into_record() {
            Ok(record) => records.push(record),
            Err(reason) => {
                rejected += 1;
                tracing::warn!(line = line + 2, %reason, "rejecting CSV row");
            }
        }
    }

    Ok((records, rejected))
}

/// Insert records in one transaction. Returns how many were new; rows whose
/// idempotency hash already exists are skipped.
pub fn insert_records(conn: &mut Connection, records: &[RevenueRecord]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO hospital_revenue (
                idempotency_hash, year_month, country, code, hospital_name,
                opening_date, hospital_type, status, closing_date, category,
                total_area_m2, address, region, revenue, transaction_count,
                avg_payment, weekday_ratio, weekend_ratio,
                monday, tuesday, wednesday, thursday, friday, saturday, sunday
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
        )?;

        for record in records {
            let hash = compute_idempotency_hash(record);
            let w = &record.weekdays;

            let result = stmt.execute(params![
                hash,
                record.year_month,
                record.country,
                record.hospital_code,
                record.hospital_name,
                record.opening_date,
                record.hospital_type,
                record.status,
                record.closing_date,
                record.category,
                record.total_area_m2,
                record.address,
                record.region,
                record.revenue_amount,
                record.transaction_count,
                record.avg_payment,
                record.weekday_ratio,
                record.weekend_ratio,
                w.monday,
                w.tuesday,
                w.wednesday,
                w.thursday,
                w.friday,
                w.saturday,
                w.sunday,
            ]);

            match result {
                Ok(_) => {
                    inserted += 1;
                    if inserted % 10_000 == 0 {
                        tracing::info!(inserted, "import progress");
                    }
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    tx.commit()?;

    tracing::info!(inserted, duplicates, "insert complete");

    Ok(inserted)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM hospital_revenue", [], |row| row.get(0))?;

    Ok(count)
}

/// Map a row selected with `RECORD_COLUMNS`. NULLs fall back to defaults.
pub fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RevenueRecord> {
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    let real = |idx: usize| -> rusqlite::Result<f64> {
        Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(0.0))
    };

    Ok(RevenueRecord {
        id: row.get(0)?,
        hospital_code: text(1)?,
        hospital_name: text(2)?,
        region: text(3)?,
        category: text(4)?,
        year_month: text(5)?,
        revenue_amount: real(6)?,
        country: text(7)?,
        opening_date: row.get(8)?,
        hospital_type: text(9)?,
        status: text(10)?,
        closing_date: row.get(11)?,
        total_area_m2: row.get(12)?,
        address: text(13)?,
        transaction_count: row.get::<_, Option<i64>>(14)?.unwrap_or(0),
        avg_payment: real(15)?,
        weekday_ratio: real(16)?,
        weekend_ratio: real(17)?,
        weekdays: WeekdayShares {
            monday: real(18)?,
            tuesday: real(19)?,
            wednesday: real(20)?,
            thursday: real(21)?,
            friday: real(22)?,
            saturday: real(23)?,
            sunday: real(24)?,
        },
    })
}
