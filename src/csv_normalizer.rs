//! CSV ingestion: column alias resolution, type coercion, self-loop removal,
//! and timestamp normalization (see SPEC_FULL.md §4.1).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::EngineError;

const TRANSACTION_ID_ALIASES: &[&str] = &[
    "transaction_id",
    "tx_id",
    "txn_id",
    "trans_id",
    "id",
    "transaction_no",
    "txn_no",
    "trans_no",
];
const SENDER_ALIASES: &[&str] = &[
    "sender_id",
    "sender_account_id",
    "from_account",
    "from_id",
    "source_id",
    "source_account",
    "sender",
    "payer_id",
    "from_account_id",
    "orig_id",
    "originator_id",
    "debit_account",
];
const RECEIVER_ALIASES: &[&str] = &[
    "receiver_id",
    "receiver_account_id",
    "to_account",
    "to_id",
    "target_id",
    "target_account",
    "receiver",
    "payee_id",
    "to_account_id",
    "dest_id",
    "beneficiary_id",
    "credit_account",
];
const AMOUNT_ALIASES: &[&str] = &[
    "amount",
    "tx_amount",
    "txn_amount",
    "transaction_amount",
    "value",
    "transfer_amount",
    "amt",
];
const TIMESTAMP_ALIASES: &[&str] = &[
    "timestamp",
    "date",
    "datetime",
    "time",
    "tx_date",
    "txn_date",
    "transaction_date",
    "created_at",
    "tx_time",
];

/// A single surviving transaction row after coercion, self-loop removal, and
/// timestamp normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    pub transaction_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// The normalized batch handed to the graph builder and detectors.
pub struct ParsedBatch {
    pub rows: Vec<RawTransaction>,
    pub has_timestamps: bool,
}

struct ColumnMap {
    transaction_id: Option<usize>,
    sender_id: usize,
    receiver_id: usize,
    amount: usize,
    timestamp: Option<usize>,
}

fn find_column(normalized_headers: &[String], aliases: &[&str]) -> Option<usize> {
    for alias in aliases {
        if let Some(pos) = normalized_headers.iter().position(|h| h == alias) {
            return Some(pos);
        }
    }
    None
}

fn resolve_columns(headers: &csv::StringRecord) -> Result<ColumnMap, EngineError> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let sender_id = find_column(&normalized, SENDER_ALIASES);
    let receiver_id = find_column(&normalized, RECEIVER_ALIASES);
    let amount = find_column(&normalized, AMOUNT_ALIASES);

    let mut missing = Vec::new();
    if sender_id.is_none() {
        missing.push("sender_id".to_string());
    }
    if receiver_id.is_none() {
        missing.push("receiver_id".to_string());
    }
    if amount.is_none() {
        missing.push("amount".to_string());
    }
    if !missing.is_empty() {
        return Err(EngineError::SchemaError {
            missing,
            observed: headers.iter().map(|h| h.to_string()).collect(),
        });
    }

    Ok(ColumnMap {
        transaction_id: find_column(&normalized, TRANSACTION_ID_ALIASES),
        sender_id: sender_id.unwrap(),
        receiver_id: receiver_id.unwrap(),
        amount: amount.unwrap(),
        timestamp: find_column(&normalized, TIMESTAMP_ALIASES),
    })
}

struct PreRow {
    transaction_id: Option<String>,
    sender_id: String,
    receiver_id: String,
    amount: f64,
    timestamp_raw: Option<String>,
}

/// Parse CSV content into a normalized batch of transactions.
pub fn parse_csv(content: &str) -> Result<ParsedBatch, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| EngineError::ParseError(e.to_string()))?
        .clone();
    let columns = resolve_columns(&headers)?;

    let mut pre_rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::ParseError(e.to_string()))?;

        let sender_id = record
            .get(columns.sender_id)
            .unwrap_or("")
            .trim()
            .to_string();
        let receiver_id = record
            .get(columns.receiver_id)
            .unwrap_or("")
            .trim()
            .to_string();
        let amount = record
            .get(columns.amount)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        let transaction_id = columns
            .transaction_id
            .map(|idx| record.get(idx).unwrap_or("").to_string());
        let timestamp_raw = columns
            .timestamp
            .map(|idx| record.get(idx).unwrap_or("").to_string());

        pre_rows.push(PreRow {
            transaction_id,
            sender_id,
            receiver_id,
            amount,
            timestamp_raw,
        });
    }

    // Transaction IDs are synthesized from the original row order, before
    // self-loops are dropped, so surviving rows may carry non-contiguous ids.
    if columns.transaction_id.is_none() {
        for (i, row) in pre_rows.iter_mut().enumerate() {
            row.transaction_id = Some((i + 1).to_string());
        }
    }

    let before = pre_rows.len();
    pre_rows.retain(|r| r.sender_id != r.receiver_id);
    if pre_rows.len() != before {
        log::debug!(
            "dropped {} self-loop row(s) during normalization",
            before - pre_rows.len()
        );
    }

    let raw_timestamps: Vec<Option<&str>> =
        pre_rows.iter().map(|r| r.timestamp_raw.as_deref()).collect();
    let (timestamps, has_timestamps) = normalize_timestamps(&raw_timestamps, columns.timestamp.is_some());

    let rows = pre_rows
        .into_iter()
        .zip(timestamps)
        .map(|(r, timestamp)| RawTransaction {
            transaction_id: r.transaction_id.unwrap_or_default(),
            sender_id: r.sender_id,
            receiver_id: r.receiver_id,
            amount: r.amount,
            timestamp,
        })
        .collect();

    Ok(ParsedBatch { rows, has_timestamps })
}

fn synthetic_base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn parse_datetime_cell(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for fmt in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    None
}

/// Decide the synthetic/Unix-seconds/Unix-millis/parsed-datetime branch and
/// produce one timestamp per row, plus the `has_timestamps` flag.
fn normalize_timestamps(raw: &[Option<&str>], column_present: bool) -> (Vec<DateTime<Utc>>, bool) {
    let base = synthetic_base();

    if !column_present {
        let timestamps = (0..raw.len())
            .map(|i| base + Duration::hours(i as i64))
            .collect();
        return (timestamps, false);
    }

    let trimmed: Vec<Option<&str>> = raw
        .iter()
        .map(|v| v.map(|s| s.trim()).filter(|s| !s.is_empty()))
        .collect();

    let numeric_values: Vec<Option<f64>> = trimmed
        .iter()
        .map(|v| v.and_then(|s| s.parse::<f64>().ok()))
        .collect();
    let has_any_value = trimmed.iter().any(|v| v.is_some());
    let all_numeric = trimmed
        .iter()
        .zip(&numeric_values)
        .all(|(raw_v, num_v)| raw_v.is_none() || num_v.is_some());

    if has_any_value && all_numeric {
        let max = numeric_values
            .iter()
            .filter_map(|v| *v)
            .fold(f64::MIN, f64::max);

        if max > 1e9 {
            let timestamps = numeric_values
                .iter()
                .map(|v| match v {
                    Some(sec) => Utc.timestamp_opt(*sec as i64, 0).single().unwrap_or(base),
                    None => base,
                })
                .collect();
            return (timestamps, true);
        } else if max > 1e6 {
            let timestamps = numeric_values
                .iter()
                .map(|v| match v {
                    Some(ms) => Utc.timestamp_millis_opt(*ms as i64).single().unwrap_or(base),
                    None => base,
                })
                .collect();
            return (timestamps, true);
        }

        let timestamps = numeric_values
            .iter()
            .map(|v| match v {
                Some(hours) => base + Duration::milliseconds((hours * 3_600_000.0) as i64),
                None => base,
            })
            .collect();
        return (timestamps, false);
    }

    let parsed: Vec<Option<DateTime<Utc>>> = trimmed
        .iter()
        .map(|v| v.and_then(parse_datetime_cell))
        .collect();
    let parsed_count = parsed.iter().filter(|p| p.is_some()).count();
    let has_timestamps = if raw.is_empty() {
        false
    } else {
        (parsed_count as f64 / raw.len() as f64) >= 0.5
    };
    if parsed_count < raw.len() {
        log::debug!(
            "{} of {} timestamp cells fell back to the synthetic base instant",
            raw.len() - parsed_count,
            raw.len()
        );
    }

    let timestamps = parsed.into_iter().map(|p| p.unwrap_or(base)).collect();
    (timestamps, has_timestamps)
}
