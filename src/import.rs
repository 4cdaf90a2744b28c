// Tabular import parser
// Parses loosely-structured CSV-like exports into an intermediate row map
// with flexible, case-insensitive header matching.
//
// Known limitation, kept on purpose: cells are split on raw commas and only
// SURROUNDING double quotes are stripped — embedded commas or quotes inside
// a value will misparse. Real exports have not needed more; hardening the
// grammar is a product decision, not a parser fix.

use crate::error::LedgerError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::debug;

// ============================================================================
// PARSED ROW
// ============================================================================

/// One data row: original header text → cell text, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRow {
    columns: Vec<(String, String)>,
}

impl ParsedRow {
    /// Build a row directly from header/cell pairs (manual construction,
    /// mostly for tests).
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        ParsedRow { columns: pairs }
    }

    /// Headers in original column order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(h, _)| h.as_str())
    }

    /// Cell under an exact original header.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, cell)| cell.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Split raw delimited text into rows.
///
/// The first non-empty line is the header row. Data lines whose cell count
/// does not match the header count are silently skipped — per-row anomalies
/// never abort an import.
pub fn parse_import(raw_text: &str) -> Result<Vec<ParsedRow>, LedgerError> {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(LedgerError::InvalidFormat(
            "import needs a header row and at least one data row".to_string(),
        ));
    }

    let headers = split_line(lines[0]);
    let mut rows = Vec::new();

    for (line_number, line) in lines[1..].iter().enumerate() {
        let cells = split_line(line);
        if cells.len() != headers.len() {
            debug!(
                line = line_number + 2,
                expected = headers.len(),
                got = cells.len(),
                "skipping row with mismatched cell count"
            );
            continue;
        }
        rows.push(ParsedRow {
            columns: headers.iter().cloned().zip(cells).collect(),
        });
    }

    Ok(rows)
}

fn split_line(line: &str) -> Vec<String> {
    line.split(',').map(|cell| strip_quotes(cell.trim()).to_string()).collect()
}

fn strip_quotes(cell: &str) -> &str {
    let cell = cell.strip_prefix('"').unwrap_or(cell);
    cell.strip_suffix('"').unwrap_or(cell)
}

// ============================================================================
// HEADER RESOLUTION
// ============================================================================

/// Canonical fields the transaction builder consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportField {
    Timestamp,
    TxHash,
    BlockNumber,
    FromAddress,
    ToAddress,
    ContractAddress,
    ValueIn,
    ValueOut,
    TokenSymbol,
    TxnFee,
    Status,
    ErrorCode,
    Method,
}

/// One entry of the declarative header-matching table.
pub struct FieldSpec {
    pub field: ImportField,
    /// Accepted header name variants, highest priority first.
    pub variants: &'static [&'static str],
}

/// The single auditable place where fuzzy header matching lives. Adding a
/// recognized export column means adding a variant here, not new code.
pub const FIELD_TABLE: &[FieldSpec] = &[
    FieldSpec {
        field: ImportField::Timestamp,
        variants: &["DateTime (UTC)", "DateTime", "timestamp", "date"],
    },
    FieldSpec {
        field: ImportField::TxHash,
        variants: &["Transaction Hash", "TxHash", "hash"],
    },
    FieldSpec {
        field: ImportField::BlockNumber,
        variants: &["Blockno", "Block Number", "blockNumber"],
    },
    FieldSpec {
        field: ImportField::FromAddress,
        variants: &["From"],
    },
    FieldSpec {
        field: ImportField::ToAddress,
        variants: &["To"],
    },
    FieldSpec {
        field: ImportField::ContractAddress,
        variants: &["ContractAddress", "tokenAddress"],
    },
    FieldSpec {
        field: ImportField::ValueIn,
        variants: &["Value_IN", "valueIn", "amountIn"],
    },
    FieldSpec {
        field: ImportField::ValueOut,
        variants: &["Value_OUT", "valueOut", "amountOut", "value", "amount"],
    },
    FieldSpec {
        field: ImportField::TokenSymbol,
        variants: &["TokenSymbol", "token", "symbol", "asset"],
    },
    FieldSpec {
        field: ImportField::TxnFee,
        variants: &["TxnFee(DAI)", "TxnFee(USD)", "TxnFee", "fee", "gasFee"],
    },
    FieldSpec {
        field: ImportField::Status,
        variants: &["Status"],
    },
    FieldSpec {
        field: ImportField::ErrorCode,
        variants: &["ErrCode"],
    },
    FieldSpec {
        field: ImportField::Method,
        variants: &["Method"],
    },
];

/// Resolve which of the row's actual headers carries a field.
///
/// Two passes, variants in priority order: (1) exact case-sensitive match;
/// (2) lower-case both sides, strip non-alphanumerics, accept the first
/// actual header where either normalized string contains the other.
pub fn resolve_header<'a>(row: &'a ParsedRow, variants: &[&str]) -> Option<&'a str> {
    for variant in variants {
        if let Some(header) = row.headers().find(|h| h == variant) {
            return Some(header);
        }
    }

    for variant in variants {
        let variant_norm = normalize_header(variant);
        if variant_norm.is_empty() {
            continue;
        }
        for header in row.headers() {
            let header_norm = normalize_header(header);
            if header_norm.is_empty() {
                continue;
            }
            if header_norm.contains(&variant_norm) || variant_norm.contains(&header_norm) {
                return Some(header);
            }
        }
    }

    None
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// The actual header a canonical field resolved to, if any.
pub fn field_header<'a>(row: &'a ParsedRow, field: ImportField) -> Option<&'a str> {
    let spec = FIELD_TABLE.iter().find(|spec| spec.field == field)?;
    resolve_header(row, spec.variants)
}

/// The cell under a canonical field. `None` when no header matched;
/// the cell itself may still be empty.
pub fn field_cell<'a>(row: &'a ParsedRow, field: ImportField) -> Option<&'a str> {
    let header = field_header(row, field)?;
    row.get(header)
}

/// Token hint embedded in a header, e.g. `Value_IN(EURe)` → `EURe`.
/// The placeholder token "x" means "no hint".
pub fn header_token_hint(header: &str) -> Option<String> {
    let open = header.find('(')?;
    let close = open + header[open..].find(')')?;
    let hint = header[open + 1..close].trim();
    if hint.is_empty() || hint.eq_ignore_ascii_case("x") {
        return None;
    }
    Some(hint.to_string())
}

// ============================================================================
// PERMISSIVE CELL PARSING
// ============================================================================

/// Value-field amounts: unparseable or non-positive cells collapse to
/// `None`, never to a zero-amount value.
pub fn parse_value_cell(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|amount| *amount > 0.0)
}

/// Fee amounts: anything unparseable or non-positive collapses to 0.
pub fn parse_fee_cell(cell: &str) -> f64 {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| *amount > 0.0)
        .unwrap_or(0.0)
}

/// Parse a timestamp cell in any of the export formats seen in the wild.
pub fn parse_datetime(cell: &str) -> Option<DateTime<Utc>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(naive.and_utc());
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }

    // Explorer APIs hand out unix seconds.
    if let Ok(seconds) = cell.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0);
    }

    None
}

/// Normalize a timestamp cell to ISO-8601, falling back to the
/// caller-supplied default when the cell is empty or unparseable.
pub fn normalize_timestamp(cell: &str, default_timestamp: &str) -> String {
    parse_datetime(cell)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| default_timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_requires_header_and_data() {
        assert_eq!(
            parse_import(""),
            Err(LedgerError::InvalidFormat(
                "import needs a header row and at least one data row".to_string()
            ))
        );
        assert!(parse_import("Transaction Hash,Value_OUT\n").is_err());
        assert!(parse_import("\n\n  \nTransaction Hash,Value_OUT\n").is_err());
    }

    #[test]
    fn test_parse_import_strips_surrounding_quotes() {
        let rows = parse_import("\"Transaction Hash\",\"Status\"\n\"0xabc\",\"1\"\n").unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Transaction Hash"), Some("0xabc"));
        assert_eq!(rows[0].get("Status"), Some("1"));
    }

    #[test]
    fn test_parse_import_skips_ragged_rows() {
        let raw = "a,b,c\n1,2,3\nonly,two\n4,5,6\n";
        let rows = parse_import(raw).unwrap();

        assert_eq!(rows.len(), 2, "ragged row must be skipped, not fail");
        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(rows[1].get("c"), Some("6"));
    }

    #[test]
    fn test_parse_import_ignores_blank_lines() {
        let raw = "\n\na,b\n\n1,2\n\n3,4\n";
        let rows = parse_import(raw).unwrap();
        assert_eq!(rows.len(), 2);
    }

    fn row_with_headers(headers: &[&str]) -> ParsedRow {
        ParsedRow::from_pairs(
            headers
                .iter()
                .map(|h| (h.to_string(), String::new()))
                .collect(),
        )
    }

    #[test]
    fn test_resolve_header_exact_match_wins() {
        let row = row_with_headers(&["Value_IN(EURe)", "Value_OUT"]);
        let resolved = resolve_header(&row, &["Value_OUT", "valueOut", "value"]);
        assert_eq!(resolved, Some("Value_OUT"));
    }

    #[test]
    fn test_resolve_header_fuzzy_substring() {
        // "Value_OUT(EURe)" normalizes to "valueouteure", which contains
        // the normalized variant "valueout".
        let row = row_with_headers(&["DateTime (UTC)", "Value_IN(EURe)", "Value_OUT(EURe)"]);
        assert_eq!(
            resolve_header(&row, &["Value_OUT", "valueOut", "value"]),
            Some("Value_OUT(EURe)")
        );
        assert_eq!(
            resolve_header(&row, &["Value_IN", "valueIn", "amountIn"]),
            Some("Value_IN(EURe)")
        );
        assert_eq!(
            resolve_header(&row, &["DateTime (UTC)", "DateTime", "timestamp", "date"]),
            Some("DateTime (UTC)")
        );
    }

    #[test]
    fn test_resolve_header_case_insensitive() {
        let row = row_with_headers(&["TXHASH", "BLOCKNO"]);
        assert_eq!(
            resolve_header(&row, &["Transaction Hash", "TxHash", "hash"]),
            Some("TXHASH")
        );
        assert_eq!(
            resolve_header(&row, &["Blockno", "Block Number", "blockNumber"]),
            Some("BLOCKNO")
        );
    }

    #[test]
    fn test_resolve_header_no_match() {
        let row = row_with_headers(&["Foo", "Bar"]);
        assert_eq!(resolve_header(&row, &["Transaction Hash", "TxHash", "hash"]), None);
    }

    #[test]
    fn test_field_cell_uses_table() {
        let row = ParsedRow::from_pairs(vec![
            ("Txhash".to_string(), "0xabc".to_string()),
            ("Value_OUT(USDC)".to_string(), "12.5".to_string()),
        ]);

        assert_eq!(field_cell(&row, ImportField::TxHash), Some("0xabc"));
        assert_eq!(field_cell(&row, ImportField::ValueOut), Some("12.5"));
        assert_eq!(field_cell(&row, ImportField::Timestamp), None);
    }

    #[test]
    fn test_header_token_hint() {
        assert_eq!(header_token_hint("Value_IN(EURe)"), Some("EURe".to_string()));
        assert_eq!(header_token_hint("TxnFee(DAI)"), Some("DAI".to_string()));
        assert_eq!(header_token_hint("Value_OUT"), None);
        assert_eq!(header_token_hint("Value_OUT(x)"), None, "placeholder x is no hint");
        assert_eq!(header_token_hint("Value_OUT()"), None);
    }

    #[test]
    fn test_parse_value_cell_permissive() {
        assert_eq!(parse_value_cell("25.5"), Some(25.5));
        assert_eq!(parse_value_cell(" 100 "), Some(100.0));
        assert_eq!(parse_value_cell("0"), None, "zero collapses to None");
        assert_eq!(parse_value_cell("-3.2"), None, "negative collapses to None");
        assert_eq!(parse_value_cell("garbage"), None);
        assert_eq!(parse_value_cell(""), None);
    }

    #[test]
    fn test_parse_fee_cell_defaults_to_zero() {
        assert_eq!(parse_fee_cell("0.002"), 0.002);
        assert_eq!(parse_fee_cell("garbage"), 0.0);
        assert_eq!(parse_fee_cell("-1"), 0.0);
        assert_eq!(parse_fee_cell(""), 0.0);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-05-01T10:30:00Z").is_some());
        assert!(parse_datetime("2024-05-01 10:30:00").is_some());
        assert!(parse_datetime("05/01/2024").is_some());
        assert!(parse_datetime("2024-05-01").is_some());
        assert!(parse_datetime("1714559400").is_some(), "unix seconds");
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn test_normalize_timestamp_falls_back_to_default() {
        let default = "2024-01-01T00:00:00Z";
        assert_eq!(normalize_timestamp("", default), default);
        assert_eq!(normalize_timestamp("garbage", default), default);
        assert_eq!(
            normalize_timestamp("2024-05-01 10:30:00", default),
            "2024-05-01T10:30:00Z"
        );
    }
}
