//! Response parsing: the extraction service's delimited text → transactions.
//!
//! The service is asked for a header-led CSV table and nothing else, but
//! its answer is generated text, not a serialised structure, so nothing
//! here trusts it: fences are stripped even though the prompt forbids
//! them, columns are located by header name rather than position, and
//! amounts are coerced from whatever currency formatting survived. Rows
//! that still make no sense are dropped one by one; only a header lacking
//! `date`, `description` and `amount` makes the whole response unusable.
//!
//! [`parse_transactions`] never fails. Malformed input yields no records.

use crate::transaction::{Transaction, FALLBACK_CATEGORY};
use csv::{StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Sentinel for a row whose description cell is empty. Such rows are noise.
const MISSING_DESCRIPTION: &str = "N/A";

static RE_FENCES: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").unwrap());

static RE_AMOUNT_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\s,"$€£¥₹]"#).unwrap());

static RE_CURRENCY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{3}|[A-Za-z]{3}$").unwrap());

/// Positions of the known columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub date: usize,
    pub description: usize,
    pub amount: usize,
    pub category: Option<usize>,
    pub notes: Option<usize>,
}

impl Columns {
    /// Locate columns by (case-insensitive, trimmed) name.
    ///
    /// Returns `None` unless `date`, `description` and `amount` are all
    /// present. Extra columns are ignored.
    pub fn from_header(header: &StringRecord) -> Option<Self> {
        let names: Vec<String> = header.iter().map(|f| f.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        Some(Self {
            date: find("date")?,
            description: find("description")?,
            amount: find("amount")?,
            category: find("category"),
            notes: find("notes"),
        })
    }
}

/// Parse the raw service response into transactions, in source line order.
///
/// Each surviving row gets a fresh id.
pub fn parse_transactions(text: &str) -> Vec<Transaction> {
    let records = read_records(&strip_fences(text));

    let Some((header, rows)) = records.split_first() else {
        debug!("Response is empty; nothing to parse");
        return Vec::new();
    };
    if rows.is_empty() {
        debug!("Response has a single line; nothing to parse");
        return Vec::new();
    }

    let Some(cols) = Columns::from_header(header) else {
        warn!(
            "Response header is missing required columns (date, description, amount). Header found: {:?}",
            header
        );
        return Vec::new();
    };

    let txns: Vec<Transaction> = rows.iter().filter_map(|r| parse_row(r, &cols)).collect();

    debug!("Parsed {} of {} data row(s)", txns.len(), rows.len());
    txns
}

/// Tokenise `text` as comma-separated records with trimmed fields.
///
/// Blank lines are skipped; a record the reader rejects is skipped too.
fn read_records(text: &str) -> Vec<StringRecord> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping unreadable response line: {}", e);
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record);
    }
    records
}

/// Parse one data row; `None` when the row is noise.
fn parse_row(record: &StringRecord, cols: &Columns) -> Option<Transaction> {
    if record.len() < 3 {
        return None;
    }

    let cell = |idx: usize| record.get(idx).unwrap_or("");
    let optional = |idx: Option<usize>| idx.map(cell).unwrap_or("");

    let description = match cell(cols.description) {
        "" => MISSING_DESCRIPTION,
        d => d,
    };
    let amount = parse_amount(cell(cols.amount));

    if description == MISSING_DESCRIPTION || amount == 0.0 {
        return None;
    }

    let category = match optional(cols.category) {
        "" => FALLBACK_CATEGORY,
        c => c,
    };

    Some(Transaction::new(
        cell(cols.date),
        description,
        amount,
        category,
        optional(cols.notes),
    ))
}

/// Remove markdown fence markers (```` ``` ```` and ```` ```csv ````) anywhere
/// in the text.
pub fn strip_fences(input: &str) -> String {
    RE_FENCES
        .replace_all(&input.replace("\r\n", "\n"), "")
        .trim()
        .to_string()
}

/// Coerce a formatted amount cell to a number; anything unparseable is 0.
///
/// Accepts currency symbols, grouping commas, a leading or trailing ISO
/// currency code, a unicode minus, accountant parentheses `(12.34)`, a
/// trailing minus `12.34-`, and `CR`/`DR` suffixes.
pub fn parse_amount(raw: &str) -> f64 {
    let mut s = raw.trim().replace('\u{2212}', "-");
    // Some(true) forces a negative result, Some(false) a positive one.
    let mut forced_negative: Option<bool> = None;

    if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        s = s[1..s.len() - 1].to_string();
        forced_negative = Some(true);
    }

    let upper = s.to_ascii_uppercase();
    if let Some(rest) = upper.strip_suffix("DR") {
        s = s[..rest.len()].to_string();
        forced_negative = Some(true);
    } else if let Some(rest) = upper.strip_suffix("CR") {
        s = s[..rest.len()].to_string();
        forced_negative = Some(false);
    }

    let s = RE_AMOUNT_NOISE.replace_all(&s, "");
    let mut s = RE_CURRENCY_CODE.replace_all(&s, "").to_string();

    if s.len() > 1 && s.ends_with('-') && !s.starts_with('-') {
        s.pop();
        forced_negative = Some(true);
    }

    let value = match s.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return 0.0,
    };

    match forced_negative {
        Some(true) => -value.abs(),
        Some(false) => value.abs(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    // ── Tokenising ─────────────────────────────────────────────────────────

    #[test]
    fn records_are_trimmed_and_keep_empty_fields_in_place() {
        let records = read_records("a,b, c \n2024-01-05,,-4.50,,");
        assert_eq!(records[0], record(&["a", "b", "c"]));
        assert_eq!(records[1], record(&["2024-01-05", "", "-4.50", "", ""]));
    }

    #[test]
    fn quoted_field_keeps_delimiter_and_escaped_quotes() {
        let records = read_records(r#"x,"Smith, John ""the rock""",y"#);
        assert_eq!(records[0], record(&["x", r#"Smith, John "the rock""#, "y"]));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let records = read_records("a,b,c\n\n   \nd,e,f");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn inch_mark_in_unquoted_description_keeps_the_row() {
        let txns = parse_transactions(
            "Date,Description,Amount,Category,Notes\n\
             2024-01-01,TV 55\" screen,-400,Shopping,\n\
             2024-01-02,Tea,-2,Dining,",
        );
        let got: Vec<(&str, f64)> = txns
            .iter()
            .map(|t| (t.description.as_str(), t.amount))
            .collect();
        assert_eq!(got, vec![("TV 55\" screen", -400.0), ("Tea", -2.0)]);
        assert_eq!(txns[0].category, "Shopping");
    }

    // ── Amounts ────────────────────────────────────────────────────────────

    #[test]
    fn amount_currency_formatting() {
        assert_eq!(parse_amount("$1,234.56"), 1234.56);
        assert_eq!(parse_amount("-$89.10"), -89.10);
        assert_eq!(parse_amount("$-89.10"), -89.10);
        assert_eq!(parse_amount(" 42 "), 42.0);
        assert_eq!(parse_amount("€7.5"), 7.5);
    }

    #[test]
    fn amount_sign_conventions() {
        assert_eq!(parse_amount("(12.34)"), -12.34);
        assert_eq!(parse_amount("12.34-"), -12.34);
        assert_eq!(parse_amount("\u{2212}5.00"), -5.0);
        assert_eq!(parse_amount("100.00 DR"), -100.0);
        assert_eq!(parse_amount("100.00 CR"), 100.0);
        assert_eq!(parse_amount("USD 19.99"), 19.99);
        assert_eq!(parse_amount("-19.99 USD"), -19.99);
    }

    #[test]
    fn amount_non_numeric_is_zero() {
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("pending"), 0.0);
        assert_eq!(parse_amount("12abc34"), 0.0);
        assert_eq!(parse_amount("NaN"), 0.0);
        assert_eq!(parse_amount("inf"), 0.0);
    }

    // ── Fences ─────────────────────────────────────────────────────────────

    #[test]
    fn fences_are_stripped() {
        let raw = "```csv\nDate,Description,Amount\n2024-01-01,A,1\n```";
        assert_eq!(strip_fences(raw), "Date,Description,Amount\n2024-01-01,A,1");
    }

    // ── Header ─────────────────────────────────────────────────────────────

    #[test]
    fn header_columns_case_insensitive_and_reordered() {
        let header = record(&["Notes", " AMOUNT ", "Category", "description", "Date", "Balance"]);
        let cols = Columns::from_header(&header).unwrap();
        assert_eq!(cols.date, 4);
        assert_eq!(cols.description, 3);
        assert_eq!(cols.amount, 1);
        assert_eq!(cols.category, Some(2));
        assert_eq!(cols.notes, Some(0));
    }

    #[test]
    fn header_without_amount_is_rejected() {
        let header = record(&["Date", "Description", "Value"]);
        assert!(Columns::from_header(&header).is_none());
    }

    // ── Whole responses ────────────────────────────────────────────────────

    #[test]
    fn coffee_shop_scenario() {
        let txns = parse_transactions(
            "Date,Description,Amount,Category,Notes\n2024-01-05,\"Coffee Shop\",-4.50,Dining,",
        );
        assert_eq!(txns.len(), 1);
        let t = &txns[0];
        assert_eq!(t.date, "2024-01-05");
        assert_eq!(t.description, "Coffee Shop");
        assert_eq!(t.amount, -4.50);
        assert_eq!(t.category, "Dining");
        assert_eq!(t.notes, "");
        assert!(!t.id.is_empty());
    }

    #[test]
    fn preserves_order_and_drops_noise() {
        let text = "\
Date,Description,Amount,Category,Notes
2024-01-01,Salary,\"$2,500.00\",Income,ACME Corp

2024-01-02,,-10.00,Dining,
2024-01-03,Zero row,0.00,Other,
just one cell
2024-01-04,Groceries Co,-\"56.20\",Groceries,
2024-01-05,Bus pass,-30,,\"Metro, monthly\"
";
        let txns = parse_transactions(text);
        let descs: Vec<&str> = txns.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["Salary", "Groceries Co", "Bus pass"]);
        assert_eq!(txns[0].amount, 2500.0);
        assert_eq!(txns[1].amount, -56.20);
        assert_eq!(txns[2].category, "Other");
        assert_eq!(txns[2].notes, "Metro, monthly");
        assert!(txns.iter().all(|t| t.amount != 0.0 && !t.description.is_empty()));
    }

    #[test]
    fn missing_optional_columns_default() {
        let txns = parse_transactions("date,description,amount\n2024-03-01,Refund,12.00");
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].category, "Other");
        assert_eq!(txns[0].notes, "");
    }

    #[test]
    fn header_missing_mandatory_column_yields_nothing() {
        assert!(parse_transactions("Date,Payee,Amount\n2024-01-01,A,1").is_empty());
        assert!(parse_transactions("Description,Amount\nA,1").is_empty());
        assert!(parse_transactions("Date,Description\n2024-01-01,A").is_empty());
    }

    #[test]
    fn too_few_lines_yields_nothing() {
        assert!(parse_transactions("").is_empty());
        assert!(parse_transactions("Date,Description,Amount").is_empty());
        assert!(parse_transactions("I could not read this statement.").is_empty());
    }

    #[test]
    fn fenced_crlf_response() {
        let text = "```csv\r\nDate,Description,Amount\r\n2024-02-01,Rent,-1200\r\n```\r\n";
        let txns = parse_transactions(text);
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, -1200.0);
    }

    #[test]
    fn literal_missing_sentinel_is_dropped() {
        assert!(parse_transactions("Date,Description,Amount\n2024-01-01,N/A,5").is_empty());
    }

    #[test]
    fn ids_are_distinct_within_a_response() {
        let txns = parse_transactions("Date,Description,Amount\n2024-01-01,A,1\n2024-01-01,A,1");
        assert_eq!(txns.len(), 2);
        assert_ne!(txns[0].id, txns[1].id);
    }
}
