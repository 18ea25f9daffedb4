//! Row enrichment: one decompressed data file in, one enriched table out.
//!
//! The transform order is fixed and mirrors the feed's documented
//! processing sequence:
//!
//! 1. apply the partition's column headers (positional; data files carry none)
//! 2. optionally drop pre-processing `evar*`/`prop*` columns
//! 3. translate the categorical dimension columns through their lookup tables
//! 4. derive `visid_type_map` from `visid_type`
//! 5. derive `Session_ID` and `User_ID` from the exclusion predicate
//! 6. sanitize every column name for the warehouse
//!
//! Steps 3 through 5 only append or rewrite values in place, so column
//! indexes resolved earlier stay valid throughout.

use super::lookup::LookupCatalog;
use super::table::Table;
use super::types::{FeedError, FileStats};
use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Sentinel identifier for rows the exclusion predicate rejects.
pub const NOT_SET: &str = "(not set)";

/// The categorical columns translated through lookup tables, in application
/// order. Three referrer columns share `referrer_type.tsv`; the organic and
/// paid search-engine columns share `search_engines.tsv`.
pub const DIMENSION_COLUMNS: [(&str, &str); 14] = [
    ("browser.tsv", "browser"),
    ("color_depth.tsv", "color"),
    ("connection_type.tsv", "connection_type"),
    ("country.tsv", "country"),
    ("javascript_version.tsv", "javascript"),
    ("languages.tsv", "language"),
    ("operating_systems.tsv", "os"),
    ("plugins.tsv", "plugins"),
    ("referrer_type.tsv", "first_hit_ref_type"),
    ("referrer_type.tsv", "ref_type"),
    ("referrer_type.tsv", "visit_ref_type"),
    ("resolution.tsv", "resolution"),
    ("search_engines.tsv", "search_engine"),
    ("search_engines.tsv", "post_search_engine"),
];

/// Label for a `visid_type` code. Codes outside the fixed enumeration get
/// `None` and pass through unchanged.
pub fn visitor_id_label(code: &str) -> Option<&'static str> {
    match code.trim().parse::<i64>().ok()? {
        0 => Some("Custom Visitor ID"),
        1 => Some("IP & UA Fallback"),
        2 => Some("Wireless"),
        3 => Some("Adobe"),
        4 => Some("Fallback Cookie"),
        5 => Some("Visitor ID Service"),
        _ => None,
    }
}

/// Exclusion predicate: `exclude_hit > 0` or `hit_source` in {5, 7, 8, 9}.
///
/// Total over arbitrary field text: a non-numeric `exclude_hit` counts as
/// zero, and `hit_source` is compared as a trimmed token.
pub fn is_excluded(exclude_hit: &str, hit_source: &str) -> bool {
    let flagged = exclude_hit.trim().parse::<i64>().unwrap_or(0) > 0;
    flagged || matches!(hit_source.trim(), "5" | "7" | "8" | "9")
}

/// Session identifier for a non-excluded row: the four fields concatenated
/// with no separator.
pub fn session_id(visid_high: &str, visid_low: &str, visit_num: &str, visit_start: &str) -> String {
    format!("{}{}{}{}", visid_high, visid_low, visit_num, visit_start)
}

/// User identifier for a non-excluded row.
pub fn user_id(visid_high: &str, visid_low: &str) -> String {
    format!("{}{}", visid_high, visid_low)
}

/// Collapse every maximal run of non-alphanumeric characters to one
/// underscore. Idempotent.
pub fn sanitize_column_name(name: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new("[^A-Za-z0-9]+").unwrap());
    re.replace_all(name, "_").into_owned()
}

/// Enrich one decompressed data file into a table ready for assembly.
pub fn enrich_file(
    path: &Path,
    catalog: &mut LookupCatalog,
    keep_post_only: bool,
) -> Result<(Table, FileStats), FeedError> {
    let label = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("data file")
        .to_string();

    let headers = catalog.column_headers()?.to_vec();
    let mut table = Table::new(headers);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .map_err(|e| FeedError::Enrichment(format!("'{}': {}", label, e)))?;

    for (i, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| FeedError::Enrichment(format!("'{}' row {}: {}", label, i + 1, e)))?;
        if record.len() != table.column_count() {
            return Err(FeedError::Enrichment(format!(
                "'{}' row {}: {} fields do not match {} column headers",
                label,
                i + 1,
                record.len(),
                table.column_count()
            )));
        }
        table.push_row(record.iter().map(|f| f.to_string()).collect())?;
    }
    info!(
        "Imported '{}' with {} rows and {} columns",
        label,
        table.row_count(),
        table.column_count()
    );

    let mut stats = FileStats::default();

    if keep_post_only {
        stats.evar_dropped = table.drop_columns_with_prefix("evar");
        info!("Removed {} evar columns", stats.evar_dropped);
        stats.prop_dropped = table.drop_columns_with_prefix("prop");
        info!("Removed {} prop columns", stats.prop_dropped);
    }

    for (file, column) in DIMENSION_COLUMNS {
        let idx = table.require_column(column)?;
        let dim = catalog.table(file)?;
        table.map_column(idx, |v| dim.translate(v).to_string());
        debug!("Mapped values for column '{}'", column);
    }

    let visid_idx = table.require_column("visid_type")?;
    table.add_column("visid_type_map", |row| {
        let code = &row[visid_idx];
        match visitor_id_label(code) {
            Some(label) => label.to_string(),
            None => code.clone(),
        }
    });
    debug!("Created visid_type_map column");

    let exclude_idx = table.require_column("exclude_hit")?;
    let source_idx = table.require_column("hit_source")?;
    let high_idx = table.require_column("post_visid_high")?;
    let low_idx = table.require_column("post_visid_low")?;
    let visit_idx = table.require_column("visit_num")?;
    let start_idx = table.require_column("visit_start_time_gmt")?;

    table.add_column("Session_ID", |row| {
        if is_excluded(&row[exclude_idx], &row[source_idx]) {
            NOT_SET.to_string()
        } else {
            session_id(&row[high_idx], &row[low_idx], &row[visit_idx], &row[start_idx])
        }
    });
    table.add_column("User_ID", |row| {
        if is_excluded(&row[exclude_idx], &row[source_idx]) {
            NOT_SET.to_string()
        } else {
            user_id(&row[high_idx], &row[low_idx])
        }
    });

    let session_col = table.require_column("Session_ID")?;
    let user_col = table.require_column("User_ID")?;
    stats.unique_sessions = table.distinct_count(session_col);
    stats.unique_users = table.distinct_count(user_col);
    info!("Unique Visitors = {}", stats.unique_users);
    info!("Visits = {}", stats.unique_sessions);

    table.rename_columns(|name| sanitize_column_name(name));
    stats.rows = table.row_count();
    stats.columns = table.column_count();

    Ok((table, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // Schema for the test feed: 14 dimension columns, the identity inputs,
    // one evar, one prop, and one header that needs sanitizing.
    const TEST_COLUMNS: [&str; 24] = [
        "browser",
        "color",
        "connection_type",
        "country",
        "javascript",
        "language",
        "os",
        "plugins",
        "first_hit_ref_type",
        "ref_type",
        "visit_ref_type",
        "resolution",
        "search_engine",
        "post_search_engine",
        "visid_type",
        "exclude_hit",
        "hit_source",
        "post_visid_high",
        "post_visid_low",
        "visit_num",
        "visit_start_time_gmt",
        "evar1",
        "prop1",
        "Visit Number (raw)",
    ];

    fn write_lookup_dir(dir: &Path) {
        fs::write(dir.join("column_headers.tsv"), TEST_COLUMNS.join("\t")).unwrap();
        fs::write(dir.join("browser.tsv"), "70\tFirefox\n").unwrap();
        fs::write(dir.join("color_depth.tsv"), "32\t32-bit\n").unwrap();
        fs::write(dir.join("connection_type.tsv"), "0\tLAN\n").unwrap();
        fs::write(dir.join("country.tsv"), "1\tUnited States\n").unwrap();
        fs::write(dir.join("javascript_version.tsv"), "9\t1.8\n").unwrap();
        fs::write(dir.join("languages.tsv"), "2\tEnglish\n").unwrap();
        fs::write(dir.join("operating_systems.tsv"), "3\tLinux\n").unwrap();
        fs::write(dir.join("plugins.tsv"), "4\tFlash\n").unwrap();
        fs::write(
            dir.join("referrer_type.tsv"),
            "1\tInside\tInside Your Site\n2\tOther\tOther Web Sites\n",
        )
        .unwrap();
        fs::write(dir.join("resolution.tsv"), "6\t1920x1080\n").unwrap();
        fs::write(dir.join("search_engines.tsv"), "5\tGoogle\n").unwrap();
    }

    fn data_row(
        visid: &str,
        exclude: &str,
        source: &str,
        high: &str,
        low: &str,
        visit: &str,
        start: &str,
    ) -> String {
        let mut fields = vec![
            "70", "32", "0", "1", "9", "2", "3", "4", "1", "2", "1", "6", "5", "5",
        ];
        fields.extend([visid, exclude, source, high, low, visit, start, "ev", "pr", "7"]);
        fields.join("\t")
    }

    fn setup(rows: &[String]) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        write_lookup_dir(dir.path());
        let data = dir.path().join("01-suite_2024-05-01.tsv");
        fs::write(&data, rows.join("\n")).unwrap();
        (dir, data)
    }

    #[test]
    fn test_enrich_full_pass() {
        let rows = vec![
            data_row("3", "0", "1", "AAA", "111", "2", "1000"),
            data_row("5", "0", "7", "BBB", "222", "1", "2000"),
        ];
        let (dir, data) = setup(&rows);
        let mut catalog = LookupCatalog::open(dir.path());

        let (table, stats) = enrich_file(&data, &mut catalog, true).unwrap();

        // evar1/prop1 dropped, three derived columns appended, dirty header
        // sanitized
        assert_eq!(stats.evar_dropped, 1);
        assert_eq!(stats.prop_dropped, 1);
        assert!(table.column_index("evar1").is_none());
        assert!(table.column_index("prop1").is_none());
        assert!(table.column_index("Visit_Number_raw_").is_some());
        assert_eq!(table.column_count(), 24 - 2 + 3);

        // Dimension translations
        let browser = table.column_index("browser").unwrap();
        assert_eq!(table.value(0, browser), Some("Firefox"));
        let first_ref = table.column_index("first_hit_ref_type").unwrap();
        assert_eq!(table.value(0, first_ref), Some("Inside Your Site"));
        let ref_type = table.column_index("ref_type").unwrap();
        assert_eq!(table.value(0, ref_type), Some("Other Web Sites"));
        let organic = table.column_index("search_engine").unwrap();
        let paid = table.column_index("post_search_engine").unwrap();
        assert_eq!(table.value(0, organic), Some("Google"));
        assert_eq!(table.value(0, paid), Some("Google"));

        // visid_type itself is untouched; the label lands in a new column
        let visid = table.column_index("visid_type").unwrap();
        let visid_map = table.column_index("visid_type_map").unwrap();
        assert_eq!(table.value(0, visid), Some("3"));
        assert_eq!(table.value(0, visid_map), Some("Adobe"));
        assert_eq!(table.value(1, visid_map), Some("Visitor ID Service"));

        // Identities: row 0 passes the predicate, row 1 is excluded by
        // hit_source=7
        let session = table.column_index("Session_ID").unwrap();
        let user = table.column_index("User_ID").unwrap();
        assert_eq!(table.value(0, session), Some("AAA11121000"));
        assert_eq!(table.value(0, user), Some("AAA111"));
        assert_eq!(table.value(1, session), Some(NOT_SET));
        assert_eq!(table.value(1, user), Some(NOT_SET));

        assert_eq!(stats.rows, 2);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.unique_sessions, 2);
    }

    #[test]
    fn test_enrich_keeps_pre_processing_columns_when_configured() {
        let rows = vec![data_row("3", "0", "1", "AAA", "111", "2", "1000")];
        let (dir, data) = setup(&rows);
        let mut catalog = LookupCatalog::open(dir.path());

        let (table, stats) = enrich_file(&data, &mut catalog, false).unwrap();
        assert_eq!(stats.evar_dropped, 0);
        assert_eq!(stats.prop_dropped, 0);
        assert!(table.column_index("evar1").is_some());
        assert!(table.column_index("prop1").is_some());
    }

    #[test]
    fn test_enrich_unknown_codes_pass_through() {
        let mut row = data_row("42", "0", "1", "AAA", "111", "2", "1000");
        row = row.replacen("70", "9999", 1);
        let (dir, data) = setup(&[row]);
        let mut catalog = LookupCatalog::open(dir.path());

        let (table, _) = enrich_file(&data, &mut catalog, true).unwrap();
        let browser = table.column_index("browser").unwrap();
        assert_eq!(table.value(0, browser), Some("9999"));
        let visid_map = table.column_index("visid_type_map").unwrap();
        assert_eq!(table.value(0, visid_map), Some("42"));
    }

    #[test]
    fn test_enrich_rejects_width_mismatch() {
        let rows = vec![
            data_row("3", "0", "1", "AAA", "111", "2", "1000"),
            "too\tfew\tfields".to_string(),
        ];
        let (dir, data) = setup(&rows);
        let mut catalog = LookupCatalog::open(dir.path());

        let err = enrich_file(&data, &mut catalog, true).unwrap_err();
        assert!(matches!(err, FeedError::Enrichment(_)));
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_enrich_requires_identity_columns() {
        let dir = TempDir::new().unwrap();
        write_lookup_dir(dir.path());
        // Schema missing visid_type and the identity inputs
        let headers: Vec<&str> = TEST_COLUMNS[..14].to_vec();
        fs::write(dir.path().join("column_headers.tsv"), headers.join("\t")).unwrap();
        let data = dir.path().join("01-suite_2024-05-01.tsv");
        fs::write(
            &data,
            "70\t32\t0\t1\t9\t2\t3\t4\t1\t2\t1\t6\t5\t5\n",
        )
        .unwrap();

        let mut catalog = LookupCatalog::open(dir.path());
        let err = enrich_file(&data, &mut catalog, true).unwrap_err();
        assert!(matches!(err, FeedError::Enrichment(_)));
        assert!(err.to_string().contains("visid_type"));
    }

    #[test]
    fn test_enrich_empty_file() {
        let (dir, data) = setup(&[]);
        let mut catalog = LookupCatalog::open(dir.path());

        let (table, stats) = enrich_file(&data, &mut catalog, true).unwrap();
        assert_eq!(stats.rows, 0);
        assert_eq!(stats.unique_users, 0);
        assert!(table.column_index("Session_ID").is_some());
    }

    // ========================================================================
    // Pure helpers
    // ========================================================================

    #[test]
    fn test_exclusion_predicate() {
        assert!(!is_excluded("0", "1"));
        assert!(!is_excluded("0", "3"));
        assert!(is_excluded("1", "1"));
        assert!(is_excluded("2", "1"));
        assert!(is_excluded("0", "5"));
        assert!(is_excluded("0", "7"));
        assert!(is_excluded("0", "8"));
        assert!(is_excluded("0", "9"));
        // Total over junk input
        assert!(!is_excluded("", ""));
        assert!(!is_excluded("abc", "4"));
        assert!(is_excluded(" 1 ", "1"));
        assert!(is_excluded("0", " 7 "));
        assert!(!is_excluded("-1", "1"));
    }

    #[test]
    fn test_identifier_derivation() {
        assert_eq!(session_id("AAA", "111", "2", "1000"), "AAA11121000");
        assert_eq!(user_id("AAA", "111"), "AAA111");
        // Deterministic
        assert_eq!(
            session_id("AAA", "111", "2", "1000"),
            session_id("AAA", "111", "2", "1000")
        );
    }

    #[test]
    fn test_visitor_id_labels() {
        assert_eq!(visitor_id_label("0"), Some("Custom Visitor ID"));
        assert_eq!(visitor_id_label("1"), Some("IP & UA Fallback"));
        assert_eq!(visitor_id_label("2"), Some("Wireless"));
        assert_eq!(visitor_id_label("3"), Some("Adobe"));
        assert_eq!(visitor_id_label("4"), Some("Fallback Cookie"));
        assert_eq!(visitor_id_label("5"), Some("Visitor ID Service"));
        assert_eq!(visitor_id_label("6"), None);
        assert_eq!(visitor_id_label("abc"), None);
        assert_eq!(visitor_id_label(""), None);
    }

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(sanitize_column_name("Visit Number (raw)"), "Visit_Number_raw_");
        assert_eq!(sanitize_column_name("post_visid_high"), "post_visid_high");
        assert_eq!(sanitize_column_name("a  b--c"), "a_b_c");
        // Idempotent
        let once = sanitize_column_name("Visit Number (raw)");
        assert_eq!(sanitize_column_name(&once), once);
    }
}
