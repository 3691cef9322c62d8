use std::io::Cursor;
use std::sync::OnceLock;

use polars::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::error::AppError;
use crate::models::table::{Page, PageRequest, Row};

/// Cell texts treated as missing, matching the usual dataframe NA markers.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// An uploaded CSV held as a string-typed frame.
pub struct Table {
    frame: DataFrame,
}

/// Decodes and parses an upload. The first line is the header.
pub fn load_table(content: &[u8]) -> Result<Table, AppError> {
    if content.is_empty() {
        return Err(AppError::EmptyInput("Uploaded file is empty.".into()));
    }

    let text = std::str::from_utf8(content)
        .map_err(|_| AppError::Decode("Unable to decode file as UTF-8 CSV.".into()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(AppError::EmptyInput("CSV file is empty.".into()));
    }
    let text = without_blank_lines(text);
    if text.lines().nth(1).is_none() {
        return Err(AppError::EmptyInput("CSV file has no data rows.".into()));
    }

    let null_values = NullValues::AllColumns(NA_TOKENS.iter().map(|s| s.to_string()).collect());
    let mut frame = CsvReader::new(Cursor::new(text.as_bytes()))
        .has_header(true)
        .infer_schema(Some(0))
        .with_null_values(Some(null_values))
        .finish()
        .map_err(parse_error)?;
    number_duplicate_headers(&mut frame).map_err(parse_error)?;

    if frame.height() == 0 {
        return Err(AppError::EmptyInput("CSV file has no data rows.".into()));
    }

    debug!(
        "Loaded CSV with {} rows and {} columns",
        frame.height(),
        frame.width()
    );
    Ok(Table { frame })
}

fn parse_error(e: PolarsError) -> AppError {
    AppError::Parse(format!("Failed to parse CSV: {e}"))
}

/// Drops blank lines between records. Lines inside a quoted field are kept.
fn without_blank_lines(text: &str) -> String {
    let mut kept = String::with_capacity(text.len());
    let mut in_quotes = false;
    for line in text.lines() {
        if in_quotes || !line.trim().is_empty() {
            kept.push_str(line);
            kept.push('\n');
        }
        if line.matches('"').count() % 2 == 1 {
            in_quotes = !in_quotes;
        }
    }
    kept
}

fn duplicate_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.*)_duplicated_(\d+)$").expect("static regex"))
}

/// Repeated headers are numbered `a`, `a.1`, `a.2` in order of appearance.
fn number_duplicate_headers(frame: &mut DataFrame) -> PolarsResult<()> {
    let names: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    for name in &names {
        let Some(caps) = duplicate_header().captures(name) else {
            continue;
        };
        let Ok(n) = caps[2].parse::<usize>() else {
            continue;
        };
        let base = &caps[1];
        let numbered = format!("{base}.{}", n + 1);
        if names.iter().any(|c| c == base) && !names.contains(&numbered) {
            frame.rename(name, &numbered)?;
        }
    }
    Ok(())
}

impl Table {
    pub fn total(&self) -> usize {
        self.frame.height()
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Without a request the whole table is a single page.
    pub fn page(&self, request: Option<PageRequest>) -> Result<Page, AppError> {
        let total = self.total();
        let request = request.unwrap_or(PageRequest {
            page: 1,
            per_page: total,
        });
        let (start, end) = request.bounds(total);

        Ok(Page {
            total,
            page: request.page,
            per_page: request.per_page,
            columns: self.columns(),
            data: self.rows(start, end)?,
        })
    }

    fn rows(&self, start: usize, end: usize) -> Result<Vec<Row>, AppError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let slice = self.frame.slice(start as i64, end - start);
        let columns = self.columns();
        let values: Vec<Vec<Option<&str>>> = slice
            .get_columns()
            .iter()
            .map(|series| series.str().map(|ca| ca.into_iter().collect()))
            .collect::<PolarsResult<_>>()
            .map_err(parse_error)?;

        Ok((0..slice.height())
            .map(|i| Row {
                cells: columns
                    .iter()
                    .zip(&values)
                    .map(|(name, column)| (name.clone(), column[i].map(str::to_string)))
                    .collect(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_csv(table: &Table) -> String {
        let mut frame = table.frame.clone();
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut frame)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn paginates_the_documented_example() {
        let table = load_table(b"a,b\n1,2\n3,\n").unwrap();
        let page = table
            .page(PageRequest::from_params(Some("1"), Some("1")).unwrap())
            .unwrap();
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "total": 2,
                "page": 1,
                "per_page": 1,
                "columns": ["a", "b"],
                "data": [{"a": "1", "b": "2"}],
            })
        );
    }

    #[test]
    fn full_table_without_params() {
        let table = load_table(b"a,b\n1,2\n3,\n").unwrap();
        let page = table.page(None).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 2);
        assert_eq!(
            serde_json::to_value(&page.data).unwrap(),
            json!([{"a": "1", "b": "2"}, {"a": "3", "b": null}])
        );
    }

    #[test]
    fn strips_bom_and_normalizes_na_tokens() {
        let table = load_table("\u{feff}sym,pnl\nAAPL,NaN\nMSFT,N/A\nTSLA,12.5\n".as_bytes()).unwrap();
        assert_eq!(table.columns(), vec!["sym", "pnl"]);
        let page = table.page(None).unwrap();
        let pnl: Vec<Option<String>> = page.data.iter().map(|r| r.cells[1].1.clone()).collect();
        assert_eq!(pnl, vec![None, None, Some("12.5".to_string())]);
    }

    #[test]
    fn rejects_empty_and_undecodable_input() {
        assert!(matches!(load_table(b""), Err(AppError::EmptyInput(_))));
        assert!(matches!(load_table(b"  \n\n"), Err(AppError::EmptyInput(_))));
        assert!(matches!(load_table(b"a,b\n"), Err(AppError::EmptyInput(_))));
        assert!(matches!(
            load_table(&[0x61, 0x2c, 0xff, 0xfe, 0x0a]),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn blank_lines_between_rows_are_skipped() {
        let table = load_table(b"a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(table.total(), 2);
        assert_eq!(
            serde_json::to_value(&table.page(None).unwrap().data).unwrap(),
            json!([{"a": "1", "b": "2"}, {"a": "3", "b": "4"}])
        );
        assert!(matches!(load_table(b"a,b\n\n  \n"), Err(AppError::EmptyInput(_))));
    }

    #[test]
    fn blank_lines_inside_quotes_are_kept() {
        let table = load_table(b"note,qty\n\"line one\n\nline three\",5\n").unwrap();
        assert_eq!(table.total(), 1);
        let page = table.page(None).unwrap();
        assert_eq!(
            page.data[0].cells[0].1.as_deref(),
            Some("line one\n\nline three")
        );
    }

    #[test]
    fn ragged_rows_are_parse_errors() {
        let err = load_table(b"a,b\n1,2,3\n").err().unwrap();
        assert!(matches!(err, AppError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse CSV:"));
    }

    #[test]
    fn duplicate_headers_are_numbered() {
        let table = load_table(b"a,b,a,a\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns(), vec!["a", "b", "a.1", "a.2"]);
        let page = table.page(None).unwrap();
        assert_eq!(
            serde_json::to_value(&page.data).unwrap(),
            json!([{"a": "1", "b": "2", "a.1": "3", "a.2": "4"}])
        );
    }

    #[test]
    fn pages_partition_the_table() {
        let mut csv = String::from("id,value\n");
        for i in 0..17 {
            csv.push_str(&format!("{i},{}\n", i * 10));
        }
        let table = load_table(csv.as_bytes()).unwrap();
        let per_page = 4;
        let mut ids = Vec::new();
        for page in 1..=5 {
            let page = table.page(Some(PageRequest { page, per_page })).unwrap();
            assert!(page.data.len() <= per_page);
            ids.extend(page.data.iter().map(|r| r.cells[0].1.clone().unwrap()));
        }
        let expected: Vec<String> = (0..17).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);

        let beyond = table.page(Some(PageRequest { page: 6, per_page })).unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total, 17);
    }

    #[test]
    fn csv_round_trip_keeps_columns_and_values() {
        let table = load_table(b"date,side,qty\n2024-01-02,buy,10\n2024-01-03,,5\n").unwrap();
        let reloaded = load_table(to_csv(&table).as_bytes()).unwrap();
        assert_eq!(reloaded.columns(), table.columns());
        assert_eq!(reloaded.page(None).unwrap().data, table.page(None).unwrap().data);
    }
}
