//! Query result rendering for terminals and scripts.

use crate::engine::QueryResult;
use crate::error::Result;
use metaindex_indexer::FileRecord;
use serde::Serialize;

const COLUMNS: [&str; 7] = ["path", "size", "ext", "lang", "top_level", "mtime_ns", "text_like"];

/// JSON shape of a query result.
#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    count: usize,
    total_matches: usize,
    scope: &'a str,
    limit: usize,
    results: &'a [FileRecord],
}

/// Render as pretty-printed JSON.
pub fn render_json(result: &QueryResult) -> Result<String> {
    let output = JsonOutput {
        count: result.rows.len(),
        total_matches: result.total_matches,
        scope: &result.scope,
        limit: result.limit,
        results: &result.rows,
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Render as an aligned text table with a summary footer.
pub fn render_table(result: &QueryResult) -> String {
    let rows: Vec<[String; 7]> = result.rows.iter().map(cells).collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut output = String::new();
    push_line(&mut output, &COLUMNS.map(str::to_string), &widths);
    let dashes = widths.map(|w| "-".repeat(w));
    push_line(&mut output, &dashes, &widths);
    for row in &rows {
        push_line(&mut output, row, &widths);
    }
    output.push_str(&format!(
        "rows={} scope={} limit={}\n",
        result.rows.len(),
        result.scope,
        result.limit
    ));

    output
}

fn cells(record: &FileRecord) -> [String; 7] {
    [
        record.path.clone(),
        record.size.to_string(),
        record.ext.clone(),
        record.lang.clone(),
        record.top_level.clone(),
        record.mtime_ns.to_string(),
        record.text_like.to_string(),
    ]
}

fn push_line(output: &mut String, cells: &[String; 7], widths: &[usize; 7]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    output.push_str(line.join("  ").trim_end());
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaindex_indexer::Fingerprint;

    fn result() -> QueryResult {
        QueryResult {
            scope: "all".to_string(),
            limit: 1,
            total_matches: 2,
            rows: vec![FileRecord::new("src/main.rs", &Fingerprint(12, 7, 0, 0), true)],
        }
    }

    #[test]
    fn test_render_json() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&result()).unwrap()).unwrap();

        assert_eq!(json["count"], 1);
        assert_eq!(json["total_matches"], 2);
        assert_eq!(json["scope"], "all");
        assert_eq!(json["limit"], 1);
        assert_eq!(json["results"][0]["path"], "src/main.rs");
        assert_eq!(json["results"][0]["lang"], "rust");
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&result());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("path         size  ext  lang"));
        assert!(lines[1].starts_with("-----------  ----"));
        assert!(lines[2].starts_with("src/main.rs  12    .rs  rust"));
        assert!(lines[2].ends_with("true"));
        assert_eq!(lines[3], "rows=1 scope=all limit=1");
    }

    #[test]
    fn test_render_empty_table() {
        let empty = QueryResult {
            rows: Vec::new(),
            total_matches: 0,
            ..result()
        };
        let table = render_table(&empty);
        assert!(table.ends_with("rows=0 scope=all limit=1\n"));
    }
}
