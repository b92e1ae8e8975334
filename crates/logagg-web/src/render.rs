//! HTML rendering for the index page.

use logagg_core::Record;
use std::fmt::Write;

const HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Log Aggregator</title>
<style>
body { font-family: monospace; margin: 2em; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
th { background: #eee; }
</style>
</head>
<body>
<h1>Logs</h1>
"#;

const TAIL: &str = "</body>\n</html>\n";

/// Render every record as one table row, in store order.
pub fn index_page(records: &[Record]) -> String {
    let mut out = String::with_capacity(HEAD.len() + TAIL.len() + records.len() * 128);
    out.push_str(HEAD);
    let _ = writeln!(out, "<p>{} records</p>", records.len());
    out.push_str("<table>\n<tr><th>Timestamp</th><th>Source</th><th>Level</th><th>Message</th></tr>\n");
    for r in records {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            r.timestamp().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            escape(r.source()),
            escape(r.level()),
            escape(r.message()),
        );
    }
    out.push_str("</table>\n");
    out.push_str(TAIL);
    out
}

/// Minimal HTML text escaping.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
