use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

pub fn write_json<T: Serialize + ?Sized>(value: &T, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize JSON output")?;
    writeln!(out).context("failed to write trailing newline")?;
    Ok(())
}

pub fn write_json_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("failed to serialize JSON output")?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Tab-separated rows; the first row is the header.
pub fn write_tsv(rows: &[Vec<String>], out: &mut dyn Write) -> std::io::Result<()> {
    for row in rows {
        let fields: Vec<String> = row.iter().map(|field| normalize_field(field)).collect();
        writeln!(out, "{}", fields.join("\t"))?;
    }
    Ok(())
}

pub fn normalize_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_rows_keep_one_line_per_record() {
        let mut out = Vec::new();
        let rows = vec![
            vec!["path".to_owned(), "count".to_owned()],
            vec!["/blog\tpost\n".to_owned(), "3".to_owned()],
        ];

        write_tsv(&rows, &mut out).expect("write tsv");
        let rendered = String::from_utf8(out).expect("utf8 output");

        assert_eq!(rendered, "path\tcount\n/blog post \t3\n");
    }
}
