//! Document parsing.
//!
//! [`PlainTextParser`] handles text, Markdown (pipe tables become
//! [`Table`]s) and CSV. Richer formats plug in through [`DocumentParser`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported document type: {0}")]
    Unsupported(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Rows rendered as `header: value` pairs, one line per row.
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| match self.headers.get(i) {
                        Some(h) if !h.is_empty() => format!("{h}: {cell}"),
                        _ => cell.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub text: String,
    pub tables: Vec<Table>,
    pub metadata: BTreeMap<String, String>,
}

impl ParsedDocument {
    /// Body text followed by every table in text form.
    pub fn full_text(&self) -> String {
        let mut out = self.text.clone();
        for table in &self.tables {
            let rendered = table.to_text();
            if rendered.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&rendered);
        }
        out
    }
}

pub trait DocumentParser: Send + Sync {
    fn supports(&self, path: &Path) -> bool;

    fn parse(&self, path: &Path) -> Result<ParsedDocument, ParseError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    const EXTENSIONS: [&'static str; 5] = ["txt", "text", "md", "markdown", "csv"];

    fn extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }
}

impl DocumentParser for PlainTextParser {
    fn supports(&self, path: &Path) -> bool {
        Self::extension(path).is_some_and(|e| Self::EXTENSIONS.contains(&e.as_str()))
    }

    fn parse(&self, path: &Path) -> Result<ParsedDocument, ParseError> {
        if !self.supports(path) {
            return Err(ParseError::Unsupported(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = Self::extension(path).unwrap_or_default();
        let (text, tables) = match extension.as_str() {
            "csv" => (String::new(), vec![parse_csv(&raw)]),
            "md" | "markdown" => split_markdown_tables(&raw),
            _ => (raw.clone(), Vec::new()),
        };

        let mut metadata = BTreeMap::new();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".to_string(), name.to_string());
        }
        metadata.insert("format".to_string(), extension);
        metadata.insert("characters".to_string(), raw.chars().count().to_string());
        metadata.insert("tables".to_string(), tables.len().to_string());

        tracing::debug!(path = %path.display(), tables = tables.len(), "Parsed document");
        Ok(ParsedDocument {
            text,
            tables,
            metadata,
        })
    }
}

fn split_row(line: &str, separator: char) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split(separator)
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .collect()
}

fn parse_csv(raw: &str) -> Table {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let headers = lines.next().map(|l| split_row(l, ',')).unwrap_or_default();
    let rows = lines.map(|l| split_row(l, ',')).collect();
    Table { headers, rows }
}

fn is_divider(line: &str) -> bool {
    let inner = line.trim().trim_matches('|');
    !inner.is_empty() && inner.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

fn flush_table(block: &mut Vec<&str>, tables: &mut Vec<Table>) {
    if block.is_empty() {
        return;
    }
    let mut rows = block
        .iter()
        .filter(|l| !is_divider(l))
        .map(|l| split_row(l, '|'));
    let headers = rows.next().unwrap_or_default();
    tables.push(Table {
        headers,
        rows: rows.collect(),
    });
    block.clear();
}

/// Pull `| a | b |` blocks out of Markdown, leaving the prose.
fn split_markdown_tables(raw: &str) -> (String, Vec<Table>) {
    let mut prose = Vec::new();
    let mut tables = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.trim_start().starts_with('|') {
            block.push(line);
        } else {
            flush_table(&mut block, &mut tables);
            prose.push(line);
        }
    }
    flush_table(&mut block, &mut tables);

    (prose.join("\n"), tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.txt");
        fs::write(&path, "LTV must not exceed 80%.").unwrap();

        let doc = PlainTextParser.parse(&path).unwrap();
        assert_eq!(doc.text, "LTV must not exceed 80%.");
        assert!(doc.tables.is_empty());
        assert_eq!(doc.metadata["file_name"], "policy.txt");
    }

    #[test]
    fn test_markdown_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.md");
        fs::write(
            &path,
            "# Application\n\n| Field | Value |\n|---|---|\n| Loan amount | 385000 |\n| Property value | 428000 |\n\nSigned.",
        )
        .unwrap();

        let doc = PlainTextParser.parse(&path).unwrap();
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].headers, vec!["Field", "Value"]);
        assert_eq!(doc.tables[0].rows.len(), 2);
        assert!(doc.text.contains("Signed."));
        assert!(doc.full_text().contains("Field: Loan amount; Value: 385000"));
    }

    #[test]
    fn test_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "field,value\nltv_ratio,90.59\n").unwrap();

        let doc = PlainTextParser.parse(&path).unwrap();
        assert_eq!(doc.tables[0].rows, vec![vec!["ltv_ratio", "90.59"]]);
        assert_eq!(doc.full_text(), "field: ltv_ratio; value: 90.59");
    }

    #[test]
    fn test_unsupported_and_missing() {
        assert!(matches!(
            PlainTextParser.parse(Path::new("scan.pdf")),
            Err(ParseError::Unsupported(_))
        ));
        assert!(matches!(
            PlainTextParser.parse(Path::new("/nonexistent/policy.txt")),
            Err(ParseError::Io { .. })
        ));
    }
}
