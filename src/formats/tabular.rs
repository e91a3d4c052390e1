use super::{Artifact, FormatHandler, HandlerOptions, lowercase_name};
use crate::table::Table;
use anyhow::{Context, Result, bail};
use serde_json::{Number, Value};
use std::fs;
use std::path::Path;

// Cells treated as missing when decoding.
const NULL_TOKENS: &[&str] = &["", "n/a", "NA", "NaN", "nan"];

/// Tab-separated tables (`participants.tsv`, `*_events.tsv`).
pub struct TsvHandler;

/// Comma-separated tables.
pub struct CsvHandler;

impl FormatHandler for TsvHandler {
    fn name(&self) -> &'static str {
        "tsv"
    }

    fn can_load(&self, path: &Path) -> bool {
        has_suffix(path, ".tsv")
    }

    fn can_save(&self, path: &Path) -> bool {
        has_suffix(path, ".tsv")
    }

    fn load(&self, path: &Path, options: &HandlerOptions) -> Result<Artifact> {
        read_delimited(path, delimiter(options, '\t')?)
    }

    fn save(&self, artifact: &Artifact, path: &Path, options: &HandlerOptions) -> Result<()> {
        write_delimited(artifact, path, delimiter(options, '\t')?, "n/a")
    }
}

impl FormatHandler for CsvHandler {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn can_load(&self, path: &Path) -> bool {
        has_suffix(path, ".csv")
    }

    fn can_save(&self, path: &Path) -> bool {
        has_suffix(path, ".csv")
    }

    fn load(&self, path: &Path, options: &HandlerOptions) -> Result<Artifact> {
        read_delimited(path, delimiter(options, ',')?)
    }

    fn save(&self, artifact: &Artifact, path: &Path, options: &HandlerOptions) -> Result<()> {
        write_delimited(artifact, path, delimiter(options, ',')?, "")
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    lowercase_name(path).is_some_and(|name| name.ends_with(suffix))
}

fn delimiter(options: &HandlerOptions, default: char) -> Result<char> {
    match options.get("delimiter") {
        None => Ok(default),
        Some(Value::String(raw)) => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => bail!("delimiter option must be a single character, got {raw:?}"),
            }
        }
        Some(other) => bail!("delimiter option must be a string, got {other}"),
    }
}

fn read_delimited(path: &Path, delimiter: char) -> Result<Artifact> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut records = split_records(&contents, delimiter).into_iter();
    let Some((_, header)) = records.next() else {
        bail!("{} has no header row", path.display());
    };
    let mut table = Table::with_columns(header.iter().cloned());

    for (line, fields) in records {
        if fields.len() != header.len() {
            bail!(
                "{} line {}: expected {} fields, found {}",
                path.display(),
                line,
                header.len(),
                fields.len()
            );
        }
        table.push_row(
            header
                .iter()
                .cloned()
                .zip(fields.iter().map(|field| parse_cell(field))),
        );
    }
    Ok(Artifact::Table(table))
}

fn write_delimited(artifact: &Artifact, path: &Path, delimiter: char, null: &str) -> Result<()> {
    let Some(table) = artifact.as_table() else {
        bail!("only tables can be written to {}", path.display());
    };
    let sep = delimiter.to_string();
    let mut out = String::new();
    let header: Vec<String> = table
        .columns()
        .iter()
        .map(|column| quote_field(column, delimiter))
        .collect();
    out.push_str(&header.join(&sep));
    out.push('\n');
    for row in table.rows() {
        let fields: Vec<String> = table
            .columns()
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => null.to_string(),
                Some(Value::String(text)) => quote_field(text, delimiter),
                Some(other) => quote_field(&other.to_string(), delimiter),
            })
            .collect();
        out.push_str(&fields.join(&sep));
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

/// Split delimited text into records, each tagged with the line it starts on.
/// Quoted fields may contain the delimiter, doubled quotes, and newlines.
/// Blank lines between records are skipped.
fn split_records(contents: &str, delimiter: char) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut start = 1;
    let mut chars = contents.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if in_quotes => {
                current.push('\n');
                line += 1;
            }
            '\n' => {
                end_record(&mut records, &mut fields, &mut current, quoted, start);
                quoted = false;
                line += 1;
                start = line;
            }
            c if c == delimiter && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    end_record(&mut records, &mut fields, &mut current, quoted, start);
    records
}

fn end_record(
    records: &mut Vec<(usize, Vec<String>)>,
    fields: &mut Vec<String>,
    current: &mut String,
    quoted: bool,
    start: usize,
) {
    let blank = fields.is_empty() && !quoted && current.trim().is_empty();
    fields.push(std::mem::take(current));
    let fields = std::mem::take(fields);
    if !blank {
        records.push((start, fields));
    }
}

fn quote_field(text: &str, delimiter: char) -> String {
    if text.contains(delimiter) || text.contains(['"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if NULL_TOKENS.contains(&trimmed) {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(trimmed.to_string())
}
