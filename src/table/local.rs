use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DELIMITER: char = ',';
pub const DEFAULT_COLUMNS: usize = 16;
pub const TABLE_FILE_SUFFIX: &str = "_table.csv";

pub fn table_file_name(node_id: &str) -> String {
    format!("{}{}", node_id, TABLE_FILE_SUFFIX)
}

/// Splits a delimited row into fields.
///
/// Delimiters inside double quotes or parentheses do not split, so values like
/// `"Main St, Apt 2"` or `(40.7, -73.9)` stay in one field. A row whose quotes or
/// parentheses never close is split on every delimiter instead.
pub fn split_fields(row: &str) -> Vec<String> {
    match split_nested(row) {
        (fields, true) => fields,
        (_, false) => row.split(DELIMITER).map(str::to_string).collect(),
    }
}

/// Quote and paren aware split. The flag is false when the row ends inside a
/// quoted or parenthesized section.
fn split_nested(row: &str) -> (Vec<String>, bool) {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    let mut previous = None;

    for c in row.chars() {
        match c {
            '"' if previous != Some('\\') => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            DELIMITER if !in_quotes && depth == 0 => {
                fields.push(std::mem::take(&mut current));
                previous = Some(c);
                continue;
            }
            _ => {}
        }
        current.push(c);
        previous = Some(c);
    }
    fields.push(current);
    (fields, !in_quotes && depth == 0)
}

/// Makes a field re-parse as exactly one field once joined into a row.
///
/// Fields that would open a quote or parenthesis spanning the delimiter are wrapped
/// in quotes, with their own quotes escaped.
fn contain(field: String) -> String {
    match split_nested(&field) {
        (parts, true) if parts.len() == 1 => field,
        _ => {
            let escaped = field.replace('"', "\\\"");
            format!("\"{}\"", escaped.trim_end_matches('\\'))
        }
    }
}

/// Pads with empty fields or truncates so the row has exactly `columns` fields.
pub fn normalize(mut fields: Vec<String>, columns: usize) -> Vec<String> {
    fields.resize(columns, String::new());
    fields
}

/// Append-only delimited file holding the rows a node owns.
pub struct LocalTable {
    path: PathBuf,
    columns: usize,
    file: Mutex<File>,
}

impl LocalTable {
    pub fn open(path: impl Into<PathBuf>, columns: usize) -> io::Result<Self> {
        let path = path.into();
        if columns == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "a table needs at least one column",
            ));
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!("Local table {} ({} columns)", path.display(), columns);
        Ok(Self {
            path,
            columns,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalizes `fields` to the declared column count and appends them as one line.
    /// Line breaks inside a field are replaced by spaces.
    pub fn append(&self, fields: Vec<String>) -> io::Result<()> {
        let row: Vec<String> = normalize(fields, self.columns)
            .into_iter()
            .map(|field| contain(field.replace(['\r', '\n'], " ")))
            .collect();
        let mut line = row.join(&DELIMITER.to_string());
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()
    }

    /// Convenience for appending a raw delimited row.
    pub fn append_raw(&self, row: &str) -> io::Result<()> {
        self.append(split_fields(row))
    }
}
