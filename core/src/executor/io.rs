//! JSON Lines import and export

use crate::error::JsonLiteResult;
use crate::executor::database::JsonLiteDb;
use crate::executor::options::Duplicates;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Clean one line of a JSON Lines stream. `None` for lines that carry no
/// document: blanks and the brackets of a pretty-printed array.
pub fn clean_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if matches!(line, "" | "[" | "]" | "[]") {
        return None;
    }
    Some(line.trim_end_matches(','))
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl JsonLiteDb {
    /// Import a file. `.json` files are parsed whole (an array becomes one
    /// document per element); anything else is read as JSON Lines.
    pub fn import_jsonl(
        &self,
        path: impl AsRef<Path>,
        duplicates: Duplicates,
    ) -> JsonLiteResult<usize> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let written = if has_json_extension(path) {
            let value: Value = serde_json::from_reader(reader)?;
            self.insert_value(value, duplicates)?
        } else {
            self.import_lines(reader, duplicates)?
        };
        tracing::debug!("Imported {} documents from {}", written, path.display());
        Ok(written)
    }

    /// Insert a parsed JSON value: each element of an array, otherwise the
    /// value itself.
    pub fn insert_value(&self, value: Value, duplicates: Duplicates) -> JsonLiteResult<usize> {
        match value {
            Value::Array(items) => self.insert_many(items, duplicates),
            other => self.insert(&other, duplicates),
        }
    }

    /// Insert every document of a JSON Lines stream in one transaction.
    pub fn import_lines<R: BufRead>(
        &self,
        reader: R,
        duplicates: Duplicates,
    ) -> JsonLiteResult<usize> {
        let mut texts = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Some(text) = clean_line(&line) {
                texts.push(text.to_string());
            }
        }
        self.insert_raw(texts, duplicates)
    }

    /// Write every document, one stored JSON text per line.
    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> JsonLiteResult<usize> {
        let file = File::create(path.as_ref())?;
        let written = self.dump_jsonl(BufWriter::new(file))?;
        tracing::debug!("Exported {} documents to {}", written, path.as_ref().display());
        Ok(written)
    }

    pub fn dump_jsonl<W: Write>(&self, mut writer: W) -> JsonLiteResult<usize> {
        let mut written = 0;
        let mut items = self.items()?;
        for row in items.iter()?.raw() {
            let row = row?;
            writer.write_all(row.data.as_bytes())?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}
