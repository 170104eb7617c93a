//! CSV-backed, append-only tabular store.
//!
//! The CSV file is the only durable state of the retrainable predictors.
//! Rows are never rewritten: new observations are appended to the end of the
//! file and every retrain reads the whole file back.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PredictionError, Result};

/// Typed view over one CSV file.
#[derive(Debug, Clone)]
pub struct CsvStore<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R> CsvStore<R>
where
    R: Serialize + DeserializeOwned,
{
    /// Binds the store to `path`. No I/O happens until the first call.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads every row. Rows that do not match the record shape are skipped.
    pub fn load(&self) -> Result<Vec<R>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut rows = Vec::new();
        for (index, row) in reader.deserialize::<R>().enumerate() {
            match row {
                Ok(record) => rows.push(record),
                Err(err) => warn!(
                    path = %self.path.display(),
                    row = index + 1,
                    error = %err,
                    "skipping unreadable row"
                ),
            }
        }
        debug!(path = %self.path.display(), rows = rows.len(), "dataset loaded");
        Ok(rows)
    }

    /// Number of data rows on disk, header excluded.
    pub fn row_count(&self) -> Result<usize> {
        if !self.exists() {
            return Ok(0);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        Ok(reader.byte_records().count())
    }

    /// Appends a single row, writing the header first if the file is new.
    /// Values follow the column order of the existing header.
    pub fn append(&self, record: &R) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let (fields, values) = encode_record(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        let mut rows = Vec::with_capacity(2);
        if len == 0 {
            rows.push(fields);
            rows.push(values);
        } else {
            let header = self.header()?;
            let row = align_to_header(&header, &fields, &values).ok_or_else(|| {
                PredictionError::HeaderMismatch {
                    path: self.path.clone(),
                    expected: fields.iter().map(str::to_string).collect(),
                    found: header.iter().map(str::to_string).collect(),
                }
            })?;
            rows.push(row);
            if !ends_with_newline(&mut file, len)? {
                file.write_all(b"\n")?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), "observation appended");
        Ok(())
    }

    fn header(&self) -> Result<StringRecord> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        Ok(reader.headers()?.clone())
    }

    /// Creates the file with `rows` when it does not exist yet.
    /// Returns `true` if the file was created.
    pub fn ensure_seeded(&self, rows: &[R]) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        for row in rows {
            self.append(row)?;
        }
        info!(path = %self.path.display(), rows = rows.len(), "created initial dataset");
        Ok(true)
    }
}

/// Field names and values of `record` as the csv serializer lays them out.
fn encode_record<R: Serialize>(record: &R) -> Result<(StringRecord, StringRecord)> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.serialize(record)?;
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let fields = reader.headers()?.clone();
    let values = reader.records().next().transpose()?.unwrap_or_default();
    Ok((fields, values))
}

/// Reorders `values` to match `header`, or `None` if the columns differ.
fn align_to_header(
    header: &StringRecord,
    fields: &StringRecord,
    values: &StringRecord,
) -> Option<StringRecord> {
    if header.len() != fields.len() {
        return None;
    }
    header
        .iter()
        .map(|name| {
            fields
                .iter()
                .position(|field| field == name)
                .and_then(|idx| values.get(idx))
        })
        .collect::<Option<Vec<&str>>>()
        .map(StringRecord::from)
}

fn ends_with_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
