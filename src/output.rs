use std::fs;
use std::io::{self, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::app::RunSummary;
use crate::error::SraMetaError;
use crate::extract::{Row, extract_rows};
use crate::package::PackageSet;
use crate::progress::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Tab-separated row writer. The header goes out on construction.
pub struct TsvWriter<W: Write> {
    inner: W,
    rows: usize,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(Row::HEADERS.join("\t").as_bytes())?;
        inner.write_all(b"\n")?;
        Ok(Self { inner, rows: 0 })
    }

    pub fn write_row(&mut self, row: &Row) -> io::Result<()> {
        self.inner.write_all(row.fields().join("\t").as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    /// Writes every package of every set, in the order given.
    pub fn write_package_sets(&mut self, sets: &[PackageSet]) -> io::Result<()> {
        for package in sets.iter().flat_map(|set| &set.packages) {
            for row in extract_rows(package) {
                self.write_row(&row)?;
            }
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// `parsed_metadata.<yy.mm.dd.HH.MM>.tsv` in the working directory.
pub fn default_output_path(now: DateTime<Local>) -> Utf8PathBuf {
    Utf8PathBuf::from(format!(
        "parsed_metadata.{}.tsv",
        now.format("%y.%m.%d.%H.%M")
    ))
}

/// Writes the TSV through a temp file next to `path` and renames it into
/// place, so a failure never leaves a half-written file. Returns the row count.
pub fn write_tsv_file(path: &Utf8Path, sets: &[PackageSet]) -> Result<usize, SraMetaError> {
    let output_err = |message: String| SraMetaError::Output {
        path: path.to_string(),
        message,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(|err| output_err(err.to_string()))?;

    let temp = tempfile::Builder::new()
        .prefix("kira-sra-meta")
        .suffix(".tsv")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| output_err(err.to_string()))?;

    let mut writer =
        TsvWriter::new(BufWriter::new(temp.as_file())).map_err(|err| output_err(err.to_string()))?;
    writer
        .write_package_sets(sets)
        .map_err(|err| output_err(err.to_string()))?;
    let rows = writer.rows();
    writer.finish().map_err(|err| output_err(err.to_string()))?;

    temp.persist(path.as_std_path())
        .map_err(|err| output_err(err.to_string()))?;
    Ok(rows)
}
