use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::util::read_lines;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorpusError {
    #[error("parallel corpus needs at least one column")]
    Empty,
    #[error(
        "line count mismatch: {expected_name} has {expected} lines but {found_name} has {found}"
    )]
    LengthMismatch {
        expected_name: String,
        expected: usize,
        found_name: String,
        found: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub path: Option<PathBuf>,
    pub lines: Vec<String>,
}

/// Line-aligned text columns (source, reference, predictions) that are
/// always resampled together.
#[derive(Debug, Clone)]
pub struct ParallelCorpus {
    columns: Vec<Column>,
}

impl ParallelCorpus {
    pub fn new(columns: Vec<Column>) -> Result<Self, CorpusError> {
        let first = columns.first().ok_or(CorpusError::Empty)?;
        for column in &columns[1..] {
            if column.lines.len() != first.lines.len() {
                return Err(CorpusError::LengthMismatch {
                    expected_name: first.name.clone(),
                    expected: first.lines.len(),
                    found_name: column.name.clone(),
                    found: column.lines.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn load(files: &[(&str, &Path)]) -> Result<Self> {
        let mut columns = Vec::with_capacity(files.len());
        for (name, path) in files {
            let lines = read_lines(path)?;
            info!(column = %name, path = %path.display(), lines = lines.len(), "loaded corpus column");
            columns.push(Column {
                name: (*name).to_string(),
                path: Some(path.to_path_buf()),
                lines,
            });
        }
        Ok(Self::new(columns)?)
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |column| column.lines.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Projects every column through `indices`, keeping rows aligned.
    pub fn select(&self, indices: &[usize]) -> Vec<Vec<&str>> {
        self.columns
            .iter()
            .map(|column| {
                indices
                    .iter()
                    .map(|&index| column.lines[index].as_str())
                    .collect()
            })
            .collect()
    }
}
