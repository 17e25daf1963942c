use std::path::PathBuf;

use async_trait::async_trait;

use crate::cbf_csv::read_raw_records;
use crate::types::{RawRecord, RecordKind};
use crate::Result;

/// A provider of raw billing records of one declared kind. Implemented here
/// for CSV files; usage-API integrations implement the same seam.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn kind(&self) -> RecordKind;

    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<RawRecord>>;
}

pub struct CsvFileSource {
    path: PathBuf,
    kind: RecordKind,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>, kind: RecordKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[async_trait]
impl RecordSource for CsvFileSource {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let bytes = tokio::fs::read(&self.path).await?;
        read_raw_records(bytes.as_slice())
    }
}
