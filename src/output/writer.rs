//! Dataset writer

use crate::error::{Error, Result};
use crate::manifest::DatasetDef;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes datasets into an output directory
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    dir: PathBuf,
}

impl DatasetWriter {
    /// Create a writer rooted at the output directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File path a dataset name maps to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slugify(name)))
    }

    /// Write one dataset as a pretty-printed JSON array
    pub async fn write(&self, name: &str, records: &[Value]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::output(format!("Failed to create output directory: {e}")))?;

        let path = self.path_for(name);
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| Error::output(format!("Failed to serialize dataset '{name}': {e}")))?;

        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| Error::output(format!("Failed to write dataset '{name}': {e}")))?;

        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

/// Lowercase a dataset name and collapse whitespace runs to underscores
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Collect a dataset's records from the per-request result store.
///
/// A body carrying an array at `results` is spliced in element by element;
/// anything else lands whole.
pub fn collect_dataset(dataset: &DatasetDef, results: &HashMap<String, Vec<Value>>) -> Vec<Value> {
    let mut records = Vec::new();
    for request_name in &dataset.data {
        let Some(bodies) = results.get(request_name) else {
            continue;
        };
        for body in bodies {
            match body.get("results").and_then(Value::as_array) {
                Some(items) => records.extend(items.iter().cloned()),
                None => records.push(body.clone()),
            }
        }
    }
    records
}

/// Write every non-empty dataset; returns each written dataset's name and
/// record count
pub async fn write_datasets(
    dir: impl AsRef<Path>,
    datasets: &[DatasetDef],
    results: &HashMap<String, Vec<Value>>,
) -> Result<Vec<(String, usize)>> {
    let writer = DatasetWriter::new(dir);
    let mut written = Vec::new();

    for dataset in datasets {
        let records = collect_dataset(dataset, results);
        if records.is_empty() {
            debug!("Dataset '{}' is empty, skipping", dataset.name);
            continue;
        }
        writer.write(&dataset.name, &records).await?;
        written.push((dataset.name.clone(), records.len()));
    }

    Ok(written)
}
