//! JSONL storage for tasks and blueprints
//!
//! Records are stored one JSON object per line, in arena order.
//! Uses file locking for concurrent access safety.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{Blueprint, TaskRecord};

/// Store for one kind of record in JSONL format
pub struct JsonlStore<T> {
    path: PathBuf,
    kind: &'static str,
    _record: PhantomData<T>,
}

pub type TaskStore = JsonlStore<TaskRecord>;
pub type BlueprintStore = JsonlStore<Blueprint>;

impl TaskStore {
    /// Creates the default task store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".todo").join("tasks.jsonl"), "task")
    }
}

impl BlueprintStore {
    /// Creates the default blueprint store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".todo").join("blueprints.jsonl"), "blueprint")
    }
}

impl<T> JsonlStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a new store at the given path
    pub fn new(path: impl Into<PathBuf>, kind: &'static str) -> Self {
        Self {
            path: path.into(),
            kind,
            _record: PhantomData,
        }
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records in file order
    pub fn read_all(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {} store: {}", self.kind, self.path.display()))?;

        file.lock_shared()
            .with_context(|| format!("Failed to acquire read lock on {} store", self.kind))?;

        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: T = serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse {} at line {}", self.kind, line_num + 1)
            })?;
            records.push(record);
        }

        // Lock is released when file is dropped
        Ok(records)
    }

    /// Writes all records to the store (full rewrite)
    pub fn write_all(&self, records: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire write lock on {} store", self.kind))?;

            let mut writer = BufWriter::new(&file);
            for record in records {
                let line = serde_json::to_string(record)
                    .with_context(|| format!("Failed to serialize {}", self.kind))?;
                writeln!(writer, "{}", line)
                    .with_context(|| format!("Failed to write {}", self.kind))?;
            }

            writer
                .flush()
                .with_context(|| format!("Failed to flush {} store", self.kind))?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}
