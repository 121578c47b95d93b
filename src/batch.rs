//! Batch Orchestrator: runs a queue of files through one session, one at a
//! time, and packages every success into a single archive.

use crate::capture::CapturedView;
use crate::error::{Result, SnapshotError};
use crate::host::{SelectionItem, SelectionWidget, Severity};
use crate::package;
use crate::session::{ProcessOptions, SnapshotSession};
use std::collections::{HashMap, HashSet};

const READ_FAILED: &str = "cannot read file, please reselect";
const NO_VIEWS: &str = "no views generated";
const PROCESSING_FALLBACK: &str = "processing failed, please check the file format";
const PARTIAL_FAILURE: &str = "some files failed and were skipped";
const ALL_SUCCEEDED: &str = "batch generation complete, zip download started";
const PACKAGING_FAILED: &str = "batch archive could not be created";
const ALL_FAILED: &str = "batch generation failed, please check that the files are valid";

/// Processing state of a queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Success,
    Error,
}

/// A queued file and the outcome of its last run.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub source: SelectionItem,
    pub status: BatchStatus,
    pub message: String,
}

impl BatchItem {
    fn pending(source: SelectionItem) -> Self {
        Self {
            source,
            status: BatchStatus::Pending,
            message: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    fn finish(&mut self, status: BatchStatus, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
    }
}

/// Outcome of one [`BatchQueue::generate`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Name of the delivered archive, when any file succeeded.
    pub archive: Option<String>,
}

/// Ordered, de-duplicated queue of files awaiting processing.
#[derive(Debug, Default)]
pub struct BatchQueue {
    items: Vec<BatchItem>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the queue with `selection`, keeping the first entry per key.
    /// Previous results are discarded.
    pub fn handle_change(&mut self, selection: &[SelectionItem]) {
        self.items = dedup(selection).into_iter().map(BatchItem::pending).collect();
    }

    /// Replace the queue with what is left of the selection after a removal.
    /// Remaining entries keep their last result.
    pub fn handle_remove(&mut self, remaining: &[SelectionItem]) {
        let mut previous: HashMap<String, BatchItem> = self
            .items
            .drain(..)
            .map(|item| (item.source.key().to_string(), item))
            .collect();
        self.items = dedup(remaining)
            .into_iter()
            .map(|source| match previous.remove(source.key()) {
                Some(item) => BatchItem { source, ..item },
                None => BatchItem::pending(source),
            })
            .collect();
    }

    /// Empty the queue and reset the widget's own state.
    pub fn clear(&mut self, widget: &mut dyn SelectionWidget) {
        self.items.clear();
        widget.clear_files();
    }

    /// Process every queued file in order, then deliver one archive holding
    /// the views of each file that succeeded.
    ///
    /// A failing file is recorded and skipped. Only packaging and delivery
    /// errors are returned.
    pub async fn generate(&mut self, session: &mut SnapshotSession) -> Result<BatchReport> {
        if self.items.is_empty() {
            return Ok(BatchReport::default());
        }

        let options = ProcessOptions {
            silent: true,
            preserve_materials: true,
        };
        let mut successes: Vec<(String, Vec<CapturedView>)> = Vec::new();

        for item in &mut self.items {
            item.finish(BatchStatus::Pending, "");
            match session.process_file(&item.source.file, options).await {
                Ok(views) if views.is_empty() => item.finish(BatchStatus::Error, NO_VIEWS),
                Ok(views) => {
                    item.finish(BatchStatus::Success, format!("generated {} views", views.len()));
                    successes.push((item.source.name.clone(), views));
                }
                Err(e) => {
                    tracing::warn!("Batch item {} failed: {}", item.name(), e);
                    item.finish(BatchStatus::Error, failure_message(&e));
                }
            }
        }

        let succeeded = successes.len();
        let failed = self.items.len() - succeeded;
        if successes.is_empty() {
            session.notify(Severity::Warning, ALL_FAILED);
            return Ok(BatchReport {
                succeeded,
                failed,
                archive: None,
            });
        }

        let archive = match package::batch_archive(&successes)
            .and_then(|download| {
                let name = download.file_name.clone();
                session.deliver(download).map(|()| name)
            }) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Batch archive was not delivered: {}", e);
                session.notify(Severity::Error, PACKAGING_FAILED);
                return Err(e);
            }
        };
        tracing::info!("Batch finished: {} succeeded, {} failed, archive {}", succeeded, failed, archive);

        if failed > 0 {
            session.notify(Severity::Warning, PARTIAL_FAILURE);
        } else {
            session.notify(Severity::Success, ALL_SUCCEEDED);
        }
        Ok(BatchReport {
            succeeded,
            failed,
            archive: Some(archive),
        })
    }
}

fn dedup(selection: &[SelectionItem]) -> Vec<SelectionItem> {
    let mut seen = HashSet::new();
    selection
        .iter()
        .filter(|item| seen.insert(item.key().to_string()))
        .cloned()
        .collect()
}

fn failure_message(error: &SnapshotError) -> String {
    match error {
        SnapshotError::Read(_) => READ_FAILED.to_string(),
        SnapshotError::Decode(m) | SnapshotError::UnsupportedFormat(m) | SnapshotError::Capture(m)
            if m.trim().is_empty() =>
        {
            PROCESSING_FALLBACK.to_string()
        }
        other => other.to_string(),
    }
}
