use tracing::debug;

use super::{Scanner, ScannerContext};
use crate::dictionary::JobQueue;
use crate::model::FuzzResult;
use crate::requester::FuzzingType;

pub const BACKUP_EXTENSIONS: &[&str] = &[".bak", ".old", ".orig", ".save", ".swp", "~", ".tmp", ".zip"];

// queues backup-file variants of every file found by path fuzzing
pub struct BackupsScanner {
    enabled: bool,
    marks: Vec<String>,
    queue: JobQueue,
}

impl BackupsScanner {
    pub fn new(ctx: &ScannerContext) -> Self {
        Self {
            enabled: ctx.fuzzing_type == FuzzingType::Path,
            marks: ctx.path_marks.clone(),
            queue: JobQueue::new(),
        }
    }
}

impl Scanner for BackupsScanner {
    fn name(&self) -> &'static str {
        "backups"
    }

    fn scan(&self, _result: &FuzzResult) -> bool {
        true
    }

    fn process(&self, result: &FuzzResult) {
        if !self.enabled || result.is_directory() {
            return;
        }
        for mark in self.marks.iter() {
            let Some(payload) = result.payload.get(mark) else {
                continue;
            };
            let value = payload.value();
            if value.is_empty()
                || value.ends_with('/')
                || BACKUP_EXTENSIONS.iter().any(|ext| value.ends_with(ext))
            {
                continue;
            }
            for ext in BACKUP_EXTENSIONS.iter() {
                let derived = payload.derive(format!("{value}{ext}"));
                self.queue
                    .push(result.payload.map_mark(mark, |_| derived.clone()));
            }
            debug!(payload = value, count = BACKUP_EXTENSIONS.len(), "backup candidates queued");
        }
    }

    fn queue(&self) -> Option<&JobQueue> {
        Some(&self.queue)
    }
}
