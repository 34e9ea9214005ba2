use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::dictionary::JobQueue;
use crate::error::ConfigurationError;
use crate::model::{FuzzResult, JobUnit, Payload};

// when a matched result counts as a directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DirectoryHeuristic {
    // the response url ends in `/`
    #[default]
    TrailingSlash,
    // also a redirect to the same url with a trailing `/`
    TrailingSlashOrRedirect,
}

impl DirectoryHeuristic {
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "slash" => Ok(Self::TrailingSlash),
            "redirect" => Ok(Self::TrailingSlashOrRedirect),
            other => Err(ConfigurationError::invalid(
                "recursion heuristic",
                other,
                "expected slash or redirect",
            )),
        }
    }

    pub fn is_directory(&self, result: &FuzzResult) -> bool {
        if result.is_directory() {
            return true;
        }
        match self {
            DirectoryHeuristic::TrailingSlash => false,
            DirectoryHeuristic::TrailingSlashOrRedirect => {
                if !matches!(result.status, 301 | 302 | 307 | 308) {
                    return false;
                }
                let Some(location) = result.location.as_deref() else {
                    return false;
                };
                let Some(target) = location.strip_suffix('/') else {
                    return false;
                };
                // absolute or host-relative redirect to `<url>/`
                !target.is_empty() && result.url.ends_with(target)
            }
        }
    }
}

pub struct RecursionManager {
    max_rlevel: usize,
    heuristic: DirectoryHeuristic,
    marks: Vec<String>,
    base: Arc<Vec<JobUnit>>,
    directories: Mutex<VecDeque<Payload>>,
    seen: Mutex<HashSet<String>>,
    output: JobQueue,
}

impl RecursionManager {
    // `marks` are the marks substituted in the url path
    pub fn new(
        max_rlevel: usize,
        heuristic: DirectoryHeuristic,
        marks: Vec<String>,
        base: Arc<Vec<JobUnit>>,
    ) -> Self {
        Self {
            max_rlevel,
            heuristic,
            marks,
            base,
            directories: Mutex::new(VecDeque::new()),
            seen: Mutex::new(HashSet::new()),
            output: JobQueue::new(),
        }
    }

    fn directories(&self) -> MutexGuard<'_, VecDeque<Payload>> {
        self.directories.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn max_rlevel(&self) -> usize {
        self.max_rlevel
    }

    // queue the directory a matched result points at; returns whether one
    // was queued
    pub fn check_for_recursion(&self, result: &FuzzResult) -> bool {
        if result.payload.rlevel() >= self.max_rlevel || !self.heuristic.is_directory(result) {
            return false;
        }
        let Some(payload) = self
            .marks
            .iter()
            .find_map(|mark| result.payload.get(mark))
        else {
            return false;
        };
        let directory = payload.directory();
        let fresh = self
            .seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(directory.value().to_string());
        if !fresh {
            return false;
        }
        debug!(
            directory = directory.value(),
            rlevel = directory.rlevel(),
            "recursion directory queued"
        );
        self.directories().push_back(directory);
        true
    }

    pub fn has_pending_directories(&self) -> bool {
        !self.directories().is_empty()
    }

    // derive the whole base wordlist below the next pending directory
    pub fn fill_payloads_queue(&self) -> usize {
        let Some(directory) = self.directories().pop_front() else {
            return 0;
        };
        self.output
            .extend(self.base.iter().map(|unit| unit.with_recursion(&directory)));
        debug!(
            directory = directory.value(),
            units = self.base.len(),
            "recursion job prepared"
        );
        self.base.len()
    }

    pub fn output_queue(&self) -> &JobQueue {
        &self.output
    }
}
