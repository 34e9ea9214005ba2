use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::dictionary::Dictionary;
use crate::model::RunContext;
use crate::recursion::RecursionManager;
use crate::scanners::ScannerPipeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobSource {
    Wordlist,
    Recursion,
    Scanner(&'static str),
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSource::Wordlist => f.write_str("wordlist"),
            JobSource::Recursion => f.write_str("recursion"),
            JobSource::Scanner(name) => write!(f, "scanner:{name}"),
        }
    }
}

// one job: the source it came from and how many units it queued
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pub source: JobSource,
    pub units: usize,
}

pub struct JobManager {
    dictionary: Arc<Dictionary>,
    recursion: Option<Arc<RecursionManager>>,
    scanners: Arc<ScannerPipeline>,
    context: Arc<RunContext>,
}

impl JobManager {
    pub fn new(
        dictionary: Arc<Dictionary>,
        recursion: Option<Arc<RecursionManager>>,
        scanners: Arc<ScannerPipeline>,
        context: Arc<RunContext>,
    ) -> Self {
        Self {
            dictionary,
            recursion,
            scanners,
            context,
        }
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.dictionary.is_empty()
            || self
                .recursion
                .as_ref()
                .map(|r| !r.output_queue().is_empty())
                .unwrap_or(false)
            || self.scanners.has_pending()
    }

    // prime the dictionary from the first source with pending units; sources
    // are never mixed within one job
    pub fn get_job(&self) -> Option<Job> {
        self.context.reset_index();

        if !self.dictionary.is_empty() {
            return Some(Job {
                source: JobSource::Wordlist,
                units: self.dictionary.len(),
            });
        }

        if let Some(recursion) = self.recursion.as_ref() {
            let units = recursion.output_queue().drain();
            if !units.is_empty() {
                return Some(self.prime(JobSource::Recursion, units));
            }
        }

        for (name, queue) in self.scanners.queues() {
            let units = queue.drain();
            if !units.is_empty() {
                return Some(self.prime(JobSource::Scanner(name), units));
            }
        }
        None
    }

    fn prime(&self, source: JobSource, units: Vec<crate::model::JobUnit>) -> Job {
        let job = Job {
            source,
            units: units.len(),
        };
        self.dictionary.fill(units);
        debug!(source = %job.source, units = job.units, "job primed");
        job
    }

    // after a fuzzer pass: expand one pending recursion directory, then
    // report whether any work is left
    pub fn check_for_new_jobs(&self) -> bool {
        if let Some(recursion) = self.recursion.as_ref() {
            if recursion.has_pending_directories() {
                recursion.fill_payloads_queue();
            }
        }
        self.has_pending_jobs()
    }
}
