use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::ConfigurationError;
use crate::model::{JobUnit, Payload};
use crate::payloader::Payloader;

// a FIFO shared between workers; a pop hands each unit to exactly one caller
#[derive(Debug, Default)]
pub struct JobQueue {
    inner: Mutex<VecDeque<JobUnit>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<JobUnit>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, unit: JobUnit) {
        self.lock().push_back(unit);
    }

    pub fn extend<I: IntoIterator<Item = JobUnit>>(&self, units: I) {
        self.lock().extend(units);
    }

    pub fn pop(&self) -> Option<JobUnit> {
        self.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<JobUnit> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// the base job units of a run plus the queue the fuzzer drains
#[derive(Debug)]
pub struct Dictionary {
    base: Arc<Vec<JobUnit>>,
    queue: JobQueue,
}

impl Dictionary {
    // expand every wordlist through the payloader; with several marks the
    // per-mark sequences are zipped into multi-payload units
    pub fn build(
        wordlists: &[(String, Vec<String>)],
        payloader: &Payloader,
    ) -> Result<Self, ConfigurationError> {
        let mut per_mark: Vec<Vec<Payload>> = Vec::with_capacity(wordlists.len());
        for (mark, words) in wordlists.iter() {
            let payloads: Vec<Payload> = words
                .iter()
                .flat_map(|word| {
                    payloader
                        .expand(word)
                        .into_iter()
                        .map(move |value| Payload::new(word.as_str(), value, mark.as_str()))
                })
                .collect();
            if payloads.is_empty() {
                return Err(ConfigurationError::EmptyWordlist {
                    source_name: mark.clone(),
                });
            }
            per_mark.push(payloads);
        }

        let units = match per_mark.len() {
            0 => Vec::new(),
            1 => per_mark.remove(0).into_iter().map(JobUnit::single).collect(),
            _ => {
                let shortest = per_mark.iter().map(|p| p.len()).min().unwrap_or(0);
                (0..shortest)
                    .map(|i| JobUnit::new(per_mark.iter().map(|p| p[i].clone()).collect()))
                    .collect()
            }
        };
        debug!(units = units.len(), marks = wordlists.len(), "dictionary built");
        Ok(Self::from_units(units))
    }

    pub fn from_units(units: Vec<JobUnit>) -> Self {
        let queue = JobQueue::new();
        queue.extend(units.iter().cloned());
        Self {
            base: Arc::new(units),
            queue,
        }
    }

    // the full expanded wordlist, kept for reloads and recursion
    pub fn base_units(&self) -> Arc<Vec<JobUnit>> {
        self.base.clone()
    }

    pub fn base_len(&self) -> usize {
        self.base.len()
    }

    // refill with the base units, dropping anything still queued
    pub fn reload(&self) {
        let mut queue = self.queue.lock();
        queue.clear();
        queue.extend(self.base.iter().cloned());
    }

    pub fn fill<I: IntoIterator<Item = JobUnit>>(&self, units: I) {
        self.queue.extend(units);
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    pub fn pop(&self) -> Option<JobUnit> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
