use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::JobUnit;
use crate::requester::ResponseData;

// findings recorded by each scanner, keyed by scanner name
pub type ScannerResults = BTreeMap<String, Vec<String>>;

// everything known about one completed request
#[derive(Clone, Debug, Serialize)]
pub struct FuzzResult {
    pub index: u64,
    pub payload: JobUnit,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub rtt: f64,
    pub request_time: f64,
    pub response_time: f64,
    pub body_size: usize,
    pub word_count: usize,
    pub line_count: usize,
    pub ip: Option<IpAddr>,
    pub location: Option<String>,
    pub scanner_results: ScannerResults,
    #[serde(skip)]
    pub body: String,
}

impl FuzzResult {
    pub fn new(index: u64, payload: JobUnit, response: ResponseData) -> Self {
        let request_time = response.request_time.as_secs_f64();
        let response_time = response.response_time.as_secs_f64();
        Self {
            index,
            payload,
            url: response.url,
            method: response.method,
            status: response.status,
            rtt: request_time + response_time,
            request_time,
            response_time,
            body_size: response.body_size,
            word_count: response.body.split_whitespace().count(),
            line_count: response.body.lines().count(),
            ip: response.ip,
            location: response.location,
            scanner_results: ScannerResults::new(),
            body: response.body,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.url.ends_with('/')
    }
}

// state scoped to one target run, passed explicitly instead of living in a
// process-wide static
#[derive(Debug, Default)]
pub struct RunContext {
    index: AtomicU64,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    // indices start at 1 after every reset
    pub fn next_index(&self) -> u64 {
        self.index.fetch_add(1, Ordering::Relaxed) + 1
    }

    // only called between fuzzer passes, never while workers are active
    pub fn reset_index(&self) {
        self.index.store(0, Ordering::Relaxed);
    }

    pub fn issued(&self) -> u64 {
        self.index.load(Ordering::Relaxed)
    }
}
