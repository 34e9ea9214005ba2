mod backups;
mod grep;
mod reflected;

use tracing::debug;

use crate::dictionary::JobQueue;
use crate::error::ConfigurationError;
use crate::model::FuzzResult;
use crate::requester::FuzzingType;

pub use backups::{BackupsScanner, BACKUP_EXTENSIONS};
pub use grep::GrepScanner;
pub use reflected::ReflectedScanner;

// what scanners know about the target when they are built
#[derive(Clone, Debug)]
pub struct ScannerContext {
    pub fuzzing_type: FuzzingType,
    // marks substituted inside the url path
    pub path_marks: Vec<String>,
}

pub trait Scanner: Send + Sync {
    fn name(&self) -> &'static str;

    // findings stored under the scanner name in the result
    fn inspect(&self, _result: &FuzzResult) -> Option<Vec<String>> {
        None
    }

    // accept or reject the result
    fn scan(&self, result: &FuzzResult) -> bool;

    // side effects for accepted results
    fn process(&self, _result: &FuzzResult) {}

    // derived job units, when the scanner produces any
    fn queue(&self) -> Option<&JobQueue> {
        None
    }
}

type ScannerCtor = fn(Option<&str>, &ScannerContext) -> Result<Box<dyn Scanner>, ConfigurationError>;

const REGISTRY: &[(&str, ScannerCtor)] = &[
    ("backups", build_backups),
    ("reflected", build_reflected),
    ("grep", build_grep),
];

fn build_backups(
    _: Option<&str>,
    ctx: &ScannerContext,
) -> Result<Box<dyn Scanner>, ConfigurationError> {
    Ok(Box::new(BackupsScanner::new(ctx)))
}

fn build_reflected(
    _: Option<&str>,
    _: &ScannerContext,
) -> Result<Box<dyn Scanner>, ConfigurationError> {
    Ok(Box::new(ReflectedScanner))
}

fn build_grep(
    param: Option<&str>,
    _: &ScannerContext,
) -> Result<Box<dyn Scanner>, ConfigurationError> {
    let pattern = param
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ConfigurationError::MissingParameter {
            kind: "scanner",
            name: "grep".to_string(),
        })?;
    Ok(Box::new(GrepScanner::new(pattern)?))
}

// scanners in registration order
#[derive(Default)]
pub struct ScannerPipeline {
    scanners: Vec<Box<dyn Scanner>>,
}

impl std::fmt::Debug for ScannerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ScannerPipeline {
    pub fn new(scanners: Vec<Box<dyn Scanner>>) -> Self {
        Self { scanners }
    }

    // one `name[=param]` spec per scanner
    pub fn from_specs(specs: &[String], ctx: &ScannerContext) -> Result<Self, ConfigurationError> {
        let mut scanners = Vec::with_capacity(specs.len());
        for spec in specs.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            let (name, param) = match spec.split_once('=') {
                Some((n, p)) => (n.trim(), Some(p)),
                None => (spec, None),
            };
            let key = name.to_ascii_lowercase();
            let ctor = REGISTRY
                .iter()
                .find(|(n, _)| *n == key)
                .map(|(_, ctor)| *ctor)
                .ok_or_else(|| ConfigurationError::UnknownPlugin {
                    kind: "scanner",
                    name: name.to_string(),
                })?;
            scanners.push(ctor(param, ctx)?);
        }
        Ok(Self { scanners })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    // record findings, then accept only when every scanner agrees; the first
    // rejection ends evaluation and skips `process`
    pub fn evaluate(&self, result: &mut FuzzResult) -> bool {
        for scanner in self.scanners.iter() {
            if let Some(findings) = scanner.inspect(result) {
                result
                    .scanner_results
                    .insert(scanner.name().to_string(), findings);
            }
            if !scanner.scan(result) {
                debug!(scanner = scanner.name(), index = result.index, "result rejected");
                return false;
            }
        }
        for scanner in self.scanners.iter() {
            scanner.process(result);
        }
        true
    }

    // output queues in registration order
    pub fn queues(&self) -> Vec<(&'static str, &JobQueue)> {
        self.scanners
            .iter()
            .filter_map(|s| s.queue().map(|q| (s.name(), q)))
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.queues().iter().any(|(_, q)| !q.is_empty())
    }
}
