use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::blacklist::{BlacklistAction, BlacklistStatus};
use crate::dictionary::Dictionary;
use crate::error::{ConfigurationError, RequestError, RunnerError};
use crate::fuzzer::{FuzzCallbacks, Fuzzer};
use crate::job_manager::{JobManager, JobSource};
use crate::matcher::{Comparator, Matcher, StatusSpec};
use crate::model::{FuzzResult, JobUnit, Payload, RunContext};
use crate::payloader::{parse_encoder_chains, CaseMode, EncoderStage, Payloader};
use crate::recursion::{DirectoryHeuristic, RecursionManager};
use crate::requester::{Dispatch, FuzzingType, Requester, RequesterSettings, ResponseData};
use crate::scanners::{ScannerContext, ScannerPipeline};
use crate::wordlist::WordlistSource;

pub const DEFAULT_FUZZ_MARK: &str = "FUZZ";

// a wordlist and the fuzz mark its entries replace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordlistBinding {
    pub source: WordlistSource,
    pub fuzz_mark: String,
}

impl WordlistBinding {
    // `SOURCE` or `SOURCE:MARK`, where MARK is made of letters, digits and `_`
    pub fn parse(spec: &str) -> Result<Self, ConfigurationError> {
        let spec = spec.trim();
        if let Some((source, mark)) = spec.rsplit_once(':') {
            let is_mark = !mark.is_empty()
                && mark.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !source.trim().is_empty();
            if is_mark {
                return Ok(Self {
                    source: WordlistSource::parse(source)?,
                    fuzz_mark: mark.to_string(),
                });
            }
        }
        Ok(Self {
            source: WordlistSource::parse(spec)?,
            fuzz_mark: DEFAULT_FUZZ_MARK.to_string(),
        })
    }
}

// time comparator threshold
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeThreshold {
    Seconds(f64),
    // taken from the calibration probe
    Auto,
}

impl TimeThreshold {
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        let raw = value.trim();
        if raw.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let secs = crate::utils::parse_seconds(raw)
            .map_err(|e| ConfigurationError::invalid("match time", raw, e))?;
        Ok(Self::Seconds(secs.as_secs_f64()))
    }
}

#[derive(Clone, Debug)]
pub struct Options {
    pub url: String,
    // one fuzzing pass per method
    pub methods: Vec<String>,
    pub data: String,
    // `Key: Value`
    pub headers: Vec<String>,
    pub cookie: Option<String>,
    pub proxy: Option<String>,
    pub proxies: Vec<String>,
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub wordlists: Vec<WordlistBinding>,
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub case: CaseMode,
    pub encoders: Option<String>,
    pub encode_only: Option<String>,
    pub match_status: Option<String>,
    pub match_length: Option<usize>,
    pub match_time: Option<TimeThreshold>,
    pub calibrate: bool,
    pub threads: usize,
    pub delay: Duration,
    pub blacklist_status: Option<String>,
    pub recursive: bool,
    pub max_rlevel: usize,
    pub recursion_heuristic: DirectoryHeuristic,
    pub scanners: Vec<String>,
    pub ignore_errors: bool,
    pub skip_connection_check: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: String::new(),
            methods: vec!["GET".to_string()],
            data: String::new(),
            headers: Vec::new(),
            cookie: None,
            proxy: None,
            proxies: Vec::new(),
            timeout: None,
            follow_redirects: false,
            wordlists: Vec::new(),
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            case: CaseMode::Keep,
            encoders: None,
            encode_only: None,
            match_status: None,
            match_length: None,
            match_time: None,
            calibrate: false,
            threads: 10,
            delay: Duration::ZERO,
            blacklist_status: None,
            recursive: false,
            max_rlevel: 1,
            recursion_heuristic: DirectoryHeuristic::TrailingSlash,
            scanners: Vec::new(),
            ignore_errors: false,
            skip_connection_check: false,
        }
    }
}

// what the runner publishes while it works
#[derive(Clone, Debug)]
pub enum FuzzEvent {
    JobStarted {
        method: String,
        source: JobSource,
        units: usize,
    },
    JobFinished {
        method: String,
        source: JobSource,
    },
    Hit(Box<FuzzResult>),
    Miss(Box<FuzzResult>),
    Error {
        index: u64,
        payload: JobUnit,
        message: String,
    },
}

#[derive(Clone, Debug)]
pub struct ScanResult {
    pub fuzzing_type: FuzzingType,
    pub hits: Vec<FuzzResult>,
    pub requests: usize,
    pub errors: usize,
    pub jobs: usize,
    pub elapsed: Duration,
}

// requests sent to the driver by result handling on worker tasks
#[derive(Debug)]
enum ControlEvent {
    Wait(Duration),
    Stop(u16),
    Abort(RequestError),
}

#[derive(Debug)]
pub struct Runner {
    options: Options,
    requester: Requester,
    marks: Vec<String>,
    payloader: Payloader,
    status: Option<StatusSpec>,
    blacklist: Option<BlacklistStatus>,
    events: Option<mpsc::UnboundedSender<FuzzEvent>>,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.url.trim().is_empty() {
            return Err(ConfigurationError::InvalidUrl {
                url: options.url.clone(),
            }
            .into());
        }
        if options.threads == 0 {
            return Err(ConfigurationError::invalid("threads", "0", "expected at least one thread").into());
        }
        if options.wordlists.is_empty() {
            return Err(ConfigurationError::invalid(
                "wordlists",
                "",
                "at least one wordlist is required",
            )
            .into());
        }

        let mut marks: Vec<String> = Vec::new();
        for binding in options.wordlists.iter() {
            if marks.contains(&binding.fuzz_mark) {
                return Err(ConfigurationError::invalid(
                    "wordlists",
                    binding.fuzz_mark.as_str(),
                    "each fuzz mark takes a single wordlist",
                )
                .into());
            }
            marks.push(binding.fuzz_mark.clone());
        }

        let mut headers = options.headers.clone();
        if let Some(cookie) = options.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            merge_cookie(&mut headers, cookie.trim());
        }
        let mut proxies = options.proxies.clone();
        if let Some(proxy) = options.proxy.as_deref() {
            proxies.insert(0, proxy.to_string());
        }
        let requester = Requester::new(RequesterSettings {
            url: options.url.clone(),
            method: options.methods.first().cloned().unwrap_or_default(),
            body: options.data.clone(),
            headers,
            marks: marks.clone(),
            proxies,
            timeout: options.timeout,
            follow_redirects: options.follow_redirects,
        })?;

        if requester.fuzzing_type() == FuzzingType::Unknown {
            return Err(ConfigurationError::NoFuzzMark {
                marks: marks.join(", "),
            }
            .into());
        }
        let active = requester.active_marks();
        if let Some(unused) = marks.iter().find(|m| !active.contains(m)) {
            return Err(ConfigurationError::UnusedFuzzMark {
                mark: unused.clone(),
            }
            .into());
        }

        let mut encoders = match options.encoders.as_deref() {
            Some(spec) => EncoderStage::new(parse_encoder_chains(spec)?),
            None => EncoderStage::default(),
        };
        if let Some(pattern) = options.encode_only.as_deref() {
            encoders = encoders.encode_only(pattern)?;
        }
        let payloader = Payloader::new()
            .prefixes(options.prefixes.clone())
            .suffixes(options.suffixes.clone())
            .case(options.case)
            .encoders(encoders);

        let status = options
            .match_status
            .as_deref()
            .map(StatusSpec::parse)
            .transpose()?;
        let blacklist = options
            .blacklist_status
            .as_deref()
            .map(BlacklistStatus::parse)
            .transpose()?;

        // fail on unknown scanners before any request goes out
        ScannerPipeline::from_specs(&options.scanners, &scanner_context(&requester))?;

        if options.recursive && requester.fuzzing_type() != FuzzingType::Path {
            warn!(
                fuzzing_type = requester.fuzzing_type().label(),
                "recursion only applies to path fuzzing, ignoring"
            );
        }

        Ok(Self {
            options,
            requester,
            marks,
            payloader,
            status,
            blacklist,
            events: None,
        })
    }

    // publish hits, misses, errors and job transitions to `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<FuzzEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn fuzzing_type(&self) -> FuzzingType {
        self.requester.fuzzing_type()
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub async fn run(&self) -> Result<ScanResult, RunnerError> {
        if !self.options.skip_connection_check {
            self.requester
                .test_connection()
                .await
                .map_err(|e| RunnerError::Connection {
                    url: self.options.url.clone(),
                    source: e,
                })?;
            debug!(url = %self.options.url, "connection check passed");
        }
        let requester = self.requester.clone();
        self.run_with(move |method| requester.with_method(method))
            .await
    }

    fn methods(&self) -> Vec<String> {
        if self.fuzzing_type() == FuzzingType::Method {
            return vec![self.requester.method().word().to_string()];
        }
        let methods: Vec<String> = self
            .options
            .methods
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if methods.is_empty() {
            vec!["GET".to_string()]
        } else {
            methods
        }
    }

    // the run loop against any dispatcher; one dispatcher per method pass
    pub(crate) async fn run_with<D, F>(&self, dispatcher_for: F) -> Result<ScanResult, RunnerError>
    where
        D: Dispatch,
        F: Fn(&str) -> D,
    {
        let started_at = Instant::now();
        let fuzzing_type = self.fuzzing_type();

        let mut wordlists: Vec<(String, Vec<String>)> = Vec::with_capacity(self.options.wordlists.len());
        for binding in self.options.wordlists.iter() {
            let words = binding.source.build().await?;
            info!(
                source = %binding.source.name(),
                fuzz_mark = %binding.fuzz_mark,
                entries = words.len(),
                "wordlist loaded"
            );
            wordlists.push((binding.fuzz_mark.clone(), words));
        }
        let dictionary = Arc::new(Dictionary::build(&wordlists, &self.payloader)?);
        let context = Arc::new(RunContext::new());
        let stats = Arc::new(RunStats::default());
        let mut jobs_run = 0;

        for method in self.methods() {
            let dispatcher = Arc::new(dispatcher_for(&method));

            let mut comparator = Comparator::new(
                self.options.match_length,
                match self.options.match_time {
                    Some(TimeThreshold::Seconds(secs)) => Some(secs),
                    _ => None,
                },
            );
            if self.options.calibrate || self.options.match_time == Some(TimeThreshold::Auto) {
                comparator = self.calibrate(dispatcher.as_ref(), comparator).await?;
            }
            let matcher = Matcher::for_fuzzing_type(fuzzing_type, self.status.clone(), comparator)?;

            let scanners = Arc::new(ScannerPipeline::from_specs(
                &self.options.scanners,
                &scanner_context(&self.requester),
            )?);
            let recursion = (self.options.recursive && fuzzing_type == FuzzingType::Path).then(|| {
                Arc::new(RecursionManager::new(
                    self.options.max_rlevel,
                    self.options.recursion_heuristic,
                    self.requester.path_marks(),
                    dictionary.base_units(),
                ))
            });
            let jobs = JobManager::new(
                dictionary.clone(),
                recursion.clone(),
                scanners.clone(),
                context.clone(),
            );

            let (control_tx, mut control_rx) = mpsc::unbounded_channel();
            let handler = Arc::new(ResultHandler {
                context: context.clone(),
                matcher,
                blacklist: self.blacklist.clone(),
                scanners,
                recursion,
                control: control_tx,
                events: self.events.clone(),
                stats: stats.clone(),
                ignore_errors: self.options.ignore_errors,
            });

            dictionary.reload();
            while jobs.has_pending_jobs() {
                let Some(job) = jobs.get_job() else {
                    break;
                };
                jobs_run += 1;
                info!(method = %method, source = %job.source, units = job.units, "job started");
                self.emit(FuzzEvent::JobStarted {
                    method: method.clone(),
                    source: job.source,
                    units: job.units,
                });

                let fuzzer = Fuzzer::new(
                    dispatcher.clone(),
                    dictionary.clone(),
                    handler.clone(),
                    self.options.threads,
                    self.options.delay,
                );
                fuzzer.start();
                drive(&fuzzer, &mut control_rx).await?;

                self.emit(FuzzEvent::JobFinished {
                    method: method.clone(),
                    source: job.source,
                });
                debug!(method = %method, source = %job.source, "job finished");
                jobs.check_for_new_jobs();
            }
        }

        let hits = std::mem::take(&mut *stats.hits.lock().unwrap_or_else(|e| e.into_inner()));
        Ok(ScanResult {
            fuzzing_type,
            hits,
            requests: stats.requests.load(Ordering::Relaxed),
            errors: stats.errors.load(Ordering::Relaxed),
            jobs: jobs_run,
            elapsed: started_at.elapsed(),
        })
    }

    // one throwaway request with a random payload to capture the soft-miss
    // baseline
    async fn calibrate<D: Dispatch>(
        &self,
        dispatcher: &D,
        current: Comparator,
    ) -> Result<Comparator, RunnerError> {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let unit = JobUnit::new(
            self.marks
                .iter()
                .map(|mark| Payload::new(value.as_str(), value.as_str(), mark.as_str()))
                .collect(),
        );
        let response = dispatcher
            .dispatch(&unit)
            .await
            .map_err(|e| RunnerError::Connection {
                url: self.options.url.clone(),
                source: e,
            })?;

        let comparator = Comparator::new(
            current.length.or(Some(response.body_size)),
            match self.options.match_time {
                Some(TimeThreshold::Auto) => Some(response.rtt().as_secs_f64()),
                _ => current.time,
            },
        );
        info!(
            status = response.status,
            length = ?comparator.length,
            time = ?comparator.time,
            "calibration baseline captured"
        );
        Ok(comparator)
    }

    fn emit(&self, event: FuzzEvent) {
        if let Some(tx) = self.events.as_ref() {
            let _ = tx.send(event);
        }
    }
}

// the shorthand joins an explicit `Cookie:` header instead of replacing it
fn merge_cookie(headers: &mut Vec<String>, cookie: &str) {
    let existing = headers.iter_mut().find(|line| {
        line.split_once(':')
            .is_some_and(|(key, _)| key.trim().eq_ignore_ascii_case("cookie"))
    });
    match existing {
        Some(line) => {
            let joined = line.trim_end().trim_end_matches(';').to_string();
            *line = format!("{joined}; {cookie}");
        }
        None => headers.push(format!("Cookie: {cookie}")),
    }
}

fn scanner_context(requester: &Requester) -> ScannerContext {
    ScannerContext {
        fuzzing_type: requester.fuzzing_type(),
        path_marks: requester.path_marks(),
    }
}

// wait for the pass to drain while serving pause and stop requests from the
// result handler
async fn drive<D, C>(
    fuzzer: &Fuzzer<D, C>,
    control: &mut mpsc::UnboundedReceiver<ControlEvent>,
) -> Result<(), RunnerError>
where
    D: Dispatch,
    C: FuzzCallbacks,
{
    loop {
        tokio::select! {
            _ = fuzzer.join() => break,
            Some(event) = control.recv() => {
                match event {
                    ControlEvent::Wait(delay) => {
                        fuzzer.pause().await;
                        // nothing left to hold back once every worker has exited
                        if fuzzer.alive() > 0 {
                            warn!(seconds = delay.as_secs_f64(), "blacklisted status, fuzzer paused");
                            tokio::time::sleep(delay).await;
                        }
                        // later requests may have hit the blacklist during the pause
                        while let Ok(pending) = control.try_recv() {
                            if let Some(err) = terminal(fuzzer, pending).await {
                                return Err(err);
                            }
                        }
                        fuzzer.resume();
                    }
                    other => {
                        if let Some(err) = terminal(fuzzer, other).await {
                            return Err(err);
                        }
                    }
                }
            }
        }
    }
    // the last units may have raised a stop right before the workers exited
    while let Ok(pending) = control.try_recv() {
        if let Some(err) = terminal(fuzzer, pending).await {
            return Err(err);
        }
    }
    Ok(())
}

// stop the pool for terminal events; waits are ignored
async fn terminal<D, C>(fuzzer: &Fuzzer<D, C>, event: ControlEvent) -> Option<RunnerError>
where
    D: Dispatch,
    C: FuzzCallbacks,
{
    let err = match event {
        ControlEvent::Wait(_) => return None,
        ControlEvent::Stop(status) => {
            warn!(status, "blacklisted status, stopping");
            RunnerError::StopActionInterrupt { status }
        }
        ControlEvent::Abort(source) => {
            warn!(error = %source, "request failed, aborting target");
            RunnerError::TargetAborted { source }
        }
    };
    fuzzer.stop().await;
    Some(err)
}

#[derive(Debug, Default)]
struct RunStats {
    hits: Mutex<Vec<FuzzResult>>,
    requests: AtomicUsize,
    errors: AtomicUsize,
}

// blacklist, matcher, scanners and recursion, applied on the worker task
struct ResultHandler {
    context: Arc<RunContext>,
    matcher: Matcher,
    blacklist: Option<BlacklistStatus>,
    scanners: Arc<ScannerPipeline>,
    recursion: Option<Arc<RecursionManager>>,
    control: mpsc::UnboundedSender<ControlEvent>,
    events: Option<mpsc::UnboundedSender<FuzzEvent>>,
    stats: Arc<RunStats>,
    ignore_errors: bool,
}

impl ResultHandler {
    fn emit(&self, event: FuzzEvent) {
        if let Some(tx) = self.events.as_ref() {
            let _ = tx.send(event);
        }
    }
}

impl FuzzCallbacks for ResultHandler {
    fn on_response(&self, unit: JobUnit, response: ResponseData) {
        let index = self.context.next_index();
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        let mut result = FuzzResult::new(index, unit, response);

        if let Some(action) = self.blacklist.as_ref().and_then(|b| b.check(result.status)) {
            let event = match action {
                BlacklistAction::Stop => ControlEvent::Stop(result.status),
                BlacklistAction::Wait(delay) => ControlEvent::Wait(delay),
            };
            debug!(index, status = result.status, "blacklisted status");
            let _ = self.control.send(event);
            self.emit(FuzzEvent::Miss(Box::new(result)));
            return;
        }

        let hit = self.matcher.is_match(&result) && self.scanners.evaluate(&mut result);
        if !hit {
            self.emit(FuzzEvent::Miss(Box::new(result)));
            return;
        }
        if let Some(recursion) = self.recursion.as_ref() {
            recursion.check_for_recursion(&result);
        }
        self.stats
            .hits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
        self.emit(FuzzEvent::Hit(Box::new(result)));
    }

    fn on_invalid_hostname(&self, unit: JobUnit, error: RequestError) {
        let index = self.context.next_index();
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        debug!(index, payload = %unit, "{error}, skipping");
        self.emit(FuzzEvent::Error {
            index,
            payload: unit,
            message: error.to_string(),
        });
    }

    fn on_request_error(&self, unit: JobUnit, error: RequestError) {
        let index = self.context.next_index();
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        if !self.ignore_errors {
            let _ = self.control.send(ControlEvent::Abort(error));
            return;
        }
        warn!(index, payload = %unit, "{error}");
        self.emit(FuzzEvent::Error {
            index,
            payload: unit,
            message: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzer::test_support::FakeDispatcher;

    fn options(url: &str, words: &[&str]) -> Options {
        Options {
            url: url.to_string(),
            wordlists: vec![WordlistBinding {
                source: WordlistSource::Inline(words.iter().map(|s| s.to_string()).collect()),
                fuzz_mark: DEFAULT_FUZZ_MARK.to_string(),
            }],
            threads: 4,
            skip_connection_check: true,
            ..Default::default()
        }
    }

    #[test]
    fn wordlist_binding_parsing() {
        let plain = WordlistBinding::parse("./words.txt").unwrap();
        assert_eq!(plain.fuzz_mark, "FUZZ");
        let bound = WordlistBinding::parse("[a,b]:USER").unwrap();
        assert_eq!(bound.fuzz_mark, "USER");
        assert_eq!(
            bound.source,
            WordlistSource::Inline(vec!["a".to_string(), "b".to_string()])
        );
        let windows = WordlistBinding::parse("C:\\lists\\words.txt").unwrap();
        assert_eq!(windows.fuzz_mark, "FUZZ");
    }

    #[test]
    fn new_validates_configuration() {
        assert!(matches!(
            Runner::new(options("http://x/", &["a"])),
            Err(RunnerError::Config(ConfigurationError::NoFuzzMark { .. }))
        ));

        let mut bad_regex = options("http://x/FUZZ", &["a"]);
        bad_regex.encoders = Some("url".to_string());
        bad_regex.encode_only = Some("([".to_string());
        assert!(matches!(
            Runner::new(bad_regex),
            Err(RunnerError::Config(ConfigurationError::InvalidRegex { .. }))
        ));

        let mut bad_scanner = options("http://x/FUZZ", &["a"]);
        bad_scanner.scanners = vec!["nope".to_string()];
        assert!(Runner::new(bad_scanner).is_err());

        let mut unused = options("http://x/FUZZ", &["a"]);
        unused.wordlists.push(WordlistBinding::parse("[b]:OTHER").unwrap());
        assert!(matches!(
            Runner::new(unused),
            Err(RunnerError::Config(ConfigurationError::UnusedFuzzMark { .. }))
        ));

        let runner = Runner::new(options("http://x/FUZZ", &["a"])).unwrap();
        assert_eq!(runner.fuzzing_type(), FuzzingType::Path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn path_run_reports_default_discovery_hits() {
        let runner = Runner::new(options("http://x/FUZZ", &["admin", "login", "missing", "secret"]))
            .unwrap();
        let fake = Arc::new(
            FakeDispatcher::new(Duration::from_millis(1))
                .status("admin", 301)
                .status("login", 200)
                .status("secret", 403),
        );
        let result = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap();
        let mut hits: Vec<String> = result.hits.iter().map(|h| h.payload.to_string()).collect();
        hits.sort();
        assert_eq!(hits, vec!["admin", "login", "secret"]);
        assert_eq!(result.requests, 4);
        assert_eq!(result.jobs, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn blacklist_stop_aborts_the_run() {
        let mut opts = options("http://x/FUZZ", &["a", "b", "c", "ban", "d"]);
        opts.blacklist_status = Some("418:stop".to_string());
        let runner = Runner::new(opts).unwrap();
        let fake = Arc::new(FakeDispatcher::new(Duration::from_millis(1)).status("ban", 418));
        let err = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap_err();
        assert!(matches!(err, RunnerError::StopActionInterrupt { status: 418 }));
    }

    #[tokio::test]
    async fn request_errors_abort_unless_ignored() {
        let fake = Arc::new(FakeDispatcher::new(Duration::ZERO));

        let runner = Runner::new(options("http://x/FUZZ", &["a", "broken", "b"])).unwrap();
        let err = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap_err();
        assert!(matches!(err, RunnerError::TargetAborted { .. }));

        let mut opts = options("http://x/FUZZ", &["a", "broken", "b"]);
        opts.ignore_errors = true;
        let runner = Runner::new(opts).unwrap();
        let result = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap();
        assert_eq!(result.errors, 1);
        assert_eq!(result.requests, 3);
    }

    #[tokio::test]
    async fn invalid_hostnames_are_skipped() {
        let runner = Runner::new(options("http://FUZZ.example.com/", &["www", "nohost"])).unwrap();
        let fake = Arc::new(FakeDispatcher::new(Duration::ZERO).status("www", 200));
        let result = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap();
        assert_eq!(result.fuzzing_type, FuzzingType::Subdomain);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.errors, 0);
    }

    #[tokio::test]
    async fn each_method_gets_its_own_pass() {
        let mut opts = options("http://x/?q=FUZZ", &["a", "b"]);
        opts.methods = vec!["GET".to_string(), "POST".to_string()];
        let runner = Runner::new(opts).unwrap();
        let fake = Arc::new(FakeDispatcher::new(Duration::ZERO).status("a", 200));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = runner.with_events(tx);
        let result = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap();
        assert_eq!(result.jobs, 2);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(fake.sent().len(), 4);

        let mut started = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FuzzEvent::JobStarted { method, .. } = event {
                started.push(method);
            }
        }
        assert_eq!(started, vec!["GET", "POST"]);
    }

    #[tokio::test]
    async fn calibration_sets_the_length_baseline() {
        let mut opts = options("http://x/?q=FUZZ", &["a", "b"]);
        opts.match_status = Some("200".to_string());
        opts.calibrate = true;
        let runner = Runner::new(opts).unwrap();
        // the random probe gets the default empty body; `b` is no longer than it
        let fake = Arc::new(
            FakeDispatcher::new(Duration::ZERO)
                .status("a", 200)
                .status("b", 200)
                .body("a", "a distinct page"),
        );
        let result = runner.run_with(|_| SharedFake(fake.clone())).await.unwrap();
        let hits: Vec<String> = result.hits.iter().map(|h| h.payload.to_string()).collect();
        assert_eq!(hits, vec!["a"]);
        assert_eq!(fake.sent().len(), 3);
    }

    #[test]
    fn cookie_shorthand_joins_an_explicit_cookie_header() {
        let mut headers = vec!["X-A: 1".to_string(), "cookie: session=abc;".to_string()];
        merge_cookie(&mut headers, "lang=en");
        assert_eq!(headers, vec!["X-A: 1", "cookie: session=abc; lang=en"]);

        let mut headers = vec!["X-A: 1".to_string()];
        merge_cookie(&mut headers, "lang=en");
        assert_eq!(headers, vec!["X-A: 1", "Cookie: lang=en"]);
    }

    #[tokio::test]
    async fn connection_check_failure_stops_the_run() {
        let addr = crate::requester::test_support::refused_addr().await;
        let mut opts = options(&format!("http://{addr}/FUZZ"), &["a"]);
        opts.skip_connection_check = false;
        let err = Runner::new(opts).unwrap().run().await.unwrap_err();
        assert!(matches!(err, RunnerError::Connection { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_checks_the_target_then_fuzzes_it() {
        use crate::requester::test_support::{response, LocalServer};

        let server = LocalServer::start(|line| {
            if line.starts_with("GET /admin ") {
                response(200, &[], b"welcome")
            } else {
                response(404, &[], b"")
            }
        })
        .await;
        let mut opts = options(&server.url("/FUZZ"), &["admin", "missing"]);
        opts.skip_connection_check = false;
        let result = Runner::new(opts).unwrap().run().await.unwrap();

        let hits: Vec<String> = result.hits.iter().map(|h| h.payload.to_string()).collect();
        assert_eq!(hits, vec!["admin"]);
        assert_eq!(result.hits[0].body_size, 7);
        let mut lines = server.requests();
        lines.sort();
        assert_eq!(
            lines,
            vec!["GET / HTTP/1.1", "GET /admin HTTP/1.1", "GET /missing HTTP/1.1"]
        );
    }

    struct Quiet;

    impl FuzzCallbacks for Quiet {
        fn on_response(&self, _unit: JobUnit, _response: ResponseData) {}
        fn on_invalid_hostname(&self, _unit: JobUnit, _error: RequestError) {}
        fn on_request_error(&self, _unit: JobUnit, _error: RequestError) {}
    }

    #[tokio::test]
    async fn wait_after_the_last_worker_exits_skips_the_sleep() {
        let units = ["a", "b"]
            .iter()
            .map(|v| JobUnit::single(Payload::new(*v, *v, "FUZZ")))
            .collect();
        let fuzzer = Fuzzer::new(
            Arc::new(FakeDispatcher::new(Duration::ZERO)),
            Arc::new(Dictionary::from_units(units)),
            Arc::new(Quiet),
            2,
            Duration::ZERO,
        );
        fuzzer.start();
        fuzzer.join().await;
        assert_eq!(fuzzer.alive(), 0);

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ControlEvent::Wait(Duration::from_secs(30))).unwrap();
        let driven = tokio::time::timeout(Duration::from_secs(5), drive(&fuzzer, &mut rx)).await;
        assert!(matches!(driven, Ok(Ok(()))));
    }

    // lets one fake serve several passes and be inspected afterwards
    struct SharedFake(Arc<FakeDispatcher>);

    impl Dispatch for SharedFake {
        fn dispatch(
            &self,
            unit: &JobUnit,
        ) -> impl std::future::Future<Output = Result<ResponseData, RequestError>> + Send {
            self.0.dispatch(unit)
        }
    }
}
