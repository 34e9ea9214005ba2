use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::error::RequestError;
use crate::model::JobUnit;
use crate::requester::{Dispatch, ResponseData};
use crate::runner::{FuzzEvent, Options, Runner, WordlistBinding};
use crate::wordlist::WordlistSource;

// answers `http://target/<value>`; scripted statuses are consumed one per
// request before falling back to the fixed ones
#[derive(Default)]
struct Target {
    scripted: Mutex<HashMap<String, VecDeque<u16>>>,
    fixed: HashMap<String, u16>,
    bodies: HashMap<String, String>,
    sent: Mutex<Vec<(Instant, String)>>,
}

impl Target {
    fn status(mut self, value: &str, status: u16) -> Self {
        self.fixed.insert(value.to_string(), status);
        self
    }

    fn body(mut self, value: &str, body: &str) -> Self {
        self.bodies.insert(value.to_string(), body.to_string());
        self
    }

    fn script(self, value: &str, statuses: &[u16]) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .insert(value.to_string(), statuses.iter().copied().collect());
        self
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, v)| v.clone()).collect()
    }
}

#[derive(Clone)]
struct Shared(Arc<Target>);

impl Dispatch for Shared {
    fn dispatch(
        &self,
        unit: &JobUnit,
    ) -> impl Future<Output = Result<ResponseData, RequestError>> + Send {
        let value = unit.to_string();
        let target = self.0.clone();
        target.sent.lock().unwrap().push((Instant::now(), value.clone()));
        let scripted = target
            .scripted
            .lock()
            .unwrap()
            .get_mut(&value)
            .and_then(|q| q.pop_front());
        let status = scripted
            .or_else(|| target.fixed.get(&value).copied())
            .unwrap_or(404);
        let body = target.bodies.get(&value).cloned().unwrap_or_default();
        async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(ResponseData {
                url: format!("http://target/{value}"),
                method: "GET".to_string(),
                status,
                location: None,
                body_size: body.len(),
                body,
                request_time: Duration::from_millis(2),
                response_time: Duration::ZERO,
                ip: None,
            })
        }
    }
}

fn inline(words: &[&str], mark: &str) -> WordlistBinding {
    WordlistBinding {
        source: WordlistSource::Inline(words.iter().map(|s| s.to_string()).collect()),
        fuzz_mark: mark.to_string(),
    }
}

fn options(url: &str, words: &[&str]) -> Options {
    Options {
        url: url.to_string(),
        wordlists: vec![inline(words, "FUZZ")],
        threads: 4,
        skip_connection_check: true,
        ..Default::default()
    }
}

fn words(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("w{i}")).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blacklist_wait_pauses_without_losing_units() {
    let list = words(40);
    let refs: Vec<&str> = list.iter().map(|s| s.as_str()).collect();
    let mut opts = options("http://target/FUZZ", &refs);
    opts.blacklist_status = Some("429:wait=0.3".to_string());
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(Target::default().script("w5", &[429]));
    let started = Instant::now();
    let result = runner.run_with(|_| Shared(target.clone())).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(300));
    let sent = target.sent();
    assert_eq!(sent.len(), 40);
    let unique: HashSet<&String> = sent.iter().collect();
    assert_eq!(unique.len(), 40);
    assert_eq!(result.requests, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blacklist_stop_leaves_units_unsent() {
    let list = words(200);
    let refs: Vec<&str> = list.iter().map(|s| s.as_str()).collect();
    let mut opts = options("http://target/FUZZ", &refs);
    opts.threads = 2;
    opts.blacklist_status = Some("403".to_string());
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(Target::default().status("w0", 403));
    let err = runner
        .run_with(|_| Shared(target.clone()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("403"));
    assert!(target.sent().len() < 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transforms_multiply_the_dictionary() {
    let mut opts = options("http://target/FUZZ", &["admin", "backup"]);
    opts.prefixes = vec!["old_".to_string(), "new_".to_string()];
    opts.suffixes = vec![".php".to_string(), ".bak".to_string(), String::new()];
    opts.encoders = Some("Url,Html".to_string());
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(Target::default());
    let result = runner.run_with(|_| Shared(target.clone())).await.unwrap();
    assert_eq!(result.requests, 2 * 2 * 3 * 2);
    assert!(result.hits.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chained_encoders_reach_the_target() {
    let mut opts = options("http://target/?q=FUZZ", &["<a>"]);
    opts.encoders = Some("Url=2@Html".to_string());
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(Target::default());
    runner.run_with(|_| Shared(target.clone())).await.unwrap();
    assert_eq!(target.sent(), vec!["%253Ca%253E".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recursion_fuzzes_below_found_directories() {
    let mut opts = options("http://target/FUZZ", &["admin/", "login"]);
    opts.recursive = true;
    opts.max_rlevel = 1;
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(
        Target::default()
            .status("admin/", 200)
            .status("admin/admin/", 200)
            .status("admin/login", 200),
    );
    let result = runner.run_with(|_| Shared(target.clone())).await.unwrap();

    let mut sent = target.sent();
    sent.sort();
    assert_eq!(sent, vec!["admin/", "admin/admin/", "admin/login", "login"]);
    assert_eq!(result.jobs, 2);
    assert_eq!(result.hits.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn backups_scanner_queues_a_follow_up_job() {
    let mut opts = options("http://target/FUZZ", &["index.php", "missing"]);
    opts.scanners = vec!["backups".to_string()];
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(
        Target::default()
            .status("index.php", 200)
            .status("index.php.bak", 200),
    );
    let result = runner.run_with(|_| Shared(target.clone())).await.unwrap();

    assert_eq!(result.jobs, 2);
    assert_eq!(target.sent().len(), 2 + crate::scanners::BACKUP_EXTENSIONS.len());
    let hits: HashSet<String> = result.hits.iter().map(|h| h.payload.to_string()).collect();
    assert!(hits.contains("index.php"));
    assert!(hits.contains("index.php.bak"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn data_fuzzing_with_two_marks_zips_wordlists() {
    let mut opts = options("http://target/login", &[]);
    opts.methods = vec!["POST".to_string()];
    opts.data = "user=USER&pass=PASS".to_string();
    opts.wordlists = vec![
        inline(&["admin", "root", "guest"], "USER"),
        inline(&["hunter2", "toor"], "PASS"),
    ];
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(Target::default().status("root,toor", 200));
    let result = runner.run_with(|_| Shared(target.clone())).await.unwrap();

    let mut sent = target.sent();
    sent.sort();
    assert_eq!(sent, vec!["admin,hunter2", "root,toor"]);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].payload.to_string(), "root,toor");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn grep_scanner_filters_and_records_matches() {
    let mut opts = options("http://target/FUZZ", &["a", "b"]);
    opts.scanners = vec!["grep=token=[0-9]+".to_string()];
    let runner = Runner::new(opts).unwrap();

    let target = Arc::new(
        Target::default()
            .status("a", 200)
            .body("a", "hello token=42")
            .status("b", 200)
            .body("b", "nothing here"),
    );
    let result = runner.run_with(|_| Shared(target.clone())).await.unwrap();
    let hit = result
        .hits
        .iter()
        .find(|h| h.payload.to_string() == "a")
        .unwrap();
    assert_eq!(hit.scanner_results["grep"], vec!["token=42".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_response_is_reported_once() {
    let list = words(25);
    let refs: Vec<&str> = list.iter().map(|s| s.as_str()).collect();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = Runner::new(options("http://target/FUZZ", &refs))
        .unwrap()
        .with_events(tx);

    let target = Arc::new(Target::default().status("w3", 200));
    runner.run_with(|_| Shared(target.clone())).await.unwrap();
    drop(runner);

    let mut indexes = HashSet::new();
    let mut hits = 0;
    while let Some(event) = rx.recv().await {
        match event {
            FuzzEvent::Hit(r) => {
                hits += 1;
                assert!(indexes.insert(r.index));
            }
            FuzzEvent::Miss(r) => assert!(indexes.insert(r.index)),
            _ => {}
        }
    }
    assert_eq!(hits, 1);
    assert_eq!(indexes.len(), 25);
}
