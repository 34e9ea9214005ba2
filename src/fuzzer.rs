use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::dictionary::Dictionary;
use crate::error::RequestError;
use crate::model::JobUnit;
use crate::requester::{Dispatch, ResponseData};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Running,
    Paused,
    // terminal
    Stopped,
}

#[derive(Clone, Debug)]
struct PoolStatus {
    state: PoolState,
    alive: usize,
    parked: usize,
    // bumped by every resume so a parked worker can tell a resume apart from
    // a pause that followed it
    generation: u64,
}

// invoked on the worker task that completed the unit
pub trait FuzzCallbacks: Send + Sync + 'static {
    fn on_response(&self, unit: JobUnit, response: ResponseData);
    fn on_invalid_hostname(&self, unit: JobUnit, error: RequestError);
    fn on_request_error(&self, unit: JobUnit, error: RequestError);
}

pub struct Fuzzer<D, C> {
    dispatcher: Arc<D>,
    dictionary: Arc<Dictionary>,
    callbacks: Arc<C>,
    threads: usize,
    delay: Duration,
    status: Arc<watch::Sender<PoolStatus>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<D, C> Fuzzer<D, C>
where
    D: Dispatch,
    C: FuzzCallbacks,
{
    pub fn new(
        dispatcher: Arc<D>,
        dictionary: Arc<Dictionary>,
        callbacks: Arc<C>,
        threads: usize,
        delay: Duration,
    ) -> Self {
        let (status, _) = watch::channel(PoolStatus {
            state: PoolState::Created,
            alive: 0,
            parked: 0,
            generation: 0,
        });
        Self {
            dispatcher,
            dictionary,
            callbacks,
            threads: threads.max(1),
            delay,
            status: Arc::new(status),
            handles: Mutex::new(Vec::new()),
        }
    }

    // spawn `min(threads, queued units)` workers; a no-op unless freshly created
    pub fn start(&self) {
        let workers = self.threads.min(self.dictionary.len());
        let started = self.status.send_if_modified(|s| {
            if s.state != PoolState::Created {
                return false;
            }
            s.state = PoolState::Running;
            s.alive = workers;
            true
        });
        if !started {
            return;
        }
        debug!(workers, queued = self.dictionary.len(), "fuzzer started");

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for id in 0..workers {
            let worker = Worker {
                id,
                dispatcher: self.dispatcher.clone(),
                dictionary: self.dictionary.clone(),
                callbacks: self.callbacks.clone(),
                delay: self.delay,
                status: self.status.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
    }

    // close the gate and return once every live worker is parked
    pub async fn pause(&self) {
        let paused = self.status.send_if_modified(|s| {
            if s.state != PoolState::Running {
                return false;
            }
            s.state = PoolState::Paused;
            true
        });
        if paused {
            debug!("fuzzer pausing");
        }
        let mut rx = self.status.subscribe();
        let _ = rx
            .wait_for(|s| s.state != PoolState::Paused || s.parked >= s.alive)
            .await;
    }

    pub fn resume(&self) {
        let resumed = self.status.send_if_modified(|s| {
            if s.state != PoolState::Paused {
                return false;
            }
            s.state = PoolState::Running;
            s.parked = 0;
            s.generation += 1;
            true
        });
        if resumed {
            debug!("fuzzer resumed");
        }
    }

    // no further unit is dispatched; returns once in-flight units have
    // finished and every worker has exited
    pub async fn stop(&self) {
        let stopped = self.status.send_if_modified(|s| {
            if s.state == PoolState::Stopped {
                return false;
            }
            s.state = PoolState::Stopped;
            true
        });
        if stopped {
            debug!("fuzzer stopping");
        }
        self.wait_exit().await;
    }

    // wait until the dictionary is drained or the pool was stopped
    pub async fn join(&self) {
        self.wait_exit().await;
    }

    async fn wait_exit(&self) {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|s| s.alive == 0).await;
        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for outcome in join_all(handles).await {
            if let Err(e) = outcome {
                warn!("fuzzer worker failed: {e}");
            }
        }
    }

    pub fn state(&self) -> PoolState {
        self.status.borrow().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == PoolState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PoolState::Paused
    }

    pub fn parked(&self) -> usize {
        self.status.borrow().parked
    }

    pub fn alive(&self) -> usize {
        self.status.borrow().alive
    }
}

struct Worker<D, C> {
    id: usize,
    dispatcher: Arc<D>,
    dictionary: Arc<Dictionary>,
    callbacks: Arc<C>,
    delay: Duration,
    status: Arc<watch::Sender<PoolStatus>>,
}

// keeps the alive count honest even if a callback panics
struct AliveGuard(Arc<watch::Sender<PoolStatus>>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.alive = s.alive.saturating_sub(1));
    }
}

impl<D, C> Worker<D, C>
where
    D: Dispatch,
    C: FuzzCallbacks,
{
    async fn run(self) {
        let _guard = AliveGuard(self.status.clone());
        let mut rx = self.status.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match snapshot.state {
                PoolState::Stopped => break,
                PoolState::Paused => {
                    self.status.send_modify(|s| s.parked += 1);
                    trace!(worker = self.id, "parked");
                    let generation = snapshot.generation;
                    let woke = rx
                        .wait_for(|s| s.state == PoolState::Stopped || s.generation != generation)
                        .await
                        .is_ok();
                    if !woke {
                        break;
                    }
                    continue;
                }
                PoolState::Created | PoolState::Running => {}
            }

            let Some(unit) = self.dictionary.pop() else {
                break;
            };
            match self.dispatcher.dispatch(&unit).await {
                Ok(response) => self.callbacks.on_response(unit, response),
                Err(e @ RequestError::InvalidHostname { .. }) => {
                    self.callbacks.on_invalid_hostname(unit, e)
                }
                Err(e) => self.callbacks.on_request_error(unit, e),
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        trace!(worker = self.id, "exited");
    }
}
