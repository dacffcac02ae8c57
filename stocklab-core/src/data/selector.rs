//! Adapter selector — health-tracked failover across an ordered adapter list.
//!
//! The selector is the only component with shared mutable state: health,
//! counters, and latency statistics live behind an `RwLock` so writers are
//! serialized and readers stay concurrent. A background probe resets `Error`
//! adapters to `Online` after a cooldown without blocking in-flight fetches.

use super::adapter::{Adjust, AdapterError, DataAdapter, DEFAULT_FETCH_TIMEOUT};
use crate::domain::{Bar, StockInfo};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Health status of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdapterHealth {
    Online,
    Error,
    Offline,
}

#[derive(Debug)]
struct AdapterState {
    health: AdapterHealth,
    consecutive_failures: u32,
    success_count: u64,
    failure_count: u64,
    total_latency: Duration,
    last_failure_at: Option<Instant>,
}

impl AdapterState {
    fn new() -> Self {
        Self {
            health: AdapterHealth::Online,
            consecutive_failures: 0,
            success_count: 0,
            failure_count: 0,
            total_latency: Duration::ZERO,
            last_failure_at: None,
        }
    }

    fn record_success(&mut self, latency: Duration) {
        self.health = AdapterHealth::Online;
        self.consecutive_failures = 0;
        self.success_count += 1;
        self.total_latency += latency;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.failure_count += 1;
        self.health = AdapterHealth::Error;
        self.last_failure_at = Some(Instant::now());
    }
}

/// Read-only snapshot of one adapter's tracked state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdapterSnapshot {
    pub name: String,
    pub health: AdapterHealth,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_ms: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("no adapters configured")]
    NoAdapters,

    #[error("no data for '{symbol}' in the requested range")]
    NoData { symbol: String },

    #[error("every adapter failed; last error: {last_error}")]
    AllAdaptersFailed { last_error: String },
}

/// Ordered adapter list with shared health tracking.
pub struct AdapterSelector {
    adapters: Vec<Arc<dyn DataAdapter>>,
    states: RwLock<Vec<AdapterState>>,
    cooldown: Duration,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for AdapterSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSelector")
            .field("adapters", &self.adapters.iter().map(|a| a.name().to_string()).collect::<Vec<_>>())
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

impl AdapterSelector {
    pub fn new(adapters: Vec<Arc<dyn DataAdapter>>) -> Self {
        let states = adapters.iter().map(|_| AdapterState::new()).collect();
        Self {
            adapters,
            states: RwLock::new(states),
            cooldown: Duration::from_secs(60),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Start a run-scoped session that pins fetches to one adapter when
    /// possible and tracks whether a mid-run switch was forced.
    pub fn session(&self) -> AdapterSession<'_> {
        AdapterSession {
            selector: self,
            preferred: Mutex::new(None),
            switched: AtomicBool::new(false),
        }
    }

    /// Mark an adapter administratively offline; the cascade skips it.
    pub fn set_offline(&self, name: &str) {
        let mut states = self.states.write().expect("selector state poisoned");
        for (i, adapter) in self.adapters.iter().enumerate() {
            if adapter.name() == name {
                states[i].health = AdapterHealth::Offline;
            }
        }
    }

    /// Reset `Error` adapters whose cooldown has elapsed back to `Online`.
    /// Called by the background probe; safe to call at any time.
    pub fn probe(&self) {
        let mut states = self.states.write().expect("selector state poisoned");
        for state in states.iter_mut() {
            if state.health == AdapterHealth::Error {
                let cooled = state
                    .last_failure_at
                    .map_or(true, |t| t.elapsed() >= self.cooldown);
                if cooled {
                    state.health = AdapterHealth::Online;
                    state.consecutive_failures = 0;
                }
            }
        }
    }

    /// Spawn a background probe thread on a fixed cadence. Returns a handle
    /// that stops the thread when dropped or when `stop()` is called.
    pub fn spawn_probe(self: &Arc<Self>, interval: Duration) -> ProbeHandle {
        let selector = Arc::clone(self);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                selector.probe();
            }
        });
        ProbeHandle {
            stop,
            handle: Some(handle),
        }
    }

    /// Snapshot of all adapter states, in configured order.
    pub fn snapshot(&self) -> Vec<AdapterSnapshot> {
        let states = self.states.read().expect("selector state poisoned");
        self.adapters
            .iter()
            .zip(states.iter())
            .map(|(adapter, state)| AdapterSnapshot {
                name: adapter.name().to_string(),
                health: state.health,
                success_count: state.success_count,
                failure_count: state.failure_count,
                avg_latency_ms: if state.success_count > 0 {
                    Some((state.total_latency.as_millis() as u64) / state.success_count)
                } else {
                    None
                },
            })
            .collect()
    }

    fn health_of(&self, index: usize) -> AdapterHealth {
        self.states.read().expect("selector state poisoned")[index].health
    }

    /// Candidate order: the preferred adapter first (if usable), then the
    /// configured order, skipping anything not `Online`.
    fn candidates(&self, preferred: Option<usize>) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.adapters.len());
        if let Some(p) = preferred {
            if self.health_of(p) == AdapterHealth::Online {
                order.push(p);
            }
        }
        for i in 0..self.adapters.len() {
            if Some(i) != preferred && self.health_of(i) == AdapterHealth::Online {
                order.push(i);
            }
        }
        order
    }

    fn try_fetch<T>(
        &self,
        preferred: Option<usize>,
        mut fetch: impl FnMut(&dyn DataAdapter) -> Result<T, AdapterError>,
    ) -> Result<(usize, T), SelectorError> {
        if self.adapters.is_empty() {
            return Err(SelectorError::NoAdapters);
        }
        let candidates = self.candidates(preferred);
        let mut saw_empty: Option<AdapterError> = None;
        let mut last_error: Option<AdapterError> = None;

        for index in candidates {
            let started = Instant::now();
            match fetch(self.adapters[index].as_ref()) {
                Ok(value) => {
                    self.states.write().expect("selector state poisoned")[index]
                        .record_success(started.elapsed());
                    return Ok((index, value));
                }
                Err(err) if err.is_empty() => {
                    // Success for the adapter, failure for the request.
                    self.states.write().expect("selector state poisoned")[index]
                        .record_success(started.elapsed());
                    saw_empty = Some(err);
                }
                Err(err) => {
                    self.states.write().expect("selector state poisoned")[index].record_failure();
                    last_error = Some(err);
                }
            }
        }

        if let Some(AdapterError::Empty { symbol }) = saw_empty {
            return Err(SelectorError::NoData { symbol });
        }
        Err(SelectorError::AllAdaptersFailed {
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no adapter online".to_string()),
        })
    }
}

/// Handle for the background probe thread.
pub struct ProbeHandle {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProbeHandle {
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Do not join on drop: the thread wakes at its next tick and exits.
        drop(self.handle.take());
    }
}

/// Run-scoped view of the selector: once a run has begun fetching, every
/// subsequent fetch goes through the same adapter if possible so adjust
/// conventions stay consistent. A forced mid-run switch is recorded.
pub struct AdapterSession<'a> {
    selector: &'a AdapterSelector,
    preferred: Mutex<Option<usize>>,
    switched: AtomicBool,
}

impl<'a> AdapterSession<'a> {
    pub fn get_ohlcv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
    ) -> Result<Vec<Bar>, SelectorError> {
        let timeout = self.selector.fetch_timeout;
        let preferred = *self.preferred.lock().expect("session state poisoned");
        let (index, bars) = self.selector.try_fetch(preferred, |adapter| {
            adapter.get_ohlcv(symbol, start, end, adjust, timeout)
        })?;
        self.note_used(preferred, index);
        Ok(bars)
    }

    pub fn get_stock_info(&self, symbol: &str) -> Result<StockInfo, SelectorError> {
        let preferred = *self.preferred.lock().expect("session state poisoned");
        let (index, info) = self
            .selector
            .try_fetch(preferred, |adapter| adapter.get_stock_info(symbol))?;
        self.note_used(preferred, index);
        Ok(info)
    }

    fn note_used(&self, preferred: Option<usize>, index: usize) {
        if let Some(p) = preferred {
            if p != index {
                self.switched.store(true, Ordering::Relaxed);
            }
        }
        *self.preferred.lock().expect("session state poisoned") = Some(index);
    }

    /// Name of the adapter the session is currently pinned to.
    pub fn adapter_used(&self) -> Option<String> {
        let preferred = *self.preferred.lock().expect("session state poisoned");
        preferred.map(|i| self.selector.adapters[i].name().to_string())
    }

    /// Whether a failover was forced after the run began fetching.
    pub fn switched_during_run(&self) -> bool {
        self.switched.load(Ordering::Relaxed)
    }
}
