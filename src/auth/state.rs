use crate::metrics::LoginMetrics;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{Rng, distr::Alphanumeric};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Duration, Instant, interval_at},
};
use tracing::debug;

/// Length of a state token. The alphanumeric alphabet gives just under 6 bits
/// of entropy per character, far beyond guessing range at this length.
const STATE_TOKEN_LEN: usize = 32;

/// Pending anti-forgery state tokens for in-flight login attempts.
///
/// The map is the only shared mutable structure of the login core and is
/// guarded by a single lock. All operations are synchronous and never hold
/// the guard across an await point, so a cancelled caller cannot leak it.
pub struct StateStore {
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: ChronoDuration,
    metrics: Arc<LoginMetrics>,
}

impl StateStore {
    pub fn new(ttl_seconds: i64, metrics: Arc<LoginMetrics>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl: ChronoDuration::seconds(ttl_seconds),
            metrics,
        }
    }

    /// Generate and register a fresh state token, valid for the configured
    /// TTL. Collisions among pending tokens are statistically negligible and
    /// not re-checked.
    pub fn issue(&self) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_TOKEN_LEN)
            .map(char::from)
            .collect();

        let mut pending = self.pending.lock().expect("state lock poisoned");
        pending.insert(token.clone(), Utc::now() + self.ttl);
        drop(pending);

        self.metrics.record_state_issued();
        debug!("new login state issued");
        token
    }

    /// Atomically look up and remove the token. Returns true iff it was
    /// present and unexpired; an expired entry is removed eagerly but still
    /// reported as invalid. The caller learns nothing about whether the token
    /// was unknown or expired.
    pub fn try_consume(&self, token: &str) -> bool {
        let removed = {
            let mut pending = self.pending.lock().expect("state lock poisoned");
            match pending.remove(token) {
                Some(expires_at) => Some(expires_at > Utc::now()),
                None => None,
            }
        };

        match removed {
            Some(valid) => {
                self.metrics.record_states_deleted(1);
                if !valid {
                    debug!("login state expired at consumption");
                }
                valid
            }
            None => {
                debug!("unknown login state presented");
                false
            }
        }
    }

    /// Remove all expired entries in one pass under the guard. Returns the
    /// number of entries reclaimed.
    pub fn sweep(&self) -> usize {
        let removed = {
            let mut pending = self.pending.lock().expect("state lock poisoned");
            let now = Utc::now();
            let before = pending.len();
            pending.retain(|_, expires_at| *expires_at > now);
            before - pending.len()
        };

        self.metrics.record_states_deleted(removed as u64);
        removed
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("state lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn the background reclamation loop sweeping expired states on a fixed
/// period. The task exits promptly when the shutdown channel flips to true,
/// including mid-sleep.
pub fn spawn_sweeper(
    store: Arc<StateStore>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        debug!(period_secs = period.as_secs(), "state sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        debug!(removed, "expired login states reclaimed");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("state sweeper stopped");
    })
}
