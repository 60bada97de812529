//! Keyed debounce: the last job scheduled under a key runs once the key has been quiet for the
//! configured delay. Earlier jobs under the same key are dropped unrun.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Slot {
    generation: u64,
    job: Job,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    next_generation: u64,
    pending: HashMap<String, Slot>,
}

#[derive(Clone)]
pub struct KeyedDebounce {
    delay: Duration,
    slots: Arc<Mutex<Slots>>,
}

impl std::fmt::Debug for KeyedDebounce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedDebounce")
            .field("delay", &self.delay)
            .field("pending", &self.pending_keys())
            .finish()
    }
}

impl KeyedDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    /// Replaces any job pending under `key` and restarts its timer. Must be called from within a
    /// tokio runtime.
    pub fn schedule<F>(&self, key: &str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slots = match self.slots.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.next_generation += 1;
        let generation = slots.next_generation;

        let timer = {
            let slots = Arc::clone(&self.slots);
            let key = key.to_owned();
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let job = {
                    let mut g = match slots.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    match g.pending.get(&key) {
                        Some(slot) if slot.generation == generation => {
                            g.pending.remove(&key).map(|slot| slot.job)
                        }
                        _ => None,
                    }
                };
                if let Some(job) = job {
                    debug!(key = %key, "running debounced job");
                    job.await;
                }
            })
        };

        if let Some(previous) = slots.pending.insert(
            key.to_owned(),
            Slot {
                generation,
                job: Box::pin(job),
                timer,
            },
        ) {
            previous.timer.abort();
        }
    }

    pub fn pending_keys(&self) -> Vec<String> {
        match self.slots.lock() {
            Ok(g) => g.pending.keys().cloned().collect(),
            Err(e) => {
                warn!("debounce lock poisoned: {e}");
                Vec::new()
            }
        }
    }

    /// Runs every pending job now, in key order, and cancels their timers.
    pub async fn flush(&self) {
        let mut drained: Vec<(String, Slot)> = {
            let mut g = match self.slots.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            g.pending.drain().collect()
        };
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, slot) in drained {
            slot.timer.abort();
            debug!(key = %key, "flushing debounced job");
            slot.job.await;
        }
    }
}
