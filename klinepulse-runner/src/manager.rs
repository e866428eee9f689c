//! Stream manager: ties each key's pipeline lifetime to its subscribers.
//!
//! The first subscriber of a key spawns the pipeline and a feed pump
//! (backfill, then live updates). When the last subscriber leaves, the pump
//! is stopped, queued cycles finish, and the key's window is dropped.
//! Subscribers that are dropped without unsubscribing are swept up by a
//! background reaper every `hub.idle_check_ms`.
//!
//! Each key owns a lifecycle slot behind its own async lock. Start and
//! teardown of a key happen under that lock, so a subscriber arriving while
//! the previous stream is still stopping waits for the old window to be
//! dropped before the new pipeline backfills.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::PulseConfig;
use crate::feed::{CandleFeed, ResilientFeed, RetryPolicy};
use crate::hub::{DistributionHub, Subscription};
use crate::payload::Payload;
use crate::pipeline::{spawn_pipeline, Pipeline, PipelineCommand, PipelineHandle, PipelineStats};
use klinepulse_core::{WindowKey, WindowStore};

struct ActiveStream {
    pipeline: PipelineHandle,
    pump: JoinHandle<()>,
}

/// `None` while the key has no running stream.
type StreamSlot = Arc<Mutex<Option<ActiveStream>>>;

pub struct StreamManager {
    config: Arc<PulseConfig>,
    store: Arc<WindowStore>,
    hub: Arc<DistributionHub<Payload>>,
    feed: Arc<dyn CandleFeed>,
    // Never held across an await on a slot lock.
    slots: Mutex<HashMap<WindowKey, StreamSlot>>,
    reaper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl StreamManager {
    /// Build a manager over `feed`, wrapped in the configured retry policy,
    /// and start its idle reaper. Must be called inside a tokio runtime.
    pub fn new<F: CandleFeed + 'static>(config: PulseConfig, feed: F) -> Arc<Self> {
        let policy = RetryPolicy::from(&config.feed);
        let idle_check = config.hub.idle_check();
        let manager = Arc::new(Self {
            store: Arc::new(WindowStore::new(config.window.capacity)),
            hub: Arc::new(DistributionHub::new()),
            feed: Arc::new(ResilientFeed::new(feed, policy)),
            config: Arc::new(config),
            slots: Mutex::new(HashMap::new()),
            reaper: parking_lot::Mutex::new(None),
        });
        let reaper = tokio::spawn(reap_idle(Arc::downgrade(&manager), idle_check));
        *manager.reaper.lock() = Some(reaper);
        manager
    }

    pub fn hub(&self) -> &Arc<DistributionHub<Payload>> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<WindowStore> {
        &self.store
    }

    /// Subscribe to `key`, starting its pipeline if this is the first subscriber.
    pub async fn subscribe(&self, key: &WindowKey) -> Subscription<Payload> {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut stream = slot.lock().await;
        // Registered before the pipeline starts so the backfill payload is seen.
        let subscription = self.hub.subscribe(&key.topic());
        if stream.is_none() {
            *stream = Some(self.start(key));
        }
        debug!(%key, subscriber = %subscription.id, "subscriber attached");
        subscription
    }

    /// Detach a subscriber. Returns the pipeline's final stats if this was
    /// the last subscriber and the pipeline was torn down.
    pub async fn unsubscribe(&self, subscription: Subscription<Payload>) -> Option<PipelineStats> {
        let topic = subscription.topic.clone();
        self.hub.unsubscribe(&topic, subscription.id);
        drop(subscription);

        let (key, slot) = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .find(|(k, _)| k.topic() == topic)
                .map(|(k, slot)| (k.clone(), Arc::clone(slot)))?
        };
        self.stop_if_idle(&key, slot).await
    }

    /// Tear down pipelines whose subscribers have all gone away without
    /// unsubscribing. Returns the keys stopped.
    pub async fn prune_idle(&self) -> Vec<WindowKey> {
        let mut stopped = Vec::new();
        for (key, slot) in self.slot_list().await {
            if self.stop_if_idle(&key, slot).await.is_some() {
                stopped.push(key);
            }
        }
        stopped.sort();
        stopped
    }

    pub async fn active_keys(&self) -> Vec<WindowKey> {
        let mut keys = Vec::new();
        for (key, slot) in self.slot_list().await {
            if slot.lock().await.is_some() {
                keys.push(key);
            }
        }
        keys.sort();
        keys
    }

    pub async fn stats(&self, key: &WindowKey) -> Option<PipelineStats> {
        let slot = self.slots.lock().await.get(key).cloned()?;
        let stream = slot.lock().await;
        stream.as_ref().map(|s| s.pipeline.stats())
    }

    /// Stop the reaper and every pipeline.
    pub async fn shutdown(&self) {
        if let Some(reaper) = self.reaper.lock().take() {
            reaper.abort();
        }
        for (key, slot) in self.slot_list().await {
            let mut guard = slot.lock().await;
            if let Some(stream) = guard.take() {
                self.teardown(&key, stream).await;
            }
            drop(guard);
            self.release(&key, slot).await;
        }
    }

    async fn slot_list(&self) -> Vec<(WindowKey, StreamSlot)> {
        self.slots
            .lock()
            .await
            .iter()
            .map(|(k, slot)| (k.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Stop `key` if no live subscriber remains. Teardown runs under the
    /// slot lock so a concurrent subscribe waits for it to finish.
    async fn stop_if_idle(&self, key: &WindowKey, slot: StreamSlot) -> Option<PipelineStats> {
        let mut guard = slot.lock().await;
        if guard.is_none() || self.hub.prune_closed(&key.topic()) > 0 {
            return None;
        }
        let stream = guard.take()?;
        let stats = self.teardown(key, stream).await;
        drop(guard);
        self.release(key, slot).await;
        stats
    }

    /// Forget an empty slot unless another caller is already waiting on it.
    async fn release(&self, key: &WindowKey, slot: StreamSlot) {
        let mut slots = self.slots.lock().await;
        let Some(current) = slots.get(key) else {
            return;
        };
        // The map's reference plus ours; any other holder is a pending subscribe.
        if !Arc::ptr_eq(current, &slot) || Arc::strong_count(&slot) > 2 {
            return;
        }
        if slot.try_lock().map_or(false, |stream| stream.is_none()) {
            slots.remove(key);
        }
    }

    fn start(&self, key: &WindowKey) -> ActiveStream {
        let pipeline = Pipeline::new(
            key.clone(),
            Arc::clone(&self.store),
            self.config.indicators.clone(),
            self.config.scoring.clone(),
        );
        let handle = spawn_pipeline(pipeline, Arc::clone(&self.hub), self.config.hub.command_buffer);
        let pump = tokio::spawn(pump(
            Arc::clone(&self.feed),
            key.clone(),
            self.config.feed.backfill_limit,
            handle.sender(),
        ));
        info!(%key, feed = self.feed.name(), "stream started");
        ActiveStream {
            pipeline: handle,
            pump,
        }
    }

    async fn teardown(&self, key: &WindowKey, stream: ActiveStream) -> Option<PipelineStats> {
        stream.pump.abort();
        let stats = match stream.pipeline.shutdown().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!(%key, error = %e, "pipeline did not stop cleanly");
                None
            }
        };
        self.store.remove(key);
        info!(%key, "stream stopped");
        stats
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().take() {
            reaper.abort();
        }
    }
}

/// Periodically stop streams whose subscribers were dropped. Exits once the
/// manager is gone.
async fn reap_idle(manager: Weak<StreamManager>, every: Duration) {
    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks.tick().await;
    loop {
        ticks.tick().await;
        let Some(manager) = manager.upgrade() else {
            return;
        };
        let stopped = manager.prune_idle().await;
        if !stopped.is_empty() {
            debug!(count = stopped.len(), "reaped idle streams");
        }
    }
}

/// Feed → pipeline: backfill first, then forward live updates until the feed
/// ends or the pipeline goes away. Feed faults become ERROR payloads.
async fn pump(
    feed: Arc<dyn CandleFeed>,
    key: WindowKey,
    limit: usize,
    tx: mpsc::Sender<PipelineCommand>,
) {
    let first = match feed.fetch_history(&key, limit).await {
        Ok(candles) => PipelineCommand::Backfill(candles),
        Err(e) => PipelineCommand::FeedFault(format!("history fetch failed: {e}")),
    };
    if tx.send(first).await.is_err() {
        return;
    }

    let mut live = match feed.subscribe_live(&key).await {
        Ok(live) => live,
        Err(e) => {
            let _ = tx
                .send(PipelineCommand::FeedFault(format!("live subscribe failed: {e}")))
                .await;
            return;
        }
    };

    while let Some(item) = live.recv().await {
        let command = match item {
            Ok(update) => PipelineCommand::Update(update),
            Err(e) => PipelineCommand::FeedFault(format!("live feed error: {e}")),
        };
        if tx.send(command).await.is_err() {
            debug!(%key, "pipeline gone, pump exiting");
            return;
        }
    }
    warn!(%key, "live feed ended");
}
