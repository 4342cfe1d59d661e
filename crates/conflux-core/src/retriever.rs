//! The configuration retriever: scan scheduling, coalescing, caching,
//! change notification
//!
//! A single coordinator task owns the providers and the scan state machine.
//! Scans are triggered by a periodic timer and by [`ConfigRetriever::get_config`]
//! calls; while a scan is in flight every further trigger is satisfied by
//! that same scan's outcome, so at most one retrieval pipeline runs at a
//! time per retriever.

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::events::{ConfigChange, Listener, ListenerHandle, ListenerRegistry};
use crate::merge::{deep_merge, empty_tree, is_empty_tree};
use crate::options::RetrieverOptions;
use crate::processor::ProcessorRegistry;
use crate::provider::ConfigProvider;
use crate::store::StoreRegistry;
use crate::{ConfigError, Result};

/// Post-merge transform applied to every merged snapshot before caching
pub type ConfigTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Hook invoked before each scan starts
pub type BeforeScanHook = Arc<dyn Fn() + Send + Sync>;

type ScanOutcome = Result<Value>;
type ScanFuture = Pin<Box<dyn Future<Output = ScanOutcome> + Send>>;

enum Command {
    Scan(oneshot::Sender<ScanOutcome>),
    Close(oneshot::Sender<()>),
}

/// Builder for [`ConfigRetriever`]
pub struct ConfigRetrieverBuilder {
    options: RetrieverOptions,
    stores: StoreRegistry,
    processors: ProcessorRegistry,
    transform: Option<ConfigTransform>,
    before_scan: Option<BeforeScanHook>,
}

impl ConfigRetrieverBuilder {
    /// Create a builder with default registries and options
    pub fn new() -> Self {
        Self {
            options: RetrieverOptions::default(),
            stores: StoreRegistry::with_defaults(),
            processors: ProcessorRegistry::with_defaults(),
            transform: None,
            before_scan: None,
        }
    }

    /// Replace the retriever options
    pub fn with_options(mut self, options: RetrieverOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a store descriptor; order defines merge precedence
    pub fn add_store(mut self, store: crate::StoreOptions) -> Self {
        self.options.stores.push(store);
        self
    }

    /// Set the period between automatic scans; zero disables the timer
    pub fn scan_period(mut self, period: Duration) -> Self {
        self.options.scan_period = period;
        self
    }

    /// Replace the store registry
    pub fn store_registry(mut self, registry: StoreRegistry) -> Self {
        self.stores = registry;
        self
    }

    /// Replace the processor registry
    pub fn processor_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.processors = registry;
        self
    }

    /// Apply a transform to every merged snapshot before it is cached
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Invoke a hook before each scan starts
    pub fn with_before_scan<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.before_scan = Some(Arc::new(hook));
        self
    }

    /// Resolve every descriptor and start the retriever
    ///
    /// Fails synchronously when a descriptor names an unknown store type or
    /// format. Must be called within a Tokio runtime: the scan coordinator
    /// is spawned here.
    pub fn build(self) -> Result<ConfigRetriever> {
        let mut providers = Vec::new();
        for descriptor in self.options.effective_stores() {
            // Resolve the processor first so no store is created for a
            // descriptor that cannot be fully resolved.
            let processor = self.processors.get(&descriptor.effective_format())?;
            let store =
                self.stores
                    .create(&descriptor.store_type, &descriptor.config, &self.processors)?;
            providers.push(ConfigProvider::new(
                descriptor.store_type.clone(),
                store,
                processor,
                descriptor.config.clone(),
                descriptor.optional,
            ));
        }
        info!(
            sources = providers.len(),
            scan_period_ms = self.options.scan_period.as_millis() as u64,
            "starting configuration retriever"
        );

        let cached = Arc::new(ArcSwap::from_pointee(empty_tree()));
        let listeners = ListenerRegistry::new();
        let (change_tx, _) = broadcast::channel(16);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let coordinator = Coordinator {
            providers: Arc::new(providers),
            cached: Arc::clone(&cached),
            listeners: listeners.clone(),
            change_tx: change_tx.clone(),
            transform: self.transform,
            before_scan: self.before_scan,
        };
        tokio::spawn(coordinator.run(cmd_rx, self.options.scan_period));

        Ok(ConfigRetriever {
            cmd_tx,
            cached,
            listeners,
            change_tx: Mutex::new(Some(change_tx)),
            closed: AtomicBool::new(false),
        })
    }
}

impl Default for ConfigRetrieverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Live view over an ordered list of configuration sources
///
/// See the crate docs for the overall control flow. All methods are safe to
/// call from any task; the retriever owns its coordinator and stores.
pub struct ConfigRetriever {
    cmd_tx: mpsc::Sender<Command>,
    cached: Arc<ArcSwap<Value>>,
    listeners: ListenerRegistry,
    /// Dropped at close so stream subscribers observe the end
    change_tx: Mutex<Option<broadcast::Sender<Value>>>,
    closed: AtomicBool,
}

impl ConfigRetriever {
    /// Create a builder
    pub fn builder() -> ConfigRetrieverBuilder {
        ConfigRetrieverBuilder::new()
    }

    /// Create a retriever from options, with the default registries
    pub fn create(options: RetrieverOptions) -> Result<Self> {
        Self::builder().with_options(options).build()
    }

    /// Retrieve the current configuration
    ///
    /// Triggers a scan, or joins the scan already in flight; every caller
    /// waiting on the same scan receives the same outcome. On success the
    /// merged tree is returned whether or not it differs from the cached
    /// snapshot.
    pub async fn get_config(&self) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConfigError::Closed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Scan(reply_tx))
            .await
            .map_err(|_| ConfigError::Closed)?;
        reply_rx.await.map_err(|_| ConfigError::Closed)?
    }

    /// The last successfully merged snapshot, or an empty tree if no scan
    /// has ever succeeded
    ///
    /// Never triggers a scan and never fails; usable even after close.
    pub fn get_cached_config(&self) -> Value {
        Value::clone(&self.cached.load())
    }

    /// Register a change listener
    ///
    /// Listeners are invoked in registration order, after the cache has been
    /// updated to the new snapshot. The returned handle unregisters the
    /// listener.
    pub fn on_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener) as Listener)
    }

    /// A continuous view of the configuration
    ///
    /// Emits the current snapshot first (when non-empty), then the merged
    /// tree after each detected change. The stream ends when the retriever
    /// is closed. A subscriber that falls behind skips to the most recent
    /// snapshots rather than observing every intermediate one.
    pub fn stream(&self) -> impl Stream<Item = Value> + Send + 'static {
        // Subscribe before reading the cache so a change landing in between
        // is received rather than skipped; when the cache read already saw
        // that change, the broadcast copy is an echo of the head and gets
        // dropped by the filter below.
        let receiver = match &*self.change_tx.lock().expect("change sender poisoned") {
            Some(sender) => sender.subscribe(),
            // Already closed: a receiver whose sender is gone ends at once.
            None => broadcast::channel(1).1,
        };
        let head = {
            let current = self.get_cached_config();
            if is_empty_tree(&current) { None } else { Some(current) }
        };
        let tail = BroadcastStream::new(receiver).filter_map(skip_head_echo(head.clone()));
        tokio_stream::iter(head).chain(tail)
    }

    /// Tear the retriever down
    ///
    /// Idempotent. Stops the periodic timer, lets an in-flight scan finish
    /// (its result is discarded), fails pending [`get_config`] callers,
    /// closes every store exactly once, and ends all streams. The cached
    /// snapshot remains readable.
    ///
    /// [`get_config`]: ConfigRetriever::get_config
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Drop our copy of the change sender; the coordinator drops the
        // other when it exits, which terminates the streams.
        self.change_tx.lock().expect("change sender poisoned").take();

        let (done_tx, done_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
        info!("configuration retriever closed");
    }
}

impl std::fmt::Debug for ConfigRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRetriever")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Owner of the scan state machine
///
/// The cache and scan state are only ever mutated here, on the single
/// coordination path; external callers read the cache through `ArcSwap`
/// without blocking a scan in progress.
struct Coordinator {
    providers: Arc<Vec<ConfigProvider>>,
    cached: Arc<ArcSwap<Value>>,
    listeners: ListenerRegistry,
    change_tx: broadcast::Sender<Value>,
    transform: Option<ConfigTransform>,
    before_scan: Option<BeforeScanHook>,
}

impl Coordinator {
    async fn run(self, mut commands: mpsc::Receiver<Command>, period: Duration) {
        let mut timer = (period > Duration::ZERO).then(|| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        let mut in_flight: Option<ScanFuture> = None;
        let mut waiters: Vec<oneshot::Sender<ScanOutcome>> = Vec::new();

        loop {
            tokio::select! {
                _ = tick(timer.as_mut()) => {
                    // A scan already in flight stands in for this trigger.
                    if in_flight.is_none() {
                        in_flight = Some(self.start_scan());
                    }
                }
                outcome = poll_scan(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    self.finish_scan(outcome, &mut waiters);
                }
                command = commands.recv() => match command {
                    Some(Command::Scan(reply)) => {
                        waiters.push(reply);
                        if in_flight.is_none() {
                            in_flight = Some(self.start_scan());
                        }
                    }
                    Some(Command::Close(done)) => {
                        self.shutdown(in_flight.take(), waiters).await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        // Retriever dropped without an explicit close.
                        self.shutdown(in_flight.take(), waiters).await;
                        return;
                    }
                },
            }
        }
    }

    /// Start the retrieval pipeline for one scan
    ///
    /// Providers are queried concurrently; the fold happens in descriptor
    /// order once every per-source outcome is in, so merge precedence never
    /// depends on completion order.
    fn start_scan(&self) -> ScanFuture {
        if let Some(hook) = &self.before_scan {
            hook();
        }
        debug!(sources = self.providers.len(), "starting configuration scan");
        let providers = Arc::clone(&self.providers);
        let transform = self.transform.clone();
        Box::pin(async move {
            let outcomes = join_all(providers.iter().map(ConfigProvider::get)).await;
            let mut merged = empty_tree();
            for outcome in outcomes {
                deep_merge(&mut merged, outcome?);
            }
            Ok(match transform {
                Some(transform) => transform(merged),
                None => merged,
            })
        })
    }

    /// Apply a completed scan: update the cache, detect the change, notify,
    /// and resolve every coalesced waiter with the same outcome
    fn finish_scan(&self, outcome: ScanOutcome, waiters: &mut Vec<oneshot::Sender<ScanOutcome>>) {
        match outcome {
            Ok(snapshot) => {
                let previous = self.cached.load_full();
                let changed = *previous != snapshot;
                if changed {
                    // The cache must hold the new snapshot before anyone is
                    // notified of it.
                    self.cached.store(Arc::new(snapshot.clone()));
                    debug!("configuration changed, notifying listeners");
                    let change = ConfigChange::new(Value::clone(&previous), snapshot.clone());
                    self.listeners.notify(&change);
                    if self.change_tx.send(snapshot.clone()).is_err() {
                        debug!("no active configuration stream subscribers");
                    }
                } else {
                    debug!("configuration unchanged");
                }
                for waiter in waiters.drain(..) {
                    let _ = waiter.send(Ok(snapshot.clone()));
                }
            }
            Err(error) => {
                error!("configuration scan failed: {error}");
                for waiter in waiters.drain(..) {
                    let _ = waiter.send(Err(error.clone()));
                }
            }
        }
    }

    /// Teardown: discard the in-flight scan, fail pending waiters, close
    /// every store exactly once
    async fn shutdown(
        &self,
        in_flight: Option<ScanFuture>,
        waiters: Vec<oneshot::Sender<ScanOutcome>>,
    ) {
        if let Some(scan) = in_flight {
            // Let the pipeline run to completion; its result is discarded.
            let _ = scan.await;
        }
        for waiter in waiters {
            let _ = waiter.send(Err(ConfigError::Closed));
        }
        for provider in self.providers.iter() {
            provider.close().await;
            debug!(store = provider.name(), "store closed");
        }
        self.listeners.clear();
    }
}

/// Filter for [`ConfigRetriever::stream`] dropping the first broadcast item
/// when it repeats the head snapshot the stream already emitted
///
/// Broadcasts only carry changed trees, so a first item equal to the head
/// can only be the change that raced the subscription and was also observed
/// by the cache read. Every later item passes through untouched.
fn skip_head_echo(
    mut head: Option<Value>,
) -> impl FnMut(std::result::Result<Value, BroadcastStreamRecvError>) -> Option<Value> {
    move |item| {
        let item = item.ok()?;
        if head.take().is_some_and(|previous| previous == item) {
            return None;
        }
        Some(item)
    }
}

async fn tick(timer: Option<&mut Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn poll_scan(in_flight: Option<&mut ScanFuture>) -> ScanOutcome {
    match in_flight {
        Some(scan) => scan.as_mut().await,
        None => std::future::pending().await,
    }
}
