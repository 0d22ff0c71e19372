/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Top-level runner wiring storage, scheduler, processor and the optional
//! notification and taxonomy collaborators under one shutdown signal.
//!
//! ```rust,ignore
//! use quaestor::{QuaestorConfig, SyncRunner};
//!
//! let runner = SyncRunner::new("quaestor.db", sink, QuaestorConfig::default()).await?;
//! runner.start().await?;
//! // ...
//! runner.shutdown(Duration::from_secs(10)).await?;
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::QuaestorConfig;
use crate::dal::DAL;
use crate::database::Database;
use crate::dueness::DuenessRegistry;
use crate::error::{ProcessorError, RunnerError};
use crate::processor::SyncProcessor;
use crate::scheduler::RecurringScheduler;
use crate::sink::{ExpenseSink, TaxonomyCache, TaxonomyProvider};
use crate::transport::SyncNotifier;

/// Owns the engine's background loops and their shared shutdown signal.
pub struct SyncRunner {
    dal: DAL,
    config: QuaestorConfig,
    registry: Arc<DuenessRegistry>,
    processor: Arc<SyncProcessor>,
    notifier: Option<Arc<dyn SyncNotifier>>,
    taxonomy: Option<Arc<TaxonomyCache>>,
    shutdown_tx: watch::Sender<bool>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncRunner {
    /// Creates a runner against the given database.
    ///
    /// Opens the pool and applies migrations; a migration failure is fatal
    /// and surfaced as [`RunnerError::Initialization`].
    pub async fn new(
        database_url: &str,
        sink: Arc<dyn ExpenseSink>,
        config: QuaestorConfig,
    ) -> Result<Self, RunnerError> {
        let database = Database::new(database_url);
        database
            .run_migrations()
            .await
            .map_err(RunnerError::Initialization)?;

        let dal = DAL::new(database);
        let processor = Arc::new(SyncProcessor::new(dal.clone(), sink, &config));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            dal,
            config,
            registry: Arc::new(DuenessRegistry::standard()),
            processor,
            notifier: None,
            taxonomy: None,
            shutdown_tx,
            background: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the standard dueness registry (custom frequencies).
    pub fn with_registry(mut self, registry: Arc<DuenessRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Attaches the best-effort sync notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Attaches a taxonomy provider; its cache refreshes in the background.
    pub fn with_taxonomy(mut self, provider: Arc<dyn TaxonomyProvider>) -> Self {
        self.taxonomy = Some(Arc::new(TaxonomyCache::new(provider)));
        self
    }

    /// The runner's DAL (shared with user-facing collaborators).
    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    /// The taxonomy cache, when a provider was attached.
    pub fn taxonomy(&self) -> Option<&Arc<TaxonomyCache>> {
        self.taxonomy.as_ref()
    }

    /// A receiver on the runner's root shutdown signal, for wiring
    /// additional loops (e.g. a notice consume loop) to the same lifecycle.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Starts the processor and the scheduler (and the taxonomy refresh
    /// loop when configured).
    pub async fn start(&self) -> Result<(), RunnerError> {
        self.processor.start().await?;

        let mut scheduler = RecurringScheduler::new(
            self.dal.clone(),
            Arc::clone(&self.registry),
            self.config.scheduler_poll_interval(),
            self.config.max_sync_attempts(),
        );
        if let Some(notifier) = &self.notifier {
            scheduler = scheduler.with_notifier(Arc::clone(notifier));
        }

        let shutdown = self.shutdown_tx.subscribe();
        let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown).await });

        let mut background = self.background.lock();
        background.push(scheduler_handle);

        if let Some(cache) = &self.taxonomy {
            let cache = Arc::clone(cache);
            let interval = self.config.taxonomy_refresh_interval();
            let shutdown = self.shutdown_tx.subscribe();
            background.push(tokio::spawn(cache.run_refresh_loop(interval, shutdown)));
        }

        info!("Sync runner started");
        Ok(())
    }

    /// Signals shutdown and waits up to `grace` for every loop to finish.
    ///
    /// Work abandoned past the grace period is reclaimed by the stale
    /// processing reset on the next start.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RunnerError> {
        let _ = self.shutdown_tx.send(true);

        let processor_result = match self.processor.stop(grace).await {
            Ok(()) => Ok(()),
            // Tolerate shutdown before start.
            Err(ProcessorError::NotRunning) => Ok(()),
            Err(e) => Err(e),
        };

        let handles: Vec<JoinHandle<()>> = self.background.lock().drain(..).collect();
        let joined = tokio::time::timeout(grace, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("Background loops did not stop within the grace period");
        }

        info!("Sync runner stopped");
        processor_result.map_err(Into::into)
    }
}
