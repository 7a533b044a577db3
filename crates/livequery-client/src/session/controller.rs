//! Default client session controller
//!
//! One controller caches at most one client. Construction is lazy and
//! coalesced: callers arriving while a construction is in flight await
//! the same attempt and receive clones of the same client. A failed
//! attempt is never cached, so the next caller starts fresh with the
//! settings of that moment. The cache also self-evicts when its client
//! is torn down, so the next caller gets a fresh client instead of a
//! closed one.

use crate::connection::client::{ClientConfig, ConnectionIdentity, LiveQueryClient};
use crate::session::url::resolve_server_url;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use livequery_common::{CurrentUser, SettingsStore, UserProvider};
use livequery_core::LiveQueryResult;
use parking_lot::Mutex;
use std::sync::Arc;

/// A construction attempt shared by every coalesced caller
type SharedConstruction = Shared<BoxFuture<'static, LiveQueryResult<Arc<LiveQueryClient>>>>;

/// Lazily constructs and caches the default LiveQuery client
pub struct LiveQueryController {
    settings: SettingsStore,
    users: Arc<dyn UserProvider>,
    client_config: ClientConfig,
    slot: Mutex<Option<SharedConstruction>>,
}

impl LiveQueryController {
    /// Create a controller with default client configuration
    pub fn new(settings: SettingsStore, users: Arc<dyn UserProvider>) -> Arc<Self> {
        Self::with_client_config(settings, users, ClientConfig::default())
    }

    /// Create a controller with custom client configuration
    pub fn with_client_config(
        settings: SettingsStore,
        users: Arc<dyn UserProvider>,
        client_config: ClientConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            users,
            client_config,
            slot: Mutex::new(None),
        })
    }

    /// Get the default client, constructing it on first use.
    ///
    /// Settings and the current user are read once per construction;
    /// later changes only affect clients built after the cache is
    /// cleared. Concurrent callers coalesce onto a single construction.
    ///
    /// # Errors
    /// Construction errors reach every coalesced caller; the failed
    /// attempt is not cached.
    pub async fn get_default_client(self: &Arc<Self>) -> LiveQueryResult<Arc<LiveQueryClient>> {
        let construction = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                // Pending and successful constructions are shared
                Some(existing) if !matches!(existing.peek(), Some(Err(_))) => existing.clone(),
                _ => {
                    let construction = Self::construct(
                        self.settings.clone(),
                        Arc::clone(&self.users),
                        self.client_config.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(construction.clone());
                    self.watch_for_teardown(construction.clone());
                    construction
                }
            }
        };
        construction.await
    }

    /// Drop the cached client, closing it if it was constructed.
    ///
    /// The next `get_default_client` builds a fresh client from the
    /// settings current at that point. Safe to call when nothing is
    /// cached.
    pub async fn clear_cached_default_client(&self) {
        let taken = self.slot.lock().take();
        if let Some(construction) = taken {
            // A still-pending construction completes for its waiters and
            // tears down once the last caller handle goes away; the
            // eviction watcher holds it weakly and cannot prolong it
            if let Some(Ok(client)) = construction.peek() {
                client.close().await;
            }
            tracing::debug!("Cached default client cleared");
        }
    }

    async fn construct(
        settings: SettingsStore,
        users: Arc<dyn UserProvider>,
        client_config: ClientConfig,
    ) -> LiveQueryResult<Arc<LiveQueryClient>> {
        let session_token = users
            .current_user()
            .await
            .and_then(CurrentUser::into_session_token);
        let snapshot = settings.snapshot();
        let server_url =
            resolve_server_url(snapshot.live_query_server_url.as_deref(), &snapshot.server_url)?;

        let identity = ConnectionIdentity {
            server_url,
            application_id: snapshot.application_id,
            javascript_key: snapshot.javascript_key,
            master_key: snapshot.master_key,
            session_token,
        };
        tracing::debug!(server_url = %identity.server_url, "Constructing default LiveQuery client");
        LiveQueryClient::with_config(identity, client_config)
    }

    /// Evict the cached client once its worker exits
    fn watch_for_teardown(self: &Arc<Self>, construction: SharedConstruction) {
        let controller = Arc::downgrade(self);
        tokio::spawn(async move {
            let client = match construction.await {
                Ok(client) => client,
                Err(_) => return,
            };
            // The state sender lives on the worker task; an error here
            // means the worker exited, even when that happened before
            // this task got its first poll.
            let mut states = client.state_changes();
            // Hold the client weakly across the wait; a strong handle
            // would keep the worker's command channel open after every
            // caller is gone.
            let weak = Arc::downgrade(&client);
            drop(client);
            while states.changed().await.is_ok() {}
            if let (Some(controller), Some(client)) = (controller.upgrade(), weak.upgrade()) {
                controller.evict(&client);
            }
        });
    }

    fn evict(&self, client: &Arc<LiveQueryClient>) {
        let mut slot = self.slot.lock();
        if let Some(construction) = slot.as_ref() {
            if let Some(Ok(cached)) = construction.peek() {
                if Arc::ptr_eq(cached, client) {
                    *slot = None;
                    tracing::debug!("Terminated default client evicted from cache");
                }
            }
        }
    }
}
