use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::watch;

use super::{
    description::{
        server::ServerDescription,
        topology::{
            server_selection::{self, SelectedServer},
            TopologyDescription,
            TopologyType,
        },
    },
    message_manager::{TopologyMessageManager, TopologyMessageSubscriber},
    monitor::Monitor,
    server::Server,
    srv_polling::SrvPollingMonitor,
};
use crate::{
    bson::oid::ObjectId,
    client::session::ClusterTime,
    cmap::{
        establish::{ConnectionEstablisher, EstablisherOptions},
        Connection,
        ConnectionGeneration,
        PoolGeneration,
    },
    error::{Error, Result},
    event::{
        sdam::{
            SdamEvent,
            ServerClosedEvent,
            ServerOpeningEvent,
            TopologyClosedEvent,
            TopologyDescriptionChangedEvent,
            TopologyOpeningEvent,
        },
        EventHandler,
    },
    options::{ClientOptions, ServerAddress},
    selection_criteria::SelectionCriteria,
};

/// The point in the connection handshake at which an application error occurred. Used to decide
/// whether the error is stale relative to the pool's current generation.
#[derive(Debug, Clone)]
pub(crate) enum HandshakePhase {
    /// The error happened before a connection's `hello` completed; only the pool generation at
    /// the time the connection was checked out is known.
    PreHello { generation: PoolGeneration },

    /// The error happened while establishing the connection, after a generation had been
    /// assigned to it.
    PostHello { generation: ConnectionGeneration },

    /// The error happened on an already-established connection, outside of the handshake.
    AfterCompletion {
        generation: ConnectionGeneration,
        wire_version: Option<i32>,
    },
}

impl HandshakePhase {
    pub(crate) fn after_completion(connection: &Connection) -> Self {
        Self::AfterCompletion {
            generation: connection.generation,
            wire_version: connection
                .stream_description()
                .ok()
                .and_then(|sd| sd.max_wire_version),
        }
    }

    fn is_stale(&self, current_generation: &PoolGeneration) -> bool {
        match self {
            Self::PreHello { generation } => match (generation, current_generation) {
                (PoolGeneration::Normal(g1), PoolGeneration::Normal(g2)) => g1 < g2,
                (PoolGeneration::LoadBalanced(_), PoolGeneration::LoadBalanced(_)) => false,
                _ => true,
            },
            Self::PostHello { generation } | Self::AfterCompletion { generation, .. } => {
                generation.is_stale(current_generation)
            }
        }
    }

    fn wire_version(&self) -> Option<i32> {
        match self {
            Self::AfterCompletion { wire_version, .. } => *wire_version,
            _ => None,
        }
    }
}

/// A message broadcast from the topology to every server's connection pool worker.
#[derive(Debug, Clone)]
pub(crate) enum BroadcastMessage {
    /// The client is being dropped; the pool should stop accepting new connections.
    Shutdown,

    /// Proactively establish connections up to `min_pool_size`.
    FillPool,

    /// Block until the worker has processed all messages sent before this one.
    #[cfg(test)]
    SyncWorkers,
}

/// Emits [`SdamEvent`]s to a registered handler, if any.
#[derive(Clone)]
pub(crate) struct SdamEventEmitter {
    handler: Option<Arc<EventHandler<SdamEvent>>>,
    topology_id: ObjectId,
}

impl SdamEventEmitter {
    pub(crate) fn new(handler: Option<EventHandler<SdamEvent>>, topology_id: ObjectId) -> Self {
        Self {
            handler: handler.map(Arc::new),
            topology_id,
        }
    }

    pub(crate) fn topology_id(&self) -> ObjectId {
        self.topology_id
    }

    pub(crate) async fn emit(&self, event: SdamEvent) {
        if let Some(ref handler) = self.handler {
            handler.handle(event);
        }
    }
}

/// A snapshot of the topology: its description along with live handles to each known server.
#[derive(Clone)]
pub(crate) struct TopologyState {
    pub(crate) description: TopologyDescription,
    servers: HashMap<ServerAddress, Arc<Server>>,
}

impl TopologyState {
    pub(crate) fn servers(&self) -> &HashMap<ServerAddress, Arc<Server>> {
        &self.servers
    }
}

struct Shared {
    sender: watch::Sender<TopologyState>,
    message_manager: TopologyMessageManager,
    is_alive: AtomicBool,
    options: ClientOptions,
    sdam_event_emitter: Option<SdamEventEmitter>,
    connection_establisher: ConnectionEstablisher,
    id: ObjectId,
}

/// A cloneable handle to a topology's live state; used by operations to read the current
/// description and to wait for changes to it.
#[derive(Clone)]
pub(crate) struct TopologyWatcher {
    receiver: watch::Receiver<TopologyState>,
    shared: Arc<Shared>,
}

impl TopologyWatcher {
    /// Returns the most recently observed state, marking it as seen.
    pub(crate) fn observe_latest(&mut self) -> TopologyState {
        self.receiver.borrow_and_update().clone()
    }

    /// Returns the most recently observed state without marking it as seen.
    pub(crate) fn peek_latest(&self) -> TopologyState {
        self.receiver.borrow().clone()
    }

    pub(crate) fn topology_type(&self) -> TopologyType {
        self.receiver.borrow().description.topology_type()
    }

    pub(crate) fn server_description(&self, address: &ServerAddress) -> Option<ServerDescription> {
        self.receiver
            .borrow()
            .description
            .get_server_description(address)
            .cloned()
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.shared.is_alive.load(Ordering::SeqCst)
    }

    /// Tells the SDAM background tasks to check the topology immediately.
    pub(crate) fn request_immediate_check(&self) {
        self.shared.message_manager.request_topology_check();
    }

    /// Waits until either a topology change is observed or `timeout` elapses. Returns whether a
    /// change occurred.
    pub(crate) async fn wait_for_update(&mut self, timeout: std::time::Duration) -> bool {
        let mut subscriber = self.shared.message_manager.subscribe_to_topology_changes();
        tokio::select! {
            result = self.receiver.changed() => result.is_ok(),
            changed = subscriber.wait_for_message(timeout) => changed,
        }
    }
}

/// Receives requests for a server's monitor to check it immediately rather than waiting out the
/// rest of the heartbeat interval.
pub(crate) struct TopologyCheckRequestReceiver {
    subscriber: TopologyMessageSubscriber,
}

impl TopologyCheckRequestReceiver {
    fn new(subscriber: TopologyMessageSubscriber) -> Self {
        Self { subscriber }
    }

    /// Waits for either a check request or `timeout` to elapse.
    pub(crate) async fn wait_for_check_request(&mut self, timeout: std::time::Duration) {
        self.subscriber.wait_for_message(timeout).await;
    }

    /// Drains any check requests queued up before a heartbeat started, so a request made during
    /// the heartbeat isn't immediately (and redundantly) satisfied by it.
    pub(crate) fn clear_check_requests(&mut self) {
        // the underlying broadcast channel only retains its single latest message, so there is
        // nothing to drain; this exists to make the monitor's intent explicit at the call site.
    }
}

/// A cloneable handle used by monitors and operations to report the results of checks and
/// application errors back into the topology.
#[derive(Clone)]
pub(crate) struct TopologyUpdater {
    shared: Arc<Shared>,
}

impl TopologyUpdater {
    /// Builds a standalone updater/watcher pair backed by a single-node topology, for use in
    /// tests that need a working `TopologyUpdater` but don't exercise SDAM directly.
    #[cfg(test)]
    pub(crate) fn channel() -> (Self, TopologyWatcher) {
        let mut options = ClientOptions::builder()
            .hosts(vec![ServerAddress::parse("localhost:27017").unwrap()])
            .build();
        options.test_options_mut().disable_monitoring_threads = true;
        let topology = Topology::new(options).expect("failed to build mock topology");
        (topology.updater(), topology.watch())
    }

    /// Applies a new server description, returning whether the topology changed as a result.
    pub(crate) async fn update(&self, server_description: ServerDescription) -> bool {
        self.update_with(move |state| state.description.update(server_description).is_ok())
            .await
    }

    /// Updates the set of hosts in the topology.
    pub(crate) async fn sync_hosts(&self, hosts: HashSet<ServerAddress>) -> bool {
        self.update_with(move |state| {
            state.description.sync_hosts(hosts);
            true
        })
        .await
    }

    pub(crate) async fn advance_cluster_time(&self, cluster_time: &ClusterTime) {
        let cluster_time = cluster_time.clone();
        self.update_with(move |state| {
            state.description.advance_cluster_time(&cluster_time);
            false
        })
        .await;
    }

    /// Marks the given server unknown due to an error observed by its heartbeat monitor.
    pub(crate) async fn handle_monitor_error(&self, address: ServerAddress, error: Error) -> bool {
        let updated = self.mark_server_unknown(&address, &error).await;
        if updated {
            if let Some(server) = self.server(&address) {
                server.pool.clear(error, None).await;
            }
        }
        updated
    }

    /// Processes an error observed by an application operation, marking the server unknown and
    /// clearing its pool if the error indicates the server's state has changed.
    pub(crate) async fn handle_application_error(
        &self,
        address: ServerAddress,
        error: Error,
        handshake: HandshakePhase,
    ) -> bool {
        let is_load_balanced = self.shared.sender.borrow().description.topology_type()
            == TopologyType::LoadBalanced;

        let current_generation = match self.server(&address) {
            Some(server) => server.pool.generation(),
            None => return false,
        };

        if handshake.is_stale(&current_generation) {
            return false;
        }

        let should_clear = if error.is_state_change_error() {
            self.request_immediate_check();
            error.is_shutting_down() || handshake.wire_version().unwrap_or(i32::MAX) < 8
        } else if error.is_non_timeout_network_error()
            || (!matches!(handshake, HandshakePhase::AfterCompletion { .. })
                && (error.is_auth_error() || error.is_network_timeout()))
        {
            true
        } else {
            return false;
        };

        let updated = if is_load_balanced {
            true
        } else {
            self.mark_server_unknown(&address, &error).await
        };
        if updated && should_clear {
            if let Some(server) = self.server(&address) {
                server.pool.clear(error, None).await;
            }
        }
        updated
    }

    async fn mark_server_unknown(&self, address: &ServerAddress, error: &Error) -> bool {
        let description = ServerDescription::new_from_error(address.clone(), error.clone());
        self.update_with(move |state| state.description.update(description).is_ok())
            .await
    }

    fn server(&self, address: &ServerAddress) -> Option<Arc<Server>> {
        self.shared.sender.borrow().servers().get(address).cloned()
    }

    fn request_immediate_check(&self) {
        self.shared.message_manager.request_topology_check();
    }

    fn insert_server(&self, address: ServerAddress, server: Arc<Server>) {
        self.shared.sender.send_modify(|state| {
            state.servers.insert(address, server);
        });
    }

    async fn update_with(&self, f: impl FnOnce(&mut TopologyState) -> bool) -> bool {
        let previous_description = self.shared.sender.borrow().description.clone();

        let mut changed = false;
        self.shared.sender.send_if_modified(|state| {
            changed = f(state);
            changed
        });

        if changed {
            let new_description = self.shared.sender.borrow().description.clone();
            if let Some(ref emitter) = self.shared.sdam_event_emitter {
                emitter
                    .emit(SdamEvent::TopologyDescriptionChanged(Box::new(
                        TopologyDescriptionChangedEvent {
                            topology_id: self.shared.id,
                            previous_description: previous_description.into(),
                            new_description: new_description.into(),
                        },
                    )))
                    .await;
            }
            self.shared.message_manager.notify_topology_changed();
        }

        changed
    }
}

/// A handle to a client's topology: the set of known servers and the background monitoring tasks
/// that keep that knowledge up to date.
#[derive(Clone)]
pub(crate) struct Topology {
    pub(crate) id: ObjectId,
    watcher: TopologyWatcher,
    updater: TopologyUpdater,
}

impl Topology {
    pub(crate) fn new(options: ClientOptions) -> Result<Self> {
        let id = ObjectId::new();

        let mut description = TopologyDescription::default();
        description.initialize(&options);
        let is_load_balanced = description.topology_type() == TopologyType::LoadBalanced;

        if let Some(ref handler) = options.sdam_event_handler {
            handler.handle(TopologyOpeningEvent { topology_id: id });
            for address in &options.hosts {
                handler.handle(ServerOpeningEvent {
                    address: address.clone(),
                    topology_id: id,
                });
            }
        }

        let connection_establisher =
            ConnectionEstablisher::new(EstablisherOptions::from_client_options(&options))?;

        let (sender, receiver) = watch::channel(TopologyState {
            description,
            servers: HashMap::new(),
        });

        let shared = Arc::new(Shared {
            sender,
            message_manager: TopologyMessageManager::new(),
            is_alive: AtomicBool::new(true),
            sdam_event_emitter: options
                .sdam_event_handler
                .clone()
                .map(|h| SdamEventEmitter::new(Some(h), id)),
            options: options.clone(),
            connection_establisher,
            id,
        });

        let watcher = TopologyWatcher {
            receiver,
            shared: shared.clone(),
        };
        let updater = TopologyUpdater { shared };

        let topology = Self {
            id,
            watcher,
            updater,
        };

        let disable_monitoring_threads = options
            .test_options
            .as_ref()
            .map(|t| t.disable_monitoring_threads)
            .unwrap_or(false);

        for address in options.hosts.iter() {
            topology.add_server(address.clone(), is_load_balanced, disable_monitoring_threads);
        }

        if !is_load_balanced && !disable_monitoring_threads {
            SrvPollingMonitor::start(topology.updater.clone(), topology.watcher.clone(), options);
        }

        Ok(topology)
    }

    fn add_server(&self, address: ServerAddress, is_load_balanced: bool, disable_monitoring_threads: bool) {
        let server = Server::new(
            address.clone(),
            self.updater.shared.options.clone(),
            self.updater.shared.connection_establisher.clone(),
            self.updater.clone(),
            self.id,
        );
        self.updater.insert_server(address.clone(), server);

        if is_load_balanced {
            let mut description = ServerDescription::new(address);
            description.server_type = super::ServerType::LoadBalancer;
            self.updater.insert_server_description(description);
        } else if !disable_monitoring_threads {
            let check_subscriber = TopologyCheckRequestReceiver::new(
                self.updater
                    .shared
                    .message_manager
                    .subscribe_to_topology_check_requests(),
            );
            Monitor::start(
                address,
                self.updater.clone(),
                self.watcher.clone(),
                self.updater.shared.sdam_event_emitter.clone(),
                check_subscriber,
                self.updater.shared.options.clone(),
            );
        }
    }

    pub(crate) fn watch(&self) -> TopologyWatcher {
        self.watcher.clone()
    }

    pub(crate) fn logical_session_timeout(&self) -> Option<std::time::Duration> {
        self.watcher.peek_latest().description.logical_session_timeout
    }

    pub(crate) fn updater(&self) -> TopologyUpdater {
        self.updater.clone()
    }

    pub(crate) fn cluster_time(&self) -> Option<ClusterTime> {
        self.watcher.peek_latest().description.cluster_time().cloned()
    }

    pub(crate) fn topology_type(&self) -> TopologyType {
        self.watcher.topology_type()
    }

    pub(crate) fn transaction_support_status(&self) -> super::TransactionSupportStatus {
        self.watcher.peek_latest().description.transaction_support_status()
    }

    pub(crate) fn update_command_with_read_pref(
        &self,
        address: &ServerAddress,
        command: &mut crate::cmap::Command,
        criteria: Option<&SelectionCriteria>,
    ) {
        self.watcher
            .peek_latest()
            .description
            .update_command_with_read_pref(address, command, criteria);
    }

    /// Proactively establishes connections on every server's pool, up to `min_pool_size`.
    pub(crate) async fn warm_pool(&self) {
        let state = self.watcher.peek_latest();
        let receivers: Vec<_> = state
            .servers()
            .values()
            .map(|server| server.pool.broadcast(BroadcastMessage::FillPool))
            .collect();
        for receiver in receivers {
            receiver.wait_for_acknowledgment().await;
        }
    }

    pub(crate) async fn handle_application_error(
        &self,
        address: ServerAddress,
        error: Error,
        handshake: HandshakePhase,
    ) -> bool {
        self.updater
            .handle_application_error(address, error, handshake)
            .await
    }

    /// Attempts to select a server matching the given criteria from the current topology state.
    pub(crate) fn attempt_to_select_server(
        &self,
        criteria: &SelectionCriteria,
        deprioritized: Option<&ServerAddress>,
    ) -> Result<Option<SelectedServer>> {
        let state = self.watcher.peek_latest();
        server_selection::attempt_to_select_server(
            criteria,
            &state.description,
            state.servers(),
            deprioritized,
        )
    }

    /// Stops all background monitoring and tears down every server's connection pool.
    pub(crate) async fn shutdown(&self) {
        self.updater.shared.is_alive.store(false, Ordering::SeqCst);
        self.updater.shared.message_manager.notify_topology_changed();
        self.updater
            .shared
            .message_manager
            .request_topology_check();

        let state = self.watcher.peek_latest();
        let receivers: Vec<_> = state
            .servers()
            .values()
            .map(|server| server.pool.broadcast(BroadcastMessage::Shutdown))
            .collect();
        for receiver in receivers {
            receiver.wait_for_acknowledgment().await;
        }

        if let Some(ref handler) = self.updater.shared.options.sdam_event_handler {
            for address in state.description.server_addresses() {
                handler.handle(ServerClosedEvent {
                    address: address.clone(),
                    topology_id: self.id,
                });
            }
            handler.handle(TopologyClosedEvent {
                topology_id: self.id,
            });
        }
    }

    #[cfg(test)]
    pub(crate) async fn sync_workers(&self) {
        let state = self.watcher.peek_latest();
        for server in state.servers().values() {
            let rx = server.pool.broadcast(BroadcastMessage::SyncWorkers);
            rx.wait_for_acknowledgment().await;
        }
    }
}

impl TopologyUpdater {
    fn insert_server_description(&self, description: ServerDescription) {
        self.shared.sender.send_modify(|state| {
            let _ = state.description.update(description);
        });
    }
}
