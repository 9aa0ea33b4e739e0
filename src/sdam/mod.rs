mod description;
mod message_manager;
mod monitor;
pub mod public;
mod server;
mod srv_polling;
mod topology;

pub use self::public::{ServerInfo, ServerType, TopologyType};

pub(crate) use self::{
    description::{
        server::{ServerDescription, TopologyVersion},
        topology::{
            choose_n,
            server_selection,
            server_selection::SelectedServer,
            TopologyDescription,
            TransactionSupportStatus,
        },
    },
    message_manager::TopologyMessageManager,
    monitor::{DEFAULT_HEARTBEAT_FREQUENCY, MIN_HEARTBEAT_FREQUENCY},
    server::Server,
    topology::{
        BroadcastMessage,
        HandshakePhase,
        SdamEventEmitter,
        Topology,
        TopologyCheckRequestReceiver,
        TopologyUpdater,
        TopologyWatcher,
    },
};
pub(crate) use description::topology::verify_max_staleness;
