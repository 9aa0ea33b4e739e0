use std::time::Duration;

pub use crate::sdam::description::{server::ServerType, topology::TopologyType};
use crate::{
    bson::DateTime,
    hello::HelloCommandResponse,
    options::ServerAddress,
    sdam::description::server::ServerDescription,
    selection_criteria::TagSet,
};

/// A view of the most recently observed state of a single server.
pub struct ServerInfo<'a> {
    description: &'a ServerDescription,
}

impl<'a> ServerInfo<'a> {
    pub(crate) fn new(description: &'a ServerDescription) -> Self {
        Self { description }
    }

    fn command_response_getter<T>(
        &'a self,
        f: impl Fn(&'a HelloCommandResponse) -> Option<T>,
    ) -> Option<T> {
        self.description
            .reply
            .as_ref()
            .ok()
            .and_then(|reply| reply.as_ref().and_then(|r| f(&r.command_response)))
    }

    /// The address of this server.
    pub fn address(&self) -> &ServerAddress {
        &self.description.address
    }

    /// The round-trip time of this server's most recent `hello`, smoothed by an exponentially
    /// weighted moving average.
    pub fn average_round_trip_time(&self) -> Option<Duration> {
        self.description.average_round_trip_time
    }

    /// The time at which this server was last checked.
    pub fn last_update_time(&self) -> Option<DateTime> {
        self.description.last_update_time
    }

    /// The maximum wire protocol version this server supports.
    pub fn max_wire_version(&self) -> Option<i32> {
        self.command_response_getter(|r| r.max_wire_version)
    }

    /// The minimum wire protocol version this server supports.
    pub fn min_wire_version(&self) -> Option<i32> {
        self.command_response_getter(|r| r.min_wire_version)
    }

    /// The type of this server.
    pub fn server_type(&self) -> ServerType {
        self.description.server_type
    }

    /// The replica set config version this server reports, if any.
    pub fn set_version(&self) -> Option<i32> {
        self.command_response_getter(|r| r.set_version)
    }

    /// The replica set name this server belongs to, if any.
    pub fn set_name(&self) -> Option<&str> {
        self.command_response_getter(|r| r.set_name.as_ref().map(String::as_str))
    }

    /// The tags configured on this server.
    pub fn tags(&self) -> Option<&TagSet> {
        self.command_response_getter(|r| r.tags.as_ref())
    }
}
