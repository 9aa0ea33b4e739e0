use bson::{oid::ObjectId, Document};

use crate::{
    event::command::CommandEvent,
    trace::{trace_or_log_enabled, TracingOrLogLevel, COMMAND_TRACING_EVENT_TARGET},
};

/// Truncates `doc`'s extended-JSON representation to `max_length_bytes`, appending an ellipsis
/// marker if truncation occurred. A `None` limit disables truncation.
fn serialize_command_or_reply(doc: &Document, max_length_bytes: Option<usize>) -> String {
    let mut s = doc.to_string();
    if let Some(max) = max_length_bytes {
        if s.len() > max {
            s.truncate(max);
            s.push_str("...");
        }
    }
    s
}

/// Emits `tracing` events (or, without the `tracing` crate enabled for logging purposes, `log`
/// records) for each [`CommandEvent`] a [`Client`](crate::Client) generates.
pub(crate) struct CommandTracingEventEmitter {
    max_document_length_bytes: Option<usize>,
    topology_id: ObjectId,
}

impl CommandTracingEventEmitter {
    pub(crate) fn new(max_document_length_bytes: Option<usize>, topology_id: ObjectId) -> Self {
        Self {
            max_document_length_bytes,
            topology_id,
        }
    }

    pub(crate) fn handle(&self, event: CommandEvent) {
        if !trace_or_log_enabled!(target: COMMAND_TRACING_EVENT_TARGET, TracingOrLogLevel::Debug) {
            return;
        }

        match event {
            CommandEvent::Started(e) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    topologyId = %self.topology_id,
                    commandName = e.command_name,
                    requestId = e.request_id,
                    driverConnectionId = e.connection.id,
                    serverConnectionId = e.connection.server_id,
                    serverHost = e.connection.address.to_string(),
                    command = serialize_command_or_reply(&e.command, self.max_document_length_bytes),
                    "Command started",
                );
            }
            CommandEvent::Succeeded(e) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    topologyId = %self.topology_id,
                    commandName = e.command_name,
                    requestId = e.request_id,
                    driverConnectionId = e.connection.id,
                    serverConnectionId = e.connection.server_id,
                    serverHost = e.connection.address.to_string(),
                    durationMS = e.duration.as_millis() as u64,
                    reply = serialize_command_or_reply(&e.reply, self.max_document_length_bytes),
                    "Command succeeded",
                );
            }
            CommandEvent::Failed(e) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    topologyId = %self.topology_id,
                    commandName = e.command_name,
                    requestId = e.request_id,
                    driverConnectionId = e.connection.id,
                    serverConnectionId = e.connection.server_id,
                    serverHost = e.connection.address.to_string(),
                    durationMS = e.duration.as_millis() as u64,
                    failure = %e.failure,
                    "Command failed",
                );
            }
        }
    }
}
