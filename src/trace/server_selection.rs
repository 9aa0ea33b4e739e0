use std::time::{Duration, Instant};

use bson::oid::ObjectId;

use crate::{
    error::Error,
    sdam::{SelectedServer, TopologyDescription},
    selection_criteria::SelectionCriteria,
    trace::{trace_or_log_enabled, TracingOrLogLevel, SERVER_SELECTION_TRACING_EVENT_TARGET},
};

/// Emits `tracing` events describing the progress of a single server-selection attempt, as driven
/// by [`Client::select_server`](crate::Client).
pub(crate) struct ServerSelectionTracingEventEmitter<'a> {
    topology_id: ObjectId,
    criteria: &'a SelectionCriteria,
    operation_name: &'a str,
    start_time: Instant,
    timeout: Duration,
}

impl<'a> ServerSelectionTracingEventEmitter<'a> {
    pub(crate) fn new(
        topology_id: ObjectId,
        criteria: &'a SelectionCriteria,
        operation_name: &'a str,
        start_time: Instant,
        timeout: Duration,
    ) -> Self {
        Self {
            topology_id,
            criteria,
            operation_name,
            start_time,
            timeout,
        }
    }

    fn enabled(&self, level: TracingOrLogLevel) -> bool {
        trace_or_log_enabled!(target: SERVER_SELECTION_TRACING_EVENT_TARGET, level)
    }

    pub(crate) fn emit_started_event(&self, topology_description: &TopologyDescription) {
        if !self.enabled(TracingOrLogLevel::Debug) {
            return;
        }
        tracing::debug!(
            target: SERVER_SELECTION_TRACING_EVENT_TARGET,
            topologyId = %self.topology_id,
            operation = self.operation_name,
            selector = ?self.criteria,
            topologyDescription = ?topology_description,
            "Server selection started",
        );
    }

    pub(crate) fn emit_waiting_event(&self, topology_description: &TopologyDescription) {
        if !self.enabled(TracingOrLogLevel::Info) {
            return;
        }
        tracing::info!(
            target: SERVER_SELECTION_TRACING_EVENT_TARGET,
            topologyId = %self.topology_id,
            operation = self.operation_name,
            remainingTimeMS = (self.timeout.saturating_sub(self.start_time.elapsed())).as_millis() as u64,
            topologyDescription = ?topology_description,
            "Waiting for suitable server to become available",
        );
    }

    pub(crate) fn emit_succeeded_event(
        &self,
        topology_description: &TopologyDescription,
        server: &SelectedServer,
    ) {
        if !self.enabled(TracingOrLogLevel::Debug) {
            return;
        }
        tracing::debug!(
            target: SERVER_SELECTION_TRACING_EVENT_TARGET,
            topologyId = %self.topology_id,
            operation = self.operation_name,
            durationMS = self.start_time.elapsed().as_millis() as u64,
            serverHost = server.address().to_string(),
            topologyDescription = ?topology_description,
            "Server selection succeeded",
        );
    }

    pub(crate) fn emit_failed_event(
        &self,
        topology_description: &TopologyDescription,
        error: &Error,
    ) {
        if !self.enabled(TracingOrLogLevel::Debug) {
            return;
        }
        tracing::debug!(
            target: SERVER_SELECTION_TRACING_EVENT_TARGET,
            topologyId = %self.topology_id,
            operation = self.operation_name,
            durationMS = self.start_time.elapsed().as_millis() as u64,
            failure = %error,
            topologyDescription = ?topology_description,
            "Server selection failed",
        );
    }
}
