use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use xds_core::metrics::Recorder;
use xds_core::strng::{RichStrng, Strng};

pub struct Metrics {
	resource_updates: Family<ResourceUpdateLabel, Counter>,
	deletions_ignored: Family<TypeUrlLabel, Counter>,
	stream_failures: Family<ServerLabel, Counter>,
	server_transitions: Family<ServerTransitionLabel, Counter>,
}

#[derive(Clone, Hash, Debug, PartialEq, Eq, EncodeLabelSet)]
pub struct ResourceUpdateLabel {
	pub type_url: RichStrng,
	pub signal: UpdateSignal,
}

#[derive(Copy, Clone, Hash, Debug, PartialEq, Eq, EncodeLabelValue)]
pub enum UpdateSignal {
	Ack,
	Nack,
}

#[derive(Clone, Hash, Debug, PartialEq, Eq, EncodeLabelSet)]
pub struct TypeUrlLabel {
	pub type_url: RichStrng,
}

#[derive(Clone, Hash, Debug, PartialEq, Eq, EncodeLabelSet)]
pub struct ServerLabel {
	pub server: RichStrng,
}

#[derive(Clone, Hash, Debug, PartialEq, Eq, EncodeLabelSet)]
pub struct ServerTransitionLabel {
	pub kind: ServerTransitionKind,
}

#[derive(Copy, Clone, Hash, Debug, PartialEq, Eq, EncodeLabelValue)]
pub enum ServerTransitionKind {
	Fallback,
	Revert,
}

/// An update batch entry was applied (ACK) or rejected (NACK) for a resource.
pub struct UpdateEvent {
	pub type_url: Strng,
	pub signal: UpdateSignal,
}

/// A SotW response omitted a cached resource and the server asked us to ignore
/// the deletion.
pub struct DeletionIgnoredEvent {
	pub type_url: Strng,
}

/// An ADS stream failure was surfaced to watchers.
pub struct StreamFailureEvent {
	pub server: Strng,
}

impl Metrics {
	pub fn new(registry: &mut Registry) -> Self {
		let resource_updates = Family::default();
		registry.register(
			"resource_updates",
			"The total number of resource updates applied or rejected (unstable)",
			resource_updates.clone(),
		);

		let deletions_ignored = Family::default();
		registry.register(
			"resource_deletions_ignored",
			"The total number of resource deletions ignored by server request (unstable)",
			deletions_ignored.clone(),
		);

		let stream_failures = Family::default();
		registry.register(
			"stream_failures",
			"The total number of ads stream failures surfaced to watchers (unstable)",
			stream_failures.clone(),
		);

		let server_transitions = Family::default();
		registry.register(
			"server_transitions",
			"The total number of fallbacks to and reverts from lower priority servers (unstable)",
			server_transitions.clone(),
		);

		Self {
			resource_updates,
			deletions_ignored,
			stream_failures,
			server_transitions,
		}
	}
}

impl Recorder<&UpdateEvent, u64> for Metrics {
	fn record(&self, event: &UpdateEvent, count: u64) {
		self
			.resource_updates
			.get_or_create(&ResourceUpdateLabel {
				type_url: event.type_url.clone().into(),
				signal: event.signal,
			})
			.inc_by(count);
	}
}

impl Recorder<&DeletionIgnoredEvent, u64> for Metrics {
	fn record(&self, event: &DeletionIgnoredEvent, count: u64) {
		self
			.deletions_ignored
			.get_or_create(&TypeUrlLabel {
				type_url: event.type_url.clone().into(),
			})
			.inc_by(count);
	}
}

impl Recorder<&StreamFailureEvent, u64> for Metrics {
	fn record(&self, event: &StreamFailureEvent, count: u64) {
		self
			.stream_failures
			.get_or_create(&ServerLabel {
				server: event.server.clone().into(),
			})
			.inc_by(count);
	}
}

impl Recorder<&ServerTransitionKind, u64> for Metrics {
	fn record(&self, kind: &ServerTransitionKind, count: u64) {
		self
			.server_transitions
			.get_or_create(&ServerTransitionLabel { kind: *kind })
			.inc_by(count);
	}
}
