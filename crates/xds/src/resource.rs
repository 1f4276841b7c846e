use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use xds_core::strng;
use xds_core::strng::Strng;

use crate::Error;

/// A resource type known to the client, e.g. Listener or Cluster.
///
/// Implementations are provided by the resource type registry of the embedding
/// client; the authority treats them as opaque.
pub trait ResourceType: Send + Sync + 'static {
	/// The type URL resources of this type are requested under.
	fn type_url(&self) -> Strng;
	/// Short name for the type, used for logging.
	fn type_name(&self) -> Strng;
	/// Whether every SotW response for this type enumerates the full set of
	/// resources, so that omission of a previously seen name means deletion.
	fn all_resources_required_in_sotw(&self) -> bool;
}

/// A decoded configuration resource of some [ResourceType].
pub trait ResourceData: Debug + Send + Sync + 'static {
	/// Reports whether the wire form of `other` is identical to this resource.
	fn raw_equal(&self, other: &dyn ResourceData) -> bool;
	/// The opaque wire form of the resource.
	fn raw(&self) -> Bytes;
	/// JSON rendering of the resource, for logging only.
	fn to_json(&self) -> serde_json::Value;
}

/// Invoked exactly once when the receiver has finished processing an event.
pub type Done = Box<dyn FnOnce() + Send>;

/// Callbacks delivered to a registered watcher.
///
/// Callbacks for one watcher are delivered in order, on the watcher callback
/// serializer of the embedding client. Each callback owns a [Done] that must be
/// invoked when the watcher has finished processing the event; update batches
/// are not acknowledged to the server until every watcher has done so.
pub trait ResourceWatcher: Send + Sync + 'static {
	/// A new version of the resource was received and ACKed.
	fn on_update(&self, resource: Arc<dyn ResourceData>, done: Done);
	/// The resource was NACKed, or the stream carrying it failed. A previously
	/// delivered resource remains valid.
	fn on_error(&self, err: Error, done: Done);
	/// The management server no longer knows the resource.
	fn on_resource_does_not_exist(&self, done: Done);
}

/// Cache status of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
	Unknown,
	/// Requested from the server, no response seen yet.
	Requested,
	DoesNotExist,
	Acked,
	Nacked,
}

/// Metadata for the most recent update of a resource, or of a whole batch.
#[derive(Debug, Clone)]
pub struct UpdateMetadata {
	pub status: ResourceStatus,
	pub version: Strng,
	pub timestamp: Option<DateTime<Utc>>,
	/// Set when the most recent update was NACKed.
	pub err_state: Option<UpdateErrorState>,
}

impl UpdateMetadata {
	pub fn requested() -> UpdateMetadata {
		UpdateMetadata {
			status: ResourceStatus::Requested,
			version: strng::EMPTY,
			timestamp: None,
			err_state: None,
		}
	}

	pub fn does_not_exist() -> UpdateMetadata {
		UpdateMetadata {
			status: ResourceStatus::DoesNotExist,
			version: strng::EMPTY,
			timestamp: None,
			err_state: None,
		}
	}
}

/// Details of a NACKed update.
#[derive(Debug, Clone)]
pub struct UpdateErrorState {
	pub version: Strng,
	pub err: Error,
	pub timestamp: DateTime<Utc>,
}

/// One entry of a decoded update batch: the resource, or the reason the server
/// payload for it was rejected.
#[derive(Debug, Clone)]
pub enum ResourceUpdate {
	Valid(Arc<dyn ResourceData>),
	Invalid(Error),
}
