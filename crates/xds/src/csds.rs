//! Snapshot types for client status discovery, mirroring the fields of the
//! envoy `ClientConfig.GenericXdsConfig` admin message. Snapshots are plain
//! values; callers may serialize or transform them freely.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use xds_core::strng::Strng;

use crate::resource::ResourceStatus;

/// Status of a resource as reported on the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientResourceStatus {
	Unknown,
	Requested,
	DoesNotExist,
	Acked,
	Nacked,
}

impl From<ResourceStatus> for ClientResourceStatus {
	fn from(status: ResourceStatus) -> Self {
		match status {
			ResourceStatus::Unknown => ClientResourceStatus::Unknown,
			ResourceStatus::Requested => ClientResourceStatus::Requested,
			ResourceStatus::DoesNotExist => ClientResourceStatus::DoesNotExist,
			ResourceStatus::Acked => ClientResourceStatus::Acked,
			ResourceStatus::Nacked => ClientResourceStatus::Nacked,
		}
	}
}

/// Details of the most recent rejected update of a resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFailureState {
	pub last_update_attempt: DateTime<Utc>,
	pub details: String,
	pub version_info: Strng,
}

/// One watched resource as reported by [crate::Authority::dump]. Metadata is
/// kept even for resources the server no longer knows, so deleted resources
/// stay visible with a DOES_NOT_EXIST status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericXdsConfig {
	pub type_url: Strng,
	pub name: Strng,
	pub version_info: Strng,
	/// Wire form of the last ACKed resource, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub xds_config: Option<Bytes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_updated: Option<DateTime<Utc>>,
	pub client_status: ClientResourceStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_state: Option<UpdateFailureState>,
}
