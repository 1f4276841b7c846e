//! Client side of the xDS configuration protocol, organized around authorities.
//!
//! An authority owns the interaction with the ordered list of management
//! servers assigned to it by bootstrap configuration. It multiplexes resource
//! watchers over shared ADS channels, caches the most recent ACKed state of
//! every watched resource, and falls back to lower priority servers when the
//! stream to a higher priority server fails.
//!
//! The transport itself is not part of this crate; it sits behind the
//! [AdsChannel] and [ChannelAcquirer] seams and feeds decoded updates back in
//! through [AdsEventHandler].

use xds_core::strng::Strng;

pub use authority::{Authority, AuthorityBuildOptions, WatchHandle};
pub use channel::{
	AcquiredChannel, AdsChannel, AdsEventHandler, ChannelAcquirer, ServerConfig, ServerFeatures,
};
pub use metrics::Metrics;
pub use resource::{
	Done, ResourceData, ResourceStatus, ResourceType, ResourceUpdate, ResourceWatcher,
	UpdateErrorState, UpdateMetadata,
};
pub use serializer::Serializer;

mod authority;
mod channel;
pub mod csds;
pub mod metrics;
mod resource;
mod serializer;

#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
	/// A resource in an update batch failed validation or decoding. Carried to
	/// watchers when the batch NACKs the resource.
	#[error("resource rejected: {0}")]
	ResourceRejected(Strng),
	#[error("ads stream to {0} failed: {1}")]
	StreamFailure(Strng, Strng),
	/// The stream failed only after a response had been received on it. Servers
	/// recycle streams during normal operation, so this is not surfaced to
	/// watchers.
	#[error("ads stream to {0} failed after a response was received: {1}")]
	StreamFailureAfterResponse(Strng, Strng),
	#[error("channel to {0} unavailable: {1}")]
	ChannelUnavailable(Strng, Strng),
}

impl Error {
	pub fn is_stream_failure_after_response(&self) -> bool {
		matches!(self, Error::StreamFailureAfterResponse(_, _))
	}
}
