use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use xds_core::strng::Strng;

use crate::Error;
use crate::resource::{Done, ResourceType, ResourceUpdate, UpdateMetadata};

/// Feature switches a management server advertises through bootstrap
/// configuration.
#[derive(Default, Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerFeatures {
	/// Keep cached resources when a SotW response omits them, instead of
	/// treating the omission as a deletion.
	#[serde(default)]
	pub ignore_resource_deletion: bool,
}

/// A single management server entry from the bootstrap configuration. Equal
/// configs identify the same server; the embedding client shares one channel
/// between all authorities whose bootstrap lists contain equal entries.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
	/// Target URI of the management server.
	pub server_uri: Strng,
	#[serde(default)]
	pub server_features: ServerFeatures,
}

impl Display for ServerConfig {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.server_uri)
	}
}

/// Subscription surface of an ADS channel. Implementations multiplex
/// subscriptions from every authority sharing the channel onto one stream.
pub trait AdsChannel: Send + Sync {
	/// Subscribes to a resource. Idempotent per (type, name) from the calling
	/// authority's perspective.
	fn subscribe(&self, rtype: &Arc<dyn ResourceType>, name: &Strng);
	/// Removes the subscription added by a prior [AdsChannel::subscribe].
	fn unsubscribe(&self, rtype: &Arc<dyn ResourceType>, name: &Strng);
}

/// Inbound stream events delivered by the transport to an authority.
/// [crate::Authority] implements this; the transport invokes it on every
/// authority interested in the originating channel.
pub trait AdsEventHandler: Send + Sync {
	/// A decoded update batch arrived from `server`. `on_done` must be invoked
	/// exactly once, after every watcher has processed the batch; the transport
	/// uses it to gate the next read from the stream.
	fn on_resource_update(
		&self,
		server: &ServerConfig,
		rtype: Arc<dyn ResourceType>,
		updates: HashMap<Strng, ResourceUpdate>,
		metadata: UpdateMetadata,
		on_done: Done,
	);

	/// The ADS stream to `server` failed.
	fn on_stream_failure(&self, server: &ServerConfig, err: Error);

	/// The server signalled that a subscribed resource does not exist, e.g.
	/// because its resource timer expired on the stream.
	fn on_resource_does_not_exist(&self, rtype: Arc<dyn ResourceType>, name: Strng);
}

/// A referenced channel as handed out by a [ChannelAcquirer], paired with the
/// hook that gives the reference back.
pub struct AcquiredChannel {
	pub channel: Arc<dyn AdsChannel>,
	/// Must run exactly once, when the holder no longer needs the channel.
	pub release: Done,
}

/// Hands out referenced ADS channels. Provided by the embedding client, which
/// owns the channels and deduplicates them by [ServerConfig] equality.
pub trait ChannelAcquirer: Send + Sync {
	/// Returns a channel to `server` that will report its stream events to
	/// `handler`.
	fn acquire(
		&self,
		server: &ServerConfig,
		handler: Arc<dyn AdsEventHandler>,
	) -> anyhow::Result<AcquiredChannel>;
}
