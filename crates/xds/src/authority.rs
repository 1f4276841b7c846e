use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use tokio::sync::oneshot;

use xds_core::metrics::IncrementRecorder;
use xds_core::prelude::*;

use crate::Error;
use crate::channel::{AcquiredChannel, AdsEventHandler, ChannelAcquirer, ServerConfig};
use crate::csds::{GenericXdsConfig, UpdateFailureState};
use crate::metrics::{
	DeletionIgnoredEvent, Metrics, ServerTransitionKind, StreamFailureEvent, UpdateEvent,
	UpdateSignal,
};
use crate::resource::{
	Done, ResourceData, ResourceStatus, ResourceType, ResourceUpdate, ResourceWatcher,
	UpdateMetadata,
};
use crate::serializer::Serializer;

#[cfg(test)]
#[path = "authority_tests.rs"]
mod tests;

/// State for a single watched resource.
struct ResourceState {
	/// Live watchers. Identity is the Arc allocation; registering the same Arc
	/// twice is a single membership.
	watchers: Vec<Arc<dyn ResourceWatcher>>,
	/// Most recent ACKed resource, if any.
	cache: Option<Arc<dyn ResourceData>>,
	/// Metadata for the most recent update.
	metadata: UpdateMetadata,
	/// Set when a SotW response omitted this resource but the server asked us
	/// to ignore deletions.
	deletion_ignored: bool,
	/// Indexes of the channel slots this name is currently subscribed on.
	subscribed_on: BTreeSet<usize>,
}

/// One server config from the bootstrap list plus the lazily acquired channel
/// to it. Slot order is fallback priority: index 0 is the primary.
struct ChannelSlot {
	server: ServerConfig,
	channel: Option<AcquiredChannel>,
}

/// All resources of one type, keyed by resource name.
struct TypeState {
	rtype: Arc<dyn ResourceType>,
	by_name: HashMap<Strng, ResourceState>,
}

/// Everything the client side serializer owns. Mutated only from jobs running
/// on that serializer.
struct AuthorityState {
	/// Two level table: type URL, then resource name.
	resources: HashMap<Strng, TypeState>,
	slots: Vec<ChannelSlot>,
	/// Index of the slot the fallback logic currently works against. Not a
	/// statement about connectivity, only about preference.
	active: Option<usize>,
}

pub struct AuthorityBuildOptions {
	/// Name of the authority from bootstrap configuration.
	pub name: Strng,
	/// Management servers for this authority, in fallback priority order.
	pub servers: Vec<ServerConfig>,
	pub acquirer: Arc<dyn ChannelAcquirer>,
	/// Serializer watcher callbacks run on, shared across authorities and owned
	/// by the embedding client.
	pub watcher_serializer: Arc<Serializer>,
	pub metrics: Arc<Metrics>,
}

/// An authority manages the state of resources requested from the management
/// servers listed for it in bootstrap configuration, and acquires and releases
/// references to the channels used to talk to them.
///
/// All mutation runs on a single writer serializer owned by the authority, so
/// watcher callbacks and admin reads always observe a consistent view without
/// a lock held across operations. Cloning is cheap and yields a handle to the
/// same authority.
#[derive(Clone)]
pub struct Authority {
	inner: Arc<Inner>,
}

struct Inner {
	name: Strng,
	acquirer: Arc<dyn ChannelAcquirer>,
	watcher_serializer: Arc<Serializer>,
	serializer: Serializer,
	metrics: Arc<Metrics>,
	state: Mutex<AuthorityState>,
}

impl Authority {
	/// Creates a new authority. No channels are created here; a channel to the
	/// first server configuration is acquired when the first watch is
	/// registered, and to the others as fallback needs them.
	///
	/// Must be called from within a tokio runtime.
	pub fn new(opts: AuthorityBuildOptions) -> Authority {
		let AuthorityBuildOptions {
			name,
			servers,
			acquirer,
			watcher_serializer,
			metrics,
		} = opts;
		let slots = servers
			.into_iter()
			.map(|server| ChannelSlot {
				server,
				channel: None,
			})
			.collect();
		Authority {
			inner: Arc::new(Inner {
				name,
				acquirer,
				watcher_serializer,
				serializer: Serializer::spawn(),
				metrics,
				state: Mutex::new(AuthorityState {
					resources: HashMap::new(),
					slots,
					active: None,
				}),
			}),
		}
	}

	/// The authority name from bootstrap configuration.
	pub fn name(&self) -> &Strng {
		&self.inner.name
	}

	/// Registers a watcher for the given resource. Returns once the watcher is
	/// installed, so a caller holding the handle can rely on receiving every
	/// later event for the resource. If a cached copy exists the new watcher is
	/// notified of it immediately.
	///
	/// When the authority is already closed, or no channel to any management
	/// server can be acquired, the watcher is not installed and the returned
	/// handle cancels to a no-op.
	pub async fn watch(
		&self,
		rtype: Arc<dyn ResourceType>,
		name: impl Into<Strng>,
		watcher: Arc<dyn ResourceWatcher>,
	) -> WatchHandle {
		let name = name.into();
		let (tx, rx) = oneshot::channel();
		let this = self.clone();
		let (rt, n, w) = (rtype.clone(), name.clone(), watcher.clone());
		if !self.inner.serializer.schedule(move || {
			let installed = this.register_watch(rt, n, w);
			let _ = tx.send(installed);
		}) {
			debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "watch scheduled after close");
		}
		// A dropped sender (closed before the job ran) leaves the watch
		// uninstalled and the handle disarmed.
		let installed = rx.await.unwrap_or(false);
		WatchHandle {
			authority: self.clone(),
			rtype,
			name,
			watcher,
			armed: AtomicBool::new(installed),
		}
	}

	/// Returns a snapshot of the configuration cached by this authority, for
	/// client status reporting. The read runs on the client side serializer so
	/// it observes a consistent state; the result is a value copy.
	pub async fn dump(&self) -> Vec<GenericXdsConfig> {
		let (tx, rx) = oneshot::channel();
		let this = self.clone();
		self.inner.serializer.schedule(move || {
			let _ = tx.send(this.resource_config());
		});
		rx.await.unwrap_or_default()
	}

	/// Closes the client side serializer. Pending and future operations become
	/// no-ops that complete their waiters; watcher callbacks already handed to
	/// the watcher serializer still run.
	pub fn close(&self) {
		debug!(authority = %self.inner.name, "closing");
		self.inner.serializer.close();
	}

	fn register_watch(
		&self,
		rtype: Arc<dyn ResourceType>,
		name: Strng,
		watcher: Arc<dyn ResourceWatcher>,
	) -> bool {
		let mut state = self.inner.state.lock().unwrap();
		let AuthorityState {
			resources,
			slots,
			active,
		} = &mut *state;
		debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "new watch");

		let Some(active_idx) = self.active_or_acquire(slots, active) else {
			return false;
		};

		let type_url = rtype.type_url();
		let ts = resources.entry(type_url).or_insert_with(|| TypeState {
			rtype: rtype.clone(),
			by_name: HashMap::new(),
		});
		let rs = match ts.by_name.entry(name.clone()) {
			Entry::Occupied(e) => e.into_mut(),
			Entry::Vacant(v) => {
				debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "first watch for resource");
				if let Some(acquired) = slots[active_idx].channel.as_ref() {
					acquired.channel.subscribe(&rtype, &name);
				}
				v.insert(ResourceState {
					watchers: Vec::new(),
					cache: None,
					metadata: UpdateMetadata::requested(),
					deletion_ignored: false,
					subscribed_on: BTreeSet::from([active_idx]),
				})
			},
		};

		if !rs.watchers.iter().any(|w| Arc::ptr_eq(w, &watcher)) {
			rs.watchers.push(watcher.clone());
		}

		// The new watcher is brought up to date immediately. Snapshots are taken
		// here, under the client side serializer, and handed to the watcher
		// serializer as values.
		if let Some(cached) = rs.cache.clone() {
			debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, cached = %cached.to_json(), "resource found in cache");
			let w = watcher.clone();
			self
				.inner
				.watcher_serializer
				.schedule(move || w.on_update(cached, Box::new(|| {})));
		}
		if rs.metadata.status == ResourceStatus::Nacked {
			if let Some(err_state) = rs.metadata.err_state.clone() {
				let w = watcher.clone();
				self
					.inner
					.watcher_serializer
					.schedule(move || w.on_error(err_state.err, Box::new(|| {})));
			}
		}
		if rs.metadata.status == ResourceStatus::DoesNotExist {
			let w = watcher;
			self
				.inner
				.watcher_serializer
				.schedule(move || w.on_resource_does_not_exist(Box::new(|| {})));
		}
		true
	}

	fn unregister_watch(
		&self,
		rtype: Arc<dyn ResourceType>,
		name: Strng,
		watcher: Arc<dyn ResourceWatcher>,
	) {
		let mut state = self.inner.state.lock().unwrap();
		let AuthorityState {
			resources,
			slots,
			active,
		} = &mut *state;
		debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "canceling watch");

		let type_url = rtype.type_url();
		let Some(ts) = resources.get_mut(&type_url) else {
			return;
		};
		let Some(rs) = ts.by_name.get_mut(&name) else {
			return;
		};

		rs.watchers.retain(|w| !Arc::ptr_eq(w, &watcher));
		if !rs.watchers.is_empty() {
			debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "other watchers remain");
			return;
		}

		// Last watcher is gone: unsubscribe the resource everywhere and drop its
		// state.
		debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "removing last watch for resource");
		for idx in &rs.subscribed_on {
			if let Some(acquired) = slots[*idx].channel.as_ref() {
				acquired.channel.unsubscribe(&ts.rtype, &name);
			}
		}
		ts.by_name.remove(&name);
		if ts.by_name.is_empty() {
			debug!(authority = %self.inner.name, "type" = %rtype.type_name(), "removing last watch for type");
			resources.remove(&type_url);
		}
		if resources.is_empty() {
			debug!(authority = %self.inner.name, "no watches remain, releasing channel references");
			Self::release_all(slots, active);
		}
	}

	/// Returns the active slot, acquiring a channel to the primary when no slot
	/// is active yet.
	fn active_or_acquire(
		&self,
		slots: &mut [ChannelSlot],
		active: &mut Option<usize>,
	) -> Option<usize> {
		if let Some(idx) = *active {
			return Some(idx);
		}
		let Some(slot) = slots.first_mut() else {
			warn!(authority = %self.inner.name, "no management servers configured");
			return None;
		};
		if slot.channel.is_none() {
			let handler: Arc<dyn AdsEventHandler> = Arc::new(self.clone());
			match self.inner.acquirer.acquire(&slot.server, handler) {
				Ok(acquired) => slot.channel = Some(acquired),
				Err(err) => {
					warn!(authority = %self.inner.name, server = %slot.server, error = %err, "failed to acquire an ads channel");
					return None;
				},
			}
		}
		*active = Some(0);
		Some(0)
	}

	fn release_all(slots: &mut [ChannelSlot], active: &mut Option<usize>) {
		for slot in slots.iter_mut() {
			if let Some(acquired) = slot.channel.take() {
				(acquired.release)();
			}
		}
		*active = None;
	}

	fn handle_update(
		&self,
		server: ServerConfig,
		rtype: Arc<dyn ResourceType>,
		updates: HashMap<Strng, ResourceUpdate>,
		metadata: UpdateMetadata,
		on_done: Done,
	) {
		let mut state = self.inner.state.lock().unwrap();
		self.revert_to_primary_on_update(&mut state, &server);

		// Callbacks are collected and only handed to the watcher serializer once
		// the whole batch has been tallied, so every barrier reservation lands
		// before any watcher can report done. Dispatching early could complete
		// the batch while later resources are still being processed.
		let barrier = Barrier::new(on_done);
		let mut notifications: Vec<Notification> = Vec::new();

		let type_url = rtype.type_url();
		if let Some(ts) = state.resources.get_mut(&type_url) {
			for (name, update) in &updates {
				let Some(rs) = ts.by_name.get_mut(name) else {
					continue;
				};
				match update {
					ResourceUpdate::Invalid(err) => {
						// The previous version of the resource stays valid; only
						// status and error detail change.
						rs.metadata.status = metadata.status;
						rs.metadata.err_state = metadata.err_state.clone();
						warn!(authority = %self.inner.name, "type" = %ts.rtype.type_name(), resource = %name, error = %err, "resource rejected");
						self.inner.metrics.increment(&UpdateEvent {
							type_url: type_url.clone(),
							signal: UpdateSignal::Nack,
						});
						for watcher in &rs.watchers {
							let watcher = watcher.clone();
							let err = err.clone();
							let done = barrier.add();
							notifications.push(Box::new(move || watcher.on_error(err, done)));
						}
					},
					ResourceUpdate::Valid(resource) => {
						if rs.deletion_ignored {
							rs.deletion_ignored = false;
							info!(authority = %self.inner.name, "type" = %ts.rtype.type_name(), resource = %name, "valid update received after a previously ignored deletion");
						}
						// Watchers hear about the resource when this is its first
						// update, when the raw form changed, or when the previous
						// update was NACKed and this one recovers from it.
						let changed = match &rs.cache {
							Some(cached) => !cached.raw_equal(resource.as_ref()),
							None => true,
						};
						if changed || rs.metadata.err_state.is_some() {
							debug!(authority = %self.inner.name, "type" = %ts.rtype.type_name(), resource = %name, "resource added to cache");
							rs.cache = Some(resource.clone());
							for watcher in &rs.watchers {
								let watcher = watcher.clone();
								let resource = resource.clone();
								let done = barrier.add();
								notifications.push(Box::new(move || watcher.on_update(resource, done)));
							}
						}
						// ACK even when the batch metadata carries an error caused by
						// some other resource in the same response; in that case the
						// error version is the one the server associates with the
						// response.
						rs.metadata = metadata.clone();
						rs.metadata.status = ResourceStatus::Acked;
						rs.metadata.err_state = None;
						if let Some(err_state) = &metadata.err_state {
							rs.metadata.version = err_state.version.clone();
						}
						self.inner.metrics.increment(&UpdateEvent {
							type_url: type_url.clone(),
							signal: UpdateSignal::Ack,
						});
					},
				}
			}

			// For types where every SotW response enumerates the full resource
			// set, a previously seen name that is absent from the response has
			// been deleted, unless this server asked us to ignore deletions.
			if ts.rtype.all_resources_required_in_sotw() {
				for (name, rs) in ts.by_name.iter_mut() {
					if rs.cache.is_none() {
						// Either never received, in which case absence proves nothing
						// (the response may predate our request and the request
						// timeout covers it), or already removed by an earlier
						// response, in which case the watchers have been told.
						continue;
					}
					if updates.contains_key(name) {
						continue;
					}
					if rs.metadata.status == ResourceStatus::DoesNotExist {
						continue;
					}
					if server.server_features.ignore_resource_deletion {
						if !rs.deletion_ignored {
							rs.deletion_ignored = true;
							warn!(authority = %self.inner.name, "type" = %ts.rtype.type_name(), resource = %name, "ignoring resource deletion");
							self.inner.metrics.increment(&DeletionIgnoredEvent {
								type_url: type_url.clone(),
							});
						}
						continue;
					}
					// Deleted. Metadata is kept for status reporting.
					rs.cache = None;
					rs.metadata = UpdateMetadata::does_not_exist();
					for watcher in &rs.watchers {
						let watcher = watcher.clone();
						let done = barrier.add();
						notifications.push(Box::new(move || watcher.on_resource_does_not_exist(done)));
					}
				}
			}
		}
		drop(state);

		barrier.dispatch(notifications, &self.inner.watcher_serializer);
	}

	/// An update from a higher priority server than the active one proves that
	/// server has recovered: make it active again and drop every lower priority
	/// channel.
	fn revert_to_primary_on_update(&self, state: &mut AuthorityState, server: &ServerConfig) {
		let AuthorityState {
			resources,
			slots,
			active,
		} = &mut *state;
		if let Some(idx) = *active {
			if slots[idx].server == *server {
				return;
			}
		}
		let Some(target) = slots.iter().position(|s| s.server == *server) else {
			error!(authority = %self.inner.name, server = %server, "received an update from an unknown server");
			return;
		};
		// Only move up the priority list. The update also proves the target's
		// channel is alive, so when no slot is active an acquired target wins.
		match *active {
			Some(idx) if target < idx => {},
			None if slots[target].channel.is_some() => {},
			_ => return,
		}
		info!(authority = %self.inner.name, server = %slots[target].server, "reverting to higher priority server");
		*active = Some(target);
		for idx in target + 1..slots.len() {
			if let Some(acquired) = slots[idx].channel.take() {
				(acquired.release)();
				for ts in resources.values_mut() {
					for rs in ts.by_name.values_mut() {
						rs.subscribed_on.remove(&idx);
					}
				}
			}
		}
		self.inner.metrics.increment(&ServerTransitionKind::Revert);
	}

	fn handle_stream_failure(&self, server: ServerConfig, err: Error) {
		if err.is_stream_failure_after_response() {
			// Streams are recycled during normal operation (load rebalancing, max
			// connection age). A stream that already delivered a response is not
			// a fallback trigger and not worth a watcher notification.
			debug!(authority = %self.inner.name, server = %server, error = %err, "stream failed after a response, watchers not notified");
			return;
		}
		warn!(authority = %self.inner.name, server = %server, error = %err, "ads stream failed");
		self.inner.metrics.increment(&StreamFailureEvent {
			server: server.server_uri.clone(),
		});

		let mut state = self.inner.state.lock().unwrap();
		for ts in state.resources.values() {
			for rs in ts.by_name.values() {
				for watcher in &rs.watchers {
					let watcher = watcher.clone();
					let err = err.clone();
					self
						.inner
						.watcher_serializer
						.schedule(move || watcher.on_error(err, Box::new(|| {})));
				}
			}
		}

		let Some(failed) = state.slots.iter().position(|s| s.server == server) else {
			error!(authority = %self.inner.name, server = %server, "stream failure reported for an unknown server");
			return;
		};
		for target in failed + 1..state.slots.len() {
			if self.try_fallback_to(&mut state, target) {
				return;
			}
		}
		// Nothing lower priority is reachable. Stay on the failed slot; the
		// transport keeps retrying it and a later successful update recovers us.
	}

	/// Attempts to make `target` the active slot, acquiring its channel if
	/// necessary and resubscribing every live resource on it. Returns false
	/// when the channel cannot be acquired, leaving the rest of the state
	/// untouched.
	fn try_fallback_to(&self, state: &mut AuthorityState, target: usize) -> bool {
		let AuthorityState {
			resources,
			slots,
			active,
		} = &mut *state;
		if slots[target].channel.is_none() {
			let handler: Arc<dyn AdsEventHandler> = Arc::new(self.clone());
			match self.inner.acquirer.acquire(&slots[target].server, handler) {
				Ok(acquired) => slots[target].channel = Some(acquired),
				Err(err) => {
					warn!(authority = %self.inner.name, server = %slots[target].server, error = %err, "fallback target unreachable");
					return false;
				},
			}
		}
		info!(authority = %self.inner.name, server = %slots[target].server, "falling back to lower priority server");

		// Drop every acquired slot above the target except the one being failed
		// away from: that one keeps its channel so a recovery there can drive
		// the revert.
		for idx in 0..target {
			if Some(idx) == *active {
				continue;
			}
			if let Some(acquired) = slots[idx].channel.take() {
				(acquired.release)();
				for ts in resources.values_mut() {
					for rs in ts.by_name.values_mut() {
						rs.subscribed_on.remove(&idx);
					}
				}
			}
		}

		// Subscribe to all existing resources from the new management server.
		if let Some(acquired) = slots[target].channel.as_ref() {
			for ts in resources.values_mut() {
				for (name, rs) in ts.by_name.iter_mut() {
					acquired.channel.subscribe(&ts.rtype, name);
					rs.subscribed_on.insert(target);
				}
			}
		}
		*active = Some(target);
		self.inner.metrics.increment(&ServerTransitionKind::Fallback);
		true
	}

	fn handle_does_not_exist(&self, rtype: Arc<dyn ResourceType>, name: Strng) {
		let mut state = self.inner.state.lock().unwrap();
		let Some(ts) = state.resources.get_mut(&rtype.type_url()) else {
			return;
		};
		let Some(rs) = ts.by_name.get_mut(&name) else {
			return;
		};
		if rs.metadata.status == ResourceStatus::DoesNotExist {
			// Watchers were already told.
			return;
		}
		debug!(authority = %self.inner.name, "type" = %rtype.type_name(), resource = %name, "resource does not exist");
		rs.cache = None;
		rs.metadata = UpdateMetadata::does_not_exist();
		for watcher in &rs.watchers {
			let watcher = watcher.clone();
			self
				.inner
				.watcher_serializer
				.schedule(move || watcher.on_resource_does_not_exist(Box::new(|| {})));
		}
	}

	fn resource_config(&self) -> Vec<GenericXdsConfig> {
		let state = self.inner.state.lock().unwrap();
		let mut out = Vec::new();
		for (type_url, ts) in &state.resources {
			for (name, rs) in &ts.by_name {
				out.push(GenericXdsConfig {
					type_url: type_url.clone(),
					name: name.clone(),
					version_info: rs.metadata.version.clone(),
					xds_config: rs.cache.as_ref().map(|c| c.raw()),
					last_updated: rs.metadata.timestamp,
					client_status: rs.metadata.status.into(),
					error_state: rs.metadata.err_state.as_ref().map(|es| UpdateFailureState {
						last_update_attempt: es.timestamp,
						details: es.err.to_string(),
						version_info: es.version.clone(),
					}),
				});
			}
		}
		out.sort_by(|a, b| {
			a.type_url
				.cmp(&b.type_url)
				.then_with(|| a.name.cmp(&b.name))
		});
		out
	}
}

impl AdsEventHandler for Authority {
	fn on_resource_update(
		&self,
		server: &ServerConfig,
		rtype: Arc<dyn ResourceType>,
		updates: HashMap<Strng, ResourceUpdate>,
		metadata: UpdateMetadata,
		on_done: Done,
	) {
		let this = self.clone();
		let server = server.clone();
		if !self.inner.serializer.schedule(move || {
			this.handle_update(server, rtype, updates, metadata, on_done);
		}) {
			debug!(authority = %self.inner.name, "dropping resource update, authority closed");
		}
	}

	fn on_stream_failure(&self, server: &ServerConfig, err: Error) {
		let this = self.clone();
		let server = server.clone();
		self
			.inner
			.serializer
			.schedule(move || this.handle_stream_failure(server, err));
	}

	fn on_resource_does_not_exist(&self, rtype: Arc<dyn ResourceType>, name: Strng) {
		let this = self.clone();
		self
			.inner
			.serializer
			.schedule(move || this.handle_does_not_exist(rtype, name));
	}
}

/// Cancellation handle returned from [Authority::watch]. Cancelling is
/// idempotent and safe after the authority has closed. Dropping the handle
/// does not cancel the watch.
pub struct WatchHandle {
	authority: Authority,
	rtype: Arc<dyn ResourceType>,
	name: Strng,
	watcher: Arc<dyn ResourceWatcher>,
	armed: AtomicBool,
}

impl WatchHandle {
	/// Removes the watcher, returning once the removal has been applied (or
	/// immediately when the watch was never installed, already cancelled, or
	/// the authority is closed). When the last watcher of a resource goes away
	/// the resource is unsubscribed everywhere, and when the last resource goes
	/// away all channel references are released.
	pub async fn cancel(&self) {
		if !self.armed.swap(false, Ordering::SeqCst) {
			return;
		}
		let (tx, rx) = oneshot::channel();
		let this = self.authority.clone();
		let (rt, n, w) = (self.rtype.clone(), self.name.clone(), self.watcher.clone());
		self.authority.inner.serializer.schedule(move || {
			this.unregister_watch(rt, n, w);
			let _ = tx.send(());
		});
		let _ = rx.await;
	}
}

type Notification = Box<dyn FnOnce() + Send + 'static>;

/// Completion barrier for one update batch: the wrapped callback runs exactly
/// once, after every notification reserved on the barrier has reported done.
struct Barrier {
	pending: Arc<AtomicI64>,
	on_done: Arc<OnceDone>,
}

struct OnceDone(Mutex<Option<Done>>);

impl OnceDone {
	fn call(&self) {
		if let Some(f) = self.0.lock().unwrap().take() {
			f();
		}
	}
}

impl Barrier {
	fn new(on_done: Done) -> Barrier {
		Barrier {
			pending: Arc::new(AtomicI64::new(0)),
			on_done: Arc::new(OnceDone(Mutex::new(Some(on_done)))),
		}
	}

	/// Reserves one notification and returns the done callback to hand to its
	/// watcher. All reservations happen before [Barrier::dispatch] runs.
	fn add(&self) -> Done {
		self.pending.fetch_add(1, Ordering::SeqCst);
		let pending = self.pending.clone();
		let on_done = self.on_done.clone();
		Box::new(move || {
			if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
				on_done.call();
			}
		})
	}

	fn dispatch(self, notifications: Vec<Notification>, serializer: &Serializer) {
		if notifications.is_empty() {
			// Nobody to wait for; unblock the next stream read immediately.
			self.on_done.call();
			return;
		}
		for f in notifications {
			let on_done = self.on_done.clone();
			serializer.schedule_or(f, move || on_done.call());
		}
	}
}
