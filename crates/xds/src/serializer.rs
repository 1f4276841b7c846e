use tokio::sync::{mpsc, watch};
use tracing::trace;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Entry {
	run: Job,
	on_closed: Option<Job>,
}

/// Serializer runs scheduled jobs one at a time, in scheduling order, on a
/// single spawned task. Jobs scheduled from any thread observe the effects of
/// every job scheduled before them, which gives mutual exclusion without a lock
/// held across jobs. Jobs must not block.
///
/// Closing the serializer drops jobs that have not started; a dropped job's
/// `on_closed` callback still runs, so waiters can be unblocked.
pub struct Serializer {
	tx: mpsc::UnboundedSender<Entry>,
	close: watch::Sender<bool>,
}

impl Serializer {
	/// Spawns the executor task. Must be called from within a tokio runtime.
	pub fn spawn() -> Serializer {
		let (tx, mut rx) = mpsc::unbounded_channel::<Entry>();
		let (close, mut closed) = watch::channel(false);
		tokio::spawn(async move {
			loop {
				tokio::select! {
					biased;
					_ = closed.changed() => break,
					entry = rx.recv() => match entry {
						Some(entry) => (entry.run)(),
						// All handles dropped; nothing can be queued anymore.
						None => return,
					},
				}
			}
			// Drain without running. Work that did not start before the close is
			// dropped, but its on_closed callback fires.
			rx.close();
			let mut dropped = 0;
			while let Ok(entry) = rx.try_recv() {
				dropped += 1;
				if let Some(f) = entry.on_closed {
					f();
				}
			}
			trace!(dropped, "serializer closed");
		});
		Serializer { tx, close }
	}

	/// Schedules a job. Returns false if the serializer is closed, in which
	/// case the job is dropped without running.
	pub fn schedule<F: FnOnce() + Send + 'static>(&self, f: F) -> bool {
		if *self.close.borrow() {
			return false;
		}
		self
			.tx
			.send(Entry {
				run: Box::new(f),
				on_closed: None,
			})
			.is_ok()
	}

	/// Schedules a job; if the serializer closes before the job runs,
	/// `on_closed` runs instead (on the executor task, or on the calling thread
	/// when the serializer is already closed).
	pub fn schedule_or<F, G>(&self, f: F, on_closed: G)
	where
		F: FnOnce() + Send + 'static,
		G: FnOnce() + Send + 'static,
	{
		if *self.close.borrow() {
			on_closed();
			return;
		}
		if let Err(mpsc::error::SendError(entry)) = self.tx.send(Entry {
			run: Box::new(f),
			on_closed: Some(Box::new(on_closed)),
		}) {
			// The worker exited between the check above and the send.
			if let Some(f) = entry.on_closed {
				f();
			}
		}
	}

	/// Stops the executor after the currently running job, dropping everything
	/// still queued.
	pub fn close(&self) {
		let _ = self.close.send(true);
	}
}
