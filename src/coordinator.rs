//! Scheduled vehicle polling shared by every entity of a config entry.
//!
//! [`VehiclesCoordinator::refresh`] replaces the `VIN → Vehicle` snapshot and publishes it to
//! subscribers. A failed refresh keeps the previous snapshot, flips
//! [`last_update_success`](VehiclesCoordinator::last_update_success) to `false`, and surfaces
//! as [`Error::UpdateFailed`]. The next scheduled tick is the only retry.

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use tokio::{
	sync::watch,
	time::{self as tokio_time, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	api::BouncieApi,
	auth::Vin,
	model::Vehicle,
	obs::{self, FlowKind},
};

/// Poll cadence used when none is configured.
pub const DEFAULT_UPDATE_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);
/// Shortest accepted poll cadence.
pub const MIN_UPDATE_INTERVAL: StdDuration = StdDuration::from_secs(10);

/// Latest vehicles keyed by VIN.
pub type VehicleMap = HashMap<Vin, Vehicle>;

/// Clamps a configured interval to [`MIN_UPDATE_INTERVAL`].
pub fn clamp_interval(interval: StdDuration) -> StdDuration {
	interval.max(MIN_UPDATE_INTERVAL)
}

/// Polls `GET /vehicles` and fans the snapshot out to entities.
#[derive(Debug)]
pub struct VehiclesCoordinator {
	name: String,
	api: BouncieApi,
	update_interval: StdDuration,
	snapshot: watch::Sender<Arc<VehicleMap>>,
	last_update_success: AtomicBool,
}
impl VehiclesCoordinator {
	/// Creates a coordinator with an empty snapshot.
	pub fn new(name: impl Into<String>, api: BouncieApi, update_interval: StdDuration) -> Self {
		let (snapshot, _) = watch::channel(Arc::new(VehicleMap::new()));

		Self {
			name: name.into(),
			api,
			update_interval: clamp_interval(update_interval),
			snapshot,
			last_update_success: AtomicBool::new(true),
		}
	}

	/// Client used for polling.
	pub fn api(&self) -> &BouncieApi {
		&self.api
	}

	/// Effective poll cadence.
	pub fn update_interval(&self) -> StdDuration {
		self.update_interval
	}

	/// Fetches every vehicle and publishes the new snapshot.
	pub async fn refresh(&self) -> Result<Arc<VehicleMap>> {
		tracing::debug!(coordinator = %self.name, "Refresh data.");

		let fetched = obs::observe(FlowKind::Poll, "refresh", async {
			let vehicles = self.api.get_vehicles().await?;

			Ok(vehicles.into_iter().map(|vehicle| (vehicle.vin.clone(), vehicle)).collect())
		})
		.await;

		match fetched {
			Ok(map) => {
				let data: Arc<VehicleMap> = Arc::new(map);

				self.last_update_success.store(true, Ordering::Relaxed);
				self.snapshot.send_replace(data.clone());

				tracing::debug!(
					coordinator = %self.name,
					vehicles = data.len(),
					"Vehicle data refreshed."
				);

				Ok(data)
			},
			Err(e) => {
				let was_successful = self.last_update_success.swap(false, Ordering::Relaxed);

				if was_successful {
					tracing::warn!(
						coordinator = %self.name,
						error = %e,
						"Error fetching vehicle data."
					);
				} else {
					tracing::debug!(
						coordinator = %self.name,
						error = %e,
						"Vehicle data still unavailable."
					);
				}

				Err(Error::UpdateFailed(Box::new(e)))
			},
		}
	}

	/// Refreshes every [`update_interval`](Self::update_interval) until `shutdown` turns `true` or
	/// its sender is dropped.
	///
	/// The first tick fires one interval from now; setup performs the initial refresh itself.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
		let mut ticker =
			tokio_time::interval_at(Instant::now() + self.update_interval, self.update_interval);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		loop {
			if *shutdown.borrow() {
				break;
			}

			tokio::select! {
				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
				},
				_ = ticker.tick() => {
					// Failures are already logged and retried on the next tick.
					let _ = self.refresh().await;
				},
			}
		}

		tracing::debug!(coordinator = %self.name, "Polling stopped.");
	}

	/// Latest snapshot.
	pub fn data(&self) -> Arc<VehicleMap> {
		self.snapshot.borrow().clone()
	}

	/// Latest document of one vehicle.
	pub fn vehicle(&self, vin: &str) -> Option<Vehicle> {
		self.snapshot.borrow().get(vin).cloned()
	}

	/// Whether `vin` is part of the latest snapshot.
	pub fn contains(&self, vin: &str) -> bool {
		self.snapshot.borrow().contains_key(vin)
	}

	/// Receiver notified on every successful refresh.
	pub fn subscribe(&self) -> watch::Receiver<Arc<VehicleMap>> {
		self.snapshot.subscribe()
	}

	/// Whether the latest refresh succeeded.
	pub fn last_update_success(&self) -> bool {
		self.last_update_success.load(Ordering::Relaxed)
	}
}
