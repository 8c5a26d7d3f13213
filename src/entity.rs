//! Per-vehicle entities composed over the poll snapshot and webhook events.
//!
//! Every entity keeps its own reading. A coordinator refresh overwrites it from the vehicle
//! document; a webhook event for the same VIN overwrites it from the payload until the next
//! refresh. Consumers only see [`VehicleEntity::current_value`].

pub mod sensor;
pub mod tracker;

pub use sensor::*;
pub use tracker::*;

// crates.io
use tokio::sync::{broadcast, watch};
// self
use crate::{
	_prelude::*,
	auth::Vin,
	bus::BouncieEvent,
	coordinator::{VehicleMap, VehiclesCoordinator},
	model::{Vehicle, WebhookPayload},
};

/// Integration domain used in device identifiers.
pub const DOMAIN: &str = "bouncie";
/// Developer portal linked from every device.
pub const BOUNCIE_PORTAL: &str = "https://www.bouncie.dev/";

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
	(value * 100.).round() / 100.
}

/// Unit of a measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
	/// Miles.
	#[serde(rename = "mi")]
	Miles,
	/// Percent.
	#[serde(rename = "%")]
	Percent,
	/// Miles per hour.
	#[serde(rename = "mph")]
	MilesPerHour,
}
impl Unit {
	/// Display symbol.
	pub const fn as_str(self) -> &'static str {
		match self {
			Unit::Miles => "mi",
			Unit::Percent => "%",
			Unit::MilesPerHour => "mph",
		}
	}
}
impl Display for Unit {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// State exposed by an entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntityValue {
	/// The vehicle is missing from the latest snapshot.
	Unavailable,
	/// No reading has been received yet.
	Unknown,
	/// GPS position, rounded to two decimal places.
	Location {
		/// Latitude in degrees.
		latitude: f64,
		/// Longitude in degrees.
		longitude: f64,
	},
	/// Sensor reading, rounded to two decimal places.
	Measurement {
		/// Reading.
		value: f64,
		/// Unit of `value`.
		unit: Unit,
	},
}

/// Device that groups the entities of one vehicle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
	/// Nickname, or the VIN when none is set.
	pub name: String,
	/// `model.make`.
	pub manufacturer: Option<String>,
	/// `model.name`.
	pub model: Option<String>,
	/// `(domain, vin)`.
	pub identifier: (String, Vin),
	/// Portal link.
	pub configuration_url: String,
}
impl DeviceInfo {
	/// Device description of `vehicle`.
	pub fn for_vehicle(vehicle: &Vehicle) -> Self {
		Self {
			name: vehicle.display_name().to_owned(),
			manufacturer: vehicle.model.make.clone(),
			model: vehicle.model.name.clone(),
			identifier: (DOMAIN.into(), vehicle.vin.clone()),
			configuration_url: BOUNCIE_PORTAL.into(),
		}
	}
}

/// What an entity is bound to: one VIN inside one coordinator.
#[derive(Clone, Debug)]
pub struct VehicleContext {
	vin: Vin,
	coordinator: Arc<VehiclesCoordinator>,
}
impl VehicleContext {
	/// Binds `vin` to `coordinator`.
	pub fn new(coordinator: Arc<VehiclesCoordinator>, vin: Vin) -> Self {
		Self { vin, coordinator }
	}

	/// Vehicle identification number.
	pub fn vin(&self) -> &Vin {
		&self.vin
	}

	/// Whether the VIN is part of the coordinator's latest snapshot.
	pub fn available(&self) -> bool {
		self.coordinator.contains(&self.vin)
	}

	/// Device description built from the latest snapshot.
	pub fn device_info(&self) -> Option<DeviceInfo> {
		self.coordinator.vehicle(&self.vin).as_ref().map(DeviceInfo::for_vehicle)
	}
}

/// Capability shared by trackers and sensors.
pub trait VehicleEntity
where
	Self: Debug + Send + Sync,
{
	/// Binding to the vehicle.
	fn context(&self) -> &VehicleContext;

	/// Stable identifier, unique across the installation.
	fn unique_id(&self) -> &str;

	/// Display name.
	fn name(&self) -> &str;

	/// Latest reading, ignoring availability.
	fn reading(&self) -> EntityValue;

	/// Overwrites the reading from a polled vehicle document.
	fn apply_snapshot(&self, vehicle: &Vehicle);

	/// Overwrites the reading from a webhook payload; returns `true` when it changed.
	fn apply_event(&self, payload: &WebhookPayload) -> bool;

	/// Vehicle identification number.
	fn vin(&self) -> &Vin {
		self.context().vin()
	}

	/// Whether the VIN is part of the latest snapshot.
	fn available(&self) -> bool {
		self.context().available()
	}

	/// Device the entity belongs to.
	fn device_info(&self) -> Option<DeviceInfo> {
		self.context().device_info()
	}

	/// Start of the current accumulation period, for totals.
	fn last_reset(&self) -> Option<OffsetDateTime> {
		None
	}

	/// Current state: [`EntityValue::Unavailable`] when the vehicle is gone, the reading otherwise.
	fn current_value(&self) -> EntityValue {
		if self.available() { self.reading() } else { EntityValue::Unavailable }
	}
}

/// Entities of one config entry.
#[derive(Clone, Debug, Default)]
pub struct EntitySet(Arc<Vec<Arc<dyn VehicleEntity>>>);
impl EntitySet {
	/// Creates a tracker for every vehicle of the coordinator's snapshot, plus one sensor per
	/// reading the vehicle reports.
	pub fn build(coordinator: &Arc<VehiclesCoordinator>) -> Self {
		let data = coordinator.data();
		let mut vehicles = data.values().collect::<Vec<_>>();

		vehicles.sort_by(|a, b| a.vin.cmp(&b.vin));

		let mut entities = Vec::<Arc<dyn VehicleEntity>>::new();

		for vehicle in vehicles {
			entities.push(Arc::new(VehicleTracker::new(coordinator.clone(), vehicle)));

			for kind in SensorKind::ALL {
				if let Some(sensor) = VehicleSensor::new(coordinator.clone(), vehicle, kind) {
					entities.push(Arc::new(sensor));
				}
			}
		}

		Self(Arc::new(entities))
	}

	/// Number of entities.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether no entity was created.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates over the entities in creation order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn VehicleEntity>> {
		self.0.iter()
	}

	/// Looks up an entity by unique id.
	pub fn get(&self, unique_id: &str) -> Option<Arc<dyn VehicleEntity>> {
		self.0.iter().find(|entity| entity.unique_id() == unique_id).cloned()
	}

	/// Feeds a coordinator snapshot to every entity whose VIN it contains.
	pub fn apply_snapshot(&self, data: &VehicleMap) {
		for entity in self.0.iter() {
			if let Some(vehicle) = data.get(entity.vin()) {
				entity.apply_snapshot(vehicle);
			}
		}
	}

	/// Feeds a webhook payload to every entity; returns how many readings changed.
	pub fn apply_event(&self, payload: &WebhookPayload) -> usize {
		self.0.iter().filter(|entity| entity.apply_event(payload)).count()
	}

	/// Forwards snapshots and bus events to the entities until `shutdown` turns `true`.
	pub async fn pump(
		self,
		mut snapshots: watch::Receiver<Arc<VehicleMap>>,
		mut events: broadcast::Receiver<Arc<BouncieEvent>>,
		mut shutdown: watch::Receiver<bool>,
	) {
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
				changed = snapshots.changed() => {
					if changed.is_err() {
						break;
					}

					let data = snapshots.borrow_and_update().clone();

					self.apply_snapshot(&data);
				},
				event = events.recv() => match event {
					Ok(event) => {
						let updated = self.apply_event(&event.payload);

						tracing::debug!(
							kind = %event.payload.event_type,
							vin = %event.payload.vin,
							updated,
							"Webhook event applied."
						);
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Entity pump fell behind the event bus.");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				},
			}
		}
	}
}
