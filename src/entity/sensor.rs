//! Odometer, fuel level, and speed sensors.

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	coordinator::VehiclesCoordinator,
	entity::{EntityValue, Unit, VehicleContext, VehicleEntity, round2},
	model::{EventKind, Vehicle, VehicleStats, WebhookPayload},
};

/// Reading a [`VehicleSensor`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorKind {
	/// `stats.odometer`; `tripEnd` carries `end.odometer`.
	Odometer,
	/// `stats.fuelLevel`; `tripData` points carry `fuelLevelInput`.
	FuelLevel,
	/// `stats.speed`; `tripData` points carry `speed`.
	Speed,
}
impl SensorKind {
	/// Every kind, in creation order.
	pub const ALL: [SensorKind; 3] = [Self::Odometer, Self::FuelLevel, Self::Speed];

	/// Suffix of the unique id.
	pub const fn key(self) -> &'static str {
		match self {
			SensorKind::Odometer => "odometer",
			SensorKind::FuelLevel => "fuelLevel",
			SensorKind::Speed => "speed",
		}
	}

	/// Suffix of the display name.
	pub const fn label(self) -> &'static str {
		match self {
			SensorKind::Odometer => "Odometer",
			SensorKind::FuelLevel => "Fuel Level",
			SensorKind::Speed => "Speed",
		}
	}

	/// Unit of the reading.
	pub const fn unit(self) -> Unit {
		match self {
			SensorKind::Odometer => Unit::Miles,
			SensorKind::FuelLevel => Unit::Percent,
			SensorKind::Speed => Unit::MilesPerHour,
		}
	}

	/// Reading carried by a vehicle document.
	pub fn from_stats(self, stats: &VehicleStats) -> Option<f64> {
		match self {
			SensorKind::Odometer => stats.odometer,
			SensorKind::FuelLevel => stats.fuel_level,
			SensorKind::Speed => stats.speed,
		}
	}

	/// Reading carried by a webhook payload, if its event type feeds this kind.
	pub fn from_event(self, payload: &WebhookPayload) -> Option<f64> {
		match (self, payload.kind()) {
			(SensorKind::Odometer, EventKind::TripEnd) => payload.trip_end_odometer(),
			(SensorKind::FuelLevel, EventKind::TripData) => {
				payload.trip_data().iter().rev().find_map(|point| point.fuel_level_input)
			},
			(SensorKind::Speed, EventKind::TripData) => {
				payload.trip_data().last().and_then(|point| point.speed)
			},
			_ => None,
		}
	}
}
impl Display for SensorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.key())
	}
}

/// Numeric sensor of one vehicle.
#[derive(Debug)]
pub struct VehicleSensor {
	context: VehicleContext,
	kind: SensorKind,
	unique_id: String,
	name: String,
	value: Mutex<f64>,
	last_reset: Mutex<Option<OffsetDateTime>>,
}
impl VehicleSensor {
	/// Creates the `kind` sensor of `vehicle`, or `None` when the vehicle does not report it.
	pub fn new(
		coordinator: Arc<VehiclesCoordinator>,
		vehicle: &Vehicle,
		kind: SensorKind,
	) -> Option<Self> {
		let value = kind.from_stats(&vehicle.stats)?;

		Some(Self {
			context: VehicleContext::new(coordinator, vehicle.vin.clone()),
			kind,
			unique_id: format!("{}_{}", vehicle.vin, kind.key()),
			name: format!("{} {}", vehicle.display_name(), kind.label()),
			value: Mutex::new(value),
			last_reset: Mutex::new(last_reset_of(kind, &vehicle.stats)),
		})
	}

	/// Reading kind.
	pub fn kind(&self) -> SensorKind {
		self.kind
	}

	/// Reading rounded to two decimal places.
	pub fn value(&self) -> f64 {
		round2(*self.value.lock())
	}
}
impl VehicleEntity for VehicleSensor {
	fn context(&self) -> &VehicleContext {
		&self.context
	}

	fn unique_id(&self) -> &str {
		&self.unique_id
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn reading(&self) -> EntityValue {
		EntityValue::Measurement { value: self.value(), unit: self.kind.unit() }
	}

	fn apply_snapshot(&self, vehicle: &Vehicle) {
		if let Some(value) = self.kind.from_stats(&vehicle.stats) {
			*self.value.lock() = value;
		}
		if let Some(reset) = last_reset_of(self.kind, &vehicle.stats) {
			*self.last_reset.lock() = Some(reset);
		}
	}

	fn apply_event(&self, payload: &WebhookPayload) -> bool {
		if payload.vin != self.vin().as_ref() {
			return false;
		}

		match self.kind.from_event(payload) {
			Some(value) => {
				*self.value.lock() = value;

				true
			},
			None => false,
		}
	}

	fn last_reset(&self) -> Option<OffsetDateTime> {
		*self.last_reset.lock()
	}
}

fn last_reset_of(kind: SensorKind, stats: &VehicleStats) -> Option<OffsetDateTime> {
	if kind != SensorKind::Odometer {
		return None;
	}

	let raw = stats.last_updated.as_deref()?;

	match OffsetDateTime::parse(raw, &Rfc3339) {
		Ok(instant) => Some(instant),
		Err(e) => {
			tracing::debug!(last_updated = raw, error = %e, "Ignoring unparsable lastUpdated.");

			None
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	use time::macros::datetime;
	// self
	use super::*;
	use crate::_preludet::{TEST_VIN, idle_coordinator, sample_vehicle};

	fn vehicle() -> Vehicle {
		serde_json::from_value(sample_vehicle()).expect("Sample vehicle should decode.")
	}

	fn sensor(kind: SensorKind) -> VehicleSensor {
		VehicleSensor::new(idle_coordinator(), &vehicle(), kind).expect("Sensor should be created.")
	}

	fn payload(value: serde_json::Value) -> WebhookPayload {
		WebhookPayload::from_value(value).expect("Payload should validate.")
	}

	#[test]
	fn identity_follows_vehicle() {
		let odometer = sensor(SensorKind::Odometer);
		let fuel = sensor(SensorKind::FuelLevel);

		assert_eq!(odometer.unique_id(), format!("{TEST_VIN}_odometer"));
		assert_eq!(odometer.name(), "SPAM Eggs Odometer");
		assert_eq!(fuel.unique_id(), format!("{TEST_VIN}_fuelLevel"));
		assert_eq!(fuel.name(), "SPAM Eggs Fuel Level");
	}

	#[test]
	fn readings_are_rounded_with_units() {
		assert_eq!(
			sensor(SensorKind::Odometer).reading(),
			EntityValue::Measurement { value: 123456.79, unit: Unit::Miles }
		);
		assert_eq!(
			sensor(SensorKind::FuelLevel).reading(),
			EntityValue::Measurement { value: 98.76, unit: Unit::Percent }
		);
		assert_eq!(
			sensor(SensorKind::Speed).reading(),
			EntityValue::Measurement { value: 12.34, unit: Unit::MilesPerHour }
		);
	}

	#[test]
	fn odometer_last_reset_tracks_last_updated() {
		let odometer = sensor(SensorKind::Odometer);

		assert_eq!(odometer.last_reset(), Some(datetime!(2022-01-01 12:00 UTC)));
		assert_eq!(sensor(SensorKind::Speed).last_reset(), None);
	}

	#[test]
	fn missing_stats_skip_sensor() {
		let sparse: Vehicle = serde_json::from_value(json!({ "vin": TEST_VIN, "stats": {} }))
			.expect("Sparse vehicle should decode.");

		for kind in SensorKind::ALL {
			assert!(VehicleSensor::new(idle_coordinator(), &sparse, kind).is_none());
		}
	}

	#[test]
	fn trip_end_sets_odometer() {
		let odometer = sensor(SensorKind::Odometer);

		assert!(odometer.apply_event(&payload(json!({
			"eventType": "tripEnd",
			"imei": "1",
			"vin": TEST_VIN,
			"end": { "timestamp": "2022-01-01T13:00:00.000Z", "odometer": 123500.456 }
		}))));
		assert_eq!(odometer.value(), 123500.46);
	}

	#[test]
	fn fuel_level_scans_trip_data_in_reverse() {
		let fuel = sensor(SensorKind::FuelLevel);
		let changed = fuel.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [
				{ "fuelLevelInput": 80.0, "speed": 30.0 },
				{ "fuelLevelInput": 75.556, "speed": 40.0 },
				{ "speed": 50.0 }
			]
		})));

		assert!(changed);
		assert_eq!(fuel.value(), 75.56);
	}

	#[test]
	fn fuel_level_without_inputs_is_unchanged() {
		let fuel = sensor(SensorKind::FuelLevel);

		assert!(!fuel.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [{ "speed": 50.0 }]
		}))));
		assert_eq!(fuel.value(), 98.76);
	}

	#[test]
	fn speed_uses_last_point() {
		let speed = sensor(SensorKind::Speed);

		assert!(speed.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [{ "speed": 30.0 }, { "speed": 41.236 }]
		}))));
		assert_eq!(speed.value(), 41.24);
	}

	#[test]
	fn malformed_sibling_fields_do_not_hide_a_point() {
		let speed = sensor(SensorKind::Speed);
		let fuel = sensor(SensorKind::FuelLevel);
		let event = payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [
				{ "fuelLevelInput": 80.0, "speed": 10.0 },
				{
					"timestamp": 1_700_000_000,
					"gps": { "lat": 3.0 },
					"fuelLevelInput": 60.0,
					"speed": 20.0
				}
			]
		}));

		assert!(speed.apply_event(&event));
		assert!(fuel.apply_event(&event));
		assert_eq!(speed.value(), 20.0);
		assert_eq!(fuel.value(), 60.0);
	}

	#[test]
	fn events_for_other_vins_or_types_are_ignored() {
		let odometer = sensor(SensorKind::Odometer);

		assert!(!odometer.apply_event(&payload(json!({
			"eventType": "tripEnd",
			"imei": "1",
			"vin": "OTHERVIN",
			"end": { "odometer": 1.0 }
		}))));
		assert!(!odometer.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"end": { "odometer": 1.0 }
		}))));
		assert_eq!(odometer.value(), 123456.79);
	}

	#[test]
	fn snapshot_overwrites_event_reading() {
		let speed = sensor(SensorKind::Speed);

		speed.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [{ "speed": 70.0 }]
		})));
		speed.apply_snapshot(&vehicle());

		assert_eq!(speed.value(), 12.34);
	}
}
