//! GPS tracker of one vehicle.

// self
use crate::{
	_prelude::*,
	coordinator::VehiclesCoordinator,
	entity::{EntityValue, VehicleContext, VehicleEntity, round2},
	model::{EventKind, Location, Vehicle, WebhookPayload},
};

/// Position of a vehicle, fed by `stats.location` and `tripData` GPS fixes.
#[derive(Debug)]
pub struct VehicleTracker {
	context: VehicleContext,
	unique_id: String,
	name: String,
	location: Mutex<Option<Location>>,
}
impl VehicleTracker {
	/// Creates the tracker of `vehicle`, seeded from its stats.
	pub fn new(coordinator: Arc<VehiclesCoordinator>, vehicle: &Vehicle) -> Self {
		Self {
			context: VehicleContext::new(coordinator, vehicle.vin.clone()),
			unique_id: vehicle.vin.to_string(),
			name: vehicle.display_name().to_owned(),
			location: Mutex::new(vehicle.stats.location),
		}
	}

	/// Latitude rounded to two decimal places.
	pub fn latitude(&self) -> Option<f64> {
		self.location.lock().map(|location| round2(location.lat))
	}

	/// Longitude rounded to two decimal places.
	pub fn longitude(&self) -> Option<f64> {
		self.location.lock().map(|location| round2(location.lon))
	}
}
impl VehicleEntity for VehicleTracker {
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
		match *self.location.lock() {
			Some(Location { lat, lon }) => {
				EntityValue::Location { latitude: round2(lat), longitude: round2(lon) }
			},
			None => EntityValue::Unknown,
		}
	}

	fn apply_snapshot(&self, vehicle: &Vehicle) {
		if let Some(location) = vehicle.stats.location {
			*self.location.lock() = Some(location);
		}
	}

	fn apply_event(&self, payload: &WebhookPayload) -> bool {
		if payload.vin != self.vin().as_ref() || payload.kind() != EventKind::TripData {
			return false;
		}

		let Some(gps) = payload.trip_data().last().and_then(|point| point.gps) else {
			return false;
		};

		*self.location.lock() = Some(Location { lat: gps.lat, lon: gps.lon });

		true
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::{TEST_VIN, idle_coordinator, sample_vehicle};

	fn tracker() -> VehicleTracker {
		let vehicle: Vehicle =
			serde_json::from_value(sample_vehicle()).expect("Sample vehicle should decode.");

		VehicleTracker::new(idle_coordinator(), &vehicle)
	}

	fn payload(value: serde_json::Value) -> WebhookPayload {
		WebhookPayload::from_value(value).expect("Payload should validate.")
	}

	#[test]
	fn seeded_from_stats_location() {
		let tracker = tracker();

		assert_eq!(tracker.unique_id(), TEST_VIN);
		assert_eq!(tracker.name(), "SPAM Eggs");
		assert_eq!(tracker.reading(), EntityValue::Location { latitude: 1.23, longitude: 6.79 });
	}

	#[test]
	fn trip_data_uses_last_gps_fix() {
		let tracker = tracker();
		let changed = tracker.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [
				{ "gps": { "lat": 10.0, "lon": 20.0 } },
				{ "gps": { "lat": 52.123456, "lon": 4.987654 } }
			]
		})));

		assert!(changed);
		assert_eq!(tracker.latitude(), Some(52.12));
		assert_eq!(tracker.longitude(), Some(4.99));
	}

	#[test]
	fn last_element_wins_even_with_odd_fields() {
		let tracker = tracker();

		assert!(tracker.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": TEST_VIN,
			"data": [
				{ "gps": { "lat": 1.0, "lon": 2.0 }, "speed": 10.0 },
				{ "timestamp": 1_700_000_000, "gps": { "lat": 3.0, "lon": 4.0 }, "speed": 20.0 }
			]
		}))));
		assert_eq!(tracker.reading(), EntityValue::Location { latitude: 3.0, longitude: 4.0 });
	}

	#[test]
	fn other_vehicles_and_events_are_ignored() {
		let tracker = tracker();
		let gps = json!([{ "gps": { "lat": 10.0, "lon": 20.0 } }]);

		assert!(!tracker.apply_event(&payload(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": "OTHERVIN",
			"data": gps
		}))));
		assert!(!tracker.apply_event(&payload(json!({
			"eventType": "tripStart",
			"imei": "1",
			"vin": TEST_VIN,
			"data": gps
		}))));
		assert_eq!(tracker.latitude(), Some(1.23));
	}
}
