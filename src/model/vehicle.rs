//! Vehicle and user documents served by `GET /v1/vehicles` and `GET /v1/user`.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, auth::Vin};

/// Authenticated Bouncie user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
	/// User identifier.
	#[serde(default)]
	pub id: Option<String>,
	/// Account e-mail address.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// One vehicle with its latest reported stats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
	/// Vehicle identification number.
	pub vin: Vin,
	/// IMEI of the installed device.
	#[serde(default)]
	pub imei: Option<String>,
	/// User-assigned nickname.
	#[serde(default)]
	pub nick_name: Option<String>,
	/// Make/model/year.
	#[serde(default)]
	pub model: VehicleModel,
	/// Latest reported readings.
	#[serde(default)]
	pub stats: VehicleStats,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl Vehicle {
	/// Nickname when set, the VIN otherwise.
	pub fn display_name(&self) -> &str {
		self.nick_name.as_deref().filter(|name| !name.is_empty()).unwrap_or(&self.vin)
	}
}

/// Vehicle make and model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleModel {
	/// Manufacturer.
	#[serde(default)]
	pub make: Option<String>,
	/// Model name.
	#[serde(default)]
	pub name: Option<String>,
	/// Model year.
	#[serde(default)]
	pub year: Option<i64>,
}

/// Readings reported with the vehicle document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStats {
	/// UTC offset of the vehicle, e.g. `-0500`.
	#[serde(default)]
	pub local_time_zone: Option<String>,
	/// RFC 3339 instant of the last report.
	#[serde(default)]
	pub last_updated: Option<String>,
	/// Odometer in miles.
	#[serde(default)]
	pub odometer: Option<f64>,
	/// Last known position.
	#[serde(default)]
	pub location: Option<Location>,
	/// Fuel level in percent.
	#[serde(default)]
	pub fuel_level: Option<f64>,
	/// Speed in mph.
	#[serde(default)]
	pub speed: Option<f64>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Geographic coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
	/// Latitude in degrees.
	pub lat: f64,
	/// Longitude in degrees.
	pub lon: f64,
}
