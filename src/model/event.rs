//! Webhook payloads pushed by Bouncie and the schema they are validated against.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Payload fields every webhook delivery must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["eventType", "imei", "vin"];

/// Errors raised while validating a webhook body.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SchemaError {
	/// Body is not a JSON object.
	#[error("Webhook body must be a JSON object.")]
	NotAnObject,
	/// A required field is absent.
	#[error("Webhook body is missing `{0}`.")]
	MissingField(&'static str),
	/// A required field cannot be coerced to a string.
	#[error("Webhook field `{field}` cannot be read as a string (found {found}).")]
	InvalidField {
		/// Offending field.
		field: &'static str,
		/// JSON type found instead.
		found: &'static str,
	},
}

/// Webhook event types documented by Bouncie.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
	/// Device plugged in.
	Connect,
	/// Device unplugged.
	Disconnect,
	/// Battery state change.
	Battery,
	/// Malfunction indicator lamp change.
	Mil,
	/// Trip started.
	TripStart,
	/// Trip ended.
	TripEnd,
	/// Trip summary metrics.
	TripMetrics,
	/// Batched trip telemetry.
	TripData,
	/// Any other event type.
	Other(String),
}
impl EventKind {
	/// Maps an `eventType` string to its kind.
	pub fn parse(raw: &str) -> Self {
		match raw {
			"connect" => Self::Connect,
			"disconnect" => Self::Disconnect,
			"battery" => Self::Battery,
			"mil" => Self::Mil,
			"tripStart" => Self::TripStart,
			"tripEnd" => Self::TripEnd,
			"tripMetrics" => Self::TripMetrics,
			"tripData" => Self::TripData,
			other => Self::Other(other.to_owned()),
		}
	}
}

/// Validated webhook body.
///
/// The three required fields are stored as strings; everything else is kept verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
	/// Raw `eventType` value.
	pub event_type: String,
	/// Device IMEI.
	pub imei: String,
	/// Vehicle VIN.
	pub vin: String,
	/// Remaining payload fields.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl WebhookPayload {
	/// Validates a JSON body, coercing the required fields to strings.
	///
	/// Strings, numbers, and booleans are accepted for the required fields; `null`, arrays, and
	/// objects are rejected. Additional fields are allowed.
	pub fn from_value(value: Value) -> Result<Self, SchemaError> {
		let Value::Object(mut extra) = value else {
			return Err(SchemaError::NotAnObject);
		};
		let mut take = |field: &'static str| {
			let value = extra.remove(field).ok_or(SchemaError::MissingField(field))?;

			coerce_string(field, value)
		};
		let [event_type, imei, vin] = REQUIRED_FIELDS;
		let event_type = take(event_type)?;
		let imei = take(imei)?;
		let vin = take(vin)?;

		Ok(Self { event_type, imei, vin, extra })
	}

	/// Event kind derived from `eventType`.
	pub fn kind(&self) -> EventKind {
		EventKind::parse(&self.event_type)
	}

	/// Telemetry points carried by a `tripData` event, in delivery order.
	///
	/// Every element of `data` yields one point, read field by field; a field that is absent or
	/// has the wrong type is `None` without affecting its siblings.
	pub fn trip_data(&self) -> Vec<TripDataPoint> {
		match self.extra.get("data") {
			Some(Value::Array(points)) => points.iter().map(TripDataPoint::read).collect(),
			_ => Vec::new(),
		}
	}

	/// `end.odometer` of a `tripEnd` event.
	pub fn trip_end_odometer(&self) -> Option<f64> {
		self.extra.get("end")?.get("odometer")?.as_f64()
	}

	/// Payload plus `client_id`, as republished on the event bus.
	pub fn to_event_data(&self, client_id: &str) -> Value {
		let mut data = self.extra.clone();

		data.insert("eventType".into(), Value::String(self.event_type.clone()));
		data.insert("imei".into(), Value::String(self.imei.clone()));
		data.insert("vin".into(), Value::String(self.vin.clone()));
		data.insert("client_id".into(), Value::String(client_id.to_owned()));

		Value::Object(data)
	}
}

/// One element of a `tripData` event's `data` array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDataPoint {
	/// Sample timestamp.
	#[serde(default)]
	pub timestamp: Option<String>,
	/// GPS fix.
	#[serde(default)]
	pub gps: Option<GpsFix>,
	/// Speed in mph.
	#[serde(default)]
	pub speed: Option<f64>,
	/// Fuel level in percent, present on some samples only.
	#[serde(default)]
	pub fuel_level_input: Option<f64>,
}
impl TripDataPoint {
	fn read(value: &Value) -> Self {
		Self {
			timestamp: value.get("timestamp").and_then(Value::as_str).map(ToOwned::to_owned),
			gps: value.get("gps").and_then(GpsFix::read),
			speed: value.get("speed").and_then(Value::as_f64),
			fuel_level_input: value.get("fuelLevelInput").and_then(Value::as_f64),
		}
	}
}

/// GPS fix inside a telemetry point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
	/// Latitude in degrees.
	pub lat: f64,
	/// Longitude in degrees.
	pub lon: f64,
	/// Heading in degrees.
	#[serde(default)]
	pub heading: Option<f64>,
}
impl GpsFix {
	fn read(value: &Value) -> Option<Self> {
		Some(Self {
			lat: value.get("lat")?.as_f64()?,
			lon: value.get("lon")?.as_f64()?,
			heading: value.get("heading").and_then(Value::as_f64),
		})
	}
}

fn coerce_string(field: &'static str, value: Value) -> Result<String, SchemaError> {
	match value {
		Value::String(s) => Ok(s),
		Value::Number(n) => Ok(n.to_string()),
		Value::Bool(b) => Ok(b.to_string()),
		Value::Null => Err(SchemaError::InvalidField { field, found: "null" }),
		Value::Array(_) => Err(SchemaError::InvalidField { field, found: "array" }),
		Value::Object(_) => Err(SchemaError::InvalidField { field, found: "object" }),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn required_fields_are_coerced_and_extras_kept() {
		let payload = WebhookPayload::from_value(json!({
			"eventType": "tripStart",
			"imei": 352_602_111_111_111_u64,
			"vin": "ABCDEFG123456NOP7",
			"transactionId": "abc",
		}))
		.expect("Payload should validate.");

		assert_eq!(payload.imei, "352602111111111");
		assert_eq!(payload.kind(), EventKind::TripStart);
		assert_eq!(payload.extra.get("transactionId"), Some(&json!("abc")));
		assert!(!payload.extra.contains_key("vin"));
	}

	#[test]
	fn missing_or_structured_fields_are_rejected() {
		assert_eq!(
			WebhookPayload::from_value(json!({ "eventType": "connect", "imei": "1" })),
			Err(SchemaError::MissingField("vin"))
		);
		assert_eq!(
			WebhookPayload::from_value(json!({ "eventType": {}, "imei": "1", "vin": "2" })),
			Err(SchemaError::InvalidField { field: "eventType", found: "object" })
		);
		assert_eq!(WebhookPayload::from_value(json!([1, 2])), Err(SchemaError::NotAnObject));
	}

	#[test]
	fn trip_helpers_read_nested_fields() {
		let payload = WebhookPayload::from_value(json!({
			"eventType": "tripData",
			"imei": "1",
			"vin": "2",
			"data": [
				{ "gps": { "lat": 1.0, "lon": 2.0 }, "speed": 10.0, "fuelLevelInput": 50.0 },
				"garbage",
				{ "gps": { "lat": 3.0, "lon": 4.0 }, "speed": 20.0 }
			],
			"end": { "odometer": 1000.5 }
		}))
		.expect("Payload should validate.");
		let points = payload.trip_data();

		assert_eq!(points.len(), 3);
		assert_eq!(points[1], TripDataPoint::default());
		assert_eq!(points[2].gps.map(|gps| gps.lat), Some(3.0));
		assert_eq!(points[0].fuel_level_input, Some(50.0));
		assert_eq!(payload.trip_end_odometer(), Some(1000.5));

		let data = payload.to_event_data("spam-eggs");

		assert_eq!(data["client_id"], json!("spam-eggs"));
		assert_eq!(data["eventType"], json!("tripData"));
	}
}
