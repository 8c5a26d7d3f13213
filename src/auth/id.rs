//! Strongly typed identifiers shared by entries, providers, and vehicles.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, entry, provider, vin).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, entry, provider, vin).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, entry, provider, vin).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ClientId, "Bouncie application client identifier; also the webhook secret.", "Client" }
def_id! { EntryId, "Identifier of a stored config entry.", "Entry" }
def_id! { ProviderId, "Identifier for an OAuth provider descriptor.", "Provider" }
def_id! { Vin, "Vehicle identification number keying every per-vehicle entity.", "Vin" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty_values() {
		assert!(ClientId::new(" spam-eggs").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("spam-eggs ").is_err(), "Trailing whitespace must be rejected.");

		let client = ClientId::new("spam-eggs").expect("Client fixture should be valid.");

		assert_eq!(client.as_ref(), "spam-eggs");
		assert!(EntryId::new("").is_err());
		assert!(ProviderId::new("with space").is_err());
		assert!(Vin::new(format!("ABC{}123", '\u{00A0}')).is_err());
	}

	#[test]
	fn deserialization_enforces_validation() {
		let vin: Vin = serde_json::from_str("\"ABCDEFG123456NOP7\"")
			.expect("VIN should deserialize successfully.");

		assert_eq!(vin.as_ref(), "ABCDEFG123456NOP7");
		assert_eq!(format!("{vin:?}"), "Vin(ABCDEFG123456NOP7)");
		assert!(serde_json::from_str::<Vin>("\"\"").is_err());
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		EntryId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(EntryId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn borrow_supports_lookup_by_str() {
		let map: HashMap<Vin, u8> = HashMap::from_iter([(
			Vin::new("ABCDEFG123456NOP7").expect("VIN used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("ABCDEFG123456NOP7"), Some(&7));
	}
}
