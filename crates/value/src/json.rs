use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{ConversionError, Value};

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Self::Nothing,
			serde_json::Value::Bool(val) => Self::Bool(val),
			serde_json::Value::Number(num) => match num.as_i64() {
				Some(val) => Self::Int(val),
				None => Self::Float(num.as_f64().unwrap_or(f64::NAN)),
			},
			serde_json::Value::String(val) => Self::String(val),
			serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
			serde_json::Value::Object(map) => Self::Map(map.into_iter().map(|(key, val)| (key, Self::from(val))).collect()),
		}
	}
}

impl Value {
	/// JSON form. Non-finite floats become `null`.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Self::Nothing => serde_json::Value::Null,
			Self::Bool(val) => serde_json::Value::Bool(*val),
			Self::Int(val) => serde_json::Value::from(*val),
			Self::Float(val) => serde_json::Number::from_f64(*val).map_or(serde_json::Value::Null, serde_json::Value::Number),
			Self::String(val) => serde_json::Value::String(val.clone()),
			Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
			Self::Map(map) => serde_json::Value::Object(map.iter().map(|(key, val)| (key.clone(), val.to_json())).collect()),
		}
	}

	/// Converts any serializable host value, e.g. a struct, into a [`Value`].
	pub fn from_serialize<T: Serialize + ?Sized>(native: &T) -> Result<Self, ConversionError> {
		serde_json::to_value(native).map(Self::from).map_err(|err| ConversionError::Serde(err.to_string()))
	}

	/// Converts back into a native container of matching shape.
	pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, ConversionError> {
		serde_json::from_value(self.to_json()).map_err(|err| ConversionError::Serde(err.to_string()))
	}
}
