//! Self-describing `serde` impls. Any self-describing format (JSON,
//! MessagePack) round-trips every variant, keeping ints and floats apart.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Map, Value};

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Nothing => serializer.serialize_unit(),
			Self::Bool(val) => serializer.serialize_bool(*val),
			Self::Int(val) => serializer.serialize_i64(*val),
			Self::Float(val) => serializer.serialize_f64(*val),
			Self::String(val) => serializer.serialize_str(val),
			Self::List(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Self::Map(map) => {
				let mut out = serializer.serialize_map(Some(map.len()))?;
				for (key, val) in map {
					out.serialize_entry(key, val)?;
				}
				out.end()
			}
		}
	}
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
	type Value = Value;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("any value")
	}

	fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
		Ok(Value::Nothing)
	}

	fn visit_none<E: de::Error>(self) -> Result<Value, E> {
		Ok(Value::Nothing)
	}

	fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
		Value::deserialize(deserializer)
	}

	fn visit_bool<E: de::Error>(self, val: bool) -> Result<Value, E> {
		Ok(Value::Bool(val))
	}

	fn visit_i64<E: de::Error>(self, val: i64) -> Result<Value, E> {
		Ok(Value::Int(val))
	}

	fn visit_u64<E: de::Error>(self, val: u64) -> Result<Value, E> {
		Ok(Value::from(val))
	}

	fn visit_f64<E: de::Error>(self, val: f64) -> Result<Value, E> {
		Ok(Value::Float(val))
	}

	fn visit_str<E: de::Error>(self, val: &str) -> Result<Value, E> {
		Ok(Value::String(val.to_owned()))
	}

	fn visit_string<E: de::Error>(self, val: String) -> Result<Value, E> {
		Ok(Value::String(val))
	}

	fn visit_bytes<E: de::Error>(self, val: &[u8]) -> Result<Value, E> {
		Ok(Value::from_bytes(val))
	}

	fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
		let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
		while let Some(item) = seq.next_element()? {
			items.push(item);
		}
		Ok(Value::List(items))
	}

	fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
		let mut map = Map::new();
		while let Some((key, val)) = access.next_entry::<String, Value>()? {
			map.insert(key, val);
		}
		Ok(Value::Map(map))
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(ValueVisitor)
	}
}
