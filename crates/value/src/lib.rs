//! Dynamic value model exchanged across the script sandbox boundary.
//!
//! [`Value`] is the host-side mirror of the data a Lua script can produce or
//! consume. Conversions are total in both directions:
//!
//! * Lua -> [`Value`] and back through [`mlua::FromLua`]/[`mlua::IntoLua`]
//!   (see the `lua` module for the table shape rules).
//! * Native Rust values -> [`Value`] through the `From` impls below, and any
//!   `serde` type through [`Value::from_serialize`]/[`Value::deserialize_into`].
//! * [`Value`] <-> durable bytes through its self-describing `serde` impls.
//!
//! Integer identity is preserved everywhere: Lua integers become
//! [`Value::Int`], Lua floats become [`Value::Float`], and neither is widened
//! into the other by the bridge or by serialization.

mod json;
mod lua;
mod serde_impl;

use std::collections::BTreeMap;
use std::fmt;

pub use lua::MAX_DEPTH;

/// Associative container used by [`Value::Map`].
pub type Map = BTreeMap<String, Value>;

/// Dynamic value crossing the sandbox boundary.
///
/// Lua tables cannot hold `nil` and have no separate empty-array form, so two
/// shapes do not survive a trip through Lua: an empty [`Value::List`] comes
/// back as an empty [`Value::Map`], and a list is cut at its first
/// [`Value::Nothing`] element.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
	#[default]
	Nothing,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	List(Vec<Value>),
	Map(Map),
}

impl Value {
	/// Surfaces raw bytes as text when they are valid UTF-8, otherwise as a
	/// list of byte values.
	pub fn from_bytes(bytes: &[u8]) -> Self {
		match std::str::from_utf8(bytes) {
			Ok(text) => Self::String(text.to_owned()),
			Err(_) => Self::List(bytes.iter().map(|byte| Self::Int(i64::from(*byte))).collect()),
		}
	}

	pub fn get_type(&self) -> ValueType {
		match self {
			Self::Nothing => ValueType::Nothing,
			Self::Bool(_) => ValueType::Bool,
			Self::Int(_) => ValueType::Int,
			Self::Float(_) => ValueType::Float,
			Self::String(_) => ValueType::String,
			Self::List(_) => ValueType::List,
			Self::Map(_) => ValueType::Map,
		}
	}

	pub fn is_nothing(&self) -> bool {
		matches!(self, Self::Nothing)
	}

	pub fn as_bool(&self) -> Result<bool, ValueTypeError> {
		match self {
			Self::Bool(val) => Ok(*val),
			other => Err(ValueTypeError::new("bool", other.get_type())),
		}
	}

	pub fn as_int(&self) -> Result<i64, ValueTypeError> {
		match self {
			Self::Int(val) => Ok(*val),
			other => Err(ValueTypeError::new("int", other.get_type())),
		}
	}

	pub fn as_float(&self) -> Result<f64, ValueTypeError> {
		match self {
			Self::Float(val) => Ok(*val),
			other => Err(ValueTypeError::new("float", other.get_type())),
		}
	}

	pub fn as_str(&self) -> Result<&str, ValueTypeError> {
		match self {
			Self::String(val) => Ok(val),
			other => Err(ValueTypeError::new("string", other.get_type())),
		}
	}

	pub fn as_list(&self) -> Result<&[Value], ValueTypeError> {
		match self {
			Self::List(vals) => Ok(vals),
			other => Err(ValueTypeError::new("list", other.get_type())),
		}
	}

	pub fn as_map(&self) -> Result<&Map, ValueTypeError> {
		match self {
			Self::Map(val) => Ok(val),
			other => Err(ValueTypeError::new("map", other.get_type())),
		}
	}

	/// Looks up a key when the value is a map.
	pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
		match self {
			Self::Map(map) => map.get(key.as_ref()),
			_ => None,
		}
	}

	/// Textual form of a scalar, `None` for null and containers.
	pub fn scalar_text(&self) -> Option<String> {
		match self {
			Self::Bool(val) => Some(val.to_string()),
			Self::Int(val) => Some(val.to_string()),
			Self::Float(val) => Some(val.to_string()),
			Self::String(val) => Some(val.clone()),
			Self::Nothing | Self::List(_) | Self::Map(_) => None,
		}
	}
}

/// Textual representation used for response bodies: null renders empty,
/// scalars render bare, containers render as JSON.
impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Nothing => Ok(()),
			Self::Bool(val) => write!(f, "{val}"),
			Self::Int(val) => write!(f, "{val}"),
			Self::Float(val) => write!(f, "{val}"),
			Self::String(val) => f.write_str(val),
			Self::List(_) | Self::Map(_) => {
				let encoded = serde_json::to_string(self).map_err(|_| fmt::Error)?;
				f.write_str(&encoded)
			}
		}
	}
}

impl From<()> for Value {
	fn from((): ()) -> Self {
		Self::Nothing
	}
}

impl From<bool> for Value {
	fn from(val: bool) -> Self {
		Self::Bool(val)
	}
}

macro_rules! int_from {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for Value {
				fn from(val: $ty) -> Self {
					Self::Int(i64::from(val))
				}
			}
		)*
	};
}

int_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
	fn from(val: u64) -> Self {
		i64::try_from(val).map_or(Self::Float(val as f64), Self::Int)
	}
}

impl From<usize> for Value {
	fn from(val: usize) -> Self {
		Self::from(val as u64)
	}
}

impl From<f32> for Value {
	fn from(val: f32) -> Self {
		Self::Float(f64::from(val))
	}
}

impl From<f64> for Value {
	fn from(val: f64) -> Self {
		Self::Float(val)
	}
}

impl From<&str> for Value {
	fn from(val: &str) -> Self {
		Self::String(val.to_owned())
	}
}

impl From<String> for Value {
	fn from(val: String) -> Self {
		Self::String(val)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(val: Option<T>) -> Self {
		val.map_or(Self::Nothing, Into::into)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(vals: Vec<T>) -> Self {
		Self::List(vals.into_iter().map(Into::into).collect())
	}
}

impl<T: Clone + Into<Value>> From<&[T]> for Value {
	fn from(vals: &[T]) -> Self {
		Self::List(vals.iter().cloned().map(Into::into).collect())
	}
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
	fn from(map: BTreeMap<K, V>) -> Self {
		Self::Map(map.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
	}
}

impl<K: Into<String>, V: Into<Value>, S> From<std::collections::HashMap<K, V, S>> for Value {
	fn from(map: std::collections::HashMap<K, V, S>) -> Self {
		Self::Map(map.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
	}
}

impl FromIterator<Value> for Value {
	fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
		Self::List(iter.into_iter().collect())
	}
}

impl FromIterator<(String, Value)> for Value {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self::Map(iter.into_iter().collect())
	}
}

/// Coarse value type used for diagnostics and store metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
	Nothing,
	Bool,
	Int,
	Float,
	String,
	List,
	Map,
}

impl ValueType {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Nothing => "nothing",
			Self::Bool => "bool",
			Self::Int => "int",
			Self::Float => "float",
			Self::String => "string",
			Self::List => "list",
			Self::Map => "map",
		}
	}
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned by typed accessors like [`Value::as_map`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, got {got}")]
pub struct ValueTypeError {
	expected: &'static str,
	got: ValueType,
}

impl ValueTypeError {
	pub fn new(expected: &'static str, got: ValueType) -> Self {
		Self { expected, got }
	}
}

/// Failure converting between [`Value`] and another data model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
	#[error("value nesting exceeds {0} levels (cyclic table?)")]
	TooDeep(usize),
	#[error("{0}")]
	Serde(String),
}
