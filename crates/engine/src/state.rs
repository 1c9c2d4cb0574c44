use lmb_value::{Map, Value};

/// Key/value context owned by exactly one evaluation.
///
/// The host seeds it before [`Engine::eval`](crate::Engine::eval) and reads
/// the script's writes back afterwards; scripts see it as `require('@lmb').state`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationState {
	entries: Map,
}

impl EvaluationState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.entries.get(key)
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.entries.insert(key.into(), value.into());
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.entries.remove(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl From<Map> for EvaluationState {
	fn from(entries: Map) -> Self {
		Self { entries }
	}
}

impl FromIterator<(String, Value)> for EvaluationState {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self { entries: iter.into_iter().collect() }
	}
}
