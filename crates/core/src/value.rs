// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Decoded engine result value.
///
/// R values come off the wire dynamically typed; they are decoded into this
/// tagged form exactly once, at the transport boundary, and consumed by
/// exhaustive matching downstream. String elements are optional because R
/// distinguishes `NA` from the empty string, and boolean elements for the
/// same reason.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
	Null,
	Bool(Vec<Option<bool>>),
	Int(Vec<i32>),
	Double(Vec<f64>),
	Strings(Vec<Option<String>>),
	List {
		values: Vec<EngineValue>,
		/// Element names from the vector's own `names` attribute, when
		/// present. Parallel to `values`.
		names: Option<Vec<Option<String>>>,
		/// Remaining attributes (`class`, `row.names`, ...), in
		/// attribute order.
		attributes: Vec<(String, EngineValue)>,
	},
}

impl EngineValue {
	/// Element count of a bare vector, or the list arity.
	pub fn len(&self) -> usize {
		match self {
			EngineValue::Null => 0,
			EngineValue::Bool(v) => v.len(),
			EngineValue::Int(v) => v.len(),
			EngineValue::Double(v) => v.len(),
			EngineValue::Strings(v) => v.len(),
			EngineValue::List { values, .. } => values.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// First string of a character vector, if that is what this is.
	/// Diagnostic helpers (`geterrmessage()`) return such values.
	pub fn as_string(&self) -> Option<&str> {
		match self {
			EngineValue::Strings(v) => v.first().and_then(|s| s.as_deref()),
			_ => None,
		}
	}

	/// All strings of a character vector, NA elements skipped.
	pub fn as_strings(&self) -> Vec<&str> {
		match self {
			EngineValue::Strings(v) => v.iter().filter_map(|s| s.as_deref()).collect(),
			_ => Vec::new(),
		}
	}
}
