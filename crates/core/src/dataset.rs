// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// One growable input column. The variant is fixed up front from the
/// declared parameter type (Dual becomes Numeric); cells are appended in row
/// order as bundles are drained.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnBuffer {
	Numeric(Vec<f64>),
	Text(Vec<String>),
}

impl ColumnBuffer {
	pub fn len(&self) -> usize {
		match self {
			ColumnBuffer::Numeric(values) => values.len(),
			ColumnBuffer::Text(values) => values.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Completed columnar input, in parameter-spec order. Bound to the engine as
/// a single data.frame variable for the duration of one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputDataset {
	columns: Vec<(String, ColumnBuffer)>,
}

impl InputDataset {
	/// Dataset for a call with no declared parameters. Never bound to the
	/// engine.
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn new(columns: Vec<(String, ColumnBuffer)>) -> Self {
		Self { columns }
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}

	pub fn columns(&self) -> &[(String, ColumnBuffer)] {
		&self.columns
	}

	/// Number of rows; all columns have the same length by construction.
	pub fn rows(&self) -> usize {
		self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
	}
}
