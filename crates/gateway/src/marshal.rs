// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Turns a decoded engine value back into the host's chunked row-stream
//! shape: one table-schema header plus bounded bundles of dual-cell rows.

use rbridge_core::{BUNDLE_ROWS, DataType, EngineValue, Error, Result};
use rbridge_rserve::codec::NA_INT;
use tracing::trace;

use crate::proto::{self, BundledRows, Dual, FieldDescription, Row, TableDescription};

/// Everything the service needs to answer one call: the schema header
/// (sent as response metadata before any data), the data bundles in row
/// order, and whether the host may cache the result.
#[derive(Debug)]
pub struct MarshalledResult {
	pub table: TableDescription,
	pub bundles: Vec<BundledRows>,
	pub cacheable: bool,
}

/// One decoded result column. Numeric covers R's boolean, integer and
/// double vectors; anything else is a schema violation.
struct ResultColumn<'a> {
	name: String,
	data_type: DataType,
	values: ColumnValues<'a>,
}

enum ColumnValues<'a> {
	Numeric(Vec<f64>),
	Text(&'a [Option<String>]),
}

impl ColumnValues<'_> {
	fn len(&self) -> usize {
		match self {
			ColumnValues::Numeric(v) => v.len(),
			ColumnValues::Text(v) => v.len(),
		}
	}

	fn dual(&self, row: usize) -> Dual {
		match self {
			ColumnValues::Numeric(v) => Dual {
				num_data: v[row],
				str_data: String::new(),
			},
			ColumnValues::Text(v) => Dual {
				num_data: 0.0,
				str_data: v[row].clone().unwrap_or_default(),
			},
		}
	}
}

/// Classify `result`, infer the table schema, and chunk the rows.
///
/// `expected_first` is only set for function-dispatch calls: the inferred
/// type of the first column must match the function's declared return type,
/// checked before anything is produced.
pub fn marshal(
	result: &EngineValue,
	expected_first: Option<(&str, DataType)>,
	cacheable: bool,
) -> Result<MarshalledResult> {
	let mut columns = decode_columns(result)?;

	let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
	for column in &columns {
		if column.values.len() != rows {
			return Err(Error::schema(format!(
				"result column '{}' has {} rows, expected {rows}",
				column.name,
				column.values.len()
			)));
		}
	}

	if let Some((function, expected)) = expected_first {
		let first = columns.first_mut().ok_or_else(|| Error::schema("result has no columns"))?;
		if first.data_type != expected.materialized() {
			return Err(Error::TypeMismatch {
				function: function.to_string(),
				expected: expected.materialized(),
				actual: first.data_type,
			});
		}
		// An unnamed result column takes the function's declared name.
		if first.name.is_empty() {
			first.name = function.to_string();
		}
	}

	let table = TableDescription {
		fields: columns
			.iter()
			.map(|column| FieldDescription {
				data_type: match column.data_type {
					DataType::String => proto::DataType::String as i32,
					_ => proto::DataType::Numeric as i32,
				},
				name: column.name.clone(),
				tags: Vec::new(),
			})
			.collect(),
		name: String::new(),
		number_of_rows: rows as i64,
	};

	let mut bundles = Vec::with_capacity(rows.div_ceil(BUNDLE_ROWS));
	let mut start = 0;
	while start < rows {
		let end = (start + BUNDLE_ROWS).min(rows);
		let bundle_rows = (start..end)
			.map(|row| Row {
				duals: columns.iter().map(|column| column.values.dual(row)).collect(),
			})
			.collect();
		bundles.push(BundledRows { rows: bundle_rows });
		start = end;
	}
	trace!("marshalled {} columns, {rows} rows into {} bundles", columns.len(), bundles.len());

	Ok(MarshalledResult {
		table,
		bundles,
		cacheable,
	})
}

fn decode_columns(result: &EngineValue) -> Result<Vec<ResultColumn<'_>>> {
	match result {
		// Legacy shape: one implicit, unnamed column.
		EngineValue::Bool(_) | EngineValue::Int(_) | EngineValue::Double(_) | EngineValue::Strings(_) => {
			Ok(vec![decode_column(String::new(), result)?])
		}
		EngineValue::List {
			values,
			names,
			attributes,
		} => {
			let names = effective_names(names.as_ref(), attributes);
			values
				.iter()
				.enumerate()
				.map(|(index, value)| {
					let name = names
						.and_then(|n| n.get(index))
						.and_then(|n| n.clone())
						.unwrap_or_default();
					decode_column(name, value)
				})
				.collect()
		}
		EngineValue::Null => Err(Error::schema("engine returned no value")),
	}
}

/// The list's own `names`, falling back to a `names` entry among the
/// remaining attributes.
fn effective_names<'a>(
	names: Option<&'a Vec<Option<String>>>,
	attributes: &'a [(String, EngineValue)],
) -> Option<&'a Vec<Option<String>>> {
	names.or_else(|| {
		attributes.iter().find_map(|(tag, value)| match (tag.as_str(), value) {
			("names", EngineValue::Strings(items)) => Some(items),
			_ => None,
		})
	})
}

fn decode_column(name: String, value: &EngineValue) -> Result<ResultColumn<'_>> {
	let (data_type, values) = match value {
		EngineValue::Bool(v) => (
			DataType::Numeric,
			ColumnValues::Numeric(
				v.iter()
					.map(|b| match b {
						Some(true) => 1.0,
						Some(false) => 0.0,
						None => f64::NAN,
					})
					.collect(),
			),
		),
		EngineValue::Int(v) => (
			DataType::Numeric,
			// NA_integer_ is a sentinel, not data
			ColumnValues::Numeric(v.iter().map(|&i| if i == NA_INT { f64::NAN } else { i as f64 }).collect()),
		),
		EngineValue::Double(v) => (DataType::Numeric, ColumnValues::Numeric(v.clone())),
		EngineValue::Strings(v) => (DataType::String, ColumnValues::Text(v)),
		EngineValue::Null | EngineValue::List { .. } => {
			return Err(Error::schema(format!(
				"result column '{name}' is not a typed vector"
			)));
		}
	};
	Ok(ResultColumn {
		name,
		data_type,
		values,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table(columns: Vec<(&str, EngineValue)>) -> EngineValue {
		let names = columns.iter().map(|(name, _)| Some(name.to_string())).collect();
		EngineValue::List {
			values: columns.into_iter().map(|(_, v)| v).collect(),
			names: Some(names),
			attributes: Vec::new(),
		}
	}

	#[test]
	fn bundles_are_capped_at_2000_rows() {
		let result = table(vec![("v", EngineValue::Double((0..4500).map(f64::from).collect()))]);
		let marshalled = marshal(&result, None, true).unwrap();

		assert_eq!(marshalled.table.number_of_rows, 4500);
		assert_eq!(marshalled.bundles.len(), 3);
		assert_eq!(marshalled.bundles[0].rows.len(), 2000);
		assert_eq!(marshalled.bundles[1].rows.len(), 2000);
		assert_eq!(marshalled.bundles[2].rows.len(), 500);
		// row order preserved across bundle boundaries
		assert_eq!(marshalled.bundles[1].rows[0].duals[0].num_data, 2000.0);
		assert_eq!(marshalled.bundles[2].rows[499].duals[0].num_data, 4499.0);
	}

	#[test]
	fn infers_types_and_names_for_table_results() {
		let result = table(vec![
			("flag", EngineValue::Bool(vec![Some(true), Some(false)])),
			("n", EngineValue::Int(vec![7, 8])),
			("label", EngineValue::Strings(vec![Some("a".into()), None])),
		]);
		let marshalled = marshal(&result, None, true).unwrap();

		let fields = &marshalled.table.fields;
		assert_eq!(fields.len(), 3);
		assert_eq!(fields[0].name, "flag");
		assert_eq!(fields[0].data_type, proto::DataType::Numeric as i32);
		assert_eq!(fields[1].data_type, proto::DataType::Numeric as i32);
		assert_eq!(fields[2].data_type, proto::DataType::String as i32);

		let row = &marshalled.bundles[0].rows[1];
		assert_eq!(row.duals[0].num_data, 0.0);
		assert_eq!(row.duals[1].num_data, 8.0);
		// NA strings travel as the empty string
		assert_eq!(row.duals[2].str_data, "");
	}

	#[test]
	fn integer_and_boolean_na_become_nan() {
		let result = table(vec![
			("n", EngineValue::Int(vec![7, NA_INT])),
			("flag", EngineValue::Bool(vec![None, Some(true)])),
		]);
		let marshalled = marshal(&result, None, true).unwrap();

		let rows = &marshalled.bundles[0].rows;
		assert_eq!(rows[0].duals[0].num_data, 7.0);
		assert!(rows[1].duals[0].num_data.is_nan());
		assert!(rows[0].duals[1].num_data.is_nan());
		assert_eq!(rows[1].duals[1].num_data, 1.0);
	}

	#[test]
	fn bare_vector_is_one_unnamed_column() {
		let marshalled = marshal(&EngineValue::Double(vec![1.0, 2.0]), None, true).unwrap();
		assert_eq!(marshalled.table.fields.len(), 1);
		assert_eq!(marshalled.table.fields[0].name, "");
		assert_eq!(marshalled.bundles.len(), 1);
		assert_eq!(marshalled.bundles[0].rows.len(), 2);
	}

	#[test]
	fn unequal_column_lengths_fail_before_any_bundle_is_built() {
		let result = table(vec![
			("a", EngineValue::Double(vec![1.0, 2.0])),
			("b", EngineValue::Double(vec![1.0])),
		]);
		assert!(matches!(marshal(&result, None, true), Err(Error::Schema { .. })));
	}

	#[test]
	fn nested_list_column_is_a_schema_error() {
		let result = table(vec![(
			"nested",
			EngineValue::List {
				values: vec![],
				names: None,
				attributes: vec![],
			},
		)]);
		assert!(matches!(marshal(&result, None, true), Err(Error::Schema { .. })));
	}

	#[test]
	fn declared_return_type_is_enforced() {
		let result = table(vec![("v", EngineValue::Strings(vec![Some("x".into())]))]);
		let err = marshal(&result, Some(("MyFunc", DataType::Numeric)), true).unwrap_err();
		assert!(matches!(err, Error::TypeMismatch { .. }));

		// Dual declarations accept numeric results
		let result = table(vec![("v", EngineValue::Double(vec![1.0]))]);
		assert!(marshal(&result, Some(("MyFunc", DataType::Dual)), true).is_ok());
	}

	#[test]
	fn names_fall_back_to_the_names_attribute() {
		let result = EngineValue::List {
			values: vec![EngineValue::Double(vec![1.0])],
			names: None,
			attributes: vec![(
				"names".to_string(),
				EngineValue::Strings(vec![Some("fallback".into())]),
			)],
		};
		let marshalled = marshal(&result, None, true).unwrap();
		assert_eq!(marshalled.table.fields[0].name, "fallback");
	}

	#[test]
	fn cacheable_flag_passes_through() {
		let marshalled = marshal(&EngineValue::Double(vec![1.0]), None, false).unwrap();
		assert!(!marshalled.cacheable);
	}
}
