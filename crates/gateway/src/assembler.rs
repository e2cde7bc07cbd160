// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Pivots the inbound row-bundle stream into engine-native columns.

use futures_util::{Stream, StreamExt};
use rbridge_core::{ColumnBuffer, DataType, Error, InputDataset, ParameterSpec, Result};
use tonic::Status;
use tracing::trace;

use crate::proto::BundledRows;

/// Drain `input` to completion and produce one column per declared
/// parameter, in spec order.
///
/// Cells are taken positionally: column order is assumed identical across
/// all bundles, and a row with fewer cells than the spec declares is a
/// contract violation. Dual parameters are materialized as numeric (the
/// engine has no dual type). An empty spec yields an empty dataset without
/// touching the stream.
pub async fn assemble<In>(spec: &ParameterSpec, mut input: In) -> Result<InputDataset>
where
	In: Stream<Item = std::result::Result<BundledRows, Status>> + Unpin,
{
	if spec.is_empty() {
		return Ok(InputDataset::empty());
	}

	let mut buffers: Vec<ColumnBuffer> = spec
		.iter()
		.map(|field| match field.data_type.materialized() {
			DataType::String => ColumnBuffer::Text(Vec::new()),
			_ => ColumnBuffer::Numeric(Vec::new()),
		})
		.collect();

	let mut rows = 0usize;
	while let Some(bundle) = input.next().await {
		let bundle = bundle.map_err(|status| Error::transport(format!("inbound stream failed: {status}")))?;
		for row in bundle.rows {
			if row.duals.len() < spec.len() {
				return Err(Error::schema(format!(
					"input row {rows} has {} cells, expected {}",
					row.duals.len(),
					spec.len()
				)));
			}
			for (buffer, dual) in buffers.iter_mut().zip(row.duals) {
				match buffer {
					ColumnBuffer::Numeric(values) => values.push(dual.num_data),
					ColumnBuffer::Text(values) => values.push(dual.str_data),
				}
			}
			rows += 1;
		}
	}
	trace!("assembled {} input columns with {rows} rows", buffers.len());

	Ok(InputDataset::new(
		spec.iter().map(|field| field.name.clone()).zip(buffers).collect(),
	))
}
