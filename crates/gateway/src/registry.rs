// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Function catalog: pre-registered R functions the host may call by id.
//!
//! Loaded once at startup from a JSON file; the file format keeps the field
//! names of the original deployment so existing catalogs keep working.
//! Parameter order inside the `Params` object is significant (it is the
//! column order of the inbound stream) and is preserved on load.

use std::{collections::HashSet, fs, path::Path};

use indexmap::IndexMap;
use rbridge_core::{DataType, Error, ParameterField, ParameterSpec, Result};
use serde::Deserialize;
use tracing::info;

use crate::proto;

#[derive(Debug, Deserialize)]
struct CatalogFile {
	functions: Vec<CatalogFunction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogFunction {
	id: i32,
	name: String,
	function_type: i32,
	return_type: i32,
	#[serde(default = "default_cacheable")]
	cache_result_in_qlik: bool,
	#[serde(rename = "FunctionRScript")]
	function_r_script: String,
	params: IndexMap<String, i32>,
}

fn default_cacheable() -> bool {
	true
}

/// One validated catalog entry.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
	pub id: i32,
	pub name: String,
	pub function_type: proto::FunctionType,
	pub return_type: DataType,
	pub cacheable: bool,
	pub script: String,
	pub params: ParameterSpec,
}

/// Immutable id → function catalog.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
	functions: Vec<FunctionEntry>,
}

impl FunctionRegistry {
	/// Registry for a deployment without a catalog file: capability
	/// listing is empty and every id lookup fails.
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path).map_err(|err| Error::Catalog {
			message: format!("cannot read {}: {err}", path.display()),
		})?;
		Self::from_json(&raw)
	}

	pub fn from_json(raw: &str) -> Result<Self> {
		let file: CatalogFile = serde_json::from_str(raw).map_err(|err| Error::Catalog {
			message: format!("invalid function catalog: {err}"),
		})?;
		if file.functions.is_empty() {
			return Err(Error::Catalog {
				message: "function catalog defines no functions".to_string(),
			});
		}

		let mut seen = HashSet::new();
		let mut functions = Vec::with_capacity(file.functions.len());
		for func in file.functions {
			if !seen.insert(func.id) {
				return Err(Error::Catalog {
					message: format!("function id {} is not unique", func.id),
				});
			}
			functions.push(Self::validate(func)?);
		}

		for func in &functions {
			info!(
				"defined function {} (id {}, {:?}, returns {})",
				func.name, func.id, func.function_type, func.return_type
			);
		}
		Ok(Self { functions })
	}

	fn validate(func: CatalogFunction) -> Result<FunctionEntry> {
		if func.name.is_empty() {
			return Err(Error::Catalog {
				message: format!("function id {} has an empty name", func.id),
			});
		}
		let function_type = proto::FunctionType::try_from(func.function_type).map_err(|_| Error::Catalog {
			message: format!("invalid FunctionType in function id {}", func.id),
		})?;
		let return_type = Self::column_type(func.return_type, func.id, "ReturnType")?;

		let mut params = ParameterSpec::new();
		for (name, data_type) in func.params {
			params.push(ParameterField::new(name, Self::column_type(data_type, func.id, "Params")?));
		}

		Ok(FunctionEntry {
			id: func.id,
			name: func.name,
			function_type,
			return_type,
			cacheable: func.cache_result_in_qlik,
			script: func.function_r_script,
			params,
		})
	}

	/// Declared types must be Numeric or String; Dual is rejected here so
	/// the core never sees it from the catalog path.
	fn column_type(value: i32, id: i32, field: &str) -> Result<DataType> {
		match DataType::try_from(value) {
			Ok(DataType::Dual) | Err(_) => Err(Error::Catalog {
				message: format!("invalid {field} data type {value} in function id {id}"),
			}),
			Ok(data_type) => Ok(data_type),
		}
	}

	pub fn lookup(&self, id: i32) -> Option<&FunctionEntry> {
		self.functions.iter().find(|func| func.id == id)
	}

	/// Definitions advertised in the capability response.
	pub fn definitions(&self) -> Vec<proto::FunctionDefinition> {
		self.functions
			.iter()
			.map(|func| proto::FunctionDefinition {
				name: func.name.clone(),
				function_type: func.function_type as i32,
				return_type: match func.return_type {
					DataType::String => proto::DataType::String as i32,
					_ => proto::DataType::Numeric as i32,
				},
				params: func
					.params
					.iter()
					.map(|field| proto::Parameter {
						data_type: match field.data_type {
							DataType::String => proto::DataType::String as i32,
							_ => proto::DataType::Numeric as i32,
						},
						name: field.name.clone(),
					})
					.collect(),
				function_id: func.id,
			})
			.collect()
	}

	pub fn len(&self) -> usize {
		self.functions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.functions.is_empty()
	}
}
