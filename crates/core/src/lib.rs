// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Shared data model for the rbridge gateway: wire-level parameter types,
//! connection parameters (the pool key), columnar input buffers and the
//! decoded engine value consumed by the result marshaller.

mod dataset;
mod error;
mod params;
mod value;

pub use dataset::{ColumnBuffer, InputDataset};
pub use error::{Error, Result};
pub use params::{ConnectionParameters, DataType, ParameterField, ParameterSpec, Target};
pub use value::EngineValue;

/// Maximum number of rows carried by one wire bundle, in both directions.
pub const BUNDLE_ROWS: usize = 2000;

/// Well-known variable name the input dataset is bound to in the R session.
pub const DATASET_VARIABLE: &str = "q";
