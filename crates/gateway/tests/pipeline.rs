// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! End-to-end tests of the script and function pipelines against a fake
//! engine, driven through the same entry points the tonic handlers use.

use std::sync::{Arc, atomic::Ordering};

use prost::Message;
use rbridge_core::EngineValue;
use rbridge_gateway::{
	ConnectionManager, ConnectorService, FunctionRegistry,
	proto::{
		BundledRows, DataType as ProtoDataType, Dual, FunctionRequestHeader, FunctionType as ProtoFunctionType,
		Parameter, Row, ScriptRequestHeader,
	},
};
use tokio_stream::iter;
use tonic::{
	Code, Status,
	metadata::{MetadataMap, MetadataValue},
};

mod support;

use support::{FakeConnector, FakeShared, fast_timings, test_params};

const SCRIPT_HEADER: &str = "qlik-scriptrequestheader-bin";
const FUNCTION_HEADER: &str = "qlik-functionrequestheader-bin";

fn service(allow_script: bool, registry: FunctionRegistry) -> (ConnectorService<FakeConnector>, Arc<FakeShared>) {
	let (connector, shared) = FakeConnector::new();
	let manager = Arc::new(ConnectionManager::with_timings(connector, fast_timings()));
	let service = ConnectorService::new(manager, Arc::new(registry), test_params(), allow_script);
	(service, shared)
}

fn script_metadata(script: &str, params: Vec<Parameter>) -> MetadataMap {
	let header = ScriptRequestHeader {
		script: script.to_string(),
		function_type: ProtoFunctionType::Scalar as i32,
		return_type: ProtoDataType::Numeric as i32,
		params,
	};
	let mut metadata = MetadataMap::new();
	metadata.insert_bin(SCRIPT_HEADER, MetadataValue::from_bytes(&header.encode_to_vec()));
	metadata
}

fn function_metadata(function_id: i32) -> MetadataMap {
	let header = FunctionRequestHeader {
		function_id,
		version: String::new(),
	};
	let mut metadata = MetadataMap::new();
	metadata.insert_bin(FUNCTION_HEADER, MetadataValue::from_bytes(&header.encode_to_vec()));
	metadata
}

fn numeric_param(name: &str) -> Parameter {
	Parameter {
		data_type: ProtoDataType::Numeric as i32,
		name: name.to_string(),
	}
}

fn no_input() -> tokio_stream::Iter<std::vec::IntoIter<Result<BundledRows, Status>>> {
	iter(Vec::new())
}

fn numeric_bundle(values: &[f64]) -> Result<BundledRows, Status> {
	Ok(BundledRows {
		rows: values
			.iter()
			.map(|v| Row {
				duals: vec![Dual {
					num_data: *v,
					str_data: String::new(),
				}],
			})
			.collect(),
	})
}

const MEAN_CATALOG: &str = r#"{
	"functions": [
		{
			"Id": 1,
			"Name": "Mean",
			"FunctionType": 2,
			"ReturnType": 0,
			"CacheResultInQlik": false,
			"FunctionRScript": "mean(q$x)",
			"Params": { "x": 0 }
		}
	]
}"#;

#[tokio::test]
async fn disabled_script_is_denied_before_any_engine_contact() {
	let (service, shared) = service(false, FunctionRegistry::empty());

	let metadata = script_metadata("1 + 1", Vec::new());
	let err = service.run_script(&metadata, no_input()).await.unwrap_err();

	assert_eq!(err.code(), Code::PermissionDenied);
	assert_eq!(shared.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_function_id_is_unimplemented_without_engine_contact() {
	let (service, shared) = service(true, FunctionRegistry::from_json(MEAN_CATALOG).unwrap());

	let metadata = function_metadata(42);
	let err = service.run_function(&metadata, no_input()).await.unwrap_err();

	assert_eq!(err.code(), Code::Unimplemented);
	assert_eq!(shared.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn script_round_trip_pivots_rows_and_marshals_the_result() {
	let (service, shared) = service(true, FunctionRegistry::empty());
	shared.respond("sum(q$x)", EngineValue::Double(vec![6.0]));

	let metadata = script_metadata("sum(q$x)", vec![numeric_param("x")]);
	let input = iter(vec![numeric_bundle(&[1.0, 2.0]), numeric_bundle(&[3.0])]);
	let result = service.run_script(&metadata, input).await.unwrap();

	// Both inbound bundles were pivoted into one three-row bind.
	assert_eq!(shared.assigns.lock().unwrap().clone(), vec![("q".to_string(), 3)]);

	assert_eq!(result.table.number_of_rows, 1);
	assert_eq!(result.table.fields.len(), 1);
	assert!(result.cacheable);
	assert_eq!(result.bundles.len(), 1);
	assert_eq!(result.bundles[0].rows[0].duals[0].num_data, 6.0);
}

#[tokio::test]
async fn function_round_trip_uses_catalog_schema_and_cache_flag() {
	let (service, shared) = service(true, FunctionRegistry::from_json(MEAN_CATALOG).unwrap());
	shared.respond("mean(q$x)", EngineValue::Double(vec![2.0]));

	let metadata = function_metadata(1);
	let input = iter(vec![numeric_bundle(&[1.0, 2.0, 3.0])]);
	let result = service.run_function(&metadata, input).await.unwrap();

	assert_eq!(shared.evals().last().map(String::as_str), Some("mean(q$x)"));
	assert_eq!(result.table.fields[0].name, "Mean");
	assert!(!result.cacheable);
	assert_eq!(result.bundles[0].rows[0].duals[0].num_data, 2.0);
}

#[tokio::test]
async fn table_result_round_trips_names_types_and_na_strings() {
	let (service, shared) = service(true, FunctionRegistry::empty());
	shared.respond(
		"df",
		EngineValue::List {
			values: vec![
				EngineValue::Double(vec![1.5, 2.5]),
				EngineValue::Strings(vec![Some("a".to_string()), None]),
			],
			names: Some(vec![Some("num".to_string()), Some("label".to_string())]),
			attributes: Vec::new(),
		},
	);

	let metadata = script_metadata("df", vec![numeric_param("x")]);
	let input = iter(vec![numeric_bundle(&[0.0])]);
	let result = service.run_script(&metadata, input).await.unwrap();

	let fields = &result.table.fields;
	assert_eq!(fields[0].name, "num");
	assert_eq!(fields[0].data_type, ProtoDataType::Numeric as i32);
	assert_eq!(fields[1].name, "label");
	assert_eq!(fields[1].data_type, ProtoDataType::String as i32);

	let rows = &result.bundles[0].rows;
	assert_eq!(rows[0].duals[0].num_data, 1.5);
	assert_eq!(rows[0].duals[1].str_data, "a");
	// R's NA travels as the empty string
	assert_eq!(rows[1].duals[1].str_data, "");
}

#[tokio::test]
async fn missing_script_header_is_data_loss() {
	let (service, _) = service(true, FunctionRegistry::empty());

	let err = service.run_script(&MetadataMap::new(), no_input()).await.unwrap_err();
	assert_eq!(err.code(), Code::DataLoss);
}
