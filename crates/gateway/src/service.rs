// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The gRPC Connector service: capability negotiation plus the two
//! row-streaming calls, wired through assemble → execute → marshal.
//!
//! Per-call request details arrive as binary gRPC metadata; the response
//! schema leaves the same way, so it always precedes the first data bundle.

use std::{pin::Pin, sync::Arc, time::Instant};

use futures_util::Stream;
use prost::Message;
use rbridge_core::{ConnectionParameters, DataType, Error, ParameterField, ParameterSpec};
use rbridge_rserve::EngineConnector;
use tokio_stream::iter;
use tonic::{
	Request, Response, Status, Streaming,
	metadata::{MetadataMap, MetadataValue},
};
use tracing::{debug, info, instrument};

use crate::{
	assembler::assemble,
	executor,
	marshal::{MarshalledResult, marshal},
	pool::ConnectionManager,
	proto::{
		self, BundledRows, Capabilities, CommonRequestHeader, Empty, FunctionRequestHeader,
		ScriptRequestHeader, connector_server::ConnectorServer,
	},
	registry::FunctionRegistry,
	status::to_status,
};

const SCRIPT_HEADER: &str = "qlik-scriptrequestheader-bin";
const FUNCTION_HEADER: &str = "qlik-functionrequestheader-bin";
const COMMON_HEADER: &str = "qlik-commonrequestheader-bin";
const TABLE_DESCRIPTION_HEADER: &str = "qlik-tabledescription-bin";
const CACHE_HEADER: &str = "qlik-cache";

const PLUGIN_IDENTIFIER: &str = "rbridge Rserve connector";
const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

pub type BundleStream = Pin<Box<dyn Stream<Item = Result<BundledRows, Status>> + Send>>;

pub struct ConnectorService<C: EngineConnector> {
	manager: Arc<ConnectionManager<C>>,
	registry: Arc<FunctionRegistry>,
	params: ConnectionParameters,
	allow_script: bool,
}

impl<C: EngineConnector> ConnectorService<C> {
	pub fn new(
		manager: Arc<ConnectionManager<C>>,
		registry: Arc<FunctionRegistry>,
		params: ConnectionParameters,
		allow_script: bool,
	) -> Self {
		Self {
			manager,
			registry,
			params,
			allow_script,
		}
	}

	pub fn into_server(self) -> ConnectorServer<Self> {
		ConnectorServer::new(self)
	}

	/// Ad-hoc script pipeline. Split out from the tonic handler so it can
	/// be driven with any bundle stream.
	pub async fn run_script<In>(&self, metadata: &MetadataMap, input: In) -> Result<MarshalledResult, Status>
	where
		In: Stream<Item = Result<BundledRows, Status>> + Unpin,
	{
		log_common_header(metadata);
		let header: ScriptRequestHeader = parse_bin_header(metadata, SCRIPT_HEADER)?;
		if !self.allow_script {
			return Err(Status::permission_denied("script evaluation is disabled on this plugin"));
		}

		info!("evaluating script: {}", header.script);
		let spec = parameter_spec(&header.params)?;
		let started = Instant::now();

		let dataset = assemble(&spec, input).await.map_err(to_status)?;
		let entry = self.manager.get_or_create(&self.params).await;
		let result = executor::execute(&entry, &dataset, &header.script).await.map_err(to_status)?;
		let marshalled = marshal(&result, None, true).map_err(to_status)?;

		debug!(
			"script produced {} rows in {:?}",
			marshalled.table.number_of_rows,
			started.elapsed()
		);
		Ok(marshalled)
	}

	/// Function-dispatch pipeline: the registry supplies script, schema,
	/// declared return type and cacheability. Unknown ids fail before any
	/// session is acquired.
	pub async fn run_function<In>(&self, metadata: &MetadataMap, input: In) -> Result<MarshalledResult, Status>
	where
		In: Stream<Item = Result<BundledRows, Status>> + Unpin,
	{
		log_common_header(metadata);
		let header: FunctionRequestHeader = parse_bin_header(metadata, FUNCTION_HEADER)?;
		let func = self
			.registry
			.lookup(header.function_id)
			.ok_or_else(|| to_status(Error::UnknownFunction { id: header.function_id }))?;

		info!("executing function {} (id {})", func.name, func.id);
		let started = Instant::now();

		let dataset = assemble(&func.params, input).await.map_err(to_status)?;
		let entry = self.manager.get_or_create(&self.params).await;
		let result = executor::execute(&entry, &dataset, &func.script).await.map_err(to_status)?;
		let marshalled =
			marshal(&result, Some((func.name.as_str(), func.return_type)), func.cacheable).map_err(to_status)?;

		debug!(
			"function {} produced {} rows in {:?}",
			func.name,
			marshalled.table.number_of_rows,
			started.elapsed()
		);
		Ok(marshalled)
	}
}

#[tonic::async_trait]
impl<C: EngineConnector> proto::connector_server::Connector for ConnectorService<C> {
	#[instrument(name = "connector::get_capabilities", skip_all)]
	async fn get_capabilities(&self, _request: Request<Empty>) -> Result<Response<Capabilities>, Status> {
		info!("capabilities requested: {PLUGIN_IDENTIFIER} v{PLUGIN_VERSION}");
		Ok(Response::new(Capabilities {
			allow_script: self.allow_script,
			functions: self.registry.definitions(),
			plugin_identifier: PLUGIN_IDENTIFIER.to_string(),
			plugin_version: PLUGIN_VERSION.to_string(),
		}))
	}

	type EvaluateScriptStream = BundleStream;

	#[instrument(name = "connector::evaluate_script", skip_all)]
	async fn evaluate_script(
		&self,
		request: Request<Streaming<BundledRows>>,
	) -> Result<Response<Self::EvaluateScriptStream>, Status> {
		let (metadata, _, input) = request.into_parts();
		let marshalled = self.run_script(&metadata, input).await?;
		Ok(into_response(marshalled))
	}

	type ExecuteFunctionStream = BundleStream;

	#[instrument(name = "connector::execute_function", skip_all)]
	async fn execute_function(
		&self,
		request: Request<Streaming<BundledRows>>,
	) -> Result<Response<Self::ExecuteFunctionStream>, Status> {
		let (metadata, _, input) = request.into_parts();
		let marshalled = self.run_function(&metadata, input).await?;
		Ok(into_response(marshalled))
	}
}

/// Schema metadata first, then the bundles.
fn into_response(marshalled: MarshalledResult) -> Response<BundleStream> {
	let stream: BundleStream = Box::pin(iter(marshalled.bundles.into_iter().map(Ok)));
	let mut response = Response::new(stream);
	response
		.metadata_mut()
		.insert_bin(TABLE_DESCRIPTION_HEADER, MetadataValue::from_bytes(&marshalled.table.encode_to_vec()));
	if !marshalled.cacheable {
		response.metadata_mut().insert(CACHE_HEADER, MetadataValue::from_static("no-store"));
	}
	response
}

fn parse_bin_header<M: Message + Default>(metadata: &MetadataMap, key: &str) -> Result<M, Status> {
	let value = metadata
		.get_bin(key)
		.ok_or_else(|| to_status(Error::header(format!("missing {key}"))))?;
	let bytes = value
		.to_bytes()
		.map_err(|err| to_status(Error::header(format!("invalid {key}: {err}"))))?;
	M::decode(bytes.as_ref()).map_err(|err| to_status(Error::header(format!("cannot parse {key}: {err}"))))
}

/// Caller identity headers are informational only.
fn log_common_header(metadata: &MetadataMap) {
	match parse_bin_header::<CommonRequestHeader>(metadata, COMMON_HEADER) {
		Ok(common) => info!("call from app '{}', user '{}'", common.app_id, common.user_id),
		Err(_) => debug!("no common request header on call"),
	}
}

fn parameter_spec(params: &[proto::Parameter]) -> Result<ParameterSpec, Status> {
	params.iter()
		.map(|param| {
			let data_type = DataType::try_from(param.data_type)
				.map_err(|_| to_status(Error::header(format!("invalid parameter data type {}", param.data_type))))?;
			Ok(ParameterField::new(param.name.clone(), data_type))
		})
		.collect()
}
