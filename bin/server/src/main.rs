// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fs, path::Path, sync::Arc};

use rbridge_gateway::{ConnectionManager, ConnectorService, FunctionRegistry, GatewayConfig};
use rbridge_rserve::RserveConnector;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = match std::env::args().nth(1) {
		Some(path) => GatewayConfig::load(path)?,
		None => {
			info!("no config file given, using built-in defaults");
			GatewayConfig::default()
		}
	};

	let registry = if config.function_definitions_file.is_empty() {
		info!("no function definitions file configured, serving script evaluation only");
		FunctionRegistry::empty()
	} else {
		let registry = FunctionRegistry::from_file(&config.function_definitions_file)?;
		info!(count = registry.len(), "loaded function definitions");
		registry
	};

	let params = config.connection_parameters();
	info!(target = %params, "engine target");

	let manager = Arc::new(ConnectionManager::new(RserveConnector));
	// Warm up the pool so the first call does not pay the connect latency.
	manager.get_or_create(&params).await;

	let service = ConnectorService::new(
		Arc::clone(&manager),
		Arc::new(registry),
		params,
		config.allow_script,
	);

	let addr = config.bind_addr().parse()?;
	let mut builder = Server::builder();
	if config.certificate_folder_full_path.is_empty() {
		warn!("no certificate folder configured, serving insecure plaintext gRPC");
	} else {
		builder = builder.tls_config(load_tls(Path::new(&config.certificate_folder_full_path))?)?;
		info!("mutual TLS enabled");
	}

	info!(%addr, "gateway listening");
	builder.add_service(service.into_server())
		.serve_with_shutdown(addr, async {
			let _ = tokio::signal::ctrl_c().await;
			info!("shutdown signal received");
		})
		.await?;

	manager.dispose();
	Ok(())
}

/// Mutual TLS out of the certificate folder layout the original deployment
/// scripts generate.
fn load_tls(folder: &Path) -> Result<ServerTlsConfig, std::io::Error> {
	let cert = fs::read(folder.join("sse_server_cert.pem"))?;
	let key = fs::read(folder.join("sse_server_key.pem"))?;
	let root = fs::read(folder.join("root_cert.pem"))?;
	Ok(ServerTlsConfig::new()
		.identity(Identity::from_pem(cert, key))
		.client_ca_root(Certificate::from_pem(root)))
}
