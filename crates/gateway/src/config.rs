// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Gateway settings. Field names match the original deployment's settings
//! file so existing configurations carry over unchanged.

use std::{fs, path::Path};

use rbridge_core::{ConnectionParameters, Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
	pub grpc_host: String,
	pub grpc_port: u16,
	pub rserve_host: String,
	pub rserve_port: u16,
	pub rserve_user: String,
	pub rserve_password: String,
	pub rserve_init_script: String,
	/// When set, the gateway launches and supervises this R binary
	/// itself instead of expecting a remote Rserve.
	pub r_process_path_to_start: String,
	pub r_process_command_line_args: String,
	pub allow_script: bool,
	pub function_definitions_file: String,
	/// Folder holding `root_cert.pem`, `sse_server_cert.pem` and
	/// `sse_server_key.pem`; empty means plaintext.
	pub certificate_folder_full_path: String,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			grpc_host: "0.0.0.0".to_string(),
			grpc_port: 50051,
			rserve_host: "127.0.0.1".to_string(),
			rserve_port: 6311,
			rserve_user: String::new(),
			rserve_password: String::new(),
			rserve_init_script: String::new(),
			r_process_path_to_start: String::new(),
			r_process_command_line_args: String::new(),
			allow_script: true,
			function_definitions_file: String::new(),
			certificate_folder_full_path: String::new(),
		}
	}
}

impl GatewayConfig {
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path).map_err(|err| Error::Catalog {
			message: format!("cannot read config {}: {err}", path.display()),
		})?;
		serde_json::from_str(&raw).map_err(|err| Error::Catalog {
			message: format!("invalid config {}: {err}", path.display()),
		})
	}

	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.grpc_host, self.grpc_port)
	}

	/// The pool key this deployment talks to.
	pub fn connection_parameters(&self) -> ConnectionParameters {
		let mut params = if self.r_process_path_to_start.is_empty() {
			ConnectionParameters::remote(self.rserve_host.clone(), self.rserve_port)
		} else {
			ConnectionParameters::local_process(self.r_process_path_to_start.clone(), self.rserve_port)
		};
		if !self.rserve_user.is_empty() {
			params = params.with_credentials(self.rserve_user.clone(), self.rserve_password.clone());
		}
		if !self.rserve_init_script.is_empty() {
			params = params.with_init_script(self.rserve_init_script.clone());
		}
		params.process_args = self
			.r_process_command_line_args
			.split_whitespace()
			.map(str::to_string)
			.collect();
		params
	}
}
