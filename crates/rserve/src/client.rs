// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{io::ErrorKind, time::Duration};

use rbridge_core::{ConnectionParameters, EngineValue, InputDataset};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpStream,
	time::timeout,
};
use tracing::{debug, trace, warn};

use crate::{
	codec::{
		self, CMD_ASSIGN_SEXP, CMD_EVAL, CMD_LOGIN, HEADER_LEN, RESP_OK, decode_eval_body, dt_sexp, dt_string,
		encode_dataframe, encode_header, response_status,
	},
	error::RserveError,
	session::{EngineConnector, EngineSession},
};

const ID_STRING_LEN: usize = 32;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_AUTH_FAILED: u32 = 0x41;

/// Async QAP1 client over one TCP connection.
///
/// Any I/O failure mid-exchange leaves the stream in an unknown position,
/// so the client poisons itself: every later call fails fast with
/// [`RserveError::Disconnected`] and `is_alive` reports false, which makes
/// the pool's background loop drop and replace the session.
pub struct RserveClient {
	stream: TcpStream,
	broken: bool,
}

impl RserveClient {
	/// Connect and perform the QAP1 handshake, logging in when
	/// credentials are given (plain-text login).
	pub async fn connect(
		host: &str,
		port: u16,
		credentials: Option<(&str, &str)>,
	) -> Result<Self, RserveError> {
		let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
			.await
			.map_err(|_| RserveError::Io(ErrorKind::TimedOut.into()))??;
		stream.set_nodelay(true)?;

		let mut client = Self {
			stream,
			broken: false,
		};
		client.handshake().await?;

		if let Some((user, password)) = credentials {
			client.login(user, password).await?;
			debug!("logged in to Rserve as {user}");
		}
		Ok(client)
	}

	async fn handshake(&mut self) -> Result<(), RserveError> {
		let mut id = [0u8; ID_STRING_LEN];
		self.stream.read_exact(&mut id).await?;
		if &id[0..4] != b"Rsrv" || &id[8..12] != b"QAP1" {
			return Err(RserveError::protocol("server did not identify itself as Rserve/QAP1"));
		}
		trace!("Rserve id string: {}", String::from_utf8_lossy(&id));
		Ok(())
	}

	async fn login(&mut self, user: &str, password: &str) -> Result<(), RserveError> {
		let body = dt_string(&format!("{user}\n{password}"));
		match self.exchange(CMD_LOGIN, &body).await {
			Ok(_) => Ok(()),
			Err(RserveError::CommandFailed {
				status: STATUS_AUTH_FAILED,
			}) => Err(RserveError::AuthenticationFailed),
			Err(other) => Err(other),
		}
	}

	/// One request/response round trip. Returns the response body on OK.
	async fn exchange(&mut self, cmd: u32, body: &[u8]) -> Result<Vec<u8>, RserveError> {
		if self.broken {
			return Err(RserveError::Disconnected);
		}
		match self.exchange_inner(cmd, body).await {
			Ok(response) => Ok(response),
			Err(err) => {
				// Command failures leave the stream positioned at the
				// next message; anything else does not.
				if !err.is_evaluation_fault() {
					self.broken = true;
				}
				Err(err)
			}
		}
	}

	async fn exchange_inner(&mut self, cmd: u32, body: &[u8]) -> Result<Vec<u8>, RserveError> {
		self.stream.write_all(&encode_header(cmd, body.len() as u64)).await?;
		self.stream.write_all(body).await?;
		self.stream.flush().await?;

		let mut header = [0u8; HEADER_LEN];
		self.stream.read_exact(&mut header).await?;
		let header = codec::decode_header(&header);

		let mut response = vec![0u8; header.body_len as usize];
		self.stream.read_exact(&mut response).await?;

		if header.cmd & 0x00ff_ffff == RESP_OK & 0x00ff_ffff {
			Ok(response)
		} else {
			Err(RserveError::CommandFailed {
				status: response_status(header.cmd),
			})
		}
	}
}

impl EngineSession for RserveClient {
	async fn eval(&mut self, script: &str) -> Result<EngineValue, RserveError> {
		trace!("eval: {script}");
		let body = dt_string(script);
		let response = self.exchange(CMD_EVAL, &body).await?;
		decode_eval_body(&response)
	}

	async fn assign(&mut self, name: &str, dataset: &InputDataset) -> Result<(), RserveError> {
		trace!("assign {name}: {} columns, {} rows", dataset.columns().len(), dataset.rows());
		let mut body = dt_string(name);
		body.extend_from_slice(&dt_sexp(&encode_dataframe(dataset)));
		self.exchange(CMD_ASSIGN_SEXP, &body).await?;
		Ok(())
	}

	async fn is_alive(&mut self) -> bool {
		if self.broken {
			return false;
		}
		// Rserve never sends unsolicited data, so a readable socket
		// means EOF or a desynced stream; both count as dead.
		let mut probe = [0u8; 1];
		match self.stream.try_read(&mut probe) {
			Err(err) if err.kind() == ErrorKind::WouldBlock => true,
			Ok(0) => {
				debug!("Rserve closed the connection");
				self.broken = true;
				false
			}
			Ok(_) => {
				warn!("unexpected bytes on idle Rserve connection, dropping it");
				self.broken = true;
				false
			}
			Err(err) => {
				debug!("liveness probe failed: {err}");
				self.broken = true;
				false
			}
		}
	}
}

/// The production [`EngineConnector`]: opens a [`RserveClient`] against the
/// target described by the connection parameters.
#[derive(Debug, Default, Clone)]
pub struct RserveConnector;

impl EngineConnector for RserveConnector {
	type Session = RserveClient;

	async fn connect(&self, params: &ConnectionParameters) -> Result<RserveClient, RserveError> {
		let credentials = match (&params.user, &params.password) {
			(Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
			(Some(user), None) => Some((user.as_str(), "")),
			_ => None,
		};
		RserveClient::connect(params.target.host(), params.port, credentials).await
	}
}
