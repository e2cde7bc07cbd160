// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Supervises a locally launched R process hosting the engine.
//!
//! Runs independently of the connect loop: it only keeps the child alive,
//! the connect loop discovers the listening port on its own schedule.

use std::{collections::VecDeque, process::Stdio, time::Duration};

use parking_lot::Mutex;
use tokio::{
	io::{AsyncBufReadExt, BufReader},
	process::Command,
	task::JoinHandle,
};
use tracing::{debug, error, warn};

/// Restart delay after the child exits; long enough that a deliberate
/// shutdown does not turn into a restart storm.
const RESTART_COOLDOWN: Duration = Duration::from_secs(10);
const SPAWN_RETRY: Duration = Duration::from_secs(10);
const LOG_TAIL_LINES: usize = 200;

/// Bounded tail of the child's stdout, kept for diagnostics.
#[derive(Debug, Default)]
pub struct ProcessLog {
	lines: Mutex<VecDeque<String>>,
}

impl ProcessLog {
	fn push(&self, line: String) {
		let mut lines = self.lines.lock();
		if lines.len() == LOG_TAIL_LINES {
			lines.pop_front();
		}
		lines.push_back(line);
	}

	pub fn tail(&self) -> Vec<String> {
		self.lines.lock().iter().cloned().collect()
	}
}

/// Start the supervision loop: spawn the process, capture stdout, restart
/// it after a cooldown whenever it exits. The loop only ends when the
/// returned handle is aborted; `kill_on_drop` then takes the child with it.
pub fn spawn_supervisor(
	path: String,
	args: Vec<String>,
	log: std::sync::Arc<ProcessLog>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			let mut child = match Command::new(&path)
				.args(&args)
				.stdout(Stdio::piped())
				.stderr(Stdio::null())
				.kill_on_drop(true)
				.spawn()
			{
				Ok(child) => child,
				Err(err) => {
					error!("failed to start R process {path}: {err}");
					tokio::time::sleep(SPAWN_RETRY).await;
					continue;
				}
			};
			debug!("started R process {path} (pid {:?})", child.id());

			let capture = child.stdout.take().map(|stdout| {
				let log = std::sync::Arc::clone(&log);
				tokio::spawn(async move {
					let mut lines = BufReader::new(stdout).lines();
					while let Ok(Some(line)) = lines.next_line().await {
						log.push(line);
					}
				})
			});

			match child.wait().await {
				Ok(status) => warn!("R process exited with {status}"),
				Err(err) => warn!("R process wait failed: {err}"),
			}
			if let Some(capture) = capture {
				// stdout hit EOF when the child died
				let _ = capture.await;
			}

			// Could be a deliberate shutdown; give it a moment before
			// starting over.
			tokio::time::sleep(RESTART_COOLDOWN).await;
		}
	})
}
