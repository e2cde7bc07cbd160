// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tonic_prost_build::compile_protos("proto/sse.proto")?;
	Ok(())
}
