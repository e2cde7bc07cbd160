// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! QAP1 wire codec.
//!
//! A QAP1 message is a 16-byte little-endian header followed by a sequence
//! of data items. Each data item carries a one-byte type and a 24-bit
//! length; lengths above 16MiB set the `LARGE` flag and extend the header by
//! four bytes. R values travel as SEXP trees using the same header scheme
//! with `XT_*` type codes; a set `XT_HAS_ATTR` bit means the value is
//! preceded by its attribute pairlist.
//!
//! Decoding produces [`EngineValue`] directly; this is the one place in the
//! gateway where the engine's dynamic typing is turned into a tagged
//! variant.

use rbridge_core::{ColumnBuffer, EngineValue, InputDataset};

use crate::error::RserveError;

// Commands.
pub const CMD_LOGIN: u32 = 0x001;
pub const CMD_EVAL: u32 = 0x003;
pub const CMD_ASSIGN_SEXP: u32 = 0x021;

// Response bits: responses carry CMD_RESP plus OK/ERR, with the error
// status in bits 24..31.
pub const CMD_RESP: u32 = 0x10000;
pub const RESP_OK: u32 = CMD_RESP | 0x0001;
pub const RESP_ERR: u32 = CMD_RESP | 0x0002;

// Data item types.
const DT_STRING: u8 = 4;
const DT_SEXP: u8 = 10;
const DT_LARGE: u8 = 64;

// SEXP types.
const XT_NULL: u8 = 0;
const XT_SYMNAME: u8 = 19;
const XT_VECTOR: u8 = 16;
const XT_LIST_TAG: u8 = 21;
const XT_ARRAY_INT: u8 = 32;
const XT_ARRAY_DOUBLE: u8 = 33;
const XT_ARRAY_STR: u8 = 34;
const XT_ARRAY_BOOL: u8 = 36;
const XT_HAS_ATTR: u8 = 128;
const XT_LARGE: u8 = 64;

/// R's NA integer sentinel, in both directions on the wire.
pub const NA_INT: i32 = i32::MIN;

pub const HEADER_LEN: usize = 16;

/// Extract the error status from a response command word.
pub fn response_status(cmd: u32) -> u32 {
	(cmd >> 24) & 0x7f
}

/// Message header: command, body length split into two 32-bit halves, and
/// an offset field that is always zero in this dialect.
pub fn encode_header(cmd: u32, body_len: u64) -> [u8; HEADER_LEN] {
	let mut header = [0u8; HEADER_LEN];
	header[0..4].copy_from_slice(&cmd.to_le_bytes());
	header[4..8].copy_from_slice(&((body_len & 0xffff_ffff) as u32).to_le_bytes());
	// bytes 8..12: data offset, always 0
	header[12..16].copy_from_slice(&((body_len >> 32) as u32).to_le_bytes());
	header
}

pub struct ResponseHeader {
	pub cmd: u32,
	pub body_len: u64,
}

pub fn decode_header(header: &[u8; HEADER_LEN]) -> ResponseHeader {
	let cmd = u32::from_le_bytes(header[0..4].try_into().unwrap());
	let low = u32::from_le_bytes(header[4..8].try_into().unwrap()) as u64;
	let high = u32::from_le_bytes(header[12..16].try_into().unwrap()) as u64;
	ResponseHeader {
		cmd,
		body_len: low | (high << 32),
	}
}

fn put_item_header(buf: &mut Vec<u8>, ty: u8, len: usize) {
	if len <= 0xff_ffff {
		buf.push(ty);
		buf.extend_from_slice(&(len as u32).to_le_bytes()[0..3]);
	} else {
		buf.push(ty | DT_LARGE);
		let len = len as u64;
		buf.extend_from_slice(&(len as u32).to_le_bytes()[0..3]);
		buf.extend_from_slice(&(((len >> 24) & 0xffff_ffff) as u32).to_le_bytes());
	}
}

/// A `DT_STRING` data item: null-terminated, padded to a 4-byte boundary.
pub fn dt_string(value: &str) -> Vec<u8> {
	let mut payload = value.as_bytes().to_vec();
	payload.push(0);
	while payload.len() % 4 != 0 {
		payload.push(0);
	}
	let mut buf = Vec::with_capacity(payload.len() + 8);
	put_item_header(&mut buf, DT_STRING, payload.len());
	buf.extend_from_slice(&payload);
	buf
}

/// A `DT_SEXP` data item wrapping an already-encoded SEXP.
pub fn dt_sexp(sexp: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(sexp.len() + 8);
	put_item_header(&mut buf, DT_SEXP, sexp.len());
	buf.extend_from_slice(sexp);
	buf
}

fn put_sexp_header(buf: &mut Vec<u8>, ty: u8, len: usize) {
	// Same layout as data item headers; XT_LARGE plays the DT_LARGE role.
	debug_assert_eq!(DT_LARGE, XT_LARGE);
	put_item_header(buf, ty, len);
}

fn encode_symname(name: &str) -> Vec<u8> {
	let mut payload = name.as_bytes().to_vec();
	payload.push(0);
	while payload.len() % 4 != 0 {
		payload.push(0);
	}
	let mut buf = Vec::new();
	put_sexp_header(&mut buf, XT_SYMNAME, payload.len());
	buf.extend_from_slice(&payload);
	buf
}

fn encode_double_array(values: &[f64]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(values.len() * 8 + 8);
	put_sexp_header(&mut buf, XT_ARRAY_DOUBLE, values.len() * 8);
	for v in values {
		buf.extend_from_slice(&v.to_le_bytes());
	}
	buf
}

fn encode_int_array(values: &[i32]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(values.len() * 4 + 8);
	put_sexp_header(&mut buf, XT_ARRAY_INT, values.len() * 4);
	for v in values {
		buf.extend_from_slice(&v.to_le_bytes());
	}
	buf
}

fn encode_str_array<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Vec<u8> {
	let mut payload = Vec::new();
	for value in values {
		match value {
			Some(s) => {
				// A leading 0xff must be escaped by doubling; a
				// lone 0xff marks NA.
				if s.as_bytes().first() == Some(&0xff) {
					payload.push(0xff);
				}
				payload.extend_from_slice(s.as_bytes());
			}
			None => payload.push(0xff),
		}
		payload.push(0);
	}
	while payload.len() % 4 != 0 {
		payload.push(1);
	}
	let mut buf = Vec::new();
	put_sexp_header(&mut buf, XT_ARRAY_STR, payload.len());
	buf.extend_from_slice(&payload);
	buf
}

fn encode_tagged(tag: &str, value: Vec<u8>) -> Vec<u8> {
	let mut buf = value;
	buf.extend_from_slice(&encode_symname(tag));
	buf
}

/// Encode an [`InputDataset`] as an R data.frame: a generic vector carrying
/// one array per column, with `names`, `row.names` and `class` attributes.
/// `row.names` uses R's compact form `c(NA_integer_, -nrow)`.
pub fn encode_dataframe(dataset: &InputDataset) -> Vec<u8> {
	let rows = dataset.rows() as i32;

	let mut attr_payload = Vec::new();
	attr_payload.extend_from_slice(&encode_tagged(
		"names",
		encode_str_array(dataset.columns().iter().map(|(name, _)| Some(name.as_str()))),
	));
	attr_payload.extend_from_slice(&encode_tagged("row.names", encode_int_array(&[NA_INT, -rows])));
	attr_payload.extend_from_slice(&encode_tagged("class", encode_str_array([Some("data.frame")])));

	let mut attrs = Vec::new();
	put_sexp_header(&mut attrs, XT_LIST_TAG, attr_payload.len());
	attrs.extend_from_slice(&attr_payload);

	let mut body = Vec::new();
	for (_, column) in dataset.columns() {
		match column {
			ColumnBuffer::Numeric(values) => body.extend_from_slice(&encode_double_array(values)),
			ColumnBuffer::Text(values) => {
				body.extend_from_slice(&encode_str_array(values.iter().map(|s| Some(s.as_str()))))
			}
		}
	}

	let mut buf = Vec::new();
	put_sexp_header(&mut buf, XT_VECTOR | XT_HAS_ATTR, attrs.len() + body.len());
	buf.extend_from_slice(&attrs);
	buf.extend_from_slice(&body);
	buf
}

struct Reader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	fn remaining(&self) -> usize {
		self.buf.len() - self.pos
	}

	fn take(&mut self, n: usize) -> Result<&'a [u8], RserveError> {
		if self.remaining() < n {
			return Err(RserveError::protocol("truncated message"));
		}
		let slice = &self.buf[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	fn u8(&mut self) -> Result<u8, RserveError> {
		Ok(self.take(1)?[0])
	}

	fn u24(&mut self) -> Result<u32, RserveError> {
		let b = self.take(3)?;
		Ok(b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16)
	}

	fn u32(&mut self) -> Result<u32, RserveError> {
		Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
	}

	/// Item header shared by DT and XT entries: returns (type-without-
	/// large-flag, payload length).
	fn item_header(&mut self) -> Result<(u8, usize), RserveError> {
		let ty = self.u8()?;
		let mut len = self.u24()? as u64;
		if ty & DT_LARGE != 0 {
			len |= (self.u32()? as u64) << 24;
		}
		Ok((ty & !DT_LARGE, len as usize))
	}
}

/// Decode the body of an OK eval response: a single `DT_SEXP` item.
pub fn decode_eval_body(body: &[u8]) -> Result<EngineValue, RserveError> {
	let mut reader = Reader::new(body);
	if reader.remaining() == 0 {
		// voidEval-style empty response
		return Ok(EngineValue::Null);
	}
	let (ty, len) = reader.item_header()?;
	if ty != DT_SEXP {
		return Err(RserveError::protocol(format!("expected DT_SEXP item, got type {ty}")));
	}
	let mut sexp = Reader::new(reader.take(len)?);
	decode_sexp(&mut sexp)
}

fn decode_sexp(reader: &mut Reader<'_>) -> Result<EngineValue, RserveError> {
	let (ty, len) = reader.item_header()?;
	let mut content = Reader::new(reader.take(len)?);

	let has_attr = ty & XT_HAS_ATTR != 0;
	let base = ty & !XT_HAS_ATTR;

	let attributes = if has_attr {
		decode_attribute_list(&mut content)?
	} else {
		Vec::new()
	};

	let value = match base {
		XT_NULL => EngineValue::Null,
		XT_ARRAY_INT => {
			let mut values = Vec::with_capacity(content.remaining() / 4);
			while content.remaining() >= 4 {
				values.push(content.u32()? as i32);
			}
			EngineValue::Int(values)
		}
		XT_ARRAY_DOUBLE => {
			let mut values = Vec::with_capacity(content.remaining() / 8);
			while content.remaining() >= 8 {
				values.push(f64::from_le_bytes(content.take(8)?.try_into().unwrap()));
			}
			EngineValue::Double(values)
		}
		XT_ARRAY_BOOL => {
			let count = content.u32()? as usize;
			let bytes = content.take(count.min(content.remaining()))?;
			// 0 = false, 1 = true, anything else (2) = NA
			EngineValue::Bool(
				bytes.iter()
					.map(|&b| match b {
						0 => Some(false),
						1 => Some(true),
						_ => None,
					})
					.collect(),
			)
		}
		XT_ARRAY_STR => EngineValue::Strings(decode_string_block(&mut content)?),
		XT_VECTOR => {
			let mut values = Vec::new();
			while content.remaining() > 0 {
				values.push(decode_sexp(&mut content)?);
			}
			let (names, attributes) = split_names(attributes);
			return Ok(EngineValue::List {
				values,
				names,
				attributes,
			});
		}
		other => {
			return Err(RserveError::protocol(format!("unsupported SEXP type {other}")));
		}
	};

	// Attributes on bare vectors (e.g. `names` on a named numeric) are
	// irrelevant to the marshaller and dropped.
	let _ = attributes;
	Ok(value)
}

/// Tagged pairlist: a sequence of (value, symbol-name tag) pairs.
fn decode_attribute_list(reader: &mut Reader<'_>) -> Result<Vec<(String, EngineValue)>, RserveError> {
	let (ty, len) = reader.item_header()?;
	if ty & !XT_HAS_ATTR != XT_LIST_TAG {
		return Err(RserveError::protocol(format!("expected attribute pairlist, got type {ty}")));
	}
	let mut content = Reader::new(reader.take(len)?);
	let mut attributes = Vec::new();
	while content.remaining() > 0 {
		let value = decode_sexp(&mut content)?;
		let tag = decode_tag(&mut content)?;
		attributes.push((tag, value));
	}
	Ok(attributes)
}

fn decode_tag(reader: &mut Reader<'_>) -> Result<String, RserveError> {
	let (ty, len) = reader.item_header()?;
	if ty != XT_SYMNAME {
		return Err(RserveError::protocol(format!("expected symbol name tag, got type {ty}")));
	}
	let bytes = reader.take(len)?;
	let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
	String::from_utf8(bytes[..end].to_vec()).map_err(|_| RserveError::protocol("non-utf8 symbol name"))
}

/// Concatenated null-terminated strings, padded to 4 bytes with 0x01. A
/// lone 0xff byte is NA; a doubled leading 0xff escapes a literal one.
fn decode_string_block(content: &mut Reader<'_>) -> Result<Vec<Option<String>>, RserveError> {
	let bytes = content.take(content.remaining())?;
	let mut values = Vec::new();
	let mut pos = 0;
	while pos < bytes.len() && bytes[pos] != 0x01 {
		let end = bytes[pos..]
			.iter()
			.position(|&b| b == 0)
			.map(|i| pos + i)
			.ok_or_else(|| RserveError::protocol("unterminated string in string array"))?;
		let raw = &bytes[pos..end];
		pos = end + 1;

		if raw == [0xff] {
			values.push(None);
			continue;
		}
		let unescaped = if raw.first() == Some(&0xff) {
			&raw[1..]
		} else {
			raw
		};
		values.push(Some(
			String::from_utf8(unescaped.to_vec())
				.map_err(|_| RserveError::protocol("non-utf8 string in string array"))?,
		));
	}
	Ok(values)
}

fn split_names(
	attributes: Vec<(String, EngineValue)>,
) -> (Option<Vec<Option<String>>>, Vec<(String, EngineValue)>) {
	let mut names = None;
	let mut rest = Vec::new();
	for (tag, value) in attributes {
		if tag == "names" && names.is_none() {
			if let EngineValue::Strings(items) = value {
				names = Some(items);
				continue;
			}
			rest.push((tag, value));
		} else {
			rest.push((tag, value));
		}
	}
	(names, rest)
}
