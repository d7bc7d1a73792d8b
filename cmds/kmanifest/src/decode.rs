//! Streaming multi-document decoder.
//!
//! Decoding runs as two tokio tasks joined by bounded channels:
//!
//! ```text
//! reader --> split_documents --[RawChunk]--> decode_chunks --[Manifest]--> DocumentStream
//! ```
//!
//! The splitter cuts the byte stream on `---` and `...` lines, the decoder
//! turns each chunk from YAML into a [`Manifest`]. Both stages are FIFO, so
//! documents come out in source order. A full channel blocks the splitter, which keeps
//! read-ahead in step with decoding.

use std::{io, path::Path};

use serde_json::Value;
use thiserror::Error;
use tokio::{
	fs::File,
	io::{AsyncBufReadExt, AsyncRead, BufReader},
	sync::mpsc,
};
use tracing::{debug, instrument, trace};

use crate::manifest::Manifest;

/// Default number of in-flight items between pipeline stages.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10;

/// Smallest initial chunk buffer.
pub const MIN_READ: usize = 512;

/// Default cap on the initial chunk buffer, chunks still grow past it.
pub const DEFAULT_MAX_CHUNK_HINT: usize = 4 << 20;

/// Tuning for the decode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOpts {
	/// Capacity of each channel between stages.
	pub buffer_capacity: usize,
	/// Upper bound for the size-based initial chunk buffer.
	pub max_chunk_hint: usize,
}

impl Default for PipelineOpts {
	fn default() -> Self {
		Self {
			buffer_capacity: DEFAULT_BUFFER_CAPACITY,
			max_chunk_hint: DEFAULT_MAX_CHUNK_HINT,
		}
	}
}

impl PipelineOpts {
	/// Initial capacity of the chunk buffer for an input of `size_hint` bytes.
	pub fn chunk_capacity(&self, size_hint: Option<u64>) -> usize {
		let hint = size_hint.map_or(MIN_READ, |size| {
			usize::try_from(size).unwrap_or(usize::MAX)
		});
		hint.clamp(MIN_READ, self.max_chunk_hint.max(MIN_READ))
	}
}

/// A document that could not be decoded.
///
/// `index` is the zero-based position of the document among the non-empty
/// documents of the stream, `name` is whatever `metadata.name` could be
/// scraped from the raw text (possibly empty).
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("document {index} ({name:?}): invalid YAML: {source}")]
	Yaml {
		index: usize,
		name: String,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("document {index} ({name:?}): expected a mapping, found {found}")]
	NotAnObject {
		index: usize,
		name: String,
		found: &'static str,
	},

	#[error("document {index} ({name:?}): Object 'Kind' is missing")]
	MissingKind { index: usize, name: String },

	#[error("reading document {index}: {source}")]
	Read {
		index: usize,
		#[source]
		source: io::Error,
	},
}

impl DecodeError {
	/// Best-effort name of the offending document.
	pub fn name(&self) -> &str {
		match self {
			DecodeError::Yaml { name, .. }
			| DecodeError::NotAnObject { name, .. }
			| DecodeError::MissingKind { name, .. } => name,
			DecodeError::Read { .. } => "",
		}
	}

	pub fn index(&self) -> usize {
		match self {
			DecodeError::Yaml { index, .. }
			| DecodeError::NotAnObject { index, .. }
			| DecodeError::MissingKind { index, .. }
			| DecodeError::Read { index, .. } => *index,
		}
	}
}

/// Raw bytes of one document, separator excluded.
#[derive(Debug)]
struct RawChunk {
	index: usize,
	bytes: Vec<u8>,
}

/// Everything a stream produced once drained.
#[derive(Debug, Default)]
pub struct Decoded {
	pub documents: Vec<Manifest>,
	pub errors: Vec<DecodeError>,
}

/// Lazy, ordered sequence of decoded documents.
#[derive(Debug)]
pub struct DocumentStream {
	documents: mpsc::Receiver<Result<Manifest, DecodeError>>,
}

impl DocumentStream {
	/// Start the pipeline over `reader`.
	///
	/// `size_hint` is the total input size when known, it only sizes the chunk
	/// buffer. Must be called within a tokio runtime.
	pub fn spawn<R>(reader: R, size_hint: Option<u64>, opts: PipelineOpts) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
	{
		let capacity = opts.buffer_capacity.max(1);
		let (chunk_tx, chunk_rx) = mpsc::channel(capacity);
		let (doc_tx, doc_rx) = mpsc::channel(capacity);

		tokio::spawn(split_documents(
			BufReader::new(reader),
			opts.chunk_capacity(size_hint),
			chunk_tx,
		));
		tokio::spawn(decode_chunks(chunk_rx, doc_tx));

		Self {
			documents: doc_rx,
		}
	}

	/// Open `path` and start decoding it.
	#[instrument(skip(opts))]
	pub async fn open(path: &Path, opts: PipelineOpts) -> io::Result<Self> {
		let file = File::open(path).await?;
		let size = file.metadata().await.ok().map(|m| m.len());
		debug!(size = ?size, "opened manifest stream");
		Ok(Self::spawn(file, size, opts))
	}

	/// Next document or decode error, `None` once the input is exhausted.
	pub async fn next(&mut self) -> Option<Result<Manifest, DecodeError>> {
		self.documents.recv().await
	}

	/// Run the stream to completion, separating documents from errors.
	pub async fn drain(mut self) -> Decoded {
		let mut decoded = Decoded::default();
		while let Some(item) = self.next().await {
			match item {
				Ok(manifest) => decoded.documents.push(manifest),
				Err(e) => decoded.errors.push(e),
			}
		}
		decoded
	}
}

/// Splitter stage: cut the input into chunks on boundary lines.
async fn split_documents<R>(
	mut reader: BufReader<R>,
	chunk_capacity: usize,
	sink: mpsc::Sender<Result<RawChunk, DecodeError>>,
) where
	R: AsyncRead + Unpin,
{
	let mut index = 0;
	let mut chunk = Vec::with_capacity(chunk_capacity);
	let mut line = Vec::new();

	loop {
		line.clear();
		match reader.read_until(b'\n', &mut line).await {
			Ok(0) => break,
			Ok(_) if is_boundary(&line) => {
				if !is_blank(&chunk) {
					trace!(index, len = chunk.len(), "split document");
					let bytes = chunk.as_slice().to_vec();
					if sink.send(Ok(RawChunk { index, bytes })).await.is_err() {
						return;
					}
					index += 1;
				}
				chunk.clear();
			}
			Ok(_) => chunk.extend_from_slice(&line),
			Err(source) => {
				let _ = sink.send(Err(DecodeError::Read { index, source })).await;
				return;
			}
		}
	}

	if !is_blank(&chunk) {
		trace!(index, len = chunk.len(), "split final document");
		let _ = sink.send(Ok(RawChunk { index, bytes: chunk })).await;
	}
}

/// Decoder stage: YAML chunk to manifest, errors passed through in order.
async fn decode_chunks(
	mut source: mpsc::Receiver<Result<RawChunk, DecodeError>>,
	sink: mpsc::Sender<Result<Manifest, DecodeError>>,
) {
	while let Some(chunk) = source.recv().await {
		let decoded = match chunk {
			Ok(chunk) => match decode_chunk(&chunk) {
				Some(decoded) => decoded,
				None => continue,
			},
			Err(e) => Err(e),
		};
		if sink.send(decoded).await.is_err() {
			break;
		}
	}
}

/// Decode one chunk. `None` for a null document, which is skipped like an
/// empty one.
fn decode_chunk(chunk: &RawChunk) -> Option<Result<Manifest, DecodeError>> {
	let index = chunk.index;
	let value: Value = match serde_yaml::from_slice(&chunk.bytes) {
		Ok(value) => value,
		Err(source) => {
			return Some(Err(DecodeError::Yaml {
				index,
				name: best_effort_name(&chunk.bytes),
				source,
			}))
		}
	};

	let found = match &value {
		Value::Null => return None,
		Value::Object(_) => None,
		Value::Bool(_) => Some("a boolean"),
		Value::Number(_) => Some("a number"),
		Value::String(_) => Some("a string"),
		Value::Array(_) => Some("a sequence"),
	};
	if let Some(found) = found {
		return Some(Err(DecodeError::NotAnObject {
			index,
			name: best_effort_name(&chunk.bytes),
			found,
		}));
	}

	let manifest = Manifest::new(value);
	if manifest.kind().is_empty() {
		return Some(Err(DecodeError::MissingKind {
			index,
			name: manifest.name().to_string(),
		}));
	}
	Some(Ok(manifest))
}

/// A `---` document start or `...` document end marker on its own line,
/// optionally followed by whitespace and a comment.
fn is_boundary(line: &[u8]) -> bool {
	match line
		.strip_prefix(b"---")
		.or_else(|| line.strip_prefix(b"..."))
	{
		Some(rest) => rest.first().map_or(true, |c| c.is_ascii_whitespace()),
		None => false,
	}
}

/// Only whitespace and comment lines.
fn is_blank(chunk: &[u8]) -> bool {
	chunk.split(|&b| b == b'\n').all(|line| {
		let line = line.trim_ascii_start();
		line.is_empty() || line.starts_with(b"#")
	})
}

/// Scrape `metadata.name` from text that did not parse.
fn best_effort_name(raw: &[u8]) -> String {
	let text = String::from_utf8_lossy(raw);
	let mut in_metadata = false;
	let mut child_indent = None;

	for line in text.lines() {
		let trimmed = line.trim_start();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}

		let indent = line.len() - trimmed.len();
		if indent == 0 {
			in_metadata = line.trim_end() == "metadata:";
			child_indent = None;
			continue;
		}
		if !in_metadata {
			continue;
		}
		if *child_indent.get_or_insert(indent) != indent {
			continue;
		}
		if let Some(name) = trimmed.strip_prefix("name:") {
			return name.trim().trim_matches(['"', '\'']).to_string();
		}
	}

	String::new()
}
