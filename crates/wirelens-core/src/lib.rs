//! # wirelens-core
//!
//! A codec for the Protocol Buffer wire formats used by machine-learning model
//! files, with schema-less structure inference.
//!
//! This crate provides the core functionality for:
//! - Reading the binary wire format with bounds-checked, fenced nested reads
//! - Reading the human-readable text format with line/column diagnostics
//! - Inferring a structural signature of an unknown binary payload
//! - Exact 64-bit integer arithmetic on split 32-bit halves
//! - Detecting the character encoding of text input
//! - Random-access little/big-endian reads over raw tensor buffers
//!
//! ## Architecture
//!
//! - [`wire`]: Binary and text readers, signature inference
//! - [`message`]: The [`Message`] trait schema types implement
//! - [`wide`]: [`Int64`] and [`Uint64`]
//! - [`text`]: Encoding detection and character decoding
//! - [`cursor`]: [`ByteCursor`] for typed reads at arbitrary offsets
//! - [`typed`]: Half floats, complex numbers and packed bit fields
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use wirelens_core::{BinaryReader, FieldShape, Signature};
//!
//! // field 1: "no", field 2: 150
//! let data = [0x0A, 0x02, b'n', b'o', 0x10, 0x96, 0x01];
//!
//! let signature = Signature::infer(&data);
//! assert_eq!(signature.get(1), Some(&FieldShape::Bytes));
//! assert_eq!(signature.get(2), Some(&FieldShape::Varint));
//!
//! let mut reader = BinaryReader::new(&data);
//! let tag = reader.tag()?;
//! assert_eq!(tag.field, 1);
//! assert_eq!(reader.string()?, "no");
//! # Ok::<(), wirelens_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! Schema types plug into both readers through [`Message`]; see
//! [`message`] for a complete implementation.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod cursor;
pub mod error;
pub mod message;
pub mod text;
pub mod typed;
pub mod wide;
pub mod wire;

// Re-export primary types for convenience
pub use cursor::ByteCursor;
pub use error::{Error, Result};
pub use message::{decode_binary, decode_text, Any, AnyValue, Message};
pub use text::{Decoder, Encoding};
pub use wide::{Int64, Uint64};
pub use wire::{
    BinaryReader, FieldShape, ReaderConfig, Signature, SignatureCache, Tag, TextReader, Token,
    UnknownFieldPolicy, WireType,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
