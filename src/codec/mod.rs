//! Value codec for the ledger's self-describing binary format
//!
//! Statement parameters are shipped to the store, and result rows received
//! from it, as binary-encoded value trees. The format is self-describing:
//! every value carries a type tag, so no schema needs to be negotiated with
//! the store.
//!
//! # Design Principles
//!
//! - One type tag byte per value, little-endian length prefixes
//! - Containers (structs, lists) nest recursively
//! - `decode(encode(v)) == v` for every representable value tree
//! - Timestamps carry microsecond precision
//! - Unsupported input shapes are an error, never silently coerced

mod decoder;
mod encoder;
mod errors;
mod value;

pub use decoder::{decode, decode_bytes, ValueReader};
pub use encoder::encode;
pub use errors::{CodecError, CodecResult};
pub use value::{Tag, Value};
