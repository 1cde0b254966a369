//! Binary module - self-describing value encoding for request and response payloads.
//!
//! Every value is a one-byte type code followed by its body. Multi-byte
//! integers are Little Endian; strings and byte arrays carry an `i32` length
//! prefix:
//! ```text
//! ┌───────────┬────────────┬─────────────────┐
//! │ Type code │ Length     │ UTF-8 bytes     │
//! │ 1 byte (9)│ int32 LE   │ Length bytes    │
//! └───────────┴────────────┴─────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use gridwire::binary::{BinaryReader, BinaryWriter, TypeRegistry};
//! use gridwire::memory::{InteropInputStream, InteropMemory, InteropOutputStream};
//!
//! let types = TypeRegistry::new();
//! let mut mem = InteropMemory::with_capacity(64, 1024).unwrap();
//! let mut out = InteropOutputStream::new(&mut mem);
//! BinaryWriter::new(&mut out, &types).write_string("orders").unwrap();
//! out.synchronize();
//!
//! let mut input = InteropInputStream::new(mem.committed());
//! let name = BinaryReader::new(&mut input).read_string().unwrap();
//! assert_eq!(name, "orders");
//! ```

mod reader;
mod types;
mod writer;

pub use reader::BinaryReader;
pub use types::{type_code, type_id, TypeRegistry};
pub use writer::BinaryWriter;
