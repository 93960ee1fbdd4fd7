// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Reading and writing **[Apache Avro](https://avro.apache.org/)** object container files.
//!
//! A container file is a header (magic, metadata, sync marker) followed by blocks of records
//! encoded with the writer schema stored in the header. Every block is closed by the sync marker.
//!
//! ```text
//! Obj\x01 | {avro.schema, avro.codec, ...} | marker | count size records marker | ...
//! ```
//!
//! Records are read as generic [`Value`](types::Value)s:
//!
//! ```
//! # use avro_container::{Reader, Schema, Writer, types::Value};
//! # use std::io::Cursor;
//! let schema = Schema::parse_str(r#"{"type": "array", "items": "long"}"#)?;
//! let mut writer = Writer::new(&schema, Vec::new())?;
//! writer.append_value(Value::Array(vec![1i64.into(), 2i64.into()]))?;
//! let file = writer.close()?;
//!
//! for value in Reader::new(Cursor::new(file))? {
//!     println!("{:?}", value?);
//! }
//! # Ok::<(), avro_container::Error>(())
//! ```
//!
//! A stream that starts after the header of a file, e.g. the remainder of a file fetched with a
//! range request, is read with [`Reader::headerless`]. The position of the next record can be
//! reported to a [`PositionTracker`] and later handed to [`Reader::headerless_builder`] to resume
//! exactly where reading stopped.
//!
//! Only the `null` and `deflate` codecs are supported.

mod codec;
mod decode;
mod encode;
mod header;
mod reader;
mod validator;
mod writer;

pub mod error;
pub mod schema;
pub mod types;
pub mod util;

pub use codec::{Codec, DeflateSettings};
pub use decode::{Decoder, decode, from_avro_datum};
pub use encode::{encode, to_avro_datum};
pub use error::Error;
pub use header::{Header, MAGIC, SYNC_SIZE, generate_sync_marker};
pub use reader::{
    Reader,
    position::{ObjectPosition, PositionTracker, Tracking},
};
pub use schema::Schema;
pub use writer::{Writer, WriterBuilder};

/// A convenience type alias for `Result`s with `Error`s.
pub type AvroResult<T> = Result<T, Error>;
