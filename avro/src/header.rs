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

//! The file header of an object container file.
//!
//! ```text
//! magic ("Obj" 0x01) | metadata map<bytes> | sync marker (16 bytes)
//! ```

use crate::{
    AvroResult, Codec, Error, Schema,
    decode::Decoder,
    encode::{encode_bytes, encode_long},
    error::Details,
    util,
};
use log::warn;
use std::{
    collections::HashMap,
    io::{Read, Write},
};

/// The four bytes every container file starts with.
pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 1u8];
/// Size of the sync marker that closes the header and every block.
pub const SYNC_SIZE: usize = 16;

pub(crate) const SCHEMA_KEY: &str = "avro.schema";
pub(crate) const CODEC_KEY: &str = "avro.codec";
const COMPRESSION_LEVEL_KEY: &str = "avro.codec.compression_level";
const RESERVED_PREFIX: &str = "avro.";

/// The parsed header of a container file.
///
/// A header is read once and never changes afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    schema: Schema,
    codec: Codec,
    sync_marker: [u8; SYNC_SIZE],
    metadata: HashMap<String, Vec<u8>>,
}

impl Header {
    /// Build the header of a new file.
    ///
    /// `user_metadata` must not contain reserved (`avro.`) keys.
    pub fn new(
        schema: Schema,
        codec: Codec,
        sync_marker: [u8; SYNC_SIZE],
        user_metadata: HashMap<String, Vec<u8>>,
    ) -> AvroResult<Self> {
        if let Some(key) = user_metadata.keys().find(|k| k.starts_with(RESERVED_PREFIX)) {
            return Err(Details::InvalidMetadataKey(key.clone()).into());
        }

        let schema_bytes = serde_json::to_string(&schema)
            .map_err(Details::ConvertJsonToString)?
            .into_bytes();

        let mut metadata = user_metadata;
        metadata.insert(SCHEMA_KEY.to_string(), schema_bytes);
        if codec != Codec::Null {
            metadata.insert(CODEC_KEY.to_string(), codec.name().as_bytes().to_vec());
        }

        Ok(Self {
            schema,
            codec,
            sync_marker,
            metadata,
        })
    }

    /// Read a header from the current position of `reader`.
    ///
    /// The magic is checked before anything else is read, and the codec is validated before
    /// returning, so no block is ever read from a file with an unsupported codec.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> AvroResult<Self> {
        let mut magic = [0u8; 4];
        util::read_up_to(reader, &mut magic).map_err(Details::ReadHeader)?;
        if magic != MAGIC {
            return Err(Details::BadMagic(magic).into());
        }

        let metadata = read_metadata(reader)?;

        let mut sync_marker = [0u8; SYNC_SIZE];
        reader
            .read_exact(&mut sync_marker)
            .map_err(Details::ReadMarker)?;

        let schema_bytes = metadata.get(SCHEMA_KEY).ok_or(Details::MissingSchema)?;
        let schema_json: serde_json::Value =
            serde_json::from_slice(schema_bytes).map_err(Details::ParseSchemaJson)?;
        let schema = Schema::parse(&schema_json)?;

        let codec = match metadata.get(CODEC_KEY) {
            Some(bytes) => {
                let name = String::from_utf8_lossy(bytes);
                Codec::from_name(&name)?
            }
            None => Codec::Null,
        };

        for key in metadata.keys() {
            if key.starts_with(RESERVED_PREFIX)
                && key != SCHEMA_KEY
                && key != CODEC_KEY
                && key != COMPRESSION_LEVEL_KEY
            {
                warn!("Ignoring unknown metadata key: {key}");
            }
        }

        Ok(Self {
            schema,
            codec,
            sync_marker,
            metadata,
        })
    }

    /// Write the header to `writer`. Metadata entries are written sorted by key.
    ///
    /// Returns the number of bytes written.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> AvroResult<usize> {
        writer.write_all(&MAGIC).map_err(Details::WriteBytes)?;
        let mut num_bytes = MAGIC.len();

        if !self.metadata.is_empty() {
            let mut entries: Vec<_> = self.metadata.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            num_bytes += encode_long(entries.len() as i64, writer)?;
            for (key, value) in entries {
                num_bytes += encode_bytes(key, writer)?;
                num_bytes += encode_bytes(value, writer)?;
            }
        }
        num_bytes += encode_long(0, writer)?;

        writer
            .write_all(&self.sync_marker)
            .map_err(Details::WriteMarker)?;
        Ok(num_bytes + SYNC_SIZE)
    }

    /// The writer schema, parsed from `avro.schema`.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The block codec, from `avro.codec`.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn sync_marker(&self) -> [u8; SYNC_SIZE] {
        self.sync_marker
    }

    /// The raw value of any metadata entry, reserved or not.
    pub fn get_meta(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(Vec::as_slice)
    }

    /// The metadata entries that are not reserved by the format.
    pub fn user_metadata(&self) -> HashMap<&str, &[u8]> {
        self.metadata
            .iter()
            .filter(|(key, _)| !key.starts_with(RESERVED_PREFIX))
            .map(|(key, value)| (key.as_str(), value.as_slice()))
            .collect()
    }
}

/// Read the metadata map. Keys must be unique.
fn read_metadata<R: Read + ?Sized>(reader: &mut R) -> AvroResult<HashMap<String, Vec<u8>>> {
    let mut metadata = HashMap::new();
    loop {
        let mut count = reader.read_long()?;
        if count == 0 {
            break;
        }
        if count < 0 {
            // followed by the size of the block in bytes
            reader.skip_long()?;
            count = count.checked_neg().ok_or(Details::IntegerOverflow)?;
        }
        for _ in 0..count {
            let key = String::from_utf8(reader.read_bytes()?).map_err(Details::ConvertToUtf8)?;
            let value = reader.read_bytes()?;
            if metadata.contains_key(&key) {
                return Err(Error::new(Details::DuplicateMetadataKey(key)));
            }
            metadata.insert(key, value);
        }
    }
    Ok(metadata)
}

/// Draw a fresh random sync marker.
pub fn generate_sync_marker() -> [u8; SYNC_SIZE] {
    rand::random()
}
