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

//! Block compression codecs.
//!
//! The set of variants of [`Codec`] is the codec registry: the `avro.codec` metadata value is
//! looked up by name with [`Codec::from_name`], and every variant knows how to compress and
//! decompress a block payload.

use crate::{AvroResult, error::Details};
use std::str::FromStr;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Settings for the `Deflate` codec.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct DeflateSettings {
    compression_level: miniz_oxide::deflate::CompressionLevel,
}

impl DeflateSettings {
    pub fn new(compression_level: miniz_oxide::deflate::CompressionLevel) -> Self {
        DeflateSettings { compression_level }
    }

    fn compression_level(&self) -> u8 {
        self.compression_level as u8
    }
}

impl Default for DeflateSettings {
    /// Default compression level is `miniz_oxide::deflate::CompressionLevel::DefaultCompression`.
    fn default() -> Self {
        Self::new(miniz_oxide::deflate::CompressionLevel::DefaultCompression)
    }
}

/// The compression codec used to compress blocks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab_case")]
pub enum Codec {
    /// The `Null` codec simply passes through data uncompressed.
    #[default]
    Null,
    /// The `Deflate` codec writes the data block using the deflate algorithm
    /// as specified in RFC 1951.
    /// Note that this format (unlike the "zlib format" in RFC 1950) has neither a header nor a
    /// checksum.
    Deflate(DeflateSettings),
}

impl Codec {
    /// Look up a codec by the name stored under `avro.codec`.
    pub fn from_name(name: &str) -> AvroResult<Self> {
        Codec::from_str(name).map_err(|_| Details::UnknownCodec(name.to_owned()).into())
    }

    /// The name stored under `avro.codec` for this codec.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Compress a stream of bytes in-place.
    pub fn compress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        match self {
            Codec::Null => (),
            Codec::Deflate(settings) => {
                let compressed =
                    miniz_oxide::deflate::compress_to_vec(stream, settings.compression_level());
                *stream = compressed;
            }
        };

        Ok(())
    }

    /// Decompress a stream of bytes in-place.
    pub fn decompress(self, stream: &mut Vec<u8>) -> AvroResult<()> {
        *stream = match self {
            Codec::Null => return Ok(()),
            Codec::Deflate(_settings) => miniz_oxide::inflate::decompress_to_vec(stream).map_err(|e| {
                let err = {
                    use miniz_oxide::inflate::TINFLStatus::*;
                    use std::io::{Error, ErrorKind};
                    match e.status {
                        FailedCannotMakeProgress => Error::from(ErrorKind::UnexpectedEof),
                        BadParam => Error::other("miniz_oxide reported invalid output buffer size"), // not possible for _to_vec()
                        Adler32Mismatch => Error::from(ErrorKind::InvalidData),
                        Failed => Error::from(ErrorKind::InvalidData),
                        Done => Error::other("miniz_oxide reported an error with a success status"),
                        NeedsMoreInput => Error::from(ErrorKind::UnexpectedEof),
                        HasMoreOutput => Error::other("miniz_oxide has more data than the output buffer can hold"), // not possible for _to_vec()
                    }
                };
                Details::DecompressionFailed(err)
            })?,
        };
        Ok(())
    }
}
