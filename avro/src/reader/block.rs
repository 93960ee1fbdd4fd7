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

use crate::{
    AvroResult, Codec, Error,
    decode::{Decoder, decode_internal},
    error::Details,
    header::SYNC_SIZE,
    reader::position::Tracking,
    schema::{Names, Schema, resolve_names},
    types::Value,
    util,
};
use log::{debug, warn};
use std::io::{Read, Seek, SeekFrom};

/// Internal Block reader, shared by the full and the header-less readers.
pub(super) struct Block<'s, R> {
    reader: R,
    codec: Codec,
    marker: [u8; SYNC_SIZE],
    pub(super) writer_schema: Schema,
    names: Names,
    /// Inflated payload of the current block, unused with `Codec::Null`.
    buf: Vec<u8>,
    buf_idx: usize,
    /// Number of elements left to read in the current block.
    message_count: usize,
    /// Number of elements already read from the current block.
    object_index: u64,
    /// Whether a sync marker may precede the next block header.
    expect_sync: bool,
    tracking: Tracking<'s>,
}

impl<'s, R: Read + Seek> Block<'s, R> {
    /// `expect_sync` is false right after a file header, where the first block header follows
    /// directly, and true when starting in the middle of a stream.
    pub(super) fn new(
        reader: R,
        writer_schema: Schema,
        codec: Codec,
        marker: [u8; SYNC_SIZE],
        expect_sync: bool,
        tracking: Tracking<'s>,
    ) -> AvroResult<Self> {
        let mut names = Names::new();
        resolve_names(&writer_schema, &mut names)?;

        let mut block = Block {
            reader,
            codec,
            marker,
            writer_schema,
            names,
            buf: vec![],
            buf_idx: 0,
            message_count: 0,
            object_index: 0,
            expect_sync,
            tracking,
        };
        block.track_boundary()?;
        Ok(block)
    }

    pub(super) fn codec(&self) -> Codec {
        self.codec
    }

    pub(super) fn marker(&self) -> [u8; SYNC_SIZE] {
        self.marker
    }

    pub(super) fn into_inner(self) -> R {
        self.reader
    }

    fn current_offset(&mut self) -> AvroResult<u64> {
        self.reader
            .stream_position()
            .map_err(|e| Details::SeekSource(e).into())
    }

    /// Report a point where a block header can be parsed.
    fn track_boundary(&mut self) -> AvroResult<()> {
        if self.tracking.is_enabled() {
            let offset = self.current_offset()?;
            debug!("Block boundary at offset {offset}");
            self.tracking.mark_current_offset(offset);
            self.tracking.set_object_index(0);
        }
        Ok(())
    }

    /// Consume the sync marker expected before a block header.
    ///
    /// Returns `false` if fewer than 16 bytes are left, which ends the stream cleanly. Bytes
    /// that do not match the marker are given back and parsed as a block header.
    fn skip_sync(&mut self) -> AvroResult<bool> {
        let mut proposed = [0u8; SYNC_SIZE];
        let n = util::read_up_to(&mut self.reader, &mut proposed)
            .map_err(Details::ReadBlockMarker)?;
        if n < SYNC_SIZE {
            return Ok(false);
        }
        if proposed != self.marker {
            debug!("Sync marker mismatch, reading a block header from the same position");
            self.reader
                .seek(SeekFrom::Current(-(SYNC_SIZE as i64)))
                .map_err(Details::SeekSource)?;
        }
        Ok(true)
    }

    /// Read the object count and the payload framing of the next block.
    ///
    /// Returns `false` if the stream ends cleanly before the block.
    fn read_block_header(&mut self) -> AvroResult<bool> {
        let count = match util::try_read_long(&mut self.reader) {
            Ok(Some(count)) => count,
            Ok(None) => return Ok(false),
            Err(e) => return Err(e.into_truncated()),
        };
        if count < 0 {
            return Err(Details::NegativeBlockCount(count).into());
        }
        self.message_count =
            usize::try_from(count).map_err(|e| Details::ConvertI64ToUsize(e, count))?;
        self.object_index = 0;

        match self.codec {
            Codec::Null => {
                // the size of the block is not needed, records are read straight from the source
                self.reader.skip_long().map_err(Error::into_truncated)?;
            }
            codec => {
                let mut payload = self.reader.read_bytes().map_err(Error::into_truncated)?;
                codec.decompress(&mut payload)?;
                self.buf = payload;
                self.buf_idx = 0;
            }
        }
        Ok(true)
    }

    fn decode_next(&mut self) -> AvroResult<Value> {
        match self.codec {
            Codec::Null => {
                decode_internal(&self.writer_schema, &self.names, &mut self.reader)
                    .map_err(Error::into_truncated)
            }
            _ => {
                let mut block_bytes = &self.buf[self.buf_idx..];
                let b_original = block_bytes.len();
                let item = decode_internal(&self.writer_schema, &self.names, &mut block_bytes)?;
                self.buf_idx += b_original - block_bytes.len();
                Ok(item)
            }
        }
    }

    pub(super) fn read_next(&mut self) -> AvroResult<Option<Value>> {
        while self.message_count == 0 {
            if self.expect_sync && !self.skip_sync()? {
                return Ok(None);
            }
            self.expect_sync = true;
            self.track_boundary()?;
            if !self.read_block_header()? {
                return Ok(None);
            }
        }

        let item = self.decode_next().map_err(|e| {
            if matches!(e.details(), Details::Truncated(_)) {
                e
            } else {
                Details::DatumDecodeFailed {
                    index: self.object_index,
                    source: Box::new(e),
                }
                .into()
            }
        })?;
        self.message_count -= 1;
        self.object_index += 1;

        if self.message_count == 0 && self.buf_idx < self.buf.len() {
            warn!(
                "{} bytes left undecoded at the end of a block",
                self.buf.len() - self.buf_idx
            );
        }

        if self.tracking.is_enabled() {
            if self.message_count == 0 {
                // the next record is the first of the next block, just past the marker
                let offset = self.current_offset()?;
                self.tracking.mark_current_offset(offset);
                self.tracking.set_object_index(0);
            } else {
                self.tracking.set_object_index(self.object_index);
            }
        }
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encode::{encode_bytes, encode_long},
        reader::position::ObjectPosition,
    };
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    type TestResult = anyhow::Result<()>;

    const MARKER: [u8; SYNC_SIZE] = [0xAB; SYNC_SIZE];

    /// Null-codec blocks of longs, each followed by the marker.
    fn null_blocks(blocks: &[&[i64]]) -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::new();
        for block in blocks {
            let mut payload = Vec::new();
            for n in *block {
                encode_long(*n, &mut payload)?;
            }
            encode_long(block.len() as i64, &mut out)?;
            encode_long(payload.len() as i64, &mut out)?;
            out.extend_from_slice(&payload);
            out.extend_from_slice(&MARKER);
        }
        Ok(out)
    }

    fn read_all<R: Read + Seek>(block: &mut Block<'_, R>) -> AvroResult<Vec<Value>> {
        let mut values = Vec::new();
        while let Some(value) = block.read_next()? {
            values.push(value);
        }
        Ok(values)
    }

    #[test]
    fn reads_consecutive_blocks() -> TestResult {
        let data = null_blocks(&[&[1, 2], &[3]])?;
        let mut block = Block::new(
            Cursor::new(data),
            Schema::Long,
            Codec::Null,
            MARKER,
            false,
            Tracking::Disabled,
        )?;
        assert_eq!(
            read_all(&mut block)?,
            vec![Value::Long(1), Value::Long(2), Value::Long(3)]
        );
        // exhausted for good
        assert_eq!(block.read_next()?, None);
        Ok(())
    }

    #[test]
    fn mismatching_marker_is_given_back() -> TestResult {
        let mut data = null_blocks(&[&[1]])?;
        // drop the trailing marker of the first block
        data.truncate(data.len() - SYNC_SIZE);
        data.extend(null_blocks(&[&[2, 3]])?);

        let mut block = Block::new(
            Cursor::new(data),
            Schema::Long,
            Codec::Null,
            MARKER,
            false,
            Tracking::Disabled,
        )?;
        assert_eq!(
            read_all(&mut block)?,
            vec![Value::Long(1), Value::Long(2), Value::Long(3)]
        );
        Ok(())
    }

    #[test]
    fn partial_trailing_marker_is_a_clean_end() -> TestResult {
        let mut data = null_blocks(&[&[1]])?;
        data.truncate(data.len() - 5);
        let mut block = Block::new(
            Cursor::new(data),
            Schema::Long,
            Codec::Null,
            MARKER,
            false,
            Tracking::Disabled,
        )?;
        assert_eq!(read_all(&mut block)?, vec![Value::Long(1)]);
        Ok(())
    }

    #[test]
    fn negative_block_count() -> TestResult {
        let mut data = Vec::new();
        encode_long(-2, &mut data)?;
        let mut block = Block::new(
            Cursor::new(data),
            Schema::Long,
            Codec::Null,
            MARKER,
            false,
            Tracking::Disabled,
        )?;
        let err = block.read_next().unwrap_err();
        assert!(matches!(err.details(), Details::NegativeBlockCount(-2)));
        Ok(())
    }

    #[test]
    fn truncated_null_payload() -> TestResult {
        let mut data = Vec::new();
        encode_long(2, &mut data)?;
        encode_long(10, &mut data)?;
        encode_bytes("abc", &mut data)?;
        let mut block = Block::new(
            Cursor::new(data),
            Schema::String,
            Codec::Null,
            MARKER,
            false,
            Tracking::Disabled,
        )?;
        assert_eq!(block.read_next()?, Some(Value::String("abc".into())));
        let err = block.read_next().unwrap_err();
        assert!(matches!(err.details(), Details::Truncated(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn undecodable_record_reports_its_index() -> TestResult {
        let mut data = Vec::new();
        encode_long(2, &mut data)?;
        encode_long(2, &mut data)?;
        data.extend_from_slice(&[1, 7]);
        let mut block = Block::new(
            Cursor::new(data),
            Schema::Boolean,
            Codec::Null,
            MARKER,
            false,
            Tracking::Disabled,
        )?;
        assert_eq!(block.read_next()?, Some(Value::Boolean(true)));
        let err = block.read_next().unwrap_err();
        match err.details() {
            Details::DatumDecodeFailed { index, source } => {
                assert_eq!(*index, 1);
                assert!(matches!(source.details(), Details::BoolValue(7)));
            }
            other => panic!("Expected DatumDecodeFailed, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn positions_follow_block_boundaries() -> TestResult {
        let data = null_blocks(&[&[1, 2], &[3]])?;
        let first_block_end = {
            let mut one = null_blocks(&[&[1, 2]])?;
            one.truncate(one.len() - SYNC_SIZE);
            one.len() as u64
        };

        let mut position = ObjectPosition::default();
        let mut seen = Vec::new();
        {
            let mut block = Block::new(
                Cursor::new(data),
                Schema::Long,
                Codec::Null,
                MARKER,
                false,
                Tracking::enabled(&mut position),
            )?;
            while block.read_next()?.is_some() {
                seen.push(block.object_index);
            }
        }
        assert_eq!(seen, vec![1, 2, 1]);
        // after the last record, the position points just before the final marker
        assert_eq!(position.object_index, 0);
        assert!(position.block_offset > first_block_end);
        Ok(())
    }
}
