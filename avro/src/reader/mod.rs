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

//! Logic handling reading container files at user level.

mod block;
pub mod position;

use crate::{
    AvroResult, Codec,
    error::Details,
    header::{Header, SYNC_SIZE},
    schema::Schema,
    types::Value,
};
use block::Block;
use bon::bon;
use position::{ObjectPosition, Tracking};
use std::{
    collections::HashMap,
    io::{Read, Seek, SeekFrom},
    iter::FusedIterator,
};

/// Main interface for reading container files.
///
/// To be used as an iterator:
///
/// ```no_run
/// # use avro_container::Reader;
/// # use std::io::Cursor;
/// # let input = Cursor::new(Vec::<u8>::new());
/// for value in Reader::new(input).unwrap() {
///     match value {
///         Ok(v) => println!("{:?}", v),
///         Err(e) => println!("Error: {}", e),
///     };
/// }
/// ```
///
/// The iteration ends for good at the end of the stream or after the first error.
pub struct Reader<'s, R> {
    block: Block<'s, R>,
    /// `None` for a header-less reader.
    header: Option<Header>,
    errored: bool,
    finished: bool,
}

#[bon]
impl<'s, R: Read + Seek> Reader<'s, R> {
    /// Creates a `Reader` for a complete container file.
    ///
    /// **NOTE** The header is read from the start of `reader` upon creation of the `Reader`.
    pub fn new(reader: R) -> AvroResult<Reader<'s, R>> {
        Reader::builder(reader).build()
    }

    /// Creates a `Reader` for a complete container file, optionally reporting the position of
    /// the next record to a [`PositionTracker`](position::PositionTracker).
    ///
    /// **NOTE** The header is read from the start of `reader` upon creation of the `Reader`.
    #[builder(finish_fn = build)]
    pub fn builder(
        #[builder(start_fn)] reader: R,
        #[builder(default)] tracking: Tracking<'s>,
    ) -> AvroResult<Reader<'s, R>> {
        let mut reader = reader;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(Details::SeekSource)?;
        let header = Header::read(&mut reader)?;

        let block = Block::new(
            reader,
            header.schema().clone(),
            header.codec(),
            header.sync_marker(),
            false,
            tracking,
        )?;
        Ok(Reader {
            block,
            header: Some(header),
            errored: false,
            finished: false,
        })
    }

    /// Creates a `Reader` for a stream that starts somewhere after the header of a file, e.g. a
    /// range download of a file whose header was read earlier.
    ///
    /// Reading starts at the current position of `reader`, which may be just before a sync
    /// marker or directly at a block header. Blocks are expected to use `Codec::Null`, see
    /// [`Reader::headerless_builder`] for other codecs.
    pub fn headerless(
        reader: R,
        schema: Schema,
        marker: [u8; SYNC_SIZE],
    ) -> AvroResult<Reader<'s, R>> {
        Reader::headerless_builder(reader, schema, marker).build()
    }

    /// Creates a header-less `Reader`, see [`Reader::headerless`].
    ///
    /// `codec` defaults to `Codec::Null`; pass the codec of the file header for compressed files.
    /// With `resume_from`, `reader` is first moved to the saved block offset and the records of
    /// that block that were already read are skipped.
    #[builder(finish_fn = build)]
    pub fn headerless_builder(
        #[builder(start_fn)] reader: R,
        #[builder(start_fn)] schema: Schema,
        #[builder(start_fn)] marker: [u8; SYNC_SIZE],
        #[builder(default)] codec: Codec,
        #[builder(default)] tracking: Tracking<'s>,
        resume_from: Option<ObjectPosition>,
    ) -> AvroResult<Reader<'s, R>> {
        let mut reader = reader;
        if let Some(position) = resume_from {
            reader
                .seek(SeekFrom::Start(position.block_offset))
                .map_err(Details::SeekSource)?;
        }

        let block = Block::new(reader, schema, codec, marker, true, tracking)?;
        let mut reader = Reader {
            block,
            header: None,
            errored: false,
            finished: false,
        };

        if let Some(position) = resume_from {
            for _ in 0..position.object_index {
                if reader.block.read_next()?.is_none() {
                    reader.finished = true;
                    break;
                }
            }
        }
        Ok(reader)
    }

    /// Get a reference to the writer `Schema`.
    #[inline]
    pub fn writer_schema(&self) -> &Schema {
        &self.block.writer_schema
    }

    /// The file header, `None` for a header-less reader.
    #[inline]
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    #[inline]
    pub fn codec(&self) -> Codec {
        self.block.codec()
    }

    #[inline]
    pub fn sync_marker(&self) -> [u8; SYNC_SIZE] {
        self.block.marker()
    }

    /// The raw value of a metadata entry. Always `None` for a header-less reader.
    pub fn get_meta(&self, key: &str) -> Option<&[u8]> {
        self.header.as_ref().and_then(|header| header.get_meta(key))
    }

    /// Get the user metadata. Always empty for a header-less reader.
    pub fn user_metadata(&self) -> HashMap<&str, &[u8]> {
        self.header
            .as_ref()
            .map(Header::user_metadata)
            .unwrap_or_default()
    }

    /// Return the underlying byte source, consuming the `Reader`.
    pub fn into_inner(self) -> R {
        self.block.into_inner()
    }

    #[inline]
    fn read_next(&mut self) -> AvroResult<Option<Value>> {
        self.block.read_next()
    }
}

impl<R: Read + Seek> Iterator for Reader<'_, R> {
    type Item = AvroResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        // to prevent keep on reading after the first error occurs
        if self.errored || self.finished {
            return None;
        };
        match self.read_next() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.errored = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> FusedIterator for Reader<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        header::MAGIC,
        reader::position::PositionTracker,
        types::Record,
    };
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, io::Cursor, rc::Rc};

    type TestResult = anyhow::Result<()>;

    const SCHEMA: &str = r#"
    {
      "type": "record",
      "name": "test",
      "fields": [
        {
          "name": "a",
          "type": "long",
          "default": 42
        },
        {
          "name": "b",
          "type": "string"
        }
      ]
    }
    "#;
    const ENCODED: &[u8] = &[
        79u8, 98u8, 106u8, 1u8, 4u8, 22u8, 97u8, 118u8, 114u8, 111u8, 46u8, 115u8, 99u8, 104u8,
        101u8, 109u8, 97u8, 222u8, 1u8, 123u8, 34u8, 116u8, 121u8, 112u8, 101u8, 34u8, 58u8, 34u8,
        114u8, 101u8, 99u8, 111u8, 114u8, 100u8, 34u8, 44u8, 34u8, 110u8, 97u8, 109u8, 101u8, 34u8,
        58u8, 34u8, 116u8, 101u8, 115u8, 116u8, 34u8, 44u8, 34u8, 102u8, 105u8, 101u8, 108u8,
        100u8, 115u8, 34u8, 58u8, 91u8, 123u8, 34u8, 110u8, 97u8, 109u8, 101u8, 34u8, 58u8, 34u8,
        97u8, 34u8, 44u8, 34u8, 116u8, 121u8, 112u8, 101u8, 34u8, 58u8, 34u8, 108u8, 111u8, 110u8,
        103u8, 34u8, 44u8, 34u8, 100u8, 101u8, 102u8, 97u8, 117u8, 108u8, 116u8, 34u8, 58u8, 52u8,
        50u8, 125u8, 44u8, 123u8, 34u8, 110u8, 97u8, 109u8, 101u8, 34u8, 58u8, 34u8, 98u8, 34u8,
        44u8, 34u8, 116u8, 121u8, 112u8, 101u8, 34u8, 58u8, 34u8, 115u8, 116u8, 114u8, 105u8,
        110u8, 103u8, 34u8, 125u8, 93u8, 125u8, 20u8, 97u8, 118u8, 114u8, 111u8, 46u8, 99u8, 111u8,
        100u8, 101u8, 99u8, 8u8, 110u8, 117u8, 108u8, 108u8, 0u8, 94u8, 61u8, 54u8, 221u8, 190u8,
        207u8, 108u8, 180u8, 158u8, 57u8, 114u8, 40u8, 173u8, 199u8, 228u8, 239u8, 4u8, 20u8, 54u8,
        6u8, 102u8, 111u8, 111u8, 84u8, 6u8, 98u8, 97u8, 114u8, 94u8, 61u8, 54u8, 221u8, 190u8,
        207u8, 108u8, 180u8, 158u8, 57u8, 114u8, 40u8, 173u8, 199u8, 228u8, 239u8,
    ];
    /// Offset of the first block header in `ENCODED`.
    const FIRST_BLOCK: usize = ENCODED.len() - SYNC_SIZE - 12;

    fn expected_records(schema: &Schema) -> Vec<Value> {
        let mut record1 = Record::new(schema).unwrap();
        record1.put("a", 27i64);
        record1.put("b", "foo");

        let mut record2 = Record::new(schema).unwrap();
        record2.put("a", 42i64);
        record2.put("b", "bar");

        vec![record1.into(), record2.into()]
    }

    #[test]
    fn test_reader_iterator() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let reader = Reader::new(Cursor::new(ENCODED))?;
        assert_eq!(reader.writer_schema(), &schema);
        assert_eq!(reader.codec(), Codec::Null);
        assert_eq!(reader.get_meta("avro.codec"), Some(&b"null"[..]));
        assert!(reader.user_metadata().is_empty());

        let values = reader.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(values, expected_records(&schema));
        Ok(())
    }

    #[test]
    fn test_reader_starts_from_the_beginning() -> TestResult {
        let mut cursor = Cursor::new(ENCODED);
        cursor.set_position(FIRST_BLOCK as u64);
        let reader = Reader::new(cursor)?;
        assert_eq!(reader.count(), 2);
        Ok(())
    }

    #[test]
    fn test_reader_invalid_header() {
        let mut invalid = ENCODED.to_vec();
        invalid[3] = 2;
        let err = Reader::new(Cursor::new(invalid)).map(|_| ()).unwrap_err();
        assert!(matches!(err.details(), Details::BadMagic(_)));
    }

    #[test]
    fn test_reader_invalid_block() -> TestResult {
        // the string length of the second record points past the end of the stream
        let mut invalid = ENCODED.to_vec();
        let cut = invalid.len() - SYNC_SIZE - 4;
        invalid.truncate(cut);
        let reader = Reader::new(Cursor::new(invalid))?;
        let results: Vec<AvroResult<Value>> = reader.collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(err.details(), Details::Truncated(_)), "{err:?}");
        Ok(())
    }

    #[test]
    fn test_reader_empty_buffer() {
        let empty = Cursor::new(Vec::<u8>::new());
        assert!(Reader::new(empty).is_err());
    }

    #[test]
    fn test_reader_only_header() -> TestResult {
        let only_header = ENCODED[..FIRST_BLOCK].to_vec();
        let mut reader = Reader::new(Cursor::new(only_header))?;
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn test_errors_end_the_iteration() -> TestResult {
        let mut invalid = ENCODED.to_vec();
        // negative object count in the only block
        invalid[FIRST_BLOCK] = 3;
        let mut reader = Reader::new(Cursor::new(invalid))?;
        let err = reader.next().map(|r| r.map_err(Error::into_details));
        assert!(matches!(err, Some(Err(Details::NegativeBlockCount(-2)))));
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn test_headerless_reader() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let marker = Reader::new(Cursor::new(ENCODED))?.sync_marker();

        // positioned right before the marker closing the header
        let mut cursor = Cursor::new(ENCODED);
        cursor.set_position((FIRST_BLOCK - SYNC_SIZE) as u64);
        let reader = Reader::headerless(cursor, schema.clone(), marker)?;
        assert!(reader.header().is_none());
        assert!(reader.user_metadata().is_empty());
        let values = reader.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(values, expected_records(&schema));

        // positioned directly at the block header
        let mut cursor = Cursor::new(ENCODED);
        cursor.set_position(FIRST_BLOCK as u64);
        let reader = Reader::headerless(cursor, schema.clone(), marker)?;
        assert_eq!(reader.count(), 2);
        Ok(())
    }

    #[test]
    fn test_tracking_and_resume() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let position = Rc::new(RefCell::new(ObjectPosition::default()));

        let mut reader = Reader::builder(Cursor::new(ENCODED))
            .tracking(Tracking::enabled(Rc::clone(&position)))
            .build()?;
        assert_eq!(position.borrow().block_offset, FIRST_BLOCK as u64);

        let first = reader.next().transpose()?;
        assert_eq!(first.as_ref(), expected_records(&schema).first());
        let saved = *position.borrow();
        assert_eq!(
            saved,
            ObjectPosition {
                block_offset: FIRST_BLOCK as u64,
                object_index: 1
            }
        );

        let resumed =
            Reader::headerless_builder(Cursor::new(ENCODED), schema.clone(), reader.sync_marker())
                .resume_from(saved)
                .build()?;
        let rest = resumed.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rest, expected_records(&schema)[1..].to_vec());
        Ok(())
    }

    #[test]
    fn test_custom_tracker() -> TestResult {
        #[derive(Default)]
        struct Log(Vec<String>);

        impl PositionTracker for Log {
            fn mark_current_offset(&mut self, offset: u64) {
                self.0.push(format!("offset {offset}"));
            }

            fn set_object_index(&mut self, index: u64) {
                self.0.push(format!("index {index}"));
            }
        }

        let mut log = Log::default();
        let reader = Reader::builder(Cursor::new(ENCODED))
            .tracking(Tracking::enabled(&mut log))
            .build()?;
        assert_eq!(reader.count(), 2);

        let end = ENCODED.len() - SYNC_SIZE;
        assert_eq!(
            log.0,
            vec![
                format!("offset {FIRST_BLOCK}"),
                "index 0".to_string(),
                format!("offset {FIRST_BLOCK}"),
                "index 0".to_string(),
                "index 1".to_string(),
                format!("offset {end}"),
                "index 0".to_string(),
                format!("offset {}", ENCODED.len()),
                "index 0".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_header_magic_constant() {
        assert_eq!(&ENCODED[..4], &MAGIC);
    }
}
