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

//! Logic handling writing container files at user level.
use crate::{
    AvroResult, Codec,
    encode::{encode_internal, encode_long},
    error::Details,
    header::{Header, SYNC_SIZE, generate_sync_marker},
    schema::{Names, Schema, resolve_names},
    types::Value,
};
use log::debug;
use std::{
    collections::HashMap,
    io::{Read, Seek, SeekFrom, Write},
    mem::ManuallyDrop,
};

const DEFAULT_BLOCK_SIZE: usize = 16000;
const RESERVED_PREFIX: &str = "avro.";

/// Main interface for writing container files.
///
/// It is critical to call [`close`](Writer::close) or flush before `Writer<W>` is dropped. Though
/// dropping will attempt to flush the contents of the buffer, any errors that happen in the
/// process of dropping will be ignored.
pub struct Writer<'a, W: Write> {
    schema: &'a Schema,
    writer: W,
    names: Names,
    codec: Codec,
    block_size: usize,
    objects_per_block: Option<usize>,
    buffer: Vec<u8>,
    num_values: usize,
    marker: [u8; SYNC_SIZE],
    has_header: bool,
    user_metadata: HashMap<String, Vec<u8>>,
}

#[bon::bon]
impl<'a, W: Write> Writer<'a, W> {
    #[builder]
    pub fn builder(
        schema: &'a Schema,
        writer: W,
        #[builder(default = Codec::Null)] codec: Codec,
        /// Number of buffered bytes after which a block is written.
        #[builder(default = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Number of buffered records after which a block is written.
        objects_per_block: Option<usize>,
        #[builder(default = generate_sync_marker())] marker: [u8; SYNC_SIZE],
        /// Has the header already been written.
        ///
        /// To disable writing the header, this can be set to `true`.
        #[builder(default = false)]
        has_header: bool,
        #[builder(default)] user_metadata: HashMap<String, Vec<u8>>,
    ) -> AvroResult<Self> {
        if let Some(key) = user_metadata.keys().find(|k| k.starts_with(RESERVED_PREFIX)) {
            return Err(Details::InvalidMetadataKey(key.clone()).into());
        }
        let mut names = Names::new();
        resolve_names(schema, &mut names)?;

        Ok(Self {
            schema,
            writer,
            names,
            codec,
            block_size,
            objects_per_block: objects_per_block.filter(|n| *n > 0),
            buffer: Vec::with_capacity(block_size),
            num_values: 0,
            marker,
            has_header,
            user_metadata,
        })
    }
}

impl<'a, W: Write> Writer<'a, W> {
    /// Creates a `Writer` given a `Schema` and something implementing the `io::Write` trait to write
    /// to.
    /// No compression `Codec` will be used.
    pub fn new(schema: &'a Schema, writer: W) -> AvroResult<Self> {
        Writer::with_codec(schema, writer, Codec::Null)
    }

    /// Creates a `Writer` with a specific `Codec` given a `Schema` and something implementing the
    /// `io::Write` trait to write to.
    pub fn with_codec(schema: &'a Schema, writer: W, codec: Codec) -> AvroResult<Self> {
        Self::builder()
            .schema(schema)
            .writer(writer)
            .codec(codec)
            .build()
    }

    /// Creates a `Writer` that appends blocks to an existing file whose header was already read.
    ///
    /// `writer` must be positioned at the end of the file. The existing sync marker is reused.
    /// Fails if the schema or the codec differ from the ones recorded in `header`.
    pub fn append_to(
        schema: &'a Schema,
        writer: W,
        codec: Codec,
        header: &Header,
    ) -> AvroResult<Self> {
        if header.schema() != schema {
            return Err(Details::AppendSchemaMismatch.into());
        }
        if header.codec().name() != codec.name() {
            return Err(Details::AppendCodecMismatch {
                existing: header.codec().name(),
                requested: codec.name(),
            }
            .into());
        }

        Self::builder()
            .schema(schema)
            .writer(writer)
            .codec(codec)
            .marker(header.sync_marker())
            .has_header(true)
            .build()
    }

    /// Get a reference to the `Schema` associated to a `Writer`.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// The sync marker written after the header and after every block.
    pub fn sync_marker(&self) -> [u8; SYNC_SIZE] {
        self.marker
    }

    /// Append a value to the `Writer`, also performs schema validation.
    ///
    /// Returns the number of bytes written (it might be 0, see below).
    ///
    /// **NOTE**: This function is not guaranteed to perform any actual write, since it relies on
    /// internal buffering for performance reasons. If you want to be sure the value has been
    /// written, then call [`flush`](Writer::flush).
    pub fn append_value<T: Into<Value>>(&mut self, value: T) -> AvroResult<usize> {
        let avro = value.into();
        self.append_value_ref(&avro)
    }

    /// Append a compatible value to a `Writer`, also performs schema validation.
    ///
    /// Returns the number of bytes written (it might be 0, see below).
    pub fn append_value_ref(&mut self, value: &Value) -> AvroResult<usize> {
        if let Some(reason) = value.validate_internal(self.schema, &self.names) {
            return Err(Details::Validation(reason).into());
        }
        self.unvalidated_append_value_ref(value)
    }

    /// Append a compatible value to a `Writer`.
    ///
    /// This function does **not** validate that the provided value matches the schema. If it does
    /// not match, the file will contain corrupt data. Use [`Writer::append_value`] to have the
    /// value validated during write or use [`Value::validate`] to validate the value.
    pub fn unvalidated_append_value<T: Into<Value>>(&mut self, value: T) -> AvroResult<usize> {
        let value = value.into();
        self.unvalidated_append_value_ref(&value)
    }

    /// Append a compatible value to a `Writer` without validating it.
    ///
    /// Returns the number of bytes written (it might be 0, see below).
    ///
    /// **NOTE**: This function is not guaranteed to perform any actual write, since it relies on
    /// internal buffering for performance reasons. If you want to be sure the value has been
    /// written, then call [`flush`](Writer::flush).
    pub fn unvalidated_append_value_ref(&mut self, value: &Value) -> AvroResult<usize> {
        let n = self.maybe_write_header()?;
        let record_start = self.buffer.len();
        if let Err(e) = encode_internal(value, self.schema, &self.names, &mut self.buffer) {
            // drop the partially encoded record
            self.buffer.truncate(record_start);
            return Err(e);
        }

        self.num_values += 1;

        let block_full = self.buffer.len() >= self.block_size
            || self
                .objects_per_block
                .is_some_and(|limit| self.num_values >= limit);
        if block_full {
            return self.flush().map(|b| b + n);
        }

        Ok(n)
    }

    /// Extend a `Writer` with an `Iterator` of values, also performs schema validation.
    ///
    /// Returns the number of bytes written.
    ///
    /// **NOTE**: This function forces the written data to be flushed (an implicit
    /// call to [`flush`](Writer::flush) is performed).
    pub fn extend<I, T: Into<Value>>(&mut self, values: I) -> AvroResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let mut num_bytes = 0;
        for value in values {
            num_bytes += self.append_value(value)?;
        }
        num_bytes += self.flush()?;

        Ok(num_bytes)
    }

    /// Extend a `Writer` by appending each `Value` from a slice, while also performing schema
    /// validation on each value appended.
    ///
    /// Returns the number of bytes written.
    ///
    /// **NOTE**: This function forces the written data to be flushed (an implicit
    /// call to [`flush`](Writer::flush) is performed).
    pub fn extend_from_slice(&mut self, values: &[Value]) -> AvroResult<usize> {
        let mut num_bytes = 0;
        for value in values {
            num_bytes += self.append_value_ref(value)?;
        }
        num_bytes += self.flush()?;

        Ok(num_bytes)
    }

    /// Write the buffered records as one block.
    ///
    /// This will also write the header if it wasn't written yet and hasn't been disabled using
    /// [`WriterBuilder::has_header`].
    ///
    /// Returns the number of bytes written.
    pub fn flush(&mut self) -> AvroResult<usize> {
        let mut num_bytes = self.maybe_write_header()?;
        if self.num_values == 0 {
            return Ok(num_bytes);
        }

        self.codec.compress(&mut self.buffer)?;

        let num_values = i64::try_from(self.num_values)
            .map_err(|e| Details::ConvertUsizeToI64(e, self.num_values))?;
        let stream_len = i64::try_from(self.buffer.len())
            .map_err(|e| Details::ConvertUsizeToI64(e, self.buffer.len()))?;
        debug!("Writing a block of {num_values} records, {stream_len} bytes");

        num_bytes += encode_long(num_values, &mut self.writer)?
            + encode_long(stream_len, &mut self.writer)?;
        self.writer
            .write_all(&self.buffer)
            .map_err(Details::WriteBytes)?;
        num_bytes += self.buffer.len() + self.append_marker()?;

        self.buffer.clear();
        self.num_values = 0;

        self.writer.flush().map_err(Details::FlushWriter)?;

        Ok(num_bytes)
    }

    /// Finish the file and return what the `Writer` is writing to, consuming the `Writer` itself.
    ///
    /// The last partial block is written, as well as the header of a file without records.
    pub fn close(mut self) -> AvroResult<W> {
        self.flush()?;

        let mut this = ManuallyDrop::new(self);

        // Extract every member that is not Copy and therefore should be dropped
        let _buffer = std::mem::take(&mut this.buffer);
        let _user_metadata = std::mem::take(&mut this.user_metadata);
        let _names = std::mem::take(&mut this.names);

        // SAFETY: double-drops are prevented by putting `this` in a ManuallyDrop that is never dropped
        let writer = unsafe { std::ptr::read(&this.writer) };

        Ok(writer)
    }

    /// Gets a reference to the underlying writer.
    ///
    /// **NOTE**: There is likely data still in the buffer. To have all the data
    /// in the writer call [`flush`](Writer::flush) first.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Gets a mutable reference to the underlying writer.
    ///
    /// It is inadvisable to directly write to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Adds custom metadata to the file.
    /// This method could be used only before adding the first record to the writer.
    pub fn add_user_metadata<T: AsRef<[u8]>>(&mut self, key: String, value: T) -> AvroResult<()> {
        if self.has_header {
            return Err(Details::FileHeaderAlreadyWritten.into());
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(Details::InvalidMetadataKey(key).into());
        }
        self.user_metadata.insert(key, value.as_ref().to_vec());
        Ok(())
    }

    fn append_marker(&mut self) -> AvroResult<usize> {
        self.writer
            .write_all(&self.marker)
            .map_err(Details::WriteMarker)?;
        Ok(SYNC_SIZE)
    }

    fn maybe_write_header(&mut self) -> AvroResult<usize> {
        if self.has_header {
            return Ok(0);
        }
        let header = Header::new(
            self.schema.clone(),
            self.codec,
            self.marker,
            self.user_metadata.clone(),
        )?;
        let n = header.write(&mut self.writer)?;
        self.has_header = true;
        Ok(n)
    }
}

impl<'a, W: Read + Write + Seek> Writer<'a, W> {
    /// Creates a `Writer` that appends blocks to the file behind `file`.
    ///
    /// The header is read from the start of `file` and checked like in [`Writer::append_to`],
    /// then `file` is moved to its end. An empty `file` gets a new header instead.
    pub fn resume(schema: &'a Schema, codec: Codec, mut file: W) -> AvroResult<Self> {
        let end = file.seek(SeekFrom::End(0)).map_err(Details::SeekSource)?;
        if end == 0 {
            return Writer::with_codec(schema, file, codec);
        }

        file.seek(SeekFrom::Start(0))
            .map_err(Details::SeekSource)?;
        let header = Header::read(&mut file)?;
        file.seek(SeekFrom::End(0)).map_err(Details::SeekSource)?;
        Writer::append_to(schema, file, codec, &header)
    }
}

impl<W: Write> Drop for Writer<'_, W> {
    /// Drop the writer, will try to flush ignoring any errors.
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
