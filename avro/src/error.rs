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
    schema::{Name, SchemaKind},
    types::ValueKind,
};
use std::{error::Error as _, fmt, io};

/// Errors encountered while reading or writing container files.
///
/// To inspect the details of the error use [`details`](Self::details) or [`into_details`](Self::into_details)
/// to get a [`Details`] which contains more precise error information.
///
/// Every error is fatal for the [`Reader`](crate::Reader) or [`Writer`](crate::Writer) that
/// produced it. The instance must be discarded, nothing is retried internally.
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }

    /// Whether this error was caused by the byte source ending early.
    pub(crate) fn is_unexpected_eof(&self) -> bool {
        let io_err = match self.details() {
            Details::ReadVariableIntegerBytes(e)
            | Details::ReadBoolean(e)
            | Details::ReadBytes(e)
            | Details::ReadString(e)
            | Details::ReadFloat(e)
            | Details::ReadDouble(e)
            | Details::ReadFixed(e, _)
            | Details::Truncated(e) => e,
            _ => return false,
        };
        io_err.kind() == io::ErrorKind::UnexpectedEof
    }

    /// Turn an end-of-stream failure into [`Details::Truncated`], leave anything else untouched.
    pub(crate) fn into_truncated(self) -> Self {
        if !self.is_unexpected_eof() || matches!(self.details(), Details::Truncated(_)) {
            return self;
        }
        match self.into_details() {
            Details::ReadVariableIntegerBytes(e)
            | Details::ReadBoolean(e)
            | Details::ReadBytes(e)
            | Details::ReadString(e)
            | Details::ReadFloat(e)
            | Details::ReadDouble(e)
            | Details::ReadFixed(e, _) => Details::Truncated(e).into(),
            other => other.into(),
        }
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

#[derive(thiserror::Error)]
pub enum Details {
    #[error("wrong magic in header: {0:?}")]
    BadMagic([u8; 4]),

    #[error("Failed to get JSON from avro.schema key in map")]
    MissingSchema,

    #[error("Codec '{0}' is not supported")]
    UnknownCodec(String),

    #[error("Stream ended in the middle of a block: {0}")]
    Truncated(#[source] io::Error),

    #[error("Failed to decompress with flate: {0}")]
    DecompressionFailed(#[source] io::Error),

    #[error("Failed to decode object {index} of the current block: {source}")]
    DatumDecodeFailed {
        index: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to read header: {0}")]
    ReadHeader(#[source] io::Error),

    #[error("Duplicate key in header metadata: {0}")]
    DuplicateMetadataKey(String),

    #[error("Failed to read marker bytes: {0}")]
    ReadMarker(#[source] io::Error),

    #[error("Failed to read block marker bytes: {0}")]
    ReadBlockMarker(#[source] io::Error),

    #[error("Failed to seek in the byte source: {0}")]
    SeekSource(#[source] io::Error),

    #[error("Negative object count in block header: {0}")]
    NegativeBlockCount(i64),

    #[error("Overflow when decoding integer value")]
    IntegerOverflow,

    #[error("Failed to read bytes for decoding variable length integer: {0}")]
    ReadVariableIntegerBytes(#[source] io::Error),

    #[error("Decoded integer out of range for i32: {1}: {0}")]
    ZagI32(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert i64 to usize: {1}")]
    ConvertI64ToUsize(#[source] std::num::TryFromIntError, i64),

    #[error("Cannot convert usize to i64: {1}")]
    ConvertUsizeToI64(#[source] std::num::TryFromIntError, usize),

    #[error("Unable to allocate {desired} bytes (maximum allowed: {maximum})")]
    MemoryAllocation { desired: usize, maximum: usize },

    #[error("Invalid u8 for bool: {0}")]
    BoolValue(u8),

    #[error("Failed to read boolean bytes: {0}")]
    ReadBoolean(#[source] io::Error),

    #[error("Failed to read bytes: {0}")]
    ReadBytes(#[source] io::Error),

    #[error("Failed to read string: {0}")]
    ReadString(#[source] io::Error),

    #[error("Failed to read double: {0}")]
    ReadDouble(#[source] io::Error),

    #[error("Failed to read float: {0}")]
    ReadFloat(#[source] io::Error),

    #[error("Failed to read fixed number of bytes '{1}': {0}")]
    ReadFixed(#[source] io::Error, usize),

    #[error("Invalid utf-8 string")]
    ConvertToUtf8(#[source] std::string::FromUtf8Error),

    #[error("Union index {index} out of bounds: {num_variants}")]
    GetUnionVariant { index: i64, num_variants: usize },

    #[error("Enum symbol index out of bounds: {num_variants}")]
    GetEnumSymbol { index: i64, num_variants: usize },

    #[error("Unresolved schema reference: {0}")]
    SchemaResolutionError(Name),

    #[error("Failed to parse schema from JSON")]
    ParseSchemaJson(#[source] serde_json::Error),

    #[error("Must be a JSON string, object or array")]
    ParseSchemaFromValidJson,

    #[error("Unknown primitive type: {0}")]
    ParsePrimitive(String),

    #[error("Unknown complex type: {0}")]
    GetComplexType(serde_json::Value),

    #[error("No `type` in complex type")]
    GetComplexTypeField,

    #[error("No `name` field")]
    GetNameField,

    #[error("No `fields` in record")]
    GetRecordFieldsJson,

    #[error("No `name` in record field")]
    GetNameFieldFromRecord,

    #[error("Duplicate field name {0}")]
    FieldNameDuplicate(String),

    #[error("No `symbols` field in enum")]
    GetEnumSymbolsField,

    #[error("Unable to parse `symbols` in enum")]
    GetEnumSymbols,

    #[error("Duplicate enum symbol {0}")]
    EnumSymbolDuplicate(String),

    #[error("No `items` in array")]
    GetArrayItemsField,

    #[error("No `values` in map")]
    GetMapValuesField,

    #[error("Fixed schema has no `size`")]
    GetFixedSizeField,

    #[error("Fixed schema `size` value must be a positive integer: {0}")]
    GetFixedSizeFieldPositive(serde_json::Value),

    #[error("Unions may not directly contain a union")]
    GetNestedUnion,

    #[error("Unions cannot contain duplicate types: {0:?}")]
    GetUnionDuplicate(SchemaKind),

    #[error("Two schemas with the same fullname were given: {0}")]
    NameCollision(String),

    #[error("Invalid schema name {0}. It must match the regex '{1}'")]
    InvalidSchemaName(String, &'static str),

    #[error("Invalid namespace {0}. It must match the regex '{1}'")]
    InvalidNamespace(String, &'static str),

    #[error("Invalid field name {0}")]
    FieldName(String),

    #[error("Invalid enum symbol name {0}")]
    EnumSymbolName(String),

    #[error("Value does not match schema: {0}")]
    Validation(String),

    #[error("Missing field in record: {0:?}")]
    GetField(String),

    #[error("Cannot encode a {value:?} value as a {schema:?} schema")]
    EncodeValueAsSchema {
        value: ValueKind,
        schema: SchemaKind,
    },

    #[error("Failed to convert schema to JSON: {0}")]
    ConvertJsonToString(#[source] serde_json::Error),

    #[error("Failed to write buffer bytes during flush: {0}")]
    WriteBytes(#[source] io::Error),

    #[error("Failed to flush inner writer during flush: {0}")]
    FlushWriter(#[source] io::Error),

    #[error("Failed to write marker: {0}")]
    WriteMarker(#[source] io::Error),

    #[error("The file metadata is already flushed.")]
    FileHeaderAlreadyWritten,

    #[error("Metadata keys starting with 'avro.' are reserved for internal usage: {0}.")]
    InvalidMetadataKey(String),

    #[error("Cannot append: the existing file was written with a different schema")]
    AppendSchemaMismatch,

    #[error("Cannot append: the existing file uses codec '{existing}', not '{requested}'")]
    AppendCodecMismatch {
        existing: &'static str,
        requested: &'static str,
    },
}

impl fmt::Debug for Details {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut msg = self.to_string();
        if let Some(e) = self.source() {
            msg.extend([": ", &e.to_string()]);
        }
        write!(f, "{msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn eof_errors_become_truncated() {
        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        let err: Error = Details::ReadString(eof).into();
        assert!(err.is_unexpected_eof());
        assert!(matches!(err.into_truncated().details(), Details::Truncated(_)));
    }

    #[test]
    fn other_errors_are_left_alone() {
        let broken = io::Error::from(io::ErrorKind::BrokenPipe);
        let err: Error = Details::ReadBytes(broken).into();
        assert!(!err.is_unexpected_eof());
        assert!(matches!(err.into_truncated().details(), Details::ReadBytes(_)));

        let err: Error = Details::BoolValue(7).into();
        assert!(matches!(err.into_truncated().details(), Details::BoolValue(7)));
    }

    #[test]
    fn debug_includes_the_source() {
        let err: Error = Details::ReadHeader(io::Error::other("boom")).into();
        assert_eq!(format!("{err:?}"), "Error { details: Failed to read header: boom: boom }");
    }
}
