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

//! Decoding of Avro binary data guided by a [`Schema`].

use crate::{
    AvroResult,
    error::Details,
    schema::{
        ArraySchema, EnumSchema, FixedSchema, MapSchema, Names, RecordSchema, Schema,
        UnionSchema, resolve_names,
    },
    types::Value,
    util::{safe_len, skip_long, zag_i32, zag_i64},
};
use std::{collections::HashMap, io::Read};

/// The primitive reads the container format is built from.
///
/// Implemented for every [`Read`], so any byte source can be used directly.
pub trait Decoder: Read {
    /// Read a zig-zag encoded variable length long.
    fn read_long(&mut self) -> AvroResult<i64> {
        zag_i64(self)
    }

    /// Consume a zig-zag encoded long without decoding it.
    fn skip_long(&mut self) -> AvroResult<()> {
        skip_long(self)
    }

    /// Read a long length prefix followed by that many bytes.
    fn read_bytes(&mut self) -> AvroResult<Vec<u8>> {
        let len = decode_len(self)?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf).map_err(Details::ReadBytes)?;
        Ok(buf)
    }

    /// Read exactly `n` bytes.
    fn read_fixed(&mut self, n: usize) -> AvroResult<Vec<u8>> {
        let mut buf = vec![0u8; safe_len(n)?];
        self.read_exact(&mut buf)
            .map_err(|e| Details::ReadFixed(e, n))?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> Decoder for R {}

#[inline]
fn decode_len<R: Read + ?Sized>(reader: &mut R) -> AvroResult<usize> {
    let len = zag_i64(reader)?;
    safe_len(usize::try_from(len).map_err(|e| Details::ConvertI64ToUsize(e, len))?)
}

/// Decode the length of a sequence.
///
/// Maps and arrays are 0-terminated, 0i64 is also encoded as 0 in Avro reading a length of 0
/// means the end of the map or array.
fn decode_seq_len<R: Read + ?Sized>(reader: &mut R) -> AvroResult<usize> {
    let raw_len = zag_i64(reader)?;
    let len = if raw_len < 0 {
        // a negative count is followed by the size of the block in bytes
        skip_long(reader)?;
        raw_len.checked_neg().ok_or(Details::IntegerOverflow)?
    } else {
        raw_len
    };
    safe_len(usize::try_from(len).map_err(|e| Details::ConvertI64ToUsize(e, len))?)
}

/// Decode a `Value` from avro format given its `Schema`.
pub fn decode<R: Read + ?Sized>(schema: &Schema, reader: &mut R) -> AvroResult<Value> {
    let mut names = Names::new();
    resolve_names(schema, &mut names)?;
    decode_internal(schema, &names, reader)
}

/// Decode a single datum written with `schema`, typically one produced by
/// [`to_avro_datum`](crate::to_avro_datum).
pub fn from_avro_datum<R: Read + ?Sized>(schema: &Schema, reader: &mut R) -> AvroResult<Value> {
    decode(schema, reader)
}

pub(crate) fn decode_internal<R: Read + ?Sized>(
    schema: &Schema,
    names: &Names,
    reader: &mut R,
) -> AvroResult<Value> {
    match schema {
        Schema::Null => Ok(Value::Null),
        Schema::Boolean => {
            let mut buf = [0u8; 1];
            match reader.read_exact(&mut buf[..]) {
                Ok(_) => match buf[0] {
                    0u8 => Ok(Value::Boolean(false)),
                    1u8 => Ok(Value::Boolean(true)),
                    _ => Err(Details::BoolValue(buf[0]).into()),
                },
                Err(io_err) => Err(Details::ReadBoolean(io_err).into()),
            }
        }
        Schema::Int => zag_i32(reader).map(Value::Int),
        Schema::Long => zag_i64(reader).map(Value::Long),
        Schema::Float => {
            let mut buf = [0u8; std::mem::size_of::<f32>()];
            reader
                .read_exact(&mut buf[..])
                .map_err(Details::ReadFloat)?;
            Ok(Value::Float(f32::from_le_bytes(buf)))
        }
        Schema::Double => {
            let mut buf = [0u8; std::mem::size_of::<f64>()];
            reader
                .read_exact(&mut buf[..])
                .map_err(Details::ReadDouble)?;
            Ok(Value::Double(f64::from_le_bytes(buf)))
        }
        Schema::Bytes => reader.read_bytes().map(Value::Bytes),
        Schema::String => decode_string(reader).map(Value::String),
        Schema::Fixed(FixedSchema { size, .. }) => {
            let buf = reader.read_fixed(*size)?;
            Ok(Value::Fixed(*size, buf))
        }
        Schema::Array(ArraySchema { items }) => {
            let mut values = Vec::new();

            loop {
                let len = decode_seq_len(reader)?;
                if len == 0 {
                    break;
                }

                values.reserve(len);
                for _ in 0..len {
                    values.push(decode_internal(items, names, reader)?);
                }
            }

            Ok(Value::Array(values))
        }
        Schema::Map(MapSchema { types }) => {
            let mut items = HashMap::new();

            loop {
                let len = decode_seq_len(reader)?;
                if len == 0 {
                    break;
                }

                items.reserve(len);
                for _ in 0..len {
                    let key = decode_string(reader)?;
                    let value = decode_internal(types, names, reader)?;
                    items.insert(key, value);
                }
            }

            Ok(Value::Map(items))
        }
        Schema::Union(inner) => decode_union(inner, names, reader),
        Schema::Record(RecordSchema { fields, .. }) => {
            let mut items = Vec::with_capacity(fields.len());
            for field in fields {
                items.push((
                    field.name.clone(),
                    decode_internal(&field.schema, names, reader)?,
                ));
            }
            Ok(Value::Record(items))
        }
        Schema::Enum(EnumSchema { symbols, .. }) => {
            let index = zag_i64(reader)?;
            let symbol = usize::try_from(index)
                .ok()
                .and_then(|i| symbols.get(i))
                .ok_or(Details::GetEnumSymbol {
                    index,
                    num_variants: symbols.len(),
                })?;
            Ok(Value::Enum(index as u32, symbol.clone()))
        }
        Schema::Ref { name } => {
            let resolved = names
                .get(name)
                .ok_or_else(|| Details::SchemaResolutionError(name.clone()))?;
            decode_internal(resolved, names, reader)
        }
    }
}

fn decode_string<R: Read + ?Sized>(reader: &mut R) -> AvroResult<String> {
    let len = decode_len(reader)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(Details::ReadString)?;
    Ok(String::from_utf8(buf).map_err(Details::ConvertToUtf8)?)
}

fn decode_union<R: Read + ?Sized>(
    inner: &UnionSchema,
    names: &Names,
    reader: &mut R,
) -> AvroResult<Value> {
    let index = zag_i64(reader)?;
    let variants = inner.variants();
    let variant = usize::try_from(index)
        .ok()
        .and_then(|i| variants.get(i))
        .ok_or(Details::GetUnionVariant {
            index,
            num_variants: variants.len(),
        })?;
    let value = decode_internal(variant, names, reader)?;
    Ok(Value::Union(index as u32, Box::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode::encode, error::Error};
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn test_decode_array_without_size() -> TestResult {
        let mut input: &[u8] = &[6, 2, 4, 6, 0];
        let result = decode(&Schema::array(Schema::Int), &mut input)?;
        assert_eq!(
            Value::Array(vec!(Value::Int(1), Value::Int(2), Value::Int(3))),
            result
        );
        Ok(())
    }

    #[test]
    fn test_decode_array_with_size() -> TestResult {
        let mut input: &[u8] = &[5, 6, 2, 4, 6, 0];
        let result = decode(&Schema::array(Schema::Int), &mut input)?;
        assert_eq!(
            Value::Array(vec!(Value::Int(1), Value::Int(2), Value::Int(3))),
            result
        );
        Ok(())
    }

    #[test]
    fn test_decode_map_without_size() -> TestResult {
        let mut input: &[u8] = &[0x02, 0x08, 0x74, 0x65, 0x73, 0x74, 0x02, 0x00];
        let result = decode(&Schema::map(Schema::Int), &mut input)?;
        let mut expected = HashMap::new();
        expected.insert(String::from("test"), Value::Int(1));
        assert_eq!(Value::Map(expected), result);
        Ok(())
    }

    #[test]
    fn test_negative_decode_len() {
        let mut input: &[u8] = &[1, 0x61];
        let err = decode(&Schema::Bytes, &mut input).map_err(Error::into_details);
        assert!(matches!(err, Err(Details::ConvertI64ToUsize(_, -1))));
    }

    #[test]
    fn test_oversized_length_is_rejected_before_allocating() {
        let mut input = Vec::new();
        crate::util::zig_i64(i64::MAX, &mut input).unwrap();
        let err = decode(&Schema::String, &mut input.as_slice()).map_err(Error::into_details);
        assert!(matches!(err, Err(Details::MemoryAllocation { .. })));
    }

    #[test]
    fn test_union_index_out_of_bounds() -> TestResult {
        let schema = Schema::parse_str(r#"["null", "int"]"#)?;
        let mut input: &[u8] = &[4];
        let err = decode(&schema, &mut input).map_err(Error::into_details);
        assert!(matches!(
            err,
            Err(Details::GetUnionVariant {
                index: 2,
                num_variants: 2
            })
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_bool() {
        let mut input: &[u8] = &[2];
        let err = decode(&Schema::Boolean, &mut input).map_err(Error::into_details);
        assert!(matches!(err, Err(Details::BoolValue(2))));
    }

    #[test]
    fn test_eof_is_reported_by_the_failing_read() {
        let mut input: &[u8] = &[0x08, b'a'];
        let err = decode(&Schema::String, &mut input).unwrap_err();
        assert!(err.is_unexpected_eof());
    }

    #[test]
    fn test_recursive_record_round_trip() -> TestResult {
        let schema = Schema::parse_str(
            r#"
            {
              "type": "record",
              "name": "Node",
              "fields": [
                {"name": "label", "type": "string"},
                {"name": "next", "type": ["null", "Node"]}
              ]
            }
            "#,
        )?;
        let value = Value::Record(vec![
            ("label".into(), "a".into()),
            (
                "next".into(),
                Value::Union(
                    1,
                    Box::new(Value::Record(vec![
                        ("label".into(), "b".into()),
                        ("next".into(), Value::Union(0, Box::new(Value::Null))),
                    ])),
                ),
            ),
        ]);

        let mut buf = Vec::new();
        encode(&value, &schema, &mut buf)?;
        assert_eq!(decode(&schema, &mut buf.as_slice())?, value);
        Ok(())
    }

    #[test]
    fn test_decoder_reads() -> TestResult {
        let mut input: &[u8] = &[0x04, 0xAA, 0xBB, 0x7F, 0x01, 0x02, 0x03];
        assert_eq!(input.read_bytes()?, vec![0xAA, 0xBB]);
        input.skip_long()?;
        assert_eq!(input.read_long()?, -1);
        assert_eq!(input.read_fixed(2)?, vec![0x02, 0x03]);

        let err = input.read_fixed(1).map_err(Error::into_details);
        assert!(matches!(err, Err(Details::ReadFixed(_, 1))));
        Ok(())
    }
}
