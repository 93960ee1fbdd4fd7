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
    AvroResult, Error,
    error::Details,
    schema::{
        ArraySchema, EnumSchema, FixedSchema, MapSchema, Names, RecordSchema, Schema, SchemaKind,
        resolve_names,
    },
    types::{Value, ValueKind},
    util::{zig_i32, zig_i64},
};
use log::error;
use std::io::Write;

/// Encode a `Value` into avro format.
///
/// **NOTE** This will not perform schema validation. The value is assumed to
/// be valid with regards to the schema. Schema are needed only to guide the
/// encoding for complex type values.
pub fn encode<W: Write + ?Sized>(
    value: &Value,
    schema: &Schema,
    writer: &mut W,
) -> AvroResult<usize> {
    let mut names = Names::new();
    resolve_names(schema, &mut names)?;
    encode_internal(value, schema, &names, writer)
}

/// Encode a value into raw Avro data, also performs schema validation.
///
/// **NOTE** This function has a quite small niche of usage and does NOT generate headers and sync
/// markers; use [`Writer`](crate::Writer) to be fully Avro-compatible if you don't know what
/// you are doing, instead.
pub fn to_avro_datum<T: Into<Value>>(schema: &Schema, value: T) -> AvroResult<Vec<u8>> {
    let mut names = Names::new();
    resolve_names(schema, &mut names)?;

    let value = value.into();
    if let Some(reason) = value.validate_internal(schema, &names) {
        return Err(Details::Validation(reason).into());
    }

    let mut buffer = Vec::new();
    encode_internal(&value, schema, &names, &mut buffer)?;
    Ok(buffer)
}

pub(crate) fn encode_bytes<B: AsRef<[u8]> + ?Sized, W: Write + ?Sized>(
    s: &B,
    writer: &mut W,
) -> AvroResult<usize> {
    let bytes = s.as_ref();
    let len = i64::try_from(bytes.len()).map_err(|e| Details::ConvertUsizeToI64(e, bytes.len()))?;
    let header = encode_long(len, writer)?;
    writer.write_all(bytes).map_err(Details::WriteBytes)?;
    Ok(header + bytes.len())
}

pub(crate) fn encode_long<W: Write + ?Sized>(i: i64, writer: &mut W) -> AvroResult<usize> {
    zig_i64(i, writer)
}

pub(crate) fn encode_int<W: Write + ?Sized>(i: i32, writer: &mut W) -> AvroResult<usize> {
    zig_i32(i, writer)
}

fn write_raw<W: Write + ?Sized>(bytes: &[u8], writer: &mut W) -> AvroResult<usize> {
    writer.write_all(bytes).map_err(Details::WriteBytes)?;
    Ok(bytes.len())
}

pub(crate) fn encode_internal<W: Write + ?Sized>(
    value: &Value,
    schema: &Schema,
    names: &Names,
    writer: &mut W,
) -> AvroResult<usize> {
    if let Schema::Ref { name } = schema {
        let resolved = names
            .get(name)
            .ok_or_else(|| Details::SchemaResolutionError(name.clone()))?;
        return encode_internal(value, resolved, names, writer);
    }

    let mismatch = || -> Error {
        error!("Cannot encode {value:?} with schema {schema:?}");
        Details::EncodeValueAsSchema {
            value: ValueKind::from(value),
            schema: SchemaKind::from(schema),
        }
        .into()
    };

    match (value, schema) {
        (Value::Union(idx, item), Schema::Union(inner)) => {
            let inner_schema = inner.variants().get(*idx as usize).ok_or_else(mismatch)?;
            let written = encode_long(i64::from(*idx), writer)?;
            Ok(written + encode_internal(item, inner_schema, names, writer)?)
        }
        (_, Schema::Union(inner)) => {
            let (idx, inner_schema) = inner.find_variant(value, names).ok_or_else(mismatch)?;
            let written = encode_long(idx as i64, writer)?;
            Ok(written + encode_internal(value, inner_schema, names, writer)?)
        }
        (Value::Null, Schema::Null) => Ok(0),
        (Value::Boolean(b), Schema::Boolean) => write_raw(&[u8::from(*b)], writer),
        (Value::Int(i), Schema::Int | Schema::Long) => encode_int(*i, writer),
        (Value::Long(i), Schema::Long) => encode_long(*i, writer),
        (Value::Float(x), Schema::Float) => write_raw(&x.to_le_bytes(), writer),
        (Value::Double(x), Schema::Double) => write_raw(&x.to_le_bytes(), writer),
        (Value::Bytes(bytes), Schema::Bytes) => encode_bytes(bytes, writer),
        (Value::Bytes(bytes) | Value::Fixed(_, bytes), Schema::Fixed(FixedSchema { size, .. }))
            if bytes.len() == *size =>
        {
            write_raw(bytes, writer)
        }
        (Value::String(s), Schema::String) => encode_bytes(s, writer),
        (Value::String(s), Schema::Enum(EnumSchema { symbols, .. })) => {
            let index = symbols.iter().position(|item| item == s).ok_or_else(mismatch)?;
            encode_int(index as i32, writer)
        }
        (Value::Enum(i, _), Schema::Enum(_)) => encode_int(*i as i32, writer),
        (Value::Array(items), Schema::Array(ArraySchema { items: inner })) => {
            let mut written = 0;
            if !items.is_empty() {
                written += encode_long(items.len() as i64, writer)?;
                for item in items.iter() {
                    written += encode_internal(item, inner, names, writer)?;
                }
            }
            Ok(written + write_raw(&[0u8], writer)?)
        }
        (Value::Map(items), Schema::Map(MapSchema { types })) => {
            let mut written = 0;
            if !items.is_empty() {
                written += encode_long(items.len() as i64, writer)?;
                for (key, value) in items {
                    written += encode_bytes(key, writer)?;
                    written += encode_internal(value, types, names, writer)?;
                }
            }
            Ok(written + write_raw(&[0u8], writer)?)
        }
        (Value::Record(value_fields), Schema::Record(RecordSchema { fields, .. })) => {
            let mut written = 0;
            for schema_field in fields.iter() {
                let name = &schema_field.name;
                let (_, value) = value_fields
                    .iter()
                    .find(|(field_name, _)| field_name == name)
                    .ok_or_else(|| Details::GetField(name.clone()))?;
                written += encode_internal(value, &schema_field.schema, names, writer)?;
            }
            Ok(written)
        }
        _ => Err(mismatch()),
    }
}
