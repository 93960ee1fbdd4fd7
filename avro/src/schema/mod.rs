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

//! The writer schema embedded in a container header.
//!
//! Only what is needed to decode and encode the objects of a container file is modelled here:
//! the primitive and complex Avro types plus references to named types. Logical type annotations
//! are accepted and ignored, the underlying type is used instead.

mod name;
mod parser;

pub use name::{Name, Names, NamespaceRef};

use crate::{AvroResult, error::Details};
use parser::Parser;
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};
use std::collections::BTreeMap;
use strum_macros::EnumDiscriminants;

/// Represents any valid Avro schema
/// More information about Avro schemas can be found in the
/// [Avro Specification](https://avro.apache.org/docs/current/specification/#schema-declaration)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(SchemaKind), derive(Hash, Ord, PartialOrd))]
pub enum Schema {
    /// A `null` Avro schema.
    Null,
    /// A `boolean` Avro schema.
    Boolean,
    /// An `int` Avro schema.
    Int,
    /// A `long` Avro schema.
    Long,
    /// A `float` Avro schema.
    Float,
    /// A `double` Avro schema.
    Double,
    /// A `bytes` Avro schema.
    Bytes,
    /// A `string` Avro schema.
    String,
    /// An `array` Avro schema.
    ///
    /// All items will have the same schema.
    Array(ArraySchema),
    /// A `map` Avro schema.
    ///
    /// Keys are always a `Schema::String` and all values will have the same schema.
    Map(MapSchema),
    /// A `union` Avro schema.
    Union(UnionSchema),
    /// A `record` Avro schema.
    Record(RecordSchema),
    /// An `enum` Avro schema.
    Enum(EnumSchema),
    /// A `fixed` Avro schema.
    Fixed(FixedSchema),
    /// A reference to another named schema, by its fullname.
    Ref { name: Name },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArraySchema {
    pub items: Box<Schema>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapSchema {
    pub types: Box<Schema>,
}

/// A description of a Union schema
#[derive(Clone, Debug, PartialEq)]
pub struct UnionSchema {
    schemas: Vec<Schema>,
}

impl UnionSchema {
    /// Creates a new UnionSchema from a vector of schemas.
    ///
    /// Unions may not directly contain another union, and may contain at most one unnamed
    /// schema of each kind.
    pub fn new(schemas: Vec<Schema>) -> AvroResult<Self> {
        let mut seen = Vec::new();
        for schema in &schemas {
            let kind = SchemaKind::from(schema);
            match kind {
                SchemaKind::Union => return Err(Details::GetNestedUnion.into()),
                SchemaKind::Record | SchemaKind::Enum | SchemaKind::Fixed | SchemaKind::Ref => {}
                _ if seen.contains(&kind) => return Err(Details::GetUnionDuplicate(kind).into()),
                _ => seen.push(kind),
            }
        }
        Ok(UnionSchema { schemas })
    }

    /// Returns a slice to all variants of this schema.
    pub fn variants(&self) -> &[Schema] {
        &self.schemas
    }
}

/// A description of a Record schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordSchema {
    pub name: Name,
    pub doc: Option<String>,
    pub fields: Vec<RecordField>,
    /// The position of each field, by name.
    pub lookup: BTreeMap<String, usize>,
}

/// Represents a `field` in a `record` Avro schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub doc: Option<String>,
    /// Default value of the field, kept as JSON.
    pub default: Option<serde_json::Value>,
    pub schema: Schema,
}

/// A description of an Enum schema.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumSchema {
    pub name: Name,
    pub doc: Option<String>,
    pub symbols: Vec<String>,
}

/// A description of a Fixed schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedSchema {
    pub name: Name,
    pub doc: Option<String>,
    pub size: usize,
}

impl Schema {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub fn parse_str(input: &str) -> AvroResult<Schema> {
        Parser::default().parse_str(input)
    }

    /// Create a `Schema` from a `serde_json::Value` representing a JSON Avro schema.
    pub fn parse(value: &serde_json::Value) -> AvroResult<Schema> {
        Parser::default().parse(value, None)
    }

    /// Returns a `Schema::Array` with the given items.
    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            items: Box::new(items),
        })
    }

    /// Returns a `Schema::Map` with the given values.
    pub fn map(types: Schema) -> Self {
        Schema::Map(MapSchema {
            types: Box::new(types),
        })
    }

    /// The name of this schema, if it is a named schema.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. })
            | Schema::Ref { name } => Some(name),
            _ => None,
        }
    }
}

/// Collect every named schema defined in `schema` so that [`Schema::Ref`]s can be resolved.
pub fn resolve_names(schema: &Schema, names: &mut Names) -> AvroResult<()> {
    match schema {
        Schema::Array(ArraySchema { items, .. }) => resolve_names(items, names),
        Schema::Map(MapSchema { types, .. }) => resolve_names(types, names),
        Schema::Union(union) => {
            for variant in union.variants() {
                resolve_names(variant, names)?;
            }
            Ok(())
        }
        Schema::Enum(EnumSchema { name, .. }) | Schema::Fixed(FixedSchema { name, .. }) => {
            if names.insert(name.clone(), schema.clone()).is_some() {
                return Err(Details::NameCollision(name.to_string()).into());
            }
            Ok(())
        }
        Schema::Record(RecordSchema { name, fields, .. }) => {
            if names.insert(name.clone(), schema.clone()).is_some() {
                return Err(Details::NameCollision(name.to_string()).into());
            }
            for field in fields {
                resolve_names(&field.schema, names)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Schema::Ref { name } => serializer.serialize_str(name.fullname()),
            Schema::Null => serializer.serialize_str("null"),
            Schema::Boolean => serializer.serialize_str("boolean"),
            Schema::Int => serializer.serialize_str("int"),
            Schema::Long => serializer.serialize_str("long"),
            Schema::Float => serializer.serialize_str("float"),
            Schema::Double => serializer.serialize_str("double"),
            Schema::Bytes => serializer.serialize_str("bytes"),
            Schema::String => serializer.serialize_str("string"),
            Schema::Array(ArraySchema { items }) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", items)?;
                map.end()
            }
            Schema::Map(MapSchema { types }) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "map")?;
                map.serialize_entry("values", types)?;
                map.end()
            }
            Schema::Union(inner) => {
                let variants = inner.variants();
                let mut seq = serializer.serialize_seq(Some(variants.len()))?;
                for v in variants {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Schema::Record(RecordSchema {
                name, doc, fields, ..
            }) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "record")?;
                serialize_name(&mut map, name, doc)?;
                map.serialize_entry("fields", fields)?;
                map.end()
            }
            Schema::Enum(EnumSchema { name, doc, symbols }) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "enum")?;
                serialize_name(&mut map, name, doc)?;
                map.serialize_entry("symbols", symbols)?;
                map.end()
            }
            Schema::Fixed(FixedSchema { name, doc, size }) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "fixed")?;
                serialize_name(&mut map, name, doc)?;
                map.serialize_entry("size", size)?;
                map.end()
            }
        }
    }
}

fn serialize_name<M: SerializeMap>(
    map: &mut M,
    name: &Name,
    doc: &Option<String>,
) -> Result<(), M::Error> {
    if let Some(namespace) = name.namespace() {
        map.serialize_entry("namespace", namespace)?;
    }
    map.serialize_entry("name", name.simple_name())?;
    if let Some(docstr) = doc {
        map.serialize_entry("doc", docstr)?;
    }
    Ok(())
}

impl Serialize for RecordField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("type", &self.schema)?;
        if let Some(ref default) = self.default {
            map.serialize_entry("default", default)?;
        }
        if let Some(ref doc) = self.doc {
            map.serialize_entry("doc", doc)?;
        }
        map.end()
    }
}
