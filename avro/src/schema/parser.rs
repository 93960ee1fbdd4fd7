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

//! Turns the JSON of a writer schema into a [`Schema`].

use crate::{
    AvroResult,
    error::Details,
    schema::{
        ArraySchema, EnumSchema, FixedSchema, MapSchema, Name, NamespaceRef, RecordField,
        RecordSchema, Schema, UnionSchema,
    },
    validator::{validate_enum_symbol_name, validate_record_field_name},
};
use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// String attributes of a JSON schema object.
trait Attributes {
    fn text(&self, key: &str) -> Option<String>;
}

impl Attributes for Map<String, Value> {
    fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }
}

#[derive(Default)]
pub(crate) struct Parser {
    /// Named types declared so far. A type is declared before its body is parsed so that a
    /// record can refer to itself.
    declared: HashSet<Name>,
}

impl Parser {
    pub(super) fn parse_str(&mut self, input: &str) -> AvroResult<Schema> {
        let json = serde_json::from_str(input).map_err(Details::ParseSchemaJson)?;
        self.parse(&json, None)
    }

    /// Parses any JSON form of a schema: a type name, an object or a union array.
    pub(super) fn parse(&mut self, json: &Value, namespace: NamespaceRef) -> AvroResult<Schema> {
        match json {
            Value::String(type_name) => self.parse_type_name(type_name, namespace),
            Value::Object(object) => self.parse_object(object, namespace),
            Value::Array(variants) => self.parse_union(variants, namespace),
            _ => Err(Details::ParseSchemaFromValidJson.into()),
        }
    }

    /// A primitive type, or a reference to a named type declared earlier.
    fn parse_type_name(&mut self, type_name: &str, namespace: NamespaceRef) -> AvroResult<Schema> {
        Ok(match type_name {
            "null" => Schema::Null,
            "boolean" => Schema::Boolean,
            "int" => Schema::Int,
            "long" => Schema::Long,
            "float" => Schema::Float,
            "double" => Schema::Double,
            "bytes" => Schema::Bytes,
            "string" => Schema::String,
            _ => {
                let name = Name::qualified(type_name, namespace)
                    .map_err(|_| Details::ParsePrimitive(type_name.to_string()))?;
                if !self.declared.contains(&name) {
                    return Err(Details::ParsePrimitive(name.to_string()).into());
                }
                Schema::Ref { name }
            }
        })
    }

    /// Dispatches on the `type` attribute. Other attributes, `logicalType` included, are
    /// ignored.
    fn parse_object(
        &mut self,
        object: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match object.get("type") {
            Some(Value::String(t)) => match t.as_str() {
                "record" | "error" => self.parse_record(object, namespace),
                "enum" => self.parse_enum(object, namespace),
                "array" => self.parse_array(object, namespace),
                "map" => self.parse_map(object, namespace),
                "fixed" => self.parse_fixed(object, namespace),
                other => self.parse_type_name(other, namespace),
            },
            Some(Value::Object(inner)) => self.parse_object(inner, namespace),
            Some(Value::Array(variants)) => self.parse_union(variants, namespace),
            Some(unknown) => Err(Details::GetComplexType(unknown.clone()).into()),
            None => Err(Details::GetComplexTypeField.into()),
        }
    }

    /// Reads the `name` and `namespace` attributes and declares the type.
    fn declare(&mut self, object: &Map<String, Value>, namespace: NamespaceRef) -> AvroResult<Name> {
        let simple = object.text("name").ok_or(Details::GetNameField)?;
        let own_namespace = object.text("namespace");
        let name = Name::qualified(&simple, own_namespace.as_deref().or(namespace))?;
        if !self.declared.insert(name.clone()) {
            return Err(Details::NameCollision(name.to_string()).into());
        }
        Ok(name)
    }

    fn parse_record(
        &mut self,
        object: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let name = self.declare(object, namespace)?;
        debug!("Parsing record {name}");

        let fields = object
            .get("fields")
            .and_then(Value::as_array)
            .ok_or(Details::GetRecordFieldsJson)?
            .iter()
            .filter_map(Value::as_object)
            .map(|field| self.parse_field(field, name.namespace()))
            .collect::<AvroResult<Vec<_>>>()?;

        let mut lookup = BTreeMap::new();
        for (position, field) in fields.iter().enumerate() {
            if lookup.insert(field.name.clone(), position).is_some() {
                return Err(Details::FieldNameDuplicate(field.name.clone()).into());
            }
        }

        Ok(Schema::Record(RecordSchema {
            name,
            doc: object.text("doc"),
            fields,
            lookup,
        }))
    }

    /// Field types resolve names in the namespace of the enclosing record.
    fn parse_field(
        &mut self,
        field: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<RecordField> {
        let name = field.text("name").ok_or(Details::GetNameFieldFromRecord)?;
        validate_record_field_name(&name)?;
        let ty = field.get("type").ok_or(Details::GetComplexTypeField)?;

        Ok(RecordField {
            schema: self.parse(ty, namespace)?,
            doc: field.text("doc"),
            default: field.get("default").cloned(),
            name,
        })
    }

    fn parse_enum(
        &mut self,
        object: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let symbols: Vec<String> = object
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or(Details::GetEnumSymbolsField)?
            .iter()
            .map(|symbol| symbol.as_str().map(str::to_string))
            .collect::<Option<_>>()
            .ok_or(Details::GetEnumSymbols)?;

        let mut unique = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            validate_enum_symbol_name(symbol)?;
            if !unique.insert(symbol) {
                return Err(Details::EnumSymbolDuplicate(symbol.clone()).into());
            }
        }

        Ok(Schema::Enum(EnumSchema {
            name: self.declare(object, namespace)?,
            doc: object.text("doc"),
            symbols,
        }))
    }

    fn parse_array(
        &mut self,
        object: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let items = object.get("items").ok_or(Details::GetArrayItemsField)?;
        Ok(Schema::array(self.parse(items, namespace)?))
    }

    fn parse_map(
        &mut self,
        object: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let values = object.get("values").ok_or(Details::GetMapValuesField)?;
        Ok(Schema::map(self.parse(values, namespace)?))
    }

    fn parse_union(&mut self, variants: &[Value], namespace: NamespaceRef) -> AvroResult<Schema> {
        let variants = variants
            .iter()
            .map(|variant| self.parse(variant, namespace))
            .collect::<AvroResult<Vec<_>>>()?;
        match variants.len() {
            0 => error!("Empty union in the writer schema"),
            1 => warn!("Union with a single variant in the writer schema"),
            _ => {}
        }
        Ok(Schema::Union(UnionSchema::new(variants)?))
    }

    fn parse_fixed(
        &mut self,
        object: &Map<String, Value>,
        namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let raw_size = object.get("size").ok_or(Details::GetFixedSizeField)?;
        let size = raw_size
            .as_u64()
            .and_then(|size| usize::try_from(size).ok())
            .ok_or_else(|| Details::GetFixedSizeFieldPositive(raw_size.clone()))?;

        Ok(Schema::Fixed(FixedSchema {
            name: self.declare(object, namespace)?,
            doc: object.text("doc"),
            size,
        }))
    }
}
