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

//! Logic handling the intermediate representation of Avro values.
use crate::schema::{
    ArraySchema, EnumSchema, FixedSchema, MapSchema, Names, RecordSchema, Schema, UnionSchema,
    resolve_names,
};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use strum_macros::EnumDiscriminants;

/// Represents any valid Avro value
/// More information about Avro values can be found in the
/// [Avro Specification](https://avro.apache.org/docs/current/specification/#schema-declaration)
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Hash, Ord, PartialOrd))]
pub enum Value {
    /// A `null` Avro value.
    Null,
    /// A `boolean` Avro value.
    Boolean(bool),
    /// A `int` Avro value.
    Int(i32),
    /// A `long` Avro value.
    Long(i64),
    /// A `float` Avro value.
    Float(f32),
    /// A `double` Avro value.
    Double(f64),
    /// A `bytes` Avro value.
    Bytes(Vec<u8>),
    /// A `string` Avro value.
    String(String),
    /// A `fixed` Avro value.
    /// The size of the fixed value is represented as a `usize`.
    Fixed(usize, Vec<u8>),
    /// An `enum` Avro value.
    ///
    /// An Enum is represented by a symbol and its position in the symbols list
    /// of its corresponding schema.
    /// This allows schema-less encoding, as well as schema resolution while
    /// reading values.
    Enum(u32, String),
    /// An `union` Avro value.
    ///
    /// A Union is represented by the value it holds and its position in the type list
    /// of its corresponding schema
    Union(u32, Box<Value>),
    /// An `array` Avro value.
    Array(Vec<Value>),
    /// A `map` Avro value.
    Map(HashMap<String, Value>),
    /// A `record` Avro value.
    ///
    /// A Record is represented by a vector of (`<record name>`, `value`).
    /// This allows schema-less encoding.
    ///
    /// See [`Record`] for a more user-friendly support.
    Record(Vec<(String, Value)>),
}

macro_rules! to_value(
    ($type:ty, $variant_constructor:expr) => (
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                $variant_constructor(value)
            }
        }
    );
);

to_value!(bool, Value::Boolean);
to_value!(i32, Value::Int);
to_value!(i64, Value::Long);
to_value!(f32, Value::Float);
to_value!(f64, Value::Double);
to_value!(String, Value::String);
to_value!(Vec<u8>, Value::Bytes);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_owned())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Union(1, Box::new(v.into())),
            None => Self::Union(0, Box::new(Self::Null)),
        }
    }
}

impl<K, V> From<HashMap<K, V>> for Value
where
    K: Into<String>,
    V: Into<Self>,
{
    fn from(value: HashMap<K, V>) -> Self {
        Self::Map(
            value
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Utility interface to build `Value::Record` objects.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    /// List of fields contained in the record.
    /// Ordered according to the fields in the schema given to create this
    /// `Record` object. Any unset field defaults to `Value::Null`.
    pub fields: Vec<(String, Value)>,
    schema_lookup: &'a BTreeMap<String, usize>,
}

impl Record<'_> {
    /// Create a `Record` given a `Schema`.
    ///
    /// If the `Schema` is not a `Schema::Record` variant, `None` will be returned.
    pub fn new(schema: &Schema) -> Option<Record<'_>> {
        match *schema {
            Schema::Record(RecordSchema {
                fields: ref schema_fields,
                lookup: ref schema_lookup,
                ..
            }) => {
                let mut fields = Vec::with_capacity(schema_fields.len());
                for schema_field in schema_fields.iter() {
                    fields.push((schema_field.name.clone(), Value::Null));
                }

                Some(Record {
                    fields,
                    schema_lookup,
                })
            }
            _ => None,
        }
    }

    /// Put a compatible value (implementing the `Into<Value>` trait) in the
    /// `Record` for a given `field` name.
    ///
    /// **NOTE** Only ensure that the field name is present in the `Schema` given when creating
    /// this `Record`. Does not perform any schema validation.
    pub fn put<V>(&mut self, field: &str, value: V)
    where
        V: Into<Value>,
    {
        if let Some(&position) = self.schema_lookup.get(field) {
            self.fields[position].1 = value.into()
        }
    }
}

impl From<Record<'_>> for Value {
    fn from(value: Record<'_>) -> Self {
        Self::Record(value.fields)
    }
}

impl Value {
    /// Validate the value against the given [Schema](../schema/enum.Schema.html).
    ///
    /// See the [Avro specification](https://avro.apache.org/docs/current/specification)
    /// for the full set of rules of schema validation.
    pub fn validate(&self, schema: &Schema) -> bool {
        let mut names = Names::new();
        if let Err(e) = resolve_names(schema, &mut names) {
            debug!("Invalid schema: {e}");
            return false;
        }
        self.validate_with_names(schema, &names)
    }

    pub(crate) fn validate_with_names(&self, schema: &Schema, names: &Names) -> bool {
        match self.validate_internal(schema, names) {
            Some(reason) => {
                debug!("Invalid value: {self:?} for schema: {schema:?}. Reason: {reason}");
                false
            }
            None => true,
        }
    }

    /// Returns the reason the value does not match the schema, if any.
    pub(crate) fn validate_internal(&self, schema: &Schema, names: &Names) -> Option<String> {
        match (self, schema) {
            (_, Schema::Ref { name }) => match names.get(name) {
                Some(resolved) => self.validate_internal(resolved, names),
                None => Some(format!("Unresolved schema reference: '{name}'")),
            },
            (&Value::Null, &Schema::Null) => None,
            (&Value::Boolean(_), &Schema::Boolean) => None,
            (&Value::Int(_), &Schema::Int) => None,
            (&Value::Int(_), &Schema::Long) => None,
            (&Value::Long(_), &Schema::Long) => None,
            (&Value::Float(_), &Schema::Float) => None,
            (&Value::Double(_), &Schema::Double) => None,
            (&Value::Bytes(_), &Schema::Bytes) => None,
            (&Value::String(_), &Schema::String) => None,
            (&Value::Fixed(n, _), &Schema::Fixed(FixedSchema { size, .. })) => {
                if n != size {
                    Some(format!(
                        "The value's size ({n}) is different than the schema's size ({size})"
                    ))
                } else {
                    None
                }
            }
            (Value::Bytes(b), &Schema::Fixed(FixedSchema { size, .. })) => {
                if b.len() != size {
                    Some(format!(
                        "The bytes' length ({}) is different than the schema's size ({size})",
                        b.len()
                    ))
                } else {
                    None
                }
            }
            (Value::String(s), Schema::Enum(EnumSchema { symbols, .. })) => {
                if !symbols.contains(s) {
                    Some(format!("'{s}' is not a member of the possible symbols"))
                } else {
                    None
                }
            }
            (&Value::Enum(i, ref s), Schema::Enum(EnumSchema { symbols, .. })) => symbols
                .get(i as usize)
                .map(|symbol| {
                    if symbol != s {
                        Some(format!("Symbol '{s}' is not at position '{i}'"))
                    } else {
                        None
                    }
                })
                .unwrap_or_else(|| Some(format!("No symbol at position '{i}'"))),
            (&Value::Union(i, ref value), Schema::Union(inner)) => inner
                .variants()
                .get(i as usize)
                .map(|schema| value.validate_internal(schema, names))
                .unwrap_or_else(|| Some(format!("No schema in the union at position '{i}'"))),
            (v, Schema::Union(inner)) => {
                if inner.find_variant(v, names).is_some() {
                    None
                } else {
                    Some("Could not find matching type in union".to_string())
                }
            }
            (Value::Array(items), Schema::Array(ArraySchema { items: inner })) => items
                .iter()
                .find_map(|item| item.validate_internal(inner, names)),
            (Value::Map(items), Schema::Map(MapSchema { types: inner })) => items
                .values()
                .find_map(|value| value.validate_internal(inner, names)),
            (
                Value::Record(record_fields),
                Schema::Record(RecordSchema { fields, lookup, .. }),
            ) => {
                if record_fields.len() != fields.len() {
                    return Some(format!(
                        "The value's records length ({}) is different than the schema's ({})",
                        record_fields.len(),
                        fields.len()
                    ));
                }
                let mut seen = vec![false; fields.len()];
                record_fields.iter().find_map(|(field_name, record_field)| {
                    match lookup.get(field_name) {
                        Some(&idx) if seen[idx] => {
                            Some(format!("Field '{field_name}' is given more than once"))
                        }
                        Some(&idx) => {
                            seen[idx] = true;
                            record_field.validate_internal(&fields[idx].schema, names)
                        }
                        None => Some(format!("There is no schema field for field '{field_name}'")),
                    }
                })
            }
            (v, s) => Some(format!(
                "Unsupported value-schema combination! Value: {v:?}, schema: {s:?}"
            )),
        }
    }
}

impl UnionSchema {
    /// Find the first variant that `value` is valid for, with its position.
    pub(crate) fn find_variant(&self, value: &Value, names: &Names) -> Option<(usize, &Schema)> {
        self.variants()
            .iter()
            .enumerate()
            .find(|(_, schema)| value.validate_internal(schema, names).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    fn event_schema() -> anyhow::Result<Schema> {
        Ok(Schema::parse_str(
            r#"
            {
              "type": "record",
              "name": "Event",
              "fields": [
                {"name": "id", "type": "long"},
                {"name": "subject", "type": ["null", "string"]},
                {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["Created", "Deleted"]}},
                {"name": "etag", "type": {"type": "fixed", "name": "Etag", "size": 4}},
                {"name": "next", "type": ["null", "Event"]}
              ]
            }
            "#,
        )?)
    }

    #[test]
    fn record_helper_follows_schema_order() -> TestResult {
        let schema = event_schema()?;
        let mut record = Record::new(&schema).expect("a record schema");
        record.put("kind", Value::Enum(1, "Deleted".into()));
        record.put("id", 7i64);
        record.put("unknown", 1i32);
        assert_eq!(record.fields[0], ("id".to_string(), Value::Long(7)));
        assert_eq!(record.fields[1], ("subject".to_string(), Value::Null));
        assert_eq!(record.fields[2].1, Value::Enum(1, "Deleted".into()));

        assert!(Record::new(&Schema::Int).is_none());
        Ok(())
    }

    #[test]
    fn validate_records() -> TestResult {
        let schema = event_schema()?;
        let mut record = Record::new(&schema).expect("a record schema");
        record.put("id", 1i64);
        record.put("subject", Some("container/blob"));
        record.put("kind", "Created");
        record.put("etag", Value::Fixed(4, vec![1, 2, 3, 4]));
        record.put("next", ());
        let value: Value = record.into();
        assert!(value.validate(&schema));

        // a wrongly sized fixed field invalidates the whole record
        let Value::Record(mut fields) = value else {
            unreachable!()
        };
        fields[3].1 = Value::Fixed(3, vec![1, 2, 3]);
        assert!(!Value::Record(fields).validate(&schema));
        Ok(())
    }

    #[test]
    fn validate_record_requires_each_field_once() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "Pair", "fields": [
                {"name": "a", "type": "long"},
                {"name": "b", "type": "long"}
            ]}"#,
        )?;
        let record = |names: [&str; 2]| {
            Value::Record(
                names
                    .iter()
                    .map(|name| (name.to_string(), Value::Long(1)))
                    .collect(),
            )
        };
        assert!(record(["a", "b"]).validate(&schema));
        assert!(record(["b", "a"]).validate(&schema));
        assert!(!record(["a", "a"]).validate(&schema));
        assert!(!record(["b", "b"]).validate(&schema));
        assert!(!record(["a", "c"]).validate(&schema));
        Ok(())
    }

    #[test]
    fn validate_unions_and_enums() -> TestResult {
        let union = Schema::parse_str(r#"["null", "long"]"#)?;
        assert!(Value::Null.validate(&union));
        assert!(Value::Long(3).validate(&union));
        assert!(Value::Union(1, Box::new(Value::Long(3))).validate(&union));
        assert!(!Value::Union(2, Box::new(Value::Long(3))).validate(&union));
        assert!(!Value::String("x".into()).validate(&union));

        let kind = Schema::parse_str(r#"{"type": "enum", "name": "Kind", "symbols": ["A", "B"]}"#)?;
        assert!(Value::Enum(1, "B".into()).validate(&kind));
        assert!(!Value::Enum(0, "B".into()).validate(&kind));
        assert!(!Value::Enum(5, "B".into()).validate(&kind));
        Ok(())
    }

    #[test]
    fn validate_collections() {
        let array = Schema::array(Schema::Int);
        assert!(Value::Array(vec![1i32.into(), 2i32.into()]).validate(&array));
        assert!(!Value::Array(vec![Value::Boolean(true)]).validate(&array));

        let map = Schema::map(Schema::String);
        let values: HashMap<&str, &str> = [("a", "b")].into_iter().collect();
        assert!(Value::from(values).validate(&map));
    }

    #[test]
    fn option_converts_to_union() {
        assert_eq!(
            Value::from(Some(5i64)),
            Value::Union(1, Box::new(Value::Long(5)))
        );
        assert_eq!(
            Value::from(None::<i64>),
            Value::Union(0, Box::new(Value::Null))
        );
    }
}
