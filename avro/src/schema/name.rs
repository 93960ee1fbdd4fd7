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

use std::{
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{
    AvroResult, Error, Schema,
    validator::{validate_namespace, validate_schema_name},
};

/// The fullname of a `record`, `enum` or `fixed` type declared in a writer schema.
///
/// A fullname is a simple name, optionally preceded by a dotted namespace. Named types are
/// registered in [`Names`] under their fullname so that later occurrences can refer to them
/// through [`Schema::Ref`].
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct Name {
    fullname: String,
    /// Offset of the simple name in `fullname`, 0 when there is no namespace.
    simple_start: usize,
}

/// Named types of a schema by their fullname.
pub type Names = HashMap<Name, Schema>;
/// The namespace a nested named type inherits, if any.
pub type NamespaceRef<'a> = Option<&'a str>;

impl Name {
    /// Parses `name`, which may already carry a namespace.
    pub fn new(name: &str) -> AvroResult<Self> {
        Self::qualified(name, None)
    }

    /// Parses `name` and places it in `namespace`, unless `name` carries its own.
    ///
    /// A leading dot (`.Event`) puts the type in the null namespace.
    pub fn qualified(name: &str, namespace: NamespaceRef) -> AvroResult<Self> {
        let simple_start = validate_schema_name(name)?;
        match (simple_start, namespace) {
            (1, _) => Ok(Self {
                fullname: name[1..].to_string(),
                simple_start: 0,
            }),
            (0, Some(namespace)) if !namespace.is_empty() => {
                validate_namespace(namespace)?;
                Ok(Self {
                    fullname: format!("{namespace}.{name}"),
                    simple_start: namespace.len() + 1,
                })
            }
            _ => Ok(Self {
                fullname: name.to_string(),
                simple_start,
            }),
        }
    }

    /// The name without its namespace.
    pub fn simple_name(&self) -> &str {
        &self.fullname[self.simple_start..]
    }

    pub fn namespace(&self) -> NamespaceRef<'_> {
        self.simple_start
            .checked_sub(1)
            .map(|end| &self.fullname[..end])
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.fullname)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname)
    }
}
