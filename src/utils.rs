// Copyright 2025 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Various utilities.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{Error, Result};

/// Extension to `Result` for adding context to errors.
pub trait ResultExt<T> {
    /// Prefix the error message with `context`, keeping the error kind.
    fn context<D: Display>(self, context: D) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<D: Display>(self, context: D) -> Result<T> {
        self.map_err(|err| Error::new(err.kind(), format!("{}: {}", context, err)))
    }
}

/// Whether a key holds a secret that must not be logged.
pub fn is_sensitive_key(key: &str) -> bool {
    key.contains("password")
}

/// Copy of the value with all secrets replaced, suitable for logging.
pub fn redacted(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    let item = if is_sensitive_key(key) {
                        Value::String("<redacted>".into())
                    } else {
                        redacted(item)
                    };
                    (key.clone(), item)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redacted).collect()),
        other => other.clone(),
    }
}

/// Deserialize an optional structure, treating an empty object as missing.
///
/// Ironic returns `{}` for steps that are not running.
pub fn empty_map_as_default<'de, D, T>(des: D) -> ::std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(des)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(ref map)) if map.is_empty() => Ok(None),
        Some(other) => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Deserialize a string, treating `null` as an empty string.
pub fn null_as_empty<'de, D>(des: D) -> ::std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(des)?.unwrap_or_default())
}
