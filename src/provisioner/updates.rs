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

//! Minimal updates moving a node towards the desired state.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::baremetal::{Node, UpdateOperation};
use crate::utils::{is_sensitive_key, redacted};
use crate::{Error, ErrorKind, Result};

/// Desired values of options, `null` means the option must be absent.
pub type Options = Map<String, Value>;

/// Structural equality of two values.
///
/// Numbers are compared by value, so `1` equals `1.0`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(l), Some(r)) = (l.as_i64(), r.as_i64()) {
                l == r
            } else if let (Some(l), Some(r)) = (l.as_u64(), r.as_u64()) {
                l == r
            } else {
                l.as_f64() == r.as_f64()
            }
        }
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(key, x)| r.get(key).map(|y| values_equal(x, y)).unwrap_or(false))
        }
        (l, r) => l == r,
    }
}

fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Builder of a batch of node updates.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdater {
    updates: Vec<UpdateOperation>,
}

impl NodeUpdater {
    /// Create an empty updater.
    pub fn new() -> NodeUpdater {
        NodeUpdater::default()
    }

    fn set_option(&mut self, path: String, name: &str, desired: Value, current: Option<&Value>) {
        let current = current.filter(|v| !v.is_null());
        if desired.is_null() {
            if current.is_some() {
                debug!("Removing option {}", path);
                self.updates.push(UpdateOperation::Remove { path });
            }
            return;
        }

        match current {
            Some(value) if values_equal(value, &desired) => {}
            Some(value) => {
                if is_sensitive_key(name) {
                    debug!("Updating option {} (value redacted)", path);
                } else {
                    debug!(
                        "Updating option {} from {} to {}",
                        path,
                        redacted(value),
                        redacted(&desired)
                    );
                }
                self.updates.push(UpdateOperation::Add {
                    path,
                    value: desired,
                });
            }
            None => {
                if is_sensitive_key(name) {
                    debug!("Adding option {} (value redacted)", path);
                } else {
                    debug!("Adding option {} = {}", path, redacted(&desired));
                }
                self.updates.push(UpdateOperation::Add {
                    path,
                    value: desired,
                });
            }
        }
    }

    fn set_section_opts(
        &mut self,
        section: &str,
        desired: Options,
        current: &HashMap<String, Value>,
    ) -> &mut NodeUpdater {
        for (name, value) in desired {
            let path = format!("/{}/{}", section, escape_pointer(&name));
            self.set_option(path, &name, value, current.get(&name));
        }
        self
    }

    /// Set a top-level field of the node.
    pub fn set_top_level_opt<D, C>(&mut self, name: &str, desired: D, current: C) -> &mut NodeUpdater
    where
        D: Into<Value>,
        C: Into<Value>,
    {
        let current = current.into();
        let path = format!("/{}", escape_pointer(name));
        self.set_option(path, name, desired.into(), Some(&current));
        self
    }

    /// Set node properties.
    pub fn set_properties_opts(&mut self, desired: Options, node: &Node) -> &mut NodeUpdater {
        self.set_section_opts("properties", desired, &node.properties)
    }

    /// Set instance information.
    pub fn set_instance_info_opts(&mut self, desired: Options, node: &Node) -> &mut NodeUpdater {
        self.set_section_opts("instance_info", desired, &node.instance_info)
    }

    /// Set driver information.
    pub fn set_driver_info_opts(&mut self, desired: Options, node: &Node) -> &mut NodeUpdater {
        self.set_section_opts("driver_info", desired, &node.driver_info)
    }

    /// Whether the batch is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Operations collected so far.
    #[inline]
    pub fn updates(&self) -> &[UpdateOperation] {
        &self.updates
    }

    /// Take the collected operations.
    pub fn into_updates(self) -> Vec<UpdateOperation> {
        self.updates
    }
}

/// Apply a batch of updates to a local copy of a node.
///
/// The result matches what the provisioning service stores after accepting
/// the same batch.
pub fn apply_updates(node: &Node, updates: &[UpdateOperation]) -> Result<Node> {
    let invalid = |e: serde_json::Error| Error::new(ErrorKind::InvalidInput, e.to_string());
    let mut document = serde_json::to_value(node).map_err(invalid)?;
    let operations: Vec<json_patch::PatchOperation> =
        serde_json::from_value(serde_json::to_value(updates).map_err(invalid)?).map_err(invalid)?;
    json_patch::patch(&mut document, &operations).map_err(|e| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Cannot apply updates to node {}: {}", node.id, e),
        )
    })?;
    serde_json::from_value(document).map_err(invalid)
}
