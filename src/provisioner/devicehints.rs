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

//! Root device hints in the syntax of the provisioning service.

use serde_json::{Map, Value};

use super::data::RootDeviceHints;

const BY_PATH_PREFIX: &str = "/dev/disk/by-path/";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Convert hints into a hint map, `None` if no hints are set.
pub fn make_hint_map(hints: Option<&RootDeviceHints>) -> Option<Map<String, Value>> {
    let hints = hints?;
    let mut result = Map::new();

    if let Some(name) = non_empty(&hints.device_name) {
        let key = if name.starts_with(BY_PATH_PREFIX) {
            "by_path"
        } else {
            "name"
        };
        let _ = result.insert(key.into(), format!("s== {name}").into());
    }

    let exact = [
        ("hctl", &hints.hctl),
        ("serial", &hints.serial_number),
        ("wwn", &hints.wwn),
        ("wwn_with_extension", &hints.wwn_with_extension),
        ("wwn_vendor_extension", &hints.wwn_vendor_extension),
    ];
    for (key, value) in exact {
        if let Some(value) = non_empty(value) {
            let _ = result.insert(key.into(), format!("s== {value}").into());
        }
    }

    for (key, value) in [("model", &hints.model), ("vendor", &hints.vendor)] {
        if let Some(value) = non_empty(value) {
            let _ = result.insert(key.into(), format!("<in> {value}").into());
        }
    }

    if let Some(size) = hints.min_size_gigabytes.filter(|s| *s > 0) {
        let _ = result.insert("size".into(), format!(">= {size}").into());
    }

    if let Some(rotational) = hints.rotational {
        let _ = result.insert("rotational".into(), rotational.to_string().into());
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}
