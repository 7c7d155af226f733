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

//! Firmware (BIOS) settings.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{json, Value};

use super::bmc::BiosSettingValue;
use super::data::FirmwareSettingValue;
use super::Provisioner;
use crate::baremetal::{BiosSetting, CleanStep, StepInterface};
use crate::utils::ResultExt;
use crate::Result;

/// Schema of a firmware setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirmwareSchema {
    /// Type of the attribute (e.g. Enumeration or Integer).
    pub attribute_type: Option<String>,
    /// Values accepted by an enumeration.
    pub allowable_values: Option<Vec<String>>,
    /// Lowest accepted integer.
    pub lower_bound: Option<i64>,
    /// Highest accepted integer.
    pub upper_bound: Option<i64>,
    /// Minimum length of a string.
    pub min_length: Option<u64>,
    /// Maximum length of a string.
    pub max_length: Option<u64>,
    /// Whether the setting cannot be changed.
    pub read_only: Option<bool>,
    /// Whether the value must be unique.
    pub unique: Option<bool>,
}

impl From<&BiosSetting> for FirmwareSchema {
    fn from(value: &BiosSetting) -> FirmwareSchema {
        FirmwareSchema {
            attribute_type: value.attribute_type.clone(),
            allowable_values: value.allowable_values.clone(),
            lower_bound: value.lower_bound,
            upper_bound: value.upper_bound,
            min_length: value.min_length,
            max_length: value.max_length,
            read_only: value.read_only,
            unique: value.unique,
        }
    }
}

/// Current firmware settings of a host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareSettings {
    /// Setting names and their values.
    pub settings: HashMap<String, String>,
    /// Setting schemas, if requested.
    pub schema: Option<HashMap<String, FirmwareSchema>>,
}

impl FirmwareSettings {
    fn from_settings(settings: &[BiosSetting], include_schema: bool) -> FirmwareSettings {
        FirmwareSettings {
            settings: settings
                .iter()
                .map(|s| (s.name.clone(), s.value.clone().unwrap_or_default()))
                .collect(),
            schema: if include_schema {
                Some(
                    settings
                        .iter()
                        .map(|s| (s.name.clone(), FirmwareSchema::from(s)))
                        .collect(),
                )
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Default)]
struct SettingsBuilder {
    names: HashSet<String>,
    settings: Vec<Value>,
}

impl SettingsBuilder {
    fn add<V: Into<Value>>(&mut self, name: &str, value: V) {
        if self.names.insert(name.to_string()) {
            self.settings.push(json!({"name": name, "value": value.into()}));
        }
    }
}

/// Settings that need to change, in the `apply_configuration` format.
///
/// Without the actual settings all vendor settings are applied. Vendor
/// settings take precedence over target settings with the same name.
pub(crate) fn build_firmware_settings(
    vendor: &[BiosSettingValue],
    target: Option<&HashMap<String, FirmwareSettingValue>>,
    actual: Option<&HashMap<String, String>>,
) -> Vec<Value> {
    let mut builder = SettingsBuilder::default();

    let actual = match actual {
        Some(actual) => actual,
        None => {
            for setting in vendor {
                builder.add(&setting.name, setting.value.as_str());
            }
            return builder.settings;
        }
    };

    for setting in vendor {
        match actual.get(&setting.name) {
            Some(value) if *value == setting.value => {}
            Some(_) => builder.add(&setting.name, setting.value.as_str()),
            None => info!(
                "Setting {} converted by the BMC driver is not found in the firmware settings",
                setting.name
            ),
        }
    }

    if let Some(target) = target {
        let vendor_names = vendor
            .iter()
            .map(|s| s.name.as_str())
            .collect::<HashSet<_>>();
        let mut names = target.keys().collect::<Vec<_>>();
        names.sort();
        for name in names {
            if vendor_names.contains(name.as_str()) {
                continue;
            }
            let value = &target[name];
            if actual.get(name).map(String::as_str) != Some(value.to_string().as_str()) {
                builder.add(name, value.clone());
            }
        }
    }

    builder.settings
}

/// The BIOS clean step applying the settings, if there are any.
pub(crate) fn build_firmware_clean_step(settings: Vec<Value>) -> Option<CleanStep> {
    if settings.is_empty() {
        return None;
    }
    debug!("Applying {} BIOS setting(s)", settings.len());
    Some(CleanStep::new(StepInterface::BIOS, "apply_configuration").with_arg("settings", settings))
}

impl Provisioner {
    /// Get the current firmware settings, optionally with their schema.
    pub async fn get_firmware_settings(&self, include_schema: bool) -> Result<FirmwareSettings> {
        let node = self
            .fetch_node()
            .await
            .context("Could not get node for BIOS settings")?;
        let settings = self
            .client
            .list_bios_settings(&node.id, include_schema)
            .await
            .context(format!("Could not get BIOS settings for node {}", node.id))?;
        info!(
            "Retrieved {} BIOS setting(s) for node {}",
            settings.len(),
            node.id
        );
        Ok(FirmwareSettings::from_settings(&settings, include_schema))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vendor() -> Vec<BiosSettingValue> {
        vec![
            BiosSettingValue::new("ProcVirtualization", "Enabled"),
            BiosSettingValue::new("SriovGlobalEnable", "Disabled"),
        ]
    }

    fn actual() -> HashMap<String, String> {
        [
            ("ProcVirtualization", "Disabled"),
            ("SriovGlobalEnable", "Disabled"),
            ("NumLock", "On"),
            ("MemTest", "Enabled"),
            ("BootRetries", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn names(settings: &[Value]) -> Vec<&str> {
        settings
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect()
    }

    mod settings {
        use super::*;

        #[test]
        fn test_without_actual() {
            let settings = build_firmware_settings(&vendor(), None, None);
            assert_eq!(
                settings,
                vec![
                    json!({"name": "ProcVirtualization", "value": "Enabled"}),
                    json!({"name": "SriovGlobalEnable", "value": "Disabled"}),
                ]
            );
        }

        #[test]
        fn test_only_changed() {
            let target = [
                ("NumLock".to_string(), FirmwareSettingValue::String("Off".into())),
                ("MemTest".to_string(), FirmwareSettingValue::String("Enabled".into())),
                ("BootRetries".to_string(), FirmwareSettingValue::Integer(5)),
            ]
            .into_iter()
            .collect();
            let settings = build_firmware_settings(&vendor(), Some(&target), Some(&actual()));
            assert_eq!(
                names(&settings),
                vec!["ProcVirtualization", "BootRetries", "NumLock"]
            );
            assert_eq!(settings[1]["value"], json!(5));
        }

        #[test]
        fn test_vendor_takes_precedence() {
            let target = [(
                "ProcVirtualization".to_string(),
                FirmwareSettingValue::String("Disabled".into()),
            )]
            .into_iter()
            .collect();
            let settings = build_firmware_settings(&vendor(), Some(&target), Some(&actual()));
            assert_eq!(
                settings,
                vec![json!({"name": "ProcVirtualization", "value": "Enabled"})]
            );
        }

        #[test]
        fn test_unknown_vendor_setting_skipped() {
            let vendor = vec![BiosSettingValue::new("Unknown", "Yes")];
            assert!(build_firmware_settings(&vendor, None, Some(&actual())).is_empty());
        }

        #[test]
        fn test_integer_equal() {
            let target = [("BootRetries".to_string(), FirmwareSettingValue::Integer(3))]
                .into_iter()
                .collect();
            assert!(build_firmware_settings(&[], Some(&target), Some(&actual())).is_empty());
        }
    }

    mod step {
        use super::*;

        #[test]
        fn test_empty() {
            assert!(build_firmware_clean_step(Vec::new()).is_none());
        }

        #[test]
        fn test_step() {
            let step =
                build_firmware_clean_step(build_firmware_settings(&vendor(), None, None)).unwrap();
            assert_eq!(step.interface, StepInterface::BIOS);
            assert_eq!(step.name, "apply_configuration");
            assert_eq!(step.args["settings"].as_array().unwrap().len(), 2);
        }
    }

    mod schema {
        use super::*;

        #[test]
        fn test_from_settings() {
            let settings = vec![BiosSetting {
                name: "BootMode".into(),
                value: Some("Uefi".into()),
                attribute_type: Some("Enumeration".into()),
                allowable_values: Some(vec!["Uefi".into(), "Bios".into()]),
                lower_bound: None,
                upper_bound: None,
                min_length: None,
                max_length: None,
                read_only: Some(false),
                unique: None,
            }];
            let result = FirmwareSettings::from_settings(&settings, false);
            assert_eq!(result.settings["BootMode"], "Uefi");
            assert!(result.schema.is_none());

            let result = FirmwareSettings::from_settings(&settings, true);
            let schema = result.schema.unwrap();
            assert_eq!(schema["BootMode"].attribute_type.as_deref(), Some("Enumeration"));
            assert_eq!(schema["BootMode"].read_only, Some(false));
        }
    }

    mod get {
        use super::super::super::fixtures::*;
        use super::*;
        use crate::baremetal::ProvisionState;
        use crate::ErrorKind;

        #[tokio::test]
        async fn test_get() {
            let (client, provisioner) = setup(Some(node(ProvisionState::Active)));
            client.set_bios_settings(vec![BiosSetting {
                name: "NumLock".into(),
                value: Some("On".into()),
                ..Default::default()
            }]);
            let result = provisioner.get_firmware_settings(false).await.unwrap();
            assert_eq!(result.settings["NumLock"], "On");
            assert!(result.schema.is_none());
        }

        #[tokio::test]
        async fn test_unregistered() {
            let client = FakeClient::new();
            let provisioner = provisioner_without_id(&client);
            let err = provisioner.get_firmware_settings(true).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        }
    }
}
