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

//! Translation of RAID configuration into logical disks and clean steps.

use std::collections::HashSet;
use std::error;
use std::fmt;

use serde_json::Value;

use super::bmc::{NO_RAID_INTERFACE, SOFTWARE_RAID_INTERFACE};
use super::data::{HardwareRaidVolume, RaidConfig, SoftwareRaidVolume};
use super::devicehints::make_hint_map;
use super::outcome::Outcome;
use crate::baremetal::{CleanStep, DiskType, LogicalDisk, StepInterface, VolumeSize};

/// Controller name for software RAID.
pub const SOFTWARE_RAID_CONTROLLER: &str = "software";

/// Invalid RAID configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidConfigError(String);

impl RaidConfigError {
    fn new<S: Into<String>>(message: S) -> RaidConfigError {
        RaidConfigError(message.into())
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaidConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl error::Error for RaidConfigError {}

/// Invalid RAID configuration cannot be fixed by retrying.
impl From<RaidConfigError> for Outcome {
    fn from(value: RaidConfigError) -> Outcome {
        Outcome::Failed(value.0)
    }
}

fn volume_size(size: Option<u64>) -> VolumeSize {
    match size {
        Some(size) if size > 0 => VolumeSize::Gibibytes(size),
        _ => VolumeSize::Max,
    }
}

fn hardware_logical_disks(
    volumes: &[HardwareRaidVolume],
) -> Result<Vec<LogicalDisk>, RaidConfigError> {
    let mut names = HashSet::new();
    let mut result = Vec::with_capacity(volumes.len());
    for (index, volume) in volumes.iter().enumerate() {
        let name = volume.name.as_deref().filter(|s| !s.is_empty());
        if let Some(name) = name {
            if !names.insert(name) {
                return Err(RaidConfigError::new(format!(
                    "Name of the hardware RAID volume {index} ({name}) is duplicated"
                )));
            }
        }

        if let Some(count) = volume.number_of_physical_disks {
            if !volume.physical_disks.is_empty() && volume.physical_disks.len() != count {
                return Err(RaidConfigError::new(format!(
                    "The number of physical disks of the hardware RAID volume {index} is {count}, \
                     but {} physical disks are listed",
                    volume.physical_disks.len()
                )));
            }
        }

        result.push(LogicalDisk {
            controller: volume.controller.clone().filter(|s| !s.is_empty()),
            disk_type: volume.rotational.map(|rotational| {
                if rotational {
                    DiskType::HDD
                } else {
                    DiskType::SSD
                }
            }),
            is_root_volume: None,
            number_of_physical_disks: volume.number_of_physical_disks,
            physical_disks: volume
                .physical_disks
                .iter()
                .map(|disk| Value::from(disk.as_str()))
                .collect(),
            raid_level: volume.level.clone(),
            size_gb: volume_size(volume.size_gibibytes),
            volume_name: name.map(From::from),
        });
    }
    Ok(result)
}

fn software_logical_disks(
    volumes: &[SoftwareRaidVolume],
) -> Result<Vec<LogicalDisk>, RaidConfigError> {
    match volumes.first() {
        Some(first) if first.level != "1" => {
            return Err(RaidConfigError::new(format!(
                "The level of the first software RAID volume must be 1, got {}",
                first.level
            )));
        }
        Some(_) => {}
        None => return Ok(Vec::new()),
    }

    Ok(volumes
        .iter()
        .map(|volume| LogicalDisk {
            controller: Some(SOFTWARE_RAID_CONTROLLER.into()),
            disk_type: None,
            is_root_volume: None,
            number_of_physical_disks: None,
            physical_disks: volume
                .physical_disks
                .iter()
                .filter_map(|hints| make_hint_map(Some(hints)))
                .map(Value::Object)
                .collect(),
            raid_level: volume.level.clone(),
            size_gb: volume_size(volume.size_gibibytes),
            volume_name: None,
        })
        .collect())
}

/// Build the target RAID configuration.
///
/// Hardware volumes take precedence over software volumes. No configuration
/// results in an empty list.
pub fn build_target_raid_config(
    config: Option<&RaidConfig>,
) -> Result<Vec<LogicalDisk>, RaidConfigError> {
    let config = match config {
        Some(config) => config,
        None => return Ok(Vec::new()),
    };
    if !config.hardware_volumes.is_empty() {
        hardware_logical_disks(&config.hardware_volumes)
    } else {
        software_logical_disks(&config.software_volumes)
    }
}

/// Mark the first logical disk as the root volume.
///
/// Nothing is marked when root device hints are used.
pub fn mark_root_volume(logical_disks: &mut [LogicalDisk], have_root_device_hints: bool) {
    if have_root_device_hints {
        debug!("Root device hints are used, not marking the first RAID volume as root");
        return;
    }
    if let Some(first) = logical_disks.first_mut() {
        first.is_root_volume = Some(true);
    }
}

fn has_volumes(config: Option<&RaidConfig>) -> bool {
    config
        .map(|c| !c.hardware_volumes.is_empty() || !c.software_volumes.is_empty())
        .unwrap_or(false)
}

fn software_volumes(config: Option<&RaidConfig>) -> &[SoftwareRaidVolume] {
    config.map(|c| c.software_volumes.as_slice()).unwrap_or(&[])
}

fn hardware_volumes(config: Option<&RaidConfig>) -> &[HardwareRaidVolume] {
    config.map(|c| c.hardware_volumes.as_slice()).unwrap_or(&[])
}

fn delete_configuration() -> CleanStep {
    CleanStep::new(StepInterface::RAID, "delete_configuration")
}

fn create_configuration() -> CleanStep {
    CleanStep::new(StepInterface::RAID, "create_configuration")
        .with_arg("create_root_volume", true)
        .with_arg("create_nonroot_volumes", true)
}

/// Build clean steps moving the actual RAID configuration to the target one.
///
/// Creating a configuration is always preceded by deleting the old one.
pub fn build_raid_clean_steps(
    raid_interface: &str,
    target: Option<&RaidConfig>,
    actual: Option<&RaidConfig>,
) -> Result<Vec<CleanStep>, RaidConfigError> {
    if raid_interface == NO_RAID_INTERFACE {
        if has_volumes(target) {
            return Err(RaidConfigError::new(
                "RAID settings are defined, but the node's driver does not support RAID",
            ));
        }
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();
    if raid_interface == SOFTWARE_RAID_INTERFACE {
        let target_volumes = software_volumes(target);
        let _ = software_logical_disks(target_volumes)?;
        if target_volumes == software_volumes(actual) {
            debug!("Software RAID configuration is unchanged");
            return Ok(steps);
        }
        steps.push(delete_configuration());
        steps.push(CleanStep::new(
            StepInterface::Deploy,
            "erase_devices_metadata",
        ));
        if !target_volumes.is_empty() {
            steps.push(create_configuration());
        }
    } else {
        let _ = build_target_raid_config(target)?;
        if target.is_none() {
            debug!("No target RAID configuration, keeping the existing one");
            return Ok(steps);
        }
        let target_volumes = hardware_volumes(target);
        if target_volumes == hardware_volumes(actual) {
            debug!("Hardware RAID configuration is unchanged");
            return Ok(steps);
        }
        steps.push(delete_configuration());
        if !target_volumes.is_empty() {
            steps.push(create_configuration());
        }
    }

    Ok(steps)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provisioner::data::RootDeviceHints;

    fn hw(name: &str, level: &str) -> HardwareRaidVolume {
        HardwareRaidVolume {
            name: Some(name.into()),
            level: level.into(),
            ..Default::default()
        }
    }

    fn sw(level: &str) -> SoftwareRaidVolume {
        SoftwareRaidVolume {
            level: level.into(),
            ..Default::default()
        }
    }

    fn step_names(steps: &[CleanStep]) -> Vec<&str> {
        steps.iter().map(|s| s.name.as_str()).collect()
    }

    mod target {
        use super::*;

        #[test]
        fn test_empty() {
            assert!(build_target_raid_config(None).unwrap().is_empty());
            assert!(build_target_raid_config(Some(&RaidConfig::default()))
                .unwrap()
                .is_empty());
        }

        #[test]
        fn test_hardware() {
            let config = RaidConfig {
                hardware_volumes: vec![
                    HardwareRaidVolume {
                        size_gibibytes: Some(100),
                        rotational: Some(true),
                        controller: Some("RAID.Integrated.1-1".into()),
                        number_of_physical_disks: Some(2),
                        physical_disks: vec!["Disk.0".into(), "Disk.1".into()],
                        ..hw("root", "1")
                    },
                    hw("data", "5"),
                ],
                software_volumes: vec![sw("0")],
            };
            let disks = build_target_raid_config(Some(&config)).unwrap();
            assert_eq!(disks.len(), 2);
            assert_eq!(disks[0].size_gb, VolumeSize::Gibibytes(100));
            assert_eq!(disks[0].disk_type, Some(DiskType::HDD));
            assert_eq!(disks[0].physical_disks.len(), 2);
            assert_eq!(disks[1].size_gb, VolumeSize::Max);
            assert_eq!(disks[1].volume_name.as_deref(), Some("data"));
            assert!(disks.iter().all(|d| d.is_root_volume.is_none()));
        }

        #[test]
        fn test_duplicate_names() {
            let config = RaidConfig {
                hardware_volumes: vec![hw("vol", "1"), hw("vol", "0")],
                ..Default::default()
            };
            let err = build_target_raid_config(Some(&config)).unwrap_err();
            assert!(err.message().contains("duplicated"));
        }

        #[test]
        fn test_disk_count_mismatch() {
            let config = RaidConfig {
                hardware_volumes: vec![HardwareRaidVolume {
                    number_of_physical_disks: Some(3),
                    physical_disks: vec!["Disk.0".into(), "Disk.1".into()],
                    ..hw("vol", "5")
                }],
                ..Default::default()
            };
            assert!(build_target_raid_config(Some(&config)).is_err());
        }

        #[test]
        fn test_software() {
            let config = RaidConfig {
                software_volumes: vec![
                    SoftwareRaidVolume {
                        size_gibibytes: Some(50),
                        physical_disks: vec![
                            RootDeviceHints {
                                device_name: Some("/dev/sda".into()),
                                ..Default::default()
                            },
                            RootDeviceHints {
                                device_name: Some("/dev/sdb".into()),
                                ..Default::default()
                            },
                        ],
                        ..sw("1")
                    },
                    sw("0"),
                ],
                ..Default::default()
            };
            let disks = build_target_raid_config(Some(&config)).unwrap();
            assert_eq!(disks.len(), 2);
            assert_eq!(disks[0].controller.as_deref(), Some("software"));
            assert_eq!(disks[0].physical_disks.len(), 2);
            assert_eq!(disks[0].size_gb, VolumeSize::Gibibytes(50));
            assert_eq!(disks[1].size_gb, VolumeSize::Max);
        }

        #[test]
        fn test_software_first_not_mirror() {
            let config = RaidConfig {
                software_volumes: vec![sw("0"), sw("1")],
                ..Default::default()
            };
            assert!(build_target_raid_config(Some(&config)).is_err());
            assert!(build_raid_clean_steps("agent", Some(&config), None).is_err());
        }

        #[test]
        fn test_mark_root_volume() {
            let config = RaidConfig {
                hardware_volumes: vec![hw("a", "1"), hw("b", "0")],
                ..Default::default()
            };
            let mut disks = build_target_raid_config(Some(&config)).unwrap();
            mark_root_volume(&mut disks, true);
            assert!(disks[0].is_root_volume.is_none());
            mark_root_volume(&mut disks, false);
            assert_eq!(disks[0].is_root_volume, Some(true));
            assert!(disks[1].is_root_volume.is_none());
        }
    }

    mod steps {
        use super::*;

        #[test]
        fn test_no_raid() {
            assert!(build_raid_clean_steps("no-raid", None, None)
                .unwrap()
                .is_empty());
            let config = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                ..Default::default()
            };
            assert!(build_raid_clean_steps("no-raid", Some(&config), None).is_err());
        }

        #[test]
        fn test_hardware_unset_keeps_existing() {
            let actual = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                ..Default::default()
            };
            assert!(build_raid_clean_steps("idrac-redfish", None, Some(&actual))
                .unwrap()
                .is_empty());
        }

        #[test]
        fn test_hardware_changed() {
            let target = RaidConfig {
                hardware_volumes: vec![hw("a", "5")],
                software_volumes: vec![sw("1")],
            };
            let actual = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                ..Default::default()
            };
            let steps =
                build_raid_clean_steps("idrac-redfish", Some(&target), Some(&actual)).unwrap();
            assert_eq!(
                step_names(&steps),
                vec!["delete_configuration", "create_configuration"]
            );
            assert!(steps.iter().all(|s| s.interface == StepInterface::RAID));
        }

        #[test]
        fn test_hardware_ignores_software() {
            let target = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                software_volumes: vec![sw("1")],
            };
            let actual = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                ..Default::default()
            };
            assert!(
                build_raid_clean_steps("idrac-redfish", Some(&target), Some(&actual))
                    .unwrap()
                    .is_empty()
            );
        }

        #[test]
        fn test_hardware_removed() {
            let actual = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                ..Default::default()
            };
            let steps = build_raid_clean_steps(
                "idrac-redfish",
                Some(&RaidConfig::default()),
                Some(&actual),
            )
            .unwrap();
            assert_eq!(step_names(&steps), vec!["delete_configuration"]);
        }

        #[test]
        fn test_software_changed() {
            let target = RaidConfig {
                software_volumes: vec![sw("1")],
                ..Default::default()
            };
            let steps = build_raid_clean_steps("agent", Some(&target), None).unwrap();
            assert_eq!(
                step_names(&steps),
                vec![
                    "delete_configuration",
                    "erase_devices_metadata",
                    "create_configuration"
                ]
            );
            assert_eq!(steps[1].interface, StepInterface::Deploy);
        }

        #[test]
        fn test_software_validated_despite_hardware() {
            let target = RaidConfig {
                hardware_volumes: vec![hw("a", "1")],
                software_volumes: vec![sw("0")],
            };
            let err = build_raid_clean_steps("agent", Some(&target), None).unwrap_err();
            assert!(err.message().contains("first software RAID volume"));
        }

        #[test]
        fn test_software_ignores_hardware() {
            let target = RaidConfig {
                hardware_volumes: vec![hw("a", "1"), hw("a", "0")],
                software_volumes: vec![sw("1")],
            };
            let steps = build_raid_clean_steps("agent", Some(&target), None).unwrap();
            assert_eq!(
                step_names(&steps),
                vec![
                    "delete_configuration",
                    "erase_devices_metadata",
                    "create_configuration"
                ]
            );
        }

        #[test]
        fn test_software_unchanged() {
            let target = RaidConfig {
                software_volumes: vec![sw("1")],
                hardware_volumes: vec![],
            };
            let actual = RaidConfig {
                software_volumes: vec![sw("1")],
                hardware_volumes: vec![],
            };
            assert!(build_raid_clean_steps("agent", Some(&target), Some(&actual))
                .unwrap()
                .is_empty());
            assert!(build_raid_clean_steps("agent", None, Some(&RaidConfig::default()))
                .unwrap()
                .is_empty());
        }

        #[test]
        fn test_software_removed() {
            let actual = RaidConfig {
                software_volumes: vec![sw("1")],
                ..Default::default()
            };
            let steps = build_raid_clean_steps("agent", None, Some(&actual)).unwrap();
            assert_eq!(
                step_names(&steps),
                vec!["delete_configuration", "erase_devices_metadata"]
            );
        }

        #[test]
        fn test_create_always_after_delete() {
            let target = RaidConfig {
                hardware_volumes: vec![hw("a", "1"), hw("b", "0")],
                ..Default::default()
            };
            for actual in [None, Some(RaidConfig::default())] {
                let steps =
                    build_raid_clean_steps("idrac-redfish", Some(&target), actual.as_ref())
                        .unwrap();
                let create = steps
                    .iter()
                    .position(|s| s.name == "create_configuration")
                    .unwrap();
                assert!(create > 0);
                assert_eq!(steps[create - 1].name, "delete_configuration");
            }
        }
    }
}
