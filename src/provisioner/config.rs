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

//! Global provisioner settings.

use std::env;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::{Error, ErrorKind, Result};

/// Default limit on hosts in busy states.
pub const DEFAULT_MAX_BUSY_HOSTS: usize = 20;

const FORCE_PERSISTENT_BOOT_DEVICE_VALUES: &[&str] = &["Default", "Always", "Never", "None"];

fn default_max_busy_hosts() -> usize {
    DEFAULT_MAX_BUSY_HOSTS
}

/// Settings shared by all hosts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProvisionerConfig {
    /// Kernel of the deploy ramdisk.
    #[serde(default)]
    pub deploy_kernel_url: Option<String>,
    /// Initramfs of the deploy ramdisk.
    #[serde(default)]
    pub deploy_ramdisk_url: Option<String>,
    /// ISO of the deploy ramdisk.
    #[serde(default)]
    pub deploy_iso_url: Option<String>,
    /// Whether deploy images are built per host by an external image builder.
    #[serde(default)]
    pub have_preprovisioning_image_builder: bool,
    /// Value of `force_persistent_boot_device` for live ISO deployments.
    #[serde(default)]
    pub live_iso_force_persistent_boot_device: Option<String>,
    /// Maximum number of hosts in busy states at the same time.
    #[serde(default = "default_max_busy_hosts")]
    pub max_busy_hosts: usize,
}

impl Default for ProvisionerConfig {
    fn default() -> ProvisionerConfig {
        ProvisionerConfig {
            deploy_kernel_url: None,
            deploy_ramdisk_url: None,
            deploy_iso_url: None,
            have_preprovisioning_image_builder: false,
            live_iso_force_persistent_boot_device: None,
            max_busy_hosts: DEFAULT_MAX_BUSY_HOSTS,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

impl ProvisionerConfig {
    /// Load the configuration from the environment.
    ///
    /// Reads `DEPLOY_KERNEL_URL`, `DEPLOY_RAMDISK_URL`, `DEPLOY_ISO_URL`,
    /// `LIVE_ISO_FORCE_PERSISTENT_BOOT_DEVICE` and `PROVISIONING_LIMIT`.
    pub fn from_env() -> Result<ProvisionerConfig> {
        let max_busy_hosts = match env_opt("PROVISIONING_LIMIT") {
            Some(value) => value.parse().map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Invalid value of PROVISIONING_LIMIT {value:?}: {e}"),
                )
            })?,
            None => DEFAULT_MAX_BUSY_HOSTS,
        };
        let config = ProvisionerConfig {
            deploy_kernel_url: env_opt("DEPLOY_KERNEL_URL"),
            deploy_ramdisk_url: env_opt("DEPLOY_RAMDISK_URL"),
            deploy_iso_url: env_opt("DEPLOY_ISO_URL"),
            have_preprovisioning_image_builder: false,
            live_iso_force_persistent_boot_device: env_opt("LIVE_ISO_FORCE_PERSISTENT_BOOT_DEVICE"),
            max_busy_hosts,
        };
        config.validate()?;
        debug!("Loaded provisioner configuration from the environment: {:?}", config);
        Ok(config)
    }

    /// Load the configuration from a YAML document.
    pub fn from_yaml<S: AsRef<str>>(source: S) -> Result<ProvisionerConfig> {
        let config: ProvisionerConfig = serde_yaml::from_str(source.as_ref()).map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Cannot parse provisioner configuration: {e}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ProvisionerConfig> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Cannot read {}: {}", path.display(), e),
            )
        })?;
        let config: ProvisionerConfig = serde_yaml::from_reader(file).map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Cannot parse {}: {}", path.display(), e),
            )
        })?;
        config.validate()?;
        debug!("Loaded provisioner configuration from {}", path.display());
        Ok(config)
    }

    /// Enable an external builder of deploy images.
    pub fn with_preprovisioning_image_builder(mut self, value: bool) -> ProvisionerConfig {
        self.have_preprovisioning_image_builder = value;
        self
    }

    /// Limit the number of busy hosts.
    pub fn with_max_busy_hosts(mut self, value: usize) -> ProvisionerConfig {
        self.max_busy_hosts = value;
        self
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.deploy_kernel_url.is_some() != self.deploy_ramdisk_url.is_some() {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                "Either both or none of deploy kernel and ramdisk URLs must be set",
            ));
        }

        if let Some(ref value) = self.live_iso_force_persistent_boot_device {
            if !FORCE_PERSISTENT_BOOT_DEVICE_VALUES.contains(&value.as_str()) {
                return Err(Error::new(
                    ErrorKind::InvalidConfig,
                    format!(
                        "Invalid value of the force persistent boot device {:?}, expected one of {:?}",
                        value, FORCE_PERSISTENT_BOOT_DEVICE_VALUES
                    ),
                ));
            }
        }

        if self.max_busy_hosts == 0 {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                "The limit of busy hosts must be positive",
            ));
        }

        Ok(())
    }
}
