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

//! Registration and adoption of hosts.

use macaddr::MacAddr6;
use serde_json::{Map, Value};

use super::data::{
    AdoptData, AutomatedCleaningMode, BootMode, HostState, ImageFormat, ManagementAccessData,
    PreprovisioningImage,
};
use super::lookup::{LookupError, MacAddressConflict};
use super::outcome::{finish, Outcome, Step, PROVISION_REQUEUE_DELAY};
use super::updates::{NodeUpdater, Options};
use super::Provisioner;
use crate::baremetal::{
    DriverInfo, Node, NodeCreate, PortCreate, PortListQuery, Properties, ProvisionAction,
    ProvisionState, TargetProvisionState,
};
use crate::utils::ResultExt;
use crate::{ErrorKind, Result};

/// Message of the transient error returned while waiting for a deploy image.
pub const NEEDS_PREPROVISIONING_IMAGE: &str = "Host needs a preprovisioning image";

const INSPECT_INTERFACE: &str = "inspector";
const RAMDISK_DEPLOY_INTERFACE: &str = "ramdisk";
const CUSTOM_AGENT_DEPLOY_INTERFACE: &str = "custom-agent";

/// Result of registering a host.
#[derive(Debug)]
pub struct Registration {
    /// Outcome of the step.
    pub outcome: Outcome,
    /// ID of the node, if it is known.
    pub node_id: Option<String>,
    /// The boot MAC address conflict that failed the registration.
    pub mac_conflict: Option<MacAddressConflict>,
}

/// Capabilities of a node with the boot mode replaced.
pub(crate) fn build_capabilities_value(node: Option<&Node>, boot_mode: BootMode) -> String {
    let mut capabilities = node
        .and_then(|node| node.properties.capabilities())
        .map(|existing| {
            existing
                .split(',')
                .filter(|item| {
                    !item.is_empty()
                        && !item.starts_with("boot_mode:")
                        && !item.starts_with("secure_boot:")
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    capabilities.push(boot_mode.capabilities());
    capabilities.join(",")
}

fn interface(value: &str) -> Option<String> {
    Some(value).filter(|s| !s.is_empty()).map(From::from)
}

impl Provisioner {
    /// Formats of deploy images accepted from an external image builder.
    pub fn preprovisioning_image_formats(&self) -> Vec<ImageFormat> {
        let mut formats = Vec::new();
        if !self.config.have_preprovisioning_image_builder {
            return formats;
        }
        if self.bmc.supports_iso_preprovisioning_image() {
            formats.push(ImageFormat::Iso);
        }
        if self.config.deploy_kernel_url.is_some() {
            formats.push(ImageFormat::Initrd);
        }
        formats
    }

    /// Driver information keys of the deploy image, `null` when not used.
    pub(crate) fn deploy_image_options(&self, image: Option<&PreprovisioningImage>) -> Options {
        let allow_iso = self.bmc.supports_iso_preprovisioning_image();
        let config_kernel = self.config.deploy_kernel_url.as_deref();

        let (kernel, ramdisk, iso) = match image {
            Some(image) if image.format == ImageFormat::Iso && allow_iso => {
                debug!("Using preprovisioning ISO {}", image.url);
                (None, None, Some(image.url.as_str()))
            }
            Some(image) if image.format == ImageFormat::Initrd && config_kernel.is_some() => {
                debug!("Using preprovisioning ramdisk {}", image.url);
                (config_kernel, Some(image.url.as_str()), None)
            }
            _ if !self.config.have_preprovisioning_image_builder => {
                match (
                    self.config.deploy_iso_url.as_deref(),
                    self.config.deploy_ramdisk_url.as_deref(),
                ) {
                    (Some(iso), _) if allow_iso => (None, None, Some(iso)),
                    (_, Some(ramdisk)) if config_kernel.is_some() => {
                        (config_kernel, Some(ramdisk), None)
                    }
                    _ => (None, None, None),
                }
            }
            _ => (None, None, None),
        };

        options! {
            "deploy_kernel" => kernel,
            "deploy_ramdisk" => ramdisk,
            "deploy_iso" => iso,
        }
    }

    async fn ensure_port(&self, node: &Node, address: &MacAddr6) -> Result<()> {
        let address = address.to_string().to_lowercase();
        let ports = self
            .client
            .list_ports(&PortListQuery::by_node(node.id.clone()))
            .await
            .context("Cannot list ports of the node")?;
        if !ports.is_empty() {
            return Ok(());
        }

        let allocated = self
            .client
            .list_ports(&PortListQuery::by_address(address.clone()))
            .await
            .context("Cannot list ports by address")?;
        if !allocated.is_empty() {
            debug!(
                "Address {} is already allocated to another port, not creating a port for node {}",
                address, node.id
            );
            return Ok(());
        }

        self.create_port(node, address).await
    }

    async fn create_port(&self, node: &Node, address: String) -> Result<()> {
        info!("Creating a PXE enabled port {} for node {}", address, node.id);
        let _ = self
            .client
            .create_port(&PortCreate {
                address,
                node_id: node.id.clone(),
                pxe_enabled: true,
            })
            .await
            .context("Cannot create a port")?;
        Ok(())
    }

    async fn enroll_node(
        &self,
        data: &ManagementAccessData,
        driver_info: Map<String, Value>,
    ) -> Step<Node> {
        if data.boot_mode == BootMode::UefiSecureBoot && !self.bmc.supports_secure_boot() {
            return Err(Outcome::failed(format!(
                "BMC driver {} does not support secure boot",
                self.bmc.bmc_type()
            )));
        }

        let deploy_interface = match data.current_image {
            Some(ref image) if image.is_live_iso() => Some(RAMDISK_DEPLOY_INTERFACE),
            _ if data.has_custom_deploy => Some(CUSTOM_AGENT_DEPLOY_INTERFACE),
            _ => None,
        };
        let mut properties = Properties::default();
        let _ = properties.insert(
            "capabilities".into(),
            build_capabilities_value(None, data.boot_mode).into(),
        );

        let request = NodeCreate {
            bios_interface: interface(self.bmc.bios_interface()),
            boot_interface: interface(self.bmc.boot_interface()),
            deploy_interface: deploy_interface.map(From::from),
            driver: self.bmc.driver().into(),
            driver_info: DriverInfo(driver_info.into_iter().collect()),
            inspect_interface: Some(INSPECT_INTERFACE.into()),
            management_interface: interface(self.bmc.management_interface()),
            name: Some(self.meta.node_name()),
            power_interface: interface(self.bmc.power_interface()),
            properties,
            raid_interface: interface(self.bmc.raid_interface()),
            vendor_interface: interface(self.bmc.vendor_interface()),
        };
        let node = self.client.create_node(&request).await?;
        info!(
            "Registered node {} for host {}",
            node.id,
            self.meta.node_name()
        );
        self.publish("Registered", "Registered new host");

        if let Some(ref address) = data.boot_mac_address {
            self.create_port(&node, address.to_string().to_lowercase())
                .await
                .map_err(Outcome::Transient)?;
        }

        Ok(node)
    }

    async fn register(
        &self,
        data: &ManagementAccessData,
        credentials_changed: bool,
        force: bool,
        node_id: &mut Option<String>,
        mac_conflict: &mut Option<MacAddressConflict>,
    ) -> Step<Outcome> {
        let existing = match self
            .find_existing_node(data.boot_mac_address.as_ref())
            .await
        {
            Ok(existing) => existing,
            Err(LookupError::MacAddressConflict(conflict)) => {
                warn!("Cannot register host {}: {}", self.meta.node_name(), conflict);
                let outcome = Outcome::failed(conflict.to_string());
                *mac_conflict = Some(conflict);
                return Err(outcome);
            }
            Err(err) => return Err(err.into()),
        };

        if self.bmc.needs_mac() && data.boot_mac_address.is_none() {
            return Ok(Outcome::failed(format!(
                "BMC driver {} requires a BootMACAddress value",
                self.bmc.bmc_type()
            )));
        }

        let deploy_image = self.deploy_image_options(data.preprovisioning_image.as_ref());
        let have_deploy_image = deploy_image.values().any(|v| !v.is_null());
        let mut driver_info = self.bmc.driver_info(&self.credentials);
        for (key, value) in &deploy_image {
            if !value.is_null() {
                let _ = driver_info.insert(key.clone(), value.clone());
            }
        }

        let mut updater = NodeUpdater::new();
        let node = match existing {
            Some(node) => {
                *node_id = Some(node.id.clone());
                let _ = updater.set_top_level_opt("name", self.meta.node_name(), node.name.clone());
                if let Some(ref address) = data.boot_mac_address {
                    self.ensure_port(&node, address)
                        .await
                        .map_err(Outcome::Transient)?;
                }
                if credentials_changed {
                    info!(
                        "Updating driver info of node {} because the credentials changed",
                        node.id
                    );
                    let current = node
                        .driver_info
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<Map<_, _>>();
                    let _ = updater.set_top_level_opt("driver_info", driver_info, current);
                } else {
                    let _ = updater.set_driver_info_opts(deploy_image, &node);
                }
                node
            }
            None => {
                let node = self.enroll_node(data, driver_info).await?;
                *node_id = Some(node.id.clone());
                node
            }
        };

        if data.current_image.is_some() || data.has_custom_deploy {
            self.image_update_options(
                &node,
                data.current_image.as_ref(),
                data.boot_mode,
                data.has_custom_deploy,
                &mut updater,
            );
        }
        let _ = updater.set_top_level_opt(
            "automated_clean",
            data.automated_cleaning_mode != AutomatedCleaningMode::Disabled,
            node.automated_clean,
        );
        let node = self.try_update_node(node, &updater).await?;

        debug!(
            "Node {} is in state {} (target {:?}), last error {:?}",
            node.id, node.provision_state, node.target_provision_state, node.last_error
        );

        match node.provision_state {
            ProvisionState::Enroll => {
                if let Some(error) = node.last_error() {
                    if !(credentials_changed || force) {
                        return Ok(Outcome::failed(error));
                    }
                }
                if node.target_provision_state == Some(TargetProvisionState::Manageable) {
                    debug!("Node {} is already being verified", node.id);
                    return Ok(Outcome::Continuing(PROVISION_REQUEUE_DELAY));
                }
                Ok(self
                    .change_provision_action(&node, ProvisionAction::Manage)
                    .await)
            }
            ProvisionState::Verifying => Ok(Outcome::Continuing(PROVISION_REQUEUE_DELAY)),
            _ if data.state.needs_deploy_image() && !have_deploy_image => {
                if self.config.have_preprovisioning_image_builder {
                    info!(
                        "Waiting for a preprovisioning image for host {}",
                        self.meta.node_name()
                    );
                    Ok(Outcome::transient(
                        ErrorKind::OperationFailed,
                        NEEDS_PREPROVISIONING_IMAGE,
                    ))
                } else {
                    Ok(Outcome::failed("No preprovisioning image available"))
                }
            }
            _ => Ok(Outcome::Complete),
        }
    }

    /// Register the host and validate access to its BMC.
    ///
    /// Creates the node if it does not exist, otherwise reconciles its
    /// name, driver information and image. Returns the node ID.
    pub async fn validate_management_access(
        &self,
        data: &ManagementAccessData,
        credentials_changed: bool,
        force: bool,
    ) -> Registration {
        let mut node_id = self.node_id.clone();
        let mut mac_conflict = None;
        let outcome = finish(
            self.register(
                data,
                credentials_changed,
                force,
                &mut node_id,
                &mut mac_conflict,
            )
            .await,
        );
        Registration {
            outcome,
            node_id,
            mac_conflict,
        }
    }

    async fn do_adopt(&self, data: &AdoptData, force: bool) -> Step<Outcome> {
        let node = self.get_node().await?;
        Ok(match node.provision_state {
            ProvisionState::Enroll | ProvisionState::Verifying => Outcome::transient(
                ErrorKind::InvalidInput,
                format!("Invalid state for adoption: {}", node.provision_state),
            ),
            ProvisionState::Manageable => {
                let has_image = node.instance_info.image_source().is_some()
                    || node.instance_info.boot_iso().is_some();
                if data.state == HostState::Deprovisioning && !has_image {
                    debug!(
                        "Node {} has no image information, skipping adoption",
                        node.id
                    );
                    Outcome::Complete
                } else {
                    self.change_provision_action(&node, ProvisionAction::Adopt)
                        .await
                }
            }
            ProvisionState::Adopting => Outcome::Continuing(PROVISION_REQUEUE_DELAY),
            ProvisionState::AdoptFailed if force => {
                self.change_provision_action(&node, ProvisionAction::Adopt)
                    .await
            }
            ProvisionState::AdoptFailed => Outcome::failed(format!(
                "Host adoption failed: {}",
                node.last_error().unwrap_or_default()
            )),
            _ => Outcome::Complete,
        })
    }

    /// Adopt a host that was deployed outside of the provisioner.
    pub async fn adopt(&self, data: &AdoptData, force: bool) -> Outcome {
        finish(self.do_adopt(data, force).await)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::super::fixtures::*;
    use super::*;
    use crate::baremetal::{Port, UpdateOperation};
    use crate::provisioner::data::{Image, PreprovisioningImage};
    use crate::provisioner::ProvisionerConfig;

    fn access_data() -> ManagementAccessData {
        ManagementAccessData {
            boot_mac_address: Some(boot_mac()),
            state: HostState::Registering,
            ..Default::default()
        }
    }

    mod capabilities {
        use super::*;

        #[test]
        fn test_new_node() {
            assert_eq!(
                build_capabilities_value(None, BootMode::Uefi),
                "boot_mode:uefi"
            );
        }

        #[test]
        fn test_replace_boot_mode() {
            let mut node = node(ProvisionState::Manageable);
            let _ = node.properties.insert(
                "capabilities".into(),
                json!("cpu_vt:true,boot_mode:bios,secure_boot:false"),
            );
            assert_eq!(
                build_capabilities_value(Some(&node), BootMode::UefiSecureBoot),
                "cpu_vt:true,boot_mode:uefi,secure_boot:true"
            );
        }
    }

    mod deploy_image {
        use super::*;

        fn kernel_config() -> ProvisionerConfig {
            ProvisionerConfig {
                deploy_kernel_url: Some("http://images/ipa.kernel".into()),
                deploy_ramdisk_url: Some("http://images/ipa.initramfs".into()),
                deploy_iso_url: Some("http://images/ipa.iso".into()),
                ..Default::default()
            }
        }

        #[test]
        fn test_from_config() {
            let client = FakeClient::new();
            let provisioner = provisioner_with(&client, kernel_config(), FakeBmc::default());
            let opts = provisioner.deploy_image_options(None);
            assert_eq!(opts["deploy_kernel"], json!("http://images/ipa.kernel"));
            assert_eq!(opts["deploy_ramdisk"], json!("http://images/ipa.initramfs"));
            assert_eq!(opts["deploy_iso"], Value::Null);

            let bmc = FakeBmc {
                iso: true,
                ..Default::default()
            };
            let provisioner = provisioner_with(&client, kernel_config(), bmc);
            let opts = provisioner.deploy_image_options(None);
            assert_eq!(opts["deploy_iso"], json!("http://images/ipa.iso"));
            assert_eq!(opts["deploy_kernel"], Value::Null);
        }

        #[test]
        fn test_from_builder() {
            let client = FakeClient::new();
            let config = kernel_config().with_preprovisioning_image_builder(true);
            let provisioner = provisioner_with(&client, config, FakeBmc::default());
            assert!(provisioner
                .deploy_image_options(None)
                .values()
                .all(Value::is_null));
            assert_eq!(
                provisioner.preprovisioning_image_formats(),
                vec![ImageFormat::Initrd]
            );

            let image = PreprovisioningImage {
                url: "http://builder/host.initramfs".into(),
                format: ImageFormat::Initrd,
            };
            let opts = provisioner.deploy_image_options(Some(&image));
            assert_eq!(opts["deploy_kernel"], json!("http://images/ipa.kernel"));
            assert_eq!(opts["deploy_ramdisk"], json!("http://builder/host.initramfs"));

            let image = PreprovisioningImage {
                url: "http://builder/host.iso".into(),
                format: ImageFormat::Iso,
            };
            assert!(provisioner
                .deploy_image_options(Some(&image))
                .values()
                .all(Value::is_null));
        }

        #[test]
        fn test_formats_without_builder() {
            let client = FakeClient::new();
            let bmc = FakeBmc {
                iso: true,
                ..Default::default()
            };
            let provisioner = provisioner_with(&client, kernel_config(), bmc.clone());
            assert!(provisioner.preprovisioning_image_formats().is_empty());

            let config = kernel_config().with_preprovisioning_image_builder(true);
            let provisioner = provisioner_with(&client, config, bmc);
            assert_eq!(
                provisioner.preprovisioning_image_formats(),
                vec![ImageFormat::Iso, ImageFormat::Initrd]
            );
        }
    }

    mod register {
        use super::*;

        #[tokio::test]
        async fn test_create_node() {
            let client = FakeClient::new();
            let provisioner = provisioner_without_id(&client);
            let result = provisioner
                .validate_management_access(&access_data(), false, false)
                .await;
            let node_id = result.node_id.clone().unwrap();
            assert!(result.outcome.is_continuing(), "{}", result.outcome);
            assert!(result.mac_conflict.is_none());

            let node = client.node(&node_id).unwrap();
            assert_eq!(node.name(), format!("{NAMESPACE}~{HOST_NAME}"));
            assert_eq!(node.inspect_interface, "inspector");
            assert_eq!(node.driver, "fake-hardware");
            assert_eq!(node.properties["capabilities"], json!("boot_mode:uefi"));
            assert_eq!(node.automated_clean, Some(true));
            assert_eq!(client.ports().len(), 1);
            assert_eq!(
                client.provision_actions(),
                vec![(node_id, ProvisionAction::Manage)]
            );
            assert_eq!(client.events(), vec!["Registered".to_string()]);
        }

        #[tokio::test]
        async fn test_needs_mac() {
            let client = FakeClient::new();
            let bmc = FakeBmc {
                needs_mac: true,
                ..Default::default()
            };
            let provisioner = provisioner_with(&client, Default::default(), bmc);
            let data = ManagementAccessData {
                boot_mac_address: None,
                ..access_data()
            };
            let result = provisioner
                .validate_management_access(&data, false, false)
                .await;
            assert!(result
                .outcome
                .failure()
                .unwrap()
                .contains("requires a BootMACAddress"));
            assert!(client.created_nodes().is_empty());
        }

        #[tokio::test]
        async fn test_secure_boot_unsupported() {
            let client = FakeClient::new();
            let provisioner = provisioner_without_id(&client);
            let data = ManagementAccessData {
                boot_mode: BootMode::UefiSecureBoot,
                ..access_data()
            };
            let result = provisioner
                .validate_management_access(&data, false, false)
                .await;
            assert!(result
                .outcome
                .failure()
                .unwrap()
                .contains("does not support secure boot"));
        }

        #[tokio::test]
        async fn test_mac_conflict_fails() {
            let mut other = node(ProvisionState::Manageable);
            other.name = Some("other~host".into());
            let client = FakeClient::with_node(other);
            client.add_port(Port {
                address: BOOT_MAC.into(),
                id: "port-1".into(),
                node_id: NODE_ID.into(),
            });
            let provisioner = provisioner_without_id(&client);
            let result = provisioner
                .validate_management_access(&access_data(), false, false)
                .await;
            assert!(result
                .outcome
                .failure()
                .unwrap()
                .contains("conflicts with existing node other~host"));
            let conflict = result.mac_conflict.unwrap();
            assert_eq!(conflict.address, BOOT_MAC);
            assert_eq!(conflict.existing_node, "other~host");
            assert!(result.node_id.is_none());
        }

        #[tokio::test]
        async fn test_enroll_with_error() {
            let mut node = node(ProvisionState::Enroll);
            node.last_error = Some("Invalid credentials".into());
            let (client, provisioner) = setup(Some(node));
            let result = provisioner
                .validate_management_access(&access_data(), false, false)
                .await;
            assert_eq!(result.outcome.failure(), Some("Invalid credentials"));
            assert_eq!(result.node_id.as_deref(), Some(NODE_ID));
            assert!(client.provision_actions().is_empty());

            let result = provisioner
                .validate_management_access(&access_data(), true, false)
                .await;
            assert!(result.outcome.is_continuing());
            assert_eq!(client.provision_actions().len(), 1);
        }

        #[tokio::test]
        async fn test_enroll_already_managing() {
            let mut node = node(ProvisionState::Enroll);
            node.target_provision_state = Some(TargetProvisionState::Manageable);
            let (client, provisioner) = setup(Some(node));
            let result = provisioner
                .validate_management_access(&access_data(), false, false)
                .await;
            assert_eq!(result.outcome.requeue_after(), Some(PROVISION_REQUEUE_DELAY));
            assert!(client.provision_actions().is_empty());
        }

        #[tokio::test]
        async fn test_existing_is_idempotent() {
            let (client, provisioner) = setup(Some(node(ProvisionState::Manageable)));
            client.add_port(Port {
                address: BOOT_MAC.into(),
                id: "port-1".into(),
                node_id: NODE_ID.into(),
            });
            let data = ManagementAccessData {
                current_image: Some(Image::new(
                    "http://images/os.qcow2",
                    "abcd",
                    crate::provisioner::ChecksumType::Sha256,
                )),
                ..access_data()
            };
            let result = provisioner
                .validate_management_access(&data, false, false)
                .await;
            assert!(result.outcome.is_complete(), "{}", result.outcome);
            assert_eq!(client.updates().len(), 1);
            let node = client.node(NODE_ID).unwrap();
            assert_eq!(node.instance_id.as_deref(), Some(HOST_UID));
            assert_eq!(
                node.instance_info.image_source().unwrap(),
                "http://images/os.qcow2"
            );

            let result = provisioner
                .validate_management_access(&data, false, false)
                .await;
            assert!(result.outcome.is_complete());
            assert_eq!(client.updates().len(), 1, "second call must not write");
        }

        #[tokio::test]
        async fn test_credentials_changed_rewrites_driver_info() {
            let mut node = node(ProvisionState::Manageable);
            let _ = node
                .driver_info
                .insert("fake_password".into(), json!("******"));
            let (client, provisioner) = setup(Some(node));
            let result = provisioner
                .validate_management_access(&access_data(), true, false)
                .await;
            assert!(result.outcome.is_complete());
            let updates = client.updates();
            assert!(updates[0]
                .iter()
                .any(|u| matches!(u, UpdateOperation::Add { path, .. } if path == "/driver_info")));
            let node = client.node(NODE_ID).unwrap();
            assert_eq!(node.driver_info["fake_password"], json!("secret"));
        }

        #[tokio::test]
        async fn test_missing_deploy_image() {
            let (_, provisioner) = setup(Some(node(ProvisionState::Manageable)));
            let data = ManagementAccessData {
                state: HostState::Inspecting,
                ..access_data()
            };
            let result = provisioner
                .validate_management_access(&data, false, false)
                .await;
            assert_eq!(
                result.outcome.failure(),
                Some("No preprovisioning image available")
            );

            let client = FakeClient::with_node(node(ProvisionState::Manageable));
            let config = ProvisionerConfig::default().with_preprovisioning_image_builder(true);
            let provisioner =
                provisioner_with(&client, config, FakeBmc::default()).with_node_id(NODE_ID);
            let result = provisioner
                .validate_management_access(&data, false, false)
                .await;
            match result.outcome {
                Outcome::Transient(err) => {
                    assert_eq!(err.kind(), ErrorKind::OperationFailed);
                    assert!(err.to_string().contains(NEEDS_PREPROVISIONING_IMAGE));
                }
                other => panic!("unexpected outcome {other}"),
            }
        }
    }

    mod adopt {
        use super::*;

        #[tokio::test]
        async fn test_adopt_manageable() {
            let mut node = node(ProvisionState::Manageable);
            node.instance_info.set_image_source("http://images/os.qcow2");
            let (client, provisioner) = setup(Some(node));
            let outcome = provisioner
                .adopt(&AdoptData::default(), false)
                .await;
            assert!(outcome.is_continuing());
            assert_eq!(
                client.provision_actions(),
                vec![(NODE_ID.to_string(), ProvisionAction::Adopt)]
            );
        }

        #[tokio::test]
        async fn test_skip_adoption_when_deprovisioning() {
            let (client, provisioner) = setup(Some(node(ProvisionState::Manageable)));
            let data = AdoptData {
                state: HostState::Deprovisioning,
            };
            assert!(provisioner.adopt(&data, false).await.is_complete());
            assert!(client.provision_actions().is_empty());
        }

        #[tokio::test]
        async fn test_adopt_failed() {
            let mut node = node(ProvisionState::AdoptFailed);
            node.last_error = Some("no image".into());
            let (client, provisioner) = setup(Some(node));
            let outcome = provisioner.adopt(&AdoptData::default(), false).await;
            assert_eq!(outcome.failure(), Some("Host adoption failed: no image"));
            assert!(provisioner
                .adopt(&AdoptData::default(), true)
                .await
                .is_continuing());
            assert_eq!(client.provision_actions().len(), 1);
        }

        #[tokio::test]
        async fn test_adopt_invalid_state() {
            let (_, provisioner) = setup(Some(node(ProvisionState::Enroll)));
            assert!(matches!(
                provisioner.adopt(&AdoptData::default(), false).await,
                Outcome::Transient(..)
            ));
        }

        #[tokio::test]
        async fn test_adopt_active() {
            let (_, provisioner) = setup(Some(node(ProvisionState::Active)));
            assert!(provisioner
                .adopt(&AdoptData::default(), false)
                .await
                .is_complete());
        }
    }
}
