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

//! In-memory provisioning service for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use macaddr::MacAddr6;
use serde_json::{json, Map, Value};

use super::bmc::{BiosSettingValue, BmcAccess, BmcCredentials, EventPublisher, NO_RAID_INTERFACE};
use super::data::{FirmwareConfig, HostMeta};
use super::updates::apply_updates;
use super::{Provisioner, ProvisionerConfig};
use crate::baremetal::*;
use crate::{Error, ErrorKind, Result};

pub const NODE_ID: &str = "5b1f7d02-9c3e-4a8b-b0c6-2e4f1a7d9c10";
pub const HOST_NAME: &str = "worker-0";
pub const NAMESPACE: &str = "metal3";
pub const HOST_UID: &str = "0d6b8e51-3f27-4c9a-8e14-7a2b5c9d3e60";
pub const BOOT_MAC: &str = "52:54:00:ab:cd:ef";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn boot_mac() -> MacAddr6 {
    BOOT_MAC.parse().unwrap()
}

/// A node of the test host in the given state.
pub fn node(state: ProvisionState) -> Node {
    Node {
        id: NODE_ID.into(),
        name: Some(format!("{NAMESPACE}~{HOST_NAME}")),
        automated_clean: Some(true),
        driver: "fake-hardware".into(),
        provision_state: state,
        ..Default::default()
    }
}

fn not_found(what: &str, id: &str) -> Error {
    Error::new(ErrorKind::ResourceNotFound, format!("{what} {id} not found"))
}

#[derive(Debug, Clone)]
pub struct FakeBmc {
    pub iso: bool,
    pub needs_mac: bool,
    pub secure_boot: bool,
    pub raid_interface: String,
    pub bios_settings: Vec<(String, String)>,
    pub bios_error: bool,
}

impl Default for FakeBmc {
    fn default() -> FakeBmc {
        FakeBmc {
            iso: false,
            needs_mac: false,
            secure_boot: false,
            raid_interface: NO_RAID_INTERFACE.into(),
            bios_settings: Vec::new(),
            bios_error: false,
        }
    }
}

impl BmcAccess for FakeBmc {
    fn bmc_type(&self) -> &str {
        "fake"
    }

    fn driver(&self) -> &str {
        "fake-hardware"
    }

    fn driver_info(&self, credentials: &BmcCredentials) -> Map<String, Value> {
        let mut result = Map::new();
        let _ = result.insert("fake_address".into(), json!("fake://bmc"));
        let _ = result.insert("fake_username".into(), json!(credentials.username));
        let _ = result.insert("fake_password".into(), json!(credentials.password));
        result
    }

    fn needs_mac(&self) -> bool {
        self.needs_mac
    }

    fn supports_secure_boot(&self) -> bool {
        self.secure_boot
    }

    fn supports_iso_preprovisioning_image(&self) -> bool {
        self.iso
    }

    fn raid_interface(&self) -> &str {
        &self.raid_interface
    }

    fn build_bios_settings(&self, _config: Option<&FirmwareConfig>) -> Result<Vec<BiosSettingValue>> {
        if self.bios_error {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "firmware settings are not supported by the fake BMC",
            ));
        }
        Ok(self
            .bios_settings
            .iter()
            .map(|(name, value)| BiosSettingValue::new(name, value))
            .collect())
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    ports: Vec<Port>,
    counter: usize,
    calls: Vec<String>,
    created: Vec<NodeCreate>,
    updates: Vec<Vec<UpdateOperation>>,
    provision_requests: Vec<(String, ProvisionStateRequest)>,
    power_requests: Vec<(String, PowerStateRequest)>,
    raid_configs: Vec<(String, TargetRaidConfig)>,
    subscriptions: Vec<(String, SubscriptionCreate)>,
    validation: Option<NodeValidation>,
    introspection: Option<(IntrospectionStatus, IntrospectionData)>,
    bios: Vec<BiosSetting>,
    events: Vec<String>,
    update_error: Option<ErrorKind>,
    delete_error: Option<ErrorKind>,
    power_errors: HashMap<TargetPowerState, ErrorKind>,
    subscription_error: Option<ErrorKind>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{}", prefix, self.counter)
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or_else(|| not_found("Node", id))
    }
}

/// Provisioning client backed by memory.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct FakePublisher {
    state: Arc<Mutex<State>>,
}

impl EventPublisher for FakePublisher {
    fn publish(&self, reason: &str, message: &str) {
        debug!("Event {}: {}", reason, message);
        self.state.lock().unwrap().events.push(reason.into());
    }
}

impl FakeClient {
    pub fn new() -> FakeClient {
        init_logging();
        FakeClient::default()
    }

    pub fn with_node(node: Node) -> FakeClient {
        let client = FakeClient::new();
        client.insert_node(node);
        client
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert_node(&self, node: Node) {
        let _ = self.state().nodes.insert(node.id.clone(), node);
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        self.state().nodes.get(id).cloned()
    }

    pub fn add_port(&self, port: Port) {
        self.state().ports.push(port);
    }

    pub fn ports(&self) -> Vec<Port> {
        self.state().ports.clone()
    }

    pub fn created_nodes(&self) -> Vec<NodeCreate> {
        self.state().created.clone()
    }

    /// Nodes requested by ID or name, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn updates(&self) -> Vec<Vec<UpdateOperation>> {
        self.state().updates.clone()
    }

    pub fn provision_requests(&self) -> Vec<(String, ProvisionStateRequest)> {
        self.state().provision_requests.clone()
    }

    pub fn provision_actions(&self) -> Vec<(String, ProvisionAction)> {
        self.state()
            .provision_requests
            .iter()
            .map(|(id, request)| (id.clone(), request.target))
            .collect()
    }

    pub fn power_requests(&self) -> Vec<(String, PowerStateRequest)> {
        self.state().power_requests.clone()
    }

    pub fn raid_configs(&self) -> Vec<(String, TargetRaidConfig)> {
        self.state().raid_configs.clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, SubscriptionCreate)> {
        self.state().subscriptions.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn set_validation(&self, validation: NodeValidation) {
        self.state().validation = Some(validation);
    }

    pub fn set_introspection(&self, status: IntrospectionStatus, data: IntrospectionData) {
        self.state().introspection = Some((status, data));
    }

    pub fn set_bios_settings(&self, settings: Vec<BiosSetting>) {
        self.state().bios = settings;
    }

    pub fn fail_next_update(&self, kind: ErrorKind) {
        self.state().update_error = Some(kind);
    }

    pub fn fail_next_delete(&self, kind: ErrorKind) {
        self.state().delete_error = Some(kind);
    }

    /// Every request for this power state fails from now on.
    pub fn fail_power(&self, target: TargetPowerState, kind: ErrorKind) {
        let _ = self.state().power_errors.insert(target, kind);
    }

    pub fn fail_subscriptions(&self, kind: ErrorKind) {
        self.state().subscription_error = Some(kind);
    }

    fn publisher(&self) -> FakePublisher {
        FakePublisher {
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl ProvisioningClient for FakeClient {
    async fn get_node(&self, id_or_name: &str) -> Result<Node> {
        let mut state = self.state();
        state.calls.push(format!("get_node {id_or_name}"));
        state
            .nodes
            .values()
            .find(|node| node.id == id_or_name || node.name.as_deref() == Some(id_or_name))
            .cloned()
            .ok_or_else(|| not_found("Node", id_or_name))
    }

    async fn create_node(&self, request: &NodeCreate) -> Result<Node> {
        let mut state = self.state();
        let node = Node {
            id: state.next_id("node"),
            name: request.name.clone(),
            driver: request.driver.clone(),
            driver_info: request.driver_info.clone(),
            properties: request.properties.clone(),
            bios_interface: request.bios_interface.clone().unwrap_or_default(),
            boot_interface: request.boot_interface.clone().unwrap_or_default(),
            deploy_interface: request.deploy_interface.clone().unwrap_or_default(),
            inspect_interface: request.inspect_interface.clone().unwrap_or_default(),
            management_interface: request.management_interface.clone().unwrap_or_default(),
            power_interface: request.power_interface.clone().unwrap_or_default(),
            raid_interface: request.raid_interface.clone().unwrap_or_default(),
            vendor_interface: request.vendor_interface.clone().unwrap_or_default(),
            provision_state: ProvisionState::Enroll,
            ..Default::default()
        };
        state.created.push(request.clone());
        let _ = state.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn update_node(&self, id: &str, updates: &[UpdateOperation]) -> Result<Node> {
        let mut state = self.state();
        if let Some(kind) = state.update_error.take() {
            return Err(Error::new(kind, "update failed"));
        }
        let node = state.node_mut(id)?;
        let updated = apply_updates(node, updates)?;
        *node = updated.clone();
        state.updates.push(updates.to_vec());
        Ok(updated)
    }

    async fn delete_node(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(kind) = state.delete_error.take() {
            return Err(Error::new(kind, "delete failed"));
        }
        state
            .nodes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("Node", id))
    }

    async fn list_nodes(&self, _query: &NodeListQuery) -> Result<Vec<NodeSummary>> {
        Ok(self
            .state()
            .nodes
            .values()
            .map(|node| NodeSummary {
                id: node.id.clone(),
                name: node.name.clone(),
                provision_state: node.provision_state,
                target_provision_state: node.target_provision_state,
            })
            .collect())
    }

    async fn set_provision_state(&self, id: &str, request: &ProvisionStateRequest) -> Result<()> {
        let mut state = self.state();
        let _ = state.node_mut(id)?;
        state
            .provision_requests
            .push((id.to_string(), request.clone()));
        Ok(())
    }

    async fn list_ports(&self, query: &PortListQuery) -> Result<Vec<Port>> {
        Ok(self
            .state()
            .ports
            .iter()
            .filter(|port| query.address.as_ref().map_or(true, |a| *a == port.address))
            .filter(|port| query.node_id.as_ref().map_or(true, |n| *n == port.node_id))
            .cloned()
            .collect())
    }

    async fn create_port(&self, request: &PortCreate) -> Result<Port> {
        let mut state = self.state();
        let port = Port {
            address: request.address.clone(),
            id: state.next_id("port"),
            node_id: request.node_id.clone(),
        };
        state.ports.push(port.clone());
        Ok(port)
    }

    async fn validate_node(&self, id: &str) -> Result<NodeValidation> {
        let mut state = self.state();
        let _ = state.node_mut(id)?;
        let passed = InterfaceValidation {
            result: Some(true),
            reason: None,
        };
        Ok(state.validation.clone().unwrap_or(NodeValidation {
            boot: passed.clone(),
            deploy: passed,
        }))
    }

    async fn get_introspection_status(&self, id: &str) -> Result<IntrospectionStatus> {
        self.state()
            .introspection
            .as_ref()
            .map(|(status, _)| status.clone())
            .ok_or_else(|| not_found("Introspection", id))
    }

    async fn get_introspection_data(&self, id: &str) -> Result<IntrospectionData> {
        self.state()
            .introspection
            .as_ref()
            .map(|(_, data)| data.clone())
            .ok_or_else(|| not_found("Introspection data", id))
    }

    async fn set_raid_config(&self, id: &str, config: &TargetRaidConfig) -> Result<()> {
        let mut state = self.state();
        let _ = state.node_mut(id)?;
        state.raid_configs.push((id.to_string(), config.clone()));
        Ok(())
    }

    async fn list_bios_settings(&self, id: &str, _detail: bool) -> Result<Vec<BiosSetting>> {
        let mut state = self.state();
        let _ = state.node_mut(id)?;
        Ok(state.bios.clone())
    }

    async fn set_power_state(&self, id: &str, request: &PowerStateRequest) -> Result<()> {
        let mut state = self.state();
        let _ = state.node_mut(id)?;
        state.power_requests.push((id.to_string(), request.clone()));
        match state.power_errors.get(&request.target) {
            Some(kind) => Err(Error::new(*kind, "power request failed")),
            None => Ok(()),
        }
    }

    async fn create_subscription(
        &self,
        id: &str,
        request: &SubscriptionCreate,
    ) -> Result<Subscription> {
        let mut state = self.state();
        if let Some(kind) = state.subscription_error {
            return Err(Error::new(kind, "subscription failed"));
        }
        let _ = state.node_mut(id)?;
        let subscription_id = state.next_id("subscription");
        state
            .subscriptions
            .push((subscription_id.clone(), request.clone()));
        Ok(Subscription {
            context: Some(request.context.clone()),
            destination: Some(request.destination.clone()),
            id: subscription_id,
        })
    }

    async fn delete_subscription(&self, _id: &str, subscription_id: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(kind) = state.subscription_error {
            return Err(Error::new(kind, "subscription failed"));
        }
        let index = state
            .subscriptions
            .iter()
            .position(|(id, _)| id == subscription_id)
            .ok_or_else(|| not_found("Subscription", subscription_id))?;
        let _ = state.subscriptions.remove(index);
        Ok(())
    }

    async fn is_provisioning_ready(&self) -> Result<bool> {
        Ok(true)
    }

    async fn is_introspection_ready(&self) -> Result<bool> {
        Ok(true)
    }
}

/// A provisioner for the test host, without a known node ID.
pub fn provisioner_without_id(client: &FakeClient) -> Provisioner {
    provisioner_with(client, ProvisionerConfig::default(), FakeBmc::default())
}

pub fn provisioner_with(client: &FakeClient, config: ProvisionerConfig, bmc: FakeBmc) -> Provisioner {
    Provisioner::new(
        config,
        HostMeta::new(NAMESPACE, HOST_NAME, HOST_UID),
        Arc::new(client.clone()),
        Arc::new(bmc),
        Arc::new(client.publisher()),
    )
    .with_credentials(BmcCredentials::new("admin", "secret"))
}

/// A client with an optional node and a provisioner that knows its ID.
pub fn setup(node: Option<Node>) -> (FakeClient, Provisioner) {
    let client = match node {
        Some(node) => FakeClient::with_node(node),
        None => FakeClient::new(),
    };
    let provisioner = provisioner_without_id(&client).with_node_id(NODE_ID);
    (client, provisioner)
}
