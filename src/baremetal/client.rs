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

//! Client of the provisioning service.

use std::fmt::Debug;

use async_trait::async_trait;
use osauth::Session;

use crate::Result;

use super::api;
use super::introspection::{IntrospectionData, IntrospectionStatus};
use super::protocol::*;
use super::types::{NodeListQuery, PortListQuery};

/// Operations of the provisioning service consumed by the provisioner.
///
/// Errors are expected to carry the usual classification: `Conflict` for a
/// locked node, `ResourceNotFound` for missing resources and `InvalidInput`
/// for rejected requests.
#[async_trait]
pub trait ProvisioningClient: Debug + Send + Sync {
    /// Get a node by its ID or name.
    async fn get_node(&self, id_or_name: &str) -> Result<Node>;

    /// Create a node.
    async fn create_node(&self, request: &NodeCreate) -> Result<Node>;

    /// Apply a batch of updates to a node.
    async fn update_node(&self, id: &str, updates: &[UpdateOperation]) -> Result<Node>;

    /// Delete a node.
    async fn delete_node(&self, id: &str) -> Result<()>;

    /// List nodes.
    async fn list_nodes(&self, query: &NodeListQuery) -> Result<Vec<NodeSummary>>;

    /// Request a provision state change.
    async fn set_provision_state(&self, id: &str, request: &ProvisionStateRequest) -> Result<()>;

    /// List ports.
    async fn list_ports(&self, query: &PortListQuery) -> Result<Vec<Port>>;

    /// Create a port.
    async fn create_port(&self, request: &PortCreate) -> Result<Port>;

    /// Validate the node's interfaces.
    async fn validate_node(&self, id: &str) -> Result<NodeValidation>;

    /// Get the status of introspection.
    async fn get_introspection_status(&self, id: &str) -> Result<IntrospectionStatus>;

    /// Get the data collected by introspection.
    async fn get_introspection_data(&self, id: &str) -> Result<IntrospectionData>;

    /// Set the target RAID configuration.
    async fn set_raid_config(&self, id: &str, config: &TargetRaidConfig) -> Result<()>;

    /// List BIOS settings, with the schema if `detail` is true.
    async fn list_bios_settings(&self, id: &str, detail: bool) -> Result<Vec<BiosSetting>>;

    /// Request a power state change.
    async fn set_power_state(&self, id: &str, request: &PowerStateRequest) -> Result<()>;

    /// Create a BMC event subscription.
    async fn create_subscription(
        &self,
        id: &str,
        request: &SubscriptionCreate,
    ) -> Result<Subscription>;

    /// Delete a BMC event subscription.
    async fn delete_subscription(&self, id: &str, subscription_id: &str) -> Result<()>;

    /// Whether the provisioning service answers.
    async fn is_provisioning_ready(&self) -> Result<bool>;

    /// Whether the introspection service answers.
    async fn is_introspection_ready(&self) -> Result<bool>;
}

/// Provisioning client on top of an authenticated session.
#[derive(Debug, Clone)]
pub struct SessionClient {
    session: Session,
}

impl SessionClient {
    /// Create a client from a session.
    pub fn new(session: Session) -> SessionClient {
        SessionClient { session }
    }

    /// Create a client from a `clouds.yaml` entry.
    pub async fn from_config<S: AsRef<str>>(cloud_name: S) -> Result<SessionClient> {
        Ok(SessionClient::new(Session::from_config(cloud_name).await?))
    }

    /// Create a client from the `OS_*` environment variables.
    pub async fn from_env() -> Result<SessionClient> {
        Ok(SessionClient::new(Session::from_env().await?))
    }

    /// Session used by this client.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl From<Session> for SessionClient {
    fn from(value: Session) -> SessionClient {
        SessionClient::new(value)
    }
}

#[async_trait]
impl ProvisioningClient for SessionClient {
    async fn get_node(&self, id_or_name: &str) -> Result<Node> {
        api::get_node(&self.session, id_or_name).await
    }

    async fn create_node(&self, request: &NodeCreate) -> Result<Node> {
        api::create_node(&self.session, request).await
    }

    async fn update_node(&self, id: &str, updates: &[UpdateOperation]) -> Result<Node> {
        api::update_node(&self.session, id, updates).await
    }

    async fn delete_node(&self, id: &str) -> Result<()> {
        api::delete_node(&self.session, id).await
    }

    async fn list_nodes(&self, query: &NodeListQuery) -> Result<Vec<NodeSummary>> {
        api::list_nodes(&self.session, query).await
    }

    async fn set_provision_state(&self, id: &str, request: &ProvisionStateRequest) -> Result<()> {
        api::set_provision_state(&self.session, id, request).await
    }

    async fn list_ports(&self, query: &PortListQuery) -> Result<Vec<Port>> {
        api::list_ports(&self.session, query).await
    }

    async fn create_port(&self, request: &PortCreate) -> Result<Port> {
        api::create_port(&self.session, request).await
    }

    async fn validate_node(&self, id: &str) -> Result<NodeValidation> {
        api::validate_node(&self.session, id).await
    }

    async fn get_introspection_status(&self, id: &str) -> Result<IntrospectionStatus> {
        api::get_introspection_status(&self.session, id).await
    }

    async fn get_introspection_data(&self, id: &str) -> Result<IntrospectionData> {
        api::get_introspection_data(&self.session, id).await
    }

    async fn set_raid_config(&self, id: &str, config: &TargetRaidConfig) -> Result<()> {
        api::set_raid_config(&self.session, id, config).await
    }

    async fn list_bios_settings(&self, id: &str, detail: bool) -> Result<Vec<BiosSetting>> {
        api::list_bios_settings(&self.session, id, detail).await
    }

    async fn set_power_state(&self, id: &str, request: &PowerStateRequest) -> Result<()> {
        api::set_power_state(&self.session, id, request).await
    }

    async fn create_subscription(
        &self,
        id: &str,
        request: &SubscriptionCreate,
    ) -> Result<Subscription> {
        api::create_subscription(&self.session, id, request).await
    }

    async fn delete_subscription(&self, id: &str, subscription_id: &str) -> Result<()> {
        api::delete_subscription(&self.session, id, subscription_id).await
    }

    async fn is_provisioning_ready(&self) -> Result<bool> {
        api::baremetal_available(&self.session).await
    }

    async fn is_introspection_ready(&self) -> Result<bool> {
        api::introspection_available(&self.session).await
    }
}
