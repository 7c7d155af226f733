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

//! Finding the node of a host and counting busy hosts.

use std::error;
use std::fmt;

use macaddr::MacAddr6;

use super::data::NAME_SEPARATOR;
use super::outcome::Outcome;
use super::Provisioner;
use crate::baremetal::{Node, NodeListQuery, PortListQuery};
use crate::utils::ResultExt;
use crate::{Error, ErrorKind, Result};

/// The boot MAC address belongs to a node of another host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAddressConflict {
    /// The MAC address.
    pub address: String,
    /// Name of the node owning the address.
    pub existing_node: String,
}

impl fmt::Display for MacAddressConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAC address {} conflicts with existing node {}",
            self.address, self.existing_node
        )
    }
}

impl error::Error for MacAddressConflict {}

/// Failure to find the node of a host.
#[derive(Debug)]
pub enum LookupError {
    /// The boot MAC address is claimed by another host.
    MacAddressConflict(MacAddressConflict),
    /// The provisioning service failed.
    Service(Error),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::MacAddressConflict(err) => fmt::Display::fmt(err, f),
            LookupError::Service(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl error::Error for LookupError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LookupError::MacAddressConflict(err) => Some(err),
            LookupError::Service(err) => Some(err),
        }
    }
}

impl From<Error> for LookupError {
    fn from(value: Error) -> LookupError {
        LookupError::Service(value)
    }
}

/// A MAC address conflict requires a configuration change.
impl From<LookupError> for Outcome {
    fn from(value: LookupError) -> Outcome {
        match value {
            LookupError::MacAddressConflict(err) => Outcome::Failed(err.to_string()),
            LookupError::Service(err) => Outcome::Transient(err),
        }
    }
}

const BUSY_NODE_FIELDS: &[&str] = &["uuid", "name", "provision_state", "target_provision_state"];

impl Provisioner {
    async fn get_node_if_exists(&self, id_or_name: &str) -> Result<Option<Node>> {
        match self.client.get_node(id_or_name).await {
            Ok(node) => Ok(Some(node)),
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn find_node_by_mac(&self, address: &MacAddr6) -> Result<Option<Node>> {
        let address = address.to_string().to_lowercase();
        let ports = match self
            .client
            .list_ports(&PortListQuery::by_address(address.clone()))
            .await
        {
            Ok(ports) => ports,
            Err(err) => {
                warn!("Cannot list ports with address {}: {}", address, err);
                return Ok(None);
            }
        };

        let port = match ports.into_iter().next() {
            Some(port) => port,
            None => return Ok(None),
        };
        debug!("Found port {} with address {}", port.id, address);

        match self.client.get_node(&port.node_id).await {
            Ok(node) => Ok(Some(node)),
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => Err(Error::new(
                ErrorKind::ResourceNotFound,
                format!(
                    "Port {} with address {} exists but its node {} does not",
                    port.id, address, port.node_id
                ),
            )),
            Err(err) => Err(err),
        }
    }

    /// Find the node of this host.
    ///
    /// Searches by the stored node ID, then by name and then by the boot
    /// MAC address.
    pub async fn find_existing_node(
        &self,
        boot_mac_address: Option<&MacAddr6>,
    ) -> ::std::result::Result<Option<Node>, LookupError> {
        if let Some(ref node_id) = self.node_id {
            if let Some(node) = self
                .get_node_if_exists(node_id)
                .await
                .context("Cannot find node by ID")?
            {
                return Ok(Some(node));
            }
            debug!("Node {} not found, searching by name", node_id);
        }

        let mut names = vec![self.meta.node_name()];
        if !self.meta.name.contains(NAME_SEPARATOR) {
            names.push(self.meta.name.clone());
        }
        for name in names {
            if let Some(node) = self
                .get_node_if_exists(&name)
                .await
                .context("Cannot find node by name")?
            {
                debug!("Found node {} by name {}", node.id, name);
                return Ok(Some(node));
            }
        }

        if let Some(address) = boot_mac_address {
            if let Some(node) = self.find_node_by_mac(address).await? {
                if !node.name().is_empty() {
                    return Err(LookupError::MacAddressConflict(MacAddressConflict {
                        address: address.to_string().to_lowercase(),
                        existing_node: node.name().into(),
                    }));
                }
                debug!("Found node {} by boot MAC {}", node.id, address);
                return Ok(Some(node));
            }
        }

        Ok(None)
    }

    /// Names of the busy nodes, unnamed nodes included.
    async fn busy_hosts(&self) -> Result<Vec<Option<String>>> {
        let query = NodeListQuery::default().with_fields(BUSY_NODE_FIELDS.iter().copied());
        let nodes = self.client.list_nodes(&query).await?;
        Ok(nodes
            .into_iter()
            .filter(|node| node.provision_state.is_busy())
            .map(|node| node.name)
            .collect())
    }

    /// Whether a new long-running action can be started for this host.
    ///
    /// A host that is already busy always has capacity.
    pub async fn has_capacity(&self) -> Result<bool> {
        let busy = self.busy_hosts().await?;
        let node_name = self.meta.node_name();
        if busy.iter().any(|name| name.as_deref() == Some(node_name.as_str())) {
            debug!("Host {} is already busy", node_name);
            return Ok(true);
        }
        let result = busy.len() < self.config.max_busy_hosts;
        if !result {
            info!(
                "{} hosts are busy, the limit is {}",
                busy.len(),
                self.config.max_busy_hosts
            );
        }
        Ok(result)
    }
}
