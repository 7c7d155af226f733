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

//! Foundation bits exposing the Bare Metal and Bare Metal Introspection APIs.

use osauth::services::BAREMETAL;
use osauth::{ApiVersion, Error, ErrorKind, Session};
use reqwest::Method;

use crate::utils::redacted;
use crate::Result;

use super::constants::*;
use super::introspection::*;
use super::protocol::*;
use super::types::*;

async fn node_api_version(session: &Session) -> Result<ApiVersion> {
    session
        .pick_api_version(
            BAREMETAL,
            vec![
                API_VERSION_MINIMUM,
                API_VERSION_AUTOMATED_CLEAN,
                API_VERSION_PROTECTED,
                API_VERSION_CONDUCTORS,
                API_VERSION_OWNER,
                API_VERSION_DESCRIPTION,
                API_VERSION_ALLOCATIONS,
                API_VERSION_CONFIGDRIVE_DICT,
                API_VERSION_RETIRED,
                API_VERSION_LESSEE,
                API_VERSION_NETWORK_DATA,
                API_VERSION_DEPLOY_STEPS,
                API_VERSION_BIOS_DETAIL,
                API_VERSION_BOOT_MODE,
            ],
        )
        .await?
        .ok_or_else(|| {
            Error::new(
                ErrorKind::IncompatibleApiVersion,
                "BareMetal API version 1.46 (Rocky) or newer is required",
            )
        })
}

/// Get a node.
pub async fn get_node<S: AsRef<str>>(session: &Session, id_or_name: S) -> Result<Node> {
    let api_version = node_api_version(session).await?;
    let root: Node = session
        .get(BAREMETAL, &["nodes", id_or_name.as_ref()])
        .api_version(api_version)
        .fetch()
        .await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// List all nodes, following pagination.
pub async fn list_nodes(session: &Session, query: &NodeListQuery) -> Result<Vec<NodeSummary>> {
    trace!("Listing baremetal nodes with {:?}", query);
    let api_version = node_api_version(session).await?;
    let mut query = query.clone();
    let limit = query.limit.unwrap_or(NODE_LIST_LIMIT);
    query.limit = Some(limit);

    let mut result = Vec::new();
    loop {
        let root: NodesRoot = session
            .get(BAREMETAL, &["nodes"])
            .api_version(api_version)
            .query(&query)
            .fetch()
            .await?;
        let count = root.nodes.len();
        query.marker = root.nodes.last().map(|node| node.id.clone());
        result.extend(root.nodes);
        if count < limit || query.marker.is_none() {
            break;
        }
    }

    trace!("Received {} baremetal nodes", result.len());
    Ok(result)
}

/// Create a node.
pub async fn create_node(session: &Session, request: &NodeCreate) -> Result<Node> {
    if log_enabled!(log::Level::Debug) {
        let body = serde_json::to_value(request).unwrap_or_default();
        debug!("Creating a baremetal node with {}", redacted(&body));
    }
    let api_version = node_api_version(session).await?;
    let node: Node = session
        .post(BAREMETAL, &["nodes"])
        .api_version(api_version)
        .json(request)
        .fetch()
        .await?;
    debug!("Created baremetal node {}", node.id);
    Ok(node)
}

/// Update a node with a JSON patch.
pub async fn update_node<S: AsRef<str>>(
    session: &Session,
    id: S,
    updates: &[UpdateOperation],
) -> Result<Node> {
    debug!("Updating baremetal node {} with {:?}", id.as_ref(), updates);
    let api_version = node_api_version(session).await?;
    let node: Node = session
        .request(BAREMETAL, Method::PATCH, &["nodes", id.as_ref()])
        .api_version(api_version)
        .json(&updates)
        .fetch()
        .await?;
    trace!("Received {:?}", node);
    Ok(node)
}

/// Delete a node.
pub async fn delete_node<S: AsRef<str>>(session: &Session, id: S) -> Result<()> {
    debug!("Deleting baremetal node {}", id.as_ref());
    let api_version = node_api_version(session).await?;
    let _ = session
        .delete(BAREMETAL, &["nodes", id.as_ref()])
        .api_version(api_version)
        .send()
        .await?;
    debug!("Successfully requested deletion of baremetal node {}", id.as_ref());
    Ok(())
}

/// Request a provision state change.
pub async fn set_provision_state<S: AsRef<str>>(
    session: &Session,
    id: S,
    request: &ProvisionStateRequest,
) -> Result<()> {
    debug!(
        "Requesting provision action {} for baremetal node {}",
        request.target,
        id.as_ref()
    );
    trace!("Provision state request {:?}", request);
    let api_version = node_api_version(session).await?;
    if request.deploy_steps.is_some() && api_version < API_VERSION_DEPLOY_STEPS {
        return Err(Error::new(
            ErrorKind::IncompatibleApiVersion,
            "Deploy steps require BareMetal API version 1.69 or newer",
        ));
    }
    let _ = session
        .put(BAREMETAL, &["nodes", id.as_ref(), "states", "provision"])
        .api_version(api_version)
        .json(request)
        .send()
        .await?;
    Ok(())
}

/// Request a power state change.
pub async fn set_power_state<S: AsRef<str>>(
    session: &Session,
    id: S,
    request: &PowerStateRequest,
) -> Result<()> {
    debug!(
        "Requesting power state {} for baremetal node {}",
        request.target,
        id.as_ref()
    );
    let api_version = node_api_version(session).await?;
    let _ = session
        .put(BAREMETAL, &["nodes", id.as_ref(), "states", "power"])
        .api_version(api_version)
        .json(request)
        .send()
        .await?;
    Ok(())
}

/// Set the target RAID configuration.
pub async fn set_raid_config<S: AsRef<str>>(
    session: &Session,
    id: S,
    config: &TargetRaidConfig,
) -> Result<()> {
    debug!(
        "Setting target RAID configuration of baremetal node {} to {:?}",
        id.as_ref(),
        config
    );
    let api_version = node_api_version(session).await?;
    let _ = session
        .put(BAREMETAL, &["nodes", id.as_ref(), "states", "raid"])
        .api_version(api_version)
        .json(config)
        .send()
        .await?;
    Ok(())
}

/// Validate the node's interfaces.
pub async fn validate_node<S: AsRef<str>>(session: &Session, id: S) -> Result<NodeValidation> {
    trace!("Validating baremetal node {}", id.as_ref());
    let api_version = node_api_version(session).await?;
    let result: NodeValidation = session
        .get(BAREMETAL, &["nodes", id.as_ref(), "validate"])
        .api_version(api_version)
        .fetch()
        .await?;
    trace!("Validation result {:?}", result);
    Ok(result)
}

/// List BIOS settings, optionally with their schema.
pub async fn list_bios_settings<S: AsRef<str>>(
    session: &Session,
    id: S,
    detail: bool,
) -> Result<Vec<BiosSetting>> {
    trace!("Listing BIOS settings of baremetal node {}", id.as_ref());
    let api_version = node_api_version(session).await?;
    if detail && api_version < API_VERSION_BIOS_DETAIL {
        return Err(Error::new(
            ErrorKind::IncompatibleApiVersion,
            "BIOS settings schema requires BareMetal API version 1.74 or newer",
        ));
    }
    let root: BiosSettingsRoot = session
        .get(BAREMETAL, &["nodes", id.as_ref(), "bios"])
        .api_version(api_version)
        .query(&[("detail", detail)])
        .fetch()
        .await?;
    trace!("Received BIOS settings {:?}", root.bios);
    Ok(root.bios)
}

/// List ports.
pub async fn list_ports(session: &Session, query: &PortListQuery) -> Result<Vec<Port>> {
    trace!("Listing baremetal ports with {:?}", query);
    let api_version = node_api_version(session).await?;
    let root: PortsRoot = session
        .get(BAREMETAL, &["ports"])
        .api_version(api_version)
        .query(query)
        .fetch()
        .await?;
    trace!("Received baremetal ports: {:?}", root.ports);
    Ok(root.ports)
}

/// Create a port.
pub async fn create_port(session: &Session, request: &PortCreate) -> Result<Port> {
    debug!(
        "Creating a baremetal port {} for node {}",
        request.address, request.node_id
    );
    let api_version = node_api_version(session).await?;
    let port: Port = session
        .post(BAREMETAL, &["ports"])
        .api_version(api_version)
        .json(request)
        .fetch()
        .await?;
    debug!("Created baremetal port {}", port.id);
    Ok(port)
}

/// Create a BMC event subscription through the vendor passthru.
pub async fn create_subscription<S: AsRef<str>>(
    session: &Session,
    id: S,
    request: &SubscriptionCreate,
) -> Result<Subscription> {
    debug!(
        "Creating an event subscription for baremetal node {} to {}",
        id.as_ref(),
        request.destination
    );
    let api_version = node_api_version(session).await?;
    let result: Subscription = session
        .post(BAREMETAL, &["nodes", id.as_ref(), "vendor_passthru"])
        .api_version(api_version)
        .query(&VendorPassthruQuery {
            method: "create_subscription",
        })
        .json(request)
        .fetch()
        .await?;
    debug!("Created event subscription {}", result.id);
    Ok(result)
}

/// Delete a BMC event subscription through the vendor passthru.
pub async fn delete_subscription<S1, S2>(session: &Session, id: S1, subscription: S2) -> Result<()>
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    debug!(
        "Deleting event subscription {} of baremetal node {}",
        subscription.as_ref(),
        id.as_ref()
    );
    let api_version = node_api_version(session).await?;
    let _ = session
        .delete(BAREMETAL, &["nodes", id.as_ref(), "vendor_passthru"])
        .api_version(api_version)
        .query(&VendorPassthruQuery {
            method: "delete_subscription",
        })
        .json(&SubscriptionDelete {
            id: subscription.as_ref(),
        })
        .send()
        .await?;
    Ok(())
}

/// Get the status of introspection.
pub async fn get_introspection_status<S: AsRef<str>>(
    session: &Session,
    id: S,
) -> Result<IntrospectionStatus> {
    trace!("Fetching introspection status of node {}", id.as_ref());
    let status: IntrospectionStatus = session
        .get(BAREMETAL_INTROSPECTION, &["introspection", id.as_ref()])
        .fetch()
        .await?;
    trace!("Received {:?}", status);
    Ok(status)
}

/// Get the data collected by introspection.
pub async fn get_introspection_data<S: AsRef<str>>(
    session: &Session,
    id: S,
) -> Result<IntrospectionData> {
    trace!("Fetching introspection data of node {}", id.as_ref());
    let data: IntrospectionData = session
        .get(BAREMETAL_INTROSPECTION, &["introspection", id.as_ref(), "data"])
        .fetch()
        .await?;
    trace!("Received {:?}", data);
    Ok(data)
}

/// Check that the Bare Metal API answers with a supported version.
pub async fn baremetal_available(session: &Session) -> Result<bool> {
    Ok(session
        .pick_api_version(BAREMETAL, vec![API_VERSION_MINIMUM])
        .await?
        .is_some())
}

/// Check that the Bare Metal Introspection API answers.
pub async fn introspection_available(session: &Session) -> Result<bool> {
    let _ = session
        .get(BAREMETAL_INTROSPECTION, &["introspection"])
        .query(&[("limit", 1)])
        .send()
        .await?;
    Ok(true)
}
