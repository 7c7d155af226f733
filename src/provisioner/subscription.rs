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

//! Redfish event subscriptions through the vendor passthru.

use std::collections::HashMap;

use super::outcome::{Outcome, SUBSCRIPTION_REQUEUE_DELAY};
use super::{Provisioner, NEEDS_REGISTRATION};
use crate::baremetal::SubscriptionCreate;
use crate::{Error, ErrorKind};

/// A requested BMC event subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSubscription {
    /// URL receiving the events.
    pub destination: String,
    /// Opaque context sent with every event.
    pub context: String,
}

impl EventSubscription {
    /// Create a subscription request.
    pub fn new<S1, S2>(destination: S1, context: S2) -> EventSubscription
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        EventSubscription {
            destination: destination.into(),
            context: context.into(),
        }
    }
}

/// Busy nodes are retried, explicit rejections fail, the rest is transient.
fn subscription_failure(err: Error, message: String) -> Outcome {
    match err.kind() {
        ErrorKind::Conflict => {
            info!("Node is busy, retrying after {SUBSCRIPTION_REQUEUE_DELAY:?}: {err}");
            Outcome::Continuing(SUBSCRIPTION_REQUEUE_DELAY)
        }
        ErrorKind::InvalidInput => {
            warn!("{message}");
            Outcome::Failed(message)
        }
        kind => {
            warn!("{message}");
            Outcome::Transient(Error::new(kind, message))
        }
    }
}

impl Provisioner {
    fn registered_node_id(&self) -> Result<&str, Outcome> {
        self.node_id()
            .ok_or_else(|| Outcome::transient(ErrorKind::ResourceNotFound, NEEDS_REGISTRATION))
    }

    /// Subscribe to BMC events, returning the new subscription ID.
    pub async fn add_bmc_event_subscription(
        &self,
        subscription: &EventSubscription,
        http_headers: Vec<HashMap<String, String>>,
    ) -> (Outcome, Option<String>) {
        let node_id = match self.registered_node_id() {
            Ok(node_id) => node_id,
            Err(outcome) => return (outcome, None),
        };
        let request = SubscriptionCreate {
            context: subscription.context.clone(),
            destination: subscription.destination.clone(),
            http_headers,
        };
        match self.client.create_subscription(node_id, &request).await {
            Ok(created) => {
                info!(
                    "Created event subscription {} for node {} to {}",
                    created.id, node_id, subscription.destination
                );
                (Outcome::Complete, Some(created.id))
            }
            Err(err) => {
                let message = format!("could not create subscription: {err}");
                (subscription_failure(err, message), None)
            }
        }
    }

    /// Remove a BMC event subscription.
    pub async fn remove_bmc_event_subscription(&self, subscription_id: &str) -> Outcome {
        let node_id = match self.registered_node_id() {
            Ok(node_id) => node_id,
            Err(outcome) => return outcome,
        };
        match self
            .client
            .delete_subscription(node_id, subscription_id)
            .await
        {
            Ok(()) => {
                info!(
                    "Deleted event subscription {} of node {}",
                    subscription_id, node_id
                );
                Outcome::Complete
            }
            Err(err) => {
                let message = format!("could not delete the subscription {subscription_id}: {err}");
                subscription_failure(err, message)
            }
        }
    }
}
