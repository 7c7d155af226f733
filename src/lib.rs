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

//! Bare metal host provisioning on top of OpenStack Ironic.
//!
//! The crate drives a single bare metal machine through its lifecycle:
//! registration, hardware inspection, cleaning and RAID configuration,
//! image deployment, power control and removal. Every call is one
//! non-blocking reconciliation step: the current node is read from
//! Ironic, compared with the desired configuration, and at most one
//! transition is requested. The result of each step is an [`Outcome`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ironic_provisioner::baremetal::SessionClient;
//! use ironic_provisioner::provisioner::{HostMeta, LogPublisher, ProvisionerConfig};
//! # use ironic_provisioner::provisioner::BmcAccess;
//!
//! # async fn example(bmc: Arc<dyn BmcAccess>) -> ironic_provisioner::Result<()> {
//! let session = osauth::Session::from_env().await?;
//! let client = Arc::new(SessionClient::new(session));
//! let provisioner = ironic_provisioner::Provisioner::new(
//!     ProvisionerConfig::from_env()?,
//!     HostMeta::new("metal3", "worker-0", "6b8c0a2e-d2d9-4c5a-8d1f-0a5b2e1c3f4d"),
//!     client,
//!     bmc,
//!     Arc::new(LogPublisher),
//! );
//! let outcome = provisioner.power_on(false).await;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! * [`baremetal`] contains the Ironic wire types and the client seam.
//! * [`provisioner`] contains the reconciliation engine.

#![crate_name = "ironic_provisioner"]
#![crate_type = "lib"]
#![warn(missing_docs, missing_debug_implementations)]
#![deny(
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unsafe_code,
    unused_allocation,
    unused_comparisons,
    while_true
)]

#[macro_use]
extern crate log;

#[macro_use]
mod macros;

pub mod baremetal;
pub mod provisioner;
mod utils;

pub use osauth::{Error, ErrorKind};

/// Result of a provisioning call.
pub type Result<T> = ::std::result::Result<T, Error>;

pub use provisioner::{Outcome, Provisioner};
