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

//! Outcome of a reconciliation step.

use std::fmt;
use std::time::Duration;

use crate::{Error, ErrorKind};

/// Delay before checking a provisioning or deprovisioning action again.
pub const PROVISION_REQUEUE_DELAY: Duration = Duration::from_secs(10);
/// Delay before checking a power action again.
pub const POWER_REQUEUE_DELAY: Duration = Duration::from_secs(10);
/// Delay before retrying a subscription action.
pub const SUBSCRIPTION_REQUEUE_DELAY: Duration = Duration::from_secs(10);
/// Delay before checking introspection again.
pub const INTROSPECTION_REQUEUE_DELAY: Duration = Duration::from_secs(15);
/// Timeout of a soft power off.
pub const SOFT_POWER_OFF_TIMEOUT: Duration = Duration::from_secs(180);

/// Result of one reconciliation step.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing left to do.
    Complete,
    /// An action is in progress, call again after the delay.
    Continuing(Duration),
    /// The operation failed and will not succeed without a configuration change.
    Failed(String),
    /// An infrastructure error, retry with a back-off.
    Transient(Error),
}

impl Outcome {
    /// Failure with a message.
    pub fn failed<S: Into<String>>(message: S) -> Outcome {
        Outcome::Failed(message.into())
    }

    /// Transient error of the given kind.
    pub fn transient<S: Into<String>>(kind: ErrorKind, message: S) -> Outcome {
        Outcome::Transient(Error::new(kind, message))
    }

    /// Whether the operation is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete)
    }

    /// Whether the caller should call again (the state is dirty).
    #[inline]
    pub fn is_continuing(&self) -> bool {
        matches!(self, Outcome::Continuing(..))
    }

    /// Error message of a failed operation.
    pub fn failure(&self) -> Option<&str> {
        match self {
            Outcome::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// Delay before the next call, if one is required.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Outcome::Continuing(delay) => Some(*delay),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Complete => f.write_str("complete"),
            Outcome::Continuing(delay) => write!(f, "continuing (retry after {delay:?})"),
            Outcome::Failed(msg) => write!(f, "failed: {msg}"),
            Outcome::Transient(err) => write!(f, "transient error: {err}"),
        }
    }
}

/// A locked node is expected under concurrent access and is retried.
impl From<Error> for Outcome {
    fn from(value: Error) -> Outcome {
        if value.kind() == ErrorKind::Conflict {
            info!("Node is busy, retrying after {PROVISION_REQUEUE_DELAY:?}: {value}");
            Outcome::Continuing(PROVISION_REQUEUE_DELAY)
        } else {
            Outcome::Transient(value)
        }
    }
}

/// Intermediate result of a step: either a value or the final outcome.
pub(crate) type Step<T> = ::std::result::Result<T, Outcome>;

/// Collapse a step into its outcome.
pub(crate) fn finish(step: Step<Outcome>) -> Outcome {
    match step {
        Ok(outcome) | Err(outcome) => outcome,
    }
}
