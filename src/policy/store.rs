//! Shared handle to the active policy set.
//!
//! A policy set is never modified once compiled. Replacing it means compiling
//! a new one from a new configuration and swapping the `Arc` readers clone.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

use super::compile::{compile_config, RuntimePolicySet};
use super::rules::Configuration;
use super::validate::validate_config;
use crate::error::Result;

/// Holds the policy set the serving engine reads from.
pub struct PolicyStore {
    current: RwLock<Arc<RuntimePolicySet>>,
}

impl PolicyStore {
    pub fn new(policy: RuntimePolicySet) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// Get the active policy set.
    ///
    /// The snapshot stays valid even if the store is replaced afterwards.
    pub fn snapshot(&self) -> Arc<RuntimePolicySet> {
        self.current.read().clone()
    }

    /// Install a new policy set, returning the one it replaced.
    pub fn replace(&self, policy: RuntimePolicySet) -> Arc<RuntimePolicySet> {
        let mut current = self.current.write();
        std::mem::replace(&mut *current, Arc::new(policy))
    }

    /// Validate and compile `config`, then install it.
    ///
    /// On error the active policy set is left untouched.
    pub fn apply(&self, config: &Configuration) -> Result<()> {
        let validated = validate_config(config).map_err(|e| {
            error!(error = %e, "Rejected configuration, keeping current policy");
            e
        })?;
        self.replace(compile_config(&validated));
        info!("Policy replaced");
        Ok(())
    }
}
