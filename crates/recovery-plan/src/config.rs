//! Configuration loading
//!
//! A configuration is the set of plans to run against one device, in order.
//! Files are JSON or YAML with the same shape; every field is optional.

use crate::error::{ConfigError, MissingExec};
use crate::types::Plan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Name of the plan that always runs last
pub const CLOSE_PLAN: &str = "close";

/// Serialization format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON document
    Json,
    /// YAML document
    Yaml,
}

impl ConfigFormat {
    /// Derive the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Plans to run against a device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Plans to run, in order
    pub plan_names: Vec<String>,
    /// Plan definitions by name
    pub plans: HashMap<String, Plan>,
}

impl Configuration {
    /// Parse a configuration document
    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(text)?,
            ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        };
        tracing::debug!(
            plans = config.plans.len(),
            listed = config.plan_names.len(),
            "Parsed configuration"
        );
        Ok(config)
    }

    /// Read, parse and normalize a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&text, format)?;
        config.normalize();
        config.check_plan_names()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fill in defaults that depend on the action name.
    ///
    /// An action without an exec name runs the exec named after the action.
    pub fn normalize(&mut self) {
        for plan in self.plans.values_mut() {
            for (name, action) in &mut plan.actions {
                if action.exec_name.is_empty() {
                    action.exec_name.clone_from(name);
                }
            }
        }
    }

    /// Every name in `plan_names` must be defined
    pub fn check_plan_names(&self) -> Result<(), ConfigError> {
        match self.plan_names.iter().find(|n| !self.plans.contains_key(*n)) {
            Some(missing) => Err(ConfigError::UnknownPlan(missing.clone())),
            None => Ok(()),
        }
    }

    /// Report every action bound to an exec for which `known` is false
    pub fn check_execs<F>(&self, known: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> bool,
    {
        let known = &known;
        let mut missing: Vec<MissingExec> = self
            .plans
            .iter()
            .flat_map(|(plan_name, plan)| {
                plan.actions.iter().filter_map(move |(name, action)| {
                    (!known(&action.exec_name)).then(|| MissingExec {
                        plan: plan_name.clone(),
                        action: name.clone(),
                        exec: action.exec_name.clone(),
                    })
                })
            })
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_by(|a, b| (&a.plan, &a.action).cmp(&(&b.plan, &b.action)));
        Err(ConfigError::UnknownExecs(missing))
    }

    /// Listed plans in execution order
    pub fn plans_in_order(&self) -> impl Iterator<Item = (&str, &Plan)> {
        self.plan_names
            .iter()
            .filter_map(|name| self.plans.get(name).map(|p| (name.as_str(), p)))
    }
}
