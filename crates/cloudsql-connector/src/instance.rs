//! Cloud SQL instance connection names.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConnectError, ConnectResult};

/// Parsed instance connection name, a `project:region:instance` triple.
///
/// The joined form is used as the diagnostic prefix in every error message
/// that pertains to the instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceName {
    project_id: String,
    region_id: String,
    instance_id: String,
    connection_name: String,
}

impl InstanceName {
    /// Parse a connection name of the form `project:region:instance`.
    ///
    /// The legacy `project:instance` form is rejected; the region is required
    /// so it can be cross-checked against the instance metadata.
    pub fn parse(name: &str) -> ConnectResult<Self> {
        let parts: Vec<&str> = name.split(':').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(ConnectError::MalformedInstanceName {
                name: name.to_string(),
            });
        }

        Ok(InstanceName {
            project_id: parts[0].to_string(),
            region_id: parts[1].to_string(),
            instance_id: parts[2].to_string(),
            connection_name: name.to_string(),
        })
    }

    /// The project the instance belongs to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The region the instance is expected to run in.
    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// The instance identifier within the project.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// The canonical `project:region:instance` form.
    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connection_name)
    }
}

impl FromStr for InstanceName {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstanceName::parse(s)
    }
}
