//! Cluster endpoints: candidates awaiting verification and verified targets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Management plane a target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetKind {
    /// Single cluster element manager.
    #[default]
    #[serde(rename = "PE", alias = "Element")]
    Element,
    /// Multi-cluster central manager.
    #[serde(rename = "PC", alias = "Central")]
    Central,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Element => "PE",
            TargetKind::Central => "PC",
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pe" | "element" => Ok(TargetKind::Element),
            "pc" | "central" => Ok(TargetKind::Central),
            other => Err(format!("unknown target kind '{}' (expected PE or PC)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "v2.0")]
    V2,
    #[serde(rename = "v3.0")]
    V3,
    #[serde(rename = "v4.0")]
    V4,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "v2.0",
            ApiVersion::V3 => "v3.0",
            ApiVersion::V4 => "v4.0",
        }
    }

    /// v4.0 endpoints are not yet supported by the query backend.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ApiVersion::V4)
    }
}

impl std::str::FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "v2.0" | "v2" => Ok(ApiVersion::V2),
            "v3.0" | "v3" => Ok(ApiVersion::V3),
            "v4.0" | "v4" => Ok(ApiVersion::V4),
            other => Err(format!("unknown api version '{}'", other)),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Endpoint entered or loaded from a preset, not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: Option<String>,
    pub address: String,
    pub credentials: Credentials,
    pub kind: TargetKind,
    pub api_version: ApiVersion,
}

impl Candidate {
    pub fn new(address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            name: None,
            address: address.into(),
            credentials,
            kind: TargetKind::default(),
            api_version: ApiVersion::default(),
        }
    }

    /// Name used in reports before the service has resolved one.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.address)
    }
}

/// A verified cluster endpoint held in the connection set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTarget {
    pub id: String,
    pub display_name: String,
    pub address: String,
    pub credentials: Credentials,
    pub kind: TargetKind,
    pub api_version: ApiVersion,
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let c = Credentials::new("admin", "s3cret");
        let dbg = format!("{:?}", c);
        assert!(dbg.contains("admin"));
        assert!(!dbg.contains("s3cret"));
    }

    #[test]
    fn test_kind_and_version_wire_names() {
        assert_eq!(serde_json::to_string(&TargetKind::Central).unwrap(), "\"PC\"");
        let kind: TargetKind = serde_json::from_str("\"Element\"").unwrap();
        assert_eq!(kind, TargetKind::Element);
        let v: ApiVersion = serde_json::from_str("\"v4.0\"").unwrap();
        assert!(!v.is_supported());
        assert!(ApiVersion::default().is_supported());
    }

    #[test]
    fn test_candidate_label_falls_back_to_address() {
        let mut c = Candidate::new("10.0.0.5", Credentials::new("a", "b"));
        assert_eq!(c.label(), "10.0.0.5");
        c.name = Some("prod".into());
        assert_eq!(c.label(), "prod");
    }
}
