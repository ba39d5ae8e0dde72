//! Minimal, lossless model of CustomResourceDefinitions and their instances.
//!
//! Only the fields the engine reads are typed. Everything else is kept in the
//! flattened `rest` maps so a backup serializes the full object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CRD_API_VERSION: &str = "apiextensions.k8s.io/v1";
pub const CRD_KIND: &str = "CustomResourceDefinition";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrdNames {
    pub kind: String,
    pub plural: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrdVersion {
    pub name: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrdSpec {
    pub group: String,
    pub names: CrdNames,
    #[serde(default)]
    pub versions: Vec<CrdVersion>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A CustomResourceDefinition as returned by the cluster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdDefinition {
    /// List responses do not always populate this.
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: CrdSpec,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl CrdDefinition {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Force `kind` and `apiVersion` to their canonical values.
    pub fn with_canonical_type(mut self) -> Self {
        self.api_version = CRD_API_VERSION.to_string();
        self.kind = CRD_KIND.to_string();
        self
    }

    /// One resource coordinate per declared version, served or not.
    pub fn resources(&self) -> Vec<GroupVersionResource> {
        self.spec
            .versions
            .iter()
            .map(|version| GroupVersionResource {
                group: self.spec.group.clone(),
                version: version.name.clone(),
                resource: self.spec.names.plural.clone(),
            })
            .collect()
    }
}

/// An instance of a CRD-declared kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResource {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl CustomResource {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Empty for cluster-scoped resources.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}

/// Coordinates used to list the instances of one CRD version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.resource)
    }
}
