//! Registry wire format.
//!
//! A registry serves two documents per package: the search listing
//! (`{ "packages": [{ "name": ... }] }`) and the full package document
//! (`{ "versions": { "<ver>": <manifest> }, "dist-tags": { "<tag>": "<ver>" } }`).
//! Installed packages carry the same manifest on disk as `package.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Author, SubPlugin};

/// The market marker object a manifest carries under its `cygnus` key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketMeta {
    /// Set for project bundles.
    pub is_project: bool,
    /// Display name override.
    pub cname: Option<String>,
    /// Presentation metadata.
    pub description: MetaDescription,
    /// Declared sub-plugins (name + version spec).
    pub plugins: Vec<SubPlugin>,
    /// The host should not offer an uninstall action.
    pub disable_uninstall: bool,
}

/// Presentation block inside [`MarketMeta`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaDescription {
    /// Display name.
    pub cname: Option<String>,
    /// Fallback display name.
    pub name: Option<String>,
    /// Icon shown in search results.
    pub icon_for_search: Option<String>,
    /// Homepage or documentation link.
    pub link: Option<String>,
}

/// One version's manifest (`package.json`).
///
/// The trailing optional fields are only present on manifests that have
/// already been through an install and carry local bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    /// Package name.
    pub name: String,
    /// Published version, or the requested specification on installed records.
    pub version: String,
    /// One-line summary.
    pub description: Option<String>,
    /// Author as a plain string or an object.
    pub author: Option<Author>,
    /// Runtime dependencies (name to version range). `null` reads as empty.
    #[serde(deserialize_with = "null_as_empty")]
    pub dependencies: BTreeMap<String, String>,
    /// Long-form readme text.
    pub readme: Option<String>,
    /// Market marker; absent on ordinary modules.
    #[serde(rename = "cygnus", skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketMeta>,

    /// Version actually installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aversion: Option<String>,
    /// Install lifecycle status.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::types::lenient_status"
    )]
    pub status: Option<crate::InstallStatus>,
    /// Newest version seen by the last reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// On-disk location of the installed manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Full registry document for one package.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Package name.
    #[serde(default)]
    pub name: String,
    /// Every published version in registry order.
    #[serde(default, with = "ordered_versions")]
    pub versions: Vec<(String, Manifest)>,
    /// Distribution tags (`latest`, `beta`, ...).
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
}

impl RegistryDocument {
    /// Manifest of an exact published version.
    pub fn version(&self, version: &str) -> Option<&Manifest> {
        self.versions
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, m)| m)
    }

    /// Manifest the `latest` tag points at.
    pub fn latest(&self) -> Option<&Manifest> {
        self.dist_tags.get("latest").and_then(|v| self.version(v))
    }

    /// Resolve a version request: an exact version, then a tag of that name,
    /// then `latest`.
    pub fn resolve(&self, request: &str) -> Option<&Manifest> {
        self.version(request)
            .or_else(|| self.dist_tags.get(request).and_then(|v| self.version(v)))
            .or_else(|| self.latest())
    }

    /// Version strings in registry order.
    pub fn version_list(&self) -> Vec<String> {
        self.versions.iter().map(|(v, _)| v.clone()).collect()
    }
}

/// One row of a keyword search listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSummary {
    /// Package name.
    pub name: String,
    /// One-line summary, if the registry sent one.
    pub description: Option<String>,
    /// Latest version, if the registry sent one.
    pub version: Option<String>,
}

/// Keyword search response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    /// Matching packages in registry order.
    pub packages: Vec<PackageSummary>,
}

/// Allow-list row; only the name is significant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListEntry {
    /// Allowed package name.
    pub name: String,
}

/// Serde adapter that keeps a JSON object's key order by reading it into a
/// list of pairs.
///
/// Each version is typed on its own. A version whose manifest does not fit
/// [`Manifest`] keeps its slot as a bare manifest (name and version only) so
/// one malformed historical release cannot hide the whole package.
mod ordered_versions {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use super::Manifest;

    pub(super) fn serialize<S>(pairs: &[(String, Manifest)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Manifest)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, Manifest)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of version to manifest")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    let manifest = typed(&k, v);
                    pairs.push((k, manifest));
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }

    fn typed(version: &str, raw: Value) -> Manifest {
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match Manifest::deserialize(raw) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!("Skipping malformed manifest for {name}@{version}: {e}");
                Manifest {
                    name,
                    version: version.to_string(),
                    ..Manifest::default()
                }
            }
        }
    }
}
