//! Small shared enums and value types.

use serde::{Deserialize, Deserializer, Serialize};

/// One of the two top-level install groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Taxonomy {
    /// Project-scoped bundles and the plugins they bring in.
    Project,
    /// Standalone plugins and their declared sub-plugins.
    Plugin,
}

impl Taxonomy {
    /// Both taxonomies, in the order lookups search them.
    pub const ALL: [Taxonomy; 2] = [Taxonomy::Project, Taxonomy::Plugin];

    /// Directory (and JSON key) name of this taxonomy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Plugin => "Plugin",
        }
    }

    /// The taxonomy a package of the given type is installed under, if any.
    pub fn for_type(ty: PackageType) -> Option<Self> {
        match ty {
            PackageType::ProjectBundle => Some(Self::Project),
            PackageType::StandalonePlugin => Some(Self::Plugin),
            PackageType::OrdinaryModule => None,
        }
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a package derived from its manifest marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PackageType {
    /// Carries the marker with `isProject` set.
    #[serde(rename = "project")]
    ProjectBundle,
    /// Carries the marker without `isProject`.
    #[serde(rename = "plugin")]
    StandalonePlugin,
    /// No marker at all; not installable through the market.
    #[default]
    #[serde(rename = "module", other)]
    OrdinaryModule,
}

impl PackageType {
    /// Whether this type can be installed through the market.
    pub fn is_installable(self) -> bool {
        self != Self::OrdinaryModule
    }
}

/// Lifecycle state of an installed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    /// Installed and current as far as we know.
    Installed,
    /// Interim marker written by a standalone-plugin install.
    Installing,
    /// A newer acceptable version exists.
    Outdate,
}

impl InstallStatus {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Installing => "installing",
            Self::Outdate => "outdate",
        }
    }
}

impl std::fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installed" => Ok(Self::Installed),
            "installing" => Ok(Self::Installing),
            "outdate" => Ok(Self::Outdate),
            other => Err(format!("unknown install status '{other}'")),
        }
    }
}

/// Reads a status field leniently: empty or unknown strings become `None`
/// so one odd row never invalidates the whole state file.
pub(crate) fn lenient_status<'de, D>(deserializer: D) -> Result<Option<InstallStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// A declared sub-plugin: a name plus the version specification (tag or range).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubPlugin {
    /// Package name of the sub-plugin.
    pub name: String,
    /// Declared version: a distribution tag or a semver range.
    #[serde(default)]
    pub version: String,
}

/// Manifest `author` field, which registries publish either as a plain
/// string or as a person object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    /// `"author": "Jane <jane@example.com>"`
    Plain(String),
    /// `"author": { "name": "Jane", "email": "jane@example.com" }`
    Person {
        /// Display name.
        #[serde(default)]
        name: Option<String>,
        /// Contact email.
        #[serde(default)]
        email: Option<String>,
    },
}

impl Author {
    /// Display form: the person's name, else their email, else the plain string.
    pub fn display(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Person { name, email } => name
                .as_deref()
                .filter(|n| !n.is_empty())
                .or(email.as_deref())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_for_type() {
        assert_eq!(
            Taxonomy::for_type(PackageType::ProjectBundle),
            Some(Taxonomy::Project)
        );
        assert_eq!(
            Taxonomy::for_type(PackageType::StandalonePlugin),
            Some(Taxonomy::Plugin)
        );
        assert_eq!(Taxonomy::for_type(PackageType::OrdinaryModule), None);
    }

    #[test]
    fn test_package_type_unknown_is_module() {
        let ty: PackageType = serde_json::from_str("\"something-else\"").unwrap();
        assert_eq!(ty, PackageType::OrdinaryModule);
    }

    #[test]
    fn test_author_display() {
        let person: Author = serde_json::from_str(r#"{"name":"Jane","email":"j@x.io"}"#).unwrap();
        assert_eq!(person.display(), "Jane");

        let email_only: Author = serde_json::from_str(r#"{"email":"j@x.io"}"#).unwrap();
        assert_eq!(email_only.display(), "j@x.io");

        let plain: Author = serde_json::from_str(r#""Jane <j@x.io>""#).unwrap();
        assert_eq!(plain.display(), "Jane <j@x.io>");
    }
}
