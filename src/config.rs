//! Configuration manager for autha-ldap.
//!
//! The host hands the plugin a JSON payload (or a file path) shaped like:
//!
//! ```json
//! {
//!   "authentication": {
//!     "type": "ldap",
//!     "ldap": {
//!       "baseURL": "ldap://ldap.example.com:389",
//!       "baseDN": "ou=people,dc=example,dc=com",
//!       "idAttribute": "uid",
//!       "roleMap": { "cn=admins,dc=example,dc=com": ["admin"] }
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use ldap3::{dn_escape, ldap_escape};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_ROLE_ATTRIBUTE: &str = "objectClass";
const SCHEMES: [&str; 3] = ["ldap", "ldaps", "ldapi"];

/// Root of the configuration payload.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub authentication: Authentication,
}

/// `authentication` section.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    /// Plugin identifier selected by the host, `ldap` for this crate.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Related to LDAP configuration.
    pub ldap: Option<Ldap>,
}

/// `authentication.ldap` section, as written by operators.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ldap {
    /// URL of the directory, e.g. `ldap://ldap.example.com:389`.
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    /// DN every user lives under.
    #[serde(rename = "baseDN")]
    pub base_dn: Option<String>,
    /// Attribute holding the login name, e.g. `uid`.
    pub id_attribute: Option<String>,
    /// Attribute holding role tokens. Defaults to `objectClass`.
    #[serde(alias = "ldapRoleAttribute")]
    pub role_attribute: Option<String>,
    /// Service account DN used for searches.
    #[serde(alias = "ldapSecurityPrincipal")]
    pub security_principal: Option<String>,
    #[serde(alias = "ldapSecurityCredentials", skip_serializing)]
    pub security_credentials: Option<String>,
    #[serde(default)]
    pub filter_prefix: String,
    #[serde(default)]
    pub filter_suffix: String,
    /// Raw directory token to application roles.
    #[serde(default)]
    pub role_map: HashMap<String, Vec<String>>,
}

impl Configuration {
    /// Parse a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Read a configuration file. `.yaml` and `.yml` files are read as YAML,
    /// everything else as JSON.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_reader(file)?),
            _ => Ok(serde_json::from_reader(file)?),
        }
    }

    /// Validate the `ldap` section and split it into its immutable parts.
    pub fn build(&self) -> Result<(DirectoryConfig, RoleMapping)> {
        let ldap = self
            .authentication
            .ldap
            .as_ref()
            .ok_or(ConfigError::Missing("authentication.ldap"))?;

        let mut config = DirectoryConfig::new(
            ldap.base_url.as_deref().unwrap_or_default(),
            ldap.base_dn.as_deref().unwrap_or_default(),
            ldap.id_attribute.as_deref().unwrap_or_default(),
        )?
        .with_filter_affixes(&ldap.filter_prefix, &ldap.filter_suffix);

        if let Some(attribute) = &ldap.role_attribute {
            config = config.with_role_attribute(attribute)?;
        }

        match (&ldap.security_principal, &ldap.security_credentials) {
            (Some(principal), credential) if !principal.is_empty() => {
                config = config.with_service_account(
                    principal,
                    credential.as_deref().unwrap_or_default(),
                )?;
            },
            _ => {},
        }

        Ok((config, RoleMapping::from(ldap.role_map.clone())))
    }
}

/// Service account used for searches.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub principal: String,
    pub credential: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("principal", &self.principal)
            .field("credential", &"***")
            .finish()
    }
}

/// Validated directory settings, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    base_url: String,
    base_dn: String,
    id_attribute: String,
    role_attribute: String,
    service_account: Option<ServiceAccount>,
    filter_prefix: String,
    filter_suffix: String,
}

impl DirectoryConfig {
    /// Create a new [`DirectoryConfig`] with anonymous searches and no
    /// filter affixes.
    pub fn new(
        base_url: impl Into<String>,
        base_dn: impl Into<String>,
        id_attribute: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let base_dn = base_dn.into();
        let id_attribute = id_attribute.into();

        if base_url.trim().is_empty() {
            return Err(ConfigError::Missing("baseURL"));
        }
        if base_dn.trim().is_empty() {
            return Err(ConfigError::Missing("baseDN"));
        }
        if id_attribute.trim().is_empty() {
            return Err(ConfigError::Missing("idAttribute"));
        }

        let url = Url::parse(&base_url)?;
        if !SCHEMES.contains(&url.scheme()) {
            return Err(ConfigError::Scheme(url.scheme().to_owned()));
        }

        Ok(Self {
            base_url,
            base_dn,
            id_attribute,
            role_attribute: DEFAULT_ROLE_ATTRIBUTE.to_owned(),
            service_account: None,
            filter_prefix: String::default(),
            filter_suffix: String::default(),
        })
    }

    /// Search as `principal` instead of anonymously.
    pub fn with_service_account(
        mut self,
        principal: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<Self> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }

        self.service_account = Some(ServiceAccount {
            principal: principal.into(),
            credential,
        });
        Ok(self)
    }

    /// Wrap the id clause of every search filter.
    pub fn with_filter_affixes(
        mut self,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        self.filter_prefix = prefix.into();
        self.filter_suffix = suffix.into();
        self
    }

    /// Change the attribute holding role tokens.
    pub fn with_role_attribute(
        mut self,
        attribute: impl Into<String>,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if attribute.trim().is_empty() {
            return Err(ConfigError::Missing("roleAttribute"));
        }

        self.role_attribute = attribute;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn role_attribute(&self) -> &str {
        &self.role_attribute
    }

    pub fn service_account(&self) -> Option<&ServiceAccount> {
        self.service_account.as_ref()
    }

    /// Conventional DN of a user, `idAttribute=username,baseDN`.
    pub fn user_dn(&self, username: &str) -> String {
        format!(
            "{}={},{}",
            self.id_attribute,
            dn_escape(username),
            self.base_dn
        )
    }

    /// Filter selecting a user by its login name.
    pub fn user_filter(&self, username: &str) -> String {
        format!(
            "({}{}={}{})",
            self.filter_prefix,
            self.id_attribute,
            ldap_escape(username),
            self.filter_suffix
        )
    }
}

/// Raw directory token to application role names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoleMapping(HashMap<String, Vec<String>>);

impl RoleMapping {
    /// Roles granted by `token`, if it is mapped.
    pub fn roles(&self, token: &str) -> Option<&[String]> {
        self.0.get(token).map(Vec::as_slice)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains_key(token)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for RoleMapping {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl<K, R> FromIterator<(K, Vec<R>)> for RoleMapping
where
    K: Into<String>,
    R: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<R>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(token, roles)| {
                    (token.into(), roles.into_iter().map(Into::into).collect())
                })
                .collect(),
        )
    }
}
