//! Authentication plugin surface expected by the host.
//!
//! The directory is read-only: every user management operation fails with
//! an [`UnsupportedOperation`], whatever its input.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::{Configuration, DirectoryConfig, RoleMapping};
use crate::error::{AuthenticationError, Result, UnsupportedOperation};
use crate::handler::AuthenticationHandler;
use crate::ldap::{Directory, LdapClient};
use crate::resolver::AttributeResolver;
use crate::roles::RoleMapper;
use crate::user::User;

pub const ID: &str = "ldap";
pub const NAME: &str = "LDAP Authentication";
const DISPLAY_NAME_ATTRIBUTE: &str = "cn";

/// New value of a user property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// LDAP authentication plugin.
#[derive(Debug)]
pub struct LdapAuthentication<D = LdapClient> {
    config: Arc<DirectoryConfig>,
    handler: AuthenticationHandler<D>,
    resolver: AttributeResolver<D>,
    roles: RoleMapper<D>,
}

impl LdapAuthentication<LdapClient> {
    /// Build the plugin from a JSON payload.
    pub fn init(payload: &str) -> Result<Self> {
        Self::from_configuration(&Configuration::from_json(payload)?)
    }

    /// Build the plugin from a JSON or YAML file.
    pub fn init_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_configuration(&Configuration::read(path)?)
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self> {
        let (config, mapping) = configuration.build()?;
        let config = Arc::new(config);
        let client = LdapClient::new(Arc::clone(&config));

        info!(
            url = config.base_url(),
            base_dn = config.base_dn(),
            anonymous = config.service_account().is_none(),
            "LDAP authentication initialized"
        );

        Ok(Self::with_directory(Arc::new(client), config, mapping))
    }
}

impl<D: Directory> LdapAuthentication<D> {
    /// Build the plugin on top of any [`Directory`].
    pub fn with_directory(
        directory: Arc<D>,
        config: Arc<DirectoryConfig>,
        mapping: RoleMapping,
    ) -> Self {
        let resolver =
            AttributeResolver::new(Arc::clone(&directory), Arc::clone(&config));
        let roles = RoleMapper::new(
            resolver.clone(),
            Arc::new(mapping),
            config.role_attribute(),
        );

        Self {
            handler: AuthenticationHandler::new(directory, Arc::clone(&config)),
            config,
            resolver,
            roles,
        }
    }

    pub fn id(&self) -> &'static str {
        ID
    }

    pub fn name(&self) -> &'static str {
        NAME
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Nothing to release, sessions never outlive a call.
    pub fn shutdown(&self) -> Result<()> {
        info!("LDAP authentication shut down");
        Ok(())
    }

    /// Check the credentials of `username` and return the matching user.
    pub fn log_in(&self, username: &str, password: &str) -> Result<User> {
        if self.handler.authenticate(username, password) {
            Ok(self.get_user(username))
        } else {
            Err(AuthenticationError::InvalidCredentials)
        }
    }

    /// Nothing to release, sessions never outlive a call.
    pub fn log_out(&self, _user: &User) -> Result<()> {
        Ok(())
    }

    /// User displayed by its `cn`, or by its username when it has none.
    pub fn get_user(&self, username: &str) -> User {
        User::new(username).with_display_name(
            self.resolver.get_attr(username, DISPLAY_NAME_ATTRIBUTE),
        )
    }

    /// First value of `attr_name` for `username`, empty when unknown.
    pub fn get_attr(&self, username: &str, attr_name: &str) -> String {
        self.resolver.get_attr(username, attr_name)
    }

    /// Application roles of `username`.
    pub fn get_roles(&self, username: &str) -> Vec<String> {
        self.roles.get_roles(username)
    }

    /// Raw membership test on the role attribute.
    pub fn test_if_in_object_class(&self, username: &str, token: &str) -> bool {
        self.roles.test_if_in_object_class(username, token)
    }

    /// Properties `modify_user` would accept, were users modifiable.
    pub fn describe_user(&self) -> String {
        User::describe_metadata()
    }

    pub fn search_users(&self, _query: &str) -> Vec<User> {
        Vec::new()
    }

    pub fn supports_user_management(&self) -> bool {
        false
    }

    pub fn create_user(&self, _username: &str, _password: &str) -> Result<User> {
        Err(UnsupportedOperation::CreateUser.into())
    }

    pub fn delete_user(&self, _username: &str) -> Result<()> {
        Err(UnsupportedOperation::DeleteUser.into())
    }

    pub fn change_password(&self, _username: &str, _password: &str) -> Result<()> {
        Err(UnsupportedOperation::ChangePassword.into())
    }

    pub fn modify_user(
        &self,
        _username: &str,
        _property: &str,
        _value: impl Into<PropertyValue>,
    ) -> Result<User> {
        Err(UnsupportedOperation::ModifyUser.into())
    }
}
