//! Error handler for autha-ldap.

use ldap3::LdapError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthenticationError>;

/// Errors raised while building a handler from its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing or empty `{0}` entry on ldap configuration")]
    Missing(&'static str),

    #[error("`baseURL` is invalid: {0}")]
    Url(#[from] url::ParseError),

    #[error("`baseURL` scheme must be ldap, ldaps or ldapi, got {0:?}")]
    Scheme(String),

    #[error("`securityPrincipal` is set without `securityCredentials`")]
    MissingCredentials,

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while talking to the directory.
///
/// They never leave the crate's public operations: handlers log them and
/// downgrade them to `false` or to an empty result.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("cannot start session runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("cannot reach directory: {0}")]
    Connection(#[source] LdapError),

    #[error("bind refused: {0}")]
    Bind(#[source] LdapError),

    #[error("search failed: {0}")]
    Search(#[source] LdapError),
}

/// Write operations a read-only directory refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnsupportedOperation {
    #[error("Cannot create a new LDAP user.")]
    CreateUser,
    #[error("Cannot delete an LDAP user.")]
    DeleteUser,
    #[error("Cannot change password in LDAP.")]
    ChangePassword,
    #[error("This class does not support user modification.")]
    ModifyUser,
}

/// Errors visible to the host of the authentication plugin.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// Wrong credentials, unknown user or unreachable directory alike.
    #[error("Invalid password or username.")]
    InvalidCredentials,

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperation),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
