//! Autha LDAP authenticates users against a directory and maps directory
//! attributes to application roles.
//!
//! ```no_run
//! use autha_ldap::LdapAuthentication;
//!
//! let plugin = LdapAuthentication::init_from_file("config.json")?;
//! let user = plugin.log_in("alice", "secret123")?;
//! let roles = plugin.get_roles(&user.username);
//! # Ok::<(), autha_ldap::error::AuthenticationError>(())
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod ldap;
pub mod plugin;
pub mod resolver;
pub mod roles;
pub mod telemetry;
mod user;


pub use config::{Configuration, DirectoryConfig, RoleMapping};
pub use handler::AuthenticationHandler;
pub use ldap::{Directory, DirectoryEntry, LdapClient};
pub use plugin::{LdapAuthentication, PropertyValue};
pub use resolver::AttributeResolver;
pub use roles::RoleMapper;
pub use user::User;
