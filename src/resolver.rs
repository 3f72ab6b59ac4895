//! Attribute lookups without authenticating the user.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::ldap::{Directory, DirectoryEntry, NO_ATTRIBUTES};

/// Reads user attributes through the service account (or anonymously).
#[derive(Debug)]
pub struct AttributeResolver<D> {
    directory: Arc<D>,
    config: Arc<DirectoryConfig>,
}

impl<D> Clone for AttributeResolver<D> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D: Directory> AttributeResolver<D> {
    /// Create a new [`AttributeResolver`].
    pub fn new(directory: Arc<D>, config: Arc<DirectoryConfig>) -> Self {
        Self { directory, config }
    }

    /// Run the id-filter search for `username` and hand every entry to
    /// `visit` until it returns `false`.
    ///
    /// Errors end the walk early; they are logged and otherwise look like
    /// the end of the results.
    fn walk<F>(&self, username: &str, attrs: &[&str], mut visit: F)
    where
        F: FnMut(DirectoryEntry) -> bool,
    {
        let filter = self.config.user_filter(username);
        let base_dn = self.config.base_dn();
        let entries = match self.directory.search(base_dn, &filter, attrs) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%username, %filter, error = %err, "failed LDAP lookup");
                return;
            },
        };

        for entry in entries {
            match entry {
                Ok(entry) => {
                    if !visit(entry) {
                        return;
                    }
                },
                Err(err) => {
                    warn!(%username, %filter, error = %err, "failed LDAP lookup");
                    return;
                },
            }
        }
    }

    /// DN of the first entry matching `username`.
    pub fn resolve_dn(&self, username: &str) -> Option<String> {
        let mut dn = None;
        self.walk(username, NO_ATTRIBUTES, |entry| {
            dn = Some(entry.dn);
            false
        });

        debug!(%username, resolved = dn.is_some(), "resolved user DN");
        dn
    }

    /// First value of `attr_name` on the first entry matching `username`,
    /// or an empty string.
    pub fn get_attr(&self, username: &str, attr_name: &str) -> String {
        let mut value = String::default();
        self.walk(username, &[attr_name], |entry| {
            if let Some(first) = entry.first(attr_name) {
                value = first.to_owned();
            }
            false
        });
        value
    }

    /// Every value of `attr_name` across all entries matching `username`,
    /// entry order first, then value order.
    pub fn get_all_attrs(
        &self,
        username: &str,
        attr_name: &str,
    ) -> Vec<String> {
        let mut values = Vec::new();
        self.walk(username, &[attr_name], |entry| {
            values.extend_from_slice(entry.values(attr_name));
            true
        });
        values
    }
}
