//! Two-phase LDAP authentication.
//!
//! A user is first bound under its conventional DN
//! (`idAttribute=username,baseDN`). Directories naming entries by another
//! attribute (login by `uid`, entries named by `cn`) reject that bind, so the
//! handler then looks the real DN up with the id filter and binds again.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DirectoryConfig;
use crate::ldap::Directory;
use crate::resolver::AttributeResolver;
use crate::telemetry;

/// Steps of an authentication attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Bind as `idAttribute=username,baseDN`.
    DefaultBind,
    /// Search the DN of the user.
    ResolveDn,
    /// Bind as the DN found by [`Step::ResolveDn`].
    ResolvedBind,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::DefaultBind => "default_bind",
            Step::ResolveDn => "resolve_dn",
            Step::ResolvedBind => "resolved_bind",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a username and password pair is valid.
#[derive(Debug)]
pub struct AuthenticationHandler<D> {
    directory: Arc<D>,
    config: Arc<DirectoryConfig>,
    resolver: AttributeResolver<D>,
}

impl<D: Directory> AuthenticationHandler<D> {
    /// Create a new [`AuthenticationHandler`].
    pub fn new(directory: Arc<D>, config: Arc<DirectoryConfig>) -> Self {
        let resolver =
            AttributeResolver::new(Arc::clone(&directory), Arc::clone(&config));

        Self {
            directory,
            config,
            resolver,
        }
    }

    /// Check `password` for `username`.
    ///
    /// Directory failures count as a refusal at the step they occur; the
    /// caller only learns the final answer.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        // An empty password would be an unauthenticated bind, accepted by
        // most servers.
        if username.is_empty() || password.is_empty() {
            debug!(%username, "empty username or password");
            return self.finish(username, None);
        }

        let candidate = self.config.user_dn(username);
        if self.bind(Step::DefaultBind, &candidate, password) {
            return self.finish(username, Some(Step::DefaultBind));
        }

        let Some(dn) = self.resolver.resolve_dn(username) else {
            debug!(%username, step = %Step::ResolveDn, "no matching entry");
            return self.finish(username, None);
        };

        if self.bind(Step::ResolvedBind, &dn, password) {
            return self.finish(username, Some(Step::ResolvedBind));
        }

        self.finish(username, None)
    }

    fn bind(&self, step: Step, dn: &str, password: &str) -> bool {
        let success = self.directory.bind(dn, password);
        debug!(%step, %dn, success, "LDAP bind attempt");
        telemetry::record_bind(step, success);
        success
    }

    fn finish(&self, username: &str, granted_by: Option<Step>) -> bool {
        match granted_by {
            Some(step) => {
                info!(%username, %step, "authentication successful");
                telemetry::record_authentication(true);
                true
            },
            None => {
                info!(%username, "authentication failed");
                telemetry::record_authentication(false);
                false
            },
        }
    }
}
