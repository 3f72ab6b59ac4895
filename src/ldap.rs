//! LDAP support.
//!
//! Every operation opens its own session, performs exactly one bind or one
//! search, and closes it. Nothing is pooled or shared between calls.

use std::collections::HashMap;
use std::sync::Arc;

use ldap3::{
    Ldap as Ldap3, LdapConnAsync, LdapError, Scope, SearchEntry, SearchStream,
};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::error::DirectoryError;

type Result<T> = std::result::Result<T, DirectoryError>;

/// Request every user attribute.
pub const ALL_ATTRIBUTES: &[&str] = &[];
/// Request no attribute at all, only the DN (RFC 4511, 4.5.1.8).
pub const NO_ATTRIBUTES: &[&str] = &["1.1"];

/// Entry returned by a search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create a new [`DirectoryEntry`] without attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add values for `name`.
    pub fn with_attr<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attrs
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Values of `name`, attribute names being case-insensitive.
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .get(name)
            .or_else(|| {
                self.attrs
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First value of `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

/// A directory able to verify credentials and look up entries.
pub trait Directory: Send + Sync {
    /// Lazily produced search results.
    type Entries: Iterator<Item = Result<DirectoryEntry>>;

    /// Whether `principal` may bind with `credential`.
    fn bind(&self, principal: &str, credential: &str) -> bool;

    /// Subtree search under `base_dn`, returning `attrs` of every entry
    /// matching `filter`.
    fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Self::Entries>;
}

/// Blocking LDAP client over [`ldap3`].
///
/// # Panics
///
/// Each session drives its connection on a private current-thread runtime,
/// so calling the client from inside an async context panics. Use
/// `tokio::task::spawn_blocking` there.
#[derive(Debug, Clone)]
pub struct LdapClient {
    config: Arc<DirectoryConfig>,
}

impl LdapClient {
    /// Create a new [`LdapClient`]. No connection is made until an
    /// operation runs.
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }

    /// Open a session searching as the service account, or anonymously.
    fn service_session(&self) -> Result<Session> {
        let mut session = Session::open(self.config.base_url())?;

        if let Some(account) = self.config.service_account() {
            session
                .simple_bind(&account.principal, &account.credential)
                .map_err(DirectoryError::Bind)?;
        }

        Ok(session)
    }
}

impl Directory for LdapClient {
    type Entries = Entries;

    fn bind(&self, principal: &str, credential: &str) -> bool {
        let result = Session::open(self.config.base_url()).and_then(
            |mut session| {
                session
                    .simple_bind(principal, credential)
                    .map_err(DirectoryError::Bind)
            },
        );

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(%principal, error = %err, "failed LDAP bind");
                false
            },
        }
    }

    fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Entries> {
        let mut session = self.service_session()?;
        let attrs = attrs.iter().map(|attr| attr.to_string()).collect();

        debug!(%base_dn, %filter, "searching LDAP subtree");
        let stream = session
            .streaming_search(base_dn, filter, attrs)
            .map_err(DirectoryError::Search)?;

        Ok(Entries {
            stream,
            session: Some(session),
        })
    }
}

/// One connection to the directory, unbound when dropped.
struct Session {
    runtime: Runtime,
    ldap: Ldap3,
}

impl Session {
    fn open(url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DirectoryError::Runtime)?;

        let ldap = runtime
            .block_on(async {
                let (conn, ldap) = LdapConnAsync::new(url).await?;
                ldap3::drive!(conn);
                Ok::<_, LdapError>(ldap)
            })
            .map_err(DirectoryError::Connection)?;

        Ok(Self { runtime, ldap })
    }

    fn simple_bind(
        &mut self,
        dn: &str,
        password: &str,
    ) -> std::result::Result<(), LdapError> {
        let ldap = &mut self.ldap;
        self.runtime.block_on(async move {
            ldap.simple_bind(dn, password).await?.success()?;
            Ok(())
        })
    }

    fn streaming_search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attrs: Vec<String>,
    ) -> std::result::Result<SearchStream<'static, String, Vec<String>>, LdapError>
    {
        let ldap = &mut self.ldap;
        self.runtime.block_on(ldap.streaming_search(
            base_dn,
            Scope::Subtree,
            filter,
            attrs,
        ))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let ldap = &mut self.ldap;
        if let Err(err) = self.runtime.block_on(ldap.unbind()) {
            debug!(error = %err, "LDAP unbind failed");
        }
    }
}

/// Entries of a running search.
///
/// The session closes when the last entry has been read, when the search
/// fails, or when this value is dropped.
pub struct Entries {
    stream: SearchStream<'static, String, Vec<String>>,
    session: Option<Session>,
}

impl Entries {
    fn close(&mut self) -> Option<Result<DirectoryEntry>> {
        let session = self.session.take()?;
        let outcome = session.runtime.block_on(self.stream.finish()).success();

        match outcome {
            Ok(_) => None,
            Err(err) => Some(Err(DirectoryError::Search(err))),
        }
    }
}

impl Iterator for Entries {
    type Item = Result<DirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let session = self.session.as_ref()?;

            match session.runtime.block_on(self.stream.next()) {
                Ok(Some(entry)) if entry.is_ref() || entry.is_intermediate() => {
                    continue;
                },
                Ok(Some(entry)) => {
                    return Some(Ok(SearchEntry::construct(entry).into()));
                },
                Ok(None) => return self.close(),
                Err(err) => {
                    self.session = None;
                    return Some(Err(DirectoryError::Search(err)));
                },
            }
        }
    }
}
