//! Translate directory role tokens into application roles.

use std::sync::Arc;

use crate::config::RoleMapping;
use crate::ldap::Directory;
use crate::resolver::AttributeResolver;

/// Maps the values of the role attribute through a [`RoleMapping`].
#[derive(Debug)]
pub struct RoleMapper<D> {
    resolver: AttributeResolver<D>,
    mapping: Arc<RoleMapping>,
    role_attribute: String,
}

impl<D: Directory> RoleMapper<D> {
    /// Create a new [`RoleMapper`] reading `role_attribute`.
    pub fn new(
        resolver: AttributeResolver<D>,
        mapping: Arc<RoleMapping>,
        role_attribute: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            mapping,
            role_attribute: role_attribute.into(),
        }
    }

    /// Application roles of `username`, without duplicates, in the order
    /// their tokens were found.
    pub fn get_roles(&self, username: &str) -> Vec<String> {
        let values = self.resolver.get_all_attrs(username, &self.role_attribute);
        let mut roles: Vec<String> = Vec::new();

        for token in tokens(&values, |token| self.mapping.contains(token)) {
            for role in self.mapping.roles(token).unwrap_or_default() {
                if !roles.contains(role) {
                    roles.push(role.clone());
                }
            }
        }

        roles
    }

    /// Whether `token` is one of the raw role tokens of `username`.
    pub fn test_if_in_object_class(&self, username: &str, token: &str) -> bool {
        let token = token.trim();
        let values = self.resolver.get_all_attrs(username, &self.role_attribute);

        tokens(&values, |candidate| candidate == token).any(|t| t == token)
    }
}

/// Split attribute values into tokens.
///
/// A value is a token as a whole. When `known` rejects it and it holds
/// commas, each comma-separated part is a token instead.
fn tokens<'a, F>(values: &'a [String], known: F) -> impl Iterator<Item = &'a str>
where
    F: Fn(&str) -> bool + 'a,
{
    values.iter().flat_map(move |value| {
        let value = value.trim();
        let parts: Vec<&str> = if known(value) || !value.contains(',') {
            vec![value]
        } else {
            value.split(',').map(str::trim).collect()
        };
        parts.into_iter().filter(|part| !part.is_empty())
    })
}
