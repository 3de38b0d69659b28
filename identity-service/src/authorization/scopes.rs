use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{join, push_unique, sorted, split_components};
use crate::descriptor::IdentityDescriptor;
use crate::services::IdentityError;

/// The space separated `scope` parameter of an authorization request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthorizationScopes {
    scopes: Vec<IdentityDescriptor>,
}

impl AuthorizationScopes {
    pub fn create_from(raw: &str) -> Result<Self, IdentityError> {
        let mut scopes = Vec::new();
        for component in split_components(raw) {
            push_unique(&mut scopes, IdentityDescriptor::parse(component)?);
        }
        Ok(Self { scopes })
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = IdentityDescriptor>) -> Self {
        let mut scopes = Vec::new();
        for descriptor in descriptors {
            push_unique(&mut scopes, descriptor);
        }
        Self { scopes }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityDescriptor> {
        self.scopes.iter()
    }

    pub fn contains(&self, descriptor: &IdentityDescriptor) -> bool {
        self.scopes.contains(descriptor)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl PartialEq for AuthorizationScopes {
    fn eq(&self, other: &Self) -> bool {
        sorted(&self.scopes) == sorted(&other.scopes)
    }
}

impl Eq for AuthorizationScopes {}

impl Hash for AuthorizationScopes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        sorted(&self.scopes).hash(state);
    }
}

impl fmt::Display for AuthorizationScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.scopes))
    }
}

impl TryFrom<String> for AuthorizationScopes {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::create_from(&value)
    }
}

impl From<AuthorizationScopes> for String {
    fn from(value: AuthorizationScopes) -> Self {
        value.to_string()
    }
}
