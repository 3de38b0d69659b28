use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{join, push_unique, sorted, split_components};
use crate::descriptor::IdentityDescriptor;
use crate::services::IdentityError;

const EMPTY_NAMESPACE: &str = "empty_namespace";

/// A flat set of service actions that all belong to one service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthorizationKeyChain {
    actions: Vec<IdentityDescriptor>,
}

impl AuthorizationKeyChain {
    pub fn create_from(raw: &str) -> Result<Self, IdentityError> {
        let mut actions = Vec::new();
        for component in split_components(raw) {
            let descriptor = IdentityDescriptor::parse(component)
                .map_err(|_| IdentityError::InvalidKeyChainActionFormat(component.to_string()))?;
            push_unique(&mut actions, descriptor);
        }

        let namespaces: BTreeSet<&str> = actions
            .iter()
            .map(|action| action.namespace().unwrap_or(EMPTY_NAMESPACE))
            .collect();
        if namespaces.len() > 1 {
            let found = namespaces.into_iter().collect::<Vec<_>>().join(", ");
            return Err(IdentityError::MultipleServiceScopesInKeyChain(found));
        }

        Ok(Self { actions })
    }

    /// The namespace shared by every action, if any action is qualified.
    pub fn namespace(&self) -> Option<&str> {
        self.actions.first().and_then(IdentityDescriptor::namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityDescriptor> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl PartialEq for AuthorizationKeyChain {
    fn eq(&self, other: &Self) -> bool {
        sorted(&self.actions) == sorted(&other.actions)
    }
}

impl Eq for AuthorizationKeyChain {}

impl Hash for AuthorizationKeyChain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        sorted(&self.actions).hash(state);
    }
}

impl fmt::Display for AuthorizationKeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.actions))
    }
}

impl TryFrom<String> for AuthorizationKeyChain {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::create_from(&value)
    }
}

impl From<AuthorizationKeyChain> for String {
    fn from(value: AuthorizationKeyChain) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_actions_of_one_namespace() {
        let keychain = AuthorizationKeyChain::create_from("a:x a:y").unwrap();
        assert_eq!(keychain.len(), 2);
        assert_eq!(keychain.namespace(), Some("a"));
    }

    #[test]
    fn rejects_multiple_namespaces() {
        let err = AuthorizationKeyChain::create_from("a:x b:y").unwrap_err();
        assert_eq!(err.code(), "Identity.MultipleServiceScopesInKeyChain");
    }

    #[test]
    fn missing_namespace_is_its_own_bucket() {
        let err = AuthorizationKeyChain::create_from("a:x y").unwrap_err();
        assert!(matches!(err, IdentityError::MultipleServiceScopesInKeyChain(_)));
        assert!(AuthorizationKeyChain::create_from("x y").is_ok());
    }

    #[test]
    fn empty_input_is_empty_keychain() {
        let keychain = AuthorizationKeyChain::create_from("").unwrap();
        assert!(keychain.is_empty());
        assert_eq!(keychain.namespace(), None);
    }

    #[test]
    fn invalid_action_names_the_action() {
        let err = AuthorizationKeyChain::create_from("a:x a::y").unwrap_err();
        assert_eq!(err.code(), "Identity.InvalidKeyChainActionFormat");
        assert_eq!(err.to_string(), "The action 'a::y' is not in a valid format.");
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(
            AuthorizationKeyChain::create_from("a:x a:y").unwrap(),
            AuthorizationKeyChain::create_from("a:y a:x").unwrap()
        );
    }
}
