//! Namespace-qualified names (`namespace:name`) used for scopes and
//! service actions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::services::IdentityError;

const NAMESPACE_SEPARATOR: char = ':';

static DESCRIPTOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<namespace>(?:[a-z]+(?:-[a-z]+)?)+):)?(?P<name>(?:[a-z0-9]+(?:\.|-[a-z0-9]+)?)+)$",
    )
    .expect("descriptor pattern is valid")
});

static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[a-z]+(?:-[a-z]+)?)+$").expect("namespace pattern is valid"));

/// A validated `[namespace:]name` pair. Equality is over (namespace, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityDescriptor {
    namespace: Option<String>,
    name: String,
}

impl IdentityDescriptor {
    /// Formats and validates `name`, optionally qualified by `namespace`.
    pub fn create(name: &str, namespace: Option<&str>) -> Result<Self, IdentityError> {
        let name = format_part(name);
        let namespace = namespace.map(format_part).filter(|ns| !ns.is_empty());

        let descriptor = match &namespace {
            Some(ns) => format!("{}{}{}", ns, NAMESPACE_SEPARATOR, name),
            None => name,
        };

        Self::parse(&descriptor)
    }

    /// Splits an already canonical descriptor into its parts.
    pub fn parse(descriptor: &str) -> Result<Self, IdentityError> {
        let invalid = || IdentityError::InvalidDescriptorFormat(descriptor.to_string());

        let captures = DESCRIPTOR_PATTERN.captures(descriptor).ok_or_else(invalid)?;
        let name = captures.name("name").ok_or_else(invalid)?.as_str();
        if name.ends_with('.') {
            return Err(invalid());
        }

        Ok(Self {
            namespace: captures.name("namespace").map(|m| m.as_str().to_string()),
            name: name.to_string(),
        })
    }

    /// Qualifies every descriptor that has no namespace with `namespace`.
    pub fn define_namespace_if_not_set<I>(
        descriptors: I,
        namespace: &str,
    ) -> Result<Vec<Self>, IdentityError>
    where
        I: IntoIterator<Item = Self>,
    {
        descriptors
            .into_iter()
            .map(|descriptor| match descriptor.namespace {
                Some(_) => Ok(descriptor),
                None => Self::create(&descriptor.name, Some(namespace)),
            })
            .collect()
    }

    /// Formats and validates a standalone namespace.
    pub fn format_namespace(namespace: &str) -> Result<String, IdentityError> {
        let formatted = format_part(namespace);
        if NAMESPACE_PATTERN.is_match(&formatted) {
            Ok(formatted)
        } else {
            Err(IdentityError::InvalidDescriptorFormat(namespace.to_string()))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Canonical string form.
    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

fn format_part(value: &str) -> String {
    value.trim().replace(' ', "-")
}

impl fmt::Display for IdentityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}{}{}", ns, NAMESPACE_SEPARATOR, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for IdentityDescriptor {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IdentityDescriptor {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IdentityDescriptor> for String {
    fn from(value: IdentityDescriptor) -> Self {
        value.to_string()
    }
}
