//! Typed, validated descriptor collections parsed from untrusted requests
//! and tokens.

mod keychain;
mod scopes;

pub use keychain::AuthorizationKeyChain;
pub use scopes::AuthorizationScopes;

use crate::descriptor::IdentityDescriptor;

fn split_components(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(' ').filter(|part| !part.is_empty())
}

fn push_unique(items: &mut Vec<IdentityDescriptor>, descriptor: IdentityDescriptor) {
    if !items.contains(&descriptor) {
        items.push(descriptor);
    }
}

fn sorted(items: &[IdentityDescriptor]) -> Vec<&IdentityDescriptor> {
    let mut sorted: Vec<_> = items.iter().collect();
    sorted.sort();
    sorted
}

fn join(items: &[IdentityDescriptor]) -> String {
    items
        .iter()
        .map(IdentityDescriptor::descriptor)
        .collect::<Vec<_>>()
        .join(" ")
}
