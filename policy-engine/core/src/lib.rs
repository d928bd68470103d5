//! Request authorization for mesh workloads.
//!
//! This crate holds the pure evaluation logic: string, address and path
//! matchers, the rule evaluator, and the decision procedure that combines
//! CUSTOM, DENY, ALLOW and AUDIT policies. It performs no I/O; extension
//! providers are supplied by the caller through [`ExtensionAuthorizer`].

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod address_match;
pub mod authorization;
pub mod decision;
mod path_template;
pub mod policy;
pub mod request;
mod string_match;

pub use self::{
    address_match::{AddressMatch, InvalidAddress},
    decision::{
        decide, Decision, Effect, ExtensionAuthorizer, ExtensionError, ExtensionFailure,
        NoExtensions,
    },
    path_template::{InvalidTemplate, PathTemplate},
    policy::{Action, AuthorizationPolicy, PolicyRef, PolicySelection},
    request::RequestContext,
    string_match::{matches_pattern, Case, InvalidPattern, StringMatch},
};
pub use ipnet::{IpNet, Ipv4Net, Ipv6Net};
