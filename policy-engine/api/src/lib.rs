//! Resource types for mesh authorization configuration and requests.
//!
//! These types mirror the on-disk and on-the-wire formats; they are not
//! validated. The index converts them into evaluation types.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod bundle;
pub mod duration;
pub mod labels;
pub mod policy;
pub mod request;

pub use self::{
    bundle::{ExtensionProvider, ExtensionProviderKind, FailStrategy, PolicyBundle},
    duration::ProtoDuration,
    labels::{Labels, WorkloadSelector},
    policy::{AuthorizationPolicy, ObjectMeta, ObjectRef, PolicyTargetReference},
    request::{CheckRequest, CheckResponse, RequestAttributes},
};
