use crate::ROOT_NS;
use mesh_authz_api::AuthorizationPolicy;
use mesh_authz_runtime::validation::{validate_policy, Error};

fn parse(yaml: &str) -> AuthorizationPolicy {
    serde_yaml::from_str(yaml).expect("policy must parse")
}

/// Asserts that the policy passes validation.
pub fn accepts(yaml: &str) {
    let policy = parse(yaml);
    if let Err(error) = validate_policy(&policy, ROOT_NS) {
        panic!("policy must be accepted: {error}\n{policy:#?}");
    }
}

/// Asserts that the policy fails validation, returning the error.
pub fn rejects(yaml: &str) -> Error {
    let policy = parse(yaml);
    match validate_policy(&policy, ROOT_NS) {
        Ok(()) => panic!("policy must be rejected:\n{policy:#?}"),
        Err(error) => error,
    }
}
