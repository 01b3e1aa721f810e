//! Identifier validation
//!
//! App IDs become part of Kubernetes service names, so they must satisfy the
//! DNS-1123 label rule once the platform suffix is appended.

use crate::{Error, Result};

const DNS1123_LABEL_MAX_LENGTH: usize = 63;

/// Validate an app ID for the Kubernetes platform.
///
/// The derived service name (`<app-id>-gantry`) must be a valid DNS-1123
/// label: non-empty, at most 63 characters, lowercase alphanumerics and `-`,
/// starting and ending with an alphanumeric.
pub fn validate_kubernetes_app_id(app_id: &str) -> Result<()> {
    if app_id.is_empty() {
        return Err(Error::validation(
            "value for the gantry.dev/app-id annotation is empty",
        ));
    }
    let service = service_name(app_id);
    let errs = dns1123_label_errors(&service);
    if errs.is_empty() {
        return Ok(());
    }
    Err(Error::validation(format!(
        "invalid app id (input: {app_id}, service: {service}): {}",
        errs.join(",")
    )))
}

fn service_name(app_id: &str) -> String {
    format!("{app_id}-gantry")
}

fn dns1123_label_errors(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > DNS1123_LABEL_MAX_LENGTH {
        errs.push(format!(
            "must be no more than {DNS1123_LABEL_MAX_LENGTH} characters"
        ));
    }
    if !is_dns1123_label(value) {
        errs.push(
            "a lowercase RFC 1123 label must consist of lower case alphanumeric characters \
             or '-', and must start and end with an alphanumeric character"
                .to_string(),
        );
    }
    errs
}

fn is_dns1123_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let Some((&first, rest)) = bytes.split_first() else {
        return false;
    };
    let Some((&last, _)) = bytes.split_last() else {
        return false;
    };
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    alnum(first) && alnum(last) && rest.iter().all(|&b| alnum(b) || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_ids() {
        for id in ["myapp", "my-app", "app2", "a"] {
            assert!(validate_kubernetes_app_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_empty_id() {
        let err = validate_kubernetes_app_id("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_uppercase_and_symbols() {
        for id in ["MyApp", "my_app", "my app", "app!", "-app", "app-"] {
            assert!(validate_kubernetes_app_id(id).is_err(), "{id} should be invalid");
        }
    }

    #[test]
    fn rejects_overlong_id() {
        // 63 chars plus the service suffix exceeds the label limit
        let id = "a".repeat(63);
        let err = validate_kubernetes_app_id(&id).unwrap_err();
        assert!(err.to_string().contains("no more than"));
    }

    #[test]
    fn error_names_input_and_derived_service() {
        let err = validate_kubernetes_app_id("Bad!Id").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Bad!Id"));
        assert!(msg.contains("Bad!Id-gantry"));
    }
}
