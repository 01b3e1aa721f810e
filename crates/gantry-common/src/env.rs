//! Parsing of the `gantry.dev/env` annotation value
//!
//! The value is a comma-separated list of `NAME=value` pairs. Values may
//! themselves contain `=`; only the first `=` splits. Entries without an `=`
//! are ignored.

use k8s_openapi::api::core::v1::EnvVar;

/// Parse a comma-separated `NAME=value` list into environment variables
pub fn parse_env_string(env_str: &str) -> Vec<EnvVar> {
    env_str
        .split(',')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=')?;
            Some(EnvVar {
                name: name.to_string(),
                value: Some(value.to_string()),
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_and_values(vars: &[EnvVar]) -> Vec<(String, String)> {
        vars.iter()
            .map(|v| (v.name.clone(), v.value.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn empty_string_yields_nothing() {
        assert!(parse_env_string("").is_empty());
    }

    #[test]
    fn parses_simple_pairs() {
        let vars = parse_env_string("ENV1=value1,ENV2=value2, ENV3=value3");
        assert_eq!(
            names_and_values(&vars),
            vec![
                ("ENV1".to_string(), "value1".to_string()),
                ("ENV2".to_string(), "value2".to_string()),
                ("ENV3".to_string(), "value3".to_string()),
            ]
        );
    }

    #[test]
    fn value_may_contain_equals() {
        let vars = parse_env_string("HTTP_PROXY=http://myproxy.com,OPTS=a=b");
        assert_eq!(
            names_and_values(&vars),
            vec![
                ("HTTP_PROXY".to_string(), "http://myproxy.com".to_string()),
                ("OPTS".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn entries_without_equals_are_skipped() {
        let vars = parse_env_string("GOOD=1,bad,ALSO_GOOD=2");
        assert_eq!(vars.len(), 2);
    }
}
