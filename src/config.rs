//! Typed construction of the configuration surface.
//!
//! Configuration-file parsing belongs to the embedding server; this module
//! gives the parsed key/value shapes a typed, validated form. Rejecting a
//! parameter outside the enumerated set is the engine's only
//! configuration-time failure; everything at request time is a total
//! function.

use thiserror::Error;

use crate::headers::forward::ForwardedParams;

/// Error building [`ForwardedParams`] from configured pairs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForwardedParamError {
    /// The key is not one of the five directive names.
    #[error("forwarded parameter must be one of by, for, host, proto, remote_user, not: {0}")]
    UnknownParam(String),

    /// The value is not one of `enable`, `disable`, `1`, `0`.
    #[error("forwarded parameter {0} must be enable or disable, not: {1}")]
    InvalidValue(String, String),
}

impl ForwardedParams {
    /// Build the directive switches from configured `key => value` pairs.
    ///
    /// Keys are the directive names; values are `enable`/`disable` or the
    /// boolean spellings `1`/`0`. Anything else is rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ForwardedParamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = ForwardedParams::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let enabled = match value.as_ref() {
                "enable" | "1" => true,
                "disable" | "0" => false,
                other => {
                    return Err(ForwardedParamError::InvalidValue(
                        key.to_owned(),
                        other.to_owned(),
                    ))
                }
            };
            match key {
                "for" => params.r#for = enabled,
                "by" => params.by = enabled,
                "proto" => params.proto = enabled,
                "host" => params.host = enabled,
                "remote_user" => params.remote_user = enabled,
                other => return Err(ForwardedParamError::UnknownParam(other.to_owned())),
            }
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_enumerated_pairs() {
        let params = ForwardedParams::from_pairs([
            ("for", "enable"),
            ("proto", "1"),
            ("by", "disable"),
            ("host", "0"),
        ])
        .unwrap();

        assert!(params.r#for);
        assert!(params.proto);
        assert!(!params.by);
        assert!(!params.host);
        assert!(!params.remote_user);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert_eq!(
            ForwardedParams::from_pairs([("port", "enable")]),
            Err(ForwardedParamError::UnknownParam("port".into()))
        );
    }

    #[test]
    fn rejects_values_outside_the_set() {
        assert_eq!(
            ForwardedParams::from_pairs([("for", "yes")]),
            Err(ForwardedParamError::InvalidValue("for".into(), "yes".into()))
        );
    }
}
