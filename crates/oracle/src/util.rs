//! Shared helpers for the oracle's HTTP transport and credential resolution.

use forge_domain::config::AuthMode;
use forge_domain::{Error, Result};

/// Converts a [`reqwest::Error`] into the domain [`Error`] type. Timeout
/// errors map to [`Error::Timeout`]; everything else is treated as a
/// transient oracle-unavailable condition so callers retry it.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::OracleUnavailable(e.to_string())
    }
}

/// Resolves a credential's API key: a plaintext `ApiKey` value is used
/// directly (logged as discouraged); an `Env` mode reads the named
/// environment variable.
pub fn resolve_api_key(auth: &AuthMode, credential_id: &str) -> Result<String> {
    match auth {
        AuthMode::ApiKey { key } => {
            tracing::warn!(credential = credential_id, "API key loaded from plaintext config — prefer env mode");
            Ok(key.clone())
        }
        AuthMode::Env { var } => std::env::var(var)
            .map_err(|_| Error::Validation(format!("environment variable '{var}' not set or not valid UTF-8 (credential '{credential_id}')"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_plaintext() {
        let auth = AuthMode::ApiKey { key: "sk-test-123".into() };
        assert_eq!(resolve_api_key(&auth, "primary").unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "FORGE_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthMode::Env { var: var_name.into() };
        assert_eq!(resolve_api_key(&auth, "primary").unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing() {
        let auth = AuthMode::Env { var: "FORGE_TEST_NONEXISTENT_VAR_8888".into() };
        let err = resolve_api_key(&auth, "primary").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }
}
