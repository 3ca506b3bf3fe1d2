use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::{
    company::DEFAULT_SEARCH_URL,
    geo::DEFAULT_ADDRESS_URL,
    runtime::{Runtime, optional_env},
    session::Session,
    statements::{DEFAULT_BROKER_URL, RneEnvironment, SourceKind},
};

/// Values given on the command line; each one wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub session: Option<PathBuf>,
    pub search_url: Option<String>,
    pub address_url: Option<String>,
    pub rne_url: Option<String>,
    pub broker_url: Option<String>,
    pub rne_env: Option<RneEnvironment>,
}

/// Resolved endpoints and credentials for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub session_path: PathBuf,
    pub search_url: String,
    pub address_url: String,
    pub rne_env: RneEnvironment,
    pub rne_url: String,
    pub broker_url: String,
    pub rne_username: Option<String>,
    pub rne_password: Option<String>,
    pub broker_token: Option<String>,
    pub broker_recipient: Option<String>,
    pub broker_context: Option<String>,
    pub broker_object: Option<String>,
}

impl Config {
    pub fn new<R: Runtime + ?Sized>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let session_path = match overrides.session {
            Some(path) => path,
            None => Session::default_path(runtime)?,
        };

        let rne_env = match overrides.rne_env {
            Some(env) => env,
            None => optional_env(runtime, "INPI_ENV")
                .map(|value| value.parse::<RneEnvironment>())
                .transpose()?
                .unwrap_or_default(),
        };
        let rne_url = overrides
            .rne_url
            .unwrap_or_else(|| rne_env.base_url().to_string());
        debug!("Registry environment: {} ({})", rne_env, rne_url);

        Ok(Self {
            session_path,
            search_url: overrides
                .search_url
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            address_url: overrides
                .address_url
                .unwrap_or_else(|| DEFAULT_ADDRESS_URL.to_string()),
            rne_env,
            rne_url,
            broker_url: overrides
                .broker_url
                .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
            rne_username: optional_env(runtime, "INPI_USERNAME"),
            rne_password: optional_env(runtime, "INPI_PASSWORD"),
            broker_token: optional_env(runtime, "API_ENTREPRISE_TOKEN"),
            broker_recipient: optional_env(runtime, "API_ENTREPRISE_RECIPIENT"),
            broker_context: optional_env(runtime, "API_ENTREPRISE_CONTEXT"),
            broker_object: optional_env(runtime, "API_ENTREPRISE_OBJECT"),
        })
    }

    /// Variables that must be set before the given provider can be used.
    pub fn missing_for(&self, kind: SourceKind) -> Vec<&'static str> {
        let required = match kind {
            SourceKind::Rne => [
                ("INPI_USERNAME", &self.rne_username),
                ("INPI_PASSWORD", &self.rne_password),
            ],
            SourceKind::Broker => [
                ("API_ENTREPRISE_TOKEN", &self.broker_token),
                ("API_ENTREPRISE_RECIPIENT", &self.broker_recipient),
            ],
        };
        required
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect()
    }
}

// Credentials stay out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Config")
            .field("session_path", &self.session_path)
            .field("search_url", &self.search_url)
            .field("address_url", &self.address_url)
            .field("rne_env", &self.rne_env)
            .field("rne_url", &self.rne_url)
            .field("broker_url", &self.broker_url)
            .field("rne_username", &set(&self.rne_username))
            .field("rne_password", &set(&self.rne_password))
            .field("broker_token", &set(&self.broker_token))
            .field("broker_recipient", &self.broker_recipient)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use std::collections::HashMap;

    /// Runtime whose environment is exactly `vars`.
    fn runtime_with(vars: &[(&str, &str)]) -> MockRuntime {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut runtime = MockRuntime::new();
        runtime
            .expect_env_var()
            .returning(move |key| vars.get(key).cloned().ok_or(std::env::VarError::NotPresent));
        runtime
            .expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/user")));
        runtime
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::new(&runtime_with(&[]), ConfigOverrides::default()).unwrap();

        assert_eq!(
            config.session_path,
            PathBuf::from("/home/user/.bilans/session.json")
        );
        assert_eq!(config.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(config.address_url, DEFAULT_ADDRESS_URL);
        assert_eq!(config.rne_env, RneEnvironment::Production);
        assert_eq!(config.rne_url, RneEnvironment::Production.base_url());
        assert_eq!(
            config.missing_for(SourceKind::Rne),
            vec!["INPI_USERNAME", "INPI_PASSWORD"]
        );
        assert_eq!(
            config.missing_for(SourceKind::Broker),
            vec!["API_ENTREPRISE_TOKEN", "API_ENTREPRISE_RECIPIENT"]
        );
    }

    #[test]
    fn test_environment_selects_preproduction_and_credentials() {
        let runtime = runtime_with(&[
            ("INPI_ENV", "pprod"),
            ("INPI_USERNAME", "alice"),
            ("INPI_PASSWORD", "s3cret"),
            ("API_ENTREPRISE_TOKEN", "  "),
        ]);
        let config = Config::new(&runtime, ConfigOverrides::default()).unwrap();

        assert_eq!(config.rne_env, RneEnvironment::PreProduction);
        assert_eq!(config.rne_url, RneEnvironment::PreProduction.base_url());
        assert!(config.missing_for(SourceKind::Rne).is_empty());
        // Blank counts as missing
        assert_eq!(
            config.missing_for(SourceKind::Broker),
            vec!["API_ENTREPRISE_TOKEN", "API_ENTREPRISE_RECIPIENT"]
        );
    }

    #[test]
    fn test_overrides_win() {
        let runtime = runtime_with(&[("INPI_ENV", "pprod")]);
        let overrides = ConfigOverrides {
            session: Some(PathBuf::from("/tmp/s.json")),
            search_url: Some("http://127.0.0.1:1/search-api".into()),
            rne_url: Some("http://127.0.0.1:1/rne".into()),
            rne_env: Some(RneEnvironment::Production),
            ..Default::default()
        };
        let config = Config::new(&runtime, overrides).unwrap();

        assert_eq!(config.session_path, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.search_url, "http://127.0.0.1:1/search-api");
        assert_eq!(config.rne_env, RneEnvironment::Production);
        assert_eq!(config.rne_url, "http://127.0.0.1:1/rne");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let runtime = runtime_with(&[("INPI_PASSWORD", "hunter2"), ("API_ENTREPRISE_TOKEN", "tok-123")]);
        let config = Config::new(&runtime, ConfigOverrides::default()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("tok-123"));
        assert!(debug.contains("<set>"));
    }
}
