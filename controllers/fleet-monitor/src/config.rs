//! Configuration resolution.
//!
//! Every property is looked up as an environment variable first, then in the
//! properties file, then falls back to its default. Property names are dotted
//! lower-case (`monitoring.kubeconfig.dev`); the environment form is upper-case
//! with `_` separators (`MONITORING_KUBECONFIG_DEV`).

use crate::error::MonitorError;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at the properties file
pub const CONFIG_FILE_ENV: &str = "MONITOR_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config/application.yaml";

/// Prefix of the kubeconfig URL properties
pub const KUBECONFIG_PREFIX: &str = "monitoring.kubeconfig";
/// Prefix of the context filter properties
pub const FILTERS_PREFIX: &str = "monitoring.context.filters";
const NAMESPACE: &str = "sample.app.namespace";
const DATABASE_URL: &str = "sample.app.database.url";
const TEMPLATE_URL: &str = "sample.app.template.url";
const API_PORT: &str = "monitoring.api.port";

const DEFAULT_NAMESPACE: &str = "infra-test";
const DEFAULT_DATABASE_URL: &str =
    "https://raw.githubusercontent.com/jsafarik/openshift-sample-app/master/openshift/postgres.yaml";
const DEFAULT_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/jsafarik/openshift-sample-app/master/openshift/sampleApp.yaml";
const DEFAULT_API_PORT: u16 = 8080;

/// `monitoring.kubeconfig.dev` -> `MONITORING_KUBECONFIG_DEV`
pub fn to_env_name(property: &str) -> String {
    property.to_uppercase().replace('.', "_")
}

/// `MONITORING_KUBECONFIG_DEV` -> `monitoring.kubeconfig.dev`
pub fn to_property_name(env_name: &str) -> String {
    env_name.to_lowercase().replace('_', ".")
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Split a comma-separated filter list, dropping blank entries.
pub fn split_filters(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|filter| !filter.is_empty())
        .map(str::to_string)
        .collect()
}

/// Layered property lookup: environment, then properties file.
#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    env: BTreeMap<String, String>,
    file: BTreeMap<String, String>,
}

impl PropertySource {
    /// Source over explicit environment pairs and flattened file properties
    pub fn new(
        env: impl IntoIterator<Item = (String, String)>,
        file: BTreeMap<String, String>,
    ) -> Self {
        Self {
            env: env.into_iter().collect(),
            file,
        }
    }

    /// Build from environment pairs and properties file contents.
    ///
    /// Nested mappings are flattened into dotted keys, so both
    /// `monitoring.kubeconfig: ...` and
    /// `monitoring: { kubeconfig: ... }` resolve to the same property.
    pub fn from_yaml(
        env: impl IntoIterator<Item = (String, String)>,
        yaml: &str,
    ) -> Result<Self, MonitorError> {
        let mut file = BTreeMap::new();
        if !yaml.trim().is_empty() {
            let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
            flatten("", &value, &mut file)?;
        }
        Ok(Self::new(env, file))
    }

    /// Load from the process environment and the configured properties file.
    ///
    /// A missing properties file is treated as empty.
    pub fn load() -> Result<Self, MonitorError> {
        let path = env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let contents = if Path::new(&path).exists() {
            info!("Loading properties from {}", path);
            std::fs::read_to_string(&path)?
        } else {
            debug!("No properties file at {}, using environment and defaults only", path);
            String::new()
        };
        Self::from_yaml(env::vars(), &contents)
    }

    /// Resolve a property; empty values count as unset.
    pub fn get(&self, name: &str) -> Option<String> {
        self.env
            .get(&to_env_name(name))
            .filter(|value| !value.is_empty())
            .or_else(|| self.file.get(name).filter(|value| !value.is_empty()))
            .map(|value| strip_quotes(value).to_string())
    }

    /// Property value or `default`
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Property names containing `prefix`, in lexicographic order.
    ///
    /// Environment variables win: file keys are only consulted when no
    /// environment variable matches.
    pub fn names_containing(&self, prefix: &str) -> Vec<String> {
        let env_prefix = to_env_name(prefix);
        let from_env: BTreeSet<String> = self
            .env
            .keys()
            .filter(|key| key.contains(&env_prefix))
            .map(|key| to_property_name(key))
            .collect();
        if !from_env.is_empty() {
            return from_env.into_iter().collect();
        }

        self.file
            .keys()
            .filter(|key| key.contains(prefix))
            .cloned()
            .collect()
    }
}

fn flatten(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), MonitorError> {
    use serde_yaml::Value;

    match value {
        Value::Mapping(mapping) => {
            for (key, nested) in mapping {
                let key = match key {
                    Value::String(key) => key.clone(),
                    Value::Number(key) => key.to_string(),
                    Value::Bool(key) => key.to_string(),
                    other => {
                        return Err(MonitorError::InvalidConfig(format!(
                            "unsupported property key {:?}",
                            other
                        )));
                    }
                };
                let name = if prefix.is_empty() { key } else { format!("{}.{}", prefix, key) };
                flatten(&name, nested, out)?;
            }
        }
        Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        Value::Number(number) => {
            out.insert(prefix.to_string(), number.to_string());
        }
        Value::Bool(flag) => {
            out.insert(prefix.to_string(), flag.to_string());
        }
        Value::Sequence(items) => {
            let joined = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        Value::Null => {}
        Value::Tagged(tagged) => flatten(prefix, &tagged.value, out)?,
    }
    Ok(())
}

/// One configured kubeconfig document and the context filters that apply to it.
#[derive(Debug)]
pub struct KubeconfigEntry {
    /// Property name the URL was read from
    pub key: String,
    /// Document URL
    pub url: String,
    /// Filters for this document, or the correlation error that disqualifies it
    pub filters: Result<Vec<String>, MonitorError>,
}

/// Settings for the synthetic deploy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleAppSettings {
    /// Project the sample app is deployed into
    pub namespace: String,
    /// Postgres manifest URL
    pub database_url: String,
    /// Sample app template URL
    pub template_url: String,
}

/// Typed view over the monitor's properties.
#[derive(Debug, Clone)]
pub struct Configuration {
    properties: PropertySource,
}

impl Configuration {
    /// Wrap resolved properties
    pub fn new(properties: PropertySource) -> Self {
        Self { properties }
    }

    /// Every configured kubeconfig URL with its resolved filters.
    ///
    /// With a single filter group it applies to every document; with none,
    /// documents are unfiltered. Otherwise a document's key suffix (its key
    /// with the first `monitoring.kubeconfig` removed) must appear in a filter
    /// key; the first such key in lexicographic order wins.
    pub fn kubeconfigs(&self) -> Vec<KubeconfigEntry> {
        let filter_keys = self.properties.names_containing(FILTERS_PREFIX);

        self.properties
            .names_containing(KUBECONFIG_PREFIX)
            .into_iter()
            .filter_map(|key| {
                let url = self.properties.get(&key)?;
                let filters = self.filters_for(&key, &filter_keys);
                Some(KubeconfigEntry { key, url, filters })
            })
            .collect()
    }

    fn filters_for(&self, key: &str, filter_keys: &[String]) -> Result<Vec<String>, MonitorError> {
        let filter_key = match filter_keys {
            [] => return Ok(Vec::new()),
            [only] => only,
            many => {
                let suffix = key.replacen(KUBECONFIG_PREFIX, "", 1);
                many.iter().find(|candidate| candidate.contains(&suffix)).ok_or_else(|| {
                    MonitorError::InvalidConfig(format!(
                        "no {} property matches kubeconfig property {}",
                        FILTERS_PREFIX, key
                    ))
                })?
            }
        };

        Ok(split_filters(&self.properties.get(filter_key).unwrap_or_default()))
    }

    /// Namespace used by the deploy check
    pub fn namespace(&self) -> String {
        self.properties.get_or(NAMESPACE, DEFAULT_NAMESPACE)
    }

    /// Deploy check settings
    pub fn sample_app(&self) -> SampleAppSettings {
        SampleAppSettings {
            namespace: self.namespace(),
            database_url: self.properties.get_or(DATABASE_URL, DEFAULT_DATABASE_URL),
            template_url: self.properties.get_or(TEMPLATE_URL, DEFAULT_TEMPLATE_URL),
        }
    }

    /// Port of the query surface
    pub fn api_port(&self) -> Result<u16, MonitorError> {
        match self.properties.get(API_PORT) {
            Some(port) => port.parse().map_err(|e| {
                MonitorError::InvalidConfig(format!("{} must be a port number, got {:?}: {}", API_PORT, port, e))
            }),
            None => Ok(DEFAULT_API_PORT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn config(pairs: &[(&str, &str)], yaml: &str) -> Configuration {
        Configuration::new(PropertySource::from_yaml(env(pairs), yaml).unwrap())
    }

    #[test]
    fn test_name_conversions() {
        assert_eq!(to_env_name("monitoring.kubeconfig.dev"), "MONITORING_KUBECONFIG_DEV");
        assert_eq!(to_property_name("MONITORING_CONTEXT_FILTERS_DEV"), "monitoring.context.filters.dev");
    }

    #[test]
    fn test_environment_overrides_file_and_default() {
        let yaml = "sample.app.namespace: from-file\n";
        assert_eq!(config(&[], "").namespace(), "infra-test");
        assert_eq!(config(&[], yaml).namespace(), "from-file");
        assert_eq!(
            config(&[("SAMPLE_APP_NAMESPACE", "from-env")], yaml).namespace(),
            "from-env"
        );
    }

    #[test]
    fn test_quotes_are_stripped_and_empty_is_unset() {
        let properties = PropertySource::from_yaml(
            env(&[("SAMPLE_APP_NAMESPACE", ""), ("MONITORING_API_PORT", "\"9090\"")]),
            "sample.app.namespace: '\"quoted-ns\"'\n",
        )
        .unwrap();
        assert_eq!(properties.get("sample.app.namespace").as_deref(), Some("quoted-ns"));

        let config = Configuration::new(properties);
        assert_eq!(config.api_port().unwrap(), 9090);
    }

    #[test]
    fn test_nested_file_keys_are_flattened() {
        let yaml = r#"
monitoring:
  kubeconfig:
    dev: https://configs.example.com/dev
  context:
    filters: prod, east
"#;
        let entries = config(&[], yaml).kubeconfigs();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "monitoring.kubeconfig.dev");
        assert_eq!(entries[0].url, "https://configs.example.com/dev");
        assert_eq!(entries[0].filters.as_ref().unwrap(), &vec!["prod".to_string(), "east".to_string()]);
    }

    #[test]
    fn test_single_filter_group_applies_to_every_document() {
        let entries = config(
            &[
                ("MONITORING_KUBECONFIG_DEV", "https://configs.example.com/dev"),
                ("MONITORING_KUBECONFIG_QA", "https://configs.example.com/qa"),
                ("MONITORING_CONTEXT_FILTERS", "prod"),
            ],
            "",
        )
        .kubeconfigs();

        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.filters.as_ref().unwrap(), &vec!["prod".to_string()]);
        }
    }

    #[test]
    fn test_no_filter_groups_means_unfiltered() {
        let entries = config(&[("MONITORING_KUBECONFIG", "https://configs.example.com/all")], "").kubeconfigs();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].filters.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_filter_groups_correlate_by_key_suffix() {
        let entries = config(
            &[
                ("MONITORING_KUBECONFIG_DEV", "https://configs.example.com/dev"),
                ("MONITORING_KUBECONFIG_QA", "https://configs.example.com/qa"),
                ("MONITORING_KUBECONFIG_STAGE", "https://configs.example.com/stage"),
                ("MONITORING_CONTEXT_FILTERS_DEV", "dev-a"),
                ("MONITORING_CONTEXT_FILTERS_QA", "qa-a,qa-b"),
            ],
            "",
        )
        .kubeconfigs();

        let by_key: BTreeMap<_, _> = entries.into_iter().map(|e| (e.key, e.filters)).collect();
        assert_eq!(by_key["monitoring.kubeconfig.dev"].as_ref().unwrap(), &vec!["dev-a".to_string()]);
        assert_eq!(
            by_key["monitoring.kubeconfig.qa"].as_ref().unwrap(),
            &vec!["qa-a".to_string(), "qa-b".to_string()]
        );
        assert!(matches!(
            by_key["monitoring.kubeconfig.stage"],
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_environment_keys_shadow_file_keys() {
        let yaml = "monitoring.kubeconfig.file: https://configs.example.com/file\n";
        let entries = config(&[("MONITORING_KUBECONFIG_ENV", "https://configs.example.com/env")], yaml).kubeconfigs();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://configs.example.com/env");
    }

    #[test]
    fn test_sample_app_defaults_and_invalid_port() {
        let config = config(&[("MONITORING_API_PORT", "not-a-port")], "");
        let settings = config.sample_app();
        assert_eq!(settings.namespace, "infra-test");
        assert!(settings.database_url.ends_with("postgres.yaml"));
        assert!(settings.template_url.ends_with("sampleApp.yaml"));
        assert!(config.api_port().is_err());
    }

    #[test]
    fn test_split_filters() {
        assert_eq!(split_filters("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_filters("").is_empty());
    }
}
