//! Retriever options and store declarations.
//!
//! Options deserialise from camelCase keys (`scanPeriod`) and accept the
//! snake_case spelling (`scan_period`) as an alias. Do not mix both spellings
//! of one key in a single layered source.

use std::time::Duration;

use camino::Utf8Path;
use figment::Figment;
use figment::providers::{Env, Serialized};
use figment::value::Uncased;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ConfigurationError, Document, RelayResult, RelayResultExt, document};

/// Environment prefix read by [`RetrieverOptions::figment`].
pub const ENV_PREFIX: &str = "CONFIG_RELAY_";

const DEFAULT_SCAN_PERIOD_MS: i64 = 5000;

fn default_format() -> String {
    "json".to_owned()
}

/// Declaration of one configuration store.
///
/// # Examples
///
/// ```rust
/// use config_relay::StoreSpec;
/// use serde_json::json;
///
/// let spec: StoreSpec = serde_json::from_value(json!({
///     "type": "file",
///     "format": "properties",
///     "config": {"path": "app.properties"}
/// }))?;
/// assert_eq!(spec, StoreSpec::new("file")
///     .with_format("properties")
///     .with_option("path", "app.properties"));
/// assert!(!spec.optional);
/// # Ok::<_, serde_json::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreSpec {
    /// Registered store type, for example `file` or `http`.
    #[serde(rename = "type")]
    pub store_type: String,
    /// Format used to decode raw payloads.
    #[serde(default = "default_format")]
    pub format: String,
    /// Optional stores are expected to fail at times.
    #[serde(default)]
    pub optional: bool,
    /// Store-specific options, also handed to the format decoder.
    #[serde(default = "document::empty")]
    pub config: Document,
}

impl StoreSpec {
    /// Declare a store of `store_type` with the `json` format and no options.
    #[must_use]
    pub fn new(store_type: impl Into<String>) -> Self {
        Self {
            store_type: store_type.into(),
            format: default_format(),
            optional: false,
            config: document::empty(),
        }
    }

    /// Set the decoding format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Mark the store optional.
    #[must_use]
    pub const fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Replace the whole `config` object.
    #[must_use]
    pub fn with_config(mut self, config: Document) -> Self {
        self.config = config;
        self
    }

    /// Set a single `config` entry.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.config.is_object() {
            self.config = document::empty();
        }
        if let Value::Object(map) = &mut self.config {
            map.insert(key.into(), value.into());
        }
        self
    }
}

/// What a failing non-optional store means during the first cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum MandatoryStorePolicy {
    /// Start as long as one store succeeded.
    #[default]
    Tolerate,
    /// Refuse to start when any non-optional store failed.
    FailInitialization,
}

/// Options for a [`crate::Retriever`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrieverOptions {
    /// Stores in overlay order; later stores win.
    pub stores: Vec<StoreSpec>,
    /// Milliseconds between the end of one cycle and the start of the next.
    /// Zero or negative disables periodic scanning.
    #[serde(alias = "scan_period")]
    pub scan_period: i64,
    /// Prepend the `sys` and `env` stores to the declared ones.
    #[serde(alias = "include_default_stores")]
    pub include_default_stores: bool,
    /// Milliseconds a single fetch may take before it counts as failed.
    #[serde(alias = "store_timeout", skip_serializing_if = "Option::is_none")]
    pub store_timeout: Option<u64>,
    /// Startup policy for non-optional stores.
    #[serde(alias = "mandatory_store_policy")]
    pub mandatory_store_policy: MandatoryStorePolicy,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            stores: Vec::new(),
            scan_period: DEFAULT_SCAN_PERIOD_MS,
            include_default_stores: false,
            store_timeout: None,
            mandatory_store_policy: MandatoryStorePolicy::Tolerate,
        }
    }
}

impl RetrieverOptions {
    /// Default options: no stores, five second scan period.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a store declaration.
    #[must_use]
    pub fn with_store(mut self, store: StoreSpec) -> Self {
        self.stores.push(store);
        self
    }

    /// Set the scan period. [`Duration::ZERO`] disables periodic scanning.
    #[must_use]
    pub fn with_scan_period(mut self, period: Duration) -> Self {
        let millis = period.as_millis();
        // A non-zero period shorter than a millisecond still scans.
        let rounded = if millis == 0 && !period.is_zero() { 1 } else { millis };
        self.scan_period = i64::try_from(rounded).unwrap_or(i64::MAX);
        self
    }

    /// Disable periodic scanning; cycles then only run on
    /// [`crate::Retriever::refresh`].
    #[must_use]
    pub const fn without_scanning(mut self) -> Self {
        self.scan_period = 0;
        self
    }

    /// Prepend the default `sys` and `env` stores.
    #[must_use]
    pub const fn with_default_stores(mut self, include: bool) -> Self {
        self.include_default_stores = include;
        self
    }

    /// Bound every fetch by `timeout`.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Set the startup policy for non-optional stores.
    #[must_use]
    pub const fn with_mandatory_store_policy(mut self, policy: MandatoryStorePolicy) -> Self {
        self.mandatory_store_policy = policy;
        self
    }

    /// Delay between cycles, or `None` when periodic scanning is disabled.
    #[must_use]
    pub fn scan_period(&self) -> Option<Duration> {
        u64::try_from(self.scan_period)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Per-fetch timeout, if any.
    #[must_use]
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout.map(Duration::from_millis)
    }

    /// The stores a retriever actually runs, in overlay order.
    ///
    /// With no declared stores, or with `includeDefaultStores`, the `sys`
    /// and `env` stores come first so declared stores override them.
    #[must_use]
    pub fn effective_stores(&self) -> Vec<StoreSpec> {
        let mut stores = Vec::with_capacity(self.stores.len() + 2);
        if self.stores.is_empty() || self.include_default_stores {
            stores.push(StoreSpec::new("sys"));
            stores.push(StoreSpec::new("env"));
        }
        stores.extend(self.stores.iter().cloned());
        stores
    }

    /// Read options from a document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOptions`] when the document does
    /// not describe valid options.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use config_relay::RetrieverOptions;
    /// use serde_json::json;
    /// use std::time::Duration;
    ///
    /// let options = RetrieverOptions::from_document(json!({
    ///     "scanPeriod": 250,
    ///     "stores": [{"type": "json", "config": {"a": 1}}]
    /// }))?;
    /// assert_eq!(options.scan_period(), Some(Duration::from_millis(250)));
    /// assert_eq!(options.stores.len(), 1);
    /// # Ok::<_, std::sync::Arc<config_relay::RelayError>>(())
    /// ```
    pub fn from_document(doc: Document) -> RelayResult<Self> {
        serde_json::from_value(doc)
            .map_err(|err| ConfigurationError::InvalidOptions {
                message: err.to_string(),
            })
            .into_relay()
    }

    /// Layer defaults, an optional TOML file and `CONFIG_RELAY_*`
    /// environment variables.
    ///
    /// Environment keys are snake_case after the prefix, for example
    /// `CONFIG_RELAY_SCAN_PERIOD=1000`; nested values such as `stores` use
    /// figment's inline syntax.
    #[must_use]
    pub fn figment(file: Option<&Utf8Path>) -> Figment {
        let defaults = Figment::from(Serialized::defaults(Self::default()));
        layer_file(defaults, file)
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| Uncased::from(camel_case(key.as_str())))
                    .lowercase(false),
            )
    }

    /// Extract options from a prepared [`Figment`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOptions`] when extraction fails.
    pub fn from_figment(figment: &Figment) -> RelayResult<Self> {
        figment
            .extract()
            .map_err(|err: figment::Error| ConfigurationError::InvalidOptions {
                message: err.to_string(),
            })
            .into_relay()
    }
}

#[cfg(feature = "toml")]
fn layer_file(figment: Figment, file: Option<&Utf8Path>) -> Figment {
    use figment::providers::{Format, Toml};

    match file {
        Some(path) => figment.merge(Toml::file(path)),
        None => figment,
    }
}

#[cfg(not(feature = "toml"))]
fn layer_file(figment: Figment, file: Option<&Utf8Path>) -> Figment {
    if let Some(path) = file {
        tracing::warn!(file = %path, "TOML support is disabled; ignoring options file");
    }
    figment
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;

    use super::{MandatoryStorePolicy, RetrieverOptions, StoreSpec, camel_case};

    #[rstest]
    #[case(json!({}), Some(Duration::from_millis(5000)))]
    #[case(json!({"scanPeriod": 0}), None)]
    #[case(json!({"scanPeriod": -1}), None)]
    #[case(json!({"scan_period": 20}), Some(Duration::from_millis(20)))]
    fn scan_period_defaults_and_disabling(
        #[case] doc: serde_json::Value,
        #[case] expected: Option<Duration>,
    ) {
        let options = RetrieverOptions::from_document(doc).expect("options");
        assert_eq!(options.scan_period(), expected);
    }

    #[rstest]
    #[case(Duration::from_micros(10), Some(Duration::from_millis(1)))]
    #[case(Duration::from_millis(40), Some(Duration::from_millis(40)))]
    #[case(Duration::ZERO, None)]
    fn scan_period_from_duration_keeps_short_periods(
        #[case] period: Duration,
        #[case] expected: Option<Duration>,
    ) {
        let options = RetrieverOptions::new().with_scan_period(period);
        assert_eq!(options.scan_period(), expected);
    }

    #[test]
    fn store_spec_defaults() {
        let options = RetrieverOptions::from_document(json!({
            "stores": [{"type": "file"}],
            "mandatoryStorePolicy": "fail-initialization",
            "storeTimeout": 100
        }))
        .expect("options");
        assert_eq!(options.stores, vec![StoreSpec::new("file")]);
        assert_eq!(options.stores[0].config, json!({}));
        assert_eq!(
            options.mandatory_store_policy,
            MandatoryStorePolicy::FailInitialization
        );
        assert_eq!(options.store_timeout(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn invalid_document_is_a_configuration_error() {
        let err = RetrieverOptions::from_document(json!({"stores": "nope"}))
            .expect_err("stores must be an array");
        assert!(matches!(
            &*err,
            crate::RelayError::Configuration(crate::ConfigurationError::InvalidOptions { .. })
        ));
    }

    #[rstest]
    #[case(false, vec![], vec!["sys", "env"])]
    #[case(false, vec!["file"], vec!["file"])]
    #[case(true, vec!["file"], vec!["sys", "env", "file"])]
    fn default_stores_come_first(
        #[case] include: bool,
        #[case] declared: Vec<&str>,
        #[case] expected: Vec<&str>,
    ) {
        let options = declared
            .into_iter()
            .fold(RetrieverOptions::new().with_default_stores(include), |o, t| {
                o.with_store(StoreSpec::new(t))
            });
        let types: Vec<String> = options
            .effective_stores()
            .into_iter()
            .map(|s| s.store_type)
            .collect();
        assert_eq!(types, expected);
    }

    #[rstest]
    #[case("scan_period", "scanPeriod")]
    #[case("stores", "stores")]
    #[case("MANDATORY_STORE_POLICY", "mandatoryStorePolicy")]
    fn env_keys_become_camel_case(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(camel_case(key), expected);
    }

    #[test]
    fn figment_layers_environment_over_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CONFIG_RELAY_SCAN_PERIOD", "750");
            jail.set_env("CONFIG_RELAY_INCLUDE_DEFAULT_STORES", "true");
            let options = RetrieverOptions::from_figment(&RetrieverOptions::figment(None))
                .map_err(|e| e.to_string())?;
            assert_eq!(options.scan_period(), Some(Duration::from_millis(750)));
            assert!(options.include_default_stores);
            Ok(())
        });
    }

    #[cfg(feature = "toml")]
    #[test]
    fn figment_reads_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "relay.toml",
                r#"
scanPeriod = 100

[[stores]]
type = "json"
config = { greeting = "hi" }
"#,
            )?;
            let options = RetrieverOptions::from_figment(&RetrieverOptions::figment(Some(
                camino::Utf8Path::new("relay.toml"),
            )))
            .map_err(|e| e.to_string())?;
            assert_eq!(options.scan_period, 100);
            assert_eq!(
                options.stores,
                vec![StoreSpec::new("json").with_config(json!({"greeting": "hi"}))]
            );
            Ok(())
        });
    }
}
