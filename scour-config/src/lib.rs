//! Loader for workspace configuration with YAML + environment overlays.
//!
//! Precedence, lowest first:
//!
//! 1. built-in defaults ([`ScourConfig::default`])
//! 2. a YAML/TOML/JSON file ([`ScourConfigLoader::with_file`])
//! 3. inline YAML snippets ([`ScourConfigLoader::with_yaml_str`])
//! 4. `SCOUR__<SECTION>__<KEY>` environment variables
//! 5. the short deployment variables (`CHROME_PATH`, `BROWSER_DOMAINS`,
//!    `FETCH_CACHE_DIR`, `SEARXNG_URL`, `RATE_LIMIT_PER_SECOND`, ...)
//!
//! String values may reference `${VAR}`; references are expanded
//! recursively before the typed structs are built.
use config::{Config, ConfigError, Environment, File};
use serde_json::Value;
use std::path::Path;

pub mod settings;

pub use settings::{
    BrowserSettings, CacheInstanceSettings, CacheSettings, FetchSettings, RateLimitSettings,
    ScourConfig, SearchSettings,
};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Shape {
    Text,
    List,
    Integer,
}

/// Short deployment variables and the config key each one feeds.
const DEPLOYMENT_ENV: &[(&str, &str, Shape)] = &[
    ("CHROME_PATH", "browser.executable_path", Shape::Text),
    ("BROWSER_DOMAINS", "browser.render_domains", Shape::List),
    ("SERIALIZE_DOMAINS", "browser.serialize_domains", Shape::List),
    ("FETCH_CACHE_DIR", "cache.page.dir", Shape::Text),
    ("REFERENCE_CACHE_DIR", "cache.reference.dir", Shape::Text),
    ("LISTING_CACHE_DIR", "cache.listing.dir", Shape::Text),
    ("DETAIL_CACHE_DIR", "cache.detail.dir", Shape::Text),
    ("SEARXNG_URL", "search.url", Shape::Text),
    ("SEARXNG_ENGINES", "search.engines", Shape::Text),
    ("SEARXNG_CATEGORIES", "search.categories", Shape::Text),
    ("SEARXNG_USERNAME", "search.username", Shape::Text),
    ("SEARXNG_PASSWORD", "search.password", Shape::Text),
    ("SEARXNG_TIMEOUT_MS", "search.timeout_ms", Shape::Integer),
    ("SEARXNG_RETRIES", "search.retries", Shape::Integer),
    ("SEARXNG_RETRY_BACKOFF_MS", "search.backoff_ms", Shape::Integer),
    ("MAX_BATCH_QUERIES", "search.max_batch_queries", Shape::Integer),
    ("RATE_LIMIT_PER_SECOND", "rate_limit.per_second", Shape::Integer),
    ("RATE_LIMIT_PER_MONTH", "rate_limit.per_month", Shape::Integer),
];

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Deep-merge `overlay` onto `base`; objects merge, everything else replaces.
fn overlay_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => overlay_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct ScourConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    deployment_env: bool,
}

impl Default for ScourConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScourConfigLoader {
    /// Start from defaults with `SCOUR__` and deployment env overrides.
    ///
    /// ```
    /// use scour_config::ScourConfigLoader;
    ///
    /// let config = ScourConfigLoader::new()
    ///     .without_deployment_env()
    ///     .with_yaml_str("browser:\n  max_pages: 2\n")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.browser.max_pages, 2);
    /// assert_eq!(config.search.retries, 2);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            deployment_env: true,
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent (headless deployments configured by env only).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Skip the short deployment variables (`SEARXNG_URL`, ...).
    pub fn without_deployment_env(mut self) -> Self {
        self.deployment_env = false;
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use scour_config::ScourConfigLoader;
    ///
    /// unsafe { std::env::set_var("SCOUR_DOC_BACKEND", "http://search.internal:8080"); }
    ///
    /// let config = ScourConfigLoader::new()
    ///     .without_deployment_env()
    ///     .with_yaml_str(r#"
    /// search:
    ///   url: "${SCOUR_DOC_BACKEND}"
    ///   retries: 4
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.search.url, "http://search.internal:8080");
    /// assert_eq!(config.search.retries, 4);
    ///
    /// unsafe { std::env::remove_var("SCOUR_DOC_BACKEND"); }
    /// ```
    pub fn load(self) -> Result<ScourConfig, ConfigError> {
        let mut builder = self.builder.add_source(
            Environment::with_prefix("SCOUR")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("browser.render_domains")
                .with_list_parse_key("browser.serialize_domains")
                .with_list_parse_key("browser.launch_args"),
        );

        if self.deployment_env {
            for (var, key, shape) in DEPLOYMENT_ENV {
                let Ok(raw) = std::env::var(var) else {
                    continue;
                };
                builder = match shape {
                    Shape::Text => builder.set_override(*key, raw)?,
                    Shape::List => builder.set_override(*key, split_list(&raw))?,
                    Shape::Integer => {
                        let n: i64 = raw.trim().parse().map_err(|_| {
                            ConfigError::Message(format!("{var} must be an integer, got {raw:?}"))
                        })?;
                        builder.set_override(*key, n)?
                    }
                };
            }
        }

        let cfg = builder.build()?;

        // Convert to serde_json::Value first
        let layered: Value = cfg.try_deserialize()?;
        let mut v = serde_json::to_value(ScourConfig::default())
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        overlay_value(&mut v, layered);
        expand_env_in_value(&mut v);

        let typed: ScourConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
