//! Configuration Management
//!
//! String-keyed TOML configuration with a discovery hierarchy and section
//! fallback, plus the typed [`ResolverSettings`] the plugin manager runs with.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use anyhow::{Context, Result};
use toml::Value;
use log::{debug, info};

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PLUGIN_RESOLVER_CONFIG";

/// Section holding resolver settings
pub const RESOLVER_SECTION: &str = "resolver";

/// Section mapping extension types to denied class names
pub const DENIED_EXTENSIONS_SECTION: &str = "extensions.denied";

/// Class names matching this pattern are never looked up in plugins
pub const DEFAULT_IGNORED_CLASS_PATTERN: &str = "^SimpleTemplateScript";

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    /// File the configuration came from, if any
    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected_section -> specified section -> base
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Get a list value; accepts a TOML array or a comma-separated string
    pub fn get_list(&self, section: &str, key: &str) -> Result<Option<Vec<String>>> {
        match self.get_value(section, key) {
            Some(value) => parse_list(value)
                .with_context(|| format!("Invalid list value for {}.{}: {}", section, key, value))
                .map(Some),
            None => Ok(None),
        }
    }

    /// Get resolver settings, starting from defaults
    pub fn get_resolver_settings(&self) -> Result<ResolverSettings> {
        let mut settings = ResolverSettings::default();

        if let Some(plugin_dir) = self.get_path(RESOLVER_SECTION, "plugin-dir") {
            settings.plugin_dir = plugin_dir;
        }
        if let Some(check_cycles) = self.get_bool(RESOLVER_SECTION, "check-cycles")? {
            settings.check_cycles = check_cycles;
        }
        if let Some(fast_lookup) = self.get_bool(RESOLVER_SECTION, "fast-lookup")? {
            settings.fast_lookup = fast_lookup;
        }
        if let Some(threads) = self.get_value(RESOLVER_SECTION, "worker-threads") {
            settings.worker_threads = threads.parse::<usize>()
                .with_context(|| format!("Invalid worker-threads value in config: {}", threads))?;
        }
        if let Some(patterns) = self.get_list(RESOLVER_SECTION, "ignored-class-patterns")? {
            settings.ignored_class_patterns = patterns;
        }
        if let Some(skip_tasks) = self.get_list(RESOLVER_SECTION, "skip-tasks")? {
            settings.skip_tasks = skip_tasks;
        }

        if let Some(denied) = self.config.get(DENIED_EXTENSIONS_SECTION) {
            for (type_name, classes) in denied {
                let classes = parse_list(classes)
                    .with_context(|| format!("Invalid denied extensions for {}: {}", type_name, classes))?;
                settings.denied_extensions.insert(type_name.clone(), classes);
            }
        }

        settings.validate()
            .with_context(|| "Resolver configuration validation failed")?;

        Ok(settings)
    }
}

/// Settings the plugin manager is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    /// Directory scanned for plugin archives
    pub plugin_dir: PathBuf,

    /// Run cycle detection when ordering plugins
    pub check_cycles: bool,

    /// Cache class lookups and their misses
    pub fast_lookup: bool,

    /// Initialization worker pool size
    pub worker_threads: usize,

    /// Regexes for class names never looked up in plugins
    pub ignored_class_patterns: Vec<String>,

    /// Initialization tasks skipped when their name starts with one of these
    pub skip_tasks: Vec<String>,

    /// Extension type -> class names filtered out of discovery
    pub denied_extensions: HashMap<String, Vec<String>>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("plugins"),
            check_cycles: true,
            fast_lookup: true,
            worker_threads: num_cpus::get(),
            ignored_class_patterns: vec![DEFAULT_IGNORED_CLASS_PATTERN.to_string()],
            skip_tasks: Vec::new(),
            denied_extensions: HashMap::new(),
        }
    }
}

impl ResolverSettings {
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            anyhow::bail!("worker-threads must be greater than 0");
        }
        if self.worker_threads > 256 {
            anyhow::bail!("worker-threads must not exceed 256, got {}", self.worker_threads);
        }
        for pattern in &self.ignored_class_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid ignored class pattern: {}", pattern))?;
        }
        if self.skip_tasks.iter().any(|prefix| prefix.trim().is_empty()) {
            anyhow::bail!("skip-tasks entries must not be empty");
        }
        Ok(())
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Environment variable
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("plugin-resolver").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".plugin-resolver.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.plugin-resolver.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse()
        .context("Failed to parse TOML content")?;

    let mut config = Configuration::new();

    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    debug!("Parsed configuration: {:?}", config);
    Ok(config)
}

/// Recursively flatten TOML tables into section.subsection format
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) => {
                if subtable.values().all(|v| !matches!(v, Value::Table(_))) {
                    let section_map = subtable
                        .iter()
                        .map(|(subkey, subvalue)| (subkey.clone(), toml_value_to_string(subvalue)))
                        .collect();
                    config.insert(section_name, section_map);
                } else {
                    flatten_toml_table(subtable, section_name, config);
                }
            }
            _ => {
                let mut section_map = HashMap::new();
                section_map.insert("value".to_string(), toml_value_to_string(value));
                config.insert(section_name, section_map);
            }
        }
    }
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
        _ => String::new(),
    }
}

/// Read back a list flattened by [`toml_value_to_string`]
fn parse_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();
    if !trimmed.starts_with('[') {
        return Ok(trimmed
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect());
    }

    let table: toml::Table = format!("list = {}", trimmed).parse()
        .context("Failed to parse TOML array")?;
    match table.get("list") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(anyhow::anyhow!("Expected a string, found {}", other)),
            })
            .collect(),
        _ => Err(anyhow::anyhow!("Expected an array")),
    }
}
