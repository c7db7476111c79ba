use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use siphon_metrics::FlushConfig;

use crate::upstream::UpstreamDescriptor;

/// Defines the source of a config error.
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

impl fmt::Display for ConfigErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErrorSource::None => Ok(()),
            ConfigErrorSource::File(file_name) => {
                write!(f, " (file {})", file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, " (field {name})"),
        }
    }
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    error: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            error: None,
        }
    }

    #[inline]
    fn wrap<E>(error: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            error: Some(error.into()),
        }
    }

    #[inline]
    fn for_field<E>(error: E, field: &'static str) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self::wrap(error, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, p: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.source)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.error.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
    /// Email or API token are not configured.
    #[error("missing credentials, both email and token are required")]
    MissingCredentials,
}

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables.
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The metrics API origin.
    pub api: Option<String>,
    /// The account email used for authentication.
    pub email: Option<String>,
    /// The API token used for authentication.
    pub token: Option<String>,
    /// The default source of all measurements.
    pub source: Option<String>,
    /// The forward proxy for outbound requests.
    pub proxy: Option<String>,
}

/// Borrowed credentials for the metrics API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credentials<'a> {
    /// The account email.
    pub email: &'a str,
    /// The API token.
    pub token: &'a str,
}

/// Controls the connection to the metrics API.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Upstream {
    /// Origin of the metrics API.
    api: UpstreamDescriptor,
    /// Account email for Basic authentication.
    email: Option<String>,
    /// API token for Basic authentication.
    token: Option<String>,
    /// URI of a forward proxy all requests are tunneled through.
    proxy: Option<String>,
    /// Timeout for a single request in seconds.
    timeout: u64,
    /// Delay before retrying a failed request in seconds.
    retry_delay: u64,
    /// Product token sent in the `User-Agent` header instead of `siphon`.
    user_agent: Option<String>,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            api: UpstreamDescriptor::default(),
            email: None,
            token: None,
            proxy: None,
            timeout: 4,
            retry_delay: 5,
            user_agent: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ConfigValues {
    #[serde(default)]
    upstream: Upstream,
    #[serde(default)]
    metrics: FlushConfig,
    #[serde(default)]
    logging: siphon_log::LogConfig,
}

impl ConfigValues {
    /// The name of the config file within the config folder.
    const FILE_NAME: &'static str = "config.yml";

    fn path(base: &Path) -> PathBuf {
        base.join(Self::FILE_NAME)
    }

    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = fs::File::open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path))?;

        serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }

    fn save(&self, base: &Path) -> Result<(), ConfigError> {
        let path = Self::path(base);
        let mut options = fs::OpenOptions::new();
        options.write(true).truncate(true).create(true);

        // The file contains the API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let f = options
            .open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(&path))?;

        serde_yaml::to_writer(f, self)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(&path))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pattern) = &self.metrics.source_regex {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::for_field(e, "metrics.source_regex"))?;
        }

        if self.metrics.batch_size == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("metrics.batch_size"));
        }

        Ok(())
    }
}

/// Config struct.
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Config {
    /// Loads a config from a given config folder.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = std::env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let values = ConfigValues::load(&path)?;
        values.validate().map_err(|e| match e.source {
            ConfigErrorSource::None => e.file(&path),
            _ => e,
        })?;

        Ok(Config { values, path })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        let values: ConfigValues = serde_json::from_value(value)
            .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?;
        values.validate()?;

        Ok(Config {
            values,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters).
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let upstream = &mut self.values.upstream;

        if let Some(api) = overrides.api {
            upstream.api = api
                .parse::<UpstreamDescriptor>()
                .map_err(|err| ConfigError::for_field(err, "api"))?;
        }

        if overrides.email.is_some() {
            upstream.email = overrides.email;
        }

        if overrides.token.is_some() {
            upstream.token = overrides.token;
        }

        if overrides.proxy.is_some() {
            upstream.proxy = overrides.proxy;
        }

        if overrides.source.is_some() {
            self.values.metrics.source = overrides.source;
        }

        Ok(self)
    }

    /// Checks if the config is already initialized.
    pub fn config_exists<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(ConfigValues::path(path.as_ref())).is_ok()
    }

    /// Returns the folder this config was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the config in the given config folder as `config.yml`.
    ///
    /// The folder is created if it does not exist. Afterwards, the config refers to this folder.
    pub fn save_in_folder<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if fs::metadata(path).is_err() {
            fs::create_dir_all(path)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(path))?;
        }

        self.values.save(path)?;
        self.path = path.to_path_buf();
        Ok(())
    }

    /// Replaces the API token with a placeholder, for displaying the config.
    pub fn redact_credentials(&mut self) -> &mut Self {
        if let Some(token) = &mut self.values.upstream.token {
            *token = "********".to_owned();
        }
        self
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the origin of the metrics API.
    pub fn api(&self) -> &UpstreamDescriptor {
        &self.values.upstream.api
    }

    /// Returns the credentials for the metrics API.
    ///
    /// Fails with [`ConfigErrorKind::MissingCredentials`] unless both email and token are set.
    pub fn credentials(&self) -> Result<Credentials<'_>, ConfigError> {
        let upstream = &self.values.upstream;
        match (upstream.email.as_deref(), upstream.token.as_deref()) {
            (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
                Ok(Credentials { email, token })
            }
            _ => Err(ConfigError::new(ConfigErrorKind::MissingCredentials)),
        }
    }

    /// Returns the URI of the forward proxy, if configured.
    pub fn proxy(&self) -> Option<&str> {
        self.values.upstream.proxy.as_deref()
    }

    /// Returns the timeout for a single request to the metrics API.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.values.upstream.timeout)
    }

    /// Returns the delay before a failed request is retried.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.values.upstream.retry_delay)
    }

    /// Returns the value of the `User-Agent` header.
    pub fn user_agent(&self) -> String {
        let product = self.values.upstream.user_agent.as_deref().unwrap_or("siphon");
        format!("{product}/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Returns the default source attached to every batch.
    pub fn source(&self) -> Option<&str> {
        self.values.metrics.source.as_deref()
    }

    /// Returns the parameters for converting snapshots into batches.
    pub fn flush_config(&self) -> &FlushConfig {
        &self.values.metrics
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &siphon_log::LogConfig {
        &self.values.logging
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: ConfigValues::default(),
            path: PathBuf::new(),
        }
    }
}
