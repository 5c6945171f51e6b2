//! Agent runtime configuration.
//!
//! Configuration is read once at process startup from the agent's `config.json` and validated
//! into an immutable [`AgentConfig`], which is then passed into the scanner, upload client and
//! diagnostics. Nothing below this module reads the configuration file or the process
//! environment during a run.

use crate::constants::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_EXTENSIONS, DEFAULT_LOG_FILE_NAME, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_PROCESSED_DIR_NAME,
};
use crate::{AgentError, AgentResult};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Server section of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub url: String,
}

/// Configuration file contents as written by installers and operators.
///
/// Field names follow the keys the agent has always been configured with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    pub servidor: ServerSection,
    pub carpeta_monitoreo: PathBuf,
    #[serde(default)]
    pub extensiones: Option<Vec<String>>,
    #[serde(default)]
    pub carpeta_procesados: Option<String>,
    #[serde(default)]
    pub intervalo_verificacion: Option<u64>,
    #[serde(default)]
    pub log_archivo: Option<PathBuf>,
    #[serde(default)]
    pub espera_estabilidad: Option<u64>,
    #[serde(default)]
    pub max_subidas_concurrentes: Option<usize>,
    #[serde(default)]
    pub nombre_estacion: Option<String>,
}

/// Validated agent configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    server_url: Url,
    watch_dir: PathBuf,
    extensions: Vec<String>,
    processed_dir_name: String,
    poll_interval: Duration,
    debounce: Duration,
    log_file: PathBuf,
    max_concurrent_uploads: Option<usize>,
    station_name: Option<String>,
}

impl AgentConfig {
    /// Validate a parsed configuration file.
    ///
    /// `base_dir` is the directory relative log file paths are resolved against (normally the
    /// directory holding the configuration file).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidServerUrl`] if the server URL does not parse or is not
    /// `http`/`https`, and [`AgentError::InvalidConfig`] for any other rejected value.
    pub fn from_raw(raw: RawConfig, base_dir: &Path) -> AgentResult<Self> {
        let server_url = parse_server_url(&raw.servidor.url)?;

        if raw.carpeta_monitoreo.as_os_str().is_empty() {
            return Err(AgentError::InvalidConfig(
                "carpetaMonitoreo cannot be empty".into(),
            ));
        }

        let extensions = match raw.extensiones {
            Some(list) => normalise_extensions(&list)?,
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };

        let processed_dir_name = raw
            .carpeta_procesados
            .unwrap_or_else(|| DEFAULT_PROCESSED_DIR_NAME.to_string());
        validate_processed_dir_name(&processed_dir_name)?;

        let poll_ms = raw.intervalo_verificacion.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_ms == 0 {
            return Err(AgentError::InvalidConfig(
                "intervaloVerificacion must be greater than zero".into(),
            ));
        }

        if raw.max_subidas_concurrentes == Some(0) {
            return Err(AgentError::InvalidConfig(
                "maxSubidasConcurrentes must be greater than zero when set".into(),
            ));
        }

        let log_file = raw
            .log_archivo
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_NAME));
        let log_file = if log_file.is_absolute() {
            log_file
        } else {
            base_dir.join(log_file)
        };

        let station_name = raw
            .nombre_estacion
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            server_url,
            watch_dir: raw.carpeta_monitoreo,
            extensions,
            processed_dir_name,
            poll_interval: Duration::from_millis(poll_ms),
            debounce: Duration::from_millis(raw.espera_estabilidad.unwrap_or(DEFAULT_DEBOUNCE_MS)),
            log_file,
            max_concurrent_uploads: raw.max_subidas_concurrentes,
            station_name,
        })
    }

    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: &Path) -> AgentResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| AgentError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig =
            serde_json::from_str(&contents).map_err(|source| AgentError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_raw(raw, base_dir)
    }

    /// Server base URL with any trailing slash removed.
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// Absolute URL of `endpoint` (a path beginning with `/`) under the server base URL.
    pub fn endpoint_url(&self, endpoint: &str) -> AgentResult<Url> {
        let joined = format!("{}{}", self.server_url.as_str().trim_end_matches('/'), endpoint);
        Url::parse(&joined).map_err(|e| AgentError::InvalidServerUrl(format!("{joined}: {e}")))
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Allowed extensions, lowercase with a leading dot.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn processed_dir_name(&self) -> &str {
        &self.processed_dir_name
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn max_concurrent_uploads(&self) -> Option<usize> {
        self.max_concurrent_uploads
    }

    pub fn station_name(&self) -> Option<&str> {
        self.station_name.as_deref()
    }

    /// Returns true if `extension` (with leading dot, any case) is in the allow-list.
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let lowered = extension.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == lowered)
    }
}

fn parse_server_url(value: &str) -> AgentResult<Url> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AgentError::InvalidServerUrl("servidor.url cannot be empty".into()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| AgentError::InvalidServerUrl(format!("{trimmed}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AgentError::InvalidServerUrl(format!(
            "unsupported scheme '{other}', expected http or https"
        ))),
    }
}

/// Lowercase every entry and make sure it starts with a dot.
fn normalise_extensions(list: &[String]) -> AgentResult<Vec<String>> {
    let mut extensions: Vec<String> = Vec::with_capacity(list.len());
    for entry in list {
        let trimmed = entry.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Err(AgentError::InvalidConfig(format!(
                "invalid extension '{entry}' in extensiones"
            )));
        }
        let lowered = trimmed.to_ascii_lowercase();
        let normalised = if lowered.starts_with('.') {
            lowered
        } else {
            format!(".{lowered}")
        };
        if !extensions.contains(&normalised) {
            extensions.push(normalised);
        }
    }

    if extensions.is_empty() {
        return Err(AgentError::InvalidConfig(
            "extensiones must list at least one extension".into(),
        ));
    }
    Ok(extensions)
}

fn validate_processed_dir_name(name: &str) -> AgentResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(AgentError::InvalidConfig(format!(
            "carpetaProcesados must be a single folder name, got '{name}'"
        ))),
    }
}
