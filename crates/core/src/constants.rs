//! Constants used throughout the agent core crate.
//!
//! Defaults mirror the configuration the field agent has always shipped with, so a minimal
//! `config.json` (server URL and watched folder only) behaves exactly like a full one.

/// Extensions watched when the configuration does not list any.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".dcm", ".jpg", ".jpeg", ".png"];

/// Extension that marks a file as DICOM rather than a plain image.
pub const DICOM_EXTENSION: &str = ".dcm";

/// Default name of the processed-files folder created beneath the watched directory.
pub const DEFAULT_PROCESSED_DIR_NAME: &str = "procesados";

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Default debounce before a newly seen file is read, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// Default log file name, resolved next to the configuration file.
pub const DEFAULT_LOG_FILE_NAME: &str = "agente-rayosx.log";

/// Default configuration file name, resolved next to the executable.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.json";

/// Endpoint receiving image uploads, relative to the server base URL.
pub const UPLOAD_ENDPOINT_PATH: &str = "/api/equipos/recibir-imagen";

/// Endpoint used by the connectivity check, relative to the server base URL.
pub const STATUS_ENDPOINT_PATH: &str = "/api/equipos/estados";

/// Fixed prefix of every multipart boundary token.
pub const BOUNDARY_PREFIX: &str = "----AgenteDICOM";

/// Multipart field carrying the correlation id.
pub const FIELD_CORRELATION_ID: &str = "codigoLIS";

/// Multipart field carrying the station (host) name.
pub const FIELD_STATION_NAME: &str = "station_name";

/// Multipart field carrying the media kind tag.
pub const FIELD_MEDIA_KIND: &str = "tipo";

/// Multipart field carrying the file itself.
pub const FIELD_FILE: &str = "archivo";

/// Maximum number of characters of a raw response body kept for diagnostics.
pub const RAW_BODY_DIAGNOSTIC_CHARS: usize = 200;

/// Tracing target for success events, rendered with the `OK` level label.
pub const OK_TARGET: &str = "rayosx::ok";
