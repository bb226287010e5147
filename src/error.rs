//! Error types for the Stackyard deployment tool.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration loading, resource validation, VM placement, cloud catalog
//! lookups, and the provisioning engine.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Stackyard.
#[derive(Debug, Error)]
pub enum StackyardError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resource argument validation errors.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// VM placement errors.
    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),

    /// Cloud catalog errors.
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Provisioning engine errors.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required configuration key is absent.
    #[error("Missing required configuration key: {key}")]
    MissingConfiguration {
        /// The missing key.
        key: String,
    },

    /// A configuration value has the wrong shape.
    #[error("Invalid value for configuration key {key}: {message}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Description of the problem.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Type of resource.
        resource_type: String,
        /// The duplicated name.
        name: String,
    },
}

/// Resource argument validation errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Network, subnet, DNS or DHCP pool settings are invalid.
    #[error("Invalid network configuration: {message}")]
    InvalidNetworkConfig {
        /// Description of the problem.
        message: String,
    },

    /// An address or CIDR string could not be parsed.
    #[error("Wrong IP address provided: {value}")]
    InvalidAddress {
        /// The unparseable value.
        value: String,
    },

    /// A security group rule is invalid.
    #[error("Invalid security group rule {name}: {message}")]
    InvalidRule {
        /// Rule name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// Instance arguments are invalid.
    #[error("Invalid instance {name}: {message}")]
    InvalidInstance {
        /// Instance name.
        name: String,
        /// Description of the problem.
        message: String,
    },
}

/// VM placement errors.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The persisted network configuration has no CIDR for the network.
    #[error("CIDR for network {network} not found in {path}")]
    NetworkNotFound {
        /// Network name.
        network: String,
        /// Persisted stack file that was searched.
        path: PathBuf,
    },

    /// A fixed IP lies outside its network's CIDR.
    #[error("VM ip {address} for {host} not in CIDR {cidr}")]
    AddressOutsideCidr {
        /// Requested fixed address.
        address: String,
        /// Inventory host name.
        host: String,
        /// Network CIDR.
        cidr: String,
    },

    /// No SSH public key could be found.
    #[error("SSH public key not found: {path}")]
    SshKeyNotFound {
        /// Path that was tried.
        path: PathBuf,
    },
}

/// Cloud catalog errors.
#[derive(Debug, Error)]
pub enum CloudError {
    /// No resource of the kind carries the name.
    #[error("{kind} {name} not found")]
    LookupNotFound {
        /// Resource kind (flavor, image, network, router).
        kind: String,
        /// Looked-up name.
        name: String,
    },

    /// More than one resource carries the name.
    #[error("{kind} {name} is ambiguous: {count} matches")]
    AmbiguousLookup {
        /// Resource kind.
        kind: String,
        /// Looked-up name.
        name: String,
        /// Number of matches.
        count: usize,
    },

    /// Authentication failed.
    #[error("OpenStack authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The service catalog lacks an endpoint.
    #[error("No {interface} endpoint for service {service}")]
    EndpointNotFound {
        /// Service type (compute, image, network).
        service: String,
        /// Endpoint interface.
        interface: String,
    },

    /// API request failed.
    #[error("OpenStack API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with OpenStack: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from OpenStack API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Provisioning engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine binary could not be started.
    #[error("Failed to spawn {command}: {message}")]
    SpawnFailed {
        /// Command line that was attempted.
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// The engine exited unsuccessfully.
    #[error("{command} failed in {work_dir} (exit status: {})", exit_status(.code))]
    CommandFailed {
        /// Command line that failed.
        command: String,
        /// Unit directory.
        work_dir: PathBuf,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },
}

/// Renders an optional exit code for error messages.
fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| String::from("signal"), |c| c.to_string())
}

/// Result type alias for Stackyard operations.
pub type Result<T> = std::result::Result<T, StackyardError>;

impl StackyardError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the process exit code for this error.
    ///
    /// Engine failures propagate the engine's own exit status.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Engine(EngineError::CommandFailed { code: Some(code), .. }) => {
                u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1)
            }
            _ => 1,
        }
    }
}

impl ConfigError {
    /// Creates a missing-configuration error for a key.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingConfiguration { key: key.into() }
    }

    /// Creates an invalid-value error for a key.
    #[must_use]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ResourceError {
    /// Creates an invalid network configuration error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::InvalidNetworkConfig {
            message: message.into(),
        }
    }
}

impl CloudError {
    /// Creates a lookup-not-found error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::LookupNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
