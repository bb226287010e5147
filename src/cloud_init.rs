//! Cloud-init user data.
//!
//! The unit's cloud-init document is read, the operator's public key is
//! injected into the first user, and the result is wrapped in a single-part
//! MIME multipart message and base64-encoded.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::{ConfigError, Result, StackyardError};

/// MIME boundary of the rendered message.
const MIME_BOUNDARY: &str = "MIMEBOUNDARY";

/// File name of the cloud-config part.
const PART_FILENAME: &str = "cloud-config.yaml";

/// Rendered user data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    /// The cloud-config document after key injection.
    pub document: String,
    /// Base64-encoded MIME message passed to the instance.
    pub encoded: String,
}

/// Returns the default public key path, `~/.ssh/id_rsa.pub`.
#[must_use]
pub fn default_public_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("id_rsa.pub"))
}

/// Finds the operator's SSH public key.
///
/// An explicit path is tried first, then `~/.ssh/id_rsa.pub`.
#[must_use]
pub fn discover_public_key(explicit: Option<&Path>) -> Option<String> {
    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(default_public_key_path());

    for path in candidates {
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                debug!("Using SSH public key {}", path.display());
                return Some(content.trim().to_string());
            }
            Ok(_) => warn!("SSH public key {} is empty", path.display()),
            Err(_) => debug!("No SSH public key at {}", path.display()),
        }
    }

    None
}

/// Renders a cloud-init file into user data.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML.
pub fn render_file(path: &Path, public_key: Option<&str>) -> Result<UserData> {
    let content = std::fs::read_to_string(path).map_err(|_| {
        StackyardError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })
    })?;
    render(&content, public_key).map_err(|e| match e {
        StackyardError::Config(ConfigError::ParseError { message, .. }) => {
            StackyardError::Config(ConfigError::ParseError {
                message,
                location: Some(path.display().to_string()),
            })
        }
        other => other,
    })
}

/// Renders a cloud-init document into user data.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML.
pub fn render(content: &str, public_key: Option<&str>) -> Result<UserData> {
    let mut document: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
        message: format!("Invalid cloud-init document: {e}"),
        location: None,
    })?;

    if let Some(key) = public_key {
        inject_key(&mut document, key);
    }

    let document = serde_yaml::to_string(&document)
        .map_err(|e| StackyardError::internal(format!("Cannot render cloud-init: {e}")))?;
    let encoded = STANDARD.encode(mime_message(&document));

    Ok(UserData { document, encoded })
}

fn inject_key(document: &mut Value, key: &str) {
    match document.get_mut("users").and_then(|users| users.get_mut(0)) {
        Some(Value::Mapping(user)) => {
            user.insert(
                Value::from("ssh_authorized_keys"),
                Value::Sequence(vec![Value::from(key)]),
            );
        }
        _ => warn!("cloud-init document has no first user; SSH key not injected"),
    }
}

fn mime_message(document: &str) -> String {
    let mut message = String::new();
    let _ = write!(
        message,
        "Content-Type: multipart/mixed; boundary=\"{MIME_BOUNDARY}\"\r\n\
         MIME-Version: 1.0\r\n\r\n\
         --{MIME_BOUNDARY}\r\n\
         Content-Disposition: attachment; filename=\"{PART_FILENAME}\"\r\n\
         Content-Transfer-Encoding: 7bit\r\n\
         Content-Type: text/cloud-config\r\n\
         Mime-Version: 1.0\r\n\r\n\
         {document}\r\n\
         --{MIME_BOUNDARY}--\r\n"
    );
    message
}
