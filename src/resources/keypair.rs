//! Compute keypair builder.

use serde::Serialize;

use crate::error::{ResourceError, Result};
use crate::program::{Program, ResourceHandle};

use super::KEYPAIR_TYPE;

/// Keypair arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypairConfig {
    name: String,
    public_key: String,
}

impl KeypairConfig {
    /// Creates a keypair from an OpenSSH public key line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` if the key is empty or spans several lines.
    pub fn new(name: impl Into<String>, public_key: &str) -> std::result::Result<Self, ResourceError> {
        let name = name.into();
        let public_key = public_key.trim();
        if public_key.is_empty() || public_key.lines().count() != 1 {
            return Err(ResourceError::InvalidRule {
                name,
                message: String::from("public key must be a single non-empty line"),
            });
        }
        Ok(Self {
            name,
            public_key: public_key.to_string(),
        })
    }

    /// Returns the keypair name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the public key.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeypairProperties<'a> {
    name: &'a str,
    public_key: &'a str,
}

/// Declares the keypair under its own name.
///
/// # Errors
///
/// Returns `DuplicateName` if the name is already declared.
pub fn declare_keypair(program: &mut Program, config: &KeypairConfig) -> Result<ResourceHandle> {
    program.declare(
        config.name(),
        KEYPAIR_TYPE,
        &KeypairProperties {
            name: config.name(),
            public_key: config.public_key(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_validation() {
        assert!(KeypairConfig::new("k", "").is_err());
        assert!(KeypairConfig::new("k", "ssh-ed25519 AAAA\nssh-rsa BBBB").is_err());

        let config = KeypairConfig::new("prod-alice-keypair", "ssh-ed25519 AAAA alice@host\n").unwrap();
        assert_eq!(config.public_key(), "ssh-ed25519 AAAA alice@host");

        let mut program = Program::new();
        let handle = declare_keypair(&mut program, &config).unwrap();
        assert_eq!(handle.name(), "prod-alice-keypair");
        let resource = program.resource("prod-alice-keypair").unwrap();
        assert_eq!(resource.properties["publicKey"], "ssh-ed25519 AAAA alice@host");
    }
}
