//! Unit entry points.
//!
//! Every unit directory names the program it renders in `unit.yaml`. The
//! [`ProgramWriter`] loads the unit's manifest, entry point and stack
//! configuration, builds the program and writes it to `Main.yaml` for the
//! engine's YAML runtime.

mod instances;
mod keys;
mod network;
mod security_group;

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::cloud::LookupCache;
use crate::config::{Config, ConfigParser, PROGRAM_FILE, ProgramHasher, StackContext, UnitKind, UnitSpec};
use crate::error::Result;
use crate::program::Program;

/// Renders a unit's program before the engine runs it.
#[async_trait]
pub trait UnitRenderer: Send + Sync {
    /// Renders the program of the unit in `work_dir` for `stack`.
    async fn render(&self, work_dir: &Path, stack: &str) -> Result<()>;
}

/// Builds the program a unit declares.
///
/// # Errors
///
/// Returns configuration, lookup, placement or validation errors.
pub async fn build_program(unit: &UnitSpec, config: &Config, lookups: &LookupCache) -> Result<Program> {
    match unit.kind {
        UnitKind::Network => network::build(config, lookups).await,
        UnitKind::Keys => keys::build(config),
        UnitKind::SecurityGroup => security_group::build(config),
        UnitKind::Instances => instances::build(unit, config, lookups).await,
    }
}

/// Writes rendered programs to the unit directories.
#[derive(Debug)]
pub struct ProgramWriter {
    parser: ConfigParser,
    hasher: ProgramHasher,
    lookups: LookupCache,
}

impl ProgramWriter {
    /// Creates a writer whose lookups are cached for its lifetime.
    #[must_use]
    pub const fn new(lookups: LookupCache) -> Self {
        Self {
            parser: ConfigParser::new(),
            hasher: ProgramHasher::new(),
            lookups,
        }
    }

    /// Loads and builds the program of a unit without writing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be loaded or built.
    pub async fn build(&self, work_dir: &Path, stack: &str) -> Result<Program> {
        let manifest = self.parser.load_manifest(work_dir)?;
        let unit = self.parser.load_unit(work_dir)?;
        let context = StackContext::new(manifest.name, stack, work_dir);
        let config = Config::load(&context, None)?;

        debug!("Building {} program for {}", unit.kind, config.fullname());
        build_program(&unit, &config, &self.lookups).await
    }

    /// Writes `content` to the program file unless it is unchanged.
    ///
    /// Returns true if the file was written.
    async fn write_if_changed(&self, work_dir: &Path, content: &str) -> Result<bool> {
        let path = work_dir.join(PROGRAM_FILE);
        let new_hash = self.hasher.hash_program(content);

        if let Ok(existing) = tokio::fs::read_to_string(&path).await {
            let old_hash = self.hasher.hash_program(&existing);
            if ProgramHasher::hashes_match(&old_hash, &new_hash) {
                debug!("Program {} unchanged ({})", path.display(), self.hasher.short_hash(&new_hash));
                return Ok(false);
            }
        }

        tokio::fs::write(&path, content).await?;
        info!("Wrote {} ({})", path.display(), self.hasher.short_hash(&new_hash));
        Ok(true)
    }
}

#[async_trait]
impl UnitRenderer for ProgramWriter {
    async fn render(&self, work_dir: &Path, stack: &str) -> Result<()> {
        let program = self.build(work_dir, stack).await?;
        let content = program.to_yaml()?;
        self.write_if_changed(work_dir, &content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{Flavor, Image, MockCatalog, Network, Router};
    use crate::config::{ENTRY_POINT_FILE, MANIFEST_FILE};
    use crate::error::{ConfigError, StackyardError};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn catalog() -> MockCatalog {
        let mut catalog = MockCatalog::new();
        catalog.expect_find_flavor().returning(|name| {
            Ok(Flavor {
                id: format!("flavor-{name}"),
                name: name.to_string(),
                vcpus: 1,
                ram: 1024,
                disk: 10,
            })
        });
        catalog.expect_find_image().returning(|name| {
            Ok(Image {
                id: format!("image-{name}"),
                name: name.to_string(),
                status: None,
            })
        });
        catalog.expect_find_network().returning(|name| {
            Ok(Network {
                id: format!("id-{name}"),
                name: name.to_string(),
                external: name == "public",
            })
        });
        catalog.expect_find_router().returning(|name| {
            Ok(Router {
                id: format!("router-{name}"),
                name: name.to_string(),
            })
        });
        catalog
    }

    fn writer() -> ProgramWriter {
        ProgramWriter::new(LookupCache::new(Arc::new(catalog())))
    }

    fn unit_dir(root: &Path, rel: &str, project: &str, unit: &str, stack_config: &str) -> PathBuf {
        let dir = root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), format!("name: {project}\nruntime: yaml\n")).unwrap();
        std::fs::write(dir.join(ENTRY_POINT_FILE), unit).unwrap();
        std::fs::write(dir.join("Pulumi.dev.yaml"), stack_config).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_network_unit() {
        let root = tempfile::tempdir().unwrap();
        let dir = unit_dir(
            root.path(),
            "infra/network",
            "infra.network",
            "kind: network\n",
            r"
config:
  infra.network:external_network: public
  infra.network:default_router: router1
  infra.network:default_dns: ['8.8.8.8', '1.1.1.1']
  infra.network:networks:
    - name: net1
      cidr: 10.0.0.0/24
    - name: net2
      cidr: 10.0.1.0/24
      dhcp: false
      router: router2
",
        );

        let program = writer().build(&dir, "dev").await.unwrap();

        let subnet = program.resource("dev-net1-subnet").unwrap();
        assert_eq!(subnet.properties["allocationPools"][0]["start"], "10.0.0.11");
        assert_eq!(subnet.properties["allocationPools"][0]["end"], "10.0.0.100");
        assert_eq!(subnet.properties["dnsNameservers"][0], "8.8.8.8");

        let subnet2 = program.resource("dev-net2-subnet").unwrap();
        assert_eq!(subnet2.properties["enableDhcp"], false);
        assert!(subnet2.properties.get("allocationPools").is_none());

        let iface = program.resource("dev-net2-router-iface").unwrap();
        assert_eq!(iface.properties["routerId"], "router-router2");

        assert_eq!(program.output("external_network_name").unwrap(), "public");
        let networks = program.output("networks").unwrap();
        assert_eq!(networks[0]["network_id"], "${dev-net1.id}");
        assert_eq!(networks[0]["subnet"]["dhcp_pool"], "${dev-net1-subnet.allocationPools[0]}");
    }

    #[tokio::test]
    async fn test_network_unit_ignores_malformed_default_dns() {
        let root = tempfile::tempdir().unwrap();
        let dir = unit_dir(
            root.path(),
            "infra/network",
            "infra.network",
            "kind: network\n",
            r"
config:
  infra.network:external_network: public
  infra.network:default_router: router1
  infra.network:default_dns: 42
  infra.network:networks:
    - name: net1
      cidr: 10.0.0.0/24
      dns: ['9.9.9.9', '1.1.1.1']
",
        );

        let program = writer().build(&dir, "dev").await.unwrap();
        let subnet = program.resource("dev-net1-subnet").unwrap();
        assert_eq!(subnet.properties["dnsNameservers"][0], "9.9.9.9");
    }

    #[tokio::test]
    async fn test_network_unit_rejects_bad_prefix() {
        let root = tempfile::tempdir().unwrap();
        let dir = unit_dir(
            root.path(),
            "infra/network",
            "infra.network",
            "kind: network\n",
            r"
config:
  external_network: public
  default_router: router1
  networks:
    - name: net1
      cidr: 10.0.0.0/16
",
        );

        let result = writer().build(&dir, "dev").await;
        assert!(matches!(result, Err(StackyardError::Resource(_))));
    }

    #[tokio::test]
    async fn test_security_group_unit() {
        let root = tempfile::tempdir().unwrap();
        let dir = unit_dir(
            root.path(),
            "infra/sg/default",
            "infra.sg.default",
            "kind: security-group\n",
            r#"
config:
  infra.sg.default:delete_default_rules: "true"
  infra.sg.default:default_sg_rules:
    - port: 22
    - port: 0
      protocol: icmp
  infra.sg.default:sg_rules: '[{"port": 443}]'
"#,
        );

        let program = writer().build(&dir, "prod").await.unwrap();
        assert!(program.resource("prod-sg-default").is_some());
        assert!(program.resource("prod-sg-default-rule-ingress-tcp-443").is_some());
        assert!(program.resource("prod-sg-default-rule-ingress-tcp-22").is_none());
        assert_eq!(
            program.resource("prod-sg-default").unwrap().properties["description"],
            "prod-sg-default Security Group"
        );
        assert_eq!(program.output("sg").unwrap()["id"], "${prod-sg-default.id}");
    }

    #[tokio::test]
    async fn test_security_group_unit_requires_rules() {
        let root = tempfile::tempdir().unwrap();
        let dir = unit_dir(root.path(), "infra/sg/default", "infra.sg.default", "kind: security-group\n", "");

        let result = writer().build(&dir, "prod").await;
        match result {
            Err(StackyardError::Config(ConfigError::MissingConfiguration { key })) => {
                assert_eq!(key, "infra.sg.default:default_sg_rules");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_keys_unit() {
        let root = tempfile::tempdir().unwrap();
        let key_file = root.path().join("id.pub");
        std::fs::write(&key_file, "ssh-ed25519 AAAA ops@host\n").unwrap();

        let dir = unit_dir(
            root.path(),
            "infra/keys",
            "infra.keys",
            "kind: keys\n",
            &format!(
                "config:\n  infra.keys:home_key: true\n  infra.keys:ssh_public_key_file: {}\n",
                key_file.display()
            ),
        );

        let program = writer().build(&dir, "prod").await.unwrap();
        let keypair = program.resources().first().unwrap();
        assert!(keypair.name.starts_with("prod-"));
        assert!(keypair.name.ends_with("-keypair"));
        assert_eq!(keypair.properties["publicKey"], "ssh-ed25519 AAAA ops@host");
        assert!(program.output("keypair").is_some());

        let disabled = unit_dir(root.path(), "infra/keys2", "infra.keys", "kind: keys\n", "");
        let program = writer().build(&disabled, "prod").await.unwrap();
        assert!(program.resources().is_empty());
        assert!(program.output("keypair").is_none());
    }

    #[tokio::test]
    async fn test_instances_unit_with_cloud_init() {
        let root = tempfile::tempdir().unwrap();
        unit_dir(
            root.path(),
            "infra/network",
            "infra.network",
            "kind: network\n",
            "config:\n  infra.network:networks:\n    - name: net1\n      cidr: 10.0.0.0/24\n",
        );
        let dir = unit_dir(
            root.path(),
            "app/web",
            "app.web",
            "kind: instances\ncloud_init: cloud_init.yaml\n",
            r"
config:
  app.web:default_network: net1
  app.web:default_image: ubuntu
  app.web:default_flavor: m1.small
  app.web:inventory:
    - host: web1
      fixed_ip: 10.0.0.5
      nat: true
    - host: web2
",
        );
        std::fs::write(dir.join("cloud_init.yaml"), "users:\n  - name: ops\n").unwrap();

        let program = writer().build(&dir, "dev").await.unwrap();

        let net_ref = program.resource("network-stack").unwrap();
        assert_eq!(net_ref.properties["name"], "organization/infra.network/dev");
        let sg_ref = program.resource("security-group-stack").unwrap();
        assert_eq!(sg_ref.properties["name"], "organization/infra.sg.default/prod");

        let web1 = program.resource("dev-vm-web1").unwrap();
        assert!(web1.properties.get("userData").is_some());
        assert!(web1.properties.get("keyPair").is_none());
        assert!(program.resource("dev-fip-web1").is_some());
        assert!(program.resource("dev-fip-web2").is_none());

        let instances = program.output("instances").unwrap();
        assert_eq!(instances.as_array().unwrap().len(), 2);
        assert_eq!(instances[1]["nat"], serde_json::Value::Null);
        assert_eq!(
            program.output("cloud-init").unwrap(),
            &web1.properties["userData"]
        );
    }

    #[tokio::test]
    async fn test_instances_unit_fixed_ip_outside_cidr() {
        let root = tempfile::tempdir().unwrap();
        unit_dir(
            root.path(),
            "infra/network",
            "infra.network",
            "kind: network\n",
            "config:\n  infra.network:networks:\n    - name: net1\n      cidr: 10.0.1.0/24\n",
        );
        let dir = unit_dir(
            root.path(),
            "app/web",
            "app.web",
            "kind: instances\n",
            r"
config:
  default_network: net1
  default_image: ubuntu
  default_flavor: m1.small
  inventory:
    - host: web1
      fixed_ip: 10.0.0.5
",
        );

        let result = writer().build(&dir, "dev").await;
        assert!(matches!(result, Err(StackyardError::Placement(_))));
    }

    #[tokio::test]
    async fn test_render_writes_only_on_change() {
        let root = tempfile::tempdir().unwrap();
        let dir = unit_dir(
            root.path(),
            "infra/sg/default",
            "infra.sg.default",
            "kind: security-group\n",
            "config:\n  default_sg_rules:\n    - port: 22\n",
        );

        let writer = writer();
        writer.render(&dir, "prod").await.unwrap();
        let written = std::fs::read_to_string(dir.join(PROGRAM_FILE)).unwrap();
        assert!(written.contains("openstack:networking:SecGroupRule"));

        let program = writer.build(&dir, "prod").await.unwrap();
        let content = program.to_yaml().unwrap();
        assert!(!writer.write_if_changed(&dir, &content).await.unwrap());
        assert!(writer.write_if_changed(&dir, "resources: {}\n").await.unwrap());
    }
}
