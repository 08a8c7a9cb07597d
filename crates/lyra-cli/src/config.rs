//! Configuration file for `lyra-dav`.
//!
//! ```toml
//! [server]
//! port = 8080
//! bind = "127.0.0.1"
//!
//! [dav]
//! prefix = "/webdav"
//!
//! [auth]
//! token_secret = "change-me"
//!
//! [storage]
//! data_dir = "/var/lib/lyra/blobs"
//!
//! [[users]]
//! id = 1
//! username = "alice"
//! password = "secret"
//!
//! [[spaces]]
//! name = "s1"
//! kind = "personal"
//! owner = "alice"
//! editors = ["bob"]
//! ```

use anyhow::{Context, Result, bail};
use lyra_store::SpaceKind;
use lyra_webdav::{DavConfig, ServerConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerSection,
    pub dav: DavConfig,
    pub auth: AuthSection,
    pub storage: StorageSection,
    pub users: Vec<UserEntry>,
    pub spaces: Vec<SpaceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub port: u16,
    pub bind: IpAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    /// Enables bearer tokens when set.
    pub token_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Keep content on disk here; in memory when absent.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub id: u64,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceEntry {
    pub name: String,
    pub kind: SpaceKind,
    /// Username of the owner.
    pub owner: String,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub viewers: Vec<String>,
}

/// Default config file location.
pub fn default_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("LYRA_CONFIG_DIR") {
        return Some(PathBuf::from(dir).join("config.toml"));
    }
    directories::ProjectDirs::from("org", "lyra", "lyra")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl AppConfig {
    /// Load from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };
        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !self.dav.prefix.is_empty() && !self.dav.prefix.starts_with('/') {
            bail!("dav.prefix must start with '/': {}", self.dav.prefix);
        }
        if self.dav.listing_limit == 0 {
            bail!("dav.listing_limit must be at least 1");
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for user in &self.users {
            if user.username.is_empty() || user.username.contains(':') {
                bail!("invalid username '{}'", user.username);
            }
            if !ids.insert(user.id) {
                bail!("duplicate user id {}", user.id);
            }
            if !names.insert(user.username.as_str()) {
                bail!("duplicate username '{}'", user.username);
            }
        }

        let mut spaces = HashSet::new();
        for space in &self.spaces {
            if space.name.is_empty() || space.name.contains('/') {
                bail!("invalid space name '{}'", space.name);
            }
            if !spaces.insert((space.kind, space.owner.as_str(), space.name.as_str())) {
                bail!("duplicate {} space '{}' for {}", space.kind, space.name, space.owner);
            }
            let members = std::iter::once(&space.owner)
                .chain(&space.editors)
                .chain(&space.viewers);
            for member in members {
                if !names.contains(member.as_str()) {
                    bail!("space '{}' refers to unknown user '{member}'", space.name);
                }
            }
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.server.port,
            bind_address: self.server.bind,
        }
    }

    /// Id of the user named `username`.
    pub fn user_id(&self, username: &str) -> Option<u64> {
        self.users.iter().find(|u| u.username == username).map(|u| u.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
port = 9000
bind = "0.0.0.0"

[dav]
listing_limit = 50

[auth]
token_secret = "s3cret"

[[users]]
id = 1
username = "alice"
password = "pw"

[[users]]
id = 2
username = "bob"
password = "pw"
admin = true

[[spaces]]
name = "s1"
kind = "personal"
owner = "alice"
editors = ["bob"]

[[spaces]]
name = "team"
kind = "enterprise"
owner = "bob"
viewers = ["alice"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server_config().bind_address.to_string(), "0.0.0.0");
        assert_eq!(config.dav.listing_limit, 50);
        // Untouched fields keep their defaults
        assert_eq!(config.dav.prefix, "/webdav");
        assert_eq!(config.auth.token_secret.as_deref(), Some("s3cret"));
        assert!(config.storage.data_dir.is_none());
        assert_eq!(config.users.len(), 2);
        assert!(config.users[1].admin);
        assert_eq!(config.spaces[1].kind, SpaceKind::Enterprise);
        assert_eq!(config.user_id("bob"), Some(2));
    }

    #[test]
    fn test_empty_is_default() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.users.is_empty());
        assert_eq!(config.dav, DavConfig::default());
    }

    #[test]
    fn test_rejects_unknown_member() {
        let text = r#"
[[users]]
id = 1
username = "alice"
password = "pw"

[[spaces]]
name = "s1"
kind = "personal"
owner = "alice"
viewers = ["mallory"]
"#;
        let err = AppConfig::parse(text).unwrap_err();
        assert!(err.to_string().contains("mallory"));
    }

    #[test]
    fn test_rejects_duplicate_users() {
        let text = r#"
[[users]]
id = 1
username = "alice"
password = "pw"

[[users]]
id = 1
username = "bob"
password = "pw"
"#;
        let err = AppConfig::parse(text).unwrap_err();
        assert!(err.to_string().contains("duplicate user id"));
    }

    #[test]
    fn test_rejects_unknown_fields_and_kinds() {
        assert!(AppConfig::parse("[server]\nprot = 1\n").is_err());

        let text = r#"
[[users]]
id = 1
username = "alice"
password = "pw"

[[spaces]]
name = "s1"
kind = "shared"
owner = "alice"
"#;
        assert!(AppConfig::parse(text).is_err());
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let err = AppConfig::parse("[dav]\nprefix = \"webdav\"\n").unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());

        let present = dir.path().join("config.toml");
        std::fs::write(&present, SAMPLE).unwrap();
        assert_eq!(AppConfig::load(Some(&present)).unwrap().server.port, 9000);
    }
}
