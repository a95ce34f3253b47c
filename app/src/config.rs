//! `~/.callforge/{config,accounts,contacts,uuid}` loading.
//!
//! Mirrors the original source's config-directory bootstrap (`src/main.c`'s
//! `conf_path_get`/account-file auto-creation): a missing `accounts` file is created
//! with a commented template rather than treated as an error, and `uuid` is generated
//! once and persisted.

use std::fs;
use std::path::{Path, PathBuf};

use ua::Account;
use uuid::Uuid;

const ACCOUNTS_TEMPLATE: &str = "\
# callforge accounts file
#
# One address-of-record per line, optionally followed by `;key=value` parameters:
#
# <sip:user[:pass]@host>[;auth_user=...][;outbound=<sip:proxy>][;regint=3600]\\
#   [;fbregint=120][;answermode=manual|auto|autodelayed][;prio=0]
#
# sip:alice@example.com;auth_pass=hunter2;outbound=sip:proxy.example.com
";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Account(#[from] ua::AccountParseError),
}

/// One parsed `key value` line of the `config` file.
#[derive(Debug, Default, Clone)]
pub struct Config {
    pub audio_player: Option<String>,
    pub audio_source: Option<String>,
    pub sip_listen: Option<String>,
    pub call_max_calls: Option<u32>,
    pub net_interface: Option<String>,
    pub modules: Vec<String>,
    pub module_apps: Vec<String>,
    raw: Vec<(String, String)>,
}

impl Config {
    fn parse(contents: &str) -> Self {
        let mut config = Config::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim().to_owned();

            match key {
                "audio_player" => config.audio_player = Some(value.clone()),
                "audio_source" => config.audio_source = Some(value.clone()),
                "sip_listen" => config.sip_listen = Some(value.clone()),
                "call_max_calls" => config.call_max_calls = value.parse().ok(),
                "net_interface" => config.net_interface = Some(value.clone()),
                "module" => config.modules.push(value.clone()),
                "module_app" => config.module_apps.push(value.clone()),
                _ => {}
            }

            config.raw.push((key.to_owned(), value));
        }

        config
    }

    /// Returns the raw value of any key not promoted to a typed field above.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A read-only address-book entry loaded from `contacts`.
#[derive(Debug, Clone)]
pub struct Contact {
    pub address: String,
    pub presence: Option<String>,
}

fn read_to_string_or_default(path: &Path) -> Result<String, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_owned(),
            source,
        }),
    }
}

pub fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
        path: dir.to_owned(),
        source,
    })
}

pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    let contents = read_to_string_or_default(&dir.join("config"))?;
    Ok(Config::parse(&contents))
}

/// Loads `accounts`, auto-creating it with a commented template if it doesn't exist yet.
pub fn load_accounts(dir: &Path) -> Result<Vec<Account>, ConfigError> {
    let path = dir.join("accounts");

    if !path.exists() {
        fs::write(&path, ACCOUNTS_TEMPLATE).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
    }

    let contents = read_to_string_or_default(&path)?;
    Ok(ua::parse_accounts(&contents)?)
}

pub fn load_contacts(dir: &Path) -> Result<Vec<Contact>, ConfigError> {
    let contents = read_to_string_or_default(&dir.join("contacts"))?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (address, rest) = line.split_once(';').unwrap_or((line, ""));
            let presence = rest
                .split(';')
                .find_map(|param| param.strip_prefix("presence="))
                .map(str::to_owned);

            Contact {
                address: address.to_owned(),
                presence,
            }
        })
        .collect())
}

/// Loads the persisted instance UUID, generating and persisting a new one on first run.
pub fn load_or_create_uuid(dir: &Path) -> Result<Uuid, ConfigError> {
    let path = dir.join("uuid");

    if let Ok(contents) = fs::read_to_string(&path) {
        if let Ok(id) = contents.trim().parse() {
            return Ok(id);
        }
    }

    let id = Uuid::new_v4();
    fs::write(&path, id.to_string()).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let config = Config::parse("audio_player alsa,default\ncall_max_calls 4\n# comment\n");
        assert_eq!(config.audio_player.as_deref(), Some("alsa,default"));
        assert_eq!(config.call_max_calls, Some(4));
    }

    #[test]
    fn parses_contacts_with_presence() {
        let dir = std::env::temp_dir().join(format!("callforge-test-{}", std::process::id()));
        ensure_dir(&dir).unwrap();
        fs::write(dir.join("contacts"), "sip:alice@example.com;presence=p2p\n").unwrap();

        let contacts = load_contacts(&dir).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].presence.as_deref(), Some("p2p"));

        fs::remove_dir_all(&dir).ok();
    }
}
