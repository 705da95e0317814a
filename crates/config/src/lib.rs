//! Configuration management for xian
//!
//! This crate provides functionality for managing the xian configuration,
//! including loading, saving, updating, and deleting configuration settings.
//! Key material is never part of the configuration.

/// Error types for the configuration module
pub mod error;

use crate::error::Error;
use clap::Parser;
use serde::{Deserialize, Serialize};
#[allow(deprecated)]
use std::env::home_dir;
use std::path::PathBuf;
use tracing::{error, info};
use xian_common::utils::io::file::{delete_path, read_file, write_file};

/// The default upper bound on contract source handed to the decompiler, in bytes.
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 1_048_576;

/// Command line arguments for the configuration command
#[derive(Debug, Clone, Parser)]
#[clap(
    about = "Display and edit the current configuration",
    override_usage = "xian config [OPTIONS]"
)]
pub struct ConfigArgs {
    /// The target key to update.
    #[clap(required = false, default_value = "")]
    key: String,

    /// The value to set the key to.
    #[clap(required = false, default_value = "")]
    value: String,
}

/// The [`Configuration`] struct represents the configuration of the CLI. All xian tool crates
/// will attempt to read from this configuration when possible.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Configuration {
    /// The chain id used for payloads that don't name one
    pub chain_id: String,

    /// The stamps supplied for payloads that don't name an amount
    pub stamps_supplied: u64,

    /// The largest contract source, in bytes, that will be handed to the parser
    pub max_source_bytes: usize,

    /// Whether decompilation fails on unparsable source instead of falling back
    pub strict_decompile: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            chain_id: String::new(),
            stamps_supplied: 0,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            strict_decompile: false,
        }
    }
}

#[allow(deprecated)]
fn config_path() -> Result<PathBuf, Error> {
    let mut home = home_dir().ok_or_else(|| {
        Error::Generic(
            "failed to get home directory. does your os support `std::env::home_dir()`?"
                .to_string(),
        )
    })?;
    home.push(".xian");
    home.push("config.toml");
    Ok(home)
}

fn path_str(path: &PathBuf) -> Result<&str, Error> {
    path.to_str().ok_or_else(|| Error::Generic("failed to convert path to string".to_string()))
}

impl Configuration {
    /// Returns the current configuration, creating the file with defaults if it doesn't exist.
    pub fn load() -> Result<Self, Error> {
        let path = config_path()?;

        // if the config file doesn't exist, create it
        if !path.exists() {
            let config = Configuration::default();
            config.save()?;
        }

        // read the config file
        let contents = read_file(path_str(&path)?)
            .map_err(|e| Error::Generic(format!("failed to read config file: {e}")))?;

        // parse the config file
        toml::from_str(&contents)
            .map_err(|e| Error::ParseError(format!("failed to parse config file: {e}")))
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> Result<(), Error> {
        let path = config_path()?;

        write_file(
            path_str(&path)?,
            &toml::to_string(&self)
                .map_err(|e| Error::ParseError(format!("failed to serialize config: {e}")))?,
        )
        .map_err(|e| Error::Generic(format!("failed to write config file: {e}")))?;

        Ok(())
    }

    /// Deletes the configuration file at `$HOME/.xian/config.toml`.
    pub fn delete() -> Result<(), Error> {
        let path = config_path()?;

        if !delete_path(path_str(&path)?) {
            return Err(Error::Generic("failed to delete config file".to_string()));
        }

        Ok(())
    }

    /// Update a single key/value pair in the configuration.
    pub fn update(&mut self, key: &str, value: &str) -> Result<(), Error> {
        // update the key in the struct and ensure it's the correct type
        match key {
            "chain_id" => {
                self.chain_id = value.to_string();
            }
            "stamps_supplied" => {
                self.stamps_supplied = value.parse().map_err(|_| {
                    Error::ParseError(format!("'{value}' is not a valid amount of stamps."))
                })?;
            }
            "max_source_bytes" => {
                self.max_source_bytes = value.parse().map_err(|_| {
                    Error::ParseError(format!("'{value}' is not a valid size in bytes."))
                })?;
            }
            "strict_decompile" => {
                self.strict_decompile = value.parse().map_err(|_| {
                    Error::ParseError(format!("'{value}' is not a valid boolean."))
                })?;
            }
            _ => return Err(Error::InvalidKey(key.to_string())),
        }

        // write the updated config to disk
        self.save()?;

        Ok(())
    }
}

/// The `config` command is used to display and edit the current configuration.
pub fn config(args: ConfigArgs) -> Result<(), Error> {
    if !args.key.is_empty() {
        if !args.value.is_empty() {
            // read the config file and update the key/value pair
            let mut config = Configuration::load()?;
            config.update(&args.key, &args.value)?;
            info!("updated configuration! Set '{}' = '{}' .", &args.key, &args.value);
        } else {
            // key is set, but no value is set
            error!("found key but no value to set. Please specify a value to set, use `xian config --help` for more information.");
        }
    } else {
        // no key is set, print the config file
        println!("{:#?}", Configuration::load()?);
        info!("use `xian config <KEY> <VALUE>` to set a key/value pair.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::{env, ffi::OsString};

    /// Points `HOME` at a scratch directory for as long as it lives.
    struct TempHome {
        path: PathBuf,
        previous: Option<OsString>,
    }

    impl TempHome {
        fn new(name: &str) -> Self {
            let path =
                env::temp_dir().join(format!("xian-config-{}-{}", std::process::id(), name));
            let previous = env::var_os("HOME");
            env::set_var("HOME", &path);
            Self { path, previous }
        }
    }

    impl Drop for TempHome {
        fn drop(&mut self) {
            match &self.previous {
                Some(home) => env::set_var("HOME", home),
                None => env::remove_var("HOME"),
            }
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert_eq!(config.chain_id, "");
        assert_eq!(config.stamps_supplied, 0);
        assert_eq!(config.max_source_bytes, DEFAULT_MAX_SOURCE_BYTES);
        assert!(!config.strict_decompile);
    }

    #[test]
    #[serial]
    fn test_load_configuration() {
        let _home = TempHome::new("load");
        Configuration::delete().expect("failed to delete config file");
        let config = Configuration::load().expect("failed to load config file");

        assert_eq!(config, Configuration::default());
    }

    #[test]
    #[serial]
    fn test_save_configuration() {
        let _home = TempHome::new("save");
        Configuration::delete().expect("failed to delete config file");
        let mut config = Configuration::default();

        config.update("chain_id", "xian-testnet-1").expect("failed to update chain_id");
        config.update("stamps_supplied", "500").expect("failed to update stamps_supplied");
        config.update("strict_decompile", "true").expect("failed to update strict_decompile");

        let loaded_config = Configuration::load().expect("failed to load config file");
        assert_eq!(loaded_config.chain_id, "xian-testnet-1");
        assert_eq!(loaded_config.stamps_supplied, 500);
        assert_eq!(loaded_config.max_source_bytes, DEFAULT_MAX_SOURCE_BYTES);
        assert!(loaded_config.strict_decompile);

        Configuration::delete().expect("failed to delete config file");
    }

    #[test]
    #[serial]
    fn test_update_rejects_bad_values() {
        let _home = TempHome::new("update");
        Configuration::delete().expect("failed to delete config file");
        let mut config = Configuration::load().expect("failed to load config file");

        assert!(matches!(config.update("stamps_supplied", "-1"), Err(Error::ParseError(_))));
        assert!(matches!(config.update("strict_decompile", "yes"), Err(Error::ParseError(_))));
        assert!(matches!(config.update("private_key", "00"), Err(Error::InvalidKey(_))));

        // nothing was persisted
        assert_eq!(Configuration::load().expect("failed to load config file"), config);
    }

    #[test]
    #[serial]
    fn test_config_file_lives_under_home() {
        let home = TempHome::new("path");
        let path = config_path().expect("failed to get config path");
        assert_eq!(path, home.path.join(".xian").join("config.toml"));

        Configuration::load().expect("failed to load config file");
        assert!(path.exists());
    }

    #[test]
    #[serial]
    fn test_partial_file_uses_defaults() {
        let config: Configuration =
            toml::from_str("chain_id = \"xian-1\"").expect("failed to parse partial config");
        assert_eq!(config.chain_id, "xian-1");
        assert_eq!(config.max_source_bytes, DEFAULT_MAX_SOURCE_BYTES);
    }
}
