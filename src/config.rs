use confique::Config as _;
use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::prelude::*;


/// Environment variable that overrides the config file search.
const PATH_ENV: &str = "PROJMAN_CONFIG_PATH";

/// Searched in order if `PATH_ENV` is not set.
const DEFAULT_PATHS: &[&str] = &[
    #[cfg(debug_assertions)]
    "util/dev-config/config.toml",
    "config.toml",
    "/etc/projman/config.toml",
];

/// Configuration for projman. Relative paths are resolved against the
/// directory containing the config file.
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) http: crate::http::HttpConfig,

    #[config(nested)]
    pub(crate) db: crate::db::DbConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,
}

impl Config {
    /// Loads the file named by `PROJMAN_CONFIG_PATH` or, if that is unset, the
    /// first existing file of `DEFAULT_PATHS`. Also returns the path used.
    pub(crate) fn from_env_or_default_locations() -> Result<(Self, PathBuf)> {
        let path = match env::var_os(PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => DEFAULT_PATHS.iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!(
                    "no config file found (tried {}). Set {PATH_ENV} or pass `--config`.",
                    DEFAULT_PATHS.join(", "),
                ))?,
        };

        Self::load_from(&path)
            .map(|config| (config, path.clone()))
            .context(format!("failed to load config from '{}'", path.display()))
    }

    pub(crate) fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Config::from_file(path)
            .context(format!("invalid config file '{}'", path.display()))?;
        config.resolve_relative_paths(path)?;
        Ok(config)
    }

    fn resolve_relative_paths(&mut self, config_path: &Path) -> Result<()> {
        let config_path = config_path.canonicalize()
            .context(format!("failed to canonicalize '{}'", config_path.display()))?;
        let Some(dir) = config_path.parent() else {
            bail!("config path '{}' has no parent directory", config_path.display());
        };

        if let Some(file) = self.log.file.as_mut().filter(|f| f.is_relative()) {
            *file = dir.join(&*file);
        }

        Ok(())
    }
}

/// Writes a commented config template with all options and defaults to
/// `target`, or stdout if that's `None`.
pub(crate) fn write_template(target: Option<&PathBuf>) -> Result<()> {
    let mut options = confique::toml::FormatOptions::default();
    options.general.nested_field_gap = 2;
    let template = confique::toml::template::<Config>(options);

    match target {
        Some(path) => {
            info!("Writing config template to '{}'", path.display());
            std::fs::write(path, template)
                .context(format!("failed to write '{}'", path.display()))?;
        }
        None => io::stdout().write_all(template.as_bytes())?,
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use std::{fs, net::Ipv4Addr};
    use tempfile::TempDir;

    use super::Config;

    /// Writes `content` as `config.toml` into a fresh directory that is
    /// removed when the returned guard is dropped.
    fn config_file(content: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), content).unwrap();
        dir
    }

    #[test]
    fn defaults_are_filled_in() {
        let dir = config_file("[db]\npassword = \"hunter2\"\n");
        let config = Config::load_from(dir.path().join("config.toml")).unwrap();
        assert_eq!(config.http.port, 4000);
        assert_eq!(config.http.address, Ipv4Addr::LOCALHOST);
        assert_eq!(config.http.max_body_size, 1024 * 1024);
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.db.database, "projman");
        assert!(config.log.stdout);
        assert!(config.log.file.is_none());
    }

    #[test]
    fn relative_log_file_is_relative_to_config() {
        let dir = config_file("[db]\npassword = \"x\"\n[log]\nfile = \"logs/projman.log\"\n");
        let config = Config::load_from(dir.path().join("config.toml")).unwrap();
        let expected = dir.path().canonicalize().unwrap().join("logs/projman.log");
        assert_eq!(config.log.file, Some(expected));
    }

    #[test]
    fn password_is_required() {
        let dir = config_file("[http]\nport = 1234\n");
        assert!(Config::load_from(dir.path().join("config.toml")).is_err());
    }

    #[test]
    fn template_mentions_every_section() {
        let template = confique::toml::template::<Config>(Default::default());
        for section in ["[http]", "[db]", "[log]"] {
            assert!(template.contains(section), "missing {section}");
        }
    }
}
