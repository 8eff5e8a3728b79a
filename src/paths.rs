//! XDG-compliant path resolution for temporal-kg.
//!
//! Config lives in `$XDG_CONFIG_HOME/temporal-kg/`, the default JSON store in
//! `$XDG_DATA_HOME/temporal-kg/`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

const APP_DIR: &str = "temporal-kg";

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(tkg::paths::no_home),
        help("Set the HOME environment variable, or pass --store and --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(tkg::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Directories used by the `tkg` binary.
#[derive(Debug, Clone)]
pub struct TkgPaths {
    /// `$XDG_CONFIG_HOME/temporal-kg/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/temporal-kg/`
    pub data_dir: PathBuf,
}

impl TkgPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join(APP_DIR);

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Both directories under one root. Used by tests and portable installs.
    pub fn under(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    /// Create all directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path to the store used when neither `--store` nor `store_path` is set.
    pub fn default_store_file(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = TkgPaths::under(tmp.path());
        paths.ensure_dirs().unwrap();

        assert!(paths.config_dir.is_dir());
        assert!(paths.data_dir.is_dir());
        assert_eq!(paths.config_file(), tmp.path().join("config/config.toml"));
        assert_eq!(paths.default_store_file(), tmp.path().join("data/store.json"));
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = TkgPaths::under(tmp.path());
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
    }
}
