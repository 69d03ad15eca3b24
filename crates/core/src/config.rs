//! Typed service configuration loaded from environment variables.
//!
//! Every recognized setting is an explicit struct field with a
//! documented default; there is no dynamic key lookup.

use std::path::PathBuf;

use crate::types::DbId;

/// Repository backend (aptly) configuration.
#[derive(Debug, Clone)]
pub struct AptlyConfig {
    /// Internally routable base URL of the package repositories.
    pub apt_url: String,
    /// Publicly routable base URL. Falls back to [`apt_url`](Self::apt_url)
    /// when unset.
    pub apt_url_public: Option<String>,
    /// Path of the repository signing key, relative to the apt URL.
    pub key: String,
    /// Base URL of the aptly work daemon the dispatcher posts tasks to.
    pub daemon_url: String,
}

impl AptlyConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default                  |
    /// |-------------------|--------------------------|
    /// | `APT_URL`         | `http://localhost/repo`  |
    /// | `APT_URL_PUBLIC`  | unset                    |
    /// | `APT_KEY_FILE`    | `repo.asc`               |
    /// | `APTLY_DAEMON_URL`| `http://localhost:8080`  |
    pub fn from_env() -> Self {
        Self {
            apt_url: std::env::var("APT_URL").unwrap_or_else(|_| "http://localhost/repo".into()),
            apt_url_public: std::env::var("APT_URL_PUBLIC").ok().filter(|s| !s.is_empty()),
            key: std::env::var("APT_KEY_FILE").unwrap_or_else(|_| "repo.asc".into()),
            daemon_url: std::env::var("APTLY_DAEMON_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
        }
    }

    /// The repository base URL for the requested routing.
    ///
    /// Internal consumers always get `apt_url`; public consumers get
    /// `apt_url_public` when configured, `apt_url` otherwise.
    pub fn base_url(&self, internal: bool) -> &str {
        if internal {
            &self.apt_url
        } else {
            self.apt_url_public.as_deref().unwrap_or(&self.apt_url)
        }
    }

    /// Full URL of the repository signing key for the requested routing.
    pub fn key_url(&self, internal: bool) -> String {
        format!("{}/{}", self.base_url(internal), self.key)
    }
}

/// Location of per-build output directories and log files.
#[derive(Debug, Clone)]
pub struct BuildoutConfig {
    /// Root directory holding one subdirectory per build id.
    pub root: PathBuf,
}

impl BuildoutConfig {
    /// Load from the `BUILDOUT_PATH` env var
    /// (default: `/var/lib/packforge/buildout`).
    pub fn from_env() -> Self {
        let root = std::env::var("BUILDOUT_PATH")
            .unwrap_or_else(|_| "/var/lib/packforge/buildout".into());
        Self { root: PathBuf::from(root) }
    }

    /// Output directory of one build.
    pub fn build_dir(&self, build_id: DbId) -> PathBuf {
        self.root.join(build_id.to_string())
    }

    /// Append-only log file of one build.
    pub fn log_path(&self, build_id: DbId) -> PathBuf {
        self.build_dir(build_id).join("build.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aptly(public: Option<&str>) -> AptlyConfig {
        AptlyConfig {
            apt_url: "http://internal/repo".into(),
            apt_url_public: public.map(Into::into),
            key: "repo.asc".into(),
            daemon_url: "http://localhost:8080".into(),
        }
    }

    #[test]
    fn internal_url_ignores_public() {
        let cfg = aptly(Some("https://packages.example.com"));
        assert_eq!(cfg.base_url(true), "http://internal/repo");
    }

    #[test]
    fn public_url_falls_back_to_internal() {
        assert_eq!(aptly(None).base_url(false), "http://internal/repo");
        assert_eq!(
            aptly(Some("https://packages.example.com")).base_url(false),
            "https://packages.example.com"
        );
    }

    #[test]
    fn log_path_is_keyed_by_build_id() {
        let cfg = BuildoutConfig { root: PathBuf::from("/var/lib/packforge/buildout") };
        assert_eq!(
            cfg.log_path(42),
            PathBuf::from("/var/lib/packforge/buildout/42/build.log")
        );
    }
}
