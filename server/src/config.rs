use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 3002;
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_DIST_DIR: &str = "client/dist";
pub const DEFAULT_RESOURCES_PATH: &str = "public/data/resources.json";
pub const DEFAULT_ATLAS_PATH: &str = "public/assets/icon-atlas.json";

/// Cache lifetime for `/api/resources`. Clients revalidate with the ETag.
pub const RESOURCES_CACHE_CONTROL: &str = "public, max-age=60";

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

fn path_var(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Hot-reload period for the data files. `None` when unset or zero.
pub fn reload_interval() -> Option<Duration> {
    std::env::var("RELOAD_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
}

/// Filesystem locations the server reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPaths {
    pub public_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub resources: PathBuf,
    pub atlas: PathBuf,
}

impl ServerPaths {
    pub fn from_env() -> Self {
        Self {
            public_dir: path_var("PUBLIC_DIR", DEFAULT_PUBLIC_DIR),
            dist_dir: path_var("DIST_DIR", DEFAULT_DIST_DIR),
            resources: path_var("RESOURCES_PATH", DEFAULT_RESOURCES_PATH),
            atlas: path_var("ATLAS_PATH", DEFAULT_ATLAS_PATH),
        }
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.public_dir.join("assets")
    }

    pub fn index_html(&self) -> PathBuf {
        self.dist_dir.join("index.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        temp_env::with_vars_unset(
            [
                "SERVER_PORT",
                "PUBLIC_DIR",
                "DIST_DIR",
                "RESOURCES_PATH",
                "ATLAS_PATH",
                "RELOAD_INTERVAL_SECS",
            ],
            || {
                assert_eq!(server_port(), 3002);
                assert_eq!(reload_interval(), None);
                let paths = ServerPaths::from_env();
                assert_eq!(paths.public_dir, PathBuf::from("public"));
                assert_eq!(paths.assets_dir(), PathBuf::from("public/assets"));
                assert_eq!(paths.index_html(), PathBuf::from("client/dist/index.html"));
                assert_eq!(paths.resources, PathBuf::from("public/data/resources.json"));
            },
        );
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        temp_env::with_vars(
            [
                ("SERVER_PORT", Some("0")),
                ("RELOAD_INTERVAL_SECS", Some("soon")),
                ("PUBLIC_DIR", Some("   ")),
            ],
            || {
                assert_eq!(server_port(), DEFAULT_SERVER_PORT);
                assert_eq!(reload_interval(), None);
                assert_eq!(ServerPaths::from_env().public_dir, PathBuf::from("public"));
            },
        );
    }

    #[test]
    fn overrides_are_read() {
        temp_env::with_vars(
            [
                ("SERVER_PORT", Some("8080")),
                ("RELOAD_INTERVAL_SECS", Some("30")),
                ("ATLAS_PATH", Some("/srv/atlas.json")),
            ],
            || {
                assert_eq!(server_port(), 8080);
                assert_eq!(reload_interval(), Some(Duration::from_secs(30)));
                assert_eq!(ServerPaths::from_env().atlas, PathBuf::from("/srv/atlas.json"));
            },
        );
    }
}
