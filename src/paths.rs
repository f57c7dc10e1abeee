use std::path::{Path, PathBuf};

pub const BASE_DIR_ENV: &str = "INFO_SERVER_DIR";

#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Files live in the working directory unless `INFO_SERVER_DIR` says otherwise.
    pub fn new() -> std::io::Result<Self> {
        if let Ok(path) = std::env::var(BASE_DIR_ENV) {
            return Ok(Self {
                base_dir: PathBuf::from(path),
            });
        }
        Ok(Self {
            base_dir: std::env::current_dir()?,
        })
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base_dir: base }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn pid_file(&self) -> PathBuf {
        self.base_dir.join("info-server.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("info-server.log")
    }

    pub fn rotated_log_file(&self, n: u32) -> PathBuf {
        self.base_dir.join(format!("info-server.log.{n}"))
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("info-server.toml")
    }
}
