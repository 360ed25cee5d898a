use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;
use crate::util;

pub const MIB: usize = 1024 * 1024;

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("classroom".to_string())
}

fn default_gateway_host() -> String {
    env::var("GATEWAY_HOST").unwrap_or("script.google.com".to_string())
}

/// Client-side upload bounds. The gateway doesn't enforce these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    #[serde(default = "UploadLimits::default_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "UploadLimits::default_submission_images")]
    pub max_submission_images: usize,
    #[serde(default = "UploadLimits::default_solution_images")]
    pub max_solution_images: usize,
    #[serde(default = "UploadLimits::default_attachment_bytes")]
    pub max_attachment_bytes: usize,
}

impl UploadLimits {
    fn default_image_bytes() -> usize {
        10 * MIB
    }
    fn default_submission_images() -> usize {
        8
    }
    fn default_solution_images() -> usize {
        5
    }
    fn default_attachment_bytes() -> usize {
        50 * MIB
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadLimits {
            max_image_bytes: Self::default_image_bytes(),
            max_submission_images: Self::default_submission_images(),
            max_solution_images: Self::default_solution_images(),
            max_attachment_bytes: Self::default_attachment_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Host every saved gateway URL must point at.
    #[serde(default = "default_gateway_host")]
    pub gateway_host: String,

    #[serde(default)]
    pub limits: UploadLimits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            gateway_host: default_gateway_host(),
            limits: UploadLimits::default(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        Self::load_from(config_dir())
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Config, ConfigurationError> {
        let dir = dir.as_ref();
        let config_file =
            util::find_first_subpath(dir, &["settings.yml", "settings.yaml"], Path::exists)
                .ok_or_else(|| ConfigurationError::NotFound(dir.to_path_buf()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_not_found() {
        let dir = env::temp_dir().join(format!("classroom-missing-{}", uuid::Uuid::new_v4()));
        match Config::load_from(&dir) {
            Err(ConfigurationError::NotFound(path)) => assert_eq!(path, dir),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn partial_file_gets_defaults() {
        let dir = env::temp_dir().join(format!("classroom-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("settings.yaml"),
            "mongodb_db: school\nlimits:\n  max_submission_images: 4\n",
        )
        .unwrap();

        let config = Config::load_from(&dir).expect("config should parse");
        assert_eq!(config.mongodb_db, "school");
        assert_eq!(config.limits.max_submission_images, 4);
        assert_eq!(config.limits.max_image_bytes, 10 * MIB);
        assert_eq!(config.limits.max_attachment_bytes, 50 * MIB);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
