use std::{fs::File, path::PathBuf};

use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use encore_core::{catalog::CatalogSource, store::mkdir_if_not_exists};

const APP_NAME: &str = "Encore";
const CONFIG_FILENAME: &str = "config.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat channel the companion watches.  Display only; the chat transport
    /// lives outside this tool.
    pub channel: String,
    pub catalog_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    fn app_dirs() -> Option<AppDirs> {
        const USE_XDG_ON_MACOS: bool = false;

        AppDirs::new(Some(APP_NAME), USE_XDG_ON_MACOS)
    }

    pub fn config_dir() -> Option<PathBuf> {
        Self::app_dirs().map(|dirs| dirs.config_dir)
    }

    pub fn data_dir() -> Option<PathBuf> {
        Self::app_dirs().map(|dirs| dirs.data_dir)
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILENAME))
    }

    pub fn load() -> Option<Config> {
        let path = Self::config_path().expect("Failed to get config path");
        if let Ok(file) = File::open(&path) {
            log::info!("loading config: {:?}", &path);
            Some(serde_json::from_reader(file).expect("Failed to read config"))
        } else {
            None
        }
    }

    pub fn save(&self) {
        let dir = Self::config_dir().expect("Failed to get config dir");
        let path = Self::config_path().expect("Failed to get config path");
        mkdir_if_not_exists(&dir).expect("Failed to create config dir");
        let file = File::create(path).expect("Failed to create config");
        serde_json::to_writer_pretty(file, self).expect("Failed to write config");
    }

    pub fn catalog_source(&self) -> Option<CatalogSource> {
        if let Some(path) = &self.catalog_path {
            return Some(CatalogSource::File(path.clone()));
        }
        let url = self.catalog_url.as_deref()?;
        match Url::parse(url) {
            Ok(url) => Some(CatalogSource::Remote(url)),
            Err(err) => {
                log::error!("invalid catalog URL {:?}: {}", url, err);
                None
            }
        }
    }
}
