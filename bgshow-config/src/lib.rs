use serde::{Deserialize, Serialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use bgshow_common::{
    error::ConfigError, BgshowError, EncodeOptions, ExtensionFilter, PlaylistOptions, Result,
    ScanOptions, SortKey, Strategy, VideoPlayer,
};

/// Name of the slideshow built from `[slideshow]` when no instances are defined.
pub const DEFAULT_INSTANCE: &str = "default";

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Millis(u64),
    Text(String),
}

// Durations are either milliseconds or human-readable strings
fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationValue::deserialize(deserializer)? {
        DurationValue::Millis(millis) => Ok(Duration::from_millis(millis)),
        DurationValue::Text(text) => bgshow_common::duration::parse_duration(&text)
            .map_err(serde::de::Error::custom),
    }
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub slideshow: SlideshowConfig,
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SlideshowConfig {
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,
    #[serde(
        default = "default_slideshow_speed",
        deserialize_with = "deserialize_duration",
        serialize_with = "humantime_serde::serialize"
    )]
    pub slideshow_speed: Duration,
    #[serde(default)]
    pub randomize_image_order: bool,
    #[serde(default)]
    pub randomize_images_loop_folders: bool,
    #[serde(default)]
    pub show_all_images_before_restart: bool,
    #[serde(default)]
    pub sort_images_by: SortKey,
    #[serde(default)]
    pub sort_images_descending: bool,
    #[serde(default)]
    pub recursive_sub_directories: bool,
    #[serde(default = "default_valid_image_file_extensions")]
    pub valid_image_file_extensions: String,
    #[serde(default)]
    pub change_image_on_resume: bool,
    #[serde(default)]
    pub resize_images: bool,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: String,
    #[serde(default = "default_video_player")]
    pub video_player: Vec<String>,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    #[serde(default = "default_exclusion_manifest")]
    pub exclusion_manifest: String,
}

/// Per-instance overrides; unset fields inherit from `[slideshow]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InstanceConfig {
    pub image_paths: Option<Vec<PathBuf>>,
    pub exclude_paths: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_duration", skip_serializing)]
    pub slideshow_speed: Option<Duration>,
    pub randomize_image_order: Option<bool>,
    pub randomize_images_loop_folders: Option<bool>,
    pub show_all_images_before_restart: Option<bool>,
    pub sort_images_by: Option<SortKey>,
    pub sort_images_descending: Option<bool>,
    pub recursive_sub_directories: Option<bool>,
    pub valid_image_file_extensions: Option<String>,
    pub change_image_on_resume: Option<bool>,
    pub resize_images: Option<bool>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub video_extensions: Option<String>,
    pub video_player: Option<Vec<String>>,
    pub ledger_path: Option<PathBuf>,
    pub exclusion_manifest: Option<String>,
}

// Default values
fn default_exclude_paths() -> Vec<String> {
    vec!["@eaDir".to_string()]
}

fn default_slideshow_speed() -> Duration {
    Duration::from_secs(10)
}

fn default_valid_image_file_extensions() -> String {
    bgshow_common::image_discovery::DEFAULT_IMAGE_EXTENSIONS.to_string()
}

fn default_max_width() -> u32 {
    1920
}

fn default_max_height() -> u32 {
    1080
}

fn default_video_extensions() -> String {
    "mp4,m4v".to_string()
}

fn default_video_player() -> Vec<String> {
    ["omxplayer", "--win", "0,0,1920,1080", "--alpha", "180"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclusion_manifest() -> String {
    bgshow_common::exclusion::DEFAULT_MANIFEST_NAME.to_string()
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            image_paths: Vec::new(),
            exclude_paths: default_exclude_paths(),
            slideshow_speed: default_slideshow_speed(),
            randomize_image_order: false,
            randomize_images_loop_folders: false,
            show_all_images_before_restart: false,
            sort_images_by: SortKey::default(),
            sort_images_descending: false,
            recursive_sub_directories: false,
            valid_image_file_extensions: default_valid_image_file_extensions(),
            change_image_on_resume: false,
            resize_images: false,
            max_width: default_max_width(),
            max_height: default_max_height(),
            video_extensions: default_video_extensions(),
            video_player: default_video_player(),
            ledger_path: None,
            exclusion_manifest: default_exclusion_manifest(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BgshowError::Config(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "File not found"),
            }));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| BgshowError::Config(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }))?;

        log::debug!("Loaded configuration from {:?}", path);
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| BgshowError::Config(ConfigError::TomlParse {
                message: e.to_string(),
            }))?;

        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(BgshowError::Config(ConfigError::NoConfigDir))?
            .join("bgshow");

        Ok(config_dir.join("config.toml"))
    }

    /// Every slideshow to run, by name. Without `[instances.*]` tables the
    /// `[slideshow]` table is the single instance named [`DEFAULT_INSTANCE`].
    pub fn instances(&self) -> BTreeMap<String, SlideshowConfig> {
        if self.instances.is_empty() {
            let mut single = BTreeMap::new();
            single.insert(DEFAULT_INSTANCE.to_string(), self.slideshow.clone());
            return single;
        }

        self.instances
            .iter()
            .map(|(name, overrides)| (name.clone(), self.slideshow.merged_with(overrides)))
            .collect()
    }

    pub fn instance(&self, name: &str) -> Option<SlideshowConfig> {
        self.instances().remove(name)
    }

    fn validate(&self) -> Result<()> {
        for (name, slideshow) in self.instances() {
            slideshow.validate()
                .map_err(|e| BgshowError::Config(ConfigError::Validation {
                    message: format!("Instance '{}': {}", name, e),
                }))?;
        }

        Ok(())
    }
}

impl SlideshowConfig {
    pub fn merged_with(&self, overrides: &InstanceConfig) -> SlideshowConfig {
        let mut merged = self.clone();

        if let Some(image_paths) = &overrides.image_paths {
            merged.image_paths = image_paths.clone();
        }
        if let Some(exclude_paths) = &overrides.exclude_paths {
            merged.exclude_paths = exclude_paths.clone();
        }
        if let Some(slideshow_speed) = overrides.slideshow_speed {
            merged.slideshow_speed = slideshow_speed;
        }
        if let Some(randomize) = overrides.randomize_image_order {
            merged.randomize_image_order = randomize;
        }
        if let Some(loop_folders) = overrides.randomize_images_loop_folders {
            merged.randomize_images_loop_folders = loop_folders;
        }
        if let Some(show_all) = overrides.show_all_images_before_restart {
            merged.show_all_images_before_restart = show_all;
        }
        if let Some(sort_by) = overrides.sort_images_by {
            merged.sort_images_by = sort_by;
        }
        if let Some(descending) = overrides.sort_images_descending {
            merged.sort_images_descending = descending;
        }
        if let Some(recursive) = overrides.recursive_sub_directories {
            merged.recursive_sub_directories = recursive;
        }
        if let Some(extensions) = &overrides.valid_image_file_extensions {
            merged.valid_image_file_extensions = extensions.clone();
        }
        if let Some(change_on_resume) = overrides.change_image_on_resume {
            merged.change_image_on_resume = change_on_resume;
        }
        if let Some(resize) = overrides.resize_images {
            merged.resize_images = resize;
        }
        if let Some(max_width) = overrides.max_width {
            merged.max_width = max_width;
        }
        if let Some(max_height) = overrides.max_height {
            merged.max_height = max_height;
        }
        if let Some(video_extensions) = &overrides.video_extensions {
            merged.video_extensions = video_extensions.clone();
        }
        if let Some(video_player) = &overrides.video_player {
            merged.video_player = video_player.clone();
        }
        if let Some(ledger_path) = &overrides.ledger_path {
            merged.ledger_path = Some(ledger_path.clone());
        }
        if let Some(manifest) = &overrides.exclusion_manifest {
            merged.exclusion_manifest = manifest.clone();
        }

        merged
    }

    fn validate(&self) -> Result<()> {
        if self.image_paths.is_empty() {
            return Err(BgshowError::Config(ConfigError::Validation {
                message: "image_paths must name at least one directory".to_string(),
            }));
        }

        if self.slideshow_speed < Duration::from_millis(100) {
            return Err(BgshowError::Config(ConfigError::InvalidValue {
                field: "slideshow_speed".to_string(),
                value: format!("{:?}", self.slideshow_speed),
            }));
        }

        if ExtensionFilter::from_list(&self.valid_image_file_extensions).is_empty() {
            return Err(BgshowError::Config(ConfigError::InvalidValue {
                field: "valid_image_file_extensions".to_string(),
                value: self.valid_image_file_extensions.clone(),
            }));
        }

        if self.max_width == 0 {
            return Err(BgshowError::Config(ConfigError::InvalidValue {
                field: "max_width".to_string(),
                value: self.max_width.to_string(),
            }));
        }

        if self.max_height == 0 {
            return Err(BgshowError::Config(ConfigError::InvalidValue {
                field: "max_height".to_string(),
                value: self.max_height.to_string(),
            }));
        }

        if self.video_player.is_empty() {
            return Err(BgshowError::Config(ConfigError::InvalidValue {
                field: "video_player".to_string(),
                value: "[]".to_string(),
            }));
        }

        Ok(())
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::select(
            self.randomize_images_loop_folders,
            self.randomize_image_order,
            self.sort_images_by,
        )
    }

    pub fn playlist_options(&self) -> PlaylistOptions {
        let exclude_paths: HashSet<String> = self.exclude_paths.iter().cloned().collect();

        PlaylistOptions {
            image_paths: self.image_paths.iter().map(|p| expand_home(p)).collect(),
            scan: ScanOptions {
                recursive: self.recursive_sub_directories,
                exclude_paths,
                extensions: ExtensionFilter::from_list(&self.valid_image_file_extensions),
                exclusion_manifest: self.exclusion_manifest.clone(),
            },
            strategy: self.strategy(),
            descending: self.sort_images_descending,
            show_all_images_before_restart: self.show_all_images_before_restart,
            ledger_path: self.ledger_path.as_deref().map(expand_home),
            interval: self.slideshow_speed,
            change_image_on_resume: self.change_image_on_resume,
            video_extensions: ExtensionFilter::from_list(&self.video_extensions),
        }
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            resize: self.resize_images,
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }

    pub fn video_player(&self) -> VideoPlayer {
        VideoPlayer::from_argv(&self.video_player).unwrap_or_default()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
