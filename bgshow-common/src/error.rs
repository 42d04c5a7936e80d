use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bgshow operations
#[derive(Error, Debug)]
pub enum BgshowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Image scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Image encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Video player error: {0}")]
    Player(#[from] PlayerError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse TOML configuration: {message}")]
    TomlParse { message: String },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Directory scan errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read image directory: {path:?}")]
    RootRead { path: PathBuf, source: std::io::Error },

    #[error("Image path is not a directory: {path:?}")]
    NotADirectory { path: PathBuf },
}

/// Shown-ledger persistence errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to append to ledger file: {path:?}")]
    Append { path: PathBuf, source: std::io::Error },

    #[error("Failed to reset ledger file: {path:?}")]
    Reset { path: PathBuf, source: std::io::Error },
}

/// Errors raised while turning an image into display data
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to read image file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to decode image {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Failed to encode resized image {path:?}: {message}")]
    Reencode { path: PathBuf, message: String },
}

/// External video player errors
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Video player not found: {program}")]
    NotFound { program: String },

    #[error("Failed to start video player: {command}")]
    Spawn { command: String, source: std::io::Error },

    #[error("Video player returned non-zero exit code: {code}")]
    NonZeroExit { code: i32 },
}

/// IPC communication errors
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Unknown slideshow instance: {name}")]
    UnknownInstance { name: String },

    #[error("Slideshow instance is not running: {name}")]
    InstanceGone { name: String },

    #[error("Invalid IPC message format")]
    InvalidMessage,
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, BgshowError>;

impl From<serde_json::Error> for BgshowError {
    fn from(_err: serde_json::Error) -> Self {
        BgshowError::Ipc(IpcError::InvalidMessage)
    }
}

// Error reporting utilities
pub trait ErrorReporting {
    fn log_error(&self, context: &str);
    fn user_friendly_message(&self) -> String;
}

impl ErrorReporting for BgshowError {
    fn log_error(&self, context: &str) {
        log::error!("{}: {:?}", context, self);
    }

    fn user_friendly_message(&self) -> String {
        match self {
            BgshowError::Config(ConfigError::FileRead { path, .. }) => {
                format!("Configuration file not found: {:?}", path)
            }
            BgshowError::Config(ConfigError::TomlParse { message }) => {
                format!("Invalid configuration format: {}", message)
            }
            BgshowError::Scan(ScanError::RootRead { path, source }) => {
                format!("Cannot read image directory {:?}: {}", path, source)
            }
            BgshowError::Scan(ScanError::NotADirectory { path }) => {
                format!("Image path is not a directory: {:?}", path)
            }
            BgshowError::Player(PlayerError::NotFound { program }) => {
                format!("Video player '{}' is not installed or not in PATH", program)
            }
            BgshowError::Ipc(IpcError::UnknownInstance { name }) => {
                format!("No slideshow named '{}' is configured", name)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_error_user_friendly_message() {
        let error = ConfigError::FileRead {
            path: PathBuf::from("/nonexistent/config.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "File not found"),
        };
        let bgshow_error = BgshowError::Config(error);

        let message = bgshow_error.user_friendly_message();
        assert!(message.contains("Configuration file not found"));
        assert!(message.contains("/nonexistent/config.toml"));
    }

    #[test]
    fn test_scan_error_user_friendly_message() {
        let error = ScanError::RootRead {
            path: PathBuf::from("/missing/photos"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        let bgshow_error = BgshowError::Scan(error);

        let message = bgshow_error.user_friendly_message();
        assert!(message.contains("Cannot read image directory"));
        assert!(message.contains("/missing/photos"));
        assert!(message.contains("No such file or directory"));
    }

    #[test]
    fn test_player_error_user_friendly_message() {
        let error = PlayerError::NonZeroExit { code: 3 };
        let bgshow_error = BgshowError::Player(error);

        let message = bgshow_error.user_friendly_message();
        assert!(message.contains("non-zero exit code"));
        assert!(message.contains('3'));
    }

    #[test]
    fn test_unknown_instance_message() {
        let bgshow_error = BgshowError::Ipc(IpcError::UnknownInstance {
            name: "hallway".to_string(),
        });

        assert_eq!(
            bgshow_error.user_friendly_message(),
            "No slideshow named 'hallway' is configured"
        );
    }

    #[test]
    fn test_error_context_preserves_variant() {
        let result: std::result::Result<(), LedgerError> = Err(LedgerError::Reset {
            path: PathBuf::from("/state/shown.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"),
        });

        match result.with_context("resetting ledger") {
            Err(BgshowError::Ledger(LedgerError::Reset { path, .. })) => {
                assert_eq!(path, PathBuf::from("/state/shown.txt"));
            }
            other => panic!("Expected LedgerError::Reset, got {:?}", other),
        }
    }
}
