use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use crate::error::PlayerError;
use crate::Result;

/// External program that plays a video file to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPlayer {
    program: String,
    args: Vec<String>,
}

impl Default for VideoPlayer {
    fn default() -> Self {
        Self::new(
            "omxplayer",
            ["--win", "0,0,1920,1080", "--alpha", "180"].iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl VideoPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Program followed by its arguments; `None` when empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.program).map_err(|_| {
            PlayerError::NotFound {
                program: self.program.clone(),
            }
            .into()
        })
    }

    pub fn build_command(&self, video: &Path) -> Result<Command> {
        let mut cmd = Command::new(self.resolve()?);
        cmd.args(&self.args)
            .arg(video)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    /// Runs the player and waits for it to exit. Dropping the future kills the
    /// player.
    pub async fn play(&self, video: &Path) -> Result<()> {
        let mut cmd = self.build_command(video)?;
        log::info!("Executing video player: {} {:?}", self.command_line(), video);

        let status = cmd.status().await.map_err(|e| PlayerError::Spawn {
            command: self.command_line(),
            source: e,
        })?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            log::error!("Video player failed with exit code {} for {:?}", code, video);
            return Err(PlayerError::NonZeroExit { code }.into());
        }

        log::info!("Video finished: {:?}", video);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BgshowError;

    fn sh(script: &str) -> VideoPlayer {
        VideoPlayer::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_default_player_command_line() {
        assert_eq!(
            VideoPlayer::default().command_line(),
            "omxplayer --win 0,0,1920,1080 --alpha 180"
        );
    }

    #[test]
    fn test_from_argv() {
        let argv = vec!["mpv".to_string(), "--fs".to_string()];
        let player = VideoPlayer::from_argv(&argv).unwrap();
        assert_eq!(player.program(), "mpv");
        assert_eq!(player.command_line(), "mpv --fs");

        assert!(VideoPlayer::from_argv(&[]).is_none());
    }

    #[test]
    fn test_build_command_appends_video_path() {
        let cmd = sh("exit 0").build_command(Path::new("/videos/clip.mp4")).unwrap();
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args, vec!["-c", "exit 0", "/videos/clip.mp4"]);
    }

    #[test]
    fn test_missing_player_is_reported() {
        let player = VideoPlayer::new("bgshow-no-such-player", Vec::new());
        match player.build_command(Path::new("clip.mp4")) {
            Err(BgshowError::Player(PlayerError::NotFound { program })) => {
                assert_eq!(program, "bgshow-no-such-player");
            }
            other => panic!("Expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_play_waits_for_exit() {
        assert!(sh("exit 0").play(Path::new("clip.mp4")).await.is_ok());

        match sh("exit 3").play(Path::new("clip.mp4")).await {
            Err(BgshowError::Player(PlayerError::NonZeroExit { code })) => assert_eq!(code, 3),
            other => panic!("Expected NonZeroExit, got {:?}", other),
        }
    }
}
