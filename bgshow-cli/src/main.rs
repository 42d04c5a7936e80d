use clap::{Parser, Subcommand};
use bgshow_common::{IpcClient, IpcCommand, IpcResponse};

#[derive(Parser)]
#[command(name = "bgshow-cli")]
#[command(about = "bgshow-cli (background slideshow daemon control)")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the next image
    Next {
        /// Slideshow to control (all when omitted)
        #[arg(long)]
        instance: Option<String>,
    },

    /// Show the previous image
    Previous {
        #[arg(long)]
        instance: Option<String>,
    },

    /// Pause the slideshow
    Pause {
        #[arg(long)]
        instance: Option<String>,
    },

    /// Resume the slideshow
    Play {
        #[arg(long)]
        instance: Option<String>,

        /// Advance immediately instead of waiting for the next tick
        #[arg(long)]
        advance: bool,
    },

    /// Replace the playlist with a list of URLs (no URLs restores local images)
    Urls {
        #[arg(long)]
        instance: Option<String>,

        urls: Vec<String>,
    },

    /// Show a single URL
    ShowUrl {
        #[arg(long)]
        instance: Option<String>,

        url: String,

        /// Keep the slideshow running afterwards
        #[arg(long)]
        resume: bool,
    },

    /// Rescan the image directories
    Update {
        #[arg(long)]
        instance: Option<String>,
    },

    /// Reload configuration and restart the slideshow
    Register {
        #[arg(long)]
        instance: Option<String>,
    },

    /// Report that the video player finished
    VideoFinished {
        #[arg(long)]
        instance: Option<String>,
    },

    /// Show current status
    Status,
}

impl Commands {
    fn into_ipc(self) -> IpcCommand {
        match self {
            Commands::Next { instance } => IpcCommand::Next { instance },
            Commands::Previous { instance } => IpcCommand::Previous { instance },
            Commands::Pause { instance } => IpcCommand::Pause { instance },
            Commands::Play { instance, advance } => IpcCommand::Play { instance, advance },
            Commands::Urls { instance, urls } => IpcCommand::Urls { instance, urls },
            Commands::ShowUrl { instance, url, resume } => IpcCommand::ShowUrl { instance, url, resume },
            Commands::Update { instance } => IpcCommand::UpdateImageList { instance },
            Commands::Register { instance } => IpcCommand::RegisterConfig { instance },
            Commands::VideoFinished { instance } => IpcCommand::VideoFinished { instance },
            Commands::Status => IpcCommand::Status,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = IpcClient::new();
    let command = cli.command.into_ipc();

    match client.send_command(command) {
        Ok(response) => print_response(response),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m{}s", minutes, secs)
        }
    } else {
        let hours = seconds / 3600;
        let remaining = seconds % 3600;
        let minutes = remaining / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h{}m", hours, minutes)
        }
    }
}

fn print_response(response: IpcResponse) {
    match response {
        IpcResponse::Success { message } => {
            println!("✓ {}", message);
        }

        IpcResponse::Error { message } => {
            eprintln!("✗ Error: {}", message);
            std::process::exit(1);
        }

        IpcResponse::Status { instances } => {
            if instances.is_empty() {
                println!("No slideshows running");
                return;
            }

            println!("bgshow Status:");
            println!("==============");

            for instance in instances {
                let timer_str = if instance.playing_video {
                    "video".to_string()
                } else if let Some(remaining) = instance.timer_remaining {
                    if remaining > 0 {
                        format_duration(remaining)
                    } else {
                        "ready".to_string()
                    }
                } else {
                    "no timer".to_string()
                };

                let current_image = instance.current_image.as_deref()
                    .map(|p| {
                        std::path::Path::new(p)
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or(p)
                    })
                    .unwrap_or("None");

                let source = if instance.overridden { " (urls)" } else { "" };

                println!("{}: {}{} | {} | {}/{} | {}",
                    instance.name,
                    instance.state,
                    source,
                    current_image,
                    instance.position,
                    instance.total,
                    timer_str
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(125), "2m5s");
        assert_eq!(format_duration(7200), "2h");
        assert_eq!(format_duration(7260), "2h1m");
    }

    #[test]
    fn test_subcommands_map_to_ipc() {
        let cli = Cli::parse_from(["bgshow-cli", "play", "--instance", "hallway", "--advance"]);
        assert_eq!(
            cli.command.into_ipc(),
            IpcCommand::Play { instance: Some("hallway".to_string()), advance: true }
        );

        let cli = Cli::parse_from(["bgshow-cli", "urls", "http://a/1.jpg", "http://a/2.jpg"]);
        assert_eq!(
            cli.command.into_ipc(),
            IpcCommand::Urls {
                instance: None,
                urls: vec!["http://a/1.jpg".to_string(), "http://a/2.jpg".to_string()],
            }
        );

        let cli = Cli::parse_from(["bgshow-cli", "show-url", "http://a/1.jpg"]);
        assert_eq!(
            cli.command.into_ipc(),
            IpcCommand::ShowUrl { instance: None, url: "http://a/1.jpg".to_string(), resume: false }
        );

        let cli = Cli::parse_from(["bgshow-cli", "update"]);
        assert_eq!(cli.command.into_ipc(), IpcCommand::UpdateImageList { instance: None });
    }
}
