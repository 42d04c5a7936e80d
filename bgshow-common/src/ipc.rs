use std::path::PathBuf;
use std::os::unix::net::UnixStream;
use std::io::{Read, Write};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use anyhow::{Result, Context};
use crate::scheduler::PlaybackState;

/// Commands accepted on the control socket. `instance` selects one slideshow;
/// `None` addresses every configured slideshow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcCommand {
    RegisterConfig { instance: Option<String> },
    Next { instance: Option<String> },
    Previous { instance: Option<String> },
    Pause { instance: Option<String> },
    Play { instance: Option<String>, advance: bool },
    Urls { instance: Option<String>, urls: Vec<String> },
    ShowUrl { instance: Option<String>, url: String, resume: bool },
    UpdateImageList { instance: Option<String> },
    VideoFinished { instance: Option<String> },
    Status,
}

impl IpcCommand {
    pub fn instance(&self) -> Option<&str> {
        match self {
            IpcCommand::RegisterConfig { instance }
            | IpcCommand::Next { instance }
            | IpcCommand::Previous { instance }
            | IpcCommand::Pause { instance }
            | IpcCommand::Play { instance, .. }
            | IpcCommand::Urls { instance, .. }
            | IpcCommand::ShowUrl { instance, .. }
            | IpcCommand::UpdateImageList { instance }
            | IpcCommand::VideoFinished { instance } => instance.as_deref(),
            IpcCommand::Status => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcResponse {
    Success { message: String },
    Error { message: String },
    Status { instances: Vec<InstanceStatus> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub name: String,
    pub state: PlaybackState,
    pub current_image: Option<String>,
    pub position: usize,
    pub total: usize,
    pub timer_remaining: Option<u64>, // seconds
    pub overridden: bool,
    pub playing_video: bool,
}

/// Events written to stdout, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum OutboundEvent {
    #[serde(rename = "FILELIST")]
    FileList { identifier: String, images: Vec<String> },
    #[serde(rename = "DISPLAY_IMAGE")]
    DisplayImage {
        identifier: String,
        path: String,
        data: String,
        index: usize,
        total: usize,
        orientation: u16,
    },
    #[serde(rename = "READY")]
    Ready { identifier: String, scanned_at: DateTime<Utc> },
    #[serde(rename = "PLAY_VIDEO")]
    PlayVideo { identifier: String, path: String },
}

impl OutboundEvent {
    pub fn to_json_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).with_context(|| "Failed to serialize event")?;
        line.push('\n');
        Ok(line)
    }
}

pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("bgshow.sock")
}

pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new() -> Self {
        Self::with_socket(default_socket_path())
    }

    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn send_command(&self, command: IpcCommand) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .with_context(|| format!("Failed to connect to bgshow daemon at {:?}", self.socket_path))?;

        let command_json = serde_json::to_string(&command)
            .with_context(|| "Failed to serialize command")?;

        stream.write_all(command_json.as_bytes())
            .with_context(|| "Failed to send command to daemon")?;
        stream.shutdown(std::net::Shutdown::Write)
            .with_context(|| "Failed to shutdown write stream")?;

        let mut response = String::new();
        stream.read_to_string(&mut response)
            .with_context(|| "Failed to read response from daemon")?;

        let ipc_response: IpcResponse = serde_json::from_str(&response)
            .with_context(|| "Failed to deserialize response")?;

        Ok(ipc_response)
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IpcServer {
    socket_path: PathBuf,
}

impl IpcServer {
    pub fn new() -> Self {
        Self::with_socket(default_socket_path())
    }

    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Accepts connections forever, one thread per connection.
    pub fn start<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(IpcCommand) -> Result<IpcResponse> + Send + Clone + 'static,
    {
        // Remove a stale socket from a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| "Failed to remove existing socket")?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| "Failed to create socket directory")?;
        }

        let listener = std::os::unix::net::UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind to socket {:?}", self.socket_path))?;

        log::info!("IPC server listening on {:?}", self.socket_path);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = handler.clone();
                    std::thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(stream, &handler) {
                            log::error!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Error accepting IPC connection: {}", e);
                }
            }
        }

        Ok(())
    }

    fn handle_connection<F>(
        mut stream: std::os::unix::net::UnixStream,
        handler: &F,
    ) -> Result<()>
    where
        F: Fn(IpcCommand) -> Result<IpcResponse>,
    {
        let mut command_json = String::new();
        stream.read_to_string(&mut command_json)
            .with_context(|| "Failed to read command from client")?;

        let response = match serde_json::from_str::<IpcCommand>(&command_json) {
            Ok(command) => {
                log::debug!("Received IPC command: {:?}", command);
                handler(command).unwrap_or_else(|e| IpcResponse::Error { message: e.to_string() })
            }
            Err(e) => IpcResponse::Error {
                message: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)
            .with_context(|| "Failed to serialize response")?;

        stream.write_all(response_json.as_bytes())
            .with_context(|| "Failed to send response to client")?;

        Ok(())
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_command_instance() {
        let command = IpcCommand::Urls {
            instance: Some("hallway".to_string()),
            urls: Vec::new(),
        };
        assert_eq!(command.instance(), Some("hallway"));
        assert_eq!(IpcCommand::Next { instance: None }.instance(), None);
        assert_eq!(IpcCommand::Status.instance(), None);
    }

    #[test]
    fn test_display_event_wire_format() {
        let event = OutboundEvent::DisplayImage {
            identifier: "default".to_string(),
            path: "/photos/a.jpg".to_string(),
            data: "data:image/jpeg;base64,AAAA".to_string(),
            index: 1,
            total: 3,
            orientation: 6,
        };

        let line = event.to_json_line().unwrap();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["event"], "DISPLAY_IMAGE");
        assert_eq!(value["identifier"], "default");
        assert_eq!(value["index"], 1);
        assert_eq!(value["total"], 3);
        assert_eq!(value["orientation"], 6);
    }

    #[test]
    fn test_filelist_event_wire_format() {
        let event = OutboundEvent::FileList {
            identifier: "default".to_string(),
            images: vec!["/photos/a.jpg".to_string()],
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(value["event"], "FILELIST");
        assert_eq!(value["images"][0], "/photos/a.jpg");
    }

    #[test]
    fn test_client_server_exchange() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("bgshow.sock");

        let server = IpcServer::with_socket(socket_path.clone());
        std::thread::spawn(move || {
            server
                .start(|command| match command {
                    IpcCommand::Status => Ok(IpcResponse::Status { instances: Vec::new() }),
                    IpcCommand::Next { instance: Some(name) } => Err(anyhow::anyhow!("unknown {}", name)),
                    _ => Ok(IpcResponse::Success { message: "ok".to_string() }),
                })
                .unwrap();
        });

        for _ in 0..100 {
            if UnixStream::connect(&socket_path).is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        let client = IpcClient::with_socket(socket_path);
        assert_eq!(
            client.send_command(IpcCommand::Status).unwrap(),
            IpcResponse::Status { instances: Vec::new() }
        );
        assert_eq!(
            client.send_command(IpcCommand::Pause { instance: None }).unwrap(),
            IpcResponse::Success { message: "ok".to_string() }
        );
        assert_eq!(
            client
                .send_command(IpcCommand::Next { instance: Some("attic".to_string()) })
                .unwrap(),
            IpcResponse::Error { message: "unknown attic".to_string() }
        );
    }

    #[test]
    fn test_client_reports_missing_daemon() {
        let temp_dir = tempdir().unwrap();
        let client = IpcClient::with_socket(temp_dir.path().join("absent.sock"));

        let err = client.send_command(IpcCommand::Status).unwrap_err();
        assert!(err.to_string().contains("Failed to connect to bgshow daemon"));
    }
}
