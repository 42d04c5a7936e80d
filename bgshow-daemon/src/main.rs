use anyhow::{Context, Result};
use bgshow_common::error::IpcError;
use bgshow_common::{
    BgshowError, ErrorReporting, IpcCommand, IpcResponse, IpcServer, OutboundEvent, SchedulerCommand,
};
use bgshow_config::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

mod instance;

use instance::{Instance, InstanceHandle, InstanceMessage};

/// Gives the daemon time to finish starting before the first (possibly large)
/// directory scan.
const STARTUP_DELAY: Duration = Duration::from_millis(200);

type Instances = BTreeMap<String, InstanceHandle>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    log::info!("Starting bgshow daemon...");

    let config = Config::load()
        .map_err(|e| {
            log::error!("Configuration error: {}", e.user_friendly_message());
            anyhow::anyhow!("Configuration error: {}", e.user_friendly_message())
        })?;

    log::info!("Configuration loaded successfully");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = write_events(event_rx, tokio::io::stdout()).await {
            log::error!("Event stream failed: {:#}", e);
        }
    });

    let mut instances = Instances::new();
    for (name, slideshow) in config.instances() {
        let (handle, instance, rx) = Instance::new(name.clone(), &slideshow, event_tx.clone());
        tokio::spawn(instance.run(rx, STARTUP_DELAY));
        instances.insert(name, handle);
    }
    drop(event_tx);

    log::info!(
        "Daemon started with {} slideshow(s): {}",
        instances.len(),
        instances.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    let instances = Arc::new(instances);
    let ipc_instances = Arc::clone(&instances);

    std::thread::spawn(move || {
        let server = IpcServer::new();
        if let Err(e) = server.start(move |cmd| Ok(handle_ipc_command(cmd, &ipc_instances))) {
            log::error!("IPC server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    log::info!("Shutting down bgshow daemon");

    Ok(())
}

/// Writes each event as one JSON line, flushing after every event so the host
/// sees it immediately.
async fn write_events<W>(mut rx: mpsc::UnboundedReceiver<OutboundEvent>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        let line = event.to_json_line()?;
        writer.write_all(line.as_bytes())
            .await
            .context("Failed to write event")?;
        writer.flush().await.context("Failed to flush event stream")?;
    }
    Ok(())
}

fn handle_ipc_command(command: IpcCommand, instances: &Instances) -> IpcResponse {
    let targets = match resolve_targets(instances, command.instance()) {
        Ok(targets) => targets,
        Err(e) => {
            return IpcResponse::Error {
                message: e.user_friendly_message(),
            };
        }
    };

    match command {
        IpcCommand::Status => {
            let mut statuses = Vec::new();
            for handle in targets {
                let (reply_tx, reply_rx) = oneshot::channel();
                if !handle.send(InstanceMessage::Status(reply_tx)) {
                    continue;
                }
                match reply_rx.blocking_recv() {
                    Ok(status) => statuses.push(status),
                    Err(_) => log::warn!("Slideshow '{}' did not answer status request", handle.name),
                }
            }
            IpcResponse::Status { instances: statuses }
        }
        IpcCommand::RegisterConfig { .. } => {
            let config = match Config::load() {
                Ok(config) => config,
                Err(e) => {
                    return IpcResponse::Error {
                        message: format!("Failed to load config: {}", e.user_friendly_message()),
                    };
                }
            };

            let mut registered = Vec::new();
            for handle in targets {
                let Some(slideshow) = config.instance(&handle.name) else {
                    log::warn!("Slideshow '{}' no longer configured, keeping it as is", handle.name);
                    continue;
                };
                if handle.send(InstanceMessage::Register(Box::new(slideshow))) {
                    registered.push(handle.name.clone());
                }
            }
            respond("Registered", registered)
        }
        other => {
            let Some(scheduler_command) = scheduler_command(other) else {
                return IpcResponse::Error {
                    message: "Unsupported command".to_string(),
                };
            };

            let mut delivered = Vec::new();
            for handle in targets {
                if handle.send(InstanceMessage::Command(scheduler_command.clone())) {
                    delivered.push(handle.name.clone());
                } else {
                    let e = BgshowError::Ipc(IpcError::InstanceGone { name: handle.name.clone() });
                    e.log_error("Dispatching IPC command");
                }
            }
            respond(command_label(&scheduler_command), delivered)
        }
    }
}

fn respond(action: &str, names: Vec<String>) -> IpcResponse {
    if names.is_empty() {
        IpcResponse::Error {
            message: "No slideshow accepted the command".to_string(),
        }
    } else {
        IpcResponse::Success {
            message: format!("{} for: {}", action, names.join(", ")),
        }
    }
}

fn command_label(command: &SchedulerCommand) -> &'static str {
    match command {
        SchedulerCommand::RegisterConfig(_) => "Registered",
        SchedulerCommand::Next => "Next",
        SchedulerCommand::Previous => "Previous",
        SchedulerCommand::Pause => "Pause",
        SchedulerCommand::Play { .. } => "Play",
        SchedulerCommand::Urls(_) => "Urls",
        SchedulerCommand::ShowUrl { .. } => "ShowUrl",
        SchedulerCommand::UpdateImageList => "UpdateImageList",
        SchedulerCommand::VideoFinished => "VideoFinished",
    }
}

fn resolve_targets<'a>(instances: &'a Instances, name: Option<&str>) -> bgshow_common::Result<Vec<&'a InstanceHandle>> {
    match name {
        Some(name) => instances
            .get(name)
            .map(|handle| vec![handle])
            .ok_or_else(|| IpcError::UnknownInstance { name: name.to_string() }.into()),
        None => Ok(instances.values().collect()),
    }
}

fn scheduler_command(command: IpcCommand) -> Option<SchedulerCommand> {
    match command {
        IpcCommand::Next { .. } => Some(SchedulerCommand::Next),
        IpcCommand::Previous { .. } => Some(SchedulerCommand::Previous),
        IpcCommand::Pause { .. } => Some(SchedulerCommand::Pause),
        IpcCommand::Play { advance, .. } => Some(SchedulerCommand::Play { advance }),
        IpcCommand::Urls { urls, .. } => Some(SchedulerCommand::Urls(urls)),
        IpcCommand::ShowUrl { url, resume, .. } => Some(SchedulerCommand::ShowUrl { url, resume }),
        IpcCommand::UpdateImageList { .. } => Some(SchedulerCommand::UpdateImageList),
        IpcCommand::VideoFinished { .. } => Some(SchedulerCommand::VideoFinished),
        IpcCommand::RegisterConfig { .. } | IpcCommand::Status => None,
    }
}
