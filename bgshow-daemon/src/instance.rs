use std::path::PathBuf;
use std::time::Duration;
use bgshow_common::encoder::{self, EncodeOptions};
use bgshow_common::{
    ErrorReporting, InstanceStatus, OutboundEvent, Scheduler, SchedulerCommand, SchedulerEvent,
    VideoPlayer,
};
use bgshow_config::SlideshowConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug)]
pub enum InstanceMessage {
    Command(SchedulerCommand),
    /// Replace the configuration and register again.
    Register(Box<SlideshowConfig>),
    Status(oneshot::Sender<InstanceStatus>),
    /// The player started for `generation` exited.
    VideoExited { generation: u64 },
}

/// Cloneable sender side of a running instance.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    pub name: String,
    tx: mpsc::UnboundedSender<InstanceMessage>,
}

impl InstanceHandle {
    pub fn send(&self, message: InstanceMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// An outbound event, possibly still being encoded off the async threads.
enum Pending {
    Ready(OutboundEvent),
    Encoding(JoinHandle<Option<OutboundEvent>>),
}

/// One slideshow: owns its scheduler and turns scheduler events into wire
/// events.
pub struct Instance {
    name: String,
    scheduler: Scheduler,
    encode: EncodeOptions,
    player: VideoPlayer,
    events: mpsc::UnboundedSender<OutboundEvent>,
    pending_tx: mpsc::UnboundedSender<Pending>,
    pending_rx: Option<mpsc::UnboundedReceiver<Pending>>,
    self_tx: mpsc::WeakUnboundedSender<InstanceMessage>,
    video_task: Option<JoinHandle<()>>,
    video_generation: u64,
}

impl Instance {
    pub fn new(
        name: String,
        slideshow: &SlideshowConfig,
        events: mpsc::UnboundedSender<OutboundEvent>,
    ) -> (InstanceHandle, Instance, mpsc::UnboundedReceiver<InstanceMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let instance = Instance {
            name: name.clone(),
            scheduler: Scheduler::new(slideshow.playlist_options()),
            encode: slideshow.encode_options(),
            player: slideshow.video_player(),
            events,
            pending_tx,
            pending_rx: Some(pending_rx),
            self_tx: tx.downgrade(),
            video_task: None,
            video_generation: 0,
        };

        (InstanceHandle { name, tx }, instance, rx)
    }

    /// Registers after `startup_delay`, then serves commands and timer
    /// deadlines until every handle is dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<InstanceMessage>, startup_delay: Duration) {
        if let Some(pending) = self.pending_rx.take() {
            tokio::spawn(forward_events(pending, self.events.clone()));
        }

        tokio::time::sleep(startup_delay).await;

        log::info!("Starting slideshow '{}'", self.name);
        let options = Box::new(self.scheduler.options().clone());
        self.dispatch(SchedulerCommand::RegisterConfig(options));

        loop {
            let wakeup = self.scheduler.next_wakeup();

            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                _ = sleep_until(wakeup) => {
                    let events = self.scheduler.tick(Instant::now().into_std());
                    self.emit(events);
                }
            }
        }

        self.stop_video();
        log::info!("Slideshow '{}' stopped", self.name);
    }

    fn handle_message(&mut self, message: InstanceMessage) {
        match message {
            InstanceMessage::Command(command) => self.dispatch(command),
            InstanceMessage::Register(slideshow) => {
                log::info!("Re-registering slideshow '{}'", self.name);
                self.encode = slideshow.encode_options();
                self.player = slideshow.video_player();
                self.stop_video();
                self.dispatch(SchedulerCommand::RegisterConfig(Box::new(slideshow.playlist_options())));
            }
            InstanceMessage::Status(reply) => {
                let _ = reply.send(self.status());
            }
            InstanceMessage::VideoExited { generation } => {
                if generation == self.video_generation {
                    self.video_task = None;
                    self.dispatch(SchedulerCommand::VideoFinished);
                } else {
                    log::debug!("Ignoring exit of superseded video player");
                }
            }
        }
    }

    fn dispatch(&mut self, command: SchedulerCommand) {
        log::debug!("Slideshow '{}' handling {:?}", self.name, command);
        let events = self.scheduler.handle(command, Instant::now().into_std());
        self.emit(events);
    }

    fn status(&self) -> InstanceStatus {
        InstanceStatus {
            name: self.name.clone(),
            state: self.scheduler.state(),
            current_image: self
                .scheduler
                .current()
                .map(|entry| entry.path.to_string_lossy().to_string()),
            position: self.scheduler.cursor(),
            total: self.scheduler.total(),
            timer_remaining: self
                .scheduler
                .time_remaining(Instant::now().into_std())
                .map(|d| d.as_secs()),
            overridden: self.scheduler.is_overridden(),
            playing_video: self.scheduler.is_playing_video(),
        }
    }

    fn emit(&mut self, events: Vec<SchedulerEvent>) {
        for event in events {
            let outbound = match event {
                SchedulerEvent::FileList { images } => OutboundEvent::FileList {
                    identifier: self.name.clone(),
                    images: images.iter().map(|p| p.to_string_lossy().to_string()).collect(),
                },
                SchedulerEvent::Ready { total } => {
                    log::info!("Slideshow '{}' ready with {} images", self.name, total);
                    OutboundEvent::Ready {
                        identifier: self.name.clone(),
                        scanned_at: chrono::Utc::now(),
                    }
                }
                SchedulerEvent::Display { entry, index, total } => {
                    self.stop_video();
                    let identifier = self.name.clone();
                    let options = self.encode;
                    let task = tokio::task::spawn_blocking(move || {
                        match encoder::encode_entry(&entry, &options) {
                            Ok(encoded) => Some(OutboundEvent::DisplayImage {
                                identifier,
                                path: entry.path.to_string_lossy().to_string(),
                                data: encoded.data,
                                index,
                                total,
                                orientation: encoded.orientation,
                            }),
                            Err(e) => {
                                log::warn!("Skipping {:?}: {}", entry.path, e.user_friendly_message());
                                None
                            }
                        }
                    });
                    self.queue(Pending::Encoding(task));
                    continue;
                }
                SchedulerEvent::PlayVideo { entry, .. } => {
                    self.start_video(entry.path.clone());
                    OutboundEvent::PlayVideo {
                        identifier: self.name.clone(),
                        path: entry.path.to_string_lossy().to_string(),
                    }
                }
            };

            self.queue(Pending::Ready(outbound));
        }
    }

    fn queue(&self, pending: Pending) {
        if self.pending_tx.send(pending).is_err() {
            log::warn!("Event stream closed, dropping event for '{}'", self.name);
        }
    }

    fn start_video(&mut self, path: PathBuf) {
        self.stop_video();
        self.video_generation += 1;

        let generation = self.video_generation;
        let player = self.player.clone();
        let tx = self.self_tx.clone();

        self.video_task = Some(tokio::spawn(async move {
            if let Err(e) = player.play(&path).await {
                log::error!("Video playback failed: {}", e.user_friendly_message());
            }
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(InstanceMessage::VideoExited { generation });
            }
        }));
    }

    fn stop_video(&mut self) {
        if let Some(task) = self.video_task.take() {
            log::debug!("Stopping video player for '{}'", self.name);
            task.abort();
        }
    }
}

/// Forwards events in the order they were queued, waiting for each encode to
/// finish before anything queued after it.
async fn forward_events(
    mut pending: mpsc::UnboundedReceiver<Pending>,
    events: mpsc::UnboundedSender<OutboundEvent>,
) {
    while let Some(next) = pending.recv().await {
        let event = match next {
            Pending::Ready(event) => Some(event),
            Pending::Encoding(task) => match task.await {
                Ok(event) => event,
                Err(e) => {
                    log::error!("Image encoding task failed: {}", e);
                    None
                }
            },
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                log::warn!("Event stream closed");
                break;
            }
        }
    }
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
