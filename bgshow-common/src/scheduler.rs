use std::path::PathBuf;
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use crate::error::ErrorReporting;
use crate::image_discovery::{ExtensionFilter, ImageDiscovery, ScanOptions};
use crate::ledger::ShownLedger;
use crate::ordering::{self, Strategy};
use crate::playlist::{Advance, ImageEntry, OverrideChange, PlaylistState, Retreat};

/// Wait before scanning again after a scan produced nothing to show.
pub const RETRY_DELAY: Duration = Duration::from_secs(10 * 60);

/// Everything a scheduler needs to build and play one slideshow.
#[derive(Debug, Clone)]
pub struct PlaylistOptions {
    pub image_paths: Vec<PathBuf>,
    pub scan: ScanOptions,
    pub strategy: Strategy,
    pub descending: bool,
    pub show_all_images_before_restart: bool,
    /// Falls back to [`ShownLedger::default_path`] when unset.
    pub ledger_path: Option<PathBuf>,
    pub interval: Duration,
    pub change_image_on_resume: bool,
    pub video_extensions: ExtensionFilter,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            image_paths: Vec::new(),
            scan: ScanOptions::default(),
            strategy: Strategy::ByCreated,
            descending: false,
            show_all_images_before_restart: false,
            ledger_path: None,
            interval: Duration::from_secs(10),
            change_image_on_resume: false,
            video_extensions: ExtensionFilter::from_list("mp4,m4v"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Running => write!(f, "running"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    RegisterConfig(Box<PlaylistOptions>),
    Next,
    Previous,
    Pause,
    Play { advance: bool },
    Urls(Vec<String>),
    ShowUrl { url: String, resume: bool },
    UpdateImageList,
    VideoFinished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// Fresh ordered snapshot of the local playlist.
    FileList { images: Vec<PathBuf> },
    /// Registration finished its initial scan.
    Ready { total: usize },
    /// `index` is 1-based.
    Display { entry: ImageEntry, index: usize, total: usize },
    PlayVideo { entry: ImageEntry, index: usize, total: usize },
}

/// Playback state machine for one slideshow. Time is passed in by the owner,
/// which sleeps until [`Scheduler::next_wakeup`] and then calls
/// [`Scheduler::tick`].
#[derive(Debug)]
pub struct Scheduler {
    options: PlaylistOptions,
    state: PlaybackState,
    playlists: PlaylistState,
    ledger: Option<ShownLedger>,
    deadline: Option<Instant>,
    retry_at: Option<Instant>,
    playing_video: bool,
}

impl Scheduler {
    pub fn new(options: PlaylistOptions) -> Self {
        Self {
            options,
            state: PlaybackState::Idle,
            playlists: PlaylistState::new(),
            ledger: None,
            deadline: None,
            retry_at: None,
            playing_video: false,
        }
    }

    pub fn handle(&mut self, command: SchedulerCommand, now: Instant) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        match command {
            SchedulerCommand::RegisterConfig(options) => {
                self.options = *options;
                self.register(now, &mut events);
            }
            SchedulerCommand::Next => {
                let engaged = self.timer_engaged();
                self.advance(now, &mut events);
                self.rearm(now, engaged);
            }
            SchedulerCommand::Previous => {
                let engaged = self.timer_engaged();
                match self.playlists.active_mut().previous() {
                    Retreat::Served(entry) => self.present(entry, &mut events),
                    Retreat::AtStart => self.advance(now, &mut events),
                }
                self.rearm(now, engaged);
            }
            SchedulerCommand::Pause => {
                self.disarm();
                self.state = PlaybackState::Paused;
                log::info!("Slideshow paused");
            }
            SchedulerCommand::Play { advance } => {
                self.state = PlaybackState::Running;
                if advance || self.options.change_image_on_resume {
                    self.advance(now, &mut events);
                }
                self.rearm(now, true);
                log::info!("Slideshow running");
            }
            SchedulerCommand::Urls(urls) => {
                // A running slideshow with nothing local to show restarts on URLs
                let engaged = self.timer_engaged()
                    || (self.state == PlaybackState::Running && self.playlists.local().is_empty());
                match self.playlists.inject(urls) {
                    OverrideChange::Installed | OverrideChange::Replaced => {
                        log::info!("Showing {} external images", self.playlists.active().len());
                        self.advance(now, &mut events);
                        self.rearm(now, engaged);
                    }
                    OverrideChange::Restored => {
                        log::info!(
                            "External images withdrawn, resuming at position {}",
                            self.playlists.active().cursor()
                        );
                        self.advance(now, &mut events);
                        self.rearm(now, engaged);
                    }
                    OverrideChange::Unchanged => log::debug!("External image list unchanged"),
                    OverrideChange::Inactive => {}
                }
            }
            SchedulerCommand::ShowUrl { url, resume } => {
                let engaged = self.timer_engaged();
                self.playing_video = false;
                events.push(SchedulerEvent::Display {
                    entry: ImageEntry::external(&url),
                    index: 1,
                    total: 1,
                });
                if resume && engaged {
                    self.rearm(now, true);
                } else {
                    self.disarm();
                    self.state = PlaybackState::Paused;
                }
            }
            SchedulerCommand::UpdateImageList => {
                let engaged = self.timer_engaged();
                self.rescan(&mut events);
                if self.playlists.is_overridden() {
                    log::info!("Image list refreshed; it resumes when external images are withdrawn");
                } else {
                    self.serve_first_or_retry(now, &mut events);
                    self.rearm(now, engaged);
                }
            }
            SchedulerCommand::VideoFinished => {
                if !self.playing_video {
                    log::debug!("Ignoring video completion, no video is playing");
                } else {
                    self.playing_video = false;
                    self.advance(now, &mut events);
                    self.rearm(now, self.state == PlaybackState::Running);
                }
            }
        }

        events
    }

    /// Fires whatever deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        if self.retry_at.is_some_and(|at| at <= now) {
            self.retry_at = None;
            log::info!("Retrying image scan");
            self.rescan(&mut events);
            if self.playlists.is_overridden() {
                log::debug!("External images are showing, keeping the refreshed list for later");
            } else {
                self.serve_first_or_retry(now, &mut events);
                self.rearm(now, self.state == PlaybackState::Running);
            }
        }

        if self.deadline.is_some_and(|at| at <= now) {
            self.deadline = None;
            self.advance(now, &mut events);
            self.rearm(now, true);
        }

        events
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        match (self.deadline, self.retry_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_playing_video(&self) -> bool {
        self.playing_video
    }

    pub fn is_overridden(&self) -> bool {
        self.playlists.is_overridden()
    }

    pub fn cursor(&self) -> usize {
        self.playlists.active().cursor()
    }

    pub fn total(&self) -> usize {
        self.playlists.active().len()
    }

    pub fn current(&self) -> Option<&ImageEntry> {
        self.playlists.active().current()
    }

    pub fn interval(&self) -> Duration {
        self.options.interval
    }

    pub fn options(&self) -> &PlaylistOptions {
        &self.options
    }

    /// Time left until the next automatic change, if the timer is armed.
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|at| at.saturating_duration_since(now))
    }

    fn register(&mut self, now: Instant, events: &mut Vec<SchedulerEvent>) {
        self.disarm();
        self.retry_at = None;
        self.playing_video = false;

        self.rescan(events);
        events.push(SchedulerEvent::Ready {
            total: self.playlists.local().len(),
        });

        self.state = PlaybackState::Running;
        self.serve_first_or_retry(now, events);
        self.rearm(now, true);
    }

    fn timer_engaged(&self) -> bool {
        self.deadline.is_some() || (self.playing_video && self.state == PlaybackState::Running)
    }

    fn disarm(&mut self) {
        if self.deadline.take().is_some() {
            log::debug!("Slide timer disarmed");
        }
    }

    /// Restarts the interval window when `engaged`, unless a video holds
    /// playback or a retry is pending for the local list.
    fn rearm(&mut self, now: Instant, engaged: bool) {
        let retry_blocks = self.retry_at.is_some() && !self.playlists.is_overridden();
        if engaged && !self.playing_video && !retry_blocks {
            self.deadline = Some(now + self.options.interval);
            log::debug!(
                "Next image in {}",
                humantime::format_duration(self.options.interval)
            );
        } else {
            self.deadline = None;
        }
    }

    fn advance(&mut self, now: Instant, events: &mut Vec<SchedulerEvent>) {
        match self.playlists.active_mut().next() {
            Advance::Served(entry) => self.present(entry, events),
            Advance::Exhausted => {
                if self.playlists.is_overridden() {
                    log::debug!("External image list finished, starting over");
                    self.playlists.active_mut().rewind();
                } else {
                    log::info!("Playlist finished, rescanning");
                    self.rescan(events);
                }
                self.serve_first_or_retry(now, events);
            }
        }
    }

    fn serve_first_or_retry(&mut self, now: Instant, events: &mut Vec<SchedulerEvent>) {
        match self.playlists.active_mut().next() {
            Advance::Served(entry) => self.present(entry, events),
            Advance::Exhausted => {
                log::warn!(
                    "No images to show, retrying in {}",
                    humantime::format_duration(RETRY_DELAY)
                );
                self.deadline = None;
                self.retry_at = Some(now + RETRY_DELAY);
            }
        }
    }

    fn present(&mut self, entry: ImageEntry, events: &mut Vec<SchedulerEvent>) {
        let index = self.playlists.active().cursor();
        let total = self.playlists.active().len();

        if entry.is_local() && self.options.show_all_images_before_restart {
            if let Some(ledger) = self.ledger.as_mut() {
                if let Err(e) = ledger.record_shown(&entry.path) {
                    log::warn!("Could not record shown image: {}", e.user_friendly_message());
                }
            }
        }

        let is_video = entry
            .path
            .file_name()
            .map(|name| self.options.video_extensions.is_acceptable(&name.to_string_lossy()))
            .unwrap_or(false);

        if is_video {
            log::info!("Playing video {:?} ({}/{})", entry.path, index, total);
            self.playing_video = true;
            self.deadline = None;
            events.push(SchedulerEvent::PlayVideo { entry, index, total });
        } else {
            log::info!("Showing {:?} ({}/{})", entry.path, index, total);
            self.playing_video = false;
            events.push(SchedulerEvent::Display { entry, index, total });
        }
    }

    fn rescan(&mut self, events: &mut Vec<SchedulerEvent>) {
        let entries = self.gather();
        events.push(SchedulerEvent::FileList {
            images: entries.iter().map(|e| e.path.clone()).collect(),
        });
        self.playlists.rebuild_local(entries);
    }

    /// Scans, filters through the ledger and orders. Scan failures are logged
    /// and yield an empty list so the retry path takes over.
    fn gather(&mut self) -> Vec<ImageEntry> {
        let scanned = match ImageDiscovery::scan(&self.options.image_paths, &self.options.scan) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Image scan failed: {}", e.user_friendly_message());
                return Vec::new();
            }
        };

        let candidates = if self.options.show_all_images_before_restart {
            self.filter_unshown(scanned)
        } else {
            self.ledger = None;
            scanned
        };

        log::info!("{} files found", candidates.len());
        ordering::order(&candidates, self.options.strategy, self.options.descending)
    }

    fn filter_unshown(&mut self, scanned: Vec<ImageEntry>) -> Vec<ImageEntry> {
        let Some(path) = self.options.ledger_path.clone().or_else(ShownLedger::default_path) else {
            log::warn!("No location for the shown-image ledger, showing every image");
            self.ledger = None;
            return scanned;
        };

        let ledger = self.ledger.insert(ShownLedger::load(&path));
        let total = scanned.len();
        let remaining = ledger.filter(scanned.clone());

        if remaining.is_empty() && total > 0 {
            log::info!("All {} images have been shown, starting over", total);
            if let Err(e) = ledger.reset() {
                log::warn!("{}", e.user_friendly_message());
            }
            return scanned;
        }

        log::debug!("{} of {} images not shown yet", remaining.len(), total);
        remaining
    }
}
