pub mod playlist;
pub mod image_discovery;
pub mod exclusion;
pub mod ledger;
pub mod ordering;
pub mod scheduler;
pub mod encoder;
pub mod player;
pub mod ipc;
pub mod duration;
pub mod error;

pub use playlist::{Advance, EntryOrigin, ImageEntry, OverrideChange, OverridePlaylist, Playlist, PlaylistState, Retreat};
pub use image_discovery::{ExtensionFilter, ImageDiscovery, ScanOptions};
pub use ledger::ShownLedger;
pub use ordering::{SortKey, Strategy};
pub use scheduler::{PlaybackState, PlaylistOptions, Scheduler, SchedulerCommand, SchedulerEvent};
pub use encoder::{EncodeOptions, EncodedImage};
pub use player::VideoPlayer;
pub use duration::parse_duration;
pub use ipc::{IpcClient, IpcServer, IpcCommand, IpcResponse, InstanceStatus, OutboundEvent};
pub use error::{BgshowError, Result, ErrorReporting};
