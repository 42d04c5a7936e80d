use std::collections::HashSet;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

/// Where an entry came from: a directory scan or a list pushed in from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryOrigin {
    Local,
    External,
}

/// One image discovered by a scan, or one URL from an override list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub created_at_ms: i64,
    pub modified_at_ms: i64,
    pub origin: EntryOrigin,
}

impl ImageEntry {
    pub fn local(path: impl Into<PathBuf>, created_at_ms: i64, modified_at_ms: i64) -> Self {
        Self {
            path: path.into(),
            created_at_ms,
            modified_at_ms,
            origin: EntryOrigin::Local,
        }
    }

    pub fn external(url: &str) -> Self {
        Self {
            path: PathBuf::from(url),
            created_at_ms: 0,
            modified_at_ms: 0,
            origin: EntryOrigin::External,
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == EntryOrigin::Local
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of asking the playlist for the next entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Served(ImageEntry),
    Exhausted,
}

/// Result of stepping back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retreat {
    Served(ImageEntry),
    AtStart,
}

/// Ordered entries plus the index of the next entry to serve.
///
/// `cursor` always satisfies `0 <= cursor <= entries.len()`; when it equals the
/// length the playlist is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    entries: Vec<ImageEntry>,
    cursor: usize,
}

impl Playlist {
    pub fn new(entries: Vec<ImageEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    pub fn rebuild(&mut self, entries: Vec<ImageEntry>) {
        self.entries = entries;
        self.cursor = 0;
    }

    pub fn next(&mut self) -> Advance {
        match self.entries.get(self.cursor) {
            Some(entry) => {
                let entry = entry.clone();
                self.cursor += 1;
                Advance::Served(entry)
            }
            None => Advance::Exhausted,
        }
    }

    /// Steps back past the pending advance and one more entry, clamping at the
    /// start. At cursor 0 nothing has been served yet and the cursor stays put.
    pub fn previous(&mut self) -> Retreat {
        if self.cursor == 0 {
            return Retreat::AtStart;
        }

        self.cursor = self.cursor.saturating_sub(2);
        match self.next() {
            Advance::Served(entry) => Retreat::Served(entry),
            Advance::Exhausted => Retreat::AtStart,
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    /// The entry most recently served, if any.
    pub fn current(&self) -> Option<&ImageEntry> {
        self.cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }
}

/// The playlist that was displaced by an external URL list, kept verbatim so
/// it can be restored.
#[derive(Debug, Clone)]
pub struct OverridePlaylist {
    displaced: Playlist,
    urls: HashSet<String>,
}

impl OverridePlaylist {
    pub fn displaced(&self) -> &Playlist {
        &self.displaced
    }

    pub fn urls(&self) -> &HashSet<String> {
        &self.urls
    }
}

/// What an injected URL list did to the active playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideChange {
    /// First non-empty list: the local playlist was saved and replaced.
    Installed,
    /// A different list arrived while an override was already active.
    Replaced,
    /// Same set of URLs as the active override; nothing changed.
    Unchanged,
    /// Empty list while overridden: the saved playlist is back.
    Restored,
    /// Empty list and no override active.
    Inactive,
}

/// The playlist being played, and the one it displaced while an override is
/// active.
#[derive(Debug, Clone, Default)]
pub struct PlaylistState {
    active: Playlist,
    saved: Option<OverridePlaylist>,
}

impl PlaylistState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &Playlist {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut Playlist {
        &mut self.active
    }

    pub fn is_overridden(&self) -> bool {
        self.saved.is_some()
    }

    pub fn saved(&self) -> Option<&OverridePlaylist> {
        self.saved.as_ref()
    }

    /// Installs a freshly scanned local playlist. While an override is active
    /// the scan replaces the saved playlist instead, so the override keeps
    /// playing and the fresh list starts from its beginning on restore.
    pub fn rebuild_local(&mut self, entries: Vec<ImageEntry>) {
        match &mut self.saved {
            Some(saved) => saved.displaced.rebuild(entries),
            None => self.active.rebuild(entries),
        }
    }

    /// The local playlist regardless of whether an override is active.
    pub fn local(&self) -> &Playlist {
        match &self.saved {
            Some(saved) => &saved.displaced,
            None => &self.active,
        }
    }

    pub fn inject(&mut self, urls: Vec<String>) -> OverrideChange {
        let mut seen = HashSet::new();
        let urls: Vec<String> = urls
            .into_iter()
            .filter(|url| !url.is_empty() && seen.insert(url.clone()))
            .collect();

        if urls.is_empty() {
            return self.restore();
        }

        let entries: Vec<ImageEntry> = urls.iter().map(|url| ImageEntry::external(url)).collect();

        match &mut self.saved {
            Some(saved) => {
                if saved.urls == seen {
                    OverrideChange::Unchanged
                } else {
                    saved.urls = seen;
                    self.active.rebuild(entries);
                    OverrideChange::Replaced
                }
            }
            None => {
                let displaced = std::mem::replace(&mut self.active, Playlist::new(entries));
                self.saved = Some(OverridePlaylist { displaced, urls: seen });
                OverrideChange::Installed
            }
        }
    }

    fn restore(&mut self) -> OverrideChange {
        match self.saved.take() {
            Some(saved) => {
                self.active = saved.displaced;
                OverrideChange::Restored
            }
            None => OverrideChange::Inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<ImageEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ImageEntry::local(format!("/test/{}", name), i as i64, i as i64))
            .collect()
    }

    fn served_name(advance: Advance) -> String {
        match advance {
            Advance::Served(entry) => entry.path.file_name().unwrap().to_string_lossy().to_string(),
            Advance::Exhausted => panic!("Expected an entry, playlist was exhausted"),
        }
    }

    #[test]
    fn test_next_walks_in_order_then_exhausts() {
        let mut playlist = Playlist::new(entries(&["a.jpg", "b.jpg"]));

        assert_eq!(served_name(playlist.next()), "a.jpg");
        assert_eq!(served_name(playlist.next()), "b.jpg");
        assert!(playlist.is_exhausted());
        assert_eq!(playlist.next(), Advance::Exhausted);
        assert_eq!(playlist.next(), Advance::Exhausted);
        assert_eq!(playlist.cursor(), 2);
    }

    #[test]
    fn test_empty_playlist_is_exhausted() {
        let mut playlist = Playlist::default();
        assert!(playlist.is_exhausted());
        assert_eq!(playlist.next(), Advance::Exhausted);
    }

    #[test]
    fn test_previous_clamps_at_start() {
        let mut playlist = Playlist::new(entries(&["a.jpg", "b.jpg", "c.jpg"]));

        assert_eq!(playlist.previous(), Retreat::AtStart);
        assert_eq!(playlist.cursor(), 0);
        assert_eq!(playlist.previous(), Retreat::AtStart);
        assert_eq!(playlist.cursor(), 0);
    }

    #[test]
    fn test_previous_serves_entry_before_current() {
        let mut playlist = Playlist::new(entries(&["a.jpg", "b.jpg", "c.jpg"]));
        playlist.next();
        playlist.next();
        playlist.next();

        match playlist.previous() {
            Retreat::Served(entry) => assert_eq!(entry.path, PathBuf::from("/test/b.jpg")),
            Retreat::AtStart => panic!("Expected b.jpg"),
        }
        assert_eq!(playlist.cursor(), 2);
        assert_eq!(served_name(playlist.next()), "c.jpg");
    }

    #[test]
    fn test_previous_on_first_entry_reserves_it() {
        let mut playlist = Playlist::new(entries(&["a.jpg", "b.jpg"]));
        playlist.next();

        match playlist.previous() {
            Retreat::Served(entry) => assert_eq!(entry.path, PathBuf::from("/test/a.jpg")),
            Retreat::AtStart => panic!("Expected a.jpg to be served again"),
        }
        assert_eq!(playlist.cursor(), 1);
    }

    #[test]
    fn test_rebuild_resets_cursor() {
        let mut playlist = Playlist::new(entries(&["a.jpg"]));
        playlist.next();
        playlist.rebuild(entries(&["x.jpg", "y.jpg"]));

        assert_eq!(playlist.cursor(), 0);
        assert_eq!(playlist.len(), 2);
        assert!(playlist.current().is_none());
        assert_eq!(served_name(playlist.next()), "x.jpg");
        assert_eq!(playlist.current().unwrap().path, PathBuf::from("/test/x.jpg"));
    }

    #[test]
    fn test_override_restore_is_verbatim() {
        let mut state = PlaylistState::new();
        state.rebuild_local(entries(&["a.jpg", "b.jpg", "c.jpg"]));
        state.active_mut().next();
        state.active_mut().next();
        let before = state.active().clone();

        let change = state.inject(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(change, OverrideChange::Installed);
        assert!(state.is_overridden());
        assert_eq!(state.active().len(), 2);
        assert_eq!(state.active().cursor(), 0);
        assert_eq!(state.active().entries()[0].origin, EntryOrigin::External);

        state.active_mut().next();

        assert_eq!(state.inject(Vec::new()), OverrideChange::Restored);
        assert!(!state.is_overridden());
        assert_eq!(state.active(), &before);
        assert_eq!(state.active().cursor(), 2);
    }

    #[test]
    fn test_same_url_set_does_not_restart_override() {
        let mut state = PlaylistState::new();
        state.rebuild_local(entries(&["a.jpg"]));

        state.inject(vec!["u1".to_string(), "u2".to_string()]);
        state.active_mut().next();

        let change = state.inject(vec!["u2".to_string(), "u1".to_string()]);
        assert_eq!(change, OverrideChange::Unchanged);
        assert_eq!(state.active().cursor(), 1);
    }

    #[test]
    fn test_second_override_keeps_original_saved() {
        let mut state = PlaylistState::new();
        state.rebuild_local(entries(&["a.jpg", "b.jpg"]));
        state.active_mut().next();

        state.inject(vec!["u1".to_string()]);
        let change = state.inject(vec!["u2".to_string(), "u3".to_string()]);
        assert_eq!(change, OverrideChange::Replaced);
        assert_eq!(state.active().len(), 2);
        assert_eq!(state.active().cursor(), 0);

        state.inject(Vec::new());
        assert_eq!(state.active().len(), 2);
        assert_eq!(state.active().cursor(), 1);
        assert_eq!(state.active().entries()[0].path, PathBuf::from("/test/a.jpg"));
    }

    #[test]
    fn test_empty_injection_without_override_is_inactive() {
        let mut state = PlaylistState::new();
        assert_eq!(state.inject(Vec::new()), OverrideChange::Inactive);
        assert_eq!(state.inject(vec![String::new()]), OverrideChange::Inactive);
    }

    #[test]
    fn test_rescan_during_override_updates_saved_playlist() {
        let mut state = PlaylistState::new();
        state.rebuild_local(entries(&["a.jpg"]));
        state.inject(vec!["u1".to_string()]);

        state.rebuild_local(entries(&["x.jpg", "y.jpg"]));
        assert_eq!(state.active().len(), 1);
        assert_eq!(state.local().len(), 2);

        state.inject(Vec::new());
        assert_eq!(state.active().len(), 2);
        assert_eq!(state.active().cursor(), 0);
    }
}
