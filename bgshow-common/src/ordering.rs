use std::collections::HashMap;
use std::path::{Path, PathBuf};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Serialize, Deserialize};
use crate::playlist::ImageEntry;

/// Field used when images are sorted rather than shuffled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    #[default]
    Created,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    ByName,
    ByCreated,
    ByModified,
    Shuffle,
    ShuffleLoopFolders,
}

impl Strategy {
    /// Folder looping wins over plain shuffling, which wins over sorting.
    pub fn select(randomize_loop_folders: bool, randomize: bool, sort_by: SortKey) -> Self {
        if randomize_loop_folders {
            Strategy::ShuffleLoopFolders
        } else if randomize {
            Strategy::Shuffle
        } else {
            match sort_by {
                SortKey::Name => Strategy::ByName,
                SortKey::Created => Strategy::ByCreated,
                SortKey::Modified => Strategy::ByModified,
            }
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::ByName => write!(f, "name"),
            Strategy::ByCreated => write!(f, "created"),
            Strategy::ByModified => write!(f, "modified"),
            Strategy::Shuffle => write!(f, "random"),
            Strategy::ShuffleLoopFolders => write!(f, "random (looping folders)"),
        }
    }
}

pub fn order(entries: &[ImageEntry], strategy: Strategy, descending: bool) -> Vec<ImageEntry> {
    let mut rng = rand::thread_rng();
    order_with_rng(entries, strategy, descending, &mut rng)
}

/// Orders a copy of `entries`. `descending` reverses the result of whichever
/// strategy ran.
pub fn order_with_rng<R: Rng + ?Sized>(
    entries: &[ImageEntry],
    strategy: Strategy,
    descending: bool,
    rng: &mut R,
) -> Vec<ImageEntry> {
    let mut ordered = match strategy {
        Strategy::ByName => {
            let mut sorted = entries.to_vec();
            sorted.sort_by_cached_key(|e| e.path.to_string_lossy().to_lowercase());
            sorted
        }
        Strategy::ByCreated => {
            let mut sorted = entries.to_vec();
            sorted.sort_by_key(|e| e.created_at_ms);
            sorted
        }
        Strategy::ByModified => {
            let mut sorted = entries.to_vec();
            sorted.sort_by_key(|e| e.modified_at_ms);
            sorted
        }
        Strategy::Shuffle => {
            let mut shuffled = entries.to_vec();
            shuffled.shuffle(rng);
            shuffled
        }
        Strategy::ShuffleLoopFolders => shuffle_loop_folders(entries, rng),
    };

    if descending {
        ordered.reverse();
    }

    log::debug!("Ordered {} images by {}{}", ordered.len(), strategy, if descending { ", descending" } else { "" });
    ordered
}

/// Interleaves folders: every round takes one image from each folder in a
/// freshly shuffled folder order, until the largest folder has been played
/// through once. Smaller folders reshuffle and start over when they run out.
fn shuffle_loop_folders<R: Rng + ?Sized>(entries: &[ImageEntry], rng: &mut R) -> Vec<ImageEntry> {
    let mut groups: Vec<Vec<ImageEntry>> = Vec::new();
    let mut slots: HashMap<PathBuf, usize> = HashMap::new();

    for entry in entries {
        let parent = entry.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let slot = *slots.entry(parent).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(entry.clone());
    }

    for group in &mut groups {
        group.shuffle(rng);
    }

    let rounds = groups.iter().map(Vec::len).max().unwrap_or(0);
    let mut positions = vec![0usize; groups.len()];
    let mut folder_order: Vec<usize> = (0..groups.len()).collect();
    let mut last_folder: Option<usize> = None;
    let mut result = Vec::with_capacity(rounds * groups.len());

    for _ in 0..rounds {
        folder_order.shuffle(rng);
        if folder_order.len() > 1 && Some(folder_order[0]) == last_folder {
            let swap_with = rng.gen_range(1..folder_order.len());
            folder_order.swap(0, swap_with);
        }

        for &slot in &folder_order {
            if positions[slot] >= groups[slot].len() {
                groups[slot].shuffle(rng);
                positions[slot] = 0;
            }
            result.push(groups[slot][positions[slot]].clone());
            positions[slot] += 1;
        }

        last_folder = folder_order.last().copied();
    }

    result
}
