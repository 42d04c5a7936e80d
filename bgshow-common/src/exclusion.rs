use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_MANIFEST_NAME: &str = ".bgshow-exclude";

/// Reads the per-directory exclusion manifest. Each non-blank line names a
/// file to hide; any extension on the line is ignored.
pub fn load_directory_exclusions(dir: &Path, manifest_name: &str) -> HashSet<String> {
    let manifest_path = dir.join(manifest_name);

    let contents = match fs::read_to_string(&manifest_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return HashSet::new(),
        Err(e) => {
            log::warn!("Ignoring unreadable exclusion manifest {:?}: {}", manifest_path, e);
            return HashSet::new();
        }
    };

    let exclusions: HashSet<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(file_stem)
        .collect();

    log::debug!("Loaded {} exclusions from {:?}", exclusions.len(), manifest_path);
    exclusions
}

pub fn is_excluded(filename: &str, exclusions: &HashSet<String>) -> bool {
    !exclusions.is_empty() && exclusions.contains(&file_stem(filename))
}

fn file_stem(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_manifest_is_empty() {
        let temp_dir = tempdir().unwrap();
        let exclusions = load_directory_exclusions(temp_dir.path(), DEFAULT_MANIFEST_NAME);
        assert!(exclusions.is_empty());
    }

    #[test]
    fn test_manifest_entries_match_by_stem() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join(DEFAULT_MANIFEST_NAME),
            "holiday.jpg\n\n  beach  \nnotes\n",
        )
        .unwrap();

        let exclusions = load_directory_exclusions(temp_dir.path(), DEFAULT_MANIFEST_NAME);
        assert_eq!(exclusions.len(), 3);

        assert!(is_excluded("holiday.jpg", &exclusions));
        assert!(is_excluded("holiday.png", &exclusions));
        assert!(is_excluded("beach.JPG", &exclusions));
        assert!(is_excluded("notes.gif", &exclusions));
        assert!(!is_excluded("mountains.jpg", &exclusions));
    }

    #[test]
    fn test_custom_manifest_name() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("excludedImages.txt"), "a\n").unwrap();

        assert!(load_directory_exclusions(temp_dir.path(), DEFAULT_MANIFEST_NAME).is_empty());
        let exclusions = load_directory_exclusions(temp_dir.path(), "excludedImages.txt");
        assert!(is_excluded("a.png", &exclusions));
    }

    #[test]
    fn test_dotfile_stem_is_whole_name() {
        let exclusions: HashSet<String> = [".hidden".to_string()].into_iter().collect();
        assert!(is_excluded(".hidden", &exclusions));
    }
}
