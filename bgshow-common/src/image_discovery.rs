use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;
use crate::error::ScanError;
use crate::exclusion::{self, DEFAULT_MANIFEST_NAME};
use crate::playlist::ImageEntry;
use crate::Result;

pub const DEFAULT_IMAGE_EXTENSIONS: &str = "bmp,jpg,jpeg,gif,png";

/// Case-insensitive set of accepted file extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: HashSet<String>,
}

impl ExtensionFilter {
    /// Parses a comma-separated list such as `"bmp,jpg,jpeg"`.
    pub fn from_list(list: &str) -> Self {
        let extensions = list
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn is_acceptable(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => self.extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::from_list(DEFAULT_IMAGE_EXTENSIONS)
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub recursive: bool,
    /// Base names (files or directories) skipped anywhere below a root.
    pub exclude_paths: HashSet<String>,
    pub extensions: ExtensionFilter,
    pub exclusion_manifest: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            exclude_paths: ["@eaDir".to_string()].into_iter().collect(),
            extensions: ExtensionFilter::default(),
            exclusion_manifest: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl ScanOptions {
    fn is_denied(&self, name: &std::ffi::OsStr) -> bool {
        name.to_str()
            .map(|name| self.exclude_paths.contains(name))
            .unwrap_or(false)
    }
}

pub struct ImageDiscovery;

impl ImageDiscovery {
    /// Collects every acceptable file below `roots`. Roots are visited in
    /// order; a root that cannot be read aborts the whole scan.
    pub fn scan(roots: &[PathBuf], options: &ScanOptions) -> Result<Vec<ImageEntry>> {
        let mut images = Vec::new();
        let mut seen = HashSet::new();

        for root in roots {
            Self::scan_root(root, options, &mut images, &mut seen)?;
        }

        log::info!("Discovered {} images in {} directories", images.len(), roots.len());
        Ok(images)
    }

    fn scan_root(
        root: &Path,
        options: &ScanOptions,
        images: &mut Vec<ImageEntry>,
        seen: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        Self::check_root(root)?;
        log::info!("Reading directory {:?} for images", root);

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let mut manifests: HashMap<PathBuf, HashSet<String>> = HashMap::new();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !options.is_denied(entry.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            if !options.extensions.is_acceptable(&file_name) {
                continue;
            }

            let dir = entry.path().parent().unwrap_or(root).to_path_buf();
            let exclusions = manifests
                .entry(dir)
                .or_insert_with_key(|dir| exclusion::load_directory_exclusions(dir, &options.exclusion_manifest));
            if exclusion::is_excluded(&file_name, exclusions) {
                log::debug!("Excluded by manifest: {:?}", entry.path());
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("Skipping unreadable file {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let (created_at_ms, modified_at_ms) = timestamps(&metadata);
            let path = entry.into_path();
            if seen.insert(path.clone()) {
                images.push(ImageEntry::local(path, created_at_ms, modified_at_ms));
            }
        }

        Ok(())
    }

    fn check_root(root: &Path) -> Result<()> {
        let metadata = fs::metadata(root).map_err(|e| ScanError::RootRead {
            path: root.to_path_buf(),
            source: e,
        })?;

        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root.to_path_buf() }.into());
        }

        fs::read_dir(root).map_err(|e| ScanError::RootRead {
            path: root.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }
}

fn timestamps(metadata: &fs::Metadata) -> (i64, i64) {
    let modified = metadata.modified().map(epoch_millis).unwrap_or(0);
    // Not every filesystem records a birth time
    let created = metadata.created().map(epoch_millis).unwrap_or(modified);
    (created, modified)
}

fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BgshowError;
    use tempfile::tempdir;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn names(images: &[ImageEntry]) -> Vec<String> {
        let mut names: Vec<String> = images
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_extension_filter() {
        let filter = ExtensionFilter::from_list("bmp, JPG,jpeg");

        assert!(filter.is_acceptable("a.jpg"));
        assert!(filter.is_acceptable("a.JPG"));
        assert!(filter.is_acceptable("archive.tar.bmp"));
        assert!(!filter.is_acceptable("a.png"));
        assert!(!filter.is_acceptable("jpg"));
        assert!(!filter.is_acceptable("a.jpg.txt"));
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_default_filter() {
        let filter = ExtensionFilter::default();
        for name in ["a.bmp", "a.jpg", "a.jpeg", "a.gif", "a.png"] {
            assert!(filter.is_acceptable(name), "{} should be accepted", name);
        }
        assert!(!filter.is_acceptable("a.mp4"));
    }

    #[test]
    fn test_scan_top_level_only() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("image1.jpg"), "fake jpg").unwrap();
        fs::write(root.join("image2.PNG"), "fake png").unwrap();
        fs::write(root.join("text.txt"), "not an image").unwrap();
        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir").join("nested.jpg"), "fake jpg").unwrap();

        let images = ImageDiscovery::scan(&[root.to_path_buf()], &ScanOptions::default()).unwrap();

        assert_eq!(names(&images), vec!["image1.jpg", "image2.PNG"]);
        assert!(images.iter().all(|e| e.is_local()));
    }

    #[test]
    fn test_scan_recursive_skips_denied_directories() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("root.jpg"), "fake").unwrap();
        fs::create_dir_all(root.join("2023").join("summer")).unwrap();
        fs::write(root.join("2023").join("summer").join("beach.gif"), "fake").unwrap();
        fs::create_dir(root.join("@eaDir")).unwrap();
        fs::write(root.join("@eaDir").join("thumb.jpg"), "fake").unwrap();

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let images = ImageDiscovery::scan(&[root.to_path_buf()], &options).unwrap();

        assert_eq!(names(&images), vec!["beach.gif", "root.jpg"]);
    }

    #[test]
    fn test_scan_applies_exclusion_manifest_per_directory() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(root.join("keep.jpg"), "fake").unwrap();
        fs::write(root.join("hide.jpg"), "fake").unwrap();
        fs::write(root.join(DEFAULT_MANIFEST_NAME), "hide\n").unwrap();
        // Manifest only applies to its own directory
        fs::write(sub.join("hide.png"), "fake").unwrap();

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let images = ImageDiscovery::scan(&[root.to_path_buf()], &options).unwrap();

        assert_eq!(names(&images), vec!["hide.png", "keep.jpg"]);
    }

    #[test]
    fn test_scan_empty_directory_is_not_an_error() {
        let temp_dir = tempdir().unwrap();
        let images = ImageDiscovery::scan(&[temp_dir.path().to_path_buf()], &ScanOptions::default()).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn test_scan_nonexistent_root_fails() {
        let missing = PathBuf::from("/nonexistent/directory");

        match ImageDiscovery::scan(&[missing.clone()], &ScanOptions::default()) {
            Err(BgshowError::Scan(ScanError::RootRead { path, .. })) => assert_eq!(path, missing),
            other => panic!("Expected RootRead error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_file_root_fails() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("a.jpg");
        fs::write(&file, "fake").unwrap();

        match ImageDiscovery::scan(&[file.clone()], &ScanOptions::default()) {
            Err(BgshowError::Scan(ScanError::NotADirectory { path })) => assert_eq!(path, file),
            other => panic!("Expected NotADirectory error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_overlapping_roots_yields_unique_paths() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.jpg"), "fake").unwrap();

        let roots = vec![root.to_path_buf(), root.to_path_buf()];
        let images = ImageDiscovery::scan(&roots, &ScanOptions::default()).unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_scan_records_modification_time() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("old.jpg");
        fs::write(&path, "fake").unwrap();

        let mtime = UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        fs::File::options().write(true).open(&path).unwrap().set_modified(mtime).unwrap();

        let images = ImageDiscovery::scan(&[temp_dir.path().to_path_buf()], &ScanOptions::default()).unwrap();
        assert_eq!(images[0].modified_at_ms, 1_000_000_000);
        assert!(images[0].created_at_ms != 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_unreadable_root_fails() {
        let temp_dir = tempdir().unwrap();
        let restricted = temp_dir.path().join("restricted");
        fs::create_dir(&restricted).unwrap();

        let mut perms = fs::metadata(&restricted).unwrap().permissions();
        perms.set_mode(0o000);
        fs::set_permissions(&restricted, perms).unwrap();

        // Root ignores permission bits
        let readable_anyway = fs::read_dir(&restricted).is_ok();
        let result = ImageDiscovery::scan(&[restricted.clone()], &ScanOptions::default());

        let mut perms = fs::metadata(&restricted).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&restricted, perms).unwrap();

        if !readable_anyway {
            assert!(result.is_err());
        }
    }
}
