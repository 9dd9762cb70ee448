//! Batch configuration and source discovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cobalt_cobol::lexer::SourceFormat;

use crate::error::{Result, RunError};

/// How many times an augmentation call is attempted before falling back.
pub const DEFAULT_AUGMENT_ATTEMPTS: u32 = 3;

/// Delay before the first retry; each further retry doubles it.
pub const DEFAULT_AUGMENT_BASE_DELAY: Duration = Duration::from_millis(250);

/// Budget for a single augmentation call.
pub const DEFAULT_AUGMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a cached augmentation response stays valid.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Extensions accepted as COBOL input.
pub const SOURCE_EXTENSIONS: &[&str] = &["cobol", "cbl", "cpy"];

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for COBOL sources.
    pub input_root: PathBuf,
    /// Directory the generated files are written under, mirroring the
    /// input's relative paths.
    pub output_root: PathBuf,
    /// Column convention of the input sources.
    pub source_format: SourceFormat,
    /// Accepted file extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
    /// File and directory names skipped during discovery.
    pub skip: Vec<String>,
    /// Worker threads for the batch fan-out.
    pub workers: usize,
    /// Include per-paragraph functionality mappings in the run report.
    pub with_mappings: bool,
    /// Attempt limit for one augmentation submission.
    pub augment_attempts: u32,
    /// First retry delay; doubles on every further attempt.
    pub augment_base_delay: Duration,
    /// Time budget an augmentation implementation must honor per call.
    pub augment_timeout: Duration,
    /// TTL for entries in the shared augmentation cache.
    pub cache_ttl: Duration,
}

impl Config {
    /// A configuration with the default knobs for the given roots.
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            source_format: SourceFormat::Fixed,
            extensions: SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            skip: Vec::new(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            with_mappings: false,
            augment_attempts: DEFAULT_AUGMENT_ATTEMPTS,
            augment_base_delay: DEFAULT_AUGMENT_BASE_DELAY,
            augment_timeout: DEFAULT_AUGMENT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Whether the file name matches an accepted extension.
    fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Whether the entry name is on the skip list.
    fn skips(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.skip.iter().any(|s| s == name)
    }
}

/// Find every accepted source file under the input root.
///
/// Walks the tree recursively, prunes skip-listed names before descending,
/// and returns the survivors sorted by path so the batch processes them in
/// a stable order.
pub fn discover_sources(config: &Config) -> Result<Vec<PathBuf>> {
    if config.workers == 0 {
        return Err(RunError::config("worker count must be at least 1"));
    }
    let mut found = Vec::new();
    walk(config, &config.input_root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(config: &Config, dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| RunError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RunError::io(dir, e))?;
        let path = entry.path();
        if config.skips(&path) {
            continue;
        }
        let kind = entry.file_type().map_err(|e| RunError::io(&path, e))?;
        if kind.is_dir() {
            walk(config, &path, found)?;
        } else if config.accepts(&path) {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn discovery_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "a.cbl", "");
        seed(dir.path(), "b.cobol", "");
        seed(dir.path(), "c.cpy", "");
        seed(dir.path(), "notes.txt", "");
        seed(dir.path(), "sub/d.CBL", "");

        let config = Config::new(dir.path(), dir.path().join("out"));
        let sources = discover_sources(&config).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.cbl", "b.cobol", "c.cpy", "d.CBL"]);
    }

    #[test]
    fn skip_list_prunes_directories_and_files() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "keep.cbl", "");
        seed(dir.path(), "drop.cbl", "");
        seed(dir.path(), "vendor/v.cbl", "");

        let mut config = Config::new(dir.path(), dir.path().join("out"));
        config.skip = vec!["vendor".to_string(), "drop.cbl".to_string()];
        let sources = discover_sources(&config).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].ends_with("keep.cbl"));
    }

    #[test]
    fn missing_input_root_is_an_io_error() {
        let config = Config::new("/nonexistent/cobalt-input", "/tmp/out");
        assert!(matches!(
            discover_sources(&config),
            Err(RunError::Io { .. })
        ));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path(), dir.path().join("out"));
        config.workers = 0;
        assert!(matches!(
            discover_sources(&config),
            Err(RunError::Config { .. })
        ));
    }
}
