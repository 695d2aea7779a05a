//! Project file discovery for the injected pool.
//!
//! Walks a directory tree, reads candidate text files in parallel, and
//! scores each against a generic project-relevance rubric (0–100). The
//! best-scoring files become injected fragments keyed by their
//! root-relative path, so re-running discovery overwrites rather than
//! duplicates.
//!
//! Unreadable files are recorded in the report and skipped; discovery never
//! fails as a whole.

use docweaver_config::DiscoveryConfig;
use docweaver_core::fragment::split_terms;
use docweaver_core::{ContextFragment, DiscoveryError};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Build and dependency directories never worth reading.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    "vendor",
    "__pycache__",
    "bin",
    "obj",
];

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc", "org"];
const DATA_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json", "ini", "cfg"];
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "kt", "rb", "cs", "c", "h", "cpp", "hpp",
    "swift", "php", "sh", "sql",
];

/// Words of a file stem that mark project documentation, singular as
/// produced by `split_terms`.
const DOC_NAMES: &[&str] = &[
    "readme",
    "requirement",
    "architecture",
    "design",
    "overview",
    "charter",
    "roadmap",
    "plan",
    "proposal",
    "scope",
    "stakeholder",
    "risk",
    "contributing",
    "changelog",
];

const MANIFEST_NAMES: &[&str] = &[
    "cargo.toml",
    "package.json",
    "pyproject.toml",
    "composer.json",
    "build.gradle",
];

const DOC_DIRS: &[&str] = &["docs", "doc", "documentation", "wiki"];

/// Project-management vocabulary rewarded in file content.
const CONTENT_KEYWORDS: &[&str] = &[
    "project",
    "requirement",
    "scope",
    "stakeholder",
    "risk",
    "budget",
    "timeline",
    "milestone",
    "architecture",
    "objective",
    "deliverable",
    "schedule",
    "compliance",
    "quality",
    "security",
    "dependency",
];

const KEYWORD_POINTS: f64 = 5.0;
const CONTENT_MAX: f64 = 50.0;
const DOC_NAME_BONUS: f64 = 25.0;
const MANIFEST_BONUS: f64 = 20.0;
const DOC_DIR_BONUS: f64 = 5.0;
/// Files with less trimmed text than this score zero.
const MIN_CONTENT_CHARS: usize = 40;
const TAG_KEYWORDS: usize = 5;

/// Knobs for one discovery run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    pub min_score: f64,
    pub max_count: usize,
    pub max_depth: usize,
    pub max_file_bytes: u64,
    pub timeout: Option<Duration>,
    /// Extra directory names skipped alongside [`EXCLUDED_DIRS`]
    pub excluded_dirs: Vec<String>,
}

impl DiscoveryOptions {
    pub fn with_limits(mut self, min_score: f64, max_count: usize) -> Self {
        self.min_score = min_score;
        self.max_count = max_count;
        self
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from(&DiscoveryConfig::default())
    }
}

impl From<&DiscoveryConfig> for DiscoveryOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            min_score: config.min_score,
            max_count: config.max_count,
            max_depth: config.max_depth,
            max_file_bytes: config.max_file_bytes,
            timeout: config.timeout_secs.map(Duration::from_secs),
            excluded_dirs: config.excluded_dirs.clone(),
        }
    }
}

/// One scored file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredFile {
    /// Root-relative path with `/` separators; the fragment key
    pub key: String,
    pub path: PathBuf,
    pub score: f64,
    pub bytes_read: usize,
    /// Content was cut at the per-file byte cap
    pub truncated: bool,
    pub matched_keywords: Vec<String>,
    pub injected: bool,
}

/// Outcome of a discovery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub root: PathBuf,
    /// Text files read and scored
    pub scanned: usize,
    /// Every scored file, best first
    pub candidates: Vec<DiscoveredFile>,
    /// Fragments registered
    pub injected: usize,
    pub errors: Vec<DiscoveryError>,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl DiscoveryReport {
    pub fn injected_files(&self) -> impl Iterator<Item = &DiscoveredFile> {
        self.candidates.iter().filter(|c| c.injected)
    }
}

/// Walks, reads, and scores project files.
pub struct FileDiscovery {
    options: DiscoveryOptions,
}

struct Scanned {
    file: DiscoveredFile,
    content: String,
    tags: Vec<String>,
}

impl FileDiscovery {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Scan `root` and return the report plus the fragments to inject.
    ///
    /// Candidates are ordered by score (desc) then key (asc) regardless of
    /// walk or thread scheduling order.
    pub fn scan(&self, root: &Path) -> (DiscoveryReport, Vec<ContextFragment>) {
        let started = Instant::now();
        let deadline = self.options.timeout.map(|t| started + t);
        let expired = || deadline.is_some_and(|d| Instant::now() >= d);

        let mut report = DiscoveryReport {
            root: root.to_path_buf(),
            ..Default::default()
        };

        // ── Walk ───────────────────────────────────────────────────────
        let mut paths = Vec::new();
        let walker = WalkDir::new(root)
            .max_depth(self.options.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_skipped_dir(e));

        for entry in walker {
            if expired() {
                report.timed_out = true;
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    warn!(path = %path.display(), error = %err, "Discovery walk error");
                    report.errors.push(DiscoveryError::Walk {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if entry.file_type().is_file() && is_text_candidate(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        // ── Read + score in parallel ───────────────────────────────────
        let cap = self.options.max_file_bytes;
        let outcomes: Vec<Option<Result<Scanned, DiscoveryError>>> = paths
            .par_iter()
            .map(|path| {
                if expired() {
                    return None;
                }
                Some(scan_file(root, path, cap))
            })
            .collect();

        let mut scanned = Vec::new();
        for outcome in outcomes {
            match outcome {
                None => report.timed_out = true,
                Some(Ok(file)) => scanned.push(file),
                Some(Err(err)) => {
                    warn!(error = %err, "Skipping unreadable file");
                    report.errors.push(err);
                }
            }
        }
        report.scanned = scanned.len();

        scanned.sort_by(|a, b| {
            b.file
                .score
                .total_cmp(&a.file.score)
                .then_with(|| a.file.key.cmp(&b.file.key))
        });

        // ── Select ─────────────────────────────────────────────────────
        let mut fragments = Vec::new();
        for item in &mut scanned {
            let full = fragments.len() >= self.options.max_count;
            if full || item.file.score <= self.options.min_score {
                continue;
            }
            item.file.injected = true;
            debug!(key = %item.file.key, score = item.file.score, "Selected for injection");
            fragments.push(
                ContextFragment::injected(
                    item.file.key.as_str(),
                    std::mem::take(&mut item.content),
                    item.file.path.clone(),
                )
                .with_tags(item.tags.iter().cloned())
                .with_relevance_hint(item.file.score / 100.0),
            );
        }
        report.candidates = scanned.into_iter().map(|s| s.file).collect();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            root = %root.display(),
            scanned = report.scanned,
            selected = fragments.len(),
            errors = report.errors.len(),
            timed_out = report.timed_out,
            elapsed_ms = report.elapsed_ms,
            "Discovery complete"
        );
        (report, fragments)
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return true;
        }
        entry.file_type().is_dir()
            && (EXCLUDED_DIRS.contains(&name.as_ref())
                || self.options.excluded_dirs.iter().any(|d| d == name.as_ref()))
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_text_candidate(path: &Path) -> bool {
    let ext = extension(path);
    DOC_EXTENSIONS.contains(&ext.as_str())
        || DATA_EXTENSIONS.contains(&ext.as_str())
        || SOURCE_EXTENSIONS.contains(&ext.as_str())
        || MANIFEST_NAMES.contains(&file_name(path).as_str())
}

/// Root-relative path joined with `/` on every platform.
fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn scan_file(root: &Path, path: &Path, cap: u64) -> Result<Scanned, DiscoveryError> {
    let io_error = |e: io::Error| DiscoveryError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let (content, truncated) = read_capped(path, cap).map_err(io_error)?;
    let key = relative_key(root, path);
    let (score, matched_keywords) = project_relevance(&key, &content);

    let mut tags: Vec<String> = Path::new(&key)
        .file_stem()
        .map(|s| split_terms(&s.to_string_lossy()))
        .unwrap_or_default();
    tags.extend(matched_keywords.iter().take(TAG_KEYWORDS).cloned());
    tags.dedup();

    Ok(Scanned {
        file: DiscoveredFile {
            key,
            path: path.to_path_buf(),
            score,
            bytes_read: content.len(),
            truncated,
            matched_keywords,
            injected: false,
        },
        content,
        tags,
    })
}

/// Read at most `cap` bytes as UTF-8. A multi-byte sequence split by the
/// cap is dropped; NUL bytes or invalid UTF-8 elsewhere mean binary.
fn read_capped(path: &Path, cap: u64) -> io::Result<(String, bool)> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut buf = Vec::with_capacity(len.min(cap) as usize);
    file.take(cap).read_to_end(&mut buf)?;
    let truncated = len > cap;

    if buf.contains(&0) {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "binary content"));
    }
    match String::from_utf8(buf) {
        Ok(text) => Ok((text, truncated)),
        Err(err) if truncated && err.utf8_error().error_len().is_none() => {
            let valid = err.utf8_error().valid_up_to();
            let mut bytes = err.into_bytes();
            bytes.truncate(valid);
            let text = String::from_utf8(bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok((text, true))
        }
        Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err)),
    }
}

/// Project-relevance rubric.
///
/// | Signal | Points |
/// |---|---|
/// | each PM keyword in content | 5, up to 50 |
/// | documentation file name | 25 (manifests 20) |
/// | inside a docs directory | 5 |
/// | extension: docs / data / source | 15 / 8 / 3 |
///
/// Near-empty files score 0. The total is capped at 100. Matched keywords
/// are returned most frequent first.
pub fn project_relevance(key: &str, content: &str) -> (f64, Vec<String>) {
    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        return (0.0, Vec::new());
    }
    let lower = content.to_lowercase();
    let mut counts: Vec<(&str, usize)> = CONTENT_KEYWORDS
        .iter()
        .map(|kw| (*kw, lower.matches(kw).count()))
        .filter(|(_, n)| *n > 0)
        .collect();
    // Stable: equal counts keep vocabulary order
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut score = (counts.len() as f64 * KEYWORD_POINTS).min(CONTENT_MAX);

    let path = Path::new(key);
    let name = file_name(path);
    let stem_terms = path
        .file_stem()
        .map(|s| split_terms(&s.to_string_lossy()))
        .unwrap_or_default();
    if MANIFEST_NAMES.contains(&name.as_str()) {
        score += MANIFEST_BONUS;
    } else if stem_terms.iter().any(|t| DOC_NAMES.contains(&t.as_str())) {
        score += DOC_NAME_BONUS;
    }

    if let Some(parent) = path.parent() {
        let in_docs = parent.components().any(|c| match c {
            Component::Normal(p) => DOC_DIRS.contains(&p.to_string_lossy().to_lowercase().as_str()),
            _ => false,
        });
        if in_docs {
            score += DOC_DIR_BONUS;
        }
    }

    let ext = extension(path);
    score += if DOC_EXTENSIONS.contains(&ext.as_str()) {
        15.0
    } else if DATA_EXTENSIONS.contains(&ext.as_str()) {
        8.0
    } else if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
        3.0
    } else {
        0.0
    };

    let keywords = counts.into_iter().map(|(kw, _)| kw.to_string()).collect();
    (score.min(100.0), keywords)
}
