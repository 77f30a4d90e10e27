use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TAG: &str = "0.0";
pub const DEFAULT_BUILD: &str = "0";
pub const VERSION_ENV_OVERRIDE: &str = "FW_VERSION";

/// How a tag and a commit count are turned into a display version.
#[derive(Default, Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum VersionPolicy {
    /// `ver_<tag>_build<total commits>`, with a cosmetically trimmed tag.
    #[default]
    TotalCount,
    /// The bare tag when HEAD is tagged, otherwise `<tag>+<commits since tag>`.
    SinceTag,
}

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("`{0}` is not a valid preprocessor identifier")]
    InvalidDefineName(String),
}

/// Answers the handful of questions the stamper asks version control.
///
/// Every answer is optional: `None` means the query failed or had nothing to say.
pub trait VersionSource {
    fn nearest_tag(&self) -> Option<String>;
    fn exact_tag(&self) -> Option<String>;
    /// Commits reachable from HEAD, or from HEAD but not `since` when given.
    fn commit_count(&self, since: Option<&str>) -> Option<String>;
}

pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn query(&self, args: &[&str]) -> Option<String> {
        let output = match Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!("⚠️ Unable to run git {}: {error}", args.join(" "));
                return None;
            }
        };

        if !output.status.success() {
            tracing::debug!("git {} exited with {}", args.join(" "), output.status);
            return None;
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}

impl VersionSource for GitCli {
    fn nearest_tag(&self) -> Option<String> {
        self.query(&["describe", "--tags", "--abbrev=0"])
    }

    fn exact_tag(&self) -> Option<String> {
        self.query(&["describe", "--tags", "--exact-match", "HEAD"])
    }

    fn commit_count(&self, since: Option<&str>) -> Option<String> {
        match since {
            Some(tag) => self.query(&["rev-list", "--count", &format!("{tag}..HEAD")]),
            None => self.query(&["rev-list", "--count", "HEAD"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub tag: String,
    pub build: String,
    pub exact_match: bool,
    pub policy: VersionPolicy,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.policy {
            VersionPolicy::TotalCount => write!(f, "ver_{}_build{}", self.tag, self.build),
            VersionPolicy::SinceTag if self.exact_match => f.write_str(&self.tag),
            VersionPolicy::SinceTag => write!(f, "{}+{}", self.tag, self.build),
        }
    }
}

/// Query `source` according to `policy`. Failed queries fall back to defaults.
pub fn derive_version(source: &impl VersionSource, policy: VersionPolicy) -> Version {
    match policy {
        VersionPolicy::TotalCount => {
            let tag = source.nearest_tag().unwrap_or_else(|| {
                tracing::warn!("⚠️ No git tag found, using {DEFAULT_TAG}");
                DEFAULT_TAG.into()
            });
            let build = source
                .commit_count(None)
                .unwrap_or_else(|| DEFAULT_BUILD.into());

            Version {
                tag: cosmetic_tag(&tag),
                build,
                exact_match: false,
                policy,
            }
        }
        VersionPolicy::SinceTag => {
            // An exact tag at HEAD takes precedence over counting commits.
            if let Some(tag) = source.exact_tag() {
                return Version {
                    tag,
                    build: DEFAULT_BUILD.into(),
                    exact_match: true,
                    policy,
                };
            }

            let Some(tag) = source.nearest_tag() else {
                tracing::warn!("⚠️ No git tag found, using {DEFAULT_TAG}");
                return Version {
                    tag: DEFAULT_TAG.into(),
                    build: DEFAULT_BUILD.into(),
                    exact_match: false,
                    policy,
                };
            };
            let build = source
                .commit_count(Some(&tag))
                .unwrap_or_else(|| DEFAULT_BUILD.into());

            Version {
                tag,
                build,
                exact_match: false,
                policy,
            }
        }
    }
}

/// The version to stamp: a non-empty override wins, otherwise ask `source`.
pub fn resolve_version(
    source: &impl VersionSource,
    policy: VersionPolicy,
    env_override: Option<String>,
) -> String {
    match env_override.map(|v| v.trim().to_string()) {
        Some(version) if !version.is_empty() => {
            tracing::info!("🔧 Using {VERSION_ENV_OVERRIDE} from the environment");
            version
        }
        _ => derive_version(source, policy).to_string(),
    }
}

/// Strip leading `v`/`V` and one trailing `.0`, so `v1.2.0` reads `1.2`.
fn cosmetic_tag(tag: &str) -> String {
    let tag = tag.trim_start_matches(['v', 'V']);
    let tag = tag.strip_suffix(".0").unwrap_or(tag);
    if tag.is_empty() {
        DEFAULT_TAG.into()
    } else {
        tag.into()
    }
}

pub fn render_header(define_name: &str, version: &str) -> Result<String, HeaderError> {
    if !is_identifier(define_name) {
        return Err(HeaderError::InvalidDefineName(define_name.into()));
    }

    let mut escaped = String::with_capacity(version.len());
    for c in version.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' | '\r' => escaped.push(' '),
            c => escaped.push(c),
        }
    }

    Ok(format!("#pragma once\n#define {define_name} \"{escaped}\"\n"))
}

/// Write `contents` to `path` unless it already holds exactly that.
///
/// Returns whether the file was written.
pub fn write_header(path: &Path, contents: &str) -> Result<bool, HeaderError> {
    let io_error = |source| HeaderError::Io {
        path: path.to_path_buf(),
        source,
    };

    if fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, contents).map_err(io_error)?;

    Ok(true)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
