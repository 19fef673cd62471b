//! Resolving grammar identifiers to the files a build depends on.
//!
//! Resolution is cheap and re-done on every setup: it canonicalizes the identifier,
//! expands modular manifests, and reads the modification time of every member so the
//! build cache can decide whether a rebuild is due.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::manifest;
use crate::errors::BuildError;

/// `scheme://` prefix of a URI.
static URI_SCHEME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]+)://").expect("URI scheme pattern is valid")
});

/// `/C:/...`, a Windows drive path as it appears after `file://`.
static DRIVE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[A-Za-z]:[/\\]").expect("drive pattern is valid"));

// ============================================================================
// IDENTITY AND SOURCE SET
// ============================================================================

/// Names one grammar: the canonical absolute path of its primary file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrammarIdentity(PathBuf);

impl GrammarIdentity {
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name without its extension, used to name build directories.
    pub fn stem(&self) -> String {
        self.0
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "grammar".to_string())
    }
}

impl fmt::Display for GrammarIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Every file one grammar is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarSourceSet {
    pub identity: GrammarIdentity,
    /// The grammar file itself, or the top manifest of a modular grammar.
    pub primary: PathBuf,
    /// Grammar files to translate, in order. Just `primary` unless modular.
    pub modules: Vec<PathBuf>,
    /// All files whose modification makes the grammar stale, manifests included.
    pub members: Vec<PathBuf>,
    pub modular: bool,
    pub most_recent_modification: SystemTime,
}

impl GrammarSourceSet {
    /// True when some member changed after `built_at`.
    pub fn is_newer_than(&self, built_at: SystemTime) -> bool {
        self.most_recent_modification > built_at
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves grammar identifiers; relative paths are taken from `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct GrammarSourceResolver {
    base_dir: Option<PathBuf>,
}

impl GrammarSourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn resolve(&self, identifier: &str, modular: bool) -> Result<GrammarSourceSet, BuildError> {
        let path = self.locate(identifier)?;
        let primary = path
            .canonicalize()
            .map_err(|e| BuildError::unreadable(identifier, format!("{}: {e}", path.display())))?;
        if !primary.is_file() {
            return Err(BuildError::unreadable(identifier, "not a regular file"));
        }

        let (modules, members) = if modular {
            let expansion = manifest::expand(&primary)?;
            let mut members = expansion.manifests;
            members.extend(expansion.modules.iter().cloned());
            (expansion.modules, members)
        } else {
            (vec![primary.clone()], vec![primary.clone()])
        };

        let most_recent_modification = most_recent_modification(identifier, &members)?;
        debug!(
            grammar = %primary.display(),
            members = members.len(),
            modular,
            "resolved grammar sources"
        );

        Ok(GrammarSourceSet {
            identity: GrammarIdentity(primary.clone()),
            primary,
            modules,
            members,
            modular,
            most_recent_modification,
        })
    }

    /// Turns an identifier into a path: plain paths as given, `file://` URIs decoded.
    fn locate(&self, identifier: &str) -> Result<PathBuf, BuildError> {
        let path = match URI_SCHEME.captures(identifier) {
            Some(captures) => {
                let scheme = &captures["scheme"];
                if !scheme.eq_ignore_ascii_case("file") {
                    return Err(BuildError::unreadable(
                        identifier,
                        format!("unsupported URI scheme '{scheme}'"),
                    ));
                }
                file_uri_path(&identifier[captures[0].len()..])
            }
            None => PathBuf::from(identifier),
        };

        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }
}

/// Path part of a `file://` URI, after the scheme.
fn file_uri_path(rest: &str) -> PathBuf {
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    let decoded = percent_decode(rest);
    if DRIVE_PATH.is_match(&decoded) {
        PathBuf::from(&decoded[1..])
    } else {
        PathBuf::from(decoded)
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| text.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn most_recent_modification(identifier: &str, members: &[PathBuf]) -> Result<SystemTime, BuildError> {
    let mut latest = SystemTime::UNIX_EPOCH;
    for member in members {
        let modified = fs::metadata(member)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| BuildError::unreadable(identifier, format!("{}: {e}", member.display())))?;
        latest = latest.max(modified);
    }
    Ok(latest)
}
