//! Modular grammar manifests.
//!
//! A manifest lists the grammar files of a modular grammar as double-quoted paths,
//! relative to the manifest itself. A listed file with the manifest's own extension is
//! another manifest and is expanded in place.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pest::Parser;
use pest_derive::Parser;

use crate::errors::BuildError;

#[derive(Parser)]
#[grammar = "grammar/manifest.pest"]
struct ManifestParser;

/// The files a manifest expands to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Every manifest visited, the top one first.
    pub manifests: Vec<PathBuf>,
    /// Grammar modules in listing order, each once.
    pub modules: Vec<PathBuf>,
}

/// Paths listed in manifest text, in order.
pub fn parse_manifest(text: &str) -> Result<Vec<String>, String> {
    let pairs = ManifestParser::parse(Rule::manifest, text).map_err(|e| e.to_string())?;
    Ok(pairs
        .flatten()
        .filter(|pair| pair.as_rule() == Rule::path)
        .map(|pair| pair.as_str().trim().to_string())
        .collect())
}

/// Expands the manifest at `manifest` recursively. Cycles are cut at the first repeat.
pub fn expand(manifest: &Path) -> Result<Expansion, BuildError> {
    let mut expansion = Expansion::default();
    let mut visited = HashSet::new();
    expand_into(manifest, &mut visited, &mut expansion)?;
    Ok(expansion)
}

fn expand_into(
    manifest: &Path,
    visited: &mut HashSet<PathBuf>,
    expansion: &mut Expansion,
) -> Result<(), BuildError> {
    let manifest = canonical(manifest, manifest)?;
    if !visited.insert(manifest.clone()) {
        return Ok(());
    }
    expansion.manifests.push(manifest.clone());

    let text = fs::read_to_string(&manifest)
        .map_err(|e| BuildError::unreadable(manifest.display(), e))?;
    let listed = parse_manifest(&text).map_err(|e| {
        BuildError::unreadable(manifest.display(), format!("malformed manifest\n{e}"))
    })?;

    let dir = manifest.parent().unwrap_or_else(|| Path::new("."));
    for entry in listed {
        let path = dir.join(&entry);
        if path.extension() == manifest.extension() {
            expand_into(&path, visited, expansion)?;
            continue;
        }
        let module = canonical(&manifest, &path)?;
        if visited.insert(module.clone()) {
            expansion.modules.push(module);
        }
    }
    Ok(())
}

fn canonical(manifest: &Path, path: &Path) -> Result<PathBuf, BuildError> {
    path.canonicalize()
        .map_err(|e| BuildError::unreadable(manifest.display(), format!("{}: {e}", path.display())))
}
