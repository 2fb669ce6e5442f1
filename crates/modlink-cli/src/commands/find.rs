//! `modlink find` - show the source an import path selects.

use super::{absolute, SearchArgs};
use anyhow::Context;
use modlink::{ImportPath, ModuleError, ModuleFinder, ModuleSource, ModuleUri};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FindOutcome {
    Found {
        uri: String,
        name: String,
        include_path: Option<String>,
    },
    NotFound {
        tried: Vec<String>,
    },
}

/// Returns `Ok(false)` when no candidate matched.
pub fn execute(origin: &Path, import: &str, search: &SearchArgs, json: bool) -> anyhow::Result<bool> {
    let config = search.to_config()?;
    let origin = absolute(origin)?;
    let origin_uri = if origin.is_dir() {
        ModuleUri::from_directory_path(&origin)
    } else {
        ModuleUri::from_file_path(&origin)
    }
    .with_context(|| format!("{} is not a valid module location", origin.display()))?;

    let finder = ModuleFinder::new(config);
    let path = ImportPath::parse(import);
    let outcome = find(&finder, &origin_uri, &path)?;
    let found = matches!(outcome, FindOutcome::Found { .. });

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        match &outcome {
            FindOutcome::Found { uri, .. } => println!("{}", uri),
            FindOutcome::NotFound { tried } => {
                eprintln!("module {} not found, tried:", path);
                for location in tried {
                    eprintln!("  {}", location);
                }
            }
        }
    }
    Ok(found)
}

/// Lookup failures other than a missing module are propagated
pub fn find(finder: &ModuleFinder, origin: &ModuleUri, path: &ImportPath) -> anyhow::Result<FindOutcome> {
    match finder.find(origin, path) {
        Ok(source) => Ok(found(&source)),
        Err(ModuleError::ModuleNotFound { tried, .. }) => Ok(FindOutcome::NotFound { tried }),
        Err(err) => Err(err.into()),
    }
}

fn found(source: &ModuleSource) -> FindOutcome {
    FindOutcome::Found {
        uri: source.uri().to_string(),
        name: source.name(),
        include_path: source.include_path().map(|uri| uri.to_string()),
    }
}
