//! Template Store: resource templates loaded from files
//!
//! A [`Manifest`] is an ordered, immutable list of templates. Order is the
//! apply order: files are visited in lexical order and documents keep their
//! in-file order, so a CRD placed before its CRs is created first.

use std::fs;
use std::path::{Path, PathBuf};

use kube::api::DynamicObject;
use serde_json::Value;
use tracing::debug;

use openshift_builds_common::kube_utils::dynamic_object_from_value;
use openshift_builds_common::yaml::parse_documents;
use openshift_builds_common::{Error, Result};

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Ordered set of resource templates loaded from a file or directory
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    source: PathBuf,
    resources: Vec<DynamicObject>,
}

impl Manifest {
    /// Load every template found at `path`.
    ///
    /// A file path is always read. For a directory, only its direct files
    /// are read unless `recursive` is set, in which case subdirectories are
    /// walked too. Hidden entries are skipped, which keeps the `..data`
    /// links of a mounted ConfigMap from being read twice.
    pub fn load(path: impl AsRef<Path>, recursive: bool) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path)
            .map_err(|e| Error::load(path.display().to_string(), e.to_string()))?;

        let files = if meta.is_dir() {
            let mut files = Vec::new();
            collect_files(path, recursive, &mut files)?;
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut resources = Vec::new();
        for file in &files {
            resources.extend(parse_file(file)?);
        }

        debug!(
            path = %path.display(),
            files = files.len(),
            resources = resources.len(),
            "loaded manifest"
        );

        Ok(Self {
            source: path.to_path_buf(),
            resources,
        })
    }

    /// Build a manifest from templates that are already in memory
    pub fn from_resources(resources: Vec<DynamicObject>) -> Self {
        Self {
            source: PathBuf::new(),
            resources,
        }
    }

    /// Templates in apply order
    pub fn resources(&self) -> &[DynamicObject] {
        &self.resources
    }

    /// Path the templates were loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the manifest holds no templates
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn collect_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let read_err = |e: std::io::Error| Error::load(dir.display().to_string(), e.to_string());

    let mut entries = fs::read_dir(dir)
        .map_err(read_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(read_err)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_files(&path, recursive, out)?;
            }
        } else if has_manifest_extension(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn has_manifest_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e))
}

fn parse_file(path: &Path) -> Result<Vec<DynamicObject>> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| Error::load(&display, e.to_string()))?;

    let docs = if path.extension().is_some_and(|e| e == "json") {
        let value: Value =
            serde_json::from_str(&content).map_err(|e| Error::load(&display, e.to_string()))?;
        vec![value]
    } else {
        parse_documents(&content).map_err(|e| Error::load(&display, e.to_string()))?
    };

    docs.into_iter()
        .enumerate()
        .map(|(i, doc)| {
            if !doc.is_object() {
                return Err(Error::load(&display, format!("document {i} is not a mapping")));
            }
            dynamic_object_from_value(doc)
                .map_err(|e| Error::load(&display, format!("document {i}: {e}")))
        })
        .collect()
}
