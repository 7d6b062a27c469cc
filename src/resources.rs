//! Inventory of `resources/{dynamic,static,share}` and file extension classes.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;

use serde::Serialize;
use tokio::fs;
use tracing::warn;

use crate::error::{AdxError, Result};

pub const RESOURCES_DIR: &str = "resources";

/// OS artefacts never reported in an inventory
pub const IGNORED_FILES: &[&str] = &["Thumbs.db", ".DS_Store", "desktop.ini"];

const FORBIDDEN_EXTENSIONS: &[&str] = &[
    "exe", "msi", "dll", "com", "bat", "cmd", "vbs", "vbe", "ps1", "scr", "jar", "sh", "cpl",
    "msc", "reg", "pif", "hta", "wsf",
];

const SAFE_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "json", "txt", "xml", "csv", "png", "jpg", "jpeg", "gif", "svg",
    "bmp", "ico", "webp", "swf", "flv", "mp3", "mp4", "ogg", "oga", "ogv", "wav", "webm", "avi",
    "woff", "woff2", "ttf", "eot", "otf", "map", "md", "pdf",
];

/// Content mode, which is also the resources sub-folder it reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    Dynamic,
    Statics,
    Share,
}

impl ResourceMode {
    pub const ALL: [ResourceMode; 3] = [ResourceMode::Dynamic, ResourceMode::Statics, ResourceMode::Share];

    pub fn dir_name(&self) -> &'static str {
        match self {
            ResourceMode::Dynamic => "dynamic",
            ResourceMode::Statics => "static",
            ResourceMode::Share => "share",
        }
    }
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ResourceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dynamic" => Ok(ResourceMode::Dynamic),
            "static" => Ok(ResourceMode::Statics),
            "share" => Ok(ResourceMode::Share),
            other => Err(format!("Unknown content mode: {}", other)),
        }
    }
}

/// Files of one resources sub-folder, as `/`-separated relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirListing {
    pub is_exist: bool,
    pub files: BTreeSet<String>,
    /// Entries whose name is not valid UTF-8, in lossy display form only.
    /// They are never part of `files`.
    pub unreadable: BTreeSet<String>,
}

impl DirListing {
    pub fn contains(&self, file: &str) -> bool {
        self.files.contains(file)
    }
}

/// Listings of the three resources sub-folders of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirResources {
    pub dynamic: DirListing,
    pub statics: DirListing,
    pub share: DirListing,
}

impl DirResources {
    pub async fn scan(project_dir: &Path) -> Result<Self> {
        let root = project_dir.join(RESOURCES_DIR);
        Ok(Self {
            dynamic: list_dir(&root.join(ResourceMode::Dynamic.dir_name())).await?,
            statics: list_dir(&root.join(ResourceMode::Statics.dir_name())).await?,
            share: list_dir(&root.join(ResourceMode::Share.dir_name())).await?,
        })
    }

    pub fn get(&self, mode: ResourceMode) -> &DirListing {
        match mode {
            ResourceMode::Dynamic => &self.dynamic,
            ResourceMode::Statics => &self.statics,
            ResourceMode::Share => &self.share,
        }
    }

    pub fn contains(&self, mode: ResourceMode, file: &str) -> bool {
        self.get(mode).contains(file)
    }

    /// Every entry with a non UTF-8 name, with its mode
    pub fn unreadable(&self) -> impl Iterator<Item = (ResourceMode, &str)> {
        ResourceMode::ALL.into_iter().flat_map(move |mode| {
            self.get(mode)
                .unreadable
                .iter()
                .map(move |name| (mode, name.as_str()))
        })
    }

    /// Every listed file with its mode, in mode then name order
    pub fn files(&self) -> impl Iterator<Item = (ResourceMode, &str)> {
        ResourceMode::ALL.into_iter().flat_map(move |mode| {
            self.get(mode)
                .files
                .iter()
                .map(move |file| (mode, file.as_str()))
        })
    }
}

/// List a folder recursively; a missing folder yields `is_exist = false`
pub async fn list_dir(dir: &Path) -> Result<DirListing> {
    match fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Ok(DirListing::default()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DirListing::default()),
        Err(e) => return Err(AdxError::from_io(e, dir)),
    }

    let mut listing = DirListing {
        is_exist: true,
        ..Default::default()
    };
    collect_files(dir.to_path_buf(), String::new(), &mut listing).await?;
    Ok(listing)
}

fn join_relative(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn collect_files<'a>(
    dir: PathBuf,
    prefix: String,
    listing: &'a mut DirListing,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| AdxError::from_io(e, &dir))?;

        while let Some(entry) = read_dir.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    let shown = join_relative(&prefix, &raw.to_string_lossy());
                    warn!("Non UTF-8 file name under {}: {}", dir.display(), shown);
                    listing.unreadable.insert(shown);
                    continue;
                }
            };
            if IGNORED_FILES.contains(&name.as_str()) {
                continue;
            }

            let relative = join_relative(&prefix, &name);

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if file_type.is_dir() {
                collect_files(entry.path(), relative, listing).await?;
            } else {
                listing.files.insert(relative);
            }
        }
        Ok(())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionClass {
    Forbidden,
    Safe,
    Unknown,
}

/// Classify a file name by its extension (case-insensitive)
pub fn classify_extension(file: &str) -> ExtensionClass {
    let name = file.rsplit('/').next().unwrap_or(file);
    let extension = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return ExtensionClass::Unknown,
    };

    if FORBIDDEN_EXTENSIONS.contains(&extension.as_str()) {
        ExtensionClass::Forbidden
    } else if SAFE_EXTENSIONS.contains(&extension.as_str()) {
        ExtensionClass::Safe
    } else {
        ExtensionClass::Unknown
    }
}
