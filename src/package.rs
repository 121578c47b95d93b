//! Packaging: single-image downloads and ZIP archives of captured views.

use crate::capture::CapturedView;
use crate::error::Result;
use crate::host::DownloadSink;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A file offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One view's PNG as `<name>.png`.
pub fn single_image(view: &CapturedView) -> Download {
    Download {
        file_name: view.file_name(),
        bytes: view.png.clone(),
    }
}

/// All views of one model, flat, as `model-views-<unix-ms>.zip`.
pub fn views_archive(views: &[CapturedView]) -> Result<Download> {
    let entries = views.iter().map(|view| (view.file_name(), view.png.as_slice()));
    Ok(Download {
        file_name: format!("model-views-{}.zip", unix_millis()),
        bytes: write_archive(entries)?,
    })
}

/// Views of several models, one folder per model, as
/// `batch-model-views-<unix-ms>.zip`. Folders are named by
/// [`model_folder_name`]; repeated names get a `_2`, `_3`, ... suffix.
pub fn batch_archive(results: &[(String, Vec<CapturedView>)]) -> Result<Download> {
    let folders = unique_folder_names(results.iter().map(|(model, _)| model.as_str()));
    let entries = results.iter().zip(folders).flat_map(|((_, views), folder)| {
        views
            .iter()
            .map(move |view| (format!("{}/{}", folder, view.file_name()), view.png.as_slice()))
    });
    Ok(Download {
        file_name: format!("batch-model-views-{}.zip", unix_millis()),
        bytes: write_archive(entries)?,
    })
}

/// Archive folder for a source file: the extension stripped, whitespace runs
/// replaced by `_`.
///
/// A dot at the very start (`.hidden`) does not begin an extension.
pub fn model_folder_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };

    let mut folder = String::with_capacity(stem.len());
    let mut in_space = false;
    for c in stem.chars() {
        if c.is_whitespace() {
            if !in_space {
                folder.push('_');
            }
            in_space = true;
        } else {
            folder.push(c);
            in_space = false;
        }
    }
    folder
}

fn unique_folder_names<'a>(models: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    models
        .map(|model| {
            let base = model_folder_name(model);
            let mut folder = base.clone();
            let mut n = 2;
            while !used.insert(folder.clone()) {
                folder = format!("{}_{}", base, n);
                n += 1;
            }
            folder
        })
        .collect()
}

fn write_archive<'a>(entries: impl Iterator<Item = (String, &'a [u8])>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let cursor = std::io::Cursor::new(&mut buf);
        let mut zip = zip::ZipWriter::new(cursor);

        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let mut count = 0;
        for (name, bytes) in entries {
            zip.start_file(name, options)?;
            zip.write_all(bytes)?;
            count += 1;
        }

        zip.finish()?;
        tracing::debug!("Wrote archive with {} entries", count);
    }

    Ok(buf)
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Writes downloads into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, download: Download) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&download.file_name);
        std::fs::write(&path, &download.bytes)?;
        tracing::info!("Saved {} ({} bytes)", path.display(), download.bytes.len());
        Ok(())
    }
}

/// Keeps downloads in memory. Clones share the list.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    downloads: Rc<RefCell<Vec<Download>>>,
}

impl MemorySink {
    pub fn downloads(&self) -> Vec<Download> {
        self.downloads.borrow().clone()
    }
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, download: Download) -> Result<()> {
        self.downloads.borrow_mut().push(download);
        Ok(())
    }
}
