// gallery.rs - Imported Overlay Images
//
// Images the user imported are copied into one directory. `gallery.json`
// next to them remembers the per-image opacity. The directory listing is the
// source of truth: scan() reconciles the list with what is on disk.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{APP_NAME, SUPPORTED_EXTENSIONS};
use crate::error::{OverlayError, Result};
use crate::utils::clamp_unit;

const INDEX_FILE: &str = "gallery.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub path: PathBuf,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_opacity() -> f32 {
    1.0
}

impl GalleryEntry {
    /// File name shown in menus
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug)]
pub struct Gallery {
    dir: PathBuf,
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("overlays")
    }

    /// Open (creating if needed) the gallery in `dir` and reconcile it
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let index = dir.join(INDEX_FILE);
        let entries = match fs::read_to_string(&index) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unreadable gallery index {:?}: {}", index, e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };

        let mut gallery = Self { dir, entries };
        gallery.scan()?;
        info!(
            "Gallery opened at {:?} with {} image(s)",
            gallery.dir,
            gallery.entries.len()
        );
        Ok(gallery)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn find(&self, path: &Path) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Pick up supported files in the directory, forget vanished ones
    pub fn scan(&mut self) -> Result<()> {
        self.entries.retain(|e| e.path.is_file());

        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if !path.is_file() || !is_supported(&path) {
                continue;
            }
            if self.find(&path).is_none() {
                debug!("Gallery picked up {:?}", path);
                self.entries.push(GalleryEntry {
                    path,
                    opacity: default_opacity(),
                });
            }
        }

        self.entries.sort_by_key(GalleryEntry::display_name);
        Ok(())
    }

    /// Copy `source` into the gallery as `name` (extension kept from source)
    pub fn import(&mut self, source: &Path, name: &str) -> Result<PathBuf> {
        if !is_supported(source) {
            return Err(OverlayError::Gallery(format!(
                "{} is not a supported image file",
                source.display()
            )));
        }

        let name = sanitize_name(name)
            .ok_or_else(|| OverlayError::Gallery("an overlay needs a name".into()))?;
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut dest = self.dir.join(format!("{name}{ext}"));
        let mut i = 1;
        while dest.exists() {
            dest = self.dir.join(format!("{name}_{i}{ext}"));
            i += 1;
        }

        fs::copy(source, &dest)?;
        info!("Imported {:?} as {:?}", source, dest);

        self.entries.push(GalleryEntry {
            path: dest.clone(),
            opacity: default_opacity(),
        });
        self.entries.sort_by_key(GalleryEntry::display_name);
        self.save()?;
        Ok(dest)
    }

    /// Drop an entry and delete its file
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        let Some(pos) = self.entries.iter().position(|e| e.path == path) else {
            return Err(OverlayError::Gallery(format!(
                "{} is not in the gallery",
                path.display()
            )));
        };

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.entries.remove(pos);
        info!("Removed {:?} from the gallery", path);
        self.save()
    }

    /// Remember the opacity an image should be shown with
    pub fn set_opacity(&mut self, path: &Path, opacity: f32) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.path == path)
            .ok_or_else(|| {
                OverlayError::Gallery(format!("{} is not in the gallery", path.display()))
            })?;
        entry.opacity = clamp_unit(opacity);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| OverlayError::Gallery(e.to_string()))?;
        fs::write(self.dir.join(INDEX_FILE), json)?;
        Ok(())
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Replace characters Windows forbids in file names; None if nothing is left
fn sanitize_name(name: &str) -> Option<String> {
    let name: String = name
        .trim()
        .chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
        .collect();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::write_still;
    use image::ImageFormat;

    fn source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        write_still(&path, ImageFormat::Png);
        path
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("  a<b>:c  ").as_deref(), Some("a_b__c"));
        assert_eq!(sanitize_name(r#"x/y\z|"?*"#).as_deref(), Some("x_y_z____"));
        assert_eq!(sanitize_name("   "), None);
    }

    #[test]
    fn import_copies_and_numbers_collisions() {
        let src_dir = tempfile::tempdir().unwrap();
        let gallery_dir = tempfile::tempdir().unwrap();
        let src = source(src_dir.path(), "cat.png");

        let mut gallery = Gallery::open(gallery_dir.path()).unwrap();
        let first = gallery.import(&src, "kitty").unwrap();
        let second = gallery.import(&src, "kitty").unwrap();
        let third = gallery.import(&src, "kitty").unwrap();

        assert_eq!(first.file_name().unwrap(), "kitty.png");
        assert_eq!(second.file_name().unwrap(), "kitty_1.png");
        assert_eq!(third.file_name().unwrap(), "kitty_2.png");
        assert!(third.is_file());
        assert_eq!(gallery.entries().len(), 3);
    }

    #[test]
    fn import_rejects_empty_names_and_unknown_types() {
        let src_dir = tempfile::tempdir().unwrap();
        let mut gallery = Gallery::open(src_dir.path().join("g")).unwrap();
        let src = source(src_dir.path(), "cat.png");
        assert!(matches!(
            gallery.import(&src, "  "),
            Err(OverlayError::Gallery(_))
        ));

        let txt = src_dir.path().join("notes.txt");
        fs::write(&txt, "hi").unwrap();
        assert!(gallery.import(&txt, "notes").is_err());
        assert!(gallery.entries().is_empty());
    }

    #[test]
    fn opacity_persists_across_reopen() {
        let src_dir = tempfile::tempdir().unwrap();
        let gallery_dir = tempfile::tempdir().unwrap();
        let src = source(src_dir.path(), "cat.png");

        let mut gallery = Gallery::open(gallery_dir.path()).unwrap();
        let path = gallery.import(&src, "cat").unwrap();
        gallery.set_opacity(&path, 1.7).unwrap();

        let reopened = Gallery::open(gallery_dir.path()).unwrap();
        assert_eq!(reopened.find(&path).unwrap().opacity, 1.0);

        let mut reopened = reopened;
        reopened.set_opacity(&path, 0.3).unwrap();
        let again = Gallery::open(gallery_dir.path()).unwrap();
        assert_eq!(again.find(&path).unwrap().opacity, 0.3);
    }

    #[test]
    fn scan_reconciles_with_directory() {
        let gallery_dir = tempfile::tempdir().unwrap();
        let mut gallery = Gallery::open(gallery_dir.path()).unwrap();
        assert!(gallery.entries().is_empty());

        let dropped_in = source(gallery_dir.path(), "b.png");
        fs::write(gallery_dir.path().join("readme.txt"), "x").unwrap();
        let gone = source(gallery_dir.path(), "a.png");
        gallery.scan().unwrap();
        assert_eq!(gallery.entries().len(), 2);
        assert_eq!(gallery.entries()[0].display_name(), "a.png");

        fs::remove_file(&gone).unwrap();
        gallery.scan().unwrap();
        assert_eq!(gallery.entries().len(), 1);
        assert_eq!(gallery.entries()[0].path, dropped_in);
    }

    #[test]
    fn remove_deletes_the_file() {
        let src_dir = tempfile::tempdir().unwrap();
        let gallery_dir = tempfile::tempdir().unwrap();
        let src = source(src_dir.path(), "cat.png");

        let mut gallery = Gallery::open(gallery_dir.path()).unwrap();
        let path = gallery.import(&src, "cat").unwrap();
        gallery.remove(&path).unwrap();
        assert!(!path.exists());
        assert!(gallery.find(&path).is_none());
        assert!(gallery.remove(&path).is_err());
        assert!(src.exists());
    }
}
