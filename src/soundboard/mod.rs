//! Soundboard clips on disk, laid out as `<root>/<category>/<name>.<ext>`.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use rand::seq::{IteratorRandom, SliceRandom};
use tracing::{info, warn};

use crate::{common::errors::CatalogError, voice::AudioSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundEntry {
    pub category: String,
    pub name: String,
    pub path: PathBuf,
}

impl SoundEntry {
    pub fn to_source(&self) -> AudioSource {
        AudioSource::soundboard(&self.category, &self.name, self.path.clone())
    }
}

/// Sound names are unique across every category.
#[derive(Debug, Default)]
pub struct SoundCatalog {
    root: PathBuf,
    categories: BTreeMap<String, Vec<String>>,
    sounds: HashMap<String, SoundEntry>,
}

impl SoundCatalog {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = root.as_ref().to_path_buf();
        let mut categories = BTreeMap::new();
        let mut sounds: HashMap<String, SoundEntry> = HashMap::new();

        for dir in sorted_entries(&root)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(category) = file_name(&dir) else {
                continue;
            };

            let mut names = Vec::new();
            for file in sorted_entries(&dir)? {
                if !file.is_file() {
                    continue;
                }
                let Some(name) = file.file_stem().and_then(|s| s.to_str()) else {
                    warn!("Skipping sound with a non UTF-8 name: {}", file.display());
                    continue;
                };
                if let Some(existing) = sounds.get(name) {
                    return Err(CatalogError::Duplicate {
                        first: format!("{}/{}", existing.category, name),
                        second: format!("{}/{}", category, name),
                    });
                }
                names.push(name.to_string());
                sounds.insert(
                    name.to_string(),
                    SoundEntry {
                        category: category.clone(),
                        name: name.to_string(),
                        path: file.clone(),
                    },
                );
            }
            names.sort();
            categories.insert(category, names);
        }

        info!(
            "Loaded {} sounds in {} categories from {}",
            sounds.len(),
            categories.len(),
            root.display()
        );

        Ok(Self {
            root,
            categories,
            sounds,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn sounds_in(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Every sound, grouped by category in category order.
    pub fn all_sounds(&self) -> impl Iterator<Item = &str> {
        self.categories.values().flatten().map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<&SoundEntry> {
        self.sounds.get(name)
    }

    /// A random category, then a random sound within it.
    pub fn random(&self) -> Option<&SoundEntry> {
        let mut rng = rand::thread_rng();
        let (_, names) = self
            .categories
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .choose(&mut rng)?;
        names.choose(&mut rng).and_then(|name| self.sounds.get(name))
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|s| s.to_str()).map(str::to_string)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"ID3").unwrap();
        }
        dir
    }

    #[test]
    fn lists_categories_and_sounds_sorted() {
        let dir = sound_dir(&["memes/bruh.mp3", "memes/airhorn.mp3", "anime/nani.mp3"]);
        let catalog = SoundCatalog::load(dir.path()).unwrap();

        assert_eq!(catalog.categories().collect::<Vec<_>>(), vec!["anime", "memes"]);
        assert_eq!(
            catalog.sounds_in("memes").unwrap(),
            &["airhorn".to_string(), "bruh".to_string()]
        );
        assert_eq!(catalog.all_sounds().collect::<Vec<_>>(), vec!["nani", "airhorn", "bruh"]);
        assert_eq!(catalog.lookup("nani").map(|e| e.category.as_str()), Some("anime"));
    }

    #[test]
    fn duplicate_names_across_categories_fail() {
        let dir = sound_dir(&["a/boom.mp3", "b/boom.mp3"]);
        let err = SoundCatalog::load(dir.path()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Detected duplicate sound name: a/boom vs b/boom"
        );
    }

    #[test]
    fn random_skips_empty_categories() {
        let dir = sound_dir(&["full/only.mp3"]);
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let catalog = SoundCatalog::load(dir.path()).unwrap();

        for _ in 0..10 {
            assert_eq!(catalog.random().map(|e| e.name.as_str()), Some("only"));
        }
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let err = SoundCatalog::load("/definitely/not/here").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
