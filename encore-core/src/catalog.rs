use std::{
    collections::HashMap,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Request codes are compared in their normalized form, both on the catalog
/// side and on the chat side.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Song {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osr_code: Option<String>,
    #[serde(default)]
    pub title: String,
    /// Descriptive attributes (artist, difficulty levels, artwork, category,
    /// ...) carried through to the frontend without interpretation.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Song {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|value| value.as_str())
    }
}

// Root of the catalog document.  Both a bare song array and an object
// wrapping it under a `songs` field are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDoc {
    Bare(Vec<Song>),
    Wrapped { songs: Vec<Song> },
}

impl CatalogDoc {
    fn into_songs(self) -> Vec<Song> {
        match self {
            Self::Bare(songs) => songs,
            Self::Wrapped { songs } => songs,
        }
    }
}

/// Read-only lookup table of songs, indexed by normalized request code.
pub struct Catalog {
    songs: Vec<Arc<Song>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(songs: Vec<Song>) -> Self {
        let songs: Vec<_> = songs.into_iter().map(Arc::new).collect();
        let mut index = HashMap::with_capacity(songs.len());
        for (position, song) in songs.iter().enumerate() {
            // Songs without a request code cannot be requested.
            if let Some(code) = &song.osr_code {
                index.entry(normalize_code(code)).or_insert(position);
            }
        }
        Self { songs, index }
    }

    pub fn empty() -> Self {
        Self {
            songs: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        let doc: CatalogDoc = serde_json::from_reader(reader)?;
        Ok(Self::new(doc.into_songs()))
    }

    pub fn load_file(path: &Path) -> Result<Self, Error> {
        Self::from_reader(File::open(path)?)
    }

    pub fn fetch(agent: &ureq::Agent, url: &Url) -> Result<Self, Error> {
        let mut response = agent.get(url.as_str()).call()?;
        let doc: CatalogDoc = response.body_mut().read_json()?;
        Ok(Self::new(doc.into_songs()))
    }

    /// Exact lookup by normalized code.  A miss is a valid outcome the caller
    /// branches on, not an error.
    pub fn resolve(&self, code: &str) -> Option<Arc<Song>> {
        let normalized = normalize_code(code);
        self.index
            .get(&normalized)
            .map(|&position| self.songs[position].clone())
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Where the catalog document comes from.  Loaded once at startup and again
/// on an explicit reload.
#[derive(Clone, Debug)]
pub enum CatalogSource {
    File(PathBuf),
    Remote(Url),
}

impl CatalogSource {
    pub fn load(&self, agent: &ureq::Agent) -> Result<Catalog, Error> {
        let catalog = match self {
            Self::File(path) => Catalog::load_file(path)?,
            Self::Remote(url) => Catalog::fetch(agent, url)?,
        };
        log::info!("songs loaded: {}", catalog.len());
        Ok(catalog)
    }

    /// A failed load falls back to an empty catalog, so every resolution
    /// comes back as a miss until a reload replaces it.
    pub fn load_or_empty(&self, agent: &ureq::Agent) -> Catalog {
        self.load(agent).unwrap_or_else(|err| {
            log::error!("error loading songs: {}", err);
            Catalog::empty()
        })
    }
}
