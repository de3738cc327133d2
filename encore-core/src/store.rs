use std::{
    fs,
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{error::Error, request::item::Request};

pub type StoreHandle = Arc<dyn RequestStore + Send + Sync>;

/// Durable storage for the request queue, keyed under a fixed namespace.
/// `load` recovers from missing or corrupted data by coming back empty, so a
/// broken save file never takes the session down.
pub trait RequestStore {
    fn save(&self, requests: &[Request]) -> Result<(), Error>;
    fn load(&self) -> Vec<Request>;
}

const REQUESTS_FILENAME: &str = "requests.json";

/// Stores the queue as a JSON document in the profile directory.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(base: &Path) -> Result<Self, Error> {
        mkdir_if_not_exists(base)?;
        Ok(Self {
            path: base.join(REQUESTS_FILENAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RequestStore for FileStore {
    fn save(&self, requests: &[Request]) -> Result<(), Error> {
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, requests)?;
        Ok(())
    }

    fn load(&self) -> Vec<Request> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_reader(file) {
            Ok(requests) => {
                log::info!("loaded saved requests: {:?}", &self.path);
                requests
            }
            Err(err) => {
                log::warn!("discarding corrupted request storage: {}", err);
                Vec::new()
            }
        }
    }
}

/// In-memory stand-in for `FileStore`, used in tests and ephemeral runs.
/// Keeps the serialized form so loads go through the same round-trip as the
/// file-backed store.
#[derive(Default)]
pub struct MemStore {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }
}

impl RequestStore for MemStore {
    fn save(&self, requests: &[Request]) -> Result<(), Error> {
        let data = serde_json::to_vec(requests)?;
        self.data.lock().replace(data);
        Ok(())
    }

    fn load(&self) -> Vec<Request> {
        match self.data.lock().as_deref() {
            Some(data) => serde_json::from_slice(data).unwrap_or_else(|err| {
                log::warn!("discarding corrupted request storage: {}", err);
                Vec::new()
            }),
            None => Vec::new(),
        }
    }
}

pub fn mkdir_if_not_exists(path: &Path) -> io::Result<()> {
    fs::create_dir(path).or_else(|err| {
        if err.kind() == io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(err)
        }
    })
}
