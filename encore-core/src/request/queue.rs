use std::{slice, sync::Arc};

use crate::{
    catalog::{normalize_code, Song},
    store::StoreHandle,
};

use super::item::{IdGenerator, Request, RequestId};

/// Outcome of applying a resolved song request against the queue.
#[derive(Clone, Debug)]
pub enum Applied {
    /// No entry for this song existed, one was appended at the tail.
    Created(Request),
    /// An existing entry for the same code absorbed the requester.
    Merged(Request),
}

impl Applied {
    pub fn request(&self) -> &Request {
        match self {
            Self::Created(request) | Self::Merged(request) => request,
        }
    }
}

/// Ordered collection of active requests, first-requested-first.  At most
/// one entry exists per normalized song code; repeat asks merge into it
/// without moving its position.  Every mutation is written through the store
/// before returning.
pub struct RequestQueue {
    entries: Vec<Request>,
    ids: IdGenerator,
    store: StoreHandle,
}

impl RequestQueue {
    /// Restores previously saved requests from the store and seeds the id
    /// generator past them.
    pub fn new(store: StoreHandle) -> Self {
        let entries = store.load();
        let mut ids = IdGenerator::new();
        ids.seed_from(entries.iter().map(|request| &request.id));
        Self {
            entries,
            ids,
            store,
        }
    }

    pub fn apply(&mut self, song: Arc<Song>, requester: &str) -> Applied {
        let code = song.osr_code.as_deref().map(normalize_code);
        let existing = self.entries.iter_mut().find(|entry| {
            code.is_some() && entry.song.osr_code.as_deref().map(normalize_code) == code
        });
        match existing {
            Some(entry) => {
                // Deliberately not a set: a requester listed twice asked
                // twice.
                entry.requesters.push(requester.to_string());
                let merged = entry.clone();
                self.persist();
                Applied::Merged(merged)
            }
            None => {
                let (id, created_at) = self.ids.next();
                let request = Request {
                    id,
                    song,
                    requesters: vec![requester.to_string()],
                    created_at,
                };
                self.entries.push(request.clone());
                self.persist();
                Applied::Created(request)
            }
        }
    }

    pub fn remove(&mut self, id: &RequestId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    pub fn get(&self, id: &RequestId) -> Option<&Request> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// Snapshot in insertion order, for rendering.
    pub fn iter(&self) -> slice::Iter<'_, Request> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Writes go through on every mutation.  A failing store must not stall
    // the chat flow, the in-memory queue stays authoritative for the
    // session.
    fn persist(&self) {
        if let Err(err) = self.store.save(&self.entries) {
            log::error!("failed to save requests: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{MemStore, RequestStore};

    fn song(code: &str, title: &str) -> Arc<Song> {
        Arc::new(Song {
            osr_code: Some(code.to_string()),
            title: title.to_string(),
            attributes: serde_json::Map::new(),
        })
    }

    fn queue() -> (RequestQueue, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        (RequestQueue::new(store.clone()), store)
    }

    #[test]
    fn first_request_creates_an_entry() {
        let (mut queue, _) = queue();
        let applied = queue.apply(song("abc", "Alpha"), "viewer1");
        assert!(matches!(applied, Applied::Created(_)));
        assert_eq!(queue.len(), 1);
        assert_eq!(applied.request().requesters, vec!["viewer1"]);
    }

    #[test]
    fn repeat_request_merges_without_deduplication() {
        let (mut queue, _) = queue();
        queue.apply(song("abc", "Alpha"), "viewer1");
        queue.apply(song("abc", "Alpha"), "viewer2");
        let applied = queue.apply(song("abc", "Alpha"), "viewer1");

        assert!(matches!(applied, Applied::Merged(_)));
        assert_eq!(queue.len(), 1);
        assert_eq!(
            applied.request().requesters,
            vec!["viewer1", "viewer2", "viewer1"]
        );
    }

    #[test]
    fn codes_merge_case_insensitively() {
        let (mut queue, _) = queue();
        queue.apply(song("ABC", "Alpha"), "viewer1");
        let applied = queue.apply(song("abc", "Alpha"), "viewer2");
        assert!(matches!(applied, Applied::Merged(_)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn merge_preserves_insertion_order() {
        let (mut queue, _) = queue();
        queue.apply(song("a", "Alpha"), "viewer1");
        queue.apply(song("b", "Beta"), "viewer2");
        queue.apply(song("a", "Alpha"), "viewer3");

        let titles: Vec<_> = queue.iter().map(|r| r.song.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn never_two_entries_for_the_same_code() {
        let (mut queue, _) = queue();
        for requester in ["a", "b", "c", "d"] {
            queue.apply(song("abc", "Alpha"), requester);
            queue.apply(song("xyz", "Omega"), requester);
        }
        let mut codes: Vec<_> = queue
            .iter()
            .filter_map(|r| r.song.osr_code.as_deref().map(normalize_code))
            .collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), queue.len());
    }

    #[test]
    fn requesters_are_never_empty() {
        let (mut queue, _) = queue();
        queue.apply(song("abc", "Alpha"), "viewer1");
        queue.apply(song("abc", "Alpha"), "viewer2");
        assert!(queue.iter().all(|r| !r.requesters.is_empty()));
    }

    #[test]
    fn remove_reports_whether_an_entry_went_away() {
        let (mut queue, _) = queue();
        let applied = queue.apply(song("abc", "Alpha"), "viewer1");
        let id = applied.request().id.clone();

        assert!(queue.remove(&id));
        assert!(queue.is_empty());
        assert!(!queue.remove(&id));
    }

    #[test]
    fn clear_empties_the_queue() {
        let (mut queue, store) = queue();
        queue.apply(song("a", "Alpha"), "viewer1");
        queue.apply(song("b", "Beta"), "viewer2");
        queue.clear();
        assert!(queue.is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn every_mutation_is_persisted_synchronously() {
        let (mut queue, store) = queue();
        queue.apply(song("abc", "Alpha"), "viewer1");
        assert_eq!(store.load().len(), 1);

        let applied = queue.apply(song("abc", "Alpha"), "viewer2");
        assert_eq!(store.load()[0].requesters.len(), 2);

        let id = applied.request().id.clone();
        queue.remove(&id);
        assert!(store.load().is_empty());
    }

    #[test]
    fn restores_saved_entries_in_order() {
        let store = Arc::new(MemStore::new());
        {
            let mut queue = RequestQueue::new(store.clone());
            queue.apply(song("a", "Alpha"), "viewer1");
            queue.apply(song("b", "Beta"), "viewer2");
        }
        let restored = RequestQueue::new(store);
        let titles: Vec<_> = restored.iter().map(|r| r.song.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn new_ids_sort_after_restored_ones() {
        let store = Arc::new(MemStore::new());
        let restored_id = {
            let mut queue = RequestQueue::new(store.clone());
            queue.apply(song("a", "Alpha"), "viewer1").request().id.clone()
        };
        let mut queue = RequestQueue::new(store);
        let new_id = queue.apply(song("b", "Beta"), "viewer2").request().id.clone();
        assert!(
            new_id.as_str().parse::<u64>().unwrap() > restored_id.as_str().parse::<u64>().unwrap()
        );
    }
}
