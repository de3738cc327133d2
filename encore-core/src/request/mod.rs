pub mod item;
pub mod queue;
pub mod selection;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{catalog::Catalog, command, store::StoreHandle};

use self::{
    item::{Request, RequestId},
    queue::RequestQueue,
    selection::Selection,
};

/// Inbound chat line, as delivered by the chat collaborator.
#[derive(Clone, Debug)]
pub struct ChatEvent {
    pub text: String,
    pub requester: String,
    /// True for lines posted by the tool itself.  Those never count as
    /// requests.
    pub is_self: bool,
}

pub enum ServiceCommand {
    Select {
        id: RequestId,
    },
    /// Remove a finished request from the queue.
    Done {
        id: RequestId,
    },
    ClearAll,
    /// Swap in a freshly loaded catalog, i.e. after a retry of a failed
    /// startup load.
    ReplaceCatalog {
        catalog: Catalog,
    },
}

pub enum ServiceEvent {
    Chat(ChatEvent),
    Command(ServiceCommand),
    /// A request was resolved and queued or merged.  `QueueChanged` follows.
    SongRequested {
        title: String,
        requester: String,
    },
    /// A request code did not match any catalog entry.  The queue is
    /// untouched.
    SongRequestFailed {
        code: String,
        requester: String,
    },
    QueueChanged,
}

/// Owns the catalog, the request queue and the selection, and applies chat
/// and operator events against them.  Frontends push `ServiceEvent`s through
/// `sender()` and read state back between events; status events loop through
/// the same channel.
pub struct RequestService {
    catalog: Catalog,
    queue: RequestQueue,
    selection: Selection,
    sender: Sender<ServiceEvent>,
    receiver: Receiver<ServiceEvent>,
}

impl RequestService {
    /// Restores the queue from `store` and starts with an empty selection.
    pub fn new(catalog: Catalog, store: StoreHandle) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            catalog,
            queue: RequestQueue::new(store),
            selection: Selection::new(),
            sender,
            receiver,
        }
    }

    pub fn sender(&self) -> Sender<ServiceEvent> {
        self.sender.clone()
    }

    pub fn receiver(&self) -> Receiver<ServiceEvent> {
        self.receiver.clone()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selected request, if it still exists in the queue.
    pub fn selected_request(&self) -> Option<&Request> {
        self.selection.current().and_then(|id| self.queue.get(id))
    }

    pub fn handle(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::Chat(chat) => self.handle_chat(chat),
            ServiceEvent::Command(cmd) => self.handle_command(cmd),
            ServiceEvent::SongRequested { .. }
            | ServiceEvent::SongRequestFailed { .. }
            | ServiceEvent::QueueChanged => {}
        }
    }

    fn handle_chat(&mut self, chat: ChatEvent) {
        if chat.is_self {
            return;
        }
        let Some(cmd) = command::interpret(&chat.text) else {
            return;
        };
        match self.catalog.resolve(&cmd.code) {
            Some(song) => {
                let applied = self.queue.apply(song, &chat.requester);
                let title = applied.request().song.title.clone();
                log::info!("song request received: {} by {}", title, chat.requester);
                self.notify(ServiceEvent::SongRequested {
                    title,
                    requester: chat.requester,
                });
                self.notify(ServiceEvent::QueueChanged);
            }
            None => {
                log::info!(
                    "failed song request: {:?} not found (by {})",
                    cmd.code,
                    chat.requester
                );
                self.notify(ServiceEvent::SongRequestFailed {
                    code: cmd.code,
                    requester: chat.requester,
                });
            }
        }
    }

    fn handle_command(&mut self, cmd: ServiceCommand) {
        match cmd {
            ServiceCommand::Select { id } => self.select(id),
            ServiceCommand::Done { id } => {
                self.done(&id);
            }
            ServiceCommand::ClearAll => self.clear_all(),
            ServiceCommand::ReplaceCatalog { catalog } => self.replace_catalog(catalog),
        }
    }

    pub fn select(&mut self, id: RequestId) {
        self.selection.select(id);
    }

    /// Removes a finished request.  Clears the selection if it pointed at
    /// the removed entry.
    pub fn done(&mut self, id: &RequestId) -> bool {
        let removed = self.queue.remove(id);
        if removed {
            if self.selection.is_selected(id) {
                self.selection.clear();
            }
            self.notify(ServiceEvent::QueueChanged);
        }
        removed
    }

    pub fn clear_all(&mut self) {
        self.queue.clear();
        self.selection.clear();
        self.notify(ServiceEvent::QueueChanged);
    }

    pub fn replace_catalog(&mut self, catalog: Catalog) {
        log::info!("catalog replaced: {} songs", catalog.len());
        self.catalog = catalog;
    }

    fn notify(&self, event: ServiceEvent) {
        if let Err(err) = self.sender.send(event) {
            log::warn!("dropping notification: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemStore;

    fn catalog() -> Catalog {
        Catalog::from_reader(
            r#"[
                {"osr_code": "abc123", "title": "Alpha"},
                {"osr_code": "def456", "title": "Beta"}
            ]"#
            .as_bytes(),
        )
        .unwrap()
    }

    fn service() -> RequestService {
        RequestService::new(catalog(), Arc::new(MemStore::new()))
    }

    fn chat(text: &str, requester: &str) -> ServiceEvent {
        ServiceEvent::Chat(ChatEvent {
            text: text.to_string(),
            requester: requester.to_string(),
            is_self: false,
        })
    }

    #[test]
    fn chat_request_lands_in_the_queue() {
        let mut service = service();
        service.handle(chat("!osr ABC123", "viewer1"));

        assert_eq!(service.queue().len(), 1);
        let events = service.receiver();
        assert!(matches!(
            events.try_recv().unwrap(),
            ServiceEvent::SongRequested { title, requester }
                if title == "Alpha" && requester == "viewer1"
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            ServiceEvent::QueueChanged
        ));
    }

    #[test]
    fn own_messages_are_ignored() {
        let mut service = service();
        service.handle(ServiceEvent::Chat(ChatEvent {
            text: "!osr abc123".to_string(),
            requester: "encore".to_string(),
            is_self: true,
        }));
        assert!(service.queue().is_empty());
        assert!(service.receiver().try_recv().is_err());
    }

    #[test]
    fn plain_chat_is_not_a_request() {
        let mut service = service();
        service.handle(chat("hello world", "viewer1"));
        assert!(service.queue().is_empty());
        assert!(service.receiver().try_recv().is_err());
    }

    #[test]
    fn unknown_code_fails_and_leaves_the_queue_alone() {
        let mut service = service();
        service.handle(chat("!osr unknown", "viewer1"));

        assert!(service.queue().is_empty());
        assert!(matches!(
            service.receiver().try_recv().unwrap(),
            ServiceEvent::SongRequestFailed { code, requester }
                if code == "unknown" && requester == "viewer1"
        ));
    }

    #[test]
    fn removing_the_selected_request_clears_the_selection() {
        let mut service = service();
        service.handle(chat("!osr abc123", "viewer1"));
        let id = service.queue().iter().next().unwrap().id.clone();

        service.select(id.clone());
        assert!(service.selected_request().is_some());

        assert!(service.done(&id));
        assert_eq!(service.selection().current(), None);
    }

    #[test]
    fn removing_another_request_keeps_the_selection() {
        let mut service = service();
        service.handle(chat("!osr abc123", "viewer1"));
        service.handle(chat("!osr def456", "viewer2"));
        let ids: Vec<_> = service.queue().iter().map(|r| r.id.clone()).collect();

        service.select(ids[0].clone());
        assert!(service.done(&ids[1]));

        assert!(service.selection().is_selected(&ids[0]));
        assert_eq!(service.selected_request().unwrap().song.title, "Alpha");
    }

    #[test]
    fn clear_all_resets_queue_and_selection() {
        let mut service = service();
        service.handle(chat("!osr abc123", "viewer1"));
        service.handle(chat("!osr def456", "viewer2"));
        service.handle(chat("!osr abc123", "viewer3"));
        let id = service.queue().iter().next().unwrap().id.clone();
        service.select(id);

        service.handle(ServiceEvent::Command(ServiceCommand::ClearAll));

        assert!(service.queue().is_empty());
        assert_eq!(service.selection().current(), None);
    }

    #[test]
    fn stale_selection_resolves_to_no_request() {
        let mut service = service();
        service.select("12345".into());
        assert!(service.selected_request().is_none());
    }

    #[test]
    fn replacing_the_catalog_changes_resolution() {
        let mut service = RequestService::new(Catalog::empty(), Arc::new(MemStore::new()));
        service.handle(chat("!osr abc123", "viewer1"));
        assert!(service.queue().is_empty());

        service.handle(ServiceEvent::Command(ServiceCommand::ReplaceCatalog {
            catalog: catalog(),
        }));
        service.handle(chat("!osr abc123", "viewer1"));
        assert_eq!(service.queue().len(), 1);
    }
}
