mod config;
mod display;

use std::{io, io::BufRead, path::PathBuf, sync::Arc, thread};

use crossbeam_channel::{unbounded, Receiver};
use encore_core::{
    catalog::{Catalog, CatalogSource},
    request::{item::RequestId, ChatEvent, RequestService, ServiceCommand, ServiceEvent},
    store::{FileStore, MemStore, StoreHandle},
    util,
};
use env_logger::{Builder, Env};
use url::Url;

use crate::config::Config;

const ENV_LOG: &str = "ENCORE_LOG";
const ENV_LOG_STYLE: &str = "ENCORE_LOG_STYLE";

/// Requester identity for bare chat lines typed without a `user:` prefix.
const DEFAULT_REQUESTER: &str = "viewer";

fn main() {
    // Setup logging from the env variables, with defaults.
    Builder::from_env(
        Env::new()
            .filter_or(ENV_LOG, "info")
            .write_style(ENV_LOG_STYLE),
    )
    .init();

    // Load configuration, writing out a default file on the first run.
    let config = Config::load().unwrap_or_else(|| {
        let config = Config::default();
        config.save();
        config
    });

    let args: Vec<String> = std::env::args().collect();
    let ephemeral = args.iter().any(|arg| arg == "--ephemeral");
    let catalog_arg = args
        .windows(2)
        .find(|pair| pair[0] == "--catalog")
        .map(|pair| pair[1].clone());

    let agent = util::default_ureq_agent();
    let source = catalog_arg
        .as_deref()
        .and_then(parse_catalog_source)
        .or_else(|| config.catalog_source());
    let catalog = match &source {
        Some(source) => source.load_or_empty(&agent),
        None => {
            log::warn!("no catalog source configured, every request will fail");
            Catalog::empty()
        }
    };

    let store: StoreHandle = if ephemeral {
        Arc::new(MemStore::new())
    } else {
        open_profile_store()
    };

    let mut service = RequestService::new(catalog, store);
    if !config.channel.is_empty() {
        println!("Connected to {}'s chat.", config.channel);
    }
    print!(
        "{}",
        display::render_queue(service.queue(), service.selection())
    );

    let lines = spawn_stdin_reader();
    run(&mut service, lines, &agent, source);
}

fn parse_catalog_source(arg: &str) -> Option<CatalogSource> {
    if arg.starts_with("http") {
        match Url::parse(arg) {
            Ok(url) => Some(CatalogSource::Remote(url)),
            Err(err) => {
                log::error!("invalid catalog URL {:?}: {}", arg, err);
                None
            }
        }
    } else {
        Some(CatalogSource::File(PathBuf::from(arg)))
    }
}

fn open_profile_store() -> StoreHandle {
    let base = Config::data_dir().expect("Failed to get data dir");
    match FileStore::new(&base) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::error!(
                "failed to open request storage: {}, keeping requests in memory",
                err
            );
            Arc::new(MemStore::new())
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn run(
    service: &mut RequestService,
    lines: Receiver<String>,
    agent: &ureq::Agent,
    source: Option<CatalogSource>,
) {
    let events = service.receiver();
    loop {
        crossbeam_channel::select! {
            recv(events) -> event => match event {
                Ok(event) => handle_event(service, event),
                Err(_) => break,
            },
            recv(lines) -> line => match line {
                Ok(line) => {
                    if !handle_line(service, &line, agent, source.as_ref()) {
                        break;
                    }
                }
                // Stdin closed, we are done.
                Err(_) => break,
            },
        }
    }
}

fn handle_event(service: &mut RequestService, event: ServiceEvent) {
    match &event {
        ServiceEvent::SongRequested { title, requester } => {
            println!("Song request received: {} by {}", title, requester);
        }
        ServiceEvent::SongRequestFailed { code, requester } => {
            println!("Failed song request: {:?} not found (by {})", code, requester);
        }
        ServiceEvent::QueueChanged => {
            print!(
                "{}",
                display::render_queue(service.queue(), service.selection())
            );
        }
        ServiceEvent::Chat(_) | ServiceEvent::Command(_) => {}
    }
    service.handle(event);
}

fn handle_line(
    service: &mut RequestService,
    line: &str,
    agent: &ureq::Agent,
    source: Option<&CatalogSource>,
) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    if let Some(command) = line.strip_prefix('/') {
        return handle_operator_command(service, command, agent, source);
    }

    // `user: text` lines speak as that viewer, bare lines as the default
    // one.
    let (requester, text) = match line.split_once(": ") {
        Some((requester, text)) => (requester, text),
        None => (DEFAULT_REQUESTER, line),
    };
    println!(
        "\x1b[38;5;{}m{}\x1b[0m: {}",
        display::user_color(requester),
        requester,
        text
    );
    service.handle(ServiceEvent::Chat(ChatEvent {
        text: text.to_string(),
        requester: requester.to_string(),
        is_self: false,
    }));
    true
}

fn handle_operator_command(
    service: &mut RequestService,
    command: &str,
    agent: &ureq::Agent,
    source: Option<&CatalogSource>,
) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("quit") => return false,
        Some("done") => match request_id_at(service, parts.next()) {
            Some(id) => service.handle(ServiceEvent::Command(ServiceCommand::Done { id })),
            None => println!("No such request"),
        },
        Some("select") => match request_id_at(service, parts.next()) {
            Some(id) => {
                service.handle(ServiceEvent::Command(ServiceCommand::Select { id }));
                print!(
                    "{}",
                    display::render_queue(service.queue(), service.selection())
                );
                show_selection(service);
            }
            None => println!("No such request"),
        },
        Some("show") => show_selection(service),
        Some("clear") => service.handle(ServiceEvent::Command(ServiceCommand::ClearAll)),
        Some("reload") => match source {
            Some(source) => match source.load(agent) {
                Ok(catalog) => service.handle(ServiceEvent::Command(
                    ServiceCommand::ReplaceCatalog { catalog },
                )),
                Err(err) => log::error!("error loading songs: {}", err),
            },
            None => println!("No catalog source configured"),
        },
        _ => log::warn!("unknown command"),
    }
    true
}

/// Maps a 1-based queue position typed by the operator to the request id at
/// that position.
fn request_id_at(service: &RequestService, arg: Option<&str>) -> Option<RequestId> {
    let position: usize = arg?.parse().ok()?;
    let request = service.queue().iter().nth(position.checked_sub(1)?)?;
    Some(request.id.clone())
}

fn show_selection(service: &RequestService) {
    match service.selected_request() {
        Some(request) => print!("{}", display::render_detail(request)),
        None => println!("No request selected"),
    }
}
