// File: src/watcher.rs
// Purpose: Translates notify events into reactor events

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::reactor::FsEvent;
use crate::source::SourceTree;
use crate::Result;

/// Recursive watcher over the source tree
///
/// Events are pushed into the reactor queue from notify's own thread. The
/// watch stops when this value is dropped.
pub struct RouteWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl RouteWatcher {
    pub fn new(source: SourceTree, events: mpsc::Sender<FsEvent>) -> Result<Self> {
        let root = source.root().to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let translated = match res {
                Ok(event) => translate(&event, &source),
                Err(e) => {
                    error!(error = %e, "watch error");
                    vec![FsEvent::Error(e.to_string())]
                }
            };

            for event in translated {
                debug!(?event, "queued");
                if events.blocking_send(event).is_err() {
                    debug!("reactor gone, dropping event");
                    return;
                }
            }
        })?;

        if root.exists() {
            watcher.watch(&root, RecursiveMode::Recursive)?;
            info!(path = %root.display(), "watching source directory");
        } else {
            warn!(path = %root.display(), "source directory does not exist, nothing to watch");
        }

        Ok(Self {
            _watcher: watcher,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Maps one notify event onto zero or more reactor events
///
/// Paths outside the source tree, below ignored segments, or with
/// unrelated extensions are dropped. Metadata and access notifications
/// are dropped too.
pub fn translate(event: &Event, source: &SourceTree) -> Vec<FsEvent> {
    let mut out = Vec::new();

    for (index, path) in event.paths.iter().enumerate() {
        if !source.is_watched(path) {
            continue;
        }
        let path = path.clone();

        let translated = match &event.kind {
            EventKind::Create(CreateKind::Folder) => Some(FsEvent::AddDir(path)),
            EventKind::Create(_) => Some(created(path)),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FsEvent::Unlink(path)),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(created(path)),
            // Both: paths are [from, to]
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if index == 0 => Some(FsEvent::Unlink(path)),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Some(created(path)),
            EventKind::Modify(ModifyKind::Name(_)) if path.exists() => Some(created(path)),
            EventKind::Modify(ModifyKind::Name(_)) => Some(FsEvent::Unlink(path)),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) if path.is_dir() => None,
            EventKind::Modify(_) => Some(FsEvent::Change(path)),
            EventKind::Remove(RemoveKind::Folder) => Some(FsEvent::UnlinkDir(path)),
            EventKind::Remove(_) => Some(FsEvent::Unlink(path)),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        };

        out.extend(translated);
    }

    out
}

fn created(path: PathBuf) -> FsEvent {
    if path.is_dir() {
        FsEvent::AddDir(path)
    } else {
        FsEvent::Add(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind};
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, SourceTree) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("users")).unwrap();
        fs::write(dir.path().join("users/list.get.rs"), "").unwrap();
        fs::write(dir.path().join("users/notes.txt"), "").unwrap();
        let source = SourceTree::new(dir.path(), vec!["rs".to_string()]);
        (dir, source)
    }

    fn event(kind: EventKind, paths: &[PathBuf]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.clone()))
    }

    #[test]
    fn test_create_file_and_folder() {
        let (_dir, source) = tree();
        let file = source.root().join("users/list.get.rs");
        let folder = source.root().join("users");

        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::File), &[file.clone()]), &source),
            vec![FsEvent::Add(file)]
        );
        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::Folder), &[folder.clone()]), &source),
            vec![FsEvent::AddDir(folder)]
        );
    }

    #[test]
    fn test_modify_data_is_change_metadata_is_dropped() {
        let (_dir, source) = tree();
        let file = source.root().join("users/list.get.rs");

        let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert_eq!(translate(&event(data, &[file.clone()]), &source), vec![FsEvent::Change(file.clone())]);

        let metadata = EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime));
        assert!(translate(&event(metadata, &[file.clone()]), &source).is_empty());

        let access = EventKind::Access(AccessKind::Read);
        assert!(translate(&event(access, &[file]), &source).is_empty());
    }

    #[test]
    fn test_remove_events() {
        let (_dir, source) = tree();
        let gone_file = source.root().join("users/old.get.rs");
        let gone_dir = source.root().join("archive");

        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::File), &[gone_file.clone()]), &source),
            vec![FsEvent::Unlink(gone_file)]
        );
        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::Folder), &[gone_dir.clone()]), &source),
            vec![FsEvent::UnlinkDir(gone_dir)]
        );
    }

    #[test]
    fn test_rename_both_splits_into_unlink_and_add() {
        let (_dir, source) = tree();
        let from = source.root().join("users/old.get.rs");
        let to = source.root().join("users/list.get.rs");

        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        assert_eq!(
            translate(&event(kind, &[from.clone(), to.clone()]), &source),
            vec![FsEvent::Unlink(from), FsEvent::Add(to)]
        );
    }

    #[test]
    fn test_unwatched_paths_are_dropped() {
        let (_dir, source) = tree();
        let kind = EventKind::Create(CreateKind::File);

        let text = source.root().join("users/notes.txt");
        let ignored = source.root().join("_drafts/list.get.rs");
        let outside = PathBuf::from("/elsewhere/list.get.rs");

        assert!(translate(&event(kind, &[text, ignored, outside]), &source).is_empty());
    }
}
