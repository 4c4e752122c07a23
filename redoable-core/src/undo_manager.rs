use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use futures::{Stream, channel::mpsc};

use crate::{
    Checkpoint, GroupId, HistoryState, UnixTimestamp,
    command::{Action, Command, Reversible},
};

/// A linear history of reversible asynchronous commands
///
/// Commands are recorded by [`UndoManager::perform`], which runs the `redo`
/// action immediately and then remembers both actions. [`UndoManager::undo`]
/// and [`UndoManager::redo`] move backwards and forwards through the history,
/// treating consecutive commands which share a [`GroupId`] as a single step.
/// Performing a new command after undoing discards everything which could
/// have been redone.
///
/// `UndoManager` is a cheap handle, clones share the same history. Construct
/// one per editing session and hand it to whatever needs it.
///
/// ## Replays
///
/// While an undo or redo is running the manager is "executing". During that
/// time calls to `perform` still run their `redo` action but are not recorded,
/// which lets an action call back into code that would normally record
/// commands without duplicating history. Calls to `undo` or `redo` during a
/// replay return immediately without doing anything, they are not queued.
///
/// ## Failures
///
/// Errors from actions are returned to the caller as they are. Nothing is
/// retried or rolled back. The position only moves past commands whose action
/// completed, so a failure halfway through a group leaves the position inside
/// that group.
pub struct UndoManager<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Clone for UndoManager<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> std::fmt::Debug for UndoManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("UndoManager")
            .field("len", &inner.commands.len())
            .field("position", &inner.position())
            .field("executing", &inner.executing)
            .finish()
    }
}

pub struct UndoManagerBuilder<E> {
    limit: Option<usize>,
    _error: PhantomData<fn() -> E>,
}

impl<E> UndoManagerBuilder<E> {
    /// Keep at most `limit` commands, dropping the oldest ones first
    ///
    /// A limit of zero means unlimited, which is also the default.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn build(self) -> UndoManager<E> {
        UndoManager {
            inner: Arc::new(Mutex::new(Inner {
                commands: Vec::new(),
                applied: 0,
                limit: self.limit,
                executing: false,
                last_checkpoint: Checkpoint::NONE,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<E> Default for UndoManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> UndoManager<E> {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> UndoManagerBuilder<E> {
        UndoManagerBuilder {
            limit: None,
            _error: PhantomData,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.inner.lock().unwrap().applied > 0
    }

    pub fn can_redo(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.applied < inner.commands.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.undo_target().map(|c| c.description.clone())
    }

    pub fn redo_description(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.redo_target().map(|c| c.description.clone())
    }

    /// The checkpoint of the command [`undo`](Self::undo) would revert next
    pub fn current_checkpoint(&self) -> Checkpoint {
        let inner = self.inner.lock().unwrap();
        inner
            .undo_target()
            .map(|c| c.checkpoint)
            .unwrap_or(Checkpoint::NONE)
    }

    /// The index of the command [`undo`](Self::undo) would revert next
    ///
    /// `None` means the position is before the first command.
    pub fn position(&self) -> Option<usize> {
        self.inner.lock().unwrap().position()
    }

    /// The number of commands in the history, including ones which have been undone
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an undo or redo is currently replaying commands
    pub fn is_executing(&self) -> bool {
        self.inner.lock().unwrap().executing
    }

    pub fn state(&self) -> HistoryState {
        self.inner.lock().unwrap().state()
    }

    /// Listen for changes to the history
    ///
    /// A new [`HistoryState`] is emitted after every recorded command, every
    /// completed undo or redo, and every `clear` of a non-empty history. Any
    /// number of listeners can be attached; dropping the returned stream
    /// detaches it.
    pub fn state_changes(&self) -> impl Stream<Item = HistoryState> + Unpin + Send + use<E> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.lock().unwrap().listeners.push(tx);
        rx
    }

    /// Discard the whole history
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        let previous_len = inner.commands.len();
        inner.commands.clear();
        inner.applied = 0;
        if previous_len > 0 {
            tracing::debug!(discarded = previous_len, "cleared undo history");
            inner.notify();
        }
    }
}

impl<E: Send + 'static> UndoManager<E> {
    /// Run `redo` and record it, along with `undo`, as a new command
    ///
    /// The value `redo` produces is returned to the caller and later passed to
    /// `undo`. If `redo` fails the error is returned and nothing is recorded.
    pub async fn perform<T, R, RFut, U, UFut>(
        &self,
        redo: R,
        undo: U,
        description: impl Into<String>,
        group_id: Option<GroupId>,
    ) -> Result<T, E>
    where
        T: Clone + Send + 'static,
        R: Fn() -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<T, E>> + Send + 'static,
        U: Fn(T) -> UFut + Send + Sync + 'static,
        UFut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.perform_inner(redo, undo, description.into(), group_id, false)
            .await
    }

    /// Like [`perform`](Self::perform) but the command does not get a checkpoint of its own
    ///
    /// The command is undone and redone like any other, it only inherits the
    /// checkpoint of the command recorded before it.
    pub async fn perform_discardable<T, R, RFut, U, UFut>(
        &self,
        redo: R,
        undo: U,
        description: impl Into<String>,
        group_id: Option<GroupId>,
    ) -> Result<T, E>
    where
        T: Clone + Send + 'static,
        R: Fn() -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<T, E>> + Send + 'static,
        U: Fn(T) -> UFut + Send + Sync + 'static,
        UFut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.perform_inner(redo, undo, description.into(), group_id, true)
            .await
    }

    async fn perform_inner<T, R, RFut, U, UFut>(
        &self,
        redo: R,
        undo: U,
        description: String,
        group_id: Option<GroupId>,
        discardable: bool,
    ) -> Result<T, E>
    where
        T: Clone + Send + 'static,
        R: Fn() -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<T, E>> + Send + 'static,
        U: Fn(T) -> UFut + Send + Sync + 'static,
        UFut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let value = redo().await?;
        let action = Arc::new(Action::new(redo, undo, value.clone()));
        self.inner.lock().unwrap().register(Command {
            action,
            description,
            group_id,
            checkpoint: Checkpoint::NONE,
        }, discardable);
        Ok(value)
    }

    /// Revert the current command, or the whole group it belongs to
    pub async fn undo(&self) -> Result<(), E> {
        let (mut action, group_id) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.executing {
                tracing::trace!("replay in progress, ignoring undo");
                return Ok(());
            }
            let Some(command) = inner.undo_target() else {
                return Ok(());
            };
            tracing::debug!(description = %command.description, group_id = ?command.group_id, "undo");
            let start = (command.action.clone(), command.group_id);
            inner.executing = true;
            start
        };
        let executing = ExecutingGuard(self.inner.clone());

        loop {
            action.undo().await?;
            let next = {
                let mut inner = self.inner.lock().unwrap();
                inner.applied = inner.applied.saturating_sub(1);
                match (group_id, inner.undo_target()) {
                    (Some(group_id), Some(previous)) if previous.group_id == Some(group_id) => {
                        Some(previous.action.clone())
                    }
                    _ => None,
                }
            };
            match next {
                Some(previous) => action = previous,
                None => break,
            }
        }

        drop(executing);
        self.inner.lock().unwrap().notify();
        Ok(())
    }

    /// Replay the next command, or the whole group it belongs to
    pub async fn redo(&self) -> Result<(), E> {
        let (mut action, group_id) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.executing {
                tracing::trace!("replay in progress, ignoring redo");
                return Ok(());
            }
            let Some(command) = inner.redo_target() else {
                return Ok(());
            };
            tracing::debug!(description = %command.description, group_id = ?command.group_id, "redo");
            let start = (command.action.clone(), command.group_id);
            inner.executing = true;
            start
        };
        let executing = ExecutingGuard(self.inner.clone());

        loop {
            action.redo().await?;
            let next = {
                let mut inner = self.inner.lock().unwrap();
                inner.applied = (inner.applied + 1).min(inner.commands.len());
                match (group_id, inner.redo_target()) {
                    (Some(group_id), Some(following)) if following.group_id == Some(group_id) => {
                        Some(following.action.clone())
                    }
                    _ => None,
                }
            };
            match next {
                Some(following) => action = following,
                None => break,
            }
        }

        drop(executing);
        self.inner.lock().unwrap().notify();
        Ok(())
    }
}

struct Inner<E> {
    commands: Vec<Command<E>>,
    /// How many commands, counted from the start, are currently applied
    applied: usize,
    limit: Option<usize>,
    executing: bool,
    last_checkpoint: Checkpoint,
    listeners: Vec<mpsc::UnboundedSender<HistoryState>>,
}

impl<E> Inner<E> {
    fn position(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    fn undo_target(&self) -> Option<&Command<E>> {
        self.position().and_then(|i| self.commands.get(i))
    }

    fn redo_target(&self) -> Option<&Command<E>> {
        self.commands.get(self.applied)
    }

    fn register(&mut self, mut command: Command<E>, discardable: bool) {
        if self.executing {
            tracing::trace!(description = %command.description, "replay in progress, not recording");
            return;
        }

        // Anything which could have been redone is invalidated by a new command
        self.commands.truncate(self.applied);

        command.checkpoint = if discardable {
            self.commands
                .last()
                .map(|c| c.checkpoint)
                .unwrap_or(Checkpoint::NONE)
        } else {
            let checkpoint = Checkpoint::next(self.last_checkpoint, UnixTimestamp::now());
            self.last_checkpoint = checkpoint;
            checkpoint
        };
        tracing::debug!(
            description = %command.description,
            group_id = ?command.group_id,
            checkpoint = %command.checkpoint,
            "recorded command"
        );
        self.commands.push(command);

        if let Some(limit) = self.limit
            && self.commands.len() > limit
        {
            let excess = self.commands.len() - limit;
            self.commands.drain(..excess);
        }
        self.applied = self.commands.len();
        self.notify();
    }

    fn state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.applied > 0,
            can_redo: self.applied < self.commands.len(),
            undo_description: self.undo_target().map(|c| c.description.clone()),
            redo_description: self.redo_target().map(|c| c.description.clone()),
            current_checkpoint: self
                .undo_target()
                .map(|c| c.checkpoint)
                .unwrap_or(Checkpoint::NONE),
        }
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let state = self.state();
        self.listeners
            .retain(|listener| listener.unbounded_send(state.clone()).is_ok());
    }
}

/// Clears the executing flag when a replay finishes, fails or is dropped
struct ExecutingGuard<E>(Arc<Mutex<Inner<E>>>);

impl<E> Drop for ExecutingGuard<E> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.0.lock() {
            inner.executing = false;
        }
    }
}
