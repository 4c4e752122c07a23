use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};

use crate::{Block, MutatorError};

/// An async callback run as part of a recorded command
///
/// Hooks run every time the command is replayed, not just the first time.
pub type Hook<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<(), MutatorError>> + Send + Sync>;

pub fn hook<T, F, Fut>(f: F) -> Hook<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MutatorError>> + Send + 'static,
{
    Arc::new(move |arg| f(arg).boxed())
}

pub(crate) async fn run_hook<T>(hook: &Option<Hook<T>>, arg: T) -> Result<(), MutatorError> {
    match hook {
        Some(hook) => hook(arg).await,
        None => Ok(()),
    }
}

/// Callbacks for [`Mutator::insert_block`](crate::Mutator::insert_block) and
/// [`Mutator::insert_blocks`](crate::Mutator::insert_blocks)
///
/// `after_redo` sees the blocks as stored by the server, `before_undo` sees
/// them just before they are deleted again.
pub struct InsertHooks<T> {
    pub after_redo: Option<Hook<T>>,
    pub before_undo: Option<Hook<T>>,
}

impl<T> InsertHooks<T> {
    pub fn none() -> Self {
        InsertHooks {
            after_redo: None,
            before_undo: None,
        }
    }

    pub fn after_redo(mut self, hook: Hook<T>) -> Self {
        self.after_redo = Some(hook);
        self
    }

    pub fn before_undo(mut self, hook: Hook<T>) -> Self {
        self.before_undo = Some(hook);
        self
    }
}

impl<T> Default for InsertHooks<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> Clone for InsertHooks<T> {
    fn clone(&self) -> Self {
        InsertHooks {
            after_redo: self.after_redo.clone(),
            before_undo: self.before_undo.clone(),
        }
    }
}

pub type InsertBlockHooks = InsertHooks<Block>;
pub type InsertBlocksHooks = InsertHooks<Vec<Block>>;

/// Callbacks for [`Mutator::delete_block`](crate::Mutator::delete_block) and
/// [`Mutator::delete_blocks`](crate::Mutator::delete_blocks)
#[derive(Clone, Default)]
pub struct DeleteHooks {
    pub before_redo: Option<Hook<()>>,
    pub after_undo: Option<Hook<()>>,
}

impl DeleteHooks {
    pub fn before_redo(mut self, hook: Hook<()>) -> Self {
        self.before_redo = Some(hook);
        self
    }

    pub fn after_undo(mut self, hook: Hook<()>) -> Self {
        self.after_undo = Some(hook);
        self
    }
}
