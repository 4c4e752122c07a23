use std::sync::{Arc, Mutex};

use futures::{FutureExt, future::BoxFuture};

use crate::{Checkpoint, GroupId};

/// A recorded entry in the history
pub(crate) struct Command<E> {
    pub(crate) action: Arc<dyn Reversible<E>>,
    pub(crate) description: String,
    pub(crate) group_id: Option<GroupId>,
    pub(crate) checkpoint: Checkpoint,
}

/// The type-erased pair of actions behind a [`Command`]
///
/// Implementations remember the value produced by the most recent `redo` so
/// that `undo` can compensate exactly what was done last, even when replaying
/// produced a different value than the first execution did.
pub(crate) trait Reversible<E>: Send + Sync {
    fn redo(&self) -> BoxFuture<'static, Result<(), E>>;
    fn undo(&self) -> BoxFuture<'static, Result<(), E>>;
}

pub(crate) struct Action<T, R, U> {
    redo: R,
    undo: U,
    value: Arc<Mutex<T>>,
}

impl<T, R, U> Action<T, R, U> {
    /// `value` is what the first execution of `redo` produced
    pub(crate) fn new(redo: R, undo: U, value: T) -> Self {
        Self {
            redo,
            undo,
            value: Arc::new(Mutex::new(value)),
        }
    }
}

impl<T, E, R, RFut, U, UFut> Reversible<E> for Action<T, R, U>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
    R: Fn() -> RFut + Send + Sync,
    RFut: Future<Output = Result<T, E>> + Send + 'static,
    U: Fn(T) -> UFut + Send + Sync,
    UFut: Future<Output = Result<(), E>> + Send + 'static,
{
    fn redo(&self) -> BoxFuture<'static, Result<(), E>> {
        let replay = (self.redo)();
        let slot = self.value.clone();
        async move {
            let value = replay.await?;
            *slot.lock().unwrap() = value;
            Ok(())
        }
        .boxed()
    }

    fn undo(&self) -> BoxFuture<'static, Result<(), E>> {
        let value = self.value.lock().unwrap().clone();
        (self.undo)(value).boxed()
    }
}
