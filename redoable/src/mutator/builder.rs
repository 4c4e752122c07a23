use std::sync::{Arc, Mutex};

use redoable_core::UndoManager;

use crate::{
    ChangePublisher, GroupErrorPolicy, Mutator, MutatorError, NoopPublisher, ServerApi,
    mutator::Remote,
};

pub struct MutatorBuilder<A, P> {
    api: A,
    publisher: P,
    history: Option<UndoManager<MutatorError>>,
    group_error_policy: GroupErrorPolicy,
}

impl<A: ServerApi> MutatorBuilder<A, NoopPublisher> {
    pub(crate) fn new(api: A) -> Self {
        MutatorBuilder {
            api,
            publisher: NoopPublisher,
            history: None,
            group_error_policy: GroupErrorPolicy::default(),
        }
    }
}

impl<A, P> MutatorBuilder<A, P> {
    pub fn with_publisher<P2: ChangePublisher>(self, publisher: P2) -> MutatorBuilder<A, P2> {
        MutatorBuilder {
            publisher,
            api: self.api,
            history: self.history,
            group_error_policy: self.group_error_policy,
        }
    }

    /// Record into an existing history instead of a fresh, unlimited one
    pub fn with_history(mut self, history: UndoManager<MutatorError>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_group_error_policy(mut self, policy: GroupErrorPolicy) -> Self {
        self.group_error_policy = policy;
        self
    }
}

impl<A: ServerApi, P: ChangePublisher> MutatorBuilder<A, P> {
    pub fn build(self) -> Mutator<A, P> {
        Mutator {
            remote: Remote {
                api: self.api,
                publisher: self.publisher,
            },
            history: self.history.unwrap_or_default(),
            undo_group: Arc::new(Mutex::new(None)),
            group_error_policy: self.group_error_policy,
        }
    }
}
