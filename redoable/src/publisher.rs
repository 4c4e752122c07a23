use crate::Block;

/// Receives the blocks changed by every write the server accepts
///
/// The [`ServerApi`](crate::ServerApi) calls this once per successful write so
/// that local state can be updated before the next fetch. Any
/// `Fn(&[Block])` is a publisher.
pub trait ChangePublisher: Clone + Send + Sync + 'static {
    fn publish(&self, blocks: &[Block]);
}

impl<F> ChangePublisher for F
where
    F: Fn(&[Block]) + Clone + Send + Sync + 'static,
{
    fn publish(&self, blocks: &[Block]) {
        self(blocks)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl ChangePublisher for NoopPublisher {
    fn publish(&self, _blocks: &[Block]) {}
}
