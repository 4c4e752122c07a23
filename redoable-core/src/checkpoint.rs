use crate::UnixTimestamp;

/// A point in the undo history
///
/// Every recorded command carries a checkpoint. Ordinary commands are stamped
/// with the wall clock at the time they were recorded, discardable commands
/// reuse the checkpoint of the command before them, so comparing
/// [`UndoManager::current_checkpoint`](crate::UndoManager::current_checkpoint)
/// before and after some edits tells a caller whether anything other than
/// discardable commands happened in between.
///
/// [`Checkpoint::NONE`] is reported when there is no command to undo.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Checkpoint(UnixTimestamp);

impl Checkpoint {
    pub const NONE: Checkpoint = Checkpoint(UnixTimestamp::from_millis(0));

    /// The checkpoint to give a command recorded at `now` when the most
    /// recently issued checkpoint was `last`
    ///
    /// Checkpoints are strictly increasing even when two commands are recorded
    /// within the same millisecond or the wall clock steps backwards.
    pub(crate) fn next(last: Checkpoint, now: UnixTimestamp) -> Checkpoint {
        let floor = last.0.as_millis().saturating_add(1);
        Checkpoint(UnixTimestamp::from_millis(now.as_millis().max(floor)))
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn timestamp(&self) -> UnixTimestamp {
        self.0
    }
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Checkpoint({})", self.0)
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Checkpoint> for u64 {
    fn from(checkpoint: Checkpoint) -> Self {
        checkpoint.0.as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_follows_the_clock() {
        let last = Checkpoint(UnixTimestamp::from_millis(100));
        let next = Checkpoint::next(last, UnixTimestamp::from_millis(250));
        assert_eq!(u64::from(next), 250);
    }

    #[test]
    fn next_is_strictly_increasing_within_a_millisecond() {
        let last = Checkpoint(UnixTimestamp::from_millis(100));
        assert_eq!(u64::from(Checkpoint::next(last, UnixTimestamp::from_millis(100))), 101);
        assert_eq!(u64::from(Checkpoint::next(last, UnixTimestamp::from_millis(40))), 101);
    }

    #[test]
    fn none_is_zero() {
        assert!(Checkpoint::NONE.is_none());
        assert_eq!(u64::from(Checkpoint::NONE), 0);
        assert!(!Checkpoint::next(Checkpoint::NONE, UnixTimestamp::from_millis(0)).is_none());
    }
}
