/// A value paired with the copy it had when it was loaded.
///
/// `initial` is fixed for the life of the snapshot; all edits go through
/// [`Snapshot::current_mut`].
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    initial: T,
    current: T,
}

impl<T: Clone> Snapshot<T> {
    pub fn new(value: T) -> Snapshot<T> {
        Snapshot {
            initial: value.clone(),
            current: value,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn initial(&self) -> &T {
        &self.initial
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.current
    }
}

impl<T: PartialEq> Snapshot<T> {
    pub fn is_dirty(&self) -> bool {
        self.initial != self.current
    }
}
