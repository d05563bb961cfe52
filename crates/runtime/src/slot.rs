use crate::task::TaskHandle;

/// Holder for at most one live background resource.
///
/// A slot is either empty (the "absent" state) or holds one [`TaskHandle`].
/// `acquire_with` checks occupancy before constructing anything, so a second
/// start cannot create a duplicate subscription or timer.
#[derive(Debug, Default)]
pub struct Slot {
    handle: Option<TaskHandle>,
}

impl Slot {
    pub fn new() -> Self {
        Self { handle: None }
    }

    pub fn is_occupied(&self) -> bool {
        self.handle.is_some()
    }

    /// Fill the slot if it is empty. `make` is not called when occupied.
    pub fn acquire_with(&mut self, make: impl FnOnce() -> TaskHandle) -> bool {
        if self.handle.is_some() {
            return false;
        }
        self.handle = Some(make());
        true
    }

    /// Release whatever the slot holds, then install `handle`.
    pub fn replace(&mut self, handle: TaskHandle) {
        self.release();
        self.handle = Some(handle);
    }

    /// Abort and clear the held resource. Returns false if the slot was empty.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(mut h) => {
                h.abort();
                true
            }
            None => false,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.handle.as_ref().map(TaskHandle::name)
    }
}
