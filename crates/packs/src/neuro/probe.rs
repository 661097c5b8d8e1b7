use biosim_common::Payload;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct Seen {
    count: u64,
    last: Option<Payload>,
}

/// Shared view of what a module has received, readable after the module
/// has been handed to a world.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    seen: Rc<RefCell<Seen>>,
}

impl Probe {
    pub fn count(&self) -> u64 {
        self.seen.borrow().count
    }

    pub fn last(&self) -> Option<Payload> {
        self.seen.borrow().last.clone()
    }

    pub(crate) fn record(&self, payload: &Payload) {
        let mut seen = self.seen.borrow_mut();
        seen.count += 1;
        seen.last = Some(payload.clone());
    }

    pub(crate) fn clear(&self) {
        *self.seen.borrow_mut() = Seen::default();
    }
}
