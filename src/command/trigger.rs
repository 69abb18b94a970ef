use std::fmt;
use std::sync::Arc;

/// A boolean condition polled once per scheduler tick.
///
/// Cheap to clone; clones share the same condition.
#[derive(Clone)]
pub struct Trigger {
    condition: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Trigger {
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            condition: Arc::new(condition),
        }
    }

    pub fn get(&self) -> bool {
        (self.condition)()
    }

    pub fn and(&self, other: Trigger) -> Trigger {
        let this = self.clone();
        Trigger::new(move || this.get() && other.get())
    }

    pub fn or(&self, other: Trigger) -> Trigger {
        let this = self.clone();
        Trigger::new(move || this.get() || other.get())
    }

    pub fn negate(&self) -> Trigger {
        let this = self.clone();
        Trigger::new(move || !this.get())
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger").field("active", &self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn composition_tracks_inputs() {
        let a = Arc::new(AtomicBool::new(false));
        let b = Arc::new(AtomicBool::new(false));
        let ta = {
            let a = a.clone();
            Trigger::new(move || a.load(Ordering::SeqCst))
        };
        let tb = {
            let b = b.clone();
            Trigger::new(move || b.load(Ordering::SeqCst))
        };

        let both = ta.and(tb.clone());
        let either = ta.or(tb.clone());
        let only_a = ta.and(tb.negate());

        assert!(!both.get() && !either.get() && !only_a.get());

        a.store(true, Ordering::SeqCst);
        assert!(!both.get() && either.get() && only_a.get());

        b.store(true, Ordering::SeqCst);
        assert!(both.get() && either.get() && !only_a.get());
    }
}
