//! Resource limits of a run.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// The instruction budget of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fuel {
    remaining: Option<u64>,
}

impl Fuel {
    /// A budget of `steps` instructions.
    pub fn with(steps: u64) -> Self {
        Fuel {
            remaining: Some(steps),
        }
    }

    pub fn unlimited() -> Self {
        Fuel { remaining: None }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Consumes one step. Returns `false` if the budget is exhausted.
    pub fn consume(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

impl Default for Fuel {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Requests a running interpreter to stop. The request is observed before
/// the next instruction.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_runs_out() {
        let mut fuel = Fuel::with(2);
        assert!(fuel.consume());
        assert!(fuel.consume());
        assert!(!fuel.consume());
        assert_eq!(fuel.remaining(), Some(0));
        assert!(Fuel::unlimited().consume());
    }

    #[test]
    fn cancel_is_shared() {
        let token = CancelToken::new();
        let handle = token.clone();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
