use std::collections::BTreeSet;

/// Effect of one completion notice on the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// At or below the confirmed cursor, or already recorded.
    Stale,
    /// Recorded, but a lower block is still outstanding.
    Held,
    /// The cursor moves up to this block.
    Advanced(u64),
}

/// Low-water mark over completed block numbers.
///
/// The cursor only moves through contiguous completions, so it never passes a block whose
/// scan has not been confirmed.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    confirmed: u64,
    completed: BTreeSet<u64>,
}

impl Progress {
    pub fn new(confirmed: u64) -> Self {
        Self { confirmed, completed: BTreeSet::new() }
    }

    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    /// Completions above the cursor waiting for a gap to close.
    pub fn held(&self) -> usize {
        self.completed.len()
    }

    pub fn record(&mut self, number: u64) -> Record {
        if number <= self.confirmed || !self.completed.insert(number) {
            return Record::Stale;
        }

        let before = self.confirmed;
        while self.completed.remove(&(self.confirmed + 1)) {
            self.confirmed += 1;
        }

        if self.confirmed > before { Record::Advanced(self.confirmed) } else { Record::Held }
    }
}
