use common::codec::PayloadError;
use common::utils::checked_add;
use common::Partial;

/// Final result of the current job.
///
/// Partials are merged by numeric addition, so submitting `{a: 1}` and
/// `{a: 2}` in any order yields `{a: 3}`.
#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    totals: Partial,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one reduce result. Either every key is merged or, if any sum
    /// would overflow, nothing is.
    pub fn merge(&mut self, partial: Partial) -> Result<(), PayloadError> {
        let mut merged = Vec::with_capacity(partial.len());
        for (key, value) in partial {
            let total = match self.totals.get(&key) {
                Some(current) => match checked_add(current, &value) {
                    Some(sum) => sum,
                    None => return Err(PayloadError::Overflow { key }),
                },
                None => value,
            };
            merged.push((key, total));
        }

        self.totals.extend(merged);
        Ok(())
    }

    pub fn totals(&self) -> &Partial {
        &self.totals
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
