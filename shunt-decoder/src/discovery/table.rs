//! Last observed value per candidate decoding

use super::CandidateField;
use crate::codec::{round_to, VALUE_PRECISION};
use std::collections::HashMap;

/// Previous value of every candidate seen so far
///
/// Entries are never evicted; a long-running session compares against
/// whatever the candidate last decoded to, however old.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    values: HashMap<CandidateField, f64>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &CandidateField) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Store `value` for `field` and return the change since the last observation
    ///
    /// The first observation of a field has a delta of zero.
    pub fn observe(&mut self, field: CandidateField, value: f64) -> f64 {
        let previous = self.values.insert(field, value).unwrap_or(value);
        round_to(value - previous, VALUE_PRECISION)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Scale;

    #[test]
    fn test_first_observation_has_zero_delta() {
        let mut table = FieldTable::new();
        let field = CandidateField::new(4, 2, false, Scale::Tenth);
        assert_eq!(table.observe(field, 12.3), 0.0);
        assert_eq!(table.get(&field), Some(12.3));
    }

    #[test]
    fn test_delta_is_rounded() {
        let mut table = FieldTable::new();
        let field = CandidateField::new(4, 2, false, Scale::Thousandth);
        table.observe(field, 0.3);
        // 0.1 + 0.2 - 0.3 is not exactly zero in binary
        assert_eq!(table.observe(field, 0.1 + 0.2), 0.0);
        assert_eq!(table.observe(field, 1.5), 1.2);
        assert_eq!(table.len(), 1);
    }
}
