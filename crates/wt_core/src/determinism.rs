//! Stable ordering helpers.
//!
//! Floating-point addition is not associative, so a sum over records depends
//! on the order the records arrive in. The engine sorts its input by a total,
//! content-derived key before summing; two permutations of the same batch
//! then produce bit-identical totals.

use crate::records::NormalizedRecord;
use crate::taxonomy::{DisposalMethod, WasteType};

/// Types participating in stable selections can expose a total order key.
pub trait StableOrd {
    type Key: Ord;
    fn stable_key(&self) -> Self::Key;
}

/// Canonical record key: period, category, weight bits, then id.
///
/// Weights are non-negative after normalization, and for non-negative IEEE-754
/// values the raw bit pattern orders the same way as the value.
pub type RecordKey = (i32, u8, DisposalMethod, WasteType, u64, String);

impl StableOrd for NormalizedRecord {
    type Key = RecordKey;
    fn stable_key(&self) -> Self::Key {
        (
            self.year,
            self.month,
            self.method,
            self.waste_type.clone(),
            self.weight_kg.to_bits(),
            self.id.clone(),
        )
    }
}

impl<T: StableOrd + ?Sized> StableOrd for &T {
    type Key = T::Key;
    fn stable_key(&self) -> Self::Key {
        (**self).stable_key()
    }
}

/// Sort in place by [`StableOrd::stable_key`].
pub fn sort_stable<T: StableOrd>(items: &mut [T]) {
    items.sort_by_cached_key(|t| t.stable_key());
}
