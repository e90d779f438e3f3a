//! `ScheduledValue<T>`: the "newest `effective_height <= h` wins" pattern
//! shared by every governance knob that can be changed ahead of when it
//! takes effect (`BpSize`'s new committee size, a CDP interest curve point).
//! Grounded on `CSysParamDBCache::SetNewTotalBpsSize`/`GetCurrentTotalBpsSize`,
//! which together are exactly this: a pending value plus the height at which
//! it becomes current.

use dpos_core::ids::BlockHeight;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledValue<T> {
    pub value: T,
    pub effective_height: BlockHeight,
}

impl<T: Clone> ScheduledValue<T> {
    pub fn new(value: T, effective_height: BlockHeight) -> Self {
        ScheduledValue { value, effective_height }
    }

    /// Picks the newest entry whose `effective_height <= h`, among `current`
    /// (assumed already effective) and any number of pending entries.
    pub fn resolve(h: BlockHeight, current: &T, pending: &[ScheduledValue<T>]) -> T {
        pending
            .iter()
            .filter(|p| p.effective_height <= h)
            .max_by_key(|p| p.effective_height)
            .map(|p| p.value.clone())
            .unwrap_or_else(|| current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_current_before_any_pending_takes_effect() {
        let pending = vec![ScheduledValue::new(50u32, 100)];
        assert_eq!(ScheduledValue::resolve(50, &21, &pending), 21);
    }

    #[test]
    fn resolves_to_pending_once_effective() {
        let pending = vec![ScheduledValue::new(50u32, 100)];
        assert_eq!(ScheduledValue::resolve(100, &21, &pending), 50);
        assert_eq!(ScheduledValue::resolve(200, &21, &pending), 50);
    }

    #[test]
    fn picks_the_newest_effective_entry() {
        let pending = vec![ScheduledValue::new(50u32, 100), ScheduledValue::new(70u32, 150)];
        assert_eq!(ScheduledValue::resolve(120, &21, &pending), 50);
        assert_eq!(ScheduledValue::resolve(160, &21, &pending), 70);
    }
}
