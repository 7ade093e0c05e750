//! SSA value sequence and the backpatch list for forward references.

use super::types::{Value, ValueId};
use crate::error::TranslateError;
use std::collections::HashMap;

/// Append-only value sequence seeded with a shared prefix.
#[derive(Debug, Clone)]
pub struct ValueTable<'m> {
    prefix: &'m [Value],
    local: Vec<Value>,
}

impl<'m> ValueTable<'m> {
    pub fn new(prefix: &'m [Value]) -> Self {
        Self {
            prefix,
            local: Vec::new(),
        }
    }

    pub fn len(&self) -> u32 {
        (self.prefix.len() + self.local.len()) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.local.is_empty()
    }

    /// Id the next pushed value will get.
    pub fn next_id(&self) -> ValueId {
        ValueId(self.len())
    }

    pub fn push(&mut self, value: Value) -> ValueId {
        let id = self.next_id();
        self.local.push(value);
        id
    }

    pub fn get(&self, id: ValueId) -> Option<&Value> {
        let index = id.index();
        if index < self.prefix.len() {
            self.prefix.get(index)
        } else {
            self.local.get(index - self.prefix.len())
        }
    }

    /// Mutable access to values appended to this table (the prefix is shared).
    pub fn get_local_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        let index = id.index().checked_sub(self.prefix.len())?;
        self.local.get_mut(index)
    }

    /// Resolve a relative operand: `(len - distance) mod 2^32`.
    ///
    /// Returns the absolute id and whether it names a value not produced yet
    /// (distance 0, or a distance that wraps past the end).
    pub fn relative(&self, distance: u64) -> (ValueId, bool) {
        let len = self.len();
        let id = len.wrapping_sub(distance as u32);
        (ValueId(id), id >= len)
    }

    pub fn into_local(self) -> Vec<Value> {
        self.local
    }
}

/// A value id that was referenced but never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedValue(pub ValueId);

impl From<UnresolvedValue> for TranslateError {
    fn from(err: UnresolvedValue) -> Self {
        TranslateError::semantic(format!("value {} is referenced but never defined", err.0))
    }
}

/// Sites that refer to a value before it is known, filled in one pass.
///
/// The decoder uses it for operand types of forward references and the
/// lowering uses it for expression holes.
#[derive(Debug, Clone)]
pub struct Backpatch<S> {
    sites: Vec<(ValueId, S)>,
}

impl<S> Default for Backpatch<S> {
    fn default() -> Self {
        Self { sites: Vec::new() }
    }
}

impl<S> Backpatch<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: ValueId, site: S) {
        self.sites.push((value, site));
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Look every pending value up once and pair each site with its fill.
    ///
    /// Fails on the first value `lookup` cannot produce.
    pub fn resolve<T: Clone>(
        self,
        mut lookup: impl FnMut(ValueId) -> Option<T>,
    ) -> Result<Vec<(S, T)>, UnresolvedValue> {
        let mut fills: HashMap<ValueId, T> = HashMap::new();
        let mut out = Vec::with_capacity(self.sites.len());
        for (value, site) in self.sites {
            let fill = match fills.get(&value) {
                Some(fill) => fill.clone(),
                None => {
                    let fill = lookup(value).ok_or(UnresolvedValue(value))?;
                    fills.insert(value, fill.clone());
                    fill
                }
            };
            out.push((site, fill));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{TypeId, ValueKind};

    fn param(i: usize) -> Value {
        Value::new(Some(TypeId(0)), ValueKind::Param(i))
    }

    #[test]
    fn relative_distance_zero_is_forward() {
        let prefix = vec![param(0), param(1)];
        let mut table = ValueTable::new(&prefix);
        table.push(param(2));
        assert_eq!(table.relative(1), (ValueId(2), false));
        assert_eq!(table.relative(3), (ValueId(0), false));
        assert_eq!(table.relative(0), (ValueId(3), true));
    }

    #[test]
    fn relative_wraps_past_the_end() {
        let table = ValueTable::new(&[]);
        // distance -2 encoded as 2^32 - 2
        let (id, forward) = table.relative(0xffff_fffe);
        assert_eq!(id, ValueId(2));
        assert!(forward);
    }

    #[test]
    fn backpatch_resolves_each_value_once() {
        let mut patch = Backpatch::new();
        patch.record(ValueId(4), "a");
        patch.record(ValueId(4), "b");
        patch.record(ValueId(5), "c");
        let mut lookups = 0;
        let filled = patch
            .resolve(|v| {
                lookups += 1;
                Some(v.0 * 10)
            })
            .unwrap();
        assert_eq!(filled, vec![("a", 40), ("b", 40), ("c", 50)]);
        assert_eq!(lookups, 2);
    }

    #[test]
    fn backpatch_reports_missing_value() {
        let mut patch = Backpatch::new();
        patch.record(ValueId(9), ());
        let err = patch.resolve(|_| None::<u32>).unwrap_err();
        assert_eq!(err, UnresolvedValue(ValueId(9)));
    }
}
