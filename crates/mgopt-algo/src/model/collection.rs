//! Keyed variable families.
//!
//! A [`VariableCollection`] maps an index tuple such as `(generator, t,
//! segment)` to one scalar variable. Two indices are kept:
//!
//! - the primary map, full key to variable;
//! - one secondary map per key position, built once after every variable of
//!   the family exists. It maps the key with that position removed to the
//!   variables along the removed position, in increasing order.
//!
//! A wildcard lookup such as `(g, *, k)` is then a single hash lookup in the
//! secondary map of position 1.

use std::collections::HashMap;

use super::{Problem, VarId, VarInfo, VarKind};
use crate::error::{DispatchError, DispatchResult};

/// Bound as a function of the index tuple.
pub type BoundFn = Box<dyn Fn(&[usize]) -> f64>;

/// How bounds are chosen for every variable of a family.
pub enum BoundPolicy {
    /// `[0, ∞)`
    NonNegative,
    /// `(−∞, ∞)`
    Free,
    /// `{0, 1}`
    Binary,
    /// Explicit bound functions. An upper bound needs a lower bound.
    Bounded {
        lower: Option<BoundFn>,
        upper: Option<BoundFn>,
    },
}

impl BoundPolicy {
    /// Lower bound only.
    pub fn at_least(lower: impl Fn(&[usize]) -> f64 + 'static) -> Self {
        BoundPolicy::Bounded {
            lower: Some(Box::new(lower)),
            upper: None,
        }
    }

    /// Both bounds.
    pub fn between(
        lower: impl Fn(&[usize]) -> f64 + 'static,
        upper: impl Fn(&[usize]) -> f64 + 'static,
    ) -> Self {
        BoundPolicy::Bounded {
            lower: Some(Box::new(lower)),
            upper: Some(Box::new(upper)),
        }
    }

    fn validate(&self, family: &str) -> DispatchResult<()> {
        if let BoundPolicy::Bounded {
            lower: None,
            upper: Some(_),
        } = self
        {
            return Err(DispatchError::Config(format!(
                "variable family '{family}' has an upper bound without a lower bound"
            )));
        }
        Ok(())
    }

    fn kind(&self) -> VarKind {
        match self {
            BoundPolicy::Binary => VarKind::Binary,
            _ => VarKind::Continuous,
        }
    }

    fn bounds(&self, key: &[usize]) -> (Option<f64>, Option<f64>) {
        match self {
            BoundPolicy::NonNegative => (Some(0.0), None),
            BoundPolicy::Free => (None, None),
            BoundPolicy::Binary => (Some(0.0), Some(1.0)),
            BoundPolicy::Bounded { lower, upper } => (
                lower.as_ref().map(|f| f(key)),
                upper.as_ref().map(|f| f(key)),
            ),
        }
    }
}

impl std::fmt::Debug for BoundPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundPolicy::NonNegative => f.write_str("NonNegative"),
            BoundPolicy::Free => f.write_str("Free"),
            BoundPolicy::Binary => f.write_str("Binary"),
            BoundPolicy::Bounded { lower, upper } => f
                .debug_struct("Bounded")
                .field("lower", &lower.is_some())
                .field("upper", &upper.is_some())
                .finish(),
        }
    }
}

/// One position of a selection pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    At(usize),
    Any,
}

type Key = Box<[usize]>;

#[derive(Debug, Clone)]
pub struct VariableCollection {
    family: String,
    arity: usize,
    primary: HashMap<Key, VarId>,
    /// Keys in creation order
    keys: Vec<Key>,
    /// `secondary[p]`: key without position `p` to the ordered series along `p`
    secondary: Vec<HashMap<Key, Vec<VarId>>>,
}

fn without(key: &[usize], position: usize) -> Key {
    key.iter()
        .enumerate()
        .filter(|(i, _)| *i != position)
        .map(|(_, &k)| k)
        .collect()
}

impl VariableCollection {
    /// Creates one variable per key in `problem`, named `{family}_{i}_{j}…`.
    ///
    /// The bound policy is checked before anything is added, so a rejected
    /// family leaves `problem` untouched. All keys must have the same length
    /// and be distinct.
    pub fn create<I, K>(
        problem: &mut Problem,
        family: &str,
        keys: I,
        policy: BoundPolicy,
    ) -> DispatchResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[usize]>,
    {
        policy.validate(family)?;

        let keys: Vec<Key> = keys.into_iter().map(|k| k.as_ref().into()).collect();
        let arity = keys.first().map_or(0, |k| k.len());
        if let Some(bad) = keys.iter().find(|k| k.len() != arity) {
            return Err(DispatchError::Config(format!(
                "variable family '{family}' mixes key lengths {arity} and {}",
                bad.len()
            )));
        }

        let mut primary = HashMap::with_capacity(keys.len());
        for key in &keys {
            if primary.contains_key(key) {
                return Err(DispatchError::Config(format!(
                    "variable family '{family}' repeats key {key:?}"
                )));
            }
            primary.insert(key.clone(), VarId(usize::MAX));
        }

        let kind = policy.kind();
        for key in &keys {
            let (lower, upper) = policy.bounds(key);
            let name = std::iter::once(family.to_string())
                .chain(key.iter().map(|k| k.to_string()))
                .collect::<Vec<_>>()
                .join("_");
            let id = problem.add_var(VarInfo {
                name,
                kind,
                lower,
                upper,
            });
            primary.insert(key.clone(), id);
        }

        let mut collection = Self {
            family: family.to_string(),
            arity,
            primary,
            keys,
            secondary: Vec::new(),
        };
        collection.index();
        Ok(collection)
    }

    fn index(&mut self) {
        let mut secondary: Vec<HashMap<Key, Vec<(usize, VarId)>>> =
            vec![HashMap::new(); self.arity];
        for key in &self.keys {
            let id = self.primary[key];
            for (p, map) in secondary.iter_mut().enumerate() {
                map.entry(without(key, p)).or_default().push((key[p], id));
            }
        }
        self.secondary = secondary
            .into_iter()
            .map(|map| {
                map.into_iter()
                    .map(|(k, mut series)| {
                        series.sort_by_key(|(pos, _)| *pos);
                        (k, series.into_iter().map(|(_, id)| id).collect())
                    })
                    .collect()
            })
            .collect();
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: &[usize]) -> Option<VarId> {
        self.primary.get(key).copied()
    }

    /// Like [`get`](Self::get) but a missing key is a build error.
    pub fn var(&self, key: &[usize]) -> DispatchResult<VarId> {
        self.get(key).ok_or_else(|| {
            DispatchError::Config(format!("no variable {}{key:?}", self.family))
        })
    }

    /// Variables along `position` with every other position fixed to
    /// `fixed` (given without the wildcard position). Empty when nothing
    /// matches.
    pub fn series(&self, position: usize, fixed: &[usize]) -> &[VarId] {
        self.secondary
            .get(position)
            .and_then(|map| map.get(fixed))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// General pattern lookup. One wildcard goes through the secondary
    /// index; no wildcard is a primary lookup; several wildcards scan.
    pub fn select(&self, pattern: &[Slot]) -> Vec<VarId> {
        if pattern.len() != self.arity {
            return Vec::new();
        }
        let wild: Vec<usize> = pattern
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Slot::Any)
            .map(|(i, _)| i)
            .collect();
        let fixed: Vec<usize> = pattern
            .iter()
            .filter_map(|s| match s {
                Slot::At(k) => Some(*k),
                Slot::Any => None,
            })
            .collect();
        match wild.as_slice() {
            [] => self.get(&fixed).into_iter().collect(),
            [p] => self.series(*p, &fixed).to_vec(),
            _ => {
                let mut matches: Vec<(&Key, VarId)> = self
                    .keys
                    .iter()
                    .filter(|k| {
                        k.iter().zip(pattern).all(|(v, s)| match s {
                            Slot::At(want) => v == want,
                            Slot::Any => true,
                        })
                    })
                    .map(|k| (k, self.primary[k]))
                    .collect();
                matches.sort_by(|a, b| a.0.cmp(b.0));
                matches.into_iter().map(|(_, id)| id).collect()
            }
        }
    }

    /// Key and variable pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (&[usize], VarId)> + '_ {
        self.keys.iter().map(|k| (&k[..], self.primary[k]))
    }
}

/// Every key of the full grid `0..d₀ × 0..d₁ × …`, last position fastest.
pub fn grid(dims: &[usize]) -> Vec<Vec<usize>> {
    if dims.iter().any(|&d| d == 0) {
        return Vec::new();
    }
    let mut out = vec![Vec::with_capacity(dims.len())];
    for &d in dims {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..d).map(move |i| {
                    let mut k = prefix.clone();
                    k.push(i);
                    k
                })
            })
            .collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_returns_ordered_series() {
        let mut p = Problem::new();
        // Reverse creation order; series must still come back sorted.
        let mut keys = grid(&[2, 3, 2]);
        keys.reverse();
        let c = VariableCollection::create(&mut p, "seg", keys, BoundPolicy::NonNegative).unwrap();
        let over_t = c.select(&[Slot::At(1), Slot::Any, Slot::At(0)]);
        let want: Vec<VarId> = (0..3).map(|t| c.get(&[1, t, 0]).unwrap()).collect();
        assert_eq!(over_t, want);
        assert_eq!(c.series(1, &[1, 0]), want.as_slice());
        assert_eq!(p.var(want[2]).name, "seg_1_2_0");
    }

    #[test]
    fn exact_and_multi_wildcard_lookup() {
        let mut p = Problem::new();
        let c = VariableCollection::create(&mut p, "x", grid(&[2, 2]), BoundPolicy::Free).unwrap();
        assert_eq!(c.select(&[Slot::At(1), Slot::At(0)]), vec![c.get(&[1, 0]).unwrap()]);
        assert_eq!(c.select(&[Slot::Any, Slot::Any]).len(), 4);
        assert!(c.select(&[Slot::At(5), Slot::Any]).is_empty());
        assert!(c.select(&[Slot::Any]).is_empty());
        assert_eq!(p.var(c.get(&[0, 0]).unwrap()).lower, None);
    }

    #[test]
    fn upper_without_lower_is_rejected_before_creation() {
        let mut p = Problem::new();
        let policy = BoundPolicy::Bounded {
            lower: None,
            upper: Some(Box::new(|_| 1.0)),
        };
        let err = VariableCollection::create(&mut p, "soc", grid(&[3]), policy).unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)));
        assert_eq!(p.num_vars(), 0);
    }

    #[test]
    fn bound_functions_see_the_key() {
        let mut p = Problem::new();
        let caps = [0.5, 2.0];
        let c = VariableCollection::create(
            &mut p,
            "charge",
            grid(&[2, 1]),
            BoundPolicy::between(|_| 0.0, move |k| caps[k[0]]),
        )
        .unwrap();
        assert_eq!(p.var(c.get(&[1, 0]).unwrap()).upper, Some(2.0));
        assert_eq!(p.var(c.get(&[0, 0]).unwrap()).upper, Some(0.5));
    }

    #[test]
    fn binary_policy_and_duplicates() {
        let mut p = Problem::new();
        let c = VariableCollection::create(&mut p, "on", [[0usize], [1]], BoundPolicy::Binary)
            .unwrap();
        assert_eq!(p.var(c.get(&[1]).unwrap()).kind, VarKind::Binary);
        let dup = VariableCollection::create(&mut p, "d", [[0usize], [0]], BoundPolicy::Free);
        assert!(dup.is_err());
    }

    #[test]
    fn empty_grid() {
        assert!(grid(&[3, 0]).is_empty());
        assert_eq!(grid(&[2, 2]), vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
    }
}
