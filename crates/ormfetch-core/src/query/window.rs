//! Lazily materialized result lists.
//!
//! A [`WindowedResultList`] knows every primary key of a fetch up front and
//! materializes entities in windows of at most `batch_size` slots around the
//! index being read. A window grows one slot forward, then one backward,
//! alternately; a direction stops at the list bounds or at a slot that is
//! already materialized, and the other direction takes its remaining budget.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::rc::Rc;

use tracing::{debug, warn};

use super::executor::FetchExecutor;
use super::plan::FetchQuery;
use crate::entity::{Entity, FetchContext};
use crate::error::Error;

/// Read-only, index-addressable list of fetch results.
pub struct WindowedResultList<'a> {
    executor: FetchExecutor<'a>,
    context: &'a FetchContext,
    query: FetchQuery,
    keys: Vec<i64>,
    slots: RefCell<Vec<Option<Rc<Entity>>>>,
    unfulfilled: RefCell<BTreeSet<usize>>,
}

impl<'a> WindowedResultList<'a> {
    /// Create a list over `keys`, materializing through `executor`.
    pub fn new(
        executor: FetchExecutor<'a>,
        context: &'a FetchContext,
        query: FetchQuery,
        keys: Vec<i64>,
    ) -> Self {
        let slots = RefCell::new(vec![None; keys.len()]);
        Self {
            executor,
            context,
            query,
            keys,
            slots,
            unfulfilled: RefCell::new(BTreeSet::new()),
        }
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if there are no results.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Maximum slots materialized per fill.
    pub fn batch_size(&self) -> usize {
        self.query.batch_size().max(1)
    }

    /// Primary keys, in result order.
    pub fn keys(&self) -> &[i64] {
        &self.keys
    }

    /// Entity at `index`, materializing its window if needed.
    ///
    /// Every read of an empty slot issues a fill. Returns `Ok(None)` when
    /// storage did not return the row for a known key.
    pub fn get(&self, index: usize) -> Result<Option<Rc<Entity>>, Error> {
        self.check_index(index)?;

        if let Some(entity) = self.cached(index) {
            return Ok(Some(entity));
        }

        self.fill_around(index)?;
        Ok(self.cached(index))
    }

    /// Materialize the window around `index`, returning the slot range it covered.
    pub fn fill_around(&self, index: usize) -> Result<Range<usize>, Error> {
        self.check_index(index)?;

        let window = self.window_around(index);
        let keys = &self.keys[window.clone()];

        let position: HashMap<i64, usize> = keys
            .iter()
            .enumerate()
            .map(|(offset, &key)| (key, window.start + offset))
            .collect();

        let statement = self.query.window_statement(keys);
        let entities = self.executor.load(&self.query, &statement, self.context)?;

        let placed: Vec<(usize, Rc<Entity>)> = {
            let slots = self.slots.borrow();
            entities
                .into_iter()
                .filter_map(|entity| {
                    let slot = *position.get(&entity.primary_key())?;
                    slots[slot].is_none().then_some((slot, entity))
                })
                .collect()
        };

        // Slots are published only after their relations resolve.
        let filled: Vec<Rc<Entity>> = placed.iter().map(|(_, e)| Rc::clone(e)).collect();
        self.executor
            .prefetch(&filled, self.query.relations(), self.context)?;

        {
            let mut slots = self.slots.borrow_mut();
            for (slot, entity) in placed {
                slots[slot] = Some(entity);
            }

            let mut unfulfilled = self.unfulfilled.borrow_mut();
            for slot in window.clone() {
                if slots[slot].is_some() {
                    unfulfilled.remove(&slot);
                    continue;
                }
                warn!(
                    model = self.query.model_name(),
                    index = slot,
                    primary_key = self.keys[slot],
                    "did not fulfill index"
                );
                unfulfilled.insert(slot);
                if let Some(metrics) = self.executor.metrics() {
                    metrics.record_unfulfilled();
                }
            }
        }

        if let Some(metrics) = self.executor.metrics() {
            metrics.record_window_fill(window.len() as u64);
        }
        debug!(
            model = self.query.model_name(),
            start = window.start,
            end = window.end,
            filled = filled.len(),
            "filled window"
        );

        Ok(window)
    }

    fn window_around(&self, index: usize) -> Range<usize> {
        let slots = self.slots.borrow();
        let budget = self.batch_size();
        let len = slots.len();

        let mut start = index;
        let mut end = index + 1;
        while end - start < budget {
            let forward = end < len && slots[end].is_none();
            let backward = start > 0 && slots[start - 1].is_none();
            if !forward && !backward {
                break;
            }
            if forward {
                end += 1;
            }
            if backward && end - start < budget {
                start -= 1;
            }
        }
        start..end
    }

    fn cached(&self, index: usize) -> Option<Rc<Entity>> {
        self.slots.borrow().get(index).cloned().flatten()
    }

    fn check_index(&self, index: usize) -> Result<(), Error> {
        if index >= self.keys.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.keys.len(),
            });
        }
        Ok(())
    }

    /// Check if the slot at `index` is materialized.
    pub fn is_materialized(&self, index: usize) -> bool {
        self.cached(index).is_some()
    }

    /// Number of materialized slots.
    pub fn materialized_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| s.is_some()).count()
    }

    /// Indices whose rows storage did not return on their latest fill.
    pub fn unfulfilled_indices(&self) -> Vec<usize> {
        self.unfulfilled.borrow().iter().copied().collect()
    }

    /// Check if `entity` is in the list, without loading anything.
    pub fn contains(&self, entity: &Entity) -> bool {
        self.index_of(entity).is_some()
    }

    /// First index of `entity`, without loading anything.
    pub fn index_of(&self, entity: &Entity) -> Option<usize> {
        if entity.model() != self.query.model() {
            return None;
        }
        self.keys.iter().position(|&k| k == entity.primary_key())
    }

    /// Last index of `entity`, without loading anything.
    pub fn last_index_of(&self, entity: &Entity) -> Option<usize> {
        if entity.model() != self.query.model() {
            return None;
        }
        self.keys.iter().rposition(|&k| k == entity.primary_key())
    }

    /// Walk the list in order, materializing windows as needed.
    pub fn iter(&self) -> impl Iterator<Item = Result<Option<Rc<Entity>>, Error>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Not supported: the list is read-only.
    pub fn push(&self, _entity: Rc<Entity>) -> Result<(), Error> {
        Err(Error::ReadOnly("push"))
    }

    /// Not supported: the list is read-only.
    pub fn insert(&self, _index: usize, _entity: Rc<Entity>) -> Result<(), Error> {
        Err(Error::ReadOnly("insert"))
    }

    /// Not supported: the list is read-only.
    pub fn set(&self, _index: usize, _entity: Rc<Entity>) -> Result<Rc<Entity>, Error> {
        Err(Error::ReadOnly("set"))
    }

    /// Not supported: the list is read-only.
    pub fn remove(&self, _index: usize) -> Result<Rc<Entity>, Error> {
        Err(Error::ReadOnly("remove"))
    }

    /// Not supported: the list is read-only.
    pub fn clear(&self) -> Result<(), Error> {
        Err(Error::ReadOnly("clear"))
    }
}
