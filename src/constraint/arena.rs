use super::{Constraint, ConstraintGroup, ParticleConstraint, ProjectionContext, ProjectionMode};
use crate::error::PhysicsResult;
use crate::particle::Particle;

/// Index of a slot in the constraint arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintSlot(pub u32);

impl ConstraintSlot {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Pre-allocated, index-addressed constraint storage with a free list.
///
/// A slot is either empty or holds a fully constructed constraint; checkout
/// overwrites the whole value, so nothing survives from a previous use.
#[derive(Debug, Clone, Default)]
pub struct ConstraintArena {
    slots: Vec<Option<Constraint>>,
    free: Vec<u32>,
    groups: [Vec<ConstraintSlot>; 4],
}

impl ConstraintArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a constraint in a free slot (or a new one) and return its slot.
    pub fn checkout(&mut self, constraint: Constraint) -> ConstraintSlot {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(constraint);
                ConstraintSlot(index)
            }
            None => {
                self.slots.push(Some(constraint));
                ConstraintSlot((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Append an existing slot to a group's processing list.
    pub fn enqueue(&mut self, group: ConstraintGroup, slot: ConstraintSlot) {
        self.groups[group.index()].push(slot);
    }

    /// Checkout and enqueue in one call.
    pub fn add(&mut self, group: ConstraintGroup, constraint: Constraint) -> ConstraintSlot {
        let slot = self.checkout(constraint);
        self.enqueue(group, slot);
        slot
    }

    pub fn get(&self, slot: ConstraintSlot) -> Option<&Constraint> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    pub fn group(&self, group: ConstraintGroup) -> &[ConstraintSlot] {
        &self.groups[group.index()]
    }

    /// Constraints of a group in insertion order.
    pub fn iter_group(&self, group: ConstraintGroup) -> impl Iterator<Item = &Constraint> + '_ {
        self.groups[group.index()]
            .iter()
            .filter_map(move |slot| self.get(*slot))
    }

    /// Occupied slots.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Register every live constraint once on the particle counters. A slot
    /// listed in several groups is counted once.
    pub fn update_counts(&self, particles: &mut [Particle]) {
        for constraint in self.slots.iter().flatten() {
            constraint.update_counts(particles);
        }
    }

    /// Project every constraint of `group` in insertion order.
    pub fn project_group(
        &mut self,
        group: ConstraintGroup,
        particles: &mut [Particle],
        ctx: &mut ProjectionContext<'_>,
        mode: ProjectionMode,
    ) -> PhysicsResult<()> {
        let list = &self.groups[group.index()];
        for slot in list {
            if let Some(constraint) = self.slots[slot.index()].as_mut() {
                constraint.project(particles, ctx, mode)?;
            }
        }
        Ok(())
    }

    /// Return every Contact and Stabilization slot to the free list.
    pub fn release_transient(&mut self) {
        for group in ConstraintGroup::ALL {
            if !group.is_transient() {
                continue;
            }
            let list = std::mem::take(&mut self.groups[group.index()]);
            for slot in list {
                if self.slots[slot.index()].take().is_some() {
                    self.free.push(slot.0);
                }
            }
        }
    }
}
