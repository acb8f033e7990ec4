//! Tagged slot tables for processing units and sound units.
//!
//! A machine constructor fills these while the configuration is being built.
//! Constructors that derive from another machine call the parent constructor
//! first and then patch the result with [`SlotTable::find`] and
//! [`SlotTable::remove`], so lookups are by tag rather than by index.

use thiserror::Error;
use tracing::warn;

/// Capacity shared by the CPU and sound tables.
pub const MAX_SLOTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("out of {0} slots")]
    OutOfSlots(&'static str),

    #[error("can't find {kind} '{tag}'")]
    NotFound { kind: &'static str, tag: String },
}

/// Processing-unit families the execution engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuType {
    Z80,
    M6809,
    M6800,
    M6502,
    I8035,
}

/// Sound chips the audio system knows how to mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundType {
    Dac,
    NamcoWsg,
    Pokey,
    Discrete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSlot {
    pub cpu_type: CpuType,
    /// Input clock in Hz.
    pub clock: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundSlot {
    pub sound_type: SoundType,
    /// Chip clock in Hz, or the chip's interface parameter when it has no clock.
    pub clock: u32,
}

/// Entry types stored in a [`SlotTable`].
pub trait SlotKind: Copy {
    /// Noun used in diagnostics ("CPU", "sound").
    const NAME: &'static str;
}

impl SlotKind for CpuSlot {
    const NAME: &'static str = "CPU";
}

impl SlotKind for SoundSlot {
    const NAME: &'static str = "sound";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<K> {
    pub tag: Option<&'static str>,
    pub kind: K,
}

/// Fixed-capacity table of tagged entries.
///
/// Occupied entries are always dense from index 0; `remove` compacts by
/// shifting the tail down. Tags are not required to be unique and every
/// lookup returns the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable<K> {
    slots: [Option<Slot<K>>; MAX_SLOTS],
}

impl<K: SlotKind> SlotTable<K> {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_SLOTS],
        }
    }

    /// Claim the first free slot.
    pub fn add(&mut self, tag: Option<&'static str>, kind: K) -> Result<&mut Slot<K>, SlotError> {
        let Some(free) = self.slots.iter().position(Option::is_none) else {
            warn!(kind = K::NAME, ?tag, "out of slots");
            return Err(SlotError::OutOfSlots(K::NAME));
        };
        Ok(self.slots[free].insert(Slot { tag, kind }))
    }

    /// Index of the first slot carrying `tag`.
    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_some_and(|s| s.tag == Some(tag)))
    }

    pub fn find(&mut self, tag: &str) -> Result<&mut Slot<K>, SlotError> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|slot| slot.tag == Some(tag))
            .ok_or_else(|| not_found::<K>(tag))
    }

    /// Remove the first slot carrying `tag`, shifting later entries down by one.
    pub fn remove(&mut self, tag: &str) -> Result<Slot<K>, SlotError> {
        let index = self.index_of(tag).ok_or_else(|| not_found::<K>(tag))?;
        let removed = self.slots[index].take();
        self.slots[index..].rotate_left(1);
        self.slots[MAX_SLOTS - 1] = None;
        removed.ok_or_else(|| not_found::<K>(tag))
    }

    pub fn get(&self, index: usize) -> Option<&Slot<K>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot<K>> {
        self.slots.iter().map_while(Option::as_ref)
    }
}

impl<K: SlotKind> Default for SlotTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found<K: SlotKind>(tag: &str) -> SlotError {
    warn!(kind = K::NAME, tag, "can't find slot");
    SlotError::NotFound {
        kind: K::NAME,
        tag: tag.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(clock: u32) -> CpuSlot {
        CpuSlot {
            cpu_type: CpuType::Z80,
            clock,
        }
    }

    #[test]
    fn add_fills_in_order() {
        let mut table = SlotTable::new();
        table.add(Some("main"), cpu(1)).unwrap();
        table.add(Some("sound"), cpu(2)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().tag, Some("main"));
        assert_eq!(table.get(1).unwrap().kind.clock, 2);
    }

    #[test]
    fn add_beyond_capacity_leaves_table_unchanged() {
        let mut table = SlotTable::new();
        for i in 0..MAX_SLOTS {
            table.add(None, cpu(i as u32)).unwrap();
        }
        let before = table.clone();
        assert_eq!(table.add(Some("extra"), cpu(99)), Err(SlotError::OutOfSlots("CPU")));
        assert_eq!(table, before);
    }

    #[test]
    fn find_returns_first_match() {
        let mut table = SlotTable::new();
        table.add(Some("dup"), cpu(1)).unwrap();
        table.add(Some("dup"), cpu(2)).unwrap();
        assert_eq!(table.find("dup").unwrap().kind.clock, 1);
        assert_eq!(table.index_of("dup"), Some(0));
    }

    #[test]
    fn find_missing_does_not_mutate() {
        let mut table = SlotTable::new();
        table.add(Some("main"), cpu(1)).unwrap();
        let before = table.clone();
        assert!(matches!(table.find("audio"), Err(SlotError::NotFound { .. })));
        assert_eq!(table, before);
    }

    #[test]
    fn find_allows_patching_in_place() {
        let mut table = SlotTable::new();
        table.add(Some("main"), cpu(1)).unwrap();
        table.find("main").unwrap().kind.clock = 3_072_000;
        assert_eq!(table.get(0).unwrap().kind.clock, 3_072_000);
    }

    #[test]
    fn remove_shifts_tail_and_zeroes_last() {
        let mut table = SlotTable::new();
        for (i, tag) in ["a", "b", "c", "d"].into_iter().enumerate() {
            table.add(Some(tag), cpu(i as u32)).unwrap();
        }
        let removed = table.remove("b").unwrap();
        assert_eq!(removed.kind.clock, 1);
        let tags: Vec<_> = table.iter().map(|s| s.tag.unwrap()).collect();
        assert_eq!(tags, ["a", "c", "d"]);
        assert!(table.get(3).is_none());
        assert!(table.get(MAX_SLOTS - 1).is_none());
    }

    #[test]
    fn remove_from_full_table_frees_last_slot() {
        let mut table = SlotTable::new();
        for i in 0..MAX_SLOTS {
            table.add(Some(if i == 0 { "first" } else { "other" }), cpu(i as u32)).unwrap();
        }
        table.remove("first").unwrap();
        assert_eq!(table.len(), MAX_SLOTS - 1);
        assert!(table.get(MAX_SLOTS - 1).is_none());
        assert_eq!(table.get(0).unwrap().kind.clock, 1);
        table.add(Some("late"), cpu(42)).unwrap();
        assert_eq!(table.get(MAX_SLOTS - 1).unwrap().tag, Some("late"));
    }

    #[test]
    fn remove_missing_reports_not_found() {
        let mut table: SlotTable<SoundSlot> = SlotTable::new();
        assert_eq!(
            table.remove("dac"),
            Err(SlotError::NotFound {
                kind: "sound",
                tag: "dac".to_string()
            })
        );
    }
}
