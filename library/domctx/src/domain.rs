//! Domain model: isolation units, their boot entry and their PMP policy.

use alloc::vec::Vec;
use sbi_spec::binary::HartMask;

use crate::{Error, SlotId};

/// Index of a registered domain, assigned by the manager at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainId(pub usize);

/// Privilege level a domain's entry code runs at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    Supervisor,
    User,
}

/// Where a fresh domain context begins execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootStage {
    /// Entry address jumped to on first startup.
    pub start_addr: usize,
    /// Privilege mode of the entry code.
    pub next_mode: Privilege,
    /// Opaque boot argument handed over in `a1`.
    pub opaque: usize,
}

/// Access bits of one PMP region, mirroring the pmpcfg R/W/X encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionAccess {
    None,
    R,
    RW,
    RX,
    RWX,
}

/// Address matching mode of one PMP region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionMode {
    Off,
    Tor,
    Na4,
    Napot,
}

/// One PMP region of a domain's policy.
///
/// For `Napot` regions `size` must be a power of two of at least 8 bytes and
/// `addr` must be aligned to it; for `Tor` regions `addr` is the exclusive
/// top and `size` is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PmpRegion {
    pub addr: usize,
    pub size: usize,
    pub access: RegionAccess,
    pub mode: RegionMode,
}

/// Ordered PMP configuration applied entry-by-entry from index 0.
#[derive(Clone, Debug, Default)]
pub struct PmpPolicy {
    regions: Vec<PmpRegion>,
}

impl PmpPolicy {
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    pub fn push(&mut self, region: PmpRegion) -> Result<(), Error> {
        self.regions
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        self.regions.push(region);
        Ok(())
    }

    pub fn regions(&self) -> &[PmpRegion] {
        &self.regions
    }
}

/// A named isolation unit with fixed PMP policy, boot entry and privilege.
///
/// `assigned_harts` is configuration input until [`init`] runs: it names the
/// harts whose startup chain this domain seeds. Afterwards it tracks which
/// harts are presently executing in the domain; the switch engine keeps the
/// claim unique per hart.
///
/// [`init`]: crate::ContextManager::init
pub struct Domain {
    /// Identifier used in diagnostics.
    pub name: &'static str,
    /// Harts that may ever run this domain.
    pub possible_harts: HartMask,
    /// Harts presently executing in this domain (see type docs).
    pub assigned_harts: HartMask,
    /// The single hart that performs the initial jump into the entry code.
    pub boot_hartid: usize,
    /// Entry address for a fresh context.
    pub next_addr: usize,
    /// Privilege the entry code runs at.
    pub next_mode: Privilege,
    /// Boot argument passed in `a1`.
    pub next_arg1: usize,
    /// False means the domain runs forever on its harts with no switching.
    pub context_managed: bool,
    /// PMP configuration installed whenever a hart crosses into the domain.
    pub pmp: PmpPolicy,
    /// Per-hart slot lookup, owned and filled by the manager.
    pub(crate) table: Vec<Option<SlotId>>,
}

impl Domain {
    pub fn new(name: &'static str, possible_harts: HartMask, boot_hartid: usize) -> Self {
        Self {
            name,
            possible_harts,
            assigned_harts: empty_mask(),
            boot_hartid,
            next_addr: 0,
            next_mode: Privilege::Supervisor,
            next_arg1: 0,
            context_managed: true,
            pmp: PmpPolicy::new(),
            table: Vec::new(),
        }
    }

    /// Entry point bundle for a fresh context of this domain.
    pub fn boot_stage(&self) -> BootStage {
        BootStage {
            start_addr: self.next_addr,
            next_mode: self.next_mode,
            opaque: self.next_arg1,
        }
    }

    /// Slot of this domain for `hart_id`, if one was installed.
    pub fn context_of(&self, hart_id: usize) -> Option<SlotId> {
        self.table.get(hart_id).copied().flatten()
    }
}

/// An empty base-zero hart mask.
pub(crate) fn empty_mask() -> HartMask {
    HartMask::from_mask_base(0, 0)
}

/// Base-zero mask covering hart ids `0..count`.
pub fn mask_of_first(count: usize) -> HartMask {
    let bits = match count {
        0 => 0,
        n if n >= usize::BITS as usize => usize::MAX,
        n => (1usize << n) - 1,
    };
    HartMask::from_mask_base(bits, 0)
}

/// Returns `mask` with the bit for `hart_id` set.
pub(crate) fn mask_set(mask: HartMask, hart_id: usize) -> HartMask {
    let (bits, base) = mask.into_inner();
    let Some(idx) = hart_id.checked_sub(base) else {
        return mask;
    };
    if idx >= usize::BITS as usize {
        return mask;
    }
    HartMask::from_mask_base(bits | (1 << idx), base)
}

/// Returns `mask` with the bit for `hart_id` cleared.
pub(crate) fn mask_clear(mask: HartMask, hart_id: usize) -> HartMask {
    let (bits, base) = mask.into_inner();
    let Some(idx) = hart_id.checked_sub(base) else {
        return mask;
    };
    if idx >= usize::BITS as usize {
        return mask;
    }
    HartMask::from_mask_base(bits & !(1 << idx), base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_helpers_touch_single_bits() {
        let mask = mask_of_first(2);
        assert!(mask.has_bit(0) && mask.has_bit(1) && !mask.has_bit(2));
        let mask = mask_set(mask, 4);
        assert!(mask.has_bit(4));
        let mask = mask_clear(mask, 0);
        assert!(!mask.has_bit(0) && mask.has_bit(1) && mask.has_bit(4));
    }

    #[test]
    fn policy_keeps_region_order() {
        let region = |addr| PmpRegion {
            addr,
            size: 0x1000,
            access: RegionAccess::RWX,
            mode: RegionMode::Napot,
        };
        let mut policy = PmpPolicy::new();
        policy.push(region(0x8000_0000)).unwrap();
        policy.push(region(0x8020_0000)).unwrap();
        assert_eq!(policy.regions()[0].addr, 0x8000_0000);
        assert_eq!(policy.regions()[1].addr, 0x8020_0000);
    }
}
