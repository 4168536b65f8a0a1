//! PMP entry programming for domain policies.

use domctx::{PmpPolicy, PmpRegion, RegionAccess, RegionMode};
use riscv::register::{
    Permission, Range, pmpaddr0, pmpaddr1, pmpaddr2, pmpaddr3, pmpaddr4, pmpaddr5, pmpaddr6,
    pmpaddr7, pmpaddr8, pmpaddr9, pmpaddr10, pmpaddr11, pmpaddr12, pmpaddr13, pmpaddr14,
    pmpaddr15, pmpcfg0, pmpcfg2,
};

use crate::cfg::PMP_ENTRY_COUNT;

/// Turns PMP entry `index` off on the local hart.
pub fn disable_entry(index: usize) {
    set_entry_reg(index, 0, Range::OFF, Permission::NONE);
}

/// Programs a domain policy entry-by-entry starting at index 0.
///
/// Entries beyond the policy stay off; the caller disables all entries
/// beforehand.
pub fn apply_policy(policy: &PmpPolicy) {
    for (index, region) in policy.regions().iter().enumerate().take(PMP_ENTRY_COUNT) {
        if let Some(pmp_addr) = encode_addr(region) {
            set_entry_reg(
                index,
                pmp_addr,
                range_of(region.mode),
                permission_of(region.access),
            );
        }
    }
}

fn range_of(mode: RegionMode) -> Range {
    match mode {
        RegionMode::Off => Range::OFF,
        RegionMode::Tor => Range::TOR,
        RegionMode::Na4 => Range::NA4,
        RegionMode::Napot => Range::NAPOT,
    }
}

fn permission_of(access: RegionAccess) -> Permission {
    match access {
        RegionAccess::None => Permission::NONE,
        RegionAccess::R => Permission::R,
        RegionAccess::RW => Permission::RW,
        RegionAccess::RX => Permission::RX,
        RegionAccess::RWX => Permission::RWX,
    }
}

/// Encodes a region into the pmpaddr format.
///
/// NAPOT needs a power-of-two size of at least 8 bytes with a matching
/// alignment; a malformed region encodes to `None` and its entry stays off.
fn encode_addr(region: &PmpRegion) -> Option<usize> {
    let addr = region.addr;
    let len = region.size;
    match region.mode {
        RegionMode::Napot => {
            if len < 8 || len & (len - 1) != 0 || addr & (len - 1) != 0 {
                return None;
            }
            Some((addr | ((len >> 1) - 1)) >> 2)
        }
        RegionMode::Na4 => Some(addr >> 2),
        RegionMode::Tor => Some(addr >> 2),
        RegionMode::Off => Some(0),
    }
}

fn set_entry_reg(index: usize, pmp_addr: usize, range: Range, permission: Permission) {
    unsafe {
        match index {
            0 => {
                pmpaddr0::write(pmp_addr);
                pmpcfg0::set_pmp(0, range, permission, false);
            }
            1 => {
                pmpaddr1::write(pmp_addr);
                pmpcfg0::set_pmp(1, range, permission, false);
            }
            2 => {
                pmpaddr2::write(pmp_addr);
                pmpcfg0::set_pmp(2, range, permission, false);
            }
            3 => {
                pmpaddr3::write(pmp_addr);
                pmpcfg0::set_pmp(3, range, permission, false);
            }
            4 => {
                pmpaddr4::write(pmp_addr);
                pmpcfg0::set_pmp(4, range, permission, false);
            }
            5 => {
                pmpaddr5::write(pmp_addr);
                pmpcfg0::set_pmp(5, range, permission, false);
            }
            6 => {
                pmpaddr6::write(pmp_addr);
                pmpcfg0::set_pmp(6, range, permission, false);
            }
            7 => {
                pmpaddr7::write(pmp_addr);
                pmpcfg0::set_pmp(7, range, permission, false);
            }
            8 => {
                pmpaddr8::write(pmp_addr);
                pmpcfg2::set_pmp(0, range, permission, false);
            }
            9 => {
                pmpaddr9::write(pmp_addr);
                pmpcfg2::set_pmp(1, range, permission, false);
            }
            10 => {
                pmpaddr10::write(pmp_addr);
                pmpcfg2::set_pmp(2, range, permission, false);
            }
            11 => {
                pmpaddr11::write(pmp_addr);
                pmpcfg2::set_pmp(3, range, permission, false);
            }
            12 => {
                pmpaddr12::write(pmp_addr);
                pmpcfg2::set_pmp(4, range, permission, false);
            }
            13 => {
                pmpaddr13::write(pmp_addr);
                pmpcfg2::set_pmp(5, range, permission, false);
            }
            14 => {
                pmpaddr14::write(pmp_addr);
                pmpcfg2::set_pmp(6, range, permission, false);
            }
            _ => {
                pmpaddr15::write(pmp_addr);
                pmpcfg2::set_pmp(7, range, permission, false);
            }
        }
    }
}
