use alloc::boxed::Box;
use core::sync::atomic::Ordering::Relaxed;
use rustsbi::{HartMask, SbiRet};
use spin::Mutex;

use crate::platform::PLATFORM;
use crate::riscv::current_hartid;
use crate::sbi::hsm::remote_hsm;
use crate::sbi::trap_stack::hart_context;

/// IPI type for supervisor software interrupt.
pub(crate) const IPI_TYPE_SSOFT: u8 = 1 << 0;

/// Trait defining interface for inter-processor interrupt device
#[allow(unused)]
pub trait IpiDevice {
    /// Read machine time value.
    fn read_mtime(&self) -> u64;
    /// Write machine time value.
    fn write_mtime(&self, val: u64);
    /// Read machine timer compare value for given hart.
    fn read_mtimecmp(&self, hart_idx: usize) -> u64;
    /// Write machine timer compare value for given hart.
    fn write_mtimecmp(&self, hart_idx: usize, val: u64);
    /// Read machine software interrupt pending bit for given hart.
    fn read_msip(&self, hart_idx: usize) -> bool;
    /// Set machine software interrupt pending bit for given hart.
    fn set_msip(&self, hart_idx: usize);
    /// Clear machine software interrupt pending bit for given hart.
    fn clear_msip(&self, hart_idx: usize);
}

/// SBI IPI implementation.
pub struct SbiIpi {
    /// Reference to IPI device.
    pub ipi_dev: Mutex<Box<dyn IpiDevice>>,
    /// Maximum hart ID in the system
    pub max_hart_id: usize,
}

impl rustsbi::Timer for SbiIpi {
    /// Set timer value for current hart.
    #[inline]
    fn set_timer(&self, stime_value: u64) {
        self.write_mtimecmp(current_hartid(), stime_value);
        unsafe {
            riscv::register::mip::clear_stimer();
            riscv::register::mie::set_mtimer();
        }
    }
}

impl rustsbi::Ipi for SbiIpi {
    /// Send IPI to specified harts.
    #[inline]
    fn send_ipi(&self, hart_mask: HartMask) -> SbiRet {
        for hart_id in 0..=self.max_hart_id {
            if !hart_mask.has_bit(hart_id) {
                continue;
            }
            let Some(hsm) = remote_hsm(hart_id) else {
                return SbiRet::invalid_param();
            };
            if !hsm.allow_ipi() {
                continue;
            }
            if set_ipi_type(hart_id, IPI_TYPE_SSOFT) == 0 {
                self.set_msip(hart_id);
            }
        }
        SbiRet::success(0)
    }
}

impl SbiIpi {
    /// Create new SBI IPI instance.
    #[inline]
    pub fn new(ipi_dev: Mutex<Box<dyn IpiDevice>>, max_hart_id: usize) -> Self {
        Self {
            ipi_dev,
            max_hart_id,
        }
    }

    /// Set machine software interrupt pending for hart.
    #[inline]
    pub fn set_msip(&self, hart_idx: usize) {
        self.ipi_dev.lock().set_msip(hart_idx);
    }

    /// Clear machine software interrupt pending for hart.
    #[inline]
    pub fn clear_msip(&self, hart_idx: usize) {
        self.ipi_dev.lock().clear_msip(hart_idx);
    }

    /// Write machine timer compare value for hart.
    #[inline]
    pub fn write_mtimecmp(&self, hart_idx: usize, val: u64) {
        self.ipi_dev.lock().write_mtimecmp(hart_idx, val);
    }

    /// Clear all pending interrupts for current hart.
    #[inline]
    pub fn clear(&self) {
        let hart_id = current_hartid();
        let ipi_dev = self.ipi_dev.lock();
        ipi_dev.clear_msip(hart_id);
        ipi_dev.write_mtimecmp(hart_id, u64::MAX);
    }
}

/// Set IPI type for specified hart.
pub fn set_ipi_type(hart_id: usize, event_id: u8) -> u8 {
    hart_context(hart_id).ipi_type.fetch_or(event_id, Relaxed)
}

/// Get and reset IPI type for current hart.
pub fn get_and_reset_ipi_type() -> u8 {
    hart_context(current_hartid()).ipi_type.swap(0, Relaxed)
}

/// Clear machine software interrupt pending for current hart.
#[inline]
pub fn clear_msip() {
    match unsafe { PLATFORM.sbi.ipi.as_ref() } {
        Some(ipi) => ipi.clear_msip(current_hartid()),
        None => error!("SBI or IPI device not initialized"),
    }
}

/// Clear machine timer interrupt for current hart.
#[inline]
pub fn clear_mtime() {
    match unsafe { PLATFORM.sbi.ipi.as_ref() } {
        Some(ipi) => ipi.write_mtimecmp(current_hartid(), u64::MAX),
        None => error!("SBI or IPI device not initialized"),
    }
}

/// Clear all pending interrupts for current hart.
#[inline]
pub fn clear_all() {
    match unsafe { PLATFORM.sbi.ipi.as_ref() } {
        Some(ipi) => ipi.clear(),
        None => error!("SBI or IPI device not initialized"),
    }
}
