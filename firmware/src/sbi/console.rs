use alloc::boxed::Box;
use core::fmt;
use rustsbi::{Console, Physical, SbiRet};
use spin::Mutex;

use crate::platform::PLATFORM;

pub trait ConsoleDevice {
    fn read(&self, buf: &mut [u8]) -> usize;
    fn write(&self, buf: &[u8]) -> usize;
}

/// SBI Debug Console implementation over one platform console device.
pub struct SbiConsole {
    inner: Mutex<Box<dyn ConsoleDevice>>,
}

impl SbiConsole {
    pub fn new(inner: Mutex<Box<dyn ConsoleDevice>>) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn putchar(&mut self, c: usize) -> usize {
        use fmt::Write;
        self.write_char(c as u8 as char).unwrap();
        0
    }

    #[inline]
    pub fn getchar(&self) -> usize {
        let mut c = 0u8;
        let console = self.inner.lock();
        loop {
            if console.read(core::slice::from_mut(&mut c)) == 1 {
                break;
            }
        }
        c as _
    }
}

impl Console for SbiConsole {
    #[inline]
    fn write(&self, bytes: Physical<&[u8]>) -> SbiRet {
        let start = bytes.phys_addr_lo();
        let buf = unsafe { core::slice::from_raw_parts(start as *const u8, bytes.num_bytes()) };
        let count = self.inner.lock().write(buf);
        SbiRet::success(count)
    }

    #[inline]
    fn read(&self, bytes: Physical<&mut [u8]>) -> SbiRet {
        let start = bytes.phys_addr_lo();
        let buf = unsafe { core::slice::from_raw_parts_mut(start as *mut u8, bytes.num_bytes()) };
        let count = self.inner.lock().read(buf);
        SbiRet::success(count)
    }

    #[inline]
    fn write_byte(&self, byte: u8) -> SbiRet {
        self.inner.lock().write(&[byte]);
        SbiRet::success(0)
    }
}

impl fmt::Write for SbiConsole {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        let console = self.inner.lock();
        while !bytes.is_empty() {
            let count = console.write(bytes);
            bytes = &bytes[count..];
        }
        Ok(())
    }
}

#[inline]
pub fn putchar(c: usize) -> usize {
    unsafe { PLATFORM.sbi.console.as_mut() }
        .map(|console| console.putchar(c))
        .unwrap_or(0)
}

#[inline]
pub fn getchar() -> usize {
    unsafe { PLATFORM.sbi.console.as_ref() }
        .map(|console| console.getchar())
        .unwrap_or(0)
}
