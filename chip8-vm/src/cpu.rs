//! CPU and memory state.
use std::sync::Arc;

use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
    framebuffer::Framebuffer,
    memory::Memory,
    timer::Timers,
};

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: usize,
    /// Stack pointer, counting the number of frames in use.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are used.
    pub(crate) address: Address,
    /// Delay and sound timers, shared with the timer driver.
    pub(crate) timers: Arc<Timers>,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Memory,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn too.
    pub(crate) display: Framebuffer,

    // ------------------------------------------------------------------------
    // Control
    /// Interrupt for VM loop.
    pub(crate) trap: bool,
    /// Error if the VM is in an error state.
    pub(crate) error: Option<Chip8Error>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            timers: Arc::new(Timers::new()),

            ram: Memory::new(),
            stack: [0; STACK_SIZE],
            display: Framebuffer::new(),

            trap: false,
            error: None,
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reset registers, stack, timers and display for a fresh run.
    ///
    /// Memory is kept, so a loaded program can be restarted.
    pub(crate) fn reset(&mut self) {
        self.pc = MEM_START;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.timers.reset();
        self.stack.fill(0);
        self.display.clear();
        self.trap = false;
        self.error = None;
    }

    pub fn set_error(&mut self, err: Chip8Error) {
        self.trap = true;
        self.error = Some(err);
    }

    pub fn error(&self) -> Option<&Chip8Error> {
        self.error.as_ref()
    }

    /// Fetch the big-endian instruction word at the program counter.
    #[inline(always)]
    pub fn fetch(&self) -> Chip8Result<u16> {
        self.ram.read_word(self.pc)
    }

    /// Push the return address and enter a subroutine.
    #[inline]
    pub(crate) fn push(&mut self, return_address: Address) -> Chip8Result<()> {
        if self.sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow);
        }
        self.stack[self.sp] = return_address;
        self.sp += 1;
        Ok(())
    }

    /// Pop the most recent return address.
    #[inline]
    pub(crate) fn pop(&mut self) -> Chip8Result<Address> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    #[inline(always)]
    pub fn pc(&self) -> usize {
        self.pc
    }

    #[inline(always)]
    pub fn sp(&self) -> usize {
        self.sp
    }

    #[inline(always)]
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    #[inline(always)]
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn timers(&self) -> &Arc<Timers> {
        &self.timers
    }

    pub fn memory(&self) -> &Memory {
        &self.ram
    }

    pub fn display(&self) -> &Framebuffer {
        &self.display
    }
}
