mod clock;
pub mod constants;
mod cpu;
mod devices;
mod error;
mod framebuffer;
mod keypad;
mod memory;
mod op;
mod timer;
mod vm;

pub use self::{
    clock::Hz,
    devices::{InputPort, InvalidKeyCode, KeyCode, KeyWait, NullRender, Render, KEYPAD_LAYOUT},
    error::{Chip8Error, Chip8Result},
    framebuffer::Framebuffer,
    keypad::Keypad,
    memory::Memory,
    op::{Instr, Op},
    timer::{TimerDriver, Timers},
};

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        cpu::Chip8Cpu,
        devices::{InputPort, KeyCode, KeyWait, Render},
        error::{Chip8Error, Chip8Result},
        keypad::Keypad,
        timer::{TimerDriver, Timers},
        vm::{Chip8Conf, Chip8Vm, Flow, Interrupt},
        Hz,
    };
}
