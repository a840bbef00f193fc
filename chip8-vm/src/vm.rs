//! Virtual machine.
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use rand::prelude::*;

use crate::{
    clock::{Clock, Hz},
    constants::*,
    cpu::Chip8Cpu,
    devices::{InputPort, KeyCode, KeyWait, NullRender, Render},
    error::{Chip8Error, Chip8Result},
    keypad::Keypad,
    op::Op,
    timer::Timers,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    /// Instruction cadence. `None` runs unthrottled.
    clock: Option<Clock>,
    input: Arc<dyn InputPort>,
    render: Box<dyn Render>,
    interrupt: Interrupt,
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let input: Arc<dyn InputPort> = Arc::new(Keypad::new());
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            clock: conf
                .clock_frequency
                .filter(|hz| hz.0 > 0)
                .map(|hz| Clock::new(hz.into())),
            interrupt: Interrupt::new(input.clone()),
            input,
            render: Box::new(NullRender),
            rng,
            conf,
        }
    }

    /// Replace the keypad the VM polls and waits on.
    ///
    /// Interrupt handles must be retrieved after this call, so they
    /// cancel waits on the new input port.
    pub fn with_input(mut self, input: Arc<dyn InputPort>) -> Self {
        self.interrupt = Interrupt {
            flag: self.interrupt.flag.clone(),
            input: input.clone(),
        };
        self.input = input;
        self
    }

    /// Replace the sink that receives the display buffer.
    pub fn with_render(mut self, render: Box<dyn Render>) -> Self {
        self.render = render;
        self
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    /// Timers shared with a [`crate::TimerDriver`].
    pub fn timers(&self) -> Arc<Timers> {
        self.cpu.timers.clone()
    }

    /// Handle to stop the interpreter loop from another thread.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        self.cpu.ram.load_rom(bytecode)?;

        // Reset the program counter to prepare for execution.
        self.reset();

        Ok(())
    }

    /// Read a ROM file into memory.
    ///
    /// On failure the VM state is left as it was.
    pub fn load_rom_file(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let filepath = filepath.as_ref();
        log::info!("load rom: {}", filepath.display());

        self.cpu.ram.load_rom_file(filepath)?;
        self.reset();

        log::info!("loaded {} bytes", self.cpu.ram.rom_size());

        Ok(())
    }

    pub fn display_buffer(&self) -> &[bool; DISPLAY_BUFFER_SIZE] {
        self.cpu.display.pixels()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    Error,
    Interrupt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The display buffer changed and was pushed to the renderer.
    Draw,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`) when no key
    /// was pressed within the configured timeout. The program counter
    /// stays on the instruction, so the next step waits again.
    KeyWait,
    /// The word matched no instruction. It was skipped.
    Unknown(u16),
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Chip8Conf {
    /// Instructions executed per second. `None` runs as fast as possible.
    pub clock_frequency: Option<Hz>,
    /// Rate at which the delay and sound timers count down.
    pub timer_frequency: Hz,
    /// Longest time a single `LD Vx, K` step blocks waiting for a key.
    /// `None` blocks until a key press or cancellation.
    pub key_wait_timeout_ms: Option<u64>,
    /// Shift instructions read `Vy` instead of `Vx`, as on the COSMAC VIP.
    pub shift_vy: bool,
    /// Seed for the random number instruction.
    pub seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            clock_frequency: None,
            timer_frequency: Hz(DELAY_FREQUENCY),
            key_wait_timeout_ms: Some(100),
            shift_vy: false,
            seed: None,
        }
    }
}

impl Chip8Conf {
    pub fn key_wait_timeout(&self) -> Option<Duration> {
        self.key_wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Chip8Result<()> {
        if self.timer_frequency.0 == 0 {
            return Err(Chip8Error::Config(
                "timer frequency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Clonable handle that stops [`Chip8Vm::execute`] from another thread.
///
/// Triggering also cancels a pending key wait.
#[derive(Clone)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    input: Arc<dyn InputPort>,
}

impl Interrupt {
    fn new(input: Arc<dyn InputPort>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            input,
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
        self.input.cancel_wait();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Consume the interrupt signal.
    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Interpreter
impl Chip8Vm {
    /// Clear internal state in preparation for a fresh startup.
    fn reset(&mut self) {
        self.cpu.reset();
        if let Some(clock) = self.clock.as_mut() {
            clock.reset();
        }
    }

    /// Run until interrupted, or until an error occurs.
    pub fn execute(&mut self) -> Chip8Result<Flow> {
        loop {
            if let Flow::Interrupt = self.tick()? {
                return Ok(Flow::Interrupt);
            }
        }
    }

    /// Run at most `step_count` steps, stopping early when interrupted.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.tick()?;
            if flow == Flow::Interrupt {
                break;
            }
        }

        Ok(flow)
    }

    /// Execute a single instruction.
    pub fn tick(&mut self) -> Result<Flow, Chip8Error> {
        match self.step() {
            Flow::Error => Err(self
                .cpu
                .error
                .take()
                .unwrap_or(Chip8Error::Runtime("unspecified VM error"))),
            flow => Ok(flow),
        }
    }

    fn step(&mut self) -> Flow {
        if std::mem::take(&mut self.cpu.trap) | self.interrupt.take() {
            // Interrupt signal is set.
            return Flow::Interrupt;
        }

        if let Some(clock) = self.clock.as_mut() {
            clock.wait();
        }

        let word = match self.cpu.fetch() {
            Ok(word) => word,
            Err(err) => {
                self.cpu.set_error(err);
                return Flow::Error;
            }
        };
        let op = Op::decode(word);

        op_trace(self.cpu.pc, op);

        self.cpu.pc += 2;

        match self.exec(op) {
            Ok(flow) => flow,
            Err(err) => {
                self.cpu.set_error(err);
                Flow::Error
            }
        }
    }

    /// Execute a decoded instruction.
    ///
    /// The program counter must already point past the instruction.
    fn exec(&mut self, op: Op) -> Chip8Result<Flow> {
        let cpu = &mut self.cpu;
        let v = &mut cpu.registers;

        let mut control_flow = Flow::Ok;

        match op {
            // 00E0 (CLS)
            //
            // Clear display
            Op::Cls => {
                cpu.display.clear();
                self.render.draw(cpu.display.pixels());
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Subtract 1 from the stack pointer.
            // Set the program counter to the value at the top of the stack.
            Op::Ret => {
                cpu.pc = cpu.pop()? as usize;
                control_flow = Flow::Jump;
            }
            // 1nnn (JP addr)
            //
            // Jump to address.
            Op::Jp(nnn) => {
                cpu.pc = nnn as usize;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at NNN.
            // The return address is the instruction following the call.
            Op::Call(nnn) => {
                cpu.push(cpu.pc as Address)?;
                cpu.pc = nnn as usize;
                control_flow = Flow::Jump;
            }
            // 3xkk (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            Op::SeImm(vx, kk) => {
                if v[vx as usize] == kk {
                    cpu.pc += 2;
                }
            }
            // 4xkk (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            Op::SneImm(vx, kk) => {
                if v[vx as usize] != kk {
                    cpu.pc += 2;
                }
            }
            // 5xy0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            Op::SeReg(vx, vy) => {
                if v[vx as usize] == v[vy as usize] {
                    cpu.pc += 2;
                }
            }
            // 6xkk (LD Vx, byte)
            //
            // Set register VX to value NN.
            Op::LdImm(vx, kk) => {
                v[vx as usize] = kk;
            }
            // 7xkk (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            Op::AddImm(vx, kk) => {
                v[vx as usize] = v[vx as usize].wrapping_add(kk);
            }
            // 8xy0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            Op::LdReg(vx, vy) => {
                v[vx as usize] = v[vy as usize];
            }
            // 8xy1 (OR Vx, Vy)
            Op::Or(vx, vy) => {
                v[vx as usize] |= v[vy as usize];
            }
            // 8xy2 (AND Vx, Vy)
            Op::And(vx, vy) => {
                v[vx as usize] &= v[vy as usize];
            }
            // 8xy3 (XOR Vx, Vy)
            Op::Xor(vx, vy) => {
                v[vx as usize] ^= v[vy as usize];
            }
            // 8xy4 (ADD Vx, Vy)
            //
            // ADDs VX to VY, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            Op::AddReg(vx, vy) => {
                let (result, carry) = v[vx as usize].overflowing_add(v[vy as usize]);
                v[vx as usize] = result;
                v[FLAG_REGISTER] = carry as u8;
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub(vx, vy) => {
                let (x, y) = (v[vx as usize], v[vy as usize]);
                v[vx as usize] = x.wrapping_sub(y);
                v[FLAG_REGISTER] = (x >= y) as u8;
            }
            // 8xy6 (SHR Vx {, Vy})
            //
            // VF is set to the least-significant bit before the shift.
            Op::Shr(vx, vy) => {
                let src = if self.conf.shift_vy { vy } else { vx };
                let x = v[src as usize];
                v[vx as usize] = x >> 1;
                v[FLAG_REGISTER] = x & 1;
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Subn(vx, vy) => {
                let (x, y) = (v[vx as usize], v[vy as usize]);
                v[vx as usize] = y.wrapping_sub(x);
                v[FLAG_REGISTER] = (y >= x) as u8;
            }
            // 8xyE (SHL Vx {, Vy})
            //
            // VF is set to the most-significant bit before the shift.
            Op::Shl(vx, vy) => {
                let src = if self.conf.shift_vy { vy } else { vx };
                let x = v[src as usize];
                v[vx as usize] = x << 1;
                v[FLAG_REGISTER] = (x >> 7) & 1;
            }
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            Op::SneReg(vx, vy) => {
                if v[vx as usize] != v[vy as usize] {
                    cpu.pc += 2;
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            Op::LdI(nnn) => {
                cpu.address = nnn;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to address NNN offset by V0.
            Op::JpV0(nnn) => {
                cpu.pc = nnn as usize + v[0] as usize;
                control_flow = Flow::Jump;
            }
            // Cxkk (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and NN.
            Op::Rnd(vx, kk) => {
                v[vx as usize] = kk & self.rng.gen::<u8>();
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
            // Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
            // memory pointed to by address register I.
            //
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            Op::Drw(vx, vy, n) => {
                let (x, y) = (v[vx as usize] as usize, v[vy as usize] as usize);
                let sprite = cpu.ram.slice(cpu.address as usize, n as usize)?;

                v[FLAG_REGISTER] = 0;
                let is_erased = cpu.display.draw_sprite(x, y, sprite);
                v[FLAG_REGISTER] = is_erased as u8;

                self.render.draw(cpu.display.pixels());
                control_flow = Flow::Draw;
            }
            // Ex9E (SKP Vx)
            //
            // Skip next instruction if the key with the value of Vx is down.
            Op::Skp(vx) => {
                if is_key_down(&*self.input, v[vx as usize]) {
                    cpu.pc += 2;
                }
            }
            // ExA1 (SKNP Vx)
            //
            // Skip next instruction if the key with the value of Vx is up.
            Op::Sknp(vx) => {
                if !is_key_down(&*self.input, v[vx as usize]) {
                    cpu.pc += 2;
                }
            }
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            Op::LdVxDt(vx) => {
                v[vx as usize] = cpu.timers.delay();
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // The wait is bounded, so the outer loop stays responsive.
            Op::LdVxK(vx) => match self.input.wait_for_key_press(self.conf.key_wait_timeout()) {
                KeyWait::Pressed(key) => {
                    v[vx as usize] = key.as_u8();
                }
                KeyWait::TimedOut => {
                    // rewind the program counter to stall the machine
                    cpu.pc -= 2;
                    control_flow = Flow::KeyWait;
                }
                KeyWait::Cancelled => {
                    cpu.pc -= 2;
                    // A cancel left over from an interrupt that was already
                    // handled is only a spurious wakeup.
                    control_flow = if self.interrupt.take() {
                        Flow::Interrupt
                    } else {
                        Flow::KeyWait
                    };
                }
            },
            // Fx15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            Op::LdDtVx(vx) => {
                cpu.timers.set_delay(v[vx as usize]);
            }
            // Fx18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            Op::LdStVx(vx) => {
                cpu.timers.set_sound(v[vx as usize]);
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I
            Op::AddI(vx) => {
                cpu.address = cpu.address.wrapping_add(v[vx as usize] as Address);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::LdF(vx) => {
                cpu.address = FONTSET_START + v[vx as usize] as Address * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            Op::LdB(vx) => {
                let addr = cpu.address as usize;
                let x = v[vx as usize];
                cpu.ram.slice(addr, 3)?;
                cpu.ram.write_byte(addr,     x / 100 % 10)?;
                cpu.ram.write_byte(addr + 1, x / 10  % 10)?;
                cpu.ram.write_byte(addr + 2, x       % 10)?;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            Op::StoreRegs(vx) => {
                let addr = cpu.address as usize;
                cpu.ram.slice(addr, vx as usize + 1)?;
                for (i, x) in v[0..=vx as usize].iter().enumerate() {
                    cpu.ram.write_byte(addr + i, *x)?;
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            Op::LoadRegs(vx) => {
                let data = cpu.ram.slice(cpu.address as usize, vx as usize + 1)?;
                v[0..=vx as usize].copy_from_slice(data);
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            Op::Unknown(word) => {
                log::warn!("unknown opcode {:04X} at {:04X}, skipped", word, cpu.pc - 2);
                control_flow = Flow::Unknown(word);
            }
        }

        Ok(control_flow)
    }
}

/// Keypad query for a register value. Values outside the
/// keypad range are never pressed.
#[inline]
fn is_key_down(input: &dyn InputPort, value: u8) -> bool {
    match KeyCode::try_from(value) {
        Ok(key) => input.is_pressed(key),
        Err(_) => {
            log::debug!("key query for invalid keycode {value:02X}");
            false
        }
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the loaded program as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, std::fmt::Error> {
        self.cpu.ram.dump_rom(count)
    }

    pub fn dump_display(&self) -> Result<String, std::fmt::Error> {
        self.cpu.display.dump()
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(pc: usize, op: Op) {
    log::trace!("{:04X}: {}", pc, op);
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: usize, _: Op) {}
