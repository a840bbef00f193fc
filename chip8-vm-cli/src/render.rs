//! Terminal output.
use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use chip8_vm::{constants::*, prelude::*};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

const PIXEL_ON: &str = "██";
const PIXEL_OFF: &str = "  ";

/// Latest display buffer, waiting to be presented.
struct Frame {
    pixels: [bool; DISPLAY_BUFFER_SIZE],
    dirty: bool,
}

type SharedFrame = Arc<Mutex<Frame>>;

fn lock(frame: &SharedFrame) -> MutexGuard<'_, Frame> {
    frame.lock().unwrap_or_else(|err| err.into_inner())
}

/// Render sink handed to the VM. It only records the latest frame,
/// the paired [`Presenter`] writes it out.
pub struct TerminalRender {
    frame: SharedFrame,
}

/// Writes the most recent frame to the terminal, two characters per
/// pixel so the output keeps roughly the right aspect ratio.
pub struct Presenter<W: Write> {
    frame: SharedFrame,
    out: W,
    cleared: bool,
    line: String,
}

pub fn terminal_render<W: Write>(out: W) -> (TerminalRender, Presenter<W>) {
    let frame = Arc::new(Mutex::new(Frame {
        pixels: [false; DISPLAY_BUFFER_SIZE],
        dirty: false,
    }));

    let render = TerminalRender {
        frame: frame.clone(),
    };
    let presenter = Presenter {
        frame,
        out,
        cleared: false,
        line: String::with_capacity(DISPLAY_WIDTH * PIXEL_ON.len()),
    };

    (render, presenter)
}

impl Render for TerminalRender {
    fn draw(&mut self, display: &[bool; DISPLAY_BUFFER_SIZE]) {
        let mut frame = lock(&self.frame);
        frame.pixels.copy_from_slice(display);
        frame.dirty = true;
    }
}

impl<W: Write> Presenter<W> {
    /// Write the latest frame if it changed since the previous call.
    ///
    /// Returns whether anything was written.
    pub fn present(&mut self) -> io::Result<bool> {
        let pixels = {
            let mut frame = lock(&self.frame);
            if !frame.dirty {
                return Ok(false);
            }
            frame.dirty = false;
            frame.pixels
        };

        if !self.cleared {
            queue!(self.out, Clear(ClearType::All))?;
            self.cleared = true;
        }

        for (y, row) in pixels.chunks(DISPLAY_WIDTH).enumerate() {
            self.line.clear();
            for px in row {
                self.line.push_str(if *px { PIXEL_ON } else { PIXEL_OFF });
            }
            queue!(self.out, MoveTo(0, y as u16), Print(&self.line))?;
        }
        self.out.flush()?;

        Ok(true)
    }
}
