//! Main memory.
use std::{fmt::Write as FmtWrite, fs, path::Path};

use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Flat 4KiB address space.
///
/// The digit font lives at the bottom of memory, and programs are loaded
/// at `MEM_START`. Every access is bounds checked against `MEM_SIZE`.
pub struct Memory {
    ram: Box<[u8; MEM_SIZE]>,
    /// Number of bytes in the most recently loaded program.
    rom_size: usize,
}

impl Default for Memory {
    fn default() -> Self {
        let mut memory = Self {
            ram: Box::new([0; MEM_SIZE]),
            rom_size: 0,
        };
        memory.load_font(&FONTSET);
        memory
    }
}

impl Memory {
    /// Creates zeroed memory with the built in font loaded.
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn read_byte(&self, address: usize) -> Chip8Result<u8> {
        self.ram
            .get(address)
            .copied()
            .ok_or(Chip8Error::OutOfBounds { address })
    }

    #[inline]
    pub fn write_byte(&mut self, address: usize, value: u8) -> Chip8Result<()> {
        match self.ram.get_mut(address) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Chip8Error::OutOfBounds { address }),
        }
    }

    /// Read a big-endian 16-bit word from `address` and `address + 1`.
    #[inline]
    pub fn read_word(&self, address: usize) -> Chip8Result<u16> {
        let hi = self.read_byte(address)?;
        let lo = self.read_byte(address + 1)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Borrow `len` bytes starting at `address`.
    ///
    /// Fails when any byte of the range falls outside of memory.
    pub fn slice(&self, address: usize, len: usize) -> Chip8Result<&[u8]> {
        let end = address + len;
        if end > MEM_SIZE {
            return Err(Chip8Error::OutOfBounds {
                address: address.max(MEM_SIZE),
            });
        }
        Ok(&self.ram[address..end])
    }

    pub fn load_font(&mut self, fontset: &[u8; FONTSET_DATA_LENGTH]) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(fontset);
    }

    /// Copy the program into memory at `MEM_START`.
    ///
    /// The previous program area is erased first, so a shorter program
    /// does not leave behind trailing bytes of the last one.
    pub fn load_rom(&mut self, rom: &[u8]) -> Chip8Result<()> {
        if rom.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::LargeProgram { size: rom.len() });
        }

        self.ram[MEM_START..].fill(0);
        self.ram[MEM_START..MEM_START + rom.len()].copy_from_slice(rom);
        self.rom_size = rom.len();

        log::debug!("loaded rom of {} bytes", self.rom_size);

        Ok(())
    }

    /// Read a ROM file and load it.
    ///
    /// Memory is left untouched when the file can't be read.
    pub fn load_rom_file(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let rom = fs::read(filepath.as_ref())?;
        self.load_rom(&rom)
    }

    #[inline]
    pub fn rom_size(&self) -> usize {
        self.rom_size
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.ram[..]
    }

    /// Returns the loaded program as a human readable listing of words.
    pub fn dump_rom(&self, count: usize) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        let end = (MEM_START + count).min(MEM_SIZE - 1);

        for i in (MEM_START..end).step_by(2) {
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, self.ram[i], self.ram[i + 1])?;
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_font_loaded() {
        let memory = Memory::new();
        assert_eq!(&memory.as_slice()[0..FONTSET_DATA_LENGTH], &FONTSET[..]);
        assert!(memory.as_slice()[FONTSET_DATA_LENGTH..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_load_rom() {
        let mut memory = Memory::new();
        let rom = [0x00, 0xE0, 0x12, 0x00, 0xAB];
        memory.load_rom(&rom).unwrap();

        assert_eq!(memory.rom_size(), rom.len());
        assert_eq!(&memory.as_slice()[MEM_START..MEM_START + rom.len()], &rom);
        // Font is independent of the program.
        assert_eq!(&memory.as_slice()[0..FONTSET_DATA_LENGTH], &FONTSET[..]);
    }

    #[test]
    fn test_reload_clears_previous_rom() {
        let mut memory = Memory::new();
        memory.load_rom(&[0xFF; 8]).unwrap();
        memory.load_rom(&[0x11, 0x22]).unwrap();

        assert_eq!(memory.rom_size(), 2);
        assert_eq!(memory.read_byte(MEM_START + 2).unwrap(), 0);
    }

    #[test]
    fn test_large_program() {
        let mut memory = Memory::new();
        let fits = vec![0x1; MAX_PROGRAM_SIZE];
        assert!(memory.load_rom(&fits).is_ok());
        assert_eq!(memory.read_byte(MEM_SIZE - 1).unwrap(), 0x1);

        let rom = vec![0x2; MAX_PROGRAM_SIZE + 1];
        assert!(matches!(
            memory.load_rom(&rom),
            Err(Chip8Error::LargeProgram { size }) if size == MAX_PROGRAM_SIZE + 1
        ));
        // Untouched on failure.
        assert_eq!(memory.read_byte(MEM_START).unwrap(), 0x1);
    }

    #[test]
    fn test_missing_rom_file() {
        let mut memory = Memory::new();
        memory.load_rom(&[0x12, 0x34]).unwrap();

        let result = memory.load_rom_file("this/rom/does/not/exist.ch8");
        assert!(matches!(result, Err(Chip8Error::Io(_))));
        assert_eq!(memory.rom_size(), 2);
        assert_eq!(memory.read_word(MEM_START).unwrap(), 0x1234);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut memory = Memory::new();

        assert!(memory.write_byte(0xFFF, 0x42).is_ok());
        assert_eq!(memory.read_byte(0xFFF).unwrap(), 0x42);

        assert!(matches!(
            memory.read_byte(0x1000),
            Err(Chip8Error::OutOfBounds { address: 0x1000 })
        ));
        assert!(matches!(
            memory.write_byte(0x1234, 1),
            Err(Chip8Error::OutOfBounds { address: 0x1234 })
        ));
        assert!(matches!(
            memory.read_word(0xFFF),
            Err(Chip8Error::OutOfBounds { address: 0x1000 })
        ));
        assert!(memory.slice(0xFFE, 2).is_ok());
        assert!(memory.slice(0xFFE, 3).is_err());
    }

    #[test]
    fn test_read_word_big_endian() {
        let mut memory = Memory::new();
        memory.load_rom(&[0xA2, 0x1E]).unwrap();
        assert_eq!(memory.read_word(MEM_START).unwrap(), 0xA21E);
    }
}
