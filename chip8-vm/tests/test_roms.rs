use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use chip8_vm::{constants::*, prelude::*};

/// Renderer that counts how often it was asked to draw.
struct CountingRender(Arc<AtomicUsize>);

impl Render for CountingRender {
    fn draw(&mut self, _display: &[bool; DISPLAY_BUFFER_SIZE]) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_clear_then_spin() {
    const ROM: &[u8] = &[
        0x00, 0xE0, // CLS
        0x12, 0x02, // JP 202
    ];

    let draws = Arc::new(AtomicUsize::new(0));
    let mut vm =
        Chip8Vm::new(Chip8Conf::default()).with_render(Box::new(CountingRender(draws.clone())));
    vm.load_bytecode(ROM).unwrap();

    assert_eq!(vm.tick().unwrap(), Flow::Draw);
    let registers = *vm.cpu().registers();

    for _ in 0..1000 {
        assert_eq!(vm.tick().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu().pc(), MEM_START + 2);
    }

    assert_eq!(draws.load(Ordering::SeqCst), 1);
    assert_eq!(vm.cpu().registers(), &registers);
    assert!(vm.display_buffer().iter().all(|px| !*px));
}

#[test]
fn test_jump_to_self() {
    const ROM: &[u8] = &[0x00, 0xE0, 0x12, 0x00];

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(ROM).unwrap();

    // Loops over the clear and the jump at 0x200 indefinitely.
    vm.run_steps(101).unwrap();
    assert_eq!(vm.cpu().pc(), MEM_START + 2);
    vm.tick().unwrap();
    assert_eq!(vm.cpu().pc(), MEM_START);
    assert_eq!(vm.cpu().sp(), 0);
}

#[test]
fn test_program_counter_stays_even() {
    #[rustfmt::skip]
    const ROM: &[u8] = &[
        0x60, 0x00, // 200: LD V0, 0
        0x70, 0x01, // 202: ADD V0, 1
        0x30, 0x05, // 204: SE V0, 5
        0x12, 0x02, // 206: JP 202
        0x22, 0x0E, // 208: CALL 20E
        0x12, 0x00, // 20A: JP 200
        0x00, 0x00, // 20C: padding
        0x00, 0xEE, // 20E: RET
    ];

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(ROM).unwrap();

    for _ in 0..500 {
        vm.tick().unwrap();
        assert_eq!(vm.cpu().pc() % 2, 0);
        assert!(vm.cpu().sp() <= 1);
    }
}

#[test]
fn test_font_after_rom_load() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(&[0xFF; 64]).unwrap();

    let ram = vm.cpu().memory().as_slice();
    assert_eq!(&ram[0..FONTSET_DATA_LENGTH], &FONTSET[..]);
    assert_eq!(&ram[MEM_START..MEM_START + 64], &[0xFF; 64][..]);
    assert_eq!(vm.cpu().memory().rom_size(), 64);
}

#[test]
fn test_load_missing_rom() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(&[0x12, 0x00]).unwrap();

    let result = vm.load_rom_file("does/not/exist.ch8");
    assert!(matches!(result, Err(Chip8Error::Io(_))));
    assert_eq!(vm.cpu().memory().rom_size(), 2);
}

#[test]
fn test_load_rom_file() {
    let path = std::env::temp_dir().join(format!("chip8-vm-test-{}.ch8", std::process::id()));
    std::fs::write(&path, [0x6A, 0x07, 0x12, 0x02]).unwrap();

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    let result = vm.load_rom_file(&path);
    std::fs::remove_file(&path).unwrap();
    result.unwrap();

    vm.tick().unwrap();
    assert_eq!(vm.cpu().registers()[0xA], 0x07);
}

/// Delay loop polled by the interpreter while a separate thread
/// counts the timer down.
#[test]
fn test_delay_with_timer_driver() {
    #[rustfmt::skip]
    const ROM: &[u8] = &[
        0x60, 0x06, // 200: LD V0, 6
        0xF0, 0x15, // 202: LD DT, V0
        0xF1, 0x07, // 204: LD V1, DT
        0x31, 0x00, // 206: SE V1, 0
        0x12, 0x04, // 208: JP 204
        0x62, 0x01, // 20A: LD V2, 1
        0x12, 0x0C, // 20C: JP 20C
    ];

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(ROM).unwrap();

    let driver = TimerDriver::spawn(vm.timers(), Hz(1000)).unwrap();
    let interrupt = vm.interrupt_handle();

    let runner = thread::spawn(move || {
        let result = vm.execute();
        (vm, result)
    });

    thread::sleep(Duration::from_millis(200));
    interrupt.trigger();
    let (vm, result) = runner.join().unwrap();
    driver.stop();

    assert_eq!(result.unwrap(), Flow::Interrupt);
    assert_eq!(vm.cpu().registers()[2], 1);
    assert_eq!(vm.cpu().timers().delay(), 0);
}

/// The key wait blocks the interpreter thread only.
#[test]
fn test_key_wait_does_not_block_timers() {
    #[rustfmt::skip]
    const ROM: &[u8] = &[
        0x60, 0xFF, // 200: LD V0, FF
        0xF0, 0x15, // 202: LD DT, V0
        0xF3, 0x0A, // 204: LD V3, K
        0x12, 0x06, // 206: JP 206
    ];

    let keypad = Arc::new(Keypad::new());
    let mut vm = Chip8Vm::new(Chip8Conf {
        key_wait_timeout_ms: Some(10),
        ..Default::default()
    })
    .with_input(keypad.clone());
    vm.load_bytecode(ROM).unwrap();

    let timers = vm.timers();
    let driver = TimerDriver::spawn(timers.clone(), Hz(1000)).unwrap();
    let interrupt = vm.interrupt_handle();

    let runner = thread::spawn(move || {
        let result = vm.execute();
        (vm, result)
    });

    thread::sleep(Duration::from_millis(100));
    assert!(timers.delay() < 0xFF);

    keypad.press(KeyCode::KeyE);
    thread::sleep(Duration::from_millis(50));
    interrupt.trigger();

    let (vm, result) = runner.join().unwrap();
    driver.stop();

    assert_eq!(result.unwrap(), Flow::Interrupt);
    assert_eq!(vm.cpu().registers()[3], 0xE);
    assert_eq!(vm.cpu().pc(), 0x206);
}

#[test]
fn test_runtime_error_surfaces() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(&[0x00, 0xEE]).unwrap();

    let err = vm.execute().unwrap_err();
    assert!(matches!(err, Chip8Error::StackUnderflow));
    assert_eq!(err.to_string(), "call stack underflow");
}
