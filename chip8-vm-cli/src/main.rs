//! Entrypoint for CLI
use std::{
    env,
    error::Error,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use chip8_vm::{prelude::*, IMPL_VERSION};
use log::{error, info};

mod conf;
mod error;
mod input;
mod keymap;
mod render;
mod term;

use self::{
    conf::CliConf, error::AppError, input::KeyboardInput, render::terminal_render,
    term::TerminalGuard,
};

static USAGE: &str = r#"
usage: chip8 FILE

Runs the target ROM file in the terminal.

The left side of the keyboard is laid over the keypad:

    1 2 3 4        1 2 3 C
    q w e r   ->   4 5 6 D
    a s d f        7 8 9 E
    z x c v        A 0 B F

Press Esc or Ctrl+C to stop the program.

environment:
    CHIP8_CONF    Path to a YAML config file
    RUST_LOG      Log level filter

examples:
    chip8 breakout.rom
    CHIP8_CONF=chip8.yaml chip8 breakout.rom
"#;

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    match parse_args() {
        Some(filepath) => {
            if let Err(err) = run(filepath) {
                error!("{err}");
                std::process::exit(1)
            }
        }
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn run(filepath: String) -> Result<(), AppError> {
    let conf = CliConf::from_env()?;
    let keypad = Arc::new(Keypad::new());
    let (render, mut presenter) = terminal_render(io::stdout());

    let mut vm = Chip8Vm::new(conf.vm.clone())
        .with_input(keypad.clone())
        .with_render(Box::new(render));
    vm.load_rom_file(&filepath)?;
    info!("loaded {filepath}");

    let timers = TimerDriver::spawn(vm.timers(), conf.vm.timer_frequency)?;
    let terminal = TerminalGuard::enter()?;
    let running = Arc::new(AtomicBool::new(true));

    let input = KeyboardInput::new(
        conf.keymap(),
        keypad,
        vm.interrupt_handle(),
        terminal.reports_release(),
    );
    let input_thread = {
        let running = running.clone();
        thread::Builder::new()
            .name("chip8-input".to_string())
            .spawn(move || input.run(&running))?
    };

    let frame_interval = Duration::from_millis(conf.frame_interval_ms);
    let present_thread = {
        let running = running.clone();
        thread::Builder::new()
            .name("chip8-present".to_string())
            .spawn(move || -> io::Result<()> {
                while running.load(Ordering::Acquire) {
                    presenter.present()?;
                    thread::sleep(frame_interval);
                }
                // Last frame drawn before the VM stopped.
                presenter.present()?;
                Ok(())
            })?
    };

    let start = Instant::now();
    let result = vm.execute();
    running.store(false, Ordering::Release);
    timers.stop();

    for (name, handle) in [("input", input_thread), ("present", present_thread)] {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("{name} thread failed: {err}"),
            Err(_) => error!("{name} thread panicked"),
        }
    }
    drop(terminal);

    info!(
        "stopped after {}ms",
        start.elapsed().as_nanos() as f64 / 1000000.0
    );

    result?;
    Ok(())
}

fn parse_args() -> Option<String> {
    env::args().nth(1)
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}
