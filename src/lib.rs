//! A CHIP-8 virtual machine core: the instruction decoder and executor,
//! the machine-state model (registers, memory, bounded call stack, timers)
//! and the cycle scheduler.
//!
//! The machine draws and reads keys through the [`Display`] and [`Input`]
//! traits; it owns no window, no frame buffer and no physical keyboard.
//! A host builds a [`Machine`], loads a program image, and then calls
//! [`Machine::cycle`] at whatever rate it wants the emulation to run -
//! each cycle executes a configured number of instructions, ticks the two
//! countdown timers once, and asks the display to present a frame.
//!
//! The `Fx0A` instruction suspends execution until the input device
//! reports a key press. While suspended, `cycle` executes nothing and the
//! timers hold still, but the display is still asked to render so the
//! last-drawn frame stays on screen.
use std::convert::TryFrom;
use std::sync::mpsc::{self, Receiver};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slog::{debug, info, warn, Logger};
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

mod config;
mod display;
mod error;
mod input;
mod memory;
mod op;
mod registers;
mod timers;

pub use crate::config::{Config, UnknownOpcodePolicy};
pub use crate::display::{Display, HEIGHT, WIDTH};
pub use crate::error::Error;
pub use crate::input::{Input, Key, KeyHandler};
pub use crate::op::Op;

use crate::memory::{Memory, ADDR_MASK, FONT_BASE, FONT_GLYPH_LEN};
use crate::registers::Registers;
use crate::timers::Timers;

/// The machine is either running or suspended by `Fx0A`, waiting for a
/// key press.
///
/// Suspension captures the destination register at the moment the
/// instruction executes, along with the receiving end of a one-shot
/// channel. The input device's callback sends the pressed key into that
/// channel, possibly from a thread other than the one driving `cycle`;
/// the register write and the flip back to `Running` both happen inside
/// `cycle`, at its read of this state, so the instruction loop never
/// observes a half-applied resume.
enum ExecState {
    Running,
    AwaitingKey { target: usize, resume: Receiver<Key> },
}

/// The CHIP-8 machine: memory, register file, timers, RNG and the
/// decode-execute engine, driven by a host loop through [`Machine::cycle`].
///
/// The display and input collaborators are borrowed per call rather than
/// owned; the machine's own state is exclusively its own.
pub struct Machine {
    memory: Memory,
    regs: Registers,
    timers: Timers,
    state: ExecState,
    rng: StdRng,
    config: Config,
    log: Logger,
}

impl Machine {
    /// Create a machine with the default [`Config`]. Pass `None` to get a
    /// terminal logger on stderr.
    pub fn new(logger: Option<Logger>) -> Self {
        Machine::with_config(Config::default(), logger)
    }

    /// Create a machine with an explicit configuration.
    pub fn with_config(config: Config, logger: Option<Logger>) -> Self {
        let log = logger.unwrap_or_else(default_logger);
        let mut machine = Machine {
            memory: Memory::new(),
            regs: Registers::new(),
            timers: Timers::new(),
            state: ExecState::Running,
            rng: StdRng::from_entropy(),
            config,
            log,
        };
        machine.initialize();
        machine
    }

    /// Reset the register file, timers and execution state, and place the
    /// font sprites at their fixed offset. Program bytes already in memory
    /// are left alone, so a host can re-run a loaded image from the top.
    pub fn initialize(&mut self) {
        self.regs.reset();
        self.timers = Timers::new();
        self.state = ExecState::Running;
        self.memory.load_font_set();
        info!(self.log, "machine initialized"; "pc" => self.regs.pc);
    }

    /// Copy a program image into memory at 0x200. An image that would run
    /// past the end of memory is rejected whole, leaving memory untouched.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), Error> {
        self.memory.load_image(image)?;
        info!(self.log, "program image loaded"; "bytes" => image.len());
        Ok(())
    }

    /// True while the sound timer is nonzero, i.e. while the host's audio
    /// device should be sounding its tone.
    pub fn sound_active(&self) -> bool {
        self.timers.sound > 0
    }

    /// Run one scheduler cycle: up to `config.speed` instructions, then
    /// one timer tick, then a render.
    ///
    /// A machine suspended on `Fx0A` executes nothing and holds its
    /// timers, but the display is still asked to render. A stack fault or
    /// (under the `Halt` policy) an unknown opcode stops the instruction
    /// loop and is returned after the render; the machine state up to the
    /// faulting instruction is intact.
    pub fn cycle(&mut self, display: &mut dyn Display, input: &mut dyn Input) -> Result<(), Error> {
        self.commit_pending_key();

        let mut result = Ok(());
        let mut executed = 0;
        while let ExecState::Running = self.state {
            if executed == self.config.speed {
                break;
            }
            if let Err(fault) = self.step(display, input) {
                result = Err(fault);
                break;
            }
            executed += 1;
        }

        if result.is_ok() {
            if let ExecState::Running = self.state {
                self.timers.tick();
            }
        }

        display.render();
        result
    }

    /// Complete a pending `Fx0A` suspension if the key press has arrived.
    /// This is the only place the suspended state is cleared, so the
    /// register write and the transition back to `Running` are one step
    /// as far as the instruction loop can tell.
    fn commit_pending_key(&mut self) {
        let received = match &self.state {
            ExecState::AwaitingKey { target, resume } => {
                resume.try_recv().ok().map(|key| (*target, key))
            }
            ExecState::Running => None,
        };
        if let Some((target, key)) = received {
            self.regs.v[target] = key as u8;
            self.state = ExecState::Running;
            debug!(self.log, "key wait resumed"; "key" => key as u8, "register" => target);
        }
    }

    /// Fetch, decode and execute exactly one instruction. The program
    /// counter moves past the word before dispatch; jump, call, return and
    /// the skip family overwrite or extend it during execution.
    fn step(&mut self, display: &mut dyn Display, input: &mut dyn Input) -> Result<(), Error> {
        let word = self.memory.read_word(self.regs.pc);
        self.regs.advance_pc();
        match Op::try_from(word) {
            Ok(op) => {
                debug!(self.log, "execute"; "op" => ?op, "pc" => self.regs.pc);
                self.execute(op, display, input)
            }
            Err(fault) => match self.config.unknown_opcode {
                UnknownOpcodePolicy::Halt => Err(fault),
                UnknownOpcodePolicy::Skip => {
                    warn!(self.log, "skipping unknown opcode"; "word" => format!("{:#06X}", word));
                    Ok(())
                }
            },
        }
    }

    /// Apply one decoded instruction to the machine state.
    fn execute(
        &mut self,
        op: Op,
        display: &mut dyn Display,
        input: &mut dyn Input,
    ) -> Result<(), Error> {
        match op {
            Op::Clear => display.clear(),
            Op::Return => {
                let addr = self.regs.pop()?;
                self.regs.jump(addr);
            }
            Op::Jump(nnn) => self.regs.jump(nnn),
            Op::Call(nnn) => {
                self.regs.push(self.regs.pc)?;
                self.regs.jump(nnn);
            }
            Op::SkipEqImm(x, kk) => {
                if self.regs.v[x as usize] == kk {
                    self.regs.advance_pc();
                }
            }
            Op::SkipNeImm(x, kk) => {
                if self.regs.v[x as usize] != kk {
                    self.regs.advance_pc();
                }
            }
            Op::SkipEqReg(x, y) => {
                if self.regs.v[x as usize] == self.regs.v[y as usize] {
                    self.regs.advance_pc();
                }
            }
            Op::LoadImm(x, kk) => self.regs.v[x as usize] = kk,
            Op::AddImm(x, kk) => {
                let x = x as usize;
                self.regs.v[x] = self.regs.v[x].wrapping_add(kk);
            }
            Op::Move(x, y) => self.regs.v[x as usize] = self.regs.v[y as usize],
            Op::Or(x, y) => self.regs.v[x as usize] |= self.regs.v[y as usize],
            Op::And(x, y) => self.regs.v[x as usize] &= self.regs.v[y as usize],
            Op::Xor(x, y) => self.regs.v[x as usize] ^= self.regs.v[y as usize],
            Op::Add(x, y) => {
                let (sum, carried) =
                    self.regs.v[x as usize].overflowing_add(self.regs.v[y as usize]);
                self.regs.set_flag(carried);
                self.regs.v[x as usize] = sum;
            }
            Op::Sub(x, y) => {
                let (lhs, rhs) = (self.regs.v[x as usize], self.regs.v[y as usize]);
                self.regs.set_flag(lhs > rhs);
                self.regs.v[x as usize] = lhs.wrapping_sub(rhs);
            }
            Op::ShiftRight(x) => {
                let value = self.regs.v[x as usize];
                self.regs.set_flag(value & 0x1 == 1);
                self.regs.v[x as usize] = value >> 1;
            }
            Op::SubFrom(x, y) => {
                let (lhs, rhs) = (self.regs.v[x as usize], self.regs.v[y as usize]);
                self.regs.set_flag(rhs > lhs);
                self.regs.v[x as usize] = rhs.wrapping_sub(lhs);
            }
            Op::ShiftLeft(x) => {
                let value = self.regs.v[x as usize];
                self.regs.set_flag(value >> 7 == 1);
                self.regs.v[x as usize] = value << 1;
            }
            Op::SkipNeReg(x, y) => {
                if self.regs.v[x as usize] != self.regs.v[y as usize] {
                    self.regs.advance_pc();
                }
            }
            Op::LoadIndex(nnn) => self.regs.i = nnn,
            Op::JumpOffset(nnn) => self.regs.jump(nnn + u16::from(self.regs.v[0])),
            Op::Random(x, kk) => self.regs.v[x as usize] = self.rng.gen::<u8>() & kk,
            Op::Draw(x, y, n) => {
                let origin_x = self.regs.v[x as usize] as usize;
                let origin_y = self.regs.v[y as usize] as usize;
                let mut collided = false;
                for row in 0..u16::from(n) {
                    let sprite = self.memory.read(self.regs.i.wrapping_add(row));
                    for col in 0..8 {
                        if (sprite >> (7 - col)) & 1 == 1 {
                            collided |= display.set_pixel(origin_x + col, origin_y + row as usize);
                        }
                    }
                }
                self.regs.set_flag(collided);
            }
            Op::SkipKeyPressed(x) => {
                if input.is_key_pressed(Key::from_nibble(self.regs.v[x as usize])) {
                    self.regs.advance_pc();
                }
            }
            Op::SkipKeyNotPressed(x) => {
                if !input.is_key_pressed(Key::from_nibble(self.regs.v[x as usize])) {
                    self.regs.advance_pc();
                }
            }
            Op::ReadDelay(x) => self.regs.v[x as usize] = self.timers.delay,
            Op::WaitKey(x) => {
                let (notify, resume) = mpsc::channel();
                input.on_next_key_press(Box::new(move |key| {
                    // the machine may be gone by the time the key arrives
                    let _ = notify.send(key);
                }));
                self.state = ExecState::AwaitingKey {
                    target: x as usize,
                    resume,
                };
                debug!(self.log, "suspended awaiting key press"; "register" => x);
            }
            Op::SetDelay(x) => self.timers.delay = self.regs.v[x as usize],
            Op::SetSound(x) => self.timers.sound = self.regs.v[x as usize],
            Op::AddIndex(x) => {
                self.regs.i = (self.regs.i + u16::from(self.regs.v[x as usize])) & ADDR_MASK;
            }
            Op::FontChar(x) => {
                let digit = u16::from(self.regs.v[x as usize] & 0x0F);
                self.regs.i = FONT_BASE + digit * FONT_GLYPH_LEN;
            }
            Op::Bcd(x) => {
                let value = self.regs.v[x as usize];
                self.memory.write(self.regs.i, value / 100);
                self.memory.write(self.regs.i.wrapping_add(1), (value / 10) % 10);
                self.memory.write(self.regs.i.wrapping_add(2), value % 10);
            }
            Op::StoreRegs(x) => {
                for offset in 0..=u16::from(x) {
                    self.memory
                        .write(self.regs.i.wrapping_add(offset), self.regs.v[offset as usize]);
                }
            }
            Op::LoadRegs(x) => {
                for offset in 0..=u16::from(x) {
                    self.regs.v[offset as usize] =
                        self.memory.read(self.regs.i.wrapping_add(offset));
                }
            }
        }
        Ok(())
    }
}

/// Terminal logger used when the host does not supply one.
fn default_logger() -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(Severity::Info);
    builder.destination(Destination::Stderr);
    builder.build().expect("terminal logger construction failed")
}
