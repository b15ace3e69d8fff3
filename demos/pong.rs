use device_query::{DeviceQuery, DeviceState, Keycode};
use habanero8::{Display, Input, Key, KeyHandler, Machine, HEIGHT, WIDTH};
use minifb::{ScaleMode, Window, WindowOptions};
use std::time::Duration;

const PIXEL_OFF: u32 = 0x0000_0000;
const PIXEL_ON: u32 = 0x00FF_FFFF;

/// A 64x32 frame buffer backing a minifb window. Sprite coordinates wrap
/// around the edges, XOR drawing and all, exactly as the machine's display
/// contract asks.
struct FrameBuffer {
    pixels: Vec<u32>,
    dirty: bool,
}

impl FrameBuffer {
    fn new() -> Self {
        FrameBuffer {
            pixels: vec![PIXEL_OFF; WIDTH * HEIGHT],
            dirty: true,
        }
    }
}

impl Display for FrameBuffer {
    fn clear(&mut self) {
        for pixel in self.pixels.iter_mut() {
            *pixel = PIXEL_OFF;
        }
        self.dirty = true;
    }

    fn set_pixel(&mut self, x: usize, y: usize) -> bool {
        let idx = (y % HEIGHT) * WIDTH + (x % WIDTH);
        let was_on = self.pixels[idx] == PIXEL_ON;
        self.pixels[idx] = if was_on { PIXEL_OFF } else { PIXEL_ON };
        self.dirty = true;
        was_on
    }

    fn render(&mut self) {
        // presentation happens in the window loop below
    }
}

/// The system keyboard as the machine's input device, polled through
/// device_query.
struct Keyboard {
    device: DeviceState,
    pending: Option<KeyHandler>,
}

impl Keyboard {
    fn new() -> Self {
        Keyboard {
            device: DeviceState::new(),
            pending: None,
        }
    }

    fn keys_down(&self) -> Vec<Key> {
        self.device.get_keys().iter().filter_map(map_key).collect()
    }

    /// Fire the one-shot wait-for-key handler once any keypad key is down.
    fn pump(&mut self) {
        if self.pending.is_none() {
            return;
        }
        if let Some(key) = self.keys_down().first().copied() {
            if let Some(handler) = self.pending.take() {
                handler(key);
            }
        }
    }
}

impl Input for Keyboard {
    fn is_key_pressed(&self, key: Key) -> bool {
        self.keys_down().contains(&key)
    }

    fn on_next_key_press(&mut self, handler: KeyHandler) {
        self.pending = Some(handler);
    }
}

/// We use the following mapping for the 16 key hex keypad
/// Keypad                   Keyboard
/// +-+-+-+-+                +-+-+-+-+
/// |1|2|3|C|                |1|2|3|4|
/// +-+-+-+-+                +-+-+-+-+
/// |4|5|6|D|                |Q|W|E|R|
/// +-+-+-+-+       =>       +-+-+-+-+
/// |7|8|9|E|                |A|S|D|F|
/// +-+-+-+-+                +-+-+-+-+
/// |A|0|B|F|                |Z|X|C|V|
/// +-+-+-+-+                +-+-+-+-+
fn map_key(key: &Keycode) -> Option<Key> {
    match key {
        Keycode::Key1 => Some(Key::Key1),
        Keycode::Key2 => Some(Key::Key2),
        Keycode::Key3 => Some(Key::Key3),
        Keycode::Key4 => Some(Key::C),
        Keycode::Q => Some(Key::Key4),
        Keycode::W => Some(Key::Key5),
        Keycode::E => Some(Key::Key6),
        Keycode::R => Some(Key::D),
        Keycode::A => Some(Key::Key7),
        Keycode::S => Some(Key::Key8),
        Keycode::D => Some(Key::Key9),
        Keycode::F => Some(Key::E),
        Keycode::Z => Some(Key::A),
        Keycode::X => Some(Key::Key0),
        Keycode::C => Some(Key::B),
        Keycode::V => Some(Key::F),
        _ => None,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut window: Window = Window::new(
        "CHIP-8 (habanero8)",
        WIDTH,
        HEIGHT,
        WindowOptions {
            resize: true,
            scale_mode: ScaleMode::UpperLeft,
            ..WindowOptions::default()
        },
    )
    .expect("unable to create window");

    // Limit to max update rate. This only needs about 60 Hz, which is 16ms
    window.limit_update_rate(Some(Duration::from_millis(16)));

    // create the machine and load the pong game file
    let mut machine = Machine::new(None);
    machine.load_image(&std::fs::read("games/PONG")?)?;

    let mut display = FrameBuffer::new();
    let mut keyboard = Keyboard::new();

    while window.is_open() {
        // complete a pending wait-for-key before running the cycle
        keyboard.pump();

        machine.cycle(&mut display, &mut keyboard)?;

        // present the frame if any draw changed it
        if display.dirty {
            window
                .update_with_buffer(&display.pixels, WIDTH, HEIGHT)
                .unwrap();
            display.dirty = false;
        } else {
            window.update();
        }
    }
    Ok(())
}
