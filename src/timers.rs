/// The two independent countdown timers.
///
/// Both are decremented by at most one per `cycle` invocation, never per
/// instruction, and floor at zero. A nonzero sound timer is a signal for
/// the host's audio device; the machine produces no sound itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    pub(crate) delay: u8,
    pub(crate) sound: u8,
}

impl Timers {
    pub(crate) fn new() -> Self {
        Timers::default()
    }

    /// Decrement each nonzero counter by one.
    pub(crate) fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }
}
