/// Width of the CHIP-8 surface in pixels.
pub const WIDTH: usize = 64;
/// Height of the CHIP-8 surface in pixels.
pub const HEIGHT: usize = 32;

/// The monochrome surface the machine draws on.
///
/// The machine never owns a frame buffer of its own; the `Dxyn` draw
/// instruction XORs sprite bits into whatever the host passes in. Pixel
/// scaling, color and coordinate wrap-around are the implementor's
/// business; the machine hands over raw `Vx + column` / `Vy + row`
/// coordinates, which may run past the 64x32 surface.
pub trait Display {
    /// Turn every pixel off.
    fn clear(&mut self);

    /// XOR one sprite bit into the surface. Returns true when the pixel
    /// was lit and has now been toggled off, i.e. a collision.
    fn set_pixel(&mut self, x: usize, y: usize) -> bool;

    /// Present the last-drawn frame. Called once per machine cycle,
    /// whether or not anything was drawn.
    fn render(&mut self);
}
