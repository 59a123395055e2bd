use std::io;

// HOST INTERFACE
// ================================================================================================

/// Everything the engine asks of its shell.
///
/// The engine owns all calculator state and calls out through this trait for the display, the
/// speaker, timing, entropy, and the byte channels used by state save/load and program
/// import/export. A shell implements the subset it cares about; the defaults are inert, so a
/// headless host (tests, conduits) only overrides the channels it uses.
pub trait Host {
    /// Paints a region of the 131×16 display. `bits` is the engine's packed row data; glyph
    /// rasterization and skinning are entirely the shell's concern.
    fn blitter(&mut self, bits: &[u8], bytes_per_line: usize, x: usize, y: usize, w: usize, h: usize) {
        let _ = (bits, bytes_per_line, x, y, w, h);
    }

    fn beeper(&mut self, frequency: u32, duration_ms: u32) {
        let _ = (frequency, duration_ms);
    }

    /// Annunciator update; each argument is 0/1, or −1 for "unchanged".
    fn annunciators(&mut self, updown: i8, shift: i8, print: i8, run: i8, g: i8, rad: i8) {
        let _ = (updown, shift, print, run, g, rad);
    }

    /// True when the shell has pending input and the engine should yield.
    fn wants_cpu(&mut self) -> bool {
        false
    }

    fn delay(&mut self, ms: u32) {
        let _ = ms;
    }

    /// Asks the shell to call `timeout3` after the given delay (PSE, flag-driven refresh).
    fn request_timeout3(&mut self, ms: u32) {
        let _ = ms;
    }

    /// Saved-state channel; `read` returns the number of bytes read (0 = EOF).
    fn read_saved_state(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = buf;
        Ok(0)
    }

    fn write_saved_state(&mut self, buf: &[u8]) -> io::Result<()> {
        let _ = buf;
        Ok(())
    }

    /// Free memory estimate, for the MEM catalog.
    fn get_mem(&mut self) -> u64 {
        u64::MAX
    }

    fn low_battery(&mut self) -> bool {
        false
    }

    /// The engine decided to power off (OFF command, suspicious OFF protection).
    fn powerdown(&mut self) {}

    /// Entropy for SEED with a zero argument.
    fn random_seed(&mut self) -> u64 {
        0
    }

    /// Monotonic-ish millisecond clock; wrap-around is tolerated.
    fn milliseconds(&mut self) -> u32 {
        0
    }

    /// (year, month, day, hour, minute, second, weekday).
    fn get_time_date(&mut self) -> (u32, u32, u32, u32, u32, u32, u32) {
        (2000, 1, 1, 0, 0, 0, 6)
    }

    /// Emits one printout row: `text` is the plain-text form, `bits` the dot graphics.
    fn print(&mut self, text: &[u8], bits: &[u8], bytes_per_line: usize, height: usize) {
        let _ = (text, bits, bytes_per_line, height);
    }

    /// Program import channel: returns bytes read, 0 at EOF.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = buf;
        Ok(0)
    }

    /// Program export channel.
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let _ = buf;
        Ok(())
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;
    impl Host for Inert {}

    #[test]
    fn defaults_are_inert() {
        let mut h = Inert;
        assert!(!h.wants_cpu());
        assert!(!h.low_battery());
        assert_eq!(h.read(&mut [0; 4]).unwrap(), 0);
        h.annunciators(-1, -1, -1, 1, -1, -1);
    }
}
