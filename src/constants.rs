/// How many instructions the CPU executes per second by default.
/// The host can retune this at runtime; the timers are unaffected.
pub const CLOCK_SPEED: f64 = 500.0;

/// How many times per second the delay and sound timers count down.
pub const TIMER_SPEED: f64 = 60.0;

/// Addressable memory in bytes. Must be a power of two so that program
/// counter and index addressing can wrap with a mask.
pub const MEMORY_SIZE: usize = 4096;

/// Where programs are loaded into memory.
pub const PROGRAM_OFFSET: u16 = 0x200;

/// How many return addresses the call stack holds.
pub const STACK_DEPTH: usize = 16;

/// The host tick interval the scheduler is tuned for, in milliseconds.
/// Backlog clamping and turbo pacing are both derived from this.
pub const TICK_INTERVAL_MS: f64 = 10.0;

/// How many multiples of the ideal per-tick cycle count turbo mode runs.
pub const TURBO_MULTIPLIER: f64 = 3.0;

/// Bytes per glyph in the sprite sheet.
pub const SPRITE_HEIGHT: u16 = 5;

/// The hexadecimal font baked into the reserved low region of memory.
/// Each glyph is five bytes of row bitmaps, packed 0..F.
pub const SPRITE_SHEET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
