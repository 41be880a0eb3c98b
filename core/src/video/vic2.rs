//! MOS 6569 (VIC-II, PAL-B) video controller.
//!
//! A [`Device`] for its 47-register MMIO window and a [`Clockable`] stepped
//! once per pixel clock (8 pixels painted per cycle, 63 cycles per
//! scanline, 312 scanlines per frame). Raster timing, bad-line/BA
//! arbitration, and the collision model follow the cycle list enumerated
//! for this chip; register bit layout matches the MMIO table for this chip.
//!
//! The raster-compare-at-cycle-0/1 behavior some references document is
//! intentionally not implemented here: this chip only compares at cycle 10.
//! That is a known, deliberate deviation — see `DESIGN.md`.

use std::cell::Cell;
use std::rc::Rc;

use crate::bus::AddressSpace;
use crate::clock::Clockable;
use crate::device::{Device, ReadMode};
use crate::types::{Rgba, RgbaTable};

pub const CYCLES_PER_LINE: u32 = 63;
pub const RASTER_LINES: u32 = 312;
pub const PIXELS_PER_CYCLE: usize = 8;
/// Full raster width in pixels, border included. The scanline buffer handed
/// to the line renderer is this wide; cropping to the visible area is the
/// renderer's job, same as real composite video carries the border out.
pub const RASTER_WIDTH: usize = CYCLES_PER_LINE as usize * PIXELS_PER_CYCLE;

const FIRST_DMA_LINE: u32 = 0x30;
const LAST_DMA_LINE: u32 = 0xF7;
const DISPLAY_Y_START: u32 = 0x33;
const DISPLAY_Y_END: u32 = 0xFB;

const IRQ_RASTER: u8 = 1 << 0;
const IRQ_MMCOL: u8 = 1 << 1;
const IRQ_MDCOL: u8 = 1 << 2;
const IRQ_LIGHTPEN: u8 = 1 << 3;

/// ECM.BMM.MCM as a 3-bit tuple, matching the register layout directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DisplayMode {
    TextStandard,
    TextMulticolor,
    TextExtendedColor,
    BitmapStandard,
    BitmapMulticolor,
    Invalid,
}

impl DisplayMode {
    fn from_bits(ecm: bool, bmm: bool, mcm: bool) -> Self {
        match (ecm, bmm, mcm) {
            (false, false, false) => DisplayMode::TextStandard,
            (false, false, true) => DisplayMode::TextMulticolor,
            (true, false, false) => DisplayMode::TextExtendedColor,
            (false, true, false) => DisplayMode::BitmapStandard,
            (false, true, true) => DisplayMode::BitmapMulticolor,
            _ => DisplayMode::Invalid,
        }
    }
}

struct Sprite {
    x: u16,
    y: u8,
    data: [u8; 3],
    mc: u8,
    expand_y_toggle: bool,
}

impl Sprite {
    fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            data: [0; 3],
            mc: 0,
            expand_y_toggle: false,
        }
    }
}

/// Invoked on every transition of the IRQ or BA pin.
pub type LineCallback = Box<dyn FnMut(u32, &[Rgba])>;
pub type PinCallback = Box<dyn FnMut(bool)>;

pub struct Vic2 {
    regs: [u8; 0x2F],
    color_ram: [u8; 1000],
    video_bus: Rc<AddressSpace>,
    palette: Rc<RgbaTable>,

    raster_counter: u16,
    cycle: u32,
    row_counter: u8,
    /// Char-row pixel-line base: 0 at the top of the frame, `+= 8` at the end
    /// of each character row. Added to `row_counter` to get the absolute
    /// scanline within video matrix space; never increments per column.
    video_counter: u16,
    bad_line: bool,
    bl_den_armed: bool,
    idle_mode: bool,
    main_border: bool,
    vertical_border: bool,
    ba_low: bool,

    sprites: [Sprite; 8],
    mm_collision: u8,
    md_collision: u8,

    scanline: [Rgba; RASTER_WIDTH],
    bg_opaque: [bool; RASTER_WIDTH],

    irq_status: u8,
    irq_enable: u8,

    line_cb: Option<LineCallback>,
    irq_cb: Option<PinCallback>,
    ba_cb: Option<PinCallback>,

    /// Exposed so a CIA2-style port-A bank select can be wired externally;
    /// this chip only consumes it, never writes it.
    pub bank_base: Cell<u16>,
}

impl Vic2 {
    pub fn new(video_bus: Rc<AddressSpace>, palette: Rc<RgbaTable>) -> Self {
        Self {
            regs: [0; 0x2F],
            color_ram: [0; 1000],
            video_bus,
            palette,
            raster_counter: 0,
            cycle: 0,
            row_counter: 0,
            video_counter: 0,
            bad_line: false,
            bl_den_armed: false,
            idle_mode: false,
            main_border: false,
            vertical_border: false,
            ba_low: false,
            sprites: [
                Sprite::new(), Sprite::new(), Sprite::new(), Sprite::new(),
                Sprite::new(), Sprite::new(), Sprite::new(), Sprite::new(),
            ],
            mm_collision: 0,
            md_collision: 0,
            scanline: [Rgba::default(); RASTER_WIDTH],
            bg_opaque: [false; RASTER_WIDTH],
            irq_status: 0,
            irq_enable: 0,
            line_cb: None,
            irq_cb: None,
            ba_cb: None,
            bank_base: Cell::new(0),
        }
    }

    pub fn set_line_callback(&mut self, cb: LineCallback) {
        self.line_cb = Some(cb);
    }
    pub fn set_irq_callback(&mut self, cb: PinCallback) {
        self.irq_cb = Some(cb);
    }
    pub fn set_ba_callback(&mut self, cb: PinCallback) {
        self.ba_cb = Some(cb);
    }

    pub fn raster_counter(&self) -> u16 {
        self.raster_counter
    }

    // --- Register decode helpers ---

    fn den(&self) -> bool {
        self.regs[0x11] & 0x10 != 0
    }
    fn rsel(&self) -> bool {
        self.regs[0x11] & 0x08 != 0
    }
    fn yscroll(&self) -> u8 {
        self.regs[0x11] & 0x07
    }
    fn ecm(&self) -> bool {
        self.regs[0x11] & 0x40 != 0
    }
    fn bmm(&self) -> bool {
        self.regs[0x11] & 0x20 != 0
    }
    fn csel(&self) -> bool {
        self.regs[0x16] & 0x08 != 0
    }
    fn xscroll(&self) -> u8 {
        self.regs[0x16] & 0x07
    }
    fn mcm(&self) -> bool {
        self.regs[0x16] & 0x10 != 0
    }
    fn display_mode(&self) -> DisplayMode {
        DisplayMode::from_bits(self.ecm(), self.bmm(), self.mcm())
    }
    fn video_matrix_base(&self) -> u16 {
        ((self.regs[0x18] as u16 & 0xF0) >> 4) << 10
    }
    fn char_base(&self) -> u16 {
        ((self.regs[0x18] as u16 & 0x0E) >> 1) << 10
    }
    fn bitmap_base(&self) -> u16 {
        ((self.regs[0x18] as u16 & 0x08) >> 3) << 13
    }
    fn raster_compare(&self) -> u16 {
        (self.regs[0x12] as u16) | (((self.regs[0x11] as u16 & 0x80) >> 7) << 8)
    }
    fn sprite_enable(&self) -> u8 {
        self.regs[0x15]
    }
    fn sprite_expand_y(&self) -> u8 {
        self.regs[0x17]
    }
    fn sprite_expand_x(&self) -> u8 {
        self.regs[0x1D]
    }
    fn sprite_multicolor_sel(&self) -> u8 {
        self.regs[0x1C]
    }
    fn sprite_priority(&self) -> u8 {
        self.regs[0x1B]
    }
    fn border_color(&self) -> u8 {
        self.regs[0x20] & 0x0F
    }
    fn background_color(&self, n: usize) -> u8 {
        self.regs[0x21 + n] & 0x0F
    }
    fn sprite_multicolor(&self, n: usize) -> u8 {
        self.regs[0x25 + n] & 0x0F
    }
    fn sprite_color(&self, i: usize) -> u8 {
        self.regs[0x27 + i] & 0x0F
    }
    fn color(&self, index: u8) -> Rgba {
        self.palette.get(index as usize).unwrap_or_default()
    }

    fn set_irq(&mut self, bit: u8) {
        let was_asserted = (self.irq_status & self.irq_enable & 0x0F) != 0;
        self.irq_status |= bit;
        let now_asserted = (self.irq_status & self.irq_enable & 0x0F) != 0;
        if now_asserted && !was_asserted {
            if let Some(cb) = self.irq_cb.as_mut() {
                cb(true);
            }
        }
    }

    fn set_ba(&mut self, low: bool) {
        if low != self.ba_low {
            self.ba_low = low;
            if let Some(cb) = self.ba_cb.as_mut() {
                cb(!low);
            }
        }
    }

    // --- Cycle 0 / frame edge handling ---

    fn start_of_line(&mut self) {
        self.raster_counter = if self.raster_counter + 1 >= RASTER_LINES as u16 {
            0
        } else {
            self.raster_counter + 1
        };
        if self.raster_counter == 0 {
            self.bl_den_armed = false;
            self.video_counter = 0;
        }
        if self.raster_counter as u32 == DISPLAY_Y_START && self.den() {
            self.bl_den_armed = true;
        }
        let in_display = (self.raster_counter as u32) >= FIRST_DMA_LINE
            && (self.raster_counter as u32) <= LAST_DMA_LINE;
        let was_bad = self.bad_line;
        self.bad_line = self.bl_den_armed && in_display && (self.raster_counter as u32 & 7) == self.yscroll() as u32;
        if self.bad_line && !was_bad {
            self.set_ba(true);
        }
        if self.raster_counter as u32 == DISPLAY_Y_END + 1 {
            self.vertical_border = true;
        }
    }

    fn check_raster_irq(&mut self) {
        if self.raster_counter == self.raster_compare() {
            self.set_irq(IRQ_RASTER);
        }
    }

    // --- Device bitmap fetch for display modes ---

    fn read_video(&self, addr: u16) -> u8 {
        self.video_bus.peek(addr)
    }

    /// Byte fetch + 4-bit palette index per pixel, for the single byte at
    /// `col` (0..39) of the current raster line.
    fn paint_display_byte(&mut self, col: u32) {
        let base_x = 16 + col as usize * 8;
        let row = self.row_counter as u16;
        // dline is the absolute scanline within video matrix space; video_counter
        // is the char-row base (a multiple of 8), so dline >> 3 is the char row
        // and dline & 7 == row_counter is the fine line within it.
        let dline = self.video_counter.wrapping_add(row);
        let char_row = dline >> 3;
        let vmc = char_row.wrapping_mul(40).wrapping_add(col as u16);
        let screen_code_addr = self.video_matrix_base() + vmc;
        let screen_code = if self.idle_mode { 0 } else { self.read_video(screen_code_addr) };
        let color_nibble = if self.idle_mode { 0 } else { self.color_ram[(vmc & 0x3FF) as usize] & 0x0F };
        let pixels: [u8; 8] = match self.display_mode() {
            DisplayMode::Invalid => [0; 8],
            DisplayMode::TextStandard => {
                let byte = self.read_video(self.char_base() + (screen_code as u16) * 8 + row);
                let fg = color_nibble;
                let mut out = [0u8; 8];
                for (i, o) in out.iter_mut().enumerate() {
                    *o = if byte & (0x80 >> i) != 0 { fg } else { self.background_color(0) };
                }
                out
            }
            DisplayMode::TextMulticolor => {
                let byte = self.read_video(self.char_base() + (screen_code as u16) * 8 + row);
                let mut out = [0u8; 8];
                if color_nibble & 0x08 != 0 {
                    let colors = [
                        self.background_color(0),
                        self.background_color(1),
                        self.background_color(2),
                        color_nibble & 0x07,
                    ];
                    for pair in 0..4 {
                        let bits = (byte >> (6 - pair * 2)) & 0x03;
                        out[pair * 2] = colors[bits as usize];
                        out[pair * 2 + 1] = colors[bits as usize];
                    }
                } else {
                    for (i, o) in out.iter_mut().enumerate() {
                        *o = if byte & (0x80 >> i) != 0 { color_nibble } else { self.background_color(0) };
                    }
                }
                out
            }
            DisplayMode::TextExtendedColor => {
                let bg_select = (screen_code >> 6) & 0x03;
                let byte = self.read_video(self.char_base() + ((screen_code & 0x3F) as u16) * 8 + row);
                let fg = color_nibble;
                let bg = self.background_color(bg_select as usize);
                let mut out = [0u8; 8];
                for (i, o) in out.iter_mut().enumerate() {
                    *o = if byte & (0x80 >> i) != 0 { fg } else { bg };
                }
                out
            }
            DisplayMode::BitmapStandard => {
                let byte = self.read_video(self.bitmap_base() + vmc * 8 + row);
                let hi = (screen_code >> 4) & 0x0F;
                let lo = screen_code & 0x0F;
                let mut out = [0u8; 8];
                for (i, o) in out.iter_mut().enumerate() {
                    *o = if byte & (0x80 >> i) != 0 { hi } else { lo };
                }
                out
            }
            DisplayMode::BitmapMulticolor => {
                let byte = self.read_video(self.bitmap_base() + vmc * 8 + row);
                let colors = [self.background_color(0), (screen_code >> 4) & 0x0F, screen_code & 0x0F, color_nibble];
                let mut out = [0u8; 8];
                for pair in 0..4 {
                    let bits = (byte >> (6 - pair * 2)) & 0x03;
                    out[pair * 2] = colors[bits as usize];
                    out[pair * 2 + 1] = colors[bits as usize];
                }
                out
            }
        };

        for (i, idx) in pixels.iter().enumerate() {
            let opaque = *idx != self.background_color(0) || matches!(self.display_mode(), DisplayMode::BitmapMulticolor | DisplayMode::TextMulticolor);
            self.scanline[base_x + i] = self.color(*idx);
            self.bg_opaque[base_x + i] = opaque;
        }
    }

    fn paint_borders(&mut self) {
        let border = self.color(self.border_color());
        let (left, right) = if self.csel() { (0usize, 320usize) } else { (1, 319) };
        for x in 0..RASTER_WIDTH {
            let visible_col = x.saturating_sub(16);
            let in_display_x = visible_col >= left && visible_col < right && x >= 16 && x < 16 + 320;
            if self.vertical_border || !in_display_x {
                self.scanline[x] = border;
                self.bg_opaque[x] = false;
            }
        }
    }

    // --- Sprite pipeline ---

    fn fetch_sprite_data(&mut self, i: usize) {
        let pointer = self.read_video(self.video_matrix_base() + 0x3F8 + i as u16);
        let base = (pointer as u16) << 6;
        let line = self.sprites[i].mc;
        let offset = base + (line as u16) * 3;
        self.sprites[i].data = [
            self.read_video(offset),
            self.read_video(offset + 1),
            self.read_video(offset + 2),
        ];
    }

    fn update_sprite_y_positions(&mut self) {
        for i in 0..8 {
            self.sprites[i].y = self.regs[i * 2 + 1];
            let lo = self.regs[i * 2] as u16;
            let hi = (self.regs[0x10] as u16 >> i) & 1;
            self.sprites[i].x = lo | (hi << 8);
        }
    }

    /// Paint all enabled sprites onto the scanline, descending index order
    /// so sprite 0 wins where both are opaque, and evaluate collisions.
    fn render_sprites(&mut self) {
        self.update_sprite_y_positions();
        let enable = self.sprite_enable();
        let expand_y = self.sprite_expand_y();
        let expand_x = self.sprite_expand_x();
        let multicolor_sel = self.sprite_multicolor_sel();
        let priority = self.sprite_priority();

        let mut sprite_bitmaps: [[bool; RASTER_WIDTH]; 8] = [[false; RASTER_WIDTH]; 8];

        for i in (0..8).rev() {
            if enable & (1 << i) == 0 {
                continue;
            }
            let line_offset = self.raster_counter as i32 - self.sprites[i].y as i32;
            let height = if expand_y & (1 << i) != 0 { 42 } else { 21 };
            if line_offset < 0 || line_offset >= height {
                continue;
            }
            self.sprites[i].mc = (line_offset as u8) >> if expand_y & (1 << i) != 0 { 1 } else { 0 };
            self.fetch_sprite_data(i);

            let x0 = self.sprites[i].x as i32 + 16;
            let multicolor = multicolor_sel & (1 << i) != 0;
            let double_x = expand_x & (1 << i) != 0;
            let colors = [0u8, self.sprite_multicolor(0), self.sprite_color(i), self.sprite_multicolor(1)];
            let bits: u32 = ((self.sprites[i].data[0] as u32) << 16)
                | ((self.sprites[i].data[1] as u32) << 8)
                | self.sprites[i].data[2] as u32;

            if multicolor {
                for pair in 0..12 {
                    let shift = 22 - pair * 2;
                    let code = (bits >> shift) & 0x03;
                    if code == 0 {
                        continue;
                    }
                    let color = self.color(colors[code as usize]);
                    let width = if double_x { 4 } else { 2 };
                    for dx in 0..width {
                        let px = x0 + pair as i32 * width as i32 + dx;
                        if px >= 0 && (px as usize) < RASTER_WIDTH {
                            sprite_bitmaps[i][px as usize] = true;
                            let bg_covers = self.bg_opaque[px as usize] && priority & (1 << i) != 0;
                            if !bg_covers {
                                self.scanline[px as usize] = color;
                            }
                        }
                    }
                }
            } else {
                for bit in 0..24 {
                    if bits & (0x800000 >> bit) == 0 {
                        continue;
                    }
                    let color = self.color(self.sprite_color(i));
                    let width = if double_x { 2 } else { 1 };
                    for dx in 0..width {
                        let px = x0 + bit as i32 * width as i32 + dx;
                        if px >= 0 && (px as usize) < RASTER_WIDTH {
                            sprite_bitmaps[i][px as usize] = true;
                            let bg_covers = self.bg_opaque[px as usize] && priority & (1 << i) != 0;
                            if !bg_covers {
                                self.scanline[px as usize] = color;
                            }
                        }
                    }
                }
            }
        }

        // MIB-MIB collisions: any pair that overlaps.
        for a in 0..8 {
            for b in (a + 1)..8 {
                for x in 0..RASTER_WIDTH {
                    if sprite_bitmaps[a][x] && sprite_bitmaps[b][x] {
                        self.mm_collision |= (1 << a) | (1 << b);
                    }
                }
            }
        }
        if self.mm_collision != 0 {
            self.set_irq(IRQ_MMCOL);
        }
        // MIB-DATA collisions: sprite over opaque background pixel.
        for i in 0..8 {
            for x in 0..RASTER_WIDTH {
                if sprite_bitmaps[i][x] && self.bg_opaque[x] {
                    self.md_collision |= 1 << i;
                }
            }
        }
        if self.md_collision != 0 {
            self.set_irq(IRQ_MDCOL);
        }
    }

    // --- The cycle-stepper ---

    fn step_cycle(&mut self) {
        match self.cycle {
            0 => {
                self.start_of_line();
            }
            2 | 4 | 6 | 8 => {
                let base = (self.cycle as usize - 2) / 2 + 3;
                if base < 8 && self.sprite_enable() & (1 << base) != 0 {
                    self.set_ba(true);
                }
            }
            10 => {
                self.check_raster_irq();
            }
            13 => {
                if self.bad_line {
                    self.row_counter = 0;
                }
            }
            15 | 16 => {
                self.main_border = !self.den();
            }
            16..=55 => {
                let col = self.cycle - 16;
                self.paint_display_byte(col);
            }
            56 => {
                if self.row_counter == 7 {
                    self.idle_mode = true;
                    self.video_counter = self.video_counter.wrapping_add(8);
                    self.row_counter = 0;
                } else {
                    self.row_counter += 1;
                }
            }
            57 | 59 | 61 => {
                let idx = (self.cycle as usize - 57) / 2;
                if idx < 3 && self.sprite_enable() & (1 << idx) != 0 {
                    self.set_ba(true);
                }
            }
            62 => {
                self.render_sprites();
                self.paint_borders();
                if let Some(cb) = self.line_cb.as_mut() {
                    cb(self.raster_counter as u32, &self.scanline);
                }
                self.mm_collision = 0;
                self.md_collision = 0;
                self.cycle = 0;
                return;
            }
            _ => {}
        }
        self.cycle += 1;
    }
}

impl Clockable for Vic2 {
    fn tick(&mut self) -> u32 {
        self.step_cycle();
        1
    }
}

/// Offset at which the 1000-byte nibble-wide color RAM is mapped within
/// this device's address window (above the 47 register bytes). Real
/// hardware puts color RAM at a fixed `$D800` regardless of VIC bank; the
/// owning machine's bank layout decides where that lands in the 16-bit CPU
/// space, but within this `Device` the two windows are distinguished by
/// this offset rather than by a separate `Device` instance, since both
/// need `&mut self` access to the same register/state block.
pub const COLOR_RAM_OFFSET: u16 = 0x1000;

impl Device for Vic2 {
    fn read(&mut self, addr: u16, mode: ReadMode) -> u8 {
        if addr >= COLOR_RAM_OFFSET {
            let i = (addr - COLOR_RAM_OFFSET) as usize;
            return self.color_ram.get(i).copied().unwrap_or(0xFF) | 0xF0;
        }
        let a = (addr & 0x3F) as usize;
        match a {
            0x00..=0x0F => self.regs[a],
            0x10 => self.regs[0x10],
            0x11 => (self.regs[0x11] & 0x7F) | (((self.raster_counter & 0x100) >> 1) as u8),
            0x12 => (self.raster_counter & 0xFF) as u8,
            0x13 | 0x14 => self.regs[a],
            0x15 => self.regs[0x15],
            0x16 => self.regs[0x16] | 0xC0,
            0x17 => self.regs[0x17],
            0x18 => self.regs[0x18] | 0x01,
            0x19 => self.irq_status | 0x70 | if (self.irq_status & self.irq_enable & 0x0F) != 0 { 0x80 } else { 0 },
            0x1A => self.irq_enable | 0xF0,
            0x1B..=0x1D => self.regs[a],
            0x1E => {
                let v = self.mm_collision;
                if mode != ReadMode::Peek {
                    self.mm_collision = 0;
                }
                v
            }
            0x1F => {
                let v = self.md_collision;
                if mode != ReadMode::Peek {
                    self.md_collision = 0;
                }
                v
            }
            0x20 => self.regs[0x20] | 0xF0,
            0x21..=0x24 => self.regs[a] | 0xF0,
            0x25 | 0x26 => self.regs[a] | 0xF0,
            0x27..=0x2E => self.regs[a] | 0xF0,
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        if addr >= COLOR_RAM_OFFSET {
            let i = (addr - COLOR_RAM_OFFSET) as usize;
            if let Some(slot) = self.color_ram.get_mut(i) {
                *slot = value & 0x0F;
            }
            return;
        }
        let a = (addr & 0x3F) as usize;
        if a >= self.regs.len() {
            return;
        }
        match a {
            0x19 => {
                self.irq_status &= !value & 0x0F;
                if self.irq_status & self.irq_enable & 0x0F == 0 {
                    if let Some(cb) = self.irq_cb.as_mut() {
                        cb(false);
                    }
                }
            }
            0x1A => self.irq_enable = value & 0x0F,
            0x1E | 0x1F => {} // read-only collision registers
            _ => self.regs[a] = value,
        }
    }

    fn size(&self) -> usize {
        COLOR_RAM_OFFSET as usize + self.color_ram.len()
    }

    fn label(&self) -> &str {
        "vic-ii"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DeviceMapEntry;
    use std::cell::RefCell;

    struct FlatRam(Vec<u8>);
    impl Device for FlatRam {
        fn read(&mut self, addr: u16, _mode: ReadMode) -> u8 {
            self.0[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.0[addr as usize] = value;
        }
        fn size(&self) -> usize {
            self.0.len()
        }
    }

    fn test_bus() -> Rc<AddressSpace> {
        let ram = Rc::new(RefCell::new(FlatRam(vec![0; 0x4000])));
        Rc::new(AddressSpace::new(
            0x4000,
            vec![DeviceMapEntry::new(ram.clone(), 0)],
            vec![DeviceMapEntry::new(ram, 0)],
        ))
    }

    fn test_palette() -> Rc<RgbaTable> {
        Rc::new(RgbaTable::from_entries((0..16).map(|i| Rgba::new(i * 16, i * 16, i * 16, 0xFF)).collect()))
    }

    #[test]
    fn raster_irq_fires_once_when_counter_reaches_compare() {
        let mut vic = Vic2::new(test_bus(), test_palette());
        vic.write(0x12, 0x10);
        vic.write(0x1A, 0x01);
        let fired = Rc::new(RefCell::new(0u32));
        let fired_clone = fired.clone();
        vic.set_irq_callback(Box::new(move |state| {
            if state {
                *fired_clone.borrow_mut() += 1;
            }
        }));
        for _ in 0..(16 * CYCLES_PER_LINE as usize + 11) {
            vic.tick();
        }
        assert_eq!(*fired.borrow(), 1);
        assert_eq!(vic.read(0x19, ReadMode::Read) & 0x01, 0x01);
    }

    #[test]
    fn writing_interrupt_ack_clears_status_and_deasserts_irq() {
        let mut vic = Vic2::new(test_bus(), test_palette());
        vic.write(0x12, 0x10);
        vic.write(0x1A, 0x01);
        for _ in 0..(16 * CYCLES_PER_LINE as usize + 11) {
            vic.tick();
        }
        vic.write(0x19, 0x01);
        assert_eq!(vic.read(0x19, ReadMode::Read) & 0x80, 0);
    }

    #[test]
    fn raster_counter_wraps_at_end_of_frame() {
        let mut vic = Vic2::new(test_bus(), test_palette());
        for _ in 0..((RASTER_LINES as usize) * CYCLES_PER_LINE as usize) {
            vic.tick();
        }
        assert_eq!(vic.raster_counter(), 0);
    }

    #[test]
    fn collision_register_read_clears_unless_peek() {
        let mut vic = Vic2::new(test_bus(), test_palette());
        vic.mm_collision = 0x03;
        let peeked = vic.read(0x1E, ReadMode::Peek);
        assert_eq!(peeked, 0x03);
        assert_eq!(vic.mm_collision, 0x03);
        let read = vic.read(0x1E, ReadMode::Read);
        assert_eq!(read, 0x03);
        assert_eq!(vic.mm_collision, 0);
    }
}
