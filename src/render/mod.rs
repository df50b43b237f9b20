use std::str::FromStr;

use serde::Deserialize;
use unicode_width::UnicodeWidthStr;

use crate::{
    config,
    glyph::{Drawable, GlyphRaster, Texel, is_wide},
    types::{Rgb, Size, Vec2},
};

const FILL_TINT: f32 = 0.35;
const RIM_TINT: f32 = 0.15;
const RIM_SYMBOL: &str = "·";
const LOOP_SYMBOL: &str = "o";

/// Photo filters, approximated per pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    None,
    Ccd,
    Mono,
    Blur,
    Glow,
    #[serde(rename = "8k")]
    EightK,
}

impl Filter {
    pub const ALL: [Filter; 6] = [
        Filter::None,
        Filter::Ccd,
        Filter::Mono,
        Filter::Blur,
        Filter::Glow,
        Filter::EightK,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Filter::None => "none",
            Filter::Ccd => "ccd",
            Filter::Mono => "mono",
            Filter::Blur => "blur",
            Filter::Glow => "glow",
            Filter::EightK => "8k",
        }
    }

    pub fn next(self) -> Filter {
        let idx = Filter::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Filter::ALL[(idx + 1) % Filter::ALL.len()]
    }

    /// Color part of the filter. Blur is spatial and handled while sampling.
    pub fn adjust(self, rgb: Rgb) -> Rgb {
        match self {
            Filter::None | Filter::Blur => rgb,
            Filter::Ccd => tone(rgb, 0.95, 1.2, 1.3),
            Filter::Mono => tone(rgb, 1.0, 1.0, 0.0),
            Filter::Glow => tone(rgb, 1.2, 1.1, 1.0),
            Filter::EightK => tone(rgb, 1.1, 1.3, 1.2),
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown filter {s:?}"))
    }
}

fn tone(rgb: Rgb, brightness: f32, contrast: f32, saturation: f32) -> Rgb {
    let channels = [rgb.0, rgb.1, rgb.2].map(|c| c as f32 * brightness);
    let luma = 0.2126 * channels[0] + 0.7152 * channels[1] + 0.0722 * channels[2];
    let [r, g, b] = channels.map(|c| {
        let saturated = luma + (c - luma) * saturation;
        ((saturated - 128.0) * contrast + 128.0).round().clamp(0.0, 255.0) as u8
    });
    Rgb(r, g, b)
}

/// The photo behind the charms, in its own pixel grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Backdrop {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Backdrop {
    #[cfg(test)]
    pub fn new(width: usize, height: usize, pixels: Vec<Rgb>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A stand-in landscape: sky, sun, and hills.
    pub fn landscape(width: usize, height: usize) -> Self {
        let sky_top = Rgb::hex(0x6FB7E9);
        let horizon = Rgb::hex(0xFDE2C4);
        let hill = Rgb::hex(0x7FB77E);
        let hill_shade = Rgb::hex(0x4E8A5A);
        let sun = Rgb::hex(0xFFF1A8);
        let (w, h) = (width.max(1), height.max(1));
        let mut pixels = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let u = x as f32 / w as f32;
                let v = y as f32 / h as f32;
                let ridge = 0.68 + 0.06 * (u * std::f32::consts::TAU * 1.5).sin();
                let sun_d = Vec2::new(u - 0.75, (v - 0.3) * 0.75).length();
                let px = if v > ridge {
                    hill.mix(hill_shade, (v - ridge) / (1.0 - ridge))
                } else if sun_d < 0.08 {
                    sun
                } else {
                    sky_top.mix(horizon, v / ridge)
                };
                pixels.push(px);
            }
        }
        Self {
            width: w,
            height: h,
            pixels,
        }
    }

    /// Nearest pixel at normalized coordinates.
    pub fn sample(&self, u: f32, v: f32) -> Rgb {
        let x = ((u.clamp(0.0, 1.0) * self.width as f32) as usize).min(self.width - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height as f32) as usize).min(self.height - 1);
        self.pixels[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderCell {
    /// Empty for the right half of a wide glyph.
    pub symbol: String,
    pub fg: Rgb,
    pub bg: Rgb,
    wide: bool,
}

impl RenderCell {
    fn blank(bg: Rgb) -> Self {
        Self {
            symbol: " ".into(),
            fg: bg,
            bg,
            wide: false,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.symbol.is_empty()
    }
}

#[derive(Debug)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<RenderCell>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let mut buffer = Self {
            width,
            height,
            cells: Vec::new(),
        };
        buffer.resize(width, height);
        buffer
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let len = (width as usize).saturating_mul(height as usize);
        self.cells
            .resize(len, RenderCell::blank(config::NEUTRAL_FILL));
        self.fill(config::NEUTRAL_FILL);
    }

    pub fn fill(&mut self, bg: Rgb) {
        for cell in &mut self.cells {
            cell.symbol.clear();
            cell.symbol.push(' ');
            cell.fg = bg;
            cell.bg = bg;
            cell.wide = false;
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, x: u16, y: u16) -> &RenderCell {
        debug_assert!(x < self.width && y < self.height, "get() out of bounds");
        &self.cells[self.index(x, y)]
    }

    fn index(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }

    fn set_bg(&mut self, x: u16, y: u16, bg: Rgb) {
        let idx = self.index(x, y);
        self.cells[idx].bg = bg;
    }

    fn tint(&mut self, x: i32, y: i32, color: Rgb, amount: f32) {
        if self.contains(x, y) {
            let idx = self.index(x as u16, y as u16);
            let cell = &mut self.cells[idx];
            cell.bg = cell.bg.mix(color, amount);
        }
    }

    /// Writes a symbol; wide symbols also claim the cell to the right.
    fn put(&mut self, x: i32, y: i32, symbol: &str, fg: Rgb, wide: bool) {
        if !self.contains(x, y) || (wide && !self.contains(x + 1, y)) {
            return;
        }
        self.split_wide(x as u16, y as u16);
        if wide {
            self.split_wide(x as u16 + 1, y as u16);
        }
        let idx = self.index(x as u16, y as u16);
        let cell = &mut self.cells[idx];
        cell.symbol.clear();
        cell.symbol.push_str(symbol);
        cell.fg = fg;
        cell.wide = wide;
        if wide {
            let tail = &mut self.cells[idx + 1];
            tail.symbol.clear();
            tail.fg = fg;
            tail.wide = false;
        }
    }

    /// Blanks whichever half of a wide glyph would be orphaned by writing
    /// into `(x, y)`.
    fn split_wide(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);
        if self.cells[idx].is_continuation() && x > 0 {
            let head = &mut self.cells[idx - 1];
            head.symbol.clear();
            head.symbol.push(' ');
            head.wide = false;
        }
        if self.cells[idx].wide && x + 1 < self.width {
            let tail = &mut self.cells[idx + 1];
            tail.symbol.clear();
            tail.symbol.push(' ');
        }
        let cell = &mut self.cells[idx];
        if cell.is_continuation() {
            cell.symbol.push(' ');
        }
        cell.wide = false;
    }
}

/// Pixel/cell conversion for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    cells_per_px: Vec2,
}

impl Projection {
    pub fn new(frame: &FrameBuffer, container: Size) -> Self {
        Self {
            cells_per_px: Vec2::new(
                frame.width() as f32 / container.width,
                frame.height() as f32 / container.height,
            ),
        }
    }

    fn to_cells(self, px: Vec2) -> Vec2 {
        Vec2::new(px.x * self.cells_per_px.x, px.y * self.cells_per_px.y)
    }

    fn to_px(self, cells: Vec2) -> Vec2 {
        Vec2::new(cells.x / self.cells_per_px.x, cells.y / self.cells_per_px.y)
    }
}

/// Container size for a terminal area of `width` × `height` cells.
pub fn container_for(width: u16, height: u16) -> Size {
    Size::new(
        width as f32 * config::CELL_WIDTH_PX,
        height as f32 * config::CELL_HEIGHT_PX,
    )
}

pub fn paint_background(frame: &mut FrameBuffer, backdrop: &Backdrop, filter: Filter) {
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let u = (x as f32 + 0.5) / w;
            let v = (y as f32 + 0.5) / h;
            let rgb = if filter == Filter::Blur {
                box_blur(backdrop, u, v, 1.0 / w, 1.0 / h)
            } else {
                filter.adjust(backdrop.sample(u, v))
            };
            frame.set_bg(x, y, rgb);
        }
    }
}

fn box_blur(backdrop: &Backdrop, u: f32, v: f32, du: f32, dv: f32) -> Rgb {
    let mut sum = [0u32; 3];
    for oy in -1..=1 {
        for ox in -1..=1 {
            let px = backdrop.sample(u + ox as f32 * du, v + oy as f32 * dv);
            sum[0] += px.0 as u32;
            sum[1] += px.1 as u32;
            sum[2] += px.2 as u32;
        }
    }
    Rgb((sum[0] / 9) as u8, (sum[1] / 9) as u8, (sum[2] / 9) as u8)
}

/// Where and how a charm lands on screen, in container pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub center: Vec2,
    pub radius: f32,
    pub angle: f32,
}

impl Placement {
    /// Keeps the whole charm on the card even when physics lets it overlap
    /// the edge slightly.
    pub fn clamped(pos: Vec2, radius: f32, angle: f32, container: Size) -> Self {
        let clamp_axis = |v: f32, extent: f32| {
            if extent > radius * 2.0 {
                v.clamp(radius, extent - radius)
            } else {
                extent / 2.0
            }
        };
        Self {
            center: Vec2::new(
                clamp_axis(pos.x, container.width),
                clamp_axis(pos.y, container.height),
            ),
            radius,
            angle,
        }
    }
}

pub fn draw_charm(frame: &mut FrameBuffer, projection: Projection, drawable: &Drawable, at: Placement) {
    if let Drawable::Raster(raster) = drawable {
        stamp_bead(frame, projection, raster, at);
    }
    let key = drawable.key();
    let Some(symbol) = cell_symbol(&key.glyph) else {
        return;
    };
    let wide = is_wide(symbol);
    let center = projection.to_cells(at.center);
    let x = if wide {
        (center.x - 0.5).floor() as i32
    } else {
        center.x.floor() as i32
    };
    frame.put(x, center.y.floor() as i32, symbol, key.color, wide);
}

/// The part of a glyph that fits one or two terminal columns. Sequences the
/// terminal would spread wider fall back to their leading scalar.
fn cell_symbol(glyph: &str) -> Option<&str> {
    let symbol = match UnicodeWidthStr::width(glyph) {
        1 | 2 => glyph,
        _ => {
            let first = glyph.chars().next()?;
            &glyph[..first.len_utf8()]
        }
    };
    matches!(UnicodeWidthStr::width(symbol), 1 | 2).then_some(symbol)
}

fn stamp_bead(frame: &mut FrameBuffer, projection: Projection, raster: &GlyphRaster, at: Placement) {
    let color = raster.key.color;
    let lo = projection.to_cells(at.center - Vec2::new(at.radius, at.radius));
    let hi = projection.to_cells(at.center + Vec2::new(at.radius, at.radius));
    for y in lo.y.floor() as i32..=hi.y.floor() as i32 {
        for x in lo.x.floor() as i32..=hi.x.floor() as i32 {
            if !frame.contains(x, y) {
                continue;
            }
            let cell_center = projection.to_px(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
            let local = ((cell_center - at.center) * (1.0 / at.radius)).rotate(-at.angle);
            match raster.sample(local) {
                Texel::Clear => {}
                Texel::Fill => frame.tint(x, y, color, FILL_TINT),
                Texel::Rim => {
                    frame.tint(x, y, color, RIM_TINT);
                    frame.put(x, y, RIM_SYMBOL, color, false);
                }
                Texel::Loop => {
                    frame.tint(x, y, color, RIM_TINT);
                    frame.put(x, y, LOOP_SYMBOL, color, false);
                }
            }
        }
    }
}
