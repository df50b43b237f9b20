use std::{
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use unicode_width::UnicodeWidthStr;

use crate::{
    config,
    error::{EngineError, Result},
    types::{ColorChoice, Rgb, Vec2},
};

pub const PASTEL: [Rgb; 8] = [
    Rgb::hex(0xFFB3BA),
    Rgb::hex(0xBAFFC9),
    Rgb::hex(0xBAE1FF),
    Rgb::hex(0xFFFFBA),
    Rgb::hex(0xFFB3E6),
    Rgb::hex(0xC7CEEA),
    Rgb::hex(0xFFD3A5),
    Rgb::hex(0xA8E6CF),
];

/// Inner radius of the bead rim, as a fraction of the bead radius.
const RIM_INNER: f32 = 0.78;
/// Half width of the hanging loop at the top of the rim.
const LOOP_HALF_WIDTH: f32 = 0.22;

pub fn rainbow(index: usize) -> Rgb {
    PASTEL[index % PASTEL.len()]
}

/// Override first, then the global charm color, then the default blue.
pub fn resolve_color(
    color_override: Option<ColorChoice>,
    charm_color: Option<ColorChoice>,
    glyph_index: usize,
) -> Rgb {
    match color_override.or(charm_color) {
        Some(ColorChoice::Solid(rgb)) => rgb,
        Some(ColorChoice::Rainbow) => rainbow(glyph_index),
        None => config::DEFAULT_CHARM_COLOR,
    }
}

/// Glyphs the terminal draws two columns wide. These also get the larger
/// raster canvas.
pub fn is_wide(glyph: &str) -> bool {
    UnicodeWidthStr::width(glyph) >= 2
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub glyph: String,
    /// Whole pixels; fractional sizes share an entry.
    pub font_size: u16,
    pub color: Rgb,
}

impl GlyphKey {
    pub fn new(glyph: &str, font_size: f32, color: Rgb) -> Self {
        Self {
            glyph: glyph.to_string(),
            font_size: font_size.round().clamp(0.0, u16::MAX as f32) as u16,
            color,
        }
    }

    pub fn is_wide(&self) -> bool {
        is_wide(&self.glyph)
    }

    /// Side of the square raster canvas in pixels.
    pub fn canvas_size(&self) -> u16 {
        let scale = if self.is_wide() { 2.0 } else { 1.2 };
        (self.font_size as f32 * scale).ceil() as u16
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Texel {
    Clear,
    Fill,
    Rim,
    Loop,
}

/// A charm rendered as a bead: tinted fill, a rim, and a loop at the top. The
/// glyph itself sits at the center and is drawn by the renderer.
#[derive(Debug, PartialEq)]
pub struct GlyphRaster {
    pub key: GlyphKey,
    size: u16,
    texels: Vec<Texel>,
}

impl GlyphRaster {
    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn texel(&self, x: u16, y: u16) -> Texel {
        if x >= self.size || y >= self.size {
            return Texel::Clear;
        }
        self.texels[y as usize * self.size as usize + x as usize]
    }

    /// Nearest texel at `local`, where the canvas spans [-1, 1] on both axes.
    pub fn sample(&self, local: Vec2) -> Texel {
        if !(-1.0..1.0).contains(&local.x) || !(-1.0..1.0).contains(&local.y) {
            return Texel::Clear;
        }
        let n = self.size() as f32;
        let x = ((local.x + 1.0) * 0.5 * n) as u16;
        let y = ((local.y + 1.0) * 0.5 * n) as u16;
        self.texel(x, y)
    }
}

pub trait Rasterizer {
    fn rasterize(&self, key: &GlyphKey) -> Result<GlyphRaster>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BeadRasterizer;

impl Rasterizer for BeadRasterizer {
    fn rasterize(&self, key: &GlyphKey) -> Result<GlyphRaster> {
        if key.glyph.is_empty() || key.glyph.chars().any(char::is_control) {
            return Err(EngineError::AssetDecodeFailure {
                glyph: key.glyph.clone(),
                reason: "not a printable glyph".into(),
            });
        }
        let size = key.canvas_size();
        if size == 0 {
            return Err(EngineError::AssetDecodeFailure {
                glyph: key.glyph.clone(),
                reason: "zero-sized canvas".into(),
            });
        }

        let n = size as f32;
        let mut texels = Vec::with_capacity(size as usize * size as usize);
        for y in 0..size {
            for x in 0..size {
                let u = (x as f32 + 0.5) / n * 2.0 - 1.0;
                let v = (y as f32 + 0.5) / n * 2.0 - 1.0;
                let r = (u * u + v * v).sqrt();
                let texel = if r > 1.0 {
                    Texel::Clear
                } else if r < RIM_INNER {
                    Texel::Fill
                } else if v < 0.0 && u.abs() < LOOP_HALF_WIDTH {
                    Texel::Loop
                } else {
                    Texel::Rim
                };
                texels.push(texel);
            }
        }
        Ok(GlyphRaster {
            key: key.clone(),
            size,
            texels,
        })
    }
}

/// Plain text stand-in, drawn while the raster is pending or after it failed.
#[derive(Clone, Debug, PartialEq)]
pub struct TextGlyph {
    pub key: GlyphKey,
}

#[derive(Clone, Debug)]
pub enum Drawable {
    Raster(Rc<GlyphRaster>),
    Text(TextGlyph),
}

impl Drawable {
    pub fn key(&self) -> &GlyphKey {
        match self {
            Drawable::Raster(raster) => &raster.key,
            Drawable::Text(text) => &text.key,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GlyphEvent {
    Ready(GlyphKey),
    Failed(GlyphKey),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Ready,
    Failed,
}

enum Slot {
    Pending,
    Ready(Rc<GlyphRaster>),
    Failed,
}

/// Append-only raster cache. Entries are never evicted.
pub struct GlyphCache<R = BeadRasterizer> {
    rasterizer: R,
    slots: HashMap<GlyphKey, Slot>,
    queue: VecDeque<GlyphKey>,
    charm_color: Option<ColorChoice>,
}

impl<R: Rasterizer> GlyphCache<R> {
    pub fn new(rasterizer: R, charm_color: Option<ColorChoice>) -> Self {
        Self {
            rasterizer,
            slots: HashMap::new(),
            queue: VecDeque::new(),
            charm_color,
        }
    }

    pub fn charm_color(&self) -> Option<ColorChoice> {
        self.charm_color
    }

    pub fn set_charm_color(&mut self, color: Option<ColorChoice>) {
        self.charm_color = color;
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.slots
            .keys()
            .filter(|key| self.state(key) == Some(state))
            .count()
    }

    pub fn state(&self, key: &GlyphKey) -> Option<SlotState> {
        self.slots.get(key).map(|slot| match slot {
            Slot::Pending => SlotState::Pending,
            Slot::Ready(_) => SlotState::Ready,
            Slot::Failed => SlotState::Failed,
        })
    }

    /// Returns the cached raster, or a text fallback while it is pending or
    /// if it failed. A miss queues a raster job.
    pub fn resolve(
        &mut self,
        glyph: &str,
        font_size: f32,
        color_override: Option<ColorChoice>,
        glyph_index: usize,
    ) -> Drawable {
        let color = resolve_color(color_override, self.charm_color, glyph_index);
        let key = GlyphKey::new(glyph, font_size, color);
        match self.slots.get(&key) {
            Some(Slot::Ready(raster)) => return Drawable::Raster(Rc::clone(raster)),
            Some(Slot::Pending | Slot::Failed) => {}
            None => {
                self.slots.insert(key.clone(), Slot::Pending);
                self.queue.push_back(key.clone());
            }
        }
        Drawable::Text(TextGlyph { key })
    }

    /// Runs every queued raster job and reports each outcome once.
    pub fn complete_pending(&mut self) -> Vec<GlyphEvent> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(key) = self.queue.pop_front() {
            match self.rasterizer.rasterize(&key) {
                Ok(raster) => {
                    self.slots.insert(key.clone(), Slot::Ready(Rc::new(raster)));
                    events.push(GlyphEvent::Ready(key));
                }
                Err(err) => {
                    log::warn!("{err}; keeping text fallback");
                    self.slots.insert(key.clone(), Slot::Failed);
                    events.push(GlyphEvent::Failed(key));
                }
            }
        }
        events
    }
}
