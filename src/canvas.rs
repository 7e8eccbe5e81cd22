use crate::color::Rgb;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

const HALF_BLOCK: char = '\u{2580}';

// Row-major RGBA pixels. Drawing calls are shifted by the current offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    offset: (f32, f32),
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
            offset: (0.0, 0.0),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels_rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    pub fn set_offset(&mut self, dx: f32, dy: f32) {
        self.offset = (dx, dy);
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some(Rgb {
            r: self.pixels[i],
            g: self.pixels[i + 1],
            b: self.pixels[i + 2],
        })
    }

    fn put(&mut self, x: usize, y: usize, color: Rgb, alpha: f32) {
        if x >= self.width || y >= self.height || alpha <= 0.0 {
            return;
        }
        let i = (y * self.width + x) * 4;
        let under = Rgb {
            r: self.pixels[i],
            g: self.pixels[i + 1],
            b: self.pixels[i + 2],
        };
        let out = under.lerp(color, alpha);
        self.pixels[i] = out.r;
        self.pixels[i + 1] = out.g;
        self.pixels[i + 2] = out.b;
        self.pixels[i + 3] = 255;
    }

    pub fn fill_vertical_gradient(&mut self, top: Rgb, bottom: Rgb) {
        let span = self.height.saturating_sub(1).max(1) as f32;
        for y in 0..self.height {
            let color = top.lerp(bottom, y as f32 / span);
            for x in 0..self.width {
                self.put(x, y, color, 1.0);
            }
        }
    }

    pub fn fill_radial(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        color: Rgb,
        alpha_center: f32,
        alpha_edge: f32,
    ) {
        if radius <= 0.0 {
            return;
        }
        let (cx, cy) = (cx + self.offset.0, cy + self.offset.1);
        let x0 = (cx - radius).floor().max(0.0) as usize;
        let y0 = (cy - radius).floor().max(0.0) as usize;
        let x1 = ((cx + radius).ceil().max(0.0) as usize).min(self.width);
        let y1 = ((cy + radius).ceil().max(0.0) as usize).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                if d <= radius {
                    let t = d / radius;
                    self.put(x, y, color, alpha_center + (alpha_edge - alpha_center) * t);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb, alpha: f32) {
        // Sub-pixel dots still cover their own pixel.
        self.fill_radial(cx, cy, radius.max(0.75), color, alpha, alpha);
    }

    pub fn fill_below(&mut self, points: &[(f32, f32)], color: Rgb) {
        if points.len() < 2 {
            return;
        }
        let (ox, oy) = self.offset;
        let mut seg = 0;
        for x in 0..self.width {
            let px = x as f32 + 0.5 - ox;
            while seg + 2 < points.len() && points[seg + 1].0 < px {
                seg += 1;
            }
            let (ax, ay) = points[seg];
            let (bx, by) = points[seg + 1];
            let t = if bx > ax { ((px - ax) / (bx - ax)).clamp(0.0, 1.0) } else { 0.0 };
            let top = ay + (by - ay) * t + oy;
            let start = top.round().max(0.0) as usize;
            for y in start..self.height {
                self.put(x, y, color, 1.0);
            }
        }
    }

    pub fn vline(&mut self, x: f32, y0: f32, y1: f32, color: Rgb) {
        let x = x + self.offset.0;
        if x < 0.0 {
            return;
        }
        let (lo, hi) = (y0.min(y1) + self.offset.1, y0.max(y1) + self.offset.1);
        for y in lo.round().max(0.0) as usize..=hi.round().max(0.0) as usize {
            self.put(x as usize, y, color, 1.0);
        }
    }
}

pub struct HalfBlocks<'a>(pub &'a Canvas);

impl Widget for HalfBlocks<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let canvas = self.0;
        for row in 0..area.height {
            for col in 0..area.width {
                let (x, y) = (col as usize, row as usize * 2);
                let (Some(top), Some(bottom)) = (canvas.get(x, y), canvas.get(x, y + 1)) else {
                    continue;
                };
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_char(HALF_BLOCK).set_fg(top.into()).set_bg(bottom.into());
                }
            }
        }
    }
}
