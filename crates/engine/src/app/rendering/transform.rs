use crate::app::Vec2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Uniform scale plus centering offsets that fit a map into a viewport.
/// Computed once when a map is loaded and kept for the whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFit {
    pub scale_factor: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewportFit {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewportFit {
    pub const IDENTITY: Self = Self {
        scale_factor: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Degenerate sizes (zero viewport or zero map) fall back to identity.
    pub fn compute(viewport: Viewport, map_width_px: f32, map_height_px: f32) -> Self {
        let usable = !viewport.is_empty()
            && map_width_px.is_finite()
            && map_height_px.is_finite()
            && map_width_px > 0.0
            && map_height_px > 0.0;
        if !usable {
            return Self::IDENTITY;
        }

        let screen_w = viewport.width as f32;
        let screen_h = viewport.height as f32;
        let scale_factor = (screen_w / map_width_px).min(screen_h / map_height_px);
        Self {
            scale_factor,
            offset_x: (screen_w - map_width_px * scale_factor) / 2.0,
            offset_y: (screen_h - map_height_px * scale_factor) / 2.0,
        }
    }

    pub fn map_to_world(&self, map_px: Vec2) -> Vec2 {
        Vec2 {
            x: self.offset_x + map_px.x * self.scale_factor,
            y: self.offset_y + map_px.y * self.scale_factor,
        }
    }
}

pub(crate) fn world_to_screen_px(world: Vec2) -> (i32, i32) {
    (world.x.round() as i32, world.y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_viewport_centers_horizontally() {
        let fit = ViewportFit::compute(
            Viewport {
                width: 1600,
                height: 600,
            },
            800.0,
            600.0,
        );
        assert_eq!(fit.scale_factor, 1.0);
        assert_eq!(fit.offset_x, 400.0);
        assert_eq!(fit.offset_y, 0.0);
    }

    #[test]
    fn tall_viewport_scales_by_width_and_centers_vertically() {
        let fit = ViewportFit::compute(
            Viewport {
                width: 400,
                height: 1000,
            },
            800.0,
            600.0,
        );
        assert_eq!(fit.scale_factor, 0.5);
        assert_eq!(fit.offset_x, 0.0);
        assert_eq!(fit.offset_y, 350.0);
    }

    #[test]
    fn zero_viewport_falls_back_to_identity() {
        let fit = ViewportFit::compute(Viewport::default(), 800.0, 600.0);
        assert_eq!(fit, ViewportFit::IDENTITY);
    }

    #[test]
    fn map_to_world_applies_scale_then_offset() {
        let fit = ViewportFit {
            scale_factor: 2.0,
            offset_x: 10.0,
            offset_y: -4.0,
        };
        let world = fit.map_to_world(Vec2::new(3.0, 5.0));
        assert_eq!(world, Vec2::new(16.0, 6.0));
    }

    #[test]
    fn screen_projection_rounds_to_nearest_pixel() {
        assert_eq!(world_to_screen_px(Vec2::new(10.4, 10.6)), (10, 11));
    }
}
