use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::{sheet_frame_index, Entity, RenderableKind, SceneWorld, Vec2};
use crate::map::WorldMap;
use crate::sprite_keys::{SpriteCatalog, SpriteSheet};

use super::text::{blend_pixel, draw_panel, fill_rect};
use super::transform::world_to_screen_px;
use super::{Viewport, PLACEHOLDER_HALF_SIZE_PX};

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const PAUSED_DIM_COLOR: [u8; 4] = [0, 0, 0, 140];
const TILE_FALLBACK_COLORS: [[u8; 4]; 3] = [
    [74, 112, 56, 255],
    [112, 83, 58, 255],
    [68, 74, 62, 255],
];

struct LoadedImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Decoded images keyed by path. A failed load is cached as `None` and
/// reported once.
struct ImageStore {
    asset_root: PathBuf,
    cache: HashMap<PathBuf, Option<LoadedImage>>,
    warned: HashSet<PathBuf>,
}

impl ImageStore {
    fn new(asset_root: PathBuf) -> Self {
        Self {
            asset_root,
            cache: HashMap::new(),
            warned: HashSet::new(),
        }
    }

    fn get(&mut self, path: &Path, label: &str) -> Option<&LoadedImage> {
        if !self.cache.contains_key(path) {
            let resolved = self.asset_root.join(path);
            let loaded = match load_image_rgba(&resolved) {
                Ok(image) => Some(image),
                Err(reason) => {
                    self.warn_once(path, &resolved, label, &reason);
                    None
                }
            };
            self.cache.insert(path.to_path_buf(), loaded);
        }
        self.cache.get(path).and_then(Option::as_ref)
    }

    fn warn_once(&mut self, key: &Path, resolved: &Path, label: &str, reason: &str) {
        if !self.warned.insert(key.to_path_buf()) {
            return;
        }
        warn!(
            asset = label,
            path = %resolved.display(),
            reason = reason,
            "renderer_image_load_failed_using_placeholder"
        );
    }
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    catalog: SpriteCatalog,
    images: ImageStore,
    draw_order: Vec<usize>,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        asset_root: PathBuf,
        catalog: SpriteCatalog,
    ) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            catalog,
            images: ImageStore::new(asset_root),
            draw_order: Vec::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Draws `world`, then `overlay` on top of a dimmed world when a
    /// sub-scene is running.
    pub(crate) fn render_frame(
        &mut self,
        world: &SceneWorld,
        overlay: Option<&SceneWorld>,
    ) -> Result<(), Error> {
        if self.viewport.is_empty() {
            return Ok(());
        }
        compose_frame(
            self.pixels.frame_mut(),
            self.viewport,
            &self.catalog,
            &mut self.images,
            &mut self.draw_order,
            world,
            overlay,
        );
        self.pixels.render()
    }
}

fn compose_frame(
    frame: &mut [u8],
    viewport: Viewport,
    catalog: &SpriteCatalog,
    images: &mut ImageStore,
    draw_order: &mut Vec<usize>,
    world: &SceneWorld,
    overlay: Option<&SceneWorld>,
) {
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&CLEAR_COLOR);
    }

    draw_scene(frame, viewport, catalog, images, draw_order, world);

    if let Some(overlay) = overlay {
        fill_rect(
            frame,
            viewport.width,
            viewport.height,
            0,
            0,
            viewport.width as i32,
            viewport.height as i32,
            PAUSED_DIM_COLOR,
        );
        draw_scene(frame, viewport, catalog, images, draw_order, overlay);
    }
}

fn draw_scene(
    frame: &mut [u8],
    viewport: Viewport,
    catalog: &SpriteCatalog,
    images: &mut ImageStore,
    draw_order: &mut Vec<usize>,
    world: &SceneWorld,
) {
    if let Some(map) = world.map() {
        draw_tile_layers(frame, viewport, map, images);
    }

    sorted_draw_order(world.entities(), draw_order);
    for index in draw_order.iter().copied() {
        draw_entity(frame, viewport, catalog, images, &world.entities()[index]);
    }

    if let Some(panel) = world.panel() {
        draw_panel(frame, viewport.width, viewport.height, panel);
    }
}

/// Back to front: by depth, then by y so lower entities overlap higher ones.
fn sorted_draw_order(entities: &[Entity], out: &mut Vec<usize>) {
    out.clear();
    out.extend(0..entities.len());
    out.sort_by(|left, right| {
        let left = &entities[*left];
        let right = &entities[*right];
        left.renderable
            .depth
            .cmp(&right.renderable.depth)
            .then_with(|| {
                left.transform
                    .position
                    .y
                    .total_cmp(&right.transform.position.y)
            })
            .then_with(|| left.id.cmp(&right.id))
    });
}

fn draw_tile_layers(frame: &mut [u8], viewport: Viewport, map: &WorldMap, images: &mut ImageStore) {
    for layer in map.tile_layers().iter().filter(|layer| layer.visible) {
        for row in 0..layer.height {
            for col in 0..layer.width {
                let gid = layer.gid_at(col, row);
                if gid == 0 {
                    continue;
                }
                let cell = map.cell_rect(col, row);
                let (left, top) = world_to_screen_px(Vec2::new(cell.x, cell.y));
                let dst_w = cell.width.ceil() as i32;
                let dst_h = cell.height.ceil() as i32;

                let tile = map.tileset_for_gid(gid).and_then(|(tileset, local)| {
                    let (x, y, width, height) = tileset.source_rect(local)?;
                    let image_path = tileset.image.as_deref()?;
                    let source = SourceRect {
                        x,
                        y,
                        width,
                        height,
                    };
                    Some((image_path, source, tileset.name.as_str()))
                });
                if let Some((image_path, source, label)) = tile {
                    if let Some(image) = images.get(image_path, label) {
                        draw_region_scaled(
                            frame, viewport, image, source, left, top, dst_w, dst_h,
                        );
                        continue;
                    }
                }
                let fallback = TILE_FALLBACK_COLORS[gid as usize % TILE_FALLBACK_COLORS.len()];
                fill_rect(
                    frame,
                    viewport.width,
                    viewport.height,
                    left,
                    top,
                    dst_w,
                    dst_h,
                    fallback,
                );
            }
        }
    }
}

fn draw_entity(
    frame: &mut [u8],
    viewport: Viewport,
    catalog: &SpriteCatalog,
    images: &mut ImageStore,
    entity: &Entity,
) {
    let (cx, cy) = world_to_screen_px(entity.transform.position);
    if let RenderableKind::SpriteSheet(key) = &entity.renderable.kind {
        if let Some(sheet) = catalog.sheet(key) {
            if let Some(image) = images.get(&sheet.image_path, key) {
                let index =
                    sheet_frame_index(entity.facing, entity.moving, entity.animation_elapsed);
                if let Some(source) = sheet_frame_rect(image, sheet, index) {
                    let scale = normalized_scale(entity.renderable.scale);
                    let dst_w = (source.width as f32 * scale).round().max(1.0) as i32;
                    let dst_h = (source.height as f32 * scale).round().max(1.0) as i32;
                    draw_region_scaled(
                        frame,
                        viewport,
                        image,
                        source,
                        cx - dst_w / 2,
                        cy - dst_h / 2,
                        dst_w,
                        dst_h,
                    );
                    return;
                }
            }
        }
    }
    draw_square(
        frame,
        viewport,
        cx,
        cy,
        PLACEHOLDER_HALF_SIZE_PX,
        PLACEHOLDER_COLOR,
    );
}

/// Frames are laid out row-major on a grid of `frame_width x frame_height`
/// cells. An index past the end of the sheet falls back to frame 0.
fn sheet_frame_rect(
    image: &LoadedImage,
    sheet: &SpriteSheet,
    frame_index: usize,
) -> Option<SourceRect> {
    if sheet.frame_width == 0 || sheet.frame_height == 0 {
        return None;
    }
    let columns = (image.width / sheet.frame_width) as usize;
    let rows = (image.height / sheet.frame_height) as usize;
    let total = columns * rows;
    if total == 0 {
        return None;
    }
    let index = if frame_index < total { frame_index } else { 0 };
    Some(SourceRect {
        x: (index % columns) as u32 * sheet.frame_width,
        y: (index / columns) as u32 * sheet.frame_height,
        width: sheet.frame_width,
        height: sheet.frame_height,
    })
}

fn normalized_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn draw_square(
    frame: &mut [u8],
    viewport: Viewport,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    fill_rect(
        frame,
        viewport.width,
        viewport.height,
        cx - half_size,
        cy - half_size,
        half_size * 2 + 1,
        half_size * 2 + 1,
        color,
    );
}

/// Nearest-neighbour blit of `source` into the destination rectangle.
/// Fully transparent texels are skipped.
#[allow(clippy::too_many_arguments)]
fn draw_region_scaled(
    frame: &mut [u8],
    viewport: Viewport,
    image: &LoadedImage,
    source: SourceRect,
    left: i32,
    top: i32,
    dst_width: i32,
    dst_height: i32,
) {
    if dst_width <= 0 || dst_height <= 0 || source.width == 0 || source.height == 0 {
        return;
    }
    if source.x + source.width > image.width || source.y + source.height > image.height {
        return;
    }
    if image.rgba.len() < image.width as usize * image.height as usize * 4 {
        return;
    }

    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = left.saturating_add(dst_width).min(viewport.width as i32);
    let draw_bottom = top.saturating_add(dst_height).min(viewport.height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let x_ratio = source.width as f32 / dst_width as f32;
    let y_ratio = source.height as f32 / dst_height as f32;
    let image_width = image.width as usize;

    for out_y in draw_top..draw_bottom {
        let dy = (out_y - top) as f32;
        let src_y = ((dy * y_ratio).floor() as u32).min(source.height - 1) + source.y;
        for out_x in draw_left..draw_right {
            let dx = (out_x - left) as f32;
            let src_x = ((dx * x_ratio).floor() as u32).min(source.width - 1) + source.x;
            let offset = (src_y as usize * image_width + src_x as usize) * 4;
            let texel = [
                image.rgba[offset],
                image.rgba[offset + 1],
                image.rgba[offset + 2],
                image.rgba[offset + 3],
            ];
            if texel[3] == 0 {
                continue;
            }
            blend_pixel(
                frame,
                viewport.width as usize,
                out_x as usize,
                out_y as usize,
                texel,
            );
        }
    }
}

fn load_image_rgba(path: &Path) -> Result<LoadedImage, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedImage {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Footprint, RenderableDesc, TextPanel, Transform};
    use tempfile::TempDir;

    const VIEWPORT: Viewport = Viewport {
        width: 64,
        height: 64,
    };

    fn pixel(frame: &[u8], x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * VIEWPORT.width + x) * 4) as usize;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    fn blank_frame() -> Vec<u8> {
        vec![0; (VIEWPORT.width * VIEWPORT.height * 4) as usize]
    }

    fn spawn_at(world: &mut SceneWorld, x: f32, y: f32, kind: RenderableKind, depth: i32) {
        world.spawn(
            Transform {
                position: Vec2::new(x, y),
            },
            Footprint::default(),
            RenderableDesc {
                kind,
                scale: 1.0,
                depth,
                debug_name: "test".to_string(),
            },
        );
    }

    fn render(
        catalog: &SpriteCatalog,
        images: &mut ImageStore,
        world: &SceneWorld,
        overlay: Option<&SceneWorld>,
    ) -> Vec<u8> {
        let mut frame = blank_frame();
        compose_frame(
            &mut frame,
            VIEWPORT,
            catalog,
            images,
            &mut Vec::new(),
            world,
            overlay,
        );
        frame
    }

    #[test]
    fn draw_order_sorts_by_depth_then_y() {
        let mut world = SceneWorld::default();
        spawn_at(&mut world, 0.0, 30.0, RenderableKind::Placeholder, 1);
        spawn_at(&mut world, 0.0, 20.0, RenderableKind::Placeholder, 0);
        spawn_at(&mut world, 0.0, 10.0, RenderableKind::Placeholder, 0);
        world.apply_pending();

        let mut order = Vec::new();
        sorted_draw_order(world.entities(), &mut order);
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn missing_sheet_draws_placeholder_and_warns_once() {
        let temp = TempDir::new().expect("temp dir");
        let mut catalog = SpriteCatalog::default();
        catalog
            .register("monk1", "missing.png", 32, 48)
            .expect("register");
        let mut images = ImageStore::new(temp.path().to_path_buf());
        let mut world = SceneWorld::default();
        let monk = RenderableKind::SpriteSheet("monk1".to_string());
        spawn_at(&mut world, 20.0, 20.0, monk.clone(), 0);
        spawn_at(&mut world, 40.0, 40.0, monk, 0);
        world.apply_pending();

        let frame = render(&catalog, &mut images, &world, None);

        assert_eq!(pixel(&frame, 20, 20), PLACEHOLDER_COLOR);
        assert_eq!(pixel(&frame, 40, 40), PLACEHOLDER_COLOR);
        assert_eq!(pixel(&frame, 0, 0), CLEAR_COLOR);
        assert_eq!(images.warned.len(), 1);
    }

    #[test]
    fn sheet_frame_follows_animation_state() {
        let temp = TempDir::new().expect("temp dir");
        // Two 2x2 frames side by side: red, then blue.
        let mut sheet = image::RgbaImage::new(4, 2);
        for (x, _, texel) in sheet.enumerate_pixels_mut() {
            *texel = if x < 2 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            };
        }
        sheet.save(temp.path().join("sheet.png")).expect("save sheet");

        let mut catalog = SpriteCatalog::default();
        catalog.register("tiny", "sheet.png", 2, 2).expect("register");
        let mut images = ImageStore::new(temp.path().to_path_buf());
        let mut world = SceneWorld::default();
        spawn_at(
            &mut world,
            10.0,
            10.0,
            RenderableKind::SpriteSheet("tiny".to_string()),
            0,
        );
        world.apply_pending();

        let frame = render(&catalog, &mut images, &world, None);
        assert_eq!(pixel(&frame, 10, 10), [255, 0, 0, 255]);

        // 1/8s of walking down advances to the second frame of the row.
        let id = world.entities()[0].id;
        let entity = world.find_entity_mut(id).expect("sprite entity");
        entity.moving = true;
        entity.animation_elapsed = 0.125;
        let frame = render(&catalog, &mut images, &world, None);
        assert_eq!(pixel(&frame, 10, 10), [0, 0, 255, 255]);
    }

    #[test]
    fn frame_index_past_sheet_end_falls_back_to_first_frame() {
        let image = LoadedImage {
            width: 64,
            height: 48,
            rgba: vec![0; 64 * 48 * 4],
        };
        let sheet = SpriteSheet {
            image_path: PathBuf::from("x.png"),
            frame_width: 32,
            frame_height: 48,
        };
        assert_eq!(
            sheet_frame_rect(&image, &sheet, 1),
            Some(SourceRect {
                x: 32,
                y: 0,
                width: 32,
                height: 48
            })
        );
        assert_eq!(
            sheet_frame_rect(&image, &sheet, 12).map(|rect| rect.x),
            Some(0)
        );
    }

    #[test]
    fn overlay_dims_the_paused_world() {
        let catalog = SpriteCatalog::default();
        let mut images = ImageStore::new(PathBuf::from("."));
        let world = SceneWorld::default();
        let mut overlay = SceneWorld::default();
        overlay.set_panel(TextPanel::new("Quest", "Sort the scrolls."));

        let frame = render(&catalog, &mut images, &world, Some(&overlay));
        assert!(pixel(&frame, 0, 0)[2] < CLEAR_COLOR[2]);
    }

    #[test]
    fn clipped_blit_never_writes_outside_the_frame() {
        let image = LoadedImage {
            width: 2,
            height: 2,
            rgba: vec![255; 16],
        };
        let source = SourceRect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let mut frame = blank_frame();
        draw_region_scaled(&mut frame, VIEWPORT, &image, source, -10, -10, 20, 20);
        draw_region_scaled(&mut frame, VIEWPORT, &image, source, 60, 60, 20, 20);
        assert_eq!(pixel(&frame, 0, 0), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 63, 63), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 30, 30), [0, 0, 0, 0]);
    }
}
