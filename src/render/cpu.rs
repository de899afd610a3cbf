use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{GpuHandle, NodeId, ShaderId};
use crate::foundation::math::{mul_div255_u8, premul_over_px};
use crate::render::backend::{FrameRGBA, RenderBackend, ScissorRect};
use crate::render::quads::{QuadBatch, QuadRecord};
use crate::texture::source::TextureSourceData;

/// Rasterizes quad batches with `vello_cpu` into in-memory pixmaps.
///
/// Only the default shader exists here; other shader ids draw as plain textured quads.
/// Corner colours are interpolated across each quad and multiply the texture.
pub struct CpuBackend {
    screen: CpuSurface,
    surfaces: HashMap<GpuHandle, CpuSurface>,
    contexts: HashMap<(u16, u16), vello_cpu::RenderContext>,
    next_handle: u64,
    target: Option<GpuHandle>,
    scissor: Option<ScissorRect>,
    texture: Option<GpuHandle>,
    warned_shader: bool,
}

struct CpuSurface {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
    /// Image paint built from `pixmap`; dropped whenever the pixels change.
    paint: Option<vello_cpu::Image>,
}

impl CpuSurface {
    fn new(width: u32, height: u32) -> StageResult<Self> {
        let (w, h) = dims_u16(width, height)?;
        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
            paint: None,
        })
    }

    fn image_paint(&mut self) -> StageResult<vello_cpu::Image> {
        if let Some(p) = &self.paint {
            return Ok(p.clone());
        }
        let pixmap = pixmap_from_premul_bytes(
            self.pixmap.data_as_u8_slice(),
            u32::from(self.width),
            u32::from(self.height),
        )?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.paint = Some(paint.clone());
        Ok(paint)
    }
}

/// Premultiplied opaque white in vertex colour bits.
const WHITE_ABGR: u32 = 0xffff_ffff;

/// How the bound texture is painted.
enum Fill {
    /// 1x1 texture: a flat premultiplied colour.
    Solid([u8; 4]),
    Image {
        paint: vello_cpu::Image,
        width: f64,
        height: f64,
    },
}

impl CpuBackend {
    pub fn new(width: u32, height: u32) -> StageResult<Self> {
        Ok(Self {
            screen: CpuSurface::new(width, height)?,
            surfaces: HashMap::new(),
            contexts: HashMap::new(),
            next_handle: 0,
            target: None,
            scissor: None,
            texture: None,
            warned_shader: false,
        })
    }

    fn alloc(&mut self) -> GpuHandle {
        self.next_handle += 1;
        GpuHandle(self.next_handle)
    }

    fn bound_surface(&mut self) -> StageResult<&mut CpuSurface> {
        match self.target {
            None => Ok(&mut self.screen),
            Some(t) => self
                .surfaces
                .get_mut(&t)
                .ok_or_else(|| StageError::backend(format!("render target {t:?} was freed"))),
        }
    }

    fn bound_fill(&mut self) -> StageResult<Fill> {
        let Some(t) = self.texture else {
            return Err(StageError::backend("draw without a bound texture"));
        };
        let s = self
            .surfaces
            .get_mut(&t)
            .ok_or_else(|| StageError::backend(format!("texture {t:?} was freed")))?;
        if s.width == 1 && s.height == 1 {
            let p = s.pixmap.data_as_u8_slice();
            return Ok(Fill::Solid([p[0], p[1], p[2], p[3]]));
        }
        Ok(Fill::Image {
            paint: s.image_paint()?,
            width: f64::from(s.width),
            height: f64::from(s.height),
        })
    }
    /// Rasterize `quads` onto the bound surface in order.
    ///
    /// Runs of quads with a flat tint are rendered together. A quad whose corners differ, or an
    /// image quad with any tint, is rendered on its own and multiplied by the interpolated
    /// corner colours.
    fn draw_records(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        fill: &Fill,
        batch: &QuadBatch,
        quads: Range<usize>,
        scissor: Option<ScissorRect>,
        (w, h): (u16, u16),
    ) -> StageResult<()> {
        ctx.reset();
        let mut pending = false;
        for i in quads {
            let Some(rec) = batch.record(i) else {
                return Err(StageError::backend("draw range past end of quad batch"));
            };
            if !needs_tint_pass(fill, &rec.colors) {
                pending |= paint_quad(ctx, fill, rec, Some(abgr_to_rgba(rec.colors[0])));
                continue;
            }

            if pending {
                let scratch = render_scratch(ctx, w, h);
                self.composite(&scratch, scissor)?;
                ctx.reset();
                pending = false;
            }
            let affine = rec.ctx.to_affine();
            if affine.determinant().abs() < f64::EPSILON || !paint_quad(ctx, fill, rec, None) {
                ctx.reset();
                continue;
            }
            let mut scratch = render_scratch(ctx, w, h);
            ctx.reset();
            let bbox = affine.transform_rect_bbox(Rect::new(0.0, 0.0, rec.width, rec.height));
            let Some(region) = clamp_region(bbox, scissor, u32::from(w), u32::from(h)) else {
                continue;
            };
            tint_region(
                scratch.data_as_u8_slice_mut(),
                u32::from(w),
                region,
                affine.inverse(),
                (rec.width, rec.height),
                rec.colors.map(abgr_to_rgba),
            );
            self.composite(&scratch, Some(region))?;
        }
        if pending {
            let scratch = render_scratch(ctx, w, h);
            self.composite(&scratch, scissor)?;
        }
        Ok(())
    }

    fn composite(
        &mut self,
        scratch: &vello_cpu::Pixmap,
        region: Option<ScissorRect>,
    ) -> StageResult<()> {
        let dst = self.bound_surface()?;
        let (w, h) = (u32::from(dst.width), u32::from(dst.height));
        composite_over(
            dst.pixmap.data_as_u8_slice_mut(),
            scratch.data_as_u8_slice(),
            w,
            h,
            region,
        );
        dst.paint = None;
        Ok(())
    }
}

impl RenderBackend for CpuBackend {
    fn create_render_target(&mut self, width: u32, height: u32) -> StageResult<GpuHandle> {
        let surface = CpuSurface::new(width, height)?;
        let handle = self.alloc();
        self.surfaces.insert(handle, surface);
        Ok(handle)
    }

    fn free_render_target(&mut self, target: GpuHandle) {
        self.surfaces.remove(&target);
    }

    fn upload_texture(&mut self, data: &TextureSourceData) -> StageResult<GpuHandle> {
        let (w, h) = dims_u16(data.width, data.height)?;
        let pixmap = pixmap_from_premul_bytes(&data.pixels, data.width, data.height)?;
        let handle = self.alloc();
        self.surfaces.insert(
            handle,
            CpuSurface {
                width: w,
                height: h,
                pixmap,
                paint: None,
            },
        );
        Ok(handle)
    }

    fn free_texture(&mut self, texture: GpuHandle) {
        self.surfaces.remove(&texture);
    }

    fn begin_frame(&mut self) -> StageResult<()> {
        self.target = None;
        self.scissor = None;
        self.texture = None;
        Ok(())
    }

    fn bind_render_target(&mut self, target: Option<GpuHandle>) -> StageResult<()> {
        if let Some(t) = target
            && !self.surfaces.contains_key(&t)
        {
            return Err(StageError::backend(format!("unknown render target {t:?}")));
        }
        self.target = target;
        Ok(())
    }

    fn clear(&mut self, rgba: [u8; 4]) -> StageResult<()> {
        let s = self.bound_surface()?;
        for px in s.pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        s.paint = None;
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Option<ScissorRect>) -> StageResult<()> {
        self.scissor = scissor;
        Ok(())
    }

    fn bind_shader(&mut self, shader: ShaderId, _owner: Option<NodeId>) -> StageResult<()> {
        if !shader.is_default() && !self.warned_shader {
            tracing::warn!(shader = shader.0, "cpu backend draws custom shaders as default");
            self.warned_shader = true;
        }
        Ok(())
    }

    fn bind_texture(&mut self, texture: GpuHandle) -> StageResult<()> {
        if !self.surfaces.contains_key(&texture) {
            return Err(StageError::backend(format!("unknown texture {texture:?}")));
        }
        self.texture = Some(texture);
        Ok(())
    }

    fn draw_quads(&mut self, batch: &QuadBatch, quads: Range<usize>) -> StageResult<()> {
        if self.target.is_some() && self.texture == self.target {
            return Err(StageError::backend("texture is bound as its own render target"));
        }
        let fill = self.bound_fill()?;
        let scissor = self.scissor;
        let (w, h) = {
            let s = self.bound_surface()?;
            (s.width, s.height)
        };

        let mut ctx = self
            .contexts
            .remove(&(w, h))
            .unwrap_or_else(|| vello_cpu::RenderContext::new(w, h));
        let drawn = self.draw_records(&mut ctx, &fill, batch, quads, scissor, (w, h));
        self.contexts.insert((w, h), ctx);
        drawn
    }

    fn readback_rgba8(&mut self) -> StageResult<Option<FrameRGBA>> {
        Ok(Some(FrameRGBA {
            width: u32::from(self.screen.width),
            height: u32::from(self.screen.height),
            data: self.screen.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }))
    }
}

/// Whether the quad's colours cannot be expressed as one flat paint.
fn needs_tint_pass(fill: &Fill, colors: &[u32; 4]) -> bool {
    match fill {
        Fill::Solid(_) => colors.iter().any(|c| *c != colors[0]),
        Fill::Image { .. } => colors.iter().any(|c| *c != WHITE_ABGR),
    }
}

/// Queue one quad on `ctx`. A solid fill is multiplied by `flat` when given; image fills ignore
/// it. Returns `false` for a degenerate texture region.
fn paint_quad(
    ctx: &mut vello_cpu::RenderContext,
    fill: &Fill,
    rec: &QuadRecord,
    flat: Option<[u8; 4]>,
) -> bool {
    ctx.set_transform(affine_to_cpu(rec.ctx.to_affine()));
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    let rect = vello_cpu::kurbo::Rect::new(0.0, 0.0, rec.width, rec.height);
    match fill {
        Fill::Solid(texel) => {
            let tint = flat.unwrap_or([255; 4]);
            let premul =
                [0, 1, 2, 3].map(|c| mul_div255_u8(u16::from(texel[c]), u16::from(tint[c])));
            let [r, g, b, a] = unpremultiply(premul);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        }
        Fill::Image {
            paint,
            width,
            height,
        } => {
            let [u0, v0, u1, v1] = rec.coords.map(f64::from);
            let (du, dv) = ((u1 - u0) * width, (v1 - v0) * height);
            if du.abs() < f64::EPSILON || dv.abs() < f64::EPSILON {
                return false;
            }
            let (sx, sy) = (rec.width / du, rec.height / dv);
            ctx.set_paint(paint.clone());
            ctx.set_paint_transform(affine_to_cpu(Affine::new([
                sx,
                0.0,
                0.0,
                sy,
                -u0 * width * sx,
                -v0 * height * sy,
            ])));
        }
    }
    ctx.fill_rect(&rect);
    true
}

fn render_scratch(ctx: &mut vello_cpu::RenderContext, w: u16, h: u16) -> vello_cpu::Pixmap {
    ctx.flush();
    let mut scratch = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut scratch);
    scratch
}

/// Pixel rectangle covering `bbox`, limited to the surface and `scissor`.
fn clamp_region(bbox: Rect, scissor: Option<ScissorRect>, w: u32, h: u32) -> Option<ScissorRect> {
    let (mut x0, mut y0) = (bbox.x0.floor().max(0.0), bbox.y0.floor().max(0.0));
    let (mut x1, mut y1) = (
        bbox.x1.ceil().min(f64::from(w)),
        bbox.y1.ceil().min(f64::from(h)),
    );
    if let Some(s) = scissor {
        x0 = x0.max(f64::from(s.x));
        y0 = y0.max(f64::from(s.y));
        x1 = x1.min(f64::from(s.x) + f64::from(s.width));
        y1 = y1.min(f64::from(s.y) + f64::from(s.height));
    }
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(ScissorRect {
        x: x0 as i32,
        y: y0 as i32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Multiply premultiplied pixels in `region` by the bilinear blend of the corner colours
/// (top-left, top-right, bottom-right, bottom-left), sampled at each pixel centre.
fn tint_region(
    px: &mut [u8],
    w: u32,
    region: ScissorRect,
    inverse: Affine,
    (qw, qh): (f64, f64),
    corners: [[u8; 4]; 4],
) {
    let [tl, tr, br, bl] = corners;
    for y in region.y as u32..region.y as u32 + region.height {
        for x in region.x as u32..region.x as u32 + region.width {
            let local = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let s = (local.x / qw).clamp(0.0, 1.0);
            let t = (local.y / qh).clamp(0.0, 1.0);
            let i = ((y * w + x) * 4) as usize;
            let Some(p) = px.get_mut(i..i + 4) else {
                continue;
            };
            for c in 0..4 {
                let tint = f64::from(tl[c]) * (1.0 - s) * (1.0 - t)
                    + f64::from(tr[c]) * s * (1.0 - t)
                    + f64::from(br[c]) * s * t
                    + f64::from(bl[c]) * (1.0 - s) * t;
                p[c] = (f64::from(p[c]) * tint / 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn dims_u16(width: u32, height: u32) -> StageResult<(u16, u16)> {
    if width == 0 || height == 0 {
        return Err(StageError::validation("surface dimensions must be > 0"));
    }
    let w: u16 = width
        .try_into()
        .map_err(|_| StageError::validation("surface width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StageError::validation("surface height exceeds u16"))?;
    Ok((w, h))
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

/// `0xAABBGGRR` vertex colour bits to `[r, g, b, a]`.
fn abgr_to_rgba(bits: u32) -> [u8; 4] {
    let [a, b, g, r] = bits.to_be_bytes();
    [r, g, b, a]
}

fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
    [un(r), un(g), un(b), a]
}

/// Source-over `src` onto `dst`, limited to `scissor` when set.
fn composite_over(dst: &mut [u8], src: &[u8], w: u32, h: u32, scissor: Option<ScissorRect>) {
    let (x0, y0, x1, y1) = match scissor {
        None => (0, 0, w, h),
        Some(s) => {
            let x0 = s.x.max(0) as u32;
            let y0 = s.y.max(0) as u32;
            let x1 = (i64::from(s.x) + i64::from(s.width)).clamp(0, i64::from(w)) as u32;
            let y1 = (i64::from(s.y) + i64::from(s.height)).clamp(0, i64::from(h)) as u32;
            (x0.min(w), y0.min(h), x1, y1)
        }
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let i = ((y * w + x) * 4) as usize;
            let (Some(d), Some(s)) = (dst.get(i..i + 4), src.get(i..i + 4)) else {
                continue;
            };
            let out = premul_over_px([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            dst[i..i + 4].copy_from_slice(&out);
        }
    }
}

fn pixmap_from_premul_bytes(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> StageResult<vello_cpu::Pixmap> {
    let (w, h) = dims_u16(width, height)?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(StageError::validation("texture byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        may_have_opacities |= px[3] != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}
