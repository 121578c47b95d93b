//! Triangle rasterization: near-plane clipping, face culling and
//! perspective-correct attribute interpolation.

use glam::{Vec2, Vec3, Vec4};

/// Per-vertex values interpolated across a triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Varying {
    pub world: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub color: Vec4,
}

impl Varying {
    fn scale(&self, s: f32) -> Self {
        Self {
            world: self.world * s,
            normal: self.normal * s,
            uv: self.uv * s,
            color: self.color * s,
        }
    }

    fn add(&self, other: &Self) -> Self {
        Self {
            world: self.world + other.world,
            normal: self.normal + other.normal,
            uv: self.uv + other.uv,
            color: self.color + other.color,
        }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        self.scale(1.0 - t).add(&other.scale(t))
    }
}

/// A vertex after the vertex stage: clip-space position plus varyings.
#[derive(Debug, Clone, Copy)]
pub struct ClipVertex {
    pub clip: Vec4,
    pub varying: Varying,
}

/// Which faces survive rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cull {
    /// Draw counter-clockwise (front) faces only.
    Back,
    /// Draw clockwise (back) faces only.
    Front,
    None,
}

/// One covered pixel.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub x: usize,
    pub y: usize,
    /// Window depth in [0, 1].
    pub depth: f32,
    pub varying: Varying,
    pub front_facing: bool,
}

/// Clip a triangle against the near plane (`z >= -w`). Returns 0, 3 or 4
/// vertices in winding order.
fn clip_near(triangle: &[ClipVertex; 3]) -> Vec<ClipVertex> {
    let distance = |v: &ClipVertex| v.clip.z + v.clip.w;
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let a = &triangle[i];
        let b = &triangle[(i + 1) % 3];
        let (da, db) = (distance(a), distance(b));
        if da >= 0.0 {
            out.push(*a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            let t = da / (da - db);
            out.push(ClipVertex {
                clip: a.clip.lerp(b.clip, t),
                varying: a.varying.lerp(&b.varying, t),
            });
        }
    }
    out
}

struct ScreenVertex {
    x: f32,
    y: f32,
    depth: f32,
    inv_w: f32,
    varying: Varying,
}

fn to_screen(v: &ClipVertex, width: usize, height: usize) -> Option<ScreenVertex> {
    if v.clip.w <= 0.0 {
        return None;
    }
    let inv_w = 1.0 / v.clip.w;
    let ndc = v.clip.truncate() * inv_w;
    Some(ScreenVertex {
        x: (ndc.x + 1.0) * 0.5 * width as f32,
        y: (1.0 - ndc.y) * 0.5 * height as f32,
        depth: ndc.z * 0.5 + 0.5,
        inv_w,
        varying: v.varying.scale(inv_w),
    })
}

/// Rasterize one triangle into a `width` x `height` target, calling
/// `fragment` for every covered pixel centre.
pub fn draw_triangle(
    triangle: &[ClipVertex; 3],
    width: usize,
    height: usize,
    cull: Cull,
    fragment: &mut impl FnMut(Fragment),
) {
    let polygon = clip_near(triangle);
    if polygon.len() < 3 {
        return;
    }
    let screen: Option<Vec<ScreenVertex>> = polygon.iter().map(|v| to_screen(v, width, height)).collect();
    let Some(screen) = screen else {
        return;
    };
    for k in 1..screen.len() - 1 {
        draw_screen_triangle([&screen[0], &screen[k], &screen[k + 1]], width, height, cull, fragment);
    }
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

fn draw_screen_triangle(
    v: [&ScreenVertex; 3],
    width: usize,
    height: usize,
    cull: Cull,
    fragment: &mut impl FnMut(Fragment),
) {
    let p = [(v[0].x, v[0].y), (v[1].x, v[1].y), (v[2].x, v[2].y)];
    let area = edge(p[0], p[1], p[2]);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    // Screen y points down, so counter-clockwise in NDC has negative area.
    let front_facing = area < 0.0;
    match cull {
        Cull::Back if !front_facing => return,
        Cull::Front if front_facing => return,
        _ => {}
    }

    let min_x = p.iter().map(|q| q.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
    let min_y = p.iter().map(|q| q.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
    let max_x = (p.iter().map(|q| q.0).fold(f32::NEG_INFINITY, f32::max).ceil() as usize).min(width);
    let max_y = (p.iter().map(|q| q.1).fold(f32::NEG_INFINITY, f32::max).ceil() as usize).min(height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let centre = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(p[1], p[2], centre) / area;
            let w1 = edge(p[2], p[0], centre) / area;
            let w2 = edge(p[0], p[1], centre) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = w0 * v[0].depth + w1 * v[1].depth + w2 * v[2].depth;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            let inv_w = w0 * v[0].inv_w + w1 * v[1].inv_w + w2 * v[2].inv_w;
            let varying = v[0]
                .varying
                .scale(w0)
                .add(&v[1].varying.scale(w1))
                .add(&v[2].varying.scale(w2))
                .scale(1.0 / inv_w);

            fragment(Fragment {
                x,
                y,
                depth,
                varying,
                front_facing,
            });
        }
    }
}
