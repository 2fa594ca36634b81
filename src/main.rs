// src/main.rs
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use pollster::block_on;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use shimmer::composite::CompositeParams;
use shimmer::driver::{BackgroundSource, RippleDriver};
use shimmer::effects::{self, Effect, EffectParams};
use shimmer::field::Resolution;
use shimmer::ripple::RippleParams;
use shimmer::tuning::{rgb01, ColorTransition, ControlPanel, Transition};

// -----------------------------
// Embedded WGSL blit shader (no external files)
// -----------------------------
const BLIT_WGSL: &str = r#"
struct VSOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VSOut {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -3.0),
    vec2<f32>( 3.0,  1.0),
    vec2<f32>(-1.0,  1.0)
  );
  var uv = array<vec2<f32>, 3>(
    vec2<f32>(0.0, 2.0),
    vec2<f32>(2.0, 0.0),
    vec2<f32>(0.0, 0.0)
  );

  var o: VSOut;
  o.pos = vec4<f32>(p[vi], 0.0, 1.0);
  o.uv  = uv[vi];
  return o;
}

@group(0) @binding(0) var samp: sampler;
@group(0) @binding(1) var tex: texture_2d<f32>;

@fragment
fn fs_main(i: VSOut) -> @location(0) vec4<f32> {
  return textureSample(tex, samp, i.uv);
}
"#;

// -----------------------------
// Tiny bitmap font (5x7) + overlay draw into the upload buffer
// -----------------------------
fn glyph_5x7(c: char) -> [u8; 7] {
    match c {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b11111],
        'J' => [0b11111, 0b00010, 0b00010, 0b00010, 0b10010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],

        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b10000, 0b11110, 0b00001, 0b00001, 0b11110],
        '6' => [0b01110, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],

        ':' => [0b00000, 0b00100, 0b00100, 0b00000, 0b00100, 0b00100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00100, 0b00100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '%' => [0b11001, 0b11010, 0b00100, 0b01000, 0b10110, 0b00110, 0b00000],
        '/' => [0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        ' ' => [0, 0, 0, 0, 0, 0, 0],
        _ => [0, 0, 0, 0, 0, 0, 0],
    }
}

fn draw_text_5x7_rgba(
    img: &mut [u8],
    bpr: usize,
    w: i32,
    h: i32,
    mut x: i32,
    mut y: i32,
    text: &str,
    scale: i32,
    rgba: [u8; 4],
) {
    let scale = scale.max(1);
    for ch in text.chars() {
        let c = if ch.is_ascii_lowercase() {
            ch.to_ascii_uppercase()
        } else {
            ch
        };
        let g = glyph_5x7(c);

        for (row, bits) in g.iter().enumerate() {
            for col in 0..5 {
                if (bits >> (4 - col)) & 1 == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let px = x + col as i32 * scale + sx;
                        let py = y + row as i32 * scale + sy;
                        if px < 0 || py < 0 || px >= w || py >= h {
                            continue;
                        }
                        let off = py as usize * bpr + px as usize * 4;
                        if off + 3 < img.len() {
                            img[off] = rgba[0];
                            img[off + 1] = rgba[1];
                            img[off + 2] = rgba[2];
                            img[off + 3] = rgba[3];
                        }
                    }
                }
            }
        }

        // spacing: 1 px (scaled)
        x += (5 + 1) * scale;
        if x > w {
            x = 0;
            y += (7 + 2) * scale;
        }
    }
}

fn text_px_width_5x7(text: &str, scale: i32) -> i32 {
    let scale = scale.max(1);
    let n = text.chars().count() as i32;
    if n <= 0 {
        0
    } else {
        n * (5 + 1) * scale
    }
}

fn text_px_height_5x7(lines: usize, scale: i32) -> i32 {
    let scale = scale.max(1);
    (lines as i32) * (7 + 2) * scale
}

// -----------------------------
// Rendering (wgpu)
// -----------------------------
struct Gfx {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    blit_pipeline: wgpu::RenderPipeline,
    blit_bind: wgpu::BindGroup,
    blit_bgl: wgpu::BindGroupLayout,
    blit_sampler: wgpu::Sampler,

    tex: wgpu::Texture,
    tex_view: wgpu::TextureView,

    tex_w: u32,
    tex_h: u32,
    bpr: u32,
    upload: Vec<u8>,
}

impl Gfx {
    async fn new(window: Arc<Window>, width: u32, height: u32) -> Self {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("No suitable GPU adapters found");

        log::info!("GPU adapter: {}", adapter.get_info().name);

        let limits = wgpu::Limits::default();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            })
            .await
            .expect("request_device failed");

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats[0];
        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            caps.present_modes[0]
        };
        let alpha_mode = caps.alpha_modes[0];

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let (tex, tex_view, tex_w, tex_h, bpr, upload) =
            Self::make_pixel_texture(&device, config.width, config.height);

        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let blit_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
            ],
        });

        let blit_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind"),
            layout: &blit_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&blit_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&tex_view),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit_shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_WGSL.into()),
        });

        let pl_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pl_layout"),
            bind_group_layouts: &[&blit_bgl],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit_pipeline"),
            layout: Some(&pl_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            surface,
            device,
            queue,
            config,
            blit_pipeline,
            blit_bind,
            blit_bgl,
            blit_sampler,
            tex,
            tex_view,
            tex_w,
            tex_h,
            bpr,
            upload,
        }
    }

    fn make_pixel_texture(
        device: &wgpu::Device,
        w: u32,
        h: u32,
    ) -> (wgpu::Texture, wgpu::TextureView, u32, u32, u32, Vec<u8>) {
        let tex_w = w.max(1);
        let tex_h = h.max(1);

        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pixel_tex"),
            size: wgpu::Extent3d {
                width: tex_w,
                height: tex_h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let tex_view = tex.create_view(&wgpu::TextureViewDescriptor::default());

        let tight_bpr = 4 * tex_w;
        let bpr = ((tight_bpr + 255) / 256) * 256;
        let upload = vec![0u8; (bpr * tex_h) as usize];

        (tex, tex_view, tex_w, tex_h, bpr, upload)
    }

    fn resize(&mut self, new_w: u32, new_h: u32) {
        self.config.width = new_w.max(1);
        self.config.height = new_h.max(1);
        self.surface.configure(&self.device, &self.config);

        let (tex, tex_view, tex_w, tex_h, bpr, upload) =
            Self::make_pixel_texture(&self.device, self.config.width, self.config.height);

        self.tex = tex;
        self.tex_view = tex_view;
        self.tex_w = tex_w;
        self.tex_h = tex_h;
        self.bpr = bpr;
        self.upload = upload;

        self.blit_bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind"),
            layout: &self.blit_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&self.blit_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.tex_view),
                },
            ],
        });
    }

    /// Push the upload buffer to the pixel texture.
    fn flush_upload(&mut self) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.upload,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.bpr),
                rows_per_image: Some(self.tex_h),
            },
            wgpu::Extent3d {
                width: self.tex_w,
                height: self.tex_h,
                depth_or_array_layers: 1,
            },
        );
    }

    fn render(&mut self) {
        let frame = match self.surface.get_current_texture() {
            Ok(f) => f,
            Err(_) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut enc = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("enc") });

        {
            let mut rp = enc.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.blit_pipeline);
            rp.set_bind_group(0, &self.blit_bind, &[]);
            rp.draw(0..3, 0..1);
        }

        self.queue.submit(Some(enc.finish()));
        frame.present();
    }
}

// -----------------------------
// Idle auto-drip (keeps the ripple alive when nobody is touching it)
// -----------------------------
struct AutoDrip {
    // normalized 0..1 window coordinates, resize-proof
    x: Transition,
    y: Transition,
    rate: Transition,
    press_until: f32,
    pressed: bool,
}

impl AutoDrip {
    fn new<R: Rng + ?Sized>(rng: &mut R, panel: &ControlPanel) -> Self {
        let wander = panel.drip.wander;
        let mut x = Transition::new(rng.random_range(0.1..0.9), 0.05, 0.95, wander.min, wander.max);
        let mut y = Transition::new(rng.random_range(0.1..0.9), 0.05, 0.95, wander.min, wander.max);
        x.set_target(0.0, x.cur, wander.pick(rng));
        y.set_target(0.0, y.cur, wander.pick(rng));

        Self {
            x,
            y,
            rate: panel.drip.drips_per_second.make_transition(),
            press_until: -1.0,
            pressed: false,
        }
    }

    fn tick<R: Rng + ?Sized>(
        &mut self,
        now: f32,
        dt: f32,
        rng: &mut R,
        panel: &ControlPanel,
        driver: &mut RippleDriver,
        viewport: (f32, f32),
    ) {
        self.x.maybe_new_target(now, rng, |r| r.random_range(0.05..0.95));
        self.y.maybe_new_target(now, rng, |r| r.random_range(0.05..0.95));
        self.x.update(now);
        self.y.update(now);

        panel.drip.drips_per_second.maybe_retarget(&mut self.rate, now, rng);
        self.rate.update(now);

        driver.on_pointer_move(self.x.cur * viewport.0, self.y.cur * viewport.1);

        if self.pressed {
            if now >= self.press_until {
                driver.on_pointer_up();
                self.pressed = false;
            }
        } else {
            let p = (self.rate.cur * dt).clamp(0.0, 1.0);
            if rng.random::<f32>() < p {
                self.press_until = now + panel.drip.press_duration.pick(rng);
                driver.on_pointer_down();
                self.pressed = true;
            }
        }
    }

    /// Let go when real input takes over.
    fn release(&mut self, driver: &mut RippleDriver) {
        if self.pressed {
            driver.on_pointer_up();
            self.pressed = false;
        }
    }
}

// -----------------------------
// App
// -----------------------------
struct Options {
    windowed: bool,
    debug: bool,
    background: Option<PathBuf>,
    effect: Effect,
}

struct App {
    windowed: bool,
    debug: bool,

    window: Option<Arc<Window>>,
    gfx: Option<Gfx>,

    driver: RippleDriver,
    effect: Effect,
    effect_idx: usize,

    panel: ControlPanel,
    rng: StdRng,
    drip: Option<AutoDrip>,

    // animated effect dials
    speed_tr: Transition,
    scale_tr: Transition,
    pal: [ColorTransition; 3],

    // flash overlay
    flash_text: Option<String>,
    flash_until: Option<Instant>,

    // debug stats cache (for overlay)
    dbg_cpu: f32,
    dbg_mem_pct: f32,
    dbg_fps: u64,
    dbg_sps: u64,

    overlay_lines: Vec<String>,

    // time
    t0: Instant,
    last_frame: Instant,
    last_user_input: Instant,

    last_stat: Instant,
    frames: u64,
    sim_frames: u64,

    sys: System,
}

impl App {
    fn new(options: Options) -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_all();

        // Real dimensions arrive in resumed(); these defaults only seed the
        // dials until then.
        let panel = ControlPanel::for_display(1280, 720);
        let rng = StdRng::seed_from_u64(panel.rng_seed);

        let background_source = match options.background {
            Some(path) => BackgroundSource::Image(path),
            None => BackgroundSource::Synthesized,
        };
        let driver = RippleDriver::new(
            RippleParams::default(),
            CompositeParams::default(),
            background_source,
        );

        let effect = options.effect;
        let effect_idx = Effect::all()
            .iter()
            .position(|&e| e == effect)
            .unwrap_or(0);

        Self {
            windowed: options.windowed,
            debug: options.debug,
            window: None,
            gfx: None,
            driver,
            effect,
            effect_idx,
            speed_tr: panel.motion.speed.make_transition(),
            scale_tr: panel.motion.scale.make_transition(),
            pal: [
                panel.palette.color1.make_transition(),
                panel.palette.color2.make_transition(),
                panel.palette.color3.make_transition(),
            ],
            panel,
            rng,
            drip: None,
            flash_text: None,
            flash_until: None,
            dbg_cpu: 0.0,
            dbg_mem_pct: 0.0,
            dbg_fps: 0,
            dbg_sps: 0,
            overlay_lines: Vec::with_capacity(8),
            t0: Instant::now(),
            last_frame: Instant::now(),
            last_user_input: Instant::now(),
            last_stat: Instant::now(),
            frames: 0,
            sim_frames: 0,
            sys,
        }
    }

    fn set_flash(&mut self, text: &str) {
        if self.debug {
            self.flash_text = Some(text.to_string());
            self.flash_until = Some(Instant::now() + Duration::from_secs(2));
        }
    }

    fn surface_resolution(&self) -> Option<Resolution> {
        self.gfx
            .as_ref()
            .map(|g| Resolution::new(g.tex_w, g.tex_h))
    }

    /// Switch the displayed effect, managing the ripple driver's lifecycle
    /// across the transition.
    fn force_effect(&mut self, effect: Effect) {
        if effect == self.effect {
            return;
        }

        if self.effect.is_stateful() && !effect.is_stateful() {
            self.driver.deactivate();
        }
        if effect.is_stateful() {
            if let Some(res) = self.surface_resolution() {
                if let Err(err) = self.driver.activate(res) {
                    log::error!("ripple activation failed: {err}; showing static frame");
                }
            }
        }

        self.effect = effect;
        self.effect_idx = Effect::all()
            .iter()
            .position(|&e| e == effect)
            .unwrap_or(0);
        self.set_flash(effect.label());
        log::info!("effect: {}", effect.label());
    }

    fn build_overlay_lines(&self) -> Vec<String> {
        let params = &self.driver.params;
        let mut lines = Vec::new();
        lines.push(format!(
            "Effect: {}   Frame: {}",
            self.effect.label(),
            self.driver.frame_count()
        ));
        lines.push(format!(
            "Impulse: {:.2}   Radius: {:.0}   Rain: {}",
            params.impulse,
            params.inject_radius,
            if params.require_press { "OFF" } else { "ON" }
        ));
        lines.push(format!(
            "CPU {:4.1}%  MEM {:4.1}%",
            self.dbg_cpu, self.dbg_mem_pct
        ));
        lines.push(format!("FPS {}  sim/s {}", self.dbg_fps, self.dbg_sps));
        lines
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, el: &ActiveEventLoop) {
        let mut attrs = WindowAttributes::default()
            .with_title("Shimmer")
            .with_decorations(self.windowed)
            .with_resizable(self.windowed);

        if self.windowed {
            attrs = attrs.with_inner_size(PhysicalSize::new(1280u32, 720u32));
        } else {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let win = Arc::new(el.create_window(attrs).expect("create_window"));
        win.set_cursor_visible(true);

        let size = win.inner_size();
        let gfx = block_on(Gfx::new(win.clone(), size.width, size.height));

        log::info!(
            "surface {}x{} ({})",
            gfx.config.width,
            gfx.config.height,
            if self.windowed { "windowed" } else { "fullscreen" }
        );

        // Rebuild the panel and dials for the real display size.
        self.panel = ControlPanel::for_display(gfx.config.width as usize, gfx.config.height as usize);
        self.rng = StdRng::seed_from_u64(self.panel.rng_seed);
        self.speed_tr = self.panel.motion.speed.make_transition();
        self.scale_tr = self.panel.motion.scale.make_transition();
        self.pal = [
            self.panel.palette.color1.make_transition(),
            self.panel.palette.color2.make_transition(),
            self.panel.palette.color3.make_transition(),
        ];
        self.drip = Some(AutoDrip::new(&mut self.rng, &self.panel));

        self.driver.params = RippleParams {
            propagation: self.panel.ripple.propagation,
            damping: self.panel.ripple.damping,
            impulse: self.panel.ripple.impulse,
            inject_radius: self.panel.ripple.inject_radius,
            require_press: true,
            max_displacement: self.panel.ripple.max_displacement,
        };
        self.driver
            .set_viewport(size.width as f32, size.height as f32);

        let resolution = Resolution::new(gfx.tex_w, gfx.tex_h);
        self.window = Some(win);
        self.gfx = Some(gfx);

        if self.effect.is_stateful() {
            if let Err(err) = self.driver.activate(resolution) {
                log::error!("ripple activation failed: {err}; showing static frame");
            }
        }

        self.t0 = Instant::now();
        self.last_frame = Instant::now();
        self.last_user_input = Instant::now();
        self.last_stat = Instant::now();
        self.frames = 0;
        self.sim_frames = 0;

        self.set_flash(self.effect.label());
    }

    fn window_event(&mut self, el: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => el.exit(),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.logical_key {
                        Key::Named(NamedKey::Escape) => el.exit(),

                        // Debug toggle
                        Key::Character(ref s) if s.as_str().eq_ignore_ascii_case("d") => {
                            self.debug = !self.debug;
                            if self.debug {
                                let label = self.effect.label().to_string();
                                self.set_flash(&label);
                            } else {
                                self.flash_text = None;
                                self.flash_until = None;
                            }
                        }

                        // Effect switching
                        Key::Named(NamedKey::ArrowRight) => {
                            let all = Effect::all();
                            let idx = (self.effect_idx + 1) % all.len();
                            self.force_effect(all[idx]);
                        }
                        Key::Named(NamedKey::ArrowLeft) => {
                            let all = Effect::all();
                            let idx = if self.effect_idx == 0 {
                                all.len() - 1
                            } else {
                                self.effect_idx - 1
                            };
                            self.force_effect(all[idx]);
                        }

                        // Restart the ripple from the seed state
                        Key::Named(NamedKey::ArrowUp) => {
                            if self.effect.is_stateful() {
                                if let Some(res) = self.surface_resolution() {
                                    if let Err(err) = self.driver.resize(res) {
                                        log::error!("ripple restart failed: {err}");
                                    }
                                }
                            }
                        }

                        // Impulse intensity
                        Key::Character(ref s) if s.as_str() == "+" || s.as_str() == "=" => {
                            let r = self.panel.ripple.impulse_range;
                            self.driver.params.impulse = r.clamp(self.driver.params.impulse + 0.2);
                        }
                        Key::Character(ref s) if s.as_str() == "-" || s.as_str() == "_" => {
                            let r = self.panel.ripple.impulse_range;
                            self.driver.params.impulse = r.clamp(self.driver.params.impulse - 0.2);
                        }

                        // Rain variant: inject without pressing
                        Key::Character(ref s) if s.as_str().eq_ignore_ascii_case("r") => {
                            self.driver.params.require_press = !self.driver.params.require_press;
                        }

                        _ => {}
                    }
                }
            }

            WindowEvent::Resized(sz) => {
                if let Some(gfx) = &mut self.gfx {
                    gfx.resize(sz.width, sz.height);
                }
                self.driver.set_viewport(sz.width as f32, sz.height as f32);
                if self.effect.is_stateful() {
                    let res = Resolution::new(sz.width.max(1), sz.height.max(1));
                    if let Err(err) = self.driver.resize(res) {
                        log::error!("ripple resize failed: {err}; showing static frame");
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.last_user_input = Instant::now();
                if let Some(drip) = &mut self.drip {
                    drip.release(&mut self.driver);
                }
                self.driver
                    .on_pointer_move(position.x as f32, position.y as f32);
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.last_user_input = Instant::now();
                    if let Some(drip) = &mut self.drip {
                        drip.release(&mut self.driver);
                    }
                    if state == ElementState::Pressed {
                        self.driver.on_pointer_down();
                    } else {
                        self.driver.on_pointer_up();
                    }
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                };
                let r = self.panel.ripple.radius_range;
                self.driver.params.inject_radius =
                    r.clamp(self.driver.params.inject_radius + dy * 1.5);
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, el: &ActiveEventLoop) {
        el.set_control_flow(ControlFlow::Poll);

        // ----------------------------
        // Frame timing
        // ----------------------------
        let now_i = Instant::now();
        let mut dt = (now_i - self.last_frame).as_secs_f32();
        self.last_frame = now_i;

        if dt.is_nan() || dt < 0.0 {
            dt = 0.0;
        }
        if dt > 0.25 {
            dt = 0.25;
        }

        let t = (now_i - self.t0).as_secs_f32();

        let Some(res) = self.surface_resolution() else {
            return;
        };

        // ----------------------------
        // 1) Dial drift (once per frame)
        // ----------------------------
        self.panel
            .motion
            .speed
            .maybe_retarget(&mut self.speed_tr, t, &mut self.rng);
        self.panel
            .motion
            .scale
            .maybe_retarget(&mut self.scale_tr, t, &mut self.rng);
        self.speed_tr.update(t);
        self.scale_tr.update(t);

        let pal_tuning = [
            self.panel.palette.color1,
            self.panel.palette.color2,
            self.panel.palette.color3,
        ];
        for (dial, tr) in pal_tuning.iter().zip(self.pal.iter_mut()) {
            dial.maybe_retarget(tr, t, &mut self.rng);
            tr.update(t);
        }

        // ----------------------------
        // 2) Idle auto-drip (ripple only)
        // ----------------------------
        let idle = self.last_user_input.elapsed().as_secs_f32() > self.panel.drip.idle_after_seconds;
        if self.effect.is_stateful() && self.driver.is_active() && idle {
            if let Some(drip) = &mut self.drip {
                drip.tick(
                    t,
                    dt,
                    &mut self.rng,
                    &self.panel,
                    &mut self.driver,
                    (res.width as f32, res.height as f32),
                );
            }
        }

        // ----------------------------
        // 3) Simulate + composite, or the stateless pass
        // ----------------------------
        // A missed resize event would leave the field and the surface at
        // different sizes; recreate the field rather than composite garbage.
        if self.effect.is_stateful()
            && self.driver.is_active()
            && self.driver.field().map(|f| f.resolution()) != Some(res)
        {
            if let Err(err) = self.driver.resize(res) {
                log::error!("ripple resize failed: {err}; showing static frame");
            }
        }

        let Some(gfx) = self.gfx.as_mut() else {
            return;
        };
        let bpr = gfx.bpr as usize;

        if self.effect.is_stateful() && self.driver.is_active() {
            match self.driver.tick(dt, &mut gfx.upload, bpr) {
                Ok(()) => self.sim_frames += 1,
                Err(err) => {
                    log::error!("ripple tick failed: {err}; deactivating");
                    self.driver.deactivate();
                }
            }
        } else {
            let params = EffectParams {
                speed: self.speed_tr.cur,
                scale: self.scale_tr.cur,
                color1: rgb01(self.pal[0].cur),
                color2: rgb01(self.pal[1].cur),
                color3: rgb01(self.pal[2].cur),
                ..EffectParams::default()
            };
            effects::render(self.effect, t, res, &params, &mut gfx.upload, bpr);
        }

        // ----------------------------
        // 4) Overlay
        // ----------------------------
        if let Some(until) = self.flash_until {
            if Instant::now() >= until {
                self.flash_text = None;
                self.flash_until = None;
            }
        }

        if self.debug {
            self.overlay_lines = self.build_overlay_lines();
            let gfx = self.gfx.as_mut().unwrap();
            let (img_w, img_h) = (gfx.tex_w as i32, gfx.tex_h as i32);
            let bpr = gfx.bpr as usize;

            let pad = 12;
            let scale_small = 2;
            let mut y0 = pad;
            for line in &self.overlay_lines {
                draw_text_5x7_rgba(
                    &mut gfx.upload,
                    bpr,
                    img_w,
                    img_h,
                    pad,
                    y0,
                    line,
                    scale_small,
                    [255, 220, 0, 255],
                );
                y0 += (7 + 2) * scale_small;
            }

            if let Some(txt) = self.flash_text.as_deref() {
                let scale_big = 4;
                let tw = text_px_width_5x7(txt, scale_big);
                let th = text_px_height_5x7(1, scale_big);
                let cx = (img_w - tw) / 2;
                let cy = (img_h - th) / 2;
                draw_text_5x7_rgba(
                    &mut gfx.upload,
                    bpr,
                    img_w,
                    img_h,
                    cx,
                    cy,
                    txt,
                    scale_big,
                    [255, 255, 255, 255],
                );
            }
        }

        // ----------------------------
        // 5) Present
        // ----------------------------
        if let Some(gfx) = self.gfx.as_mut() {
            gfx.flush_upload();
            gfx.render();
        }
        self.frames += 1;

        // ----------------------------
        // 6) Per-second stats
        // ----------------------------
        if self.last_stat.elapsed() >= Duration::from_secs(1) {
            if self.debug {
                self.sys.refresh_cpu_all();
                self.sys.refresh_memory();

                let cpu = self.sys.global_cpu_usage();
                let mem_used = self.sys.used_memory();
                let mem_total = self.sys.total_memory();
                let mem_pct = if mem_total > 0 {
                    (mem_used as f32 / mem_total as f32) * 100.0
                } else {
                    0.0
                };

                self.dbg_cpu = cpu;
                self.dbg_mem_pct = mem_pct;
                self.dbg_fps = self.frames;
                self.dbg_sps = self.sim_frames;

                log::debug!(
                    "CPU {:5.1}% | MEM {:5.1}% | FPS {} | sim/s {} | effect {} | impulse {:.2} | radius {:.0}",
                    cpu,
                    mem_pct,
                    self.frames,
                    self.sim_frames,
                    self.effect.label(),
                    self.driver.params.impulse,
                    self.driver.params.inject_radius
                );
            }

            self.frames = 0;
            self.sim_frames = 0;
            self.last_stat = Instant::now();
        }
    }
}

// -----------------------------
// CLI parsing
// -----------------------------
fn parse_args() -> Options {
    let mut options = Options {
        windowed: false,
        debug: false,
        background: None,
        effect: Effect::Ripple,
    };

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--windowed" => options.windowed = true,
            "--debug" => options.debug = true,
            "--background" => options.background = args.next().map(PathBuf::from),
            "--effect" => {
                if let Some(name) = args.next() {
                    match Effect::parse(&name) {
                        Some(e) => options.effect = e,
                        None => eprintln!("unknown effect '{name}', keeping default"),
                    }
                }
            }
            other => eprintln!("unknown argument: {other}"),
        }
    }

    options
}

fn main() -> Result<(), winit::error::EventLoopError> {
    env_logger::init();
    let options = parse_args();

    let event_loop = EventLoop::new()?;
    let mut app = App::new(options);
    event_loop.run_app(&mut app)
}
