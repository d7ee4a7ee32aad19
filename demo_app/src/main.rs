//! Context loss demo application
//!
//! Runs a spinning textured quad on the headless GL context, then simulates
//! the platform switching away from the app: background, suspend, destroy the
//! GL context, recreate it and resume. The quad keeps rendering afterwards
//! because the engine restores every GPU resource.
//!
//! Usage: `demo_app [config.toml|config.ron]`

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chilli_engine::prelude::*;
use chilli_engine::render::gl::TextureFormat;

const SHADER: &str = r#"(
    vertex: "uniform mat4 u_wvpMat;\nuniform mat4 u_worldMat;\nvoid main() {}",
    fragment: "uniform vec4 u_colour;\nuniform int u_texture0;\nuniform vec4 u_ambient;\nvoid main() {}",
)"#;

const RUN_TIME: Duration = Duration::from_millis(500);

/// Spinning quad with a procedural checkerboard texture
struct SpinningQuadApp {
    object: Option<RenderObject>,
    rotation: f32,
    frames: Arc<Mutex<u64>>,
}

impl SpinningQuadApp {
    fn new(frames: Arc<Mutex<u64>>) -> Self {
        Self { object: None, rotation: 0.0, frames }
    }

    fn checkerboard(size: u32) -> TextureData {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let value = if (x + y) % 2 == 0 { 255 } else { 32 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        TextureData { resolution: Resolution::new(size, size), format: TextureFormat::Rgba8, pixels: Some(pixels) }
    }
}

impl Application for SpinningQuadApp {
    fn on_init(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        log::info!("Creating demo scene...");
        let mut pool = systems.lock_resource_pool();
        let shader = pool.load::<RenderShader>(StorageLocation::Package, "shaders/quad.ron")?;
        // In-memory texture: restored from its backup after context loss
        let texture = pool.create_texture(Self::checkerboard(16));
        let model = pool.create_model(vec![MeshData {
            vertex_format: VertexFormat::StaticMesh,
            vertices: vec![0; VertexFormat::StaticMesh.stride() * 4],
            indices: vec![0, 1, 2, 0, 2, 3],
        }]);
        let mesh = model
            .meshes()
            .first()
            .cloned()
            .ok_or_else(|| AppError::Custom("quad model has no mesh".to_string()))?;

        let material = RenderMaterial::new(shader)
            .with_texture(texture)
            .with_colour(Colour::new(1.0, 0.6, 0.2, 1.0))
            .build();
        self.object = Some(RenderObject { material, mesh, world: Mat4::identity() });
        Ok(())
    }

    fn on_resume(&mut self, _systems: &EngineSystems) -> Result<(), AppError> {
        log::info!("Demo resumed at rotation {:.2}", self.rotation);
        Ok(())
    }

    fn on_update(&mut self, _systems: &EngineSystems, delta_time: f32) -> Result<(), AppError> {
        self.rotation = (self.rotation + delta_time * std::f32::consts::PI) % std::f32::consts::TAU;
        if let Ok(mut frames) = self.frames.lock() {
            *frames += 1;
        }
        Ok(())
    }

    fn on_render(&mut self, systems: &EngineSystems, snapshot: &mut RenderSnapshot) -> Result<(), AppError> {
        let resolution = systems.settings.renderer.resolution;
        #[allow(clippy::cast_precision_loss)]
        let aspect = resolution.width as f32 / resolution.height as f32;
        snapshot.set_camera(RenderCamera {
            view: Mat4::new_translation(&Vec3::new(0.0, 0.0, -4.0)),
            projection: Mat4::new_perspective(aspect, std::f32::consts::FRAC_PI_4, 0.1, 100.0),
            position: Vec3::new(0.0, 0.0, 4.0),
        });
        snapshot.set_ambient_light(Colour::new(0.2, 0.2, 0.2, 1.0));
        snapshot.add_directional_light(DirectionalLight { colour: Colour::WHITE, direction: Vec3::new(0.0, -1.0, -1.0) });

        if let Some(object) = &self.object {
            snapshot.add_object(RenderObject {
                world: Mat4::new_rotation(Vec3::new(0.0, self.rotation, 0.0)),
                ..object.clone()
            });
        }
        Ok(())
    }

    fn on_destroy(&mut self, _systems: &EngineSystems) {
        log::info!("Demo destroyed");
        self.object = None;
    }
}

fn load_config() -> Result<ApplicationConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(ApplicationConfig::load_from_file(path)?),
        None => {
            let mut config = ApplicationConfig::default();
            config.renderer = config.renderer.with_context_loss_recovery(true);
            Ok(config)
        }
    }
}

fn frame_count(frames: &Mutex<u64>) -> u64 {
    frames.lock().map_or(0, |frames| *frames)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let files = Arc::new(MemoryFileSystem::new().with_file(StorageLocation::Package, "shaders/quad.ron", SHADER));
    let gl = HeadlessGl::new();
    let frames = Arc::new(Mutex::new(0));

    let app = SpinningQuadApp::new(Arc::clone(&frames));
    let mut engine = Engine::new(config, Box::new(app), Box::new(gl.clone()), files)?;

    engine.resume()?;
    engine.foreground()?;
    thread::sleep(RUN_TIME);
    log::info!("{} frames before the app switch", frame_count(&frames));

    engine.background()?;
    engine.suspend()?;
    gl.lose_context();
    log::info!("GL context destroyed while suspended");
    gl.recreate_context();

    engine.resume()?;
    engine.foreground()?;
    thread::sleep(RUN_TIME);

    engine.background()?;
    engine.suspend()?;
    let stats = engine.destroy()?;
    log::info!(
        "Rendered {} frames with {} draw calls; {} resources restored, {} load failures",
        stats.frames,
        stats.draw_calls,
        stats.resources_restored,
        stats.load_failures
    );
    Ok(())
}
