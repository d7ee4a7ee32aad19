//! End-to-end runs of the engine against the headless GL context

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::config::{ApplicationConfig, EngineSettings, RendererSettings};
use crate::foundation::math::{Colour, Mat4, Resolution};
use crate::render::gl::{GlHandle, GlTargetGroup, HeadlessGl, VertexFormat};
use crate::render::{
    MeshData, Model, RenderCamera, RenderMaterial, RenderObject, RenderShader, RenderSnapshot, RenderTargetGroup,
    RenderTexture,
};
use crate::resource::formats::solid_png;
use crate::resource::{MemoryFileSystem, StorageLocation};
use crate::{AppError, Application, Engine, EngineError, EngineSystems};

const SHADER: &str = r#"(
    vertex: "uniform mat4 u_wvpMat;\nuniform mat4 u_worldMat;\nvoid main() {}",
    fragment: "uniform vec4 u_colour;\nuniform int u_texture0;\nvoid main() {}",
)"#;

fn config() -> ApplicationConfig {
    ApplicationConfig {
        engine: EngineSettings::new().with_log_level("debug").unpaced(),
        renderer: RendererSettings::new()
            .with_resolution(32, 32)
            .with_max_queued_frames(1)
            .with_context_loss_recovery(true),
        ..ApplicationConfig::default()
    }
}

fn files() -> Arc<MemoryFileSystem> {
    Arc::new(
        MemoryFileSystem::new()
            .with_file(StorageLocation::Package, "shaders/basic.ron", SHADER)
            .with_file(StorageLocation::Package, "textures/logo.png", solid_png(4, 4, [0, 255, 0, 255])),
    )
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Default)]
struct SceneState {
    object: Option<RenderObject>,
    updates: usize,
    destroyed: bool,
}

/// Draws one textured quad every frame
struct QuadApp {
    scene: Arc<Mutex<SceneState>>,
}

impl Application for QuadApp {
    fn on_init(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        let mut pool = systems.lock_resource_pool();
        let shader = pool.load::<RenderShader>(StorageLocation::Package, "shaders/basic.ron")?;
        let texture = pool.load::<RenderTexture>(StorageLocation::Package, "textures/logo.png")?;
        let model = pool.create_model(vec![MeshData {
            vertex_format: VertexFormat::StaticMesh,
            vertices: vec![0; VertexFormat::StaticMesh.stride() * 4],
            indices: vec![0, 1, 2, 0, 2, 3],
        }]);

        let material = RenderMaterial::new(shader).with_texture(texture).build();
        self.scene.lock().unwrap().object = Some(RenderObject {
            material,
            mesh: Arc::clone(&model.meshes()[0]),
            world: Mat4::identity(),
        });
        Ok(())
    }

    fn on_update(&mut self, _systems: &EngineSystems, _delta_time: f32) -> Result<(), AppError> {
        self.scene.lock().unwrap().updates += 1;
        Ok(())
    }

    fn on_render(&mut self, _systems: &EngineSystems, snapshot: &mut RenderSnapshot) -> Result<(), AppError> {
        snapshot.set_camera(RenderCamera::default());
        if let Some(object) = &self.scene.lock().unwrap().object {
            snapshot.add_object(object.clone());
        }
        Ok(())
    }

    fn on_destroy(&mut self, _systems: &EngineSystems) {
        self.scene.lock().unwrap().destroyed = true;
    }
}

fn start(gl: &HeadlessGl) -> (Engine, Arc<Mutex<SceneState>>) {
    let scene = Arc::new(Mutex::new(SceneState::default()));
    let app = QuadApp { scene: Arc::clone(&scene) };
    let engine = Engine::new(config(), Box::new(app), Box::new(gl.clone()), files()).unwrap();
    (engine, scene)
}

#[test]
fn test_engine_survives_context_loss() {
    let gl = HeadlessGl::new();
    let (mut engine, scene) = start(&gl);

    engine.resume().unwrap();
    engine.foreground().unwrap();
    wait_until("first draws", || gl.stats().draw_calls >= 3);

    let (shader, texture, model) = {
        let mut pool = engine.resource_pool();
        (
            pool.load::<RenderShader>(StorageLocation::Package, "shaders/basic.ron").unwrap(),
            pool.load::<RenderTexture>(StorageLocation::Package, "textures/logo.png").unwrap(),
            pool.get_all_resources::<Model>().remove(0),
        )
    };
    let old_program = shader.program().unwrap();
    assert!(gl.is_live(old_program));

    engine.background().unwrap();
    engine.suspend().unwrap();
    assert!(engine.context_restorer().has_context_been_backed_up());
    assert!(!shader.backend().is_valid());
    assert!(!model.meshes()[0].backend().is_valid());

    gl.lose_context();
    gl.recreate_context();
    let draws_before_resume = gl.stats().draw_calls;

    engine.resume().unwrap();
    engine.foreground().unwrap();
    wait_until("draws after resume", || gl.stats().draw_calls >= draws_before_resume + 3);

    assert!(!engine.context_restorer().has_context_been_backed_up());
    assert_eq!(engine.resource_pool().reload_count(), 2);
    let new_program = shader.program().unwrap();
    assert_ne!(new_program, old_program);
    assert!(gl.is_live(new_program));
    assert!(gl.is_live(texture.handle().unwrap()));
    assert!(model.meshes()[0].backend().is_valid());

    engine.background().unwrap();
    engine.suspend().unwrap();
    let stats = engine.destroy().unwrap();
    assert!(stats.frames > 0);
    assert_eq!(stats.resources_restored, 1);
    assert_eq!(stats.load_failures, 0);
    assert!(scene.lock().unwrap().destroyed);
    assert_eq!(gl.stats().context_losses, 1);
}

#[test]
fn test_dropping_running_engine_shuts_down() {
    let gl = HeadlessGl::new();
    let (mut engine, scene) = start(&gl);
    engine.resume().unwrap();
    engine.foreground().unwrap();
    wait_until("updates", || scene.lock().unwrap().updates > 2);

    drop(engine);
    assert!(scene.lock().unwrap().destroyed);
}

#[test]
fn test_frames_are_not_rendered_while_suspended() {
    let gl = HeadlessGl::new();
    let (mut engine, _scene) = start(&gl);
    engine.resume().unwrap();
    wait_until("frames", || engine.renderer().frames_submitted() > 0);
    engine.suspend().unwrap();

    let clears = gl.stats().clears;
    thread::sleep(Duration::from_millis(20));
    assert_eq!(gl.stats().clears, clears);
    assert!(engine.render_command_buffer_manager().is_suspended());
    assert_eq!(engine.render_command_buffer_manager().queued_frames(), 0);
    engine.destroy().unwrap();
}

struct FailingApp;

impl Application for FailingApp {
    fn on_update(&mut self, _systems: &EngineSystems, _delta_time: f32) -> Result<(), AppError> {
        Err(AppError::GameLogic("out of lives".to_string()))
    }

    fn on_render(&mut self, _systems: &EngineSystems, _snapshot: &mut RenderSnapshot) -> Result<(), AppError> {
        unreachable!("render after a failed update")
    }

    fn on_destroy(&mut self, _systems: &EngineSystems) {}
}

#[test]
fn test_application_error_stops_lifecycle() {
    let gl = HeadlessGl::new();
    let mut engine = Engine::new(config(), Box::new(FailingApp), Box::new(gl.clone()), files()).unwrap();
    engine.resume().unwrap();

    match engine.suspend() {
        Err(EngineError::Application(message)) => assert!(message.contains("out of lives")),
        other => panic!("expected an application error, got {:?}", other),
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = config();
    config.renderer = config.renderer.with_max_queued_frames(0);
    let result = Engine::new(config, Box::new(FailingApp), Box::new(HeadlessGl::new()), files());
    assert!(matches!(result, Err(EngineError::Config(_))));
}

/// Draws the quad into an offscreen target, then the main target
struct OffscreenApp {
    inner: QuadApp,
    target_group: Option<Arc<RenderTargetGroup>>,
}

impl Application for OffscreenApp {
    fn on_init(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        self.inner.on_init(systems)?;
        self.target_group = Some(systems.lock_resource_pool().create_target_group(Resolution::new(8, 8), true));
        Ok(())
    }

    fn on_update(&mut self, systems: &EngineSystems, delta_time: f32) -> Result<(), AppError> {
        self.inner.on_update(systems, delta_time)
    }

    fn on_render(&mut self, systems: &EngineSystems, snapshot: &mut RenderSnapshot) -> Result<(), AppError> {
        if let Some(group) = &self.target_group {
            let mut pass = RenderSnapshot::for_target_group(Arc::clone(group), Colour::WHITE);
            self.inner.on_render(systems, &mut pass)?;
            snapshot.add_offscreen_pass(pass);
        }
        self.inner.on_render(systems, snapshot)
    }

    fn on_destroy(&mut self, systems: &EngineSystems) {
        self.inner.on_destroy(systems);
    }
}

/// Live colour texture of a target group and the colour name its framebuffer holds
fn colour_and_attachment(gl: &HeadlessGl, group: &RenderTargetGroup) -> (GlHandle, Option<u32>) {
    let colour = group.colour_texture().and_then(|texture| texture.handle()).unwrap();
    let framebuffer = group.backend().lock().as_ref().and_then(GlTargetGroup::framebuffer).unwrap();
    let (attached, _) = gl.framebuffer_attachments(framebuffer).unwrap();
    (colour, attached)
}

#[test]
fn test_offscreen_target_survives_context_loss() {
    let gl = HeadlessGl::new();
    let scene = Arc::new(Mutex::new(SceneState::default()));
    let app = OffscreenApp { inner: QuadApp { scene }, target_group: None };
    let mut engine = Engine::new(config(), Box::new(app), Box::new(gl.clone()), files()).unwrap();
    engine.resume().unwrap();
    wait_until("two passes", || gl.stats().clears >= 2 && gl.stats().draw_calls >= 2);

    let group = engine.resource_pool().get_all_resources::<RenderTargetGroup>().remove(0);
    let (old_colour, attached) = colour_and_attachment(&gl, &group);
    assert!(gl.is_live(old_colour));
    assert_eq!(attached, Some(old_colour.raw()));

    engine.suspend().unwrap();
    assert!(!group.backend().is_valid());
    gl.lose_context();
    gl.recreate_context();
    let draws_before_resume = gl.stats().draw_calls;

    engine.resume().unwrap();
    wait_until("offscreen draws after resume", || {
        group.backend().is_valid() && gl.stats().draw_calls >= draws_before_resume + 2
    });

    let (new_colour, attached) = colour_and_attachment(&gl, &group);
    assert_ne!(new_colour, old_colour);
    assert!(gl.is_live(new_colour));
    assert_eq!(attached, Some(new_colour.raw()));

    engine.suspend().unwrap();
    let stats = engine.destroy().unwrap();
    assert_eq!(stats.load_failures, 0);
    // Colour and depth textures, the quad mesh and the group itself
    assert_eq!(stats.resources_restored, 4);
}
