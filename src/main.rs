mod app;
mod audio;
mod cli;
mod config;
mod error;
mod mesh;
mod render;
mod shader;

use anyhow::{Context, Result};
use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

use app::App;
use cli::Cli;
use config::Config;
use mesh::obj::ObjOptions;
use render::session::Assets;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = match config::discover(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    config.apply_cli(&cli);

    log::info!("pulsemesh - audio-reactive mesh renderer");
    log::info!("Audio: {}", cli.audio.display());
    log::info!("Shader: {}", cli.shader.display());
    log::info!(
        "Window: {}x{}, fov {}°",
        config.window.width,
        config.window.height,
        config.camera.fov_degrees
    );

    // 1. Shader program
    let source = shader::source::load(&cli.shader)?;
    let program = render::pipeline::build_program(&source).map_err(|err| {
        log::error!("{}", err);
        err
    })?;

    // 2. Mesh
    let mesh = match cli.mesh {
        Some(ref path) => mesh::obj::load_mesh_with(
            path,
            &ObjOptions {
                scale: config.mesh.scale,
                deduplicate: config.mesh.deduplicate,
            },
        )?,
        None => {
            let sphere = mesh::sphere::generate_sphere(
                config.mesh.radius,
                config.mesh.rings,
                config.mesh.sectors,
            );
            log::info!(
                "Generated sphere: {} vertices, {} triangles",
                sphere.vertex_count(),
                sphere.triangle_count()
            );
            sphere
        }
    };

    // 3. Audio
    log::info!("Decoding audio...");
    let audio = audio::decode::decode_audio(&cli.audio)?;
    log::info!(
        "Decoded {:.1}s at {}Hz, {} channel(s)",
        audio.duration_secs(),
        audio.sample_rate,
        audio.channels
    );

    // 4. Window loop
    let assets = Assets {
        program,
        mesh,
        audio,
        looping: config.audio.looping,
    };
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, assets);
    event_loop.run_app(&mut app).context("Event loop failed")?;

    if let Some(err) = app.take_error() {
        return Err(err);
    }
    log::info!("Done");
    Ok(())
}
