use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pulsemesh", about = "Renders a mesh that pulses with a playing audio track")]
pub struct Cli {
    /// Audio file to play (WAV, MP3, FLAC, OGG)
    pub audio: PathBuf,

    /// Combined shader source with `#shader vertex` / `#shader fragment` sections
    #[arg(short, long, default_value = "shaders/visualiser.glsl")]
    pub shader: PathBuf,

    /// OBJ mesh to render instead of the generated sphere
    #[arg(short, long)]
    pub mesh: Option<PathBuf>,

    /// Scale applied to OBJ positions
    #[arg(long)]
    pub scale: Option<f32>,

    /// Window width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Vertical field of view in degrees
    #[arg(long)]
    pub fov: Option<f32>,

    /// Play the track once instead of looping
    #[arg(long)]
    pub no_loop: bool,

    /// Config file (defaults to pulsemesh.toml or the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
