use std::path::Path;

use super::Stage;
use crate::error::{Result, VisualiserError};

const STAGE_MARKER: &str = "#shader";

/// Per-stage shader text split out of a combined source file.
#[derive(Clone, Debug, Default)]
pub struct ShaderSource {
    vertex: String,
    fragment: String,
}

impl ShaderSource {
    pub fn stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    fn buffer_mut(&mut self, stage: Stage) -> &mut String {
        match stage {
            Stage::Vertex => &mut self.vertex,
            Stage::Fragment => &mut self.fragment,
        }
    }
}

/// Read a combined shader file and split it into stages.
pub fn load(path: &Path) -> Result<ShaderSource> {
    let text = std::fs::read_to_string(path).map_err(|source| VisualiserError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let source = split(&text);
    log::info!(
        "Shader source {}: {} vertex bytes, {} fragment bytes",
        path.display(),
        source.vertex.len(),
        source.fragment.len()
    );
    Ok(source)
}

/// Partition `text` on `#shader vertex` / `#shader fragment` marker lines.
///
/// Marker lines are dropped, as is anything before the first marker.
pub fn split(text: &str) -> ShaderSource {
    let mut source = ShaderSource::default();
    let mut current: Option<Stage> = None;

    for line in text.lines() {
        if line.contains(STAGE_MARKER) {
            if line.contains("vertex") {
                current = Some(Stage::Vertex);
            } else if line.contains("fragment") {
                current = Some(Stage::Fragment);
            }
            continue;
        }

        if let Some(stage) = current {
            let buf = source.buffer_mut(stage);
            buf.push_str(line);
            buf.push('\n');
        }
    }

    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_both_stages() {
        let text = "#shader vertex\nvoid main() {}\n#shader fragment\nout vec4 c;\nvoid main() {}\n";
        let src = split(text);
        assert_eq!(src.stage(Stage::Vertex), "void main() {}\n");
        assert_eq!(src.stage(Stage::Fragment), "out vec4 c;\nvoid main() {}\n");
    }

    #[test]
    fn concatenation_matches_non_marker_lines() {
        let text = "#shader vertex\na\nb\n#shader fragment\nc\n#shader vertex\nd\n";
        let src = split(text);
        assert_eq!(src.stage(Stage::Vertex), "a\nb\nd\n");
        assert_eq!(src.stage(Stage::Fragment), "c\n");

        let mut expected: Vec<&str> = text.lines().filter(|l| !l.contains(STAGE_MARKER)).collect();
        expected.sort();
        let joined = format!("{}{}", src.stage(Stage::Vertex), src.stage(Stage::Fragment));
        let mut got: Vec<&str> = joined.lines().collect();
        got.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn lines_before_first_marker_are_dropped() {
        let src = split("// header\n#version 450\n#shader fragment\nx\n");
        assert_eq!(src.stage(Stage::Vertex), "");
        assert_eq!(src.stage(Stage::Fragment), "x\n");
    }

    #[test]
    fn no_markers_discards_everything() {
        let src = split("void main() {}\n");
        assert!(src.stage(Stage::Vertex).is_empty());
        assert!(src.stage(Stage::Fragment).is_empty());
    }

    #[test]
    fn unknown_marker_keeps_current_stage() {
        let src = split("#shader vertex\na\n#shader geometry\nb\n");
        assert_eq!(src.stage(Stage::Vertex), "a\nb\n");
    }

    #[test]
    fn crlf_input_is_normalised() {
        let src = split("#shader vertex\r\na\r\n");
        assert_eq!(src.stage(Stage::Vertex), "a\n");
    }

    #[test]
    fn missing_file_is_source_unreadable() {
        let err = load(Path::new("/nonexistent/pulsemesh/shader.glsl")).unwrap_err();
        assert!(matches!(err, VisualiserError::SourceUnreadable { .. }));
    }
}
