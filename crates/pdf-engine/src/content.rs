//! Backend-neutral drawing commands and their content-stream encoding.

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

use crate::Result;

/// One content-stream operator in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SaveState,
    RestoreState,
    SetGraphicsState(String),
    SetFillRgb(f32, f32, f32),
    SetStrokeRgb(f32, f32, f32),
    SetLineWidth(f32),
    Rect { x: f32, y: f32, width: f32, height: f32 },
    MoveTo(f32, f32),
    LineTo(f32, f32),
    Fill,
    Stroke,
    BeginText,
    SetFont { name: String, size: f32 },
    TextOffset(f32, f32),
    /// Already-encoded string bytes for the current font.
    ShowText(Vec<u8>),
    EndText,
}

impl DrawCommand {
    fn to_operation(&self) -> Operation {
        match self {
            DrawCommand::SaveState => Operation::new("q", vec![]),
            DrawCommand::RestoreState => Operation::new("Q", vec![]),
            DrawCommand::SetGraphicsState(name) => {
                Operation::new("gs", vec![Object::Name(name.as_bytes().to_vec())])
            }
            DrawCommand::SetFillRgb(r, g, b) => {
                Operation::new("rg", vec![(*r).into(), (*g).into(), (*b).into()])
            }
            DrawCommand::SetStrokeRgb(r, g, b) => {
                Operation::new("RG", vec![(*r).into(), (*g).into(), (*b).into()])
            }
            DrawCommand::SetLineWidth(width) => Operation::new("w", vec![(*width).into()]),
            DrawCommand::Rect { x, y, width, height } => Operation::new(
                "re",
                vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
            ),
            DrawCommand::MoveTo(x, y) => Operation::new("m", vec![(*x).into(), (*y).into()]),
            DrawCommand::LineTo(x, y) => Operation::new("l", vec![(*x).into(), (*y).into()]),
            DrawCommand::Fill => Operation::new("f", vec![]),
            DrawCommand::Stroke => Operation::new("S", vec![]),
            DrawCommand::BeginText => Operation::new("BT", vec![]),
            DrawCommand::SetFont { name, size } => Operation::new(
                "Tf",
                vec![Object::Name(name.as_bytes().to_vec()), (*size).into()],
            ),
            DrawCommand::TextOffset(x, y) => Operation::new("Td", vec![(*x).into(), (*y).into()]),
            DrawCommand::ShowText(bytes) => {
                Operation::new("Tj", vec![Object::String(bytes.clone(), StringFormat::Hexadecimal)])
            }
            DrawCommand::EndText => Operation::new("ET", vec![]),
        }
    }
}

/// Encode commands as content-stream bytes.
pub fn encode_commands(commands: &[DrawCommand]) -> Result<Vec<u8>> {
    let operations: Vec<Operation> = commands.iter().map(DrawCommand::to_operation).collect();
    let content = Content { operations };
    Ok(content.encode()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Normal,
    Multiply,
}

impl BlendMode {
    pub(crate) fn pdf_name(self) -> &'static [u8] {
        match self {
            BlendMode::Normal => b"Normal",
            BlendMode::Multiply => b"Multiply",
        }
    }
}

/// Parameters of an ExtGState dictionary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphicsStateParams {
    pub fill_alpha: f32,
    pub stroke_alpha: f32,
    pub blend_mode: BlendMode,
}

impl GraphicsStateParams {
    /// Translucent multiply fill used for highlights.
    pub fn highlight(fill_alpha: f32) -> Self {
        Self { fill_alpha, stroke_alpha: 1.0, blend_mode: BlendMode::Multiply }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_rect_fill() {
        let bytes = encode_commands(&[
            DrawCommand::SaveState,
            DrawCommand::Rect { x: 10.0, y: 20.0, width: 30.0, height: 5.0 },
            DrawCommand::Fill,
            DrawCommand::RestoreState,
        ])
        .unwrap();

        let decoded = Content::decode(&bytes).unwrap();
        let operators: Vec<&str> =
            decoded.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["q", "re", "f", "Q"]);
        assert_eq!(decoded.operations[1].operands.len(), 4);
    }

    #[test]
    fn show_text_is_hex_encoded() {
        let bytes = encode_commands(&[DrawCommand::ShowText(vec![0x00, 0x2A])]).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("<002A>") || text.contains("<002a>"), "got {text}");
    }
}
