use std::collections::{BTreeMap, HashMap};

use pdf_engine::{Backend, DocumentWriter, DrawCommand, FontHandle, GraphicsStateParams};
use tracing::{debug, info, warn};

use super::fonts::{FontEncoder, FontResolver, TextFont};
use super::SaveConfig;
use crate::annotation::{Annotation, AnnotationKind};
use crate::arabic::{script_runs, shape};
use crate::error::{SaveError, SaveResult};

/// One planned content operator; resource names are filled in per page.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Draw(DrawCommand),
    HighlightState,
    Font { encoder: usize, size: f32 },
}

/// Encoders for the two text scripts. Both slots point at the same encoder
/// when no TrueType font was found.
struct TextFonts {
    encoders: Vec<FontEncoder>,
    arabic: usize,
    latin: usize,
}

impl TextFonts {
    fn new(arabic: TextFont) -> Self {
        match arabic {
            TextFont::Builtin(_) => Self { encoders: vec![FontEncoder::new(TextFont::builtin())], arabic: 0, latin: 0 },
            font => Self {
                encoders: vec![FontEncoder::new(font), FontEncoder::new(TextFont::builtin())],
                arabic: 0,
                latin: 1,
            },
        }
    }

    /// Encode a run with its script font, then with the other one.
    fn encode(&mut self, text: &str, arabic: bool) -> Option<(usize, Vec<u8>)> {
        let (first, second) = if arabic { (self.arabic, self.latin) } else { (self.latin, self.arabic) };
        let err = match self.encoders[first].encode(text) {
            Ok(bytes) => return Some((first, bytes)),
            Err(err) => err,
        };
        if second != first {
            debug!(error = %err, "retrying text run with the alternate font");
            if let Ok(bytes) = self.encoders[second].encode(text) {
                return Some((second, bytes));
            }
        }
        warn!(error = %err, run = text, "no font can draw text run; skipping it");
        None
    }
}

/// Writes annotations into a freshly loaded copy of a document.
#[derive(Debug, Clone)]
pub struct SavePipeline {
    config: SaveConfig,
    resolver: FontResolver,
}

impl SavePipeline {
    pub fn new(config: SaveConfig) -> Self {
        let resolver = FontResolver::new(config.font_path.as_deref(), &config.system_fonts);
        Self { config, resolver }
    }

    pub fn with_resolver(config: SaveConfig, resolver: FontResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Serialize `document` with `annotations` appended to its pages.
    ///
    /// `page_heights` are the heights used for the vertical flip; pages
    /// beyond the slice use the copy's own MediaBox height. With no
    /// annotations the input bytes are returned unchanged.
    pub fn save(
        &self,
        backend: &dyn Backend,
        document: &[u8],
        page_heights: &[f32],
        annotations: &[Annotation],
    ) -> SaveResult<Vec<u8>> {
        if annotations.is_empty() {
            return Ok(document.to_vec());
        }

        let mut writer = backend.open_writer(document).map_err(SaveError::Load)?;
        let page_count = writer.page_count();
        if let Some(bad) = annotations.iter().find(|annotation| annotation.page_index() >= page_count) {
            return Err(SaveError::MissingPage { page: bad.page_index(), page_count });
        }

        let has_text = annotations.iter().any(|annotation| annotation.kind() == AnnotationKind::Text);
        let mut fonts = TextFonts::new(if has_text { self.resolver.resolve() } else { TextFont::builtin() });

        let mut pages: BTreeMap<u32, Vec<Step>> = BTreeMap::new();
        for annotation in annotations {
            let page = annotation.page_index();
            let height = match page_heights.get(page as usize) {
                Some(height) => *height,
                None => writer.page_size(page).map_err(SaveError::Write)?.height_pt,
            };
            let steps = self.plan(annotation, height, &mut fonts);
            pages.entry(page).or_default().extend(steps);
        }

        let handles = register_fonts(writer.as_mut(), &fonts)?;
        for (page, steps) in pages {
            let commands = bind_steps(writer.as_mut(), page, steps, &handles, self.config.highlight_alpha)?;
            writer.append_content(page, &commands).map_err(SaveError::Write)?;
        }

        let bytes = writer.finish().map_err(SaveError::Write)?;
        info!(annotations = annotations.len(), bytes = bytes.len(), "annotations written");
        Ok(bytes)
    }

    fn plan(&self, annotation: &Annotation, page_height: f32, fonts: &mut TextFonts) -> Vec<Step> {
        let rect = annotation.rect();
        let (r, g, b) = annotation.color().to_rgb_f32();
        let flipped_y = page_height - rect.y - rect.height;

        let body = match annotation.kind() {
            AnnotationKind::Highlight => vec![
                Step::HighlightState,
                Step::Draw(DrawCommand::SetFillRgb(r, g, b)),
                Step::Draw(DrawCommand::Rect { x: rect.x, y: flipped_y, width: rect.width, height: rect.height }),
                Step::Draw(DrawCommand::Fill),
            ],
            AnnotationKind::Underline => vec![
                Step::Draw(DrawCommand::SetStrokeRgb(r, g, b)),
                Step::Draw(DrawCommand::SetLineWidth(self.config.underline_width)),
                Step::Draw(DrawCommand::MoveTo(rect.x, flipped_y)),
                Step::Draw(DrawCommand::LineTo(rect.x + rect.width, flipped_y)),
                Step::Draw(DrawCommand::Stroke),
            ],
            AnnotationKind::Stroke => {
                let points = annotation.points();
                if points.len() < 2 {
                    debug!(page = annotation.page_index(), "skipping stroke with fewer than two points");
                    return Vec::new();
                }
                let mut steps = vec![
                    Step::Draw(DrawCommand::SetStrokeRgb(r, g, b)),
                    Step::Draw(DrawCommand::SetLineWidth(self.config.stroke_width)),
                    Step::Draw(DrawCommand::MoveTo(points[0].x, page_height - points[0].y)),
                ];
                steps.extend(
                    points[1..].iter().map(|point| Step::Draw(DrawCommand::LineTo(point.x, page_height - point.y))),
                );
                steps.push(Step::Draw(DrawCommand::Stroke));
                steps
            }
            AnnotationKind::Text => {
                let text = annotation.text_content().unwrap_or_default();
                if text.trim().is_empty() {
                    return Vec::new();
                }
                self.plan_text(text, rect.x, page_height - rect.y, (r, g, b), fonts)
            }
        };

        let mut steps = Vec::with_capacity(body.len() + 2);
        steps.push(Step::Draw(DrawCommand::SaveState));
        steps.extend(body);
        steps.push(Step::Draw(DrawCommand::RestoreState));
        steps
    }

    fn plan_text(&self, text: &str, x: f32, baseline: f32, rgb: (f32, f32, f32), fonts: &mut TextFonts) -> Vec<Step> {
        let size = self.config.text_size;
        let mut steps = vec![
            Step::Draw(DrawCommand::BeginText),
            Step::Draw(DrawCommand::SetFillRgb(rgb.0, rgb.1, rgb.2)),
            Step::Draw(DrawCommand::TextOffset(x, baseline)),
        ];
        for (index, line) in shape(text).split('\n').enumerate() {
            if index > 0 {
                steps.push(Step::Draw(DrawCommand::TextOffset(0.0, -size * self.config.line_spacing)));
            }
            for run in script_runs(line) {
                if let Some((encoder, bytes)) = fonts.encode(run.text, run.arabic) {
                    steps.push(Step::Font { encoder, size });
                    steps.push(Step::Draw(DrawCommand::ShowText(bytes)));
                }
            }
        }
        steps.push(Step::Draw(DrawCommand::EndText));
        steps
    }
}

fn register_fonts(writer: &mut dyn DocumentWriter, fonts: &TextFonts) -> SaveResult<Vec<Option<FontHandle>>> {
    fonts
        .encoders
        .iter()
        .map(|encoder| {
            if !encoder.is_used() {
                return Ok(None);
            }
            writer.add_font(&encoder.resource()).map(Some).map_err(SaveError::Write)
        })
        .collect()
}

/// Replace placeholder steps with commands naming this page's resources.
fn bind_steps(
    writer: &mut dyn DocumentWriter,
    page: u32,
    steps: Vec<Step>,
    handles: &[Option<FontHandle>],
    highlight_alpha: f32,
) -> SaveResult<Vec<DrawCommand>> {
    let mut font_names: HashMap<usize, String> = HashMap::new();
    let mut highlight_state: Option<String> = None;
    let mut commands = Vec::with_capacity(steps.len());

    for step in steps {
        let command = match step {
            Step::Draw(command) => command,
            Step::HighlightState => {
                let name = match &highlight_state {
                    Some(name) => name.clone(),
                    None => {
                        let name = writer
                            .bind_graphics_state(page, &GraphicsStateParams::highlight(highlight_alpha))
                            .map_err(SaveError::Write)?;
                        highlight_state.insert(name).clone()
                    }
                };
                DrawCommand::SetGraphicsState(name)
            }
            Step::Font { encoder, size } => {
                let name = match font_names.get(&encoder) {
                    Some(name) => name.clone(),
                    None => {
                        let handle = handles.get(encoder).copied().flatten().ok_or_else(|| {
                            SaveError::Worker(format!("font {encoder} was used but never registered"))
                        })?;
                        let name = writer.bind_font(page, handle).map_err(SaveError::Write)?;
                        font_names.insert(encoder, name.clone());
                        name
                    }
                };
                DrawCommand::SetFont { name, size }
            }
        };
        commands.push(command);
    }
    Ok(commands)
}
