use crate::fonts::{ASCENDER_RATIO, FontStyle, text_width};
use crate::model::Alignment;

use super::paginate::DrawOp;
use super::{Inline, InlineRun};

pub(super) struct WordChunk {
    pub(super) text: String,
    pub(super) style: FontStyle,
    pub(super) underline: bool,
    pub(super) x_offset: f32, // x relative to line start
    pub(super) width: f32,
}

pub(super) struct TextLine {
    pub(super) chunks: Vec<WordChunk>,
    pub(super) total_width: f32,
    /// Ends at an explicit break or the end of the paragraph; never justified.
    pub(super) hard_break: bool,
}

fn finish_line(chunks: &mut Vec<WordChunk>, hard_break: bool) -> TextLine {
    let total_width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
    TextLine {
        chunks: std::mem::take(chunks),
        total_width,
        hard_break,
    }
}

fn run_style(run: &InlineRun) -> FontStyle {
    FontStyle::from_flags(run.bold, run.italic)
}

/// Wrap inline runs into lines no wider than `max_width`.
///
/// No space is inserted between runs unless the preceding text ended with
/// whitespace or the next run starts with it ("bold" + ", " → "bold,").
/// A word wider than the line is placed alone and overflows.
pub(super) fn build_lines(inlines: &[Inline], font_size: f32, max_width: f32) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current_chunks: Vec<WordChunk> = Vec::new();
    let mut current_x: f32 = 0.0;
    let mut prev_ended_with_ws = false;
    let mut prev_space_w: f32 = 0.0;

    for inline in inlines {
        let run = match inline {
            Inline::LineBreak => {
                lines.push(finish_line(&mut current_chunks, true));
                current_x = 0.0;
                prev_ended_with_ws = false;
                continue;
            }
            Inline::Run(run) => run,
        };

        let style = run_style(run);
        let space_w = text_width(" ", font_size, style);
        let starts_with_ws = run.text.starts_with(char::is_whitespace);

        for (i, word) in run.text.split_whitespace().enumerate() {
            let ww = text_width(word, font_size, style);

            let need_space =
                !current_chunks.is_empty() && (i > 0 || starts_with_ws || prev_ended_with_ws);
            let effective_space_w = if i > 0 || starts_with_ws {
                space_w
            } else {
                prev_space_w
            };
            let proposed_x = if need_space {
                current_x + effective_space_w
            } else {
                current_x
            };

            if !current_chunks.is_empty() && proposed_x + ww > max_width {
                lines.push(finish_line(&mut current_chunks, false));
                current_x = 0.0;
            } else {
                current_x = proposed_x;
            }

            current_chunks.push(WordChunk {
                text: word.to_string(),
                style,
                underline: run.underline,
                x_offset: current_x,
                width: ww,
            });
            current_x += ww;
        }

        if !run.text.is_empty() {
            prev_ended_with_ws = run.text.ends_with(char::is_whitespace);
        }
        prev_space_w = space_w;
    }

    if !current_chunks.is_empty() || lines.is_empty() {
        lines.push(finish_line(&mut current_chunks, true));
    } else if let Some(last) = lines.last_mut() {
        last.hard_break = true;
    }
    lines
}

/// Draw operations for one line, relative to the line's top edge.
pub(super) fn line_ops(
    line: &TextLine,
    x: f32,
    max_width: f32,
    align: Alignment,
    font_size: f32,
    pitch: f32,
) -> Vec<DrawOp> {
    let slack = (max_width - line.total_width).max(0.0);
    let (start, gap_extra) = match align {
        Alignment::Left => (0.0, 0.0),
        Alignment::Center => (slack / 2.0, 0.0),
        Alignment::Right => (slack, 0.0),
        Alignment::Justify if !line.hard_break && line.chunks.len() > 1 => {
            (0.0, slack / (line.chunks.len() - 1) as f32)
        }
        Alignment::Justify => (0.0, 0.0),
    };
    let baseline = baseline_offset(font_size, pitch);

    let mut ops = Vec::new();
    for (i, chunk) in line.chunks.iter().enumerate() {
        let cx = x + start + chunk.x_offset + gap_extra * i as f32;
        ops.push(DrawOp::Text {
            x: cx,
            y: baseline,
            size: font_size,
            style: chunk.style,
            text: chunk.text.clone(),
        });
        if chunk.underline {
            let uy = baseline + font_size * 0.12;
            ops.push(DrawOp::Line {
                x1: cx,
                y1: uy,
                x2: cx + chunk.width,
                y2: uy,
                width: (font_size * 0.05).max(0.5),
                color: [0, 0, 0],
            });
        }
    }
    ops
}

/// Distance from the top of a line box to the text baseline.
pub(super) fn baseline_offset(font_size: f32, pitch: f32) -> f32 {
    (pitch - font_size) / 2.0 + font_size * ASCENDER_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, bold: bool) -> Inline {
        Inline::Run(InlineRun {
            text: text.to_string(),
            bold,
            italic: false,
            underline: false,
        })
    }

    #[test]
    fn adjacent_runs_do_not_gain_a_space() {
        let lines = build_lines(&[run("bold", true), run(", plain", false)], 10.0, 500.0);
        assert_eq!(lines.len(), 1);
        let texts: Vec<&str> = lines[0].chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["bold", ",", "plain"]);
        let bold = &lines[0].chunks[0];
        assert_eq!(lines[0].chunks[1].x_offset, bold.x_offset + bold.width);
    }

    #[test]
    fn wraps_at_width() {
        let lines = build_lines(&[run("aaaa bbbb cccc dddd", false)], 10.0, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.total_width <= 60.0 || line.chunks.len() == 1);
        }
        assert!(lines.last().is_some_and(|l| l.hard_break));
        assert!(!lines[0].hard_break);
    }

    #[test]
    fn explicit_break_ends_line() {
        let lines = build_lines(&[run("one", false), Inline::LineBreak, run("two", false)], 10.0, 500.0);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].hard_break);
    }

    #[test]
    fn justified_line_fills_width() {
        let lines = build_lines(&[run("aa bb cc dd ee ff gg hh", false)], 10.0, 50.0);
        let first = &lines[0];
        let ops = line_ops(first, 0.0, 50.0, Alignment::Justify, 10.0, 12.0);
        let Some(DrawOp::Text { x, text, .. }) = ops.last() else {
            panic!("expected text");
        };
        let right = x + text_width(text, 10.0, FontStyle::Regular);
        assert!((right - 50.0).abs() < 0.01, "{right}");
    }
}
