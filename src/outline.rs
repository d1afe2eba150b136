//! Glyph outlines as sequences of drawing commands.
//!
//! Outlines flow in two directions in this crate. Outlines submitted for new glyphs are decoded
//! into a [GlyphOutline] (see [crate::path]) and compiled into charstrings. Existing CFF glyphs
//! are interpreted and delivered as drawing callbacks on an implementor of [OutlineSink].
//! `GlyphOutline` is itself an `OutlineSink`, so collecting an existing outline is a matter of
//! passing one to [OutlineBuilder::visit].
//!
//! ### Example
//!
//! ```
//! use fontgraft::outline::{GlyphOutline, OutlineSink, PathCommand};
//! use fontgraft::pathfinder_geometry::vector::vec2f;
//!
//! let mut outline = GlyphOutline::new();
//! outline.move_to(vec2f(0., 0.));
//! outline.line_to(vec2f(100., 0.));
//! outline.line_to(vec2f(100., 100.));
//! outline.close();
//!
//! assert_eq!(outline.subpaths.len(), 1);
//! assert_eq!(outline.subpaths[0].last(), Some(&PathCommand::Close));
//! assert_eq!(outline.num_points(), 3);
//! ```

use pathfinder_geometry::line_segment::LineSegment2F;
use pathfinder_geometry::vector::Vector2F;

/// Trait for visiting a glyph outline and delivering drawing commands to an `OutlineSink`.
pub trait OutlineBuilder {
    type Error: std::error::Error;

    /// Visit the outline of glyph `glyph_index` in `self`.
    fn visit<S: OutlineSink>(&mut self, glyph_index: u16, sink: &mut S) -> Result<(), Self::Error>;
}

// `OutlineSink` is from font-kit, font-kit/src/outline.rs:
//
// Copyright © 2020 The Pathfinder Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// A trait for visiting a glyph outline
pub trait OutlineSink {
    /// Moves the pen to a point.
    fn move_to(&mut self, to: Vector2F);
    /// Draws a line to a point.
    fn line_to(&mut self, to: Vector2F);
    /// Draws a quadratic Bézier curve to a point.
    fn quadratic_curve_to(&mut self, ctrl: Vector2F, to: Vector2F);
    /// Draws a cubic Bézier curve to a point.
    fn cubic_curve_to(&mut self, ctrl: LineSegment2F, to: Vector2F);
    /// Closes the path, returning to the first point in it.
    fn close(&mut self);
}

/// A single drawing command with absolute coordinates in font design units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PathCommand {
    MoveTo(Vector2F),
    LineTo(Vector2F),
    /// Two control points (as the `from` and `to` of the segment) and the end point.
    CubicCurveTo(LineSegment2F, Vector2F),
    /// Control point and end point.
    QuadraticCurveTo(Vector2F, Vector2F),
    Close,
}

/// A glyph outline made up of subpaths.
///
/// Each subpath starts with a `MoveTo`. A `Close`, if present, is the last command of its
/// subpath.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphOutline {
    pub subpaths: Vec<Vec<PathCommand>>,
}

impl PathCommand {
    /// The on-curve point this command ends at, `None` for `Close`.
    pub fn end_point(&self) -> Option<Vector2F> {
        match *self {
            PathCommand::MoveTo(to)
            | PathCommand::LineTo(to)
            | PathCommand::CubicCurveTo(_, to)
            | PathCommand::QuadraticCurveTo(_, to) => Some(to),
            PathCommand::Close => None,
        }
    }

    /// Number of points, on and off curve, this command carries.
    pub fn num_points(&self) -> usize {
        match self {
            PathCommand::MoveTo(_) | PathCommand::LineTo(_) => 1,
            PathCommand::CubicCurveTo(..) => 3,
            PathCommand::QuadraticCurveTo(..) => 2,
            PathCommand::Close => 0,
        }
    }
}

impl GlyphOutline {
    pub fn new() -> Self {
        GlyphOutline::default()
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|subpath| subpath.is_empty())
    }

    /// Total number of points in the outline.
    pub fn num_points(&self) -> usize {
        self.commands().map(PathCommand::num_points).sum()
    }

    /// Iterate over all commands of all subpaths in order.
    pub fn commands(&self) -> impl DoubleEndedIterator<Item = &PathCommand> + '_ {
        self.subpaths.iter().flatten()
    }

    /// Replay this outline into `sink`.
    pub fn visit<S: OutlineSink>(&self, sink: &mut S) {
        for command in self.commands() {
            match *command {
                PathCommand::MoveTo(to) => sink.move_to(to),
                PathCommand::LineTo(to) => sink.line_to(to),
                PathCommand::CubicCurveTo(ctrl, to) => sink.cubic_curve_to(ctrl, to),
                PathCommand::QuadraticCurveTo(ctrl, to) => sink.quadratic_curve_to(ctrl, to),
                PathCommand::Close => sink.close(),
            }
        }
    }

    fn push(&mut self, command: PathCommand) {
        let open = self
            .subpaths
            .last()
            .map_or(false, |subpath| !matches!(subpath.last(), Some(PathCommand::Close)));
        if open {
            if let Some(subpath) = self.subpaths.last_mut() {
                subpath.push(command);
            }
        } else {
            // Drawing without a preceding move continues from the last point
            let start = self
                .commands()
                .rev()
                .find_map(PathCommand::end_point)
                .unwrap_or_else(Vector2F::zero);
            self.subpaths.push(vec![PathCommand::MoveTo(start), command]);
        }
    }
}

impl OutlineSink for GlyphOutline {
    fn move_to(&mut self, to: Vector2F) {
        self.subpaths.push(vec![PathCommand::MoveTo(to)]);
    }

    fn line_to(&mut self, to: Vector2F) {
        self.push(PathCommand::LineTo(to));
    }

    fn quadratic_curve_to(&mut self, ctrl: Vector2F, to: Vector2F) {
        self.push(PathCommand::QuadraticCurveTo(ctrl, to));
    }

    fn cubic_curve_to(&mut self, ctrl: LineSegment2F, to: Vector2F) {
        self.push(PathCommand::CubicCurveTo(ctrl, to));
    }

    fn close(&mut self) {
        if let Some(subpath) = self.subpaths.last_mut() {
            if !matches!(subpath.last(), Some(PathCommand::Close) | None) {
                subpath.push(PathCommand::Close);
            }
        }
    }
}

pub(crate) struct NullSink;

impl OutlineSink for NullSink {
    fn move_to(&mut self, _to: Vector2F) {}

    fn line_to(&mut self, _to: Vector2F) {}

    fn quadratic_curve_to(&mut self, _ctrl: Vector2F, _to: Vector2F) {}

    fn cubic_curve_to(&mut self, _ctrl: LineSegment2F, _to: Vector2F) {}

    fn close(&mut self) {}
}
