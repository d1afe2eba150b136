//! Compile glyph outlines into Type 2 charstrings.
//!
//! Outlines are encoded without subroutines or hints. Coordinates are rounded to whole font units
//! before the relative deltas are taken, so rounding errors do not accumulate along a path.

use log::trace;
use pathfinder_geometry::vector::Vector2F;

use crate::binary::write::{WriteBinary, WriteBuffer, WriteContext};
use crate::binary::{I16Be, U8};
use crate::cff::charstring::operator;
use crate::cff::{Operator, PrivateDict, MAX_OPERANDS};
use crate::error::{CompilationError, ParseError};
use crate::outline::{GlyphOutline, PathCommand};

/// A charstring compiled from an outline along with the metrics it was compiled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCharstring {
    pub data: Vec<u8>,
    pub advance_width: u16,
    /// Only recorded for the vertical metrics, charstrings don't encode it.
    pub advance_height: u16,
}

/// The widths of a Private DICT that determine how a glyph's advance width is encoded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WidthContext {
    pub default_width_x: f64,
    pub nominal_width_x: f64,
}

/// A charstring operator with its operands.
#[derive(Debug, Clone, PartialEq)]
struct Op {
    operator: u8,
    args: Vec<i32>,
    kind: OpKind,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum OpKind {
    Move,
    Lines,
    /// hlineto/vlineto, `horizontal` is the direction the next line must take to be appended
    AlternatingLines { horizontal: bool },
    Curves,
}

const MAX_COORDINATE: f32 = 32767.;

struct Encoder {
    ops: Vec<Op>,
    current: (i32, i32),
}

impl WidthContext {
    pub fn from_private_dict(private_dict: &PrivateDict) -> Result<Self, ParseError> {
        let default_width_x = private_dict
            .get_f64(Operator::DefaultWidthX)
            .unwrap_or(Ok(0.))?;
        let nominal_width_x = private_dict
            .get_f64(Operator::NominalWidthX)
            .unwrap_or(Ok(0.))?;
        Ok(WidthContext {
            default_width_x,
            nominal_width_x,
        })
    }

    /// The width operand to emit for `advance_width`, `None` if the default width applies.
    fn width_operand(&self, advance_width: u16) -> Option<i32> {
        let advance_width = f64::from(advance_width);
        if advance_width == self.default_width_x {
            None
        } else {
            Some(round(advance_width - self.nominal_width_x))
        }
    }
}

/// Compile `outline` into a charstring for a glyph in the font described by `widths`.
pub fn compile(
    outline: &GlyphOutline,
    advance_width: u16,
    advance_height: u16,
    widths: WidthContext,
) -> Result<CompiledCharstring, CompilationError> {
    if outline.is_empty() {
        return Err(CompilationError::EmptyOutline);
    }
    let num_points = outline.num_points();
    if num_points < 2 {
        return Err(CompilationError::TooFewPoints(num_points));
    }
    if !outline.commands().all(within_operand_range) {
        return Err(CompilationError::ValueOutOfRange);
    }

    let mut encoder = Encoder {
        ops: Vec::new(),
        current: (0, 0),
    };
    for command in outline.commands() {
        match *command {
            PathCommand::MoveTo(to) => encoder.move_to(to),
            PathCommand::LineTo(to) => encoder.line_to(to),
            PathCommand::CubicCurveTo(ctrl, to) => encoder.curve_to(ctrl.from(), ctrl.to(), to),
            PathCommand::QuadraticCurveTo(ctrl, to) => {
                // Raise to a cubic with control points 2/3 of the way to the quadratic one
                let from = encoder.current_point();
                let ctrl1 = from + (ctrl - from) * (2. / 3.);
                let ctrl2 = to + (ctrl - to) * (2. / 3.);
                encoder.curve_to(ctrl1, ctrl2, to)
            }
            // The charstring closes subpaths implicitly
            PathCommand::Close => {}
        }
    }

    let width = widths.width_operand(advance_width);
    if let (Some(width), Some(first)) = (width, encoder.ops.first_mut()) {
        first.args.insert(0, width);
    }

    let mut buffer = WriteBuffer::new();
    for op in &encoder.ops {
        for &arg in &op.args {
            write_number(&mut buffer, arg)?;
        }
        U8::write(&mut buffer, op.operator)?;
    }
    U8::write(&mut buffer, operator::ENDCHAR)?;

    trace!(
        "compiled {} points into {} operators, {} bytes",
        num_points,
        encoder.ops.len() + 1,
        buffer.len()
    );

    Ok(CompiledCharstring {
        data: buffer.into_inner(),
        advance_width,
        advance_height,
    })
}

impl Encoder {
    fn current_point(&self) -> Vector2F {
        Vector2F::new(self.current.0 as f32, self.current.1 as f32)
    }

    // Round `point` and return its offset from the current point, which it becomes
    fn delta_to(&mut self, point: Vector2F) -> (i32, i32) {
        let point = (round(f64::from(point.x())), round(f64::from(point.y())));
        let delta = (point.0 - self.current.0, point.1 - self.current.1);
        self.current = point;
        delta
    }

    fn move_to(&mut self, to: Vector2F) {
        let (mut dx, mut dy) = self.delta_to(to);
        // A move directly after a move replaces it
        if let Some(last) = self.ops.last() {
            if last.kind == OpKind::Move {
                let (prev_dx, prev_dy) = move_delta(last);
                dx += prev_dx;
                dy += prev_dy;
                self.ops.pop();
            }
        }
        let (operator, args) = match (dx, dy) {
            (dx, 0) => (operator::HORIZONTAL_MOVE_TO, vec![dx]),
            (0, dy) => (operator::VERTICAL_MOVE_TO, vec![dy]),
            (dx, dy) => (operator::MOVE_TO, vec![dx, dy]),
        };
        self.ops.push(Op {
            operator,
            args,
            kind: OpKind::Move,
        });
    }

    fn line_to(&mut self, to: Vector2F) {
        match self.delta_to(to) {
            (dx, 0) if dx != 0 => self.push_alternating_line(dx, true),
            (0, dy) if dy != 0 => self.push_alternating_line(dy, false),
            (dx, dy) => self.push(operator::LINE_TO, OpKind::Lines, &[dx, dy]),
        }
    }

    fn curve_to(&mut self, ctrl1: Vector2F, ctrl2: Vector2F, to: Vector2F) {
        let (dxa, dya) = self.delta_to(ctrl1);
        let (dxb, dyb) = self.delta_to(ctrl2);
        let (dxc, dyc) = self.delta_to(to);
        self.push(
            operator::CURVE_TO,
            OpKind::Curves,
            &[dxa, dya, dxb, dyb, dxc, dyc],
        );
    }

    fn push_alternating_line(&mut self, delta: i32, horizontal: bool) {
        if let Some(last) = self.ops.last_mut() {
            if last.kind == (OpKind::AlternatingLines { horizontal }) && last.args.len() < MAX_OPERANDS
            {
                last.args.push(delta);
                last.kind = OpKind::AlternatingLines {
                    horizontal: !horizontal,
                };
                return;
            }
        }
        let operator = if horizontal {
            operator::HORIZONTAL_LINE_TO
        } else {
            operator::VERTICAL_LINE_TO
        };
        self.ops.push(Op {
            operator,
            args: vec![delta],
            kind: OpKind::AlternatingLines {
                horizontal: !horizontal,
            },
        });
    }

    // Append `args` to the previous operator when it is the same and the operand stack has room
    fn push(&mut self, operator: u8, kind: OpKind, args: &[i32]) {
        if let Some(last) = self.ops.last_mut() {
            if last.kind == kind && last.args.len() + args.len() <= MAX_OPERANDS {
                last.args.extend_from_slice(args);
                return;
            }
        }
        self.ops.push(Op {
            operator,
            args: args.to_vec(),
            kind,
        });
    }
}

fn move_delta(op: &Op) -> (i32, i32) {
    match (op.operator, op.args.as_slice()) {
        (operator::HORIZONTAL_MOVE_TO, [dx]) => (*dx, 0),
        (operator::VERTICAL_MOVE_TO, [dy]) => (0, *dy),
        (_, [dx, dy]) => (*dx, *dy),
        _ => (0, 0),
    }
}

// Every point must be encodable as an absolute operand, which also keeps the deltas between
// points within `i32`.
fn within_operand_range(command: &PathCommand) -> bool {
    let points = match *command {
        PathCommand::MoveTo(to) | PathCommand::LineTo(to) => [to, to, to],
        PathCommand::CubicCurveTo(ctrl, to) => [ctrl.from(), ctrl.to(), to],
        PathCommand::QuadraticCurveTo(ctrl, to) => [ctrl, to, to],
        PathCommand::Close => return true,
    };
    points
        .iter()
        .all(|point| point.x().abs() <= MAX_COORDINATE && point.y().abs() <= MAX_COORDINATE)
}

fn round(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

// Refer to Table 1 of Technical Note #5177 for the number encoding.
fn write_number<C: WriteContext>(ctxt: &mut C, value: i32) -> Result<(), CompilationError> {
    match value {
        // NOTE: Casts are safe due to patterns limiting range
        -107..=107 => U8::write(ctxt, (value + 139) as u8)?,
        108..=1131 => {
            let value = value - 108;
            U8::write(ctxt, ((value >> 8) + 247) as u8)?;
            U8::write(ctxt, value as u8)?;
        }
        -1131..=-108 => {
            let value = -value - 108;
            U8::write(ctxt, ((value >> 8) + 251) as u8)?;
            U8::write(ctxt, value as u8)?;
        }
        -32768..=32767 => {
            U8::write(ctxt, operator::SHORT_INT)?;
            I16Be::write(ctxt, value as i16)?;
        }
        _ => return Err(CompilationError::ValueOutOfRange),
    }
    Ok(())
}
