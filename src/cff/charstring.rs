//! Type 2 charstring interpretation.
//!
//! Refer to [Technical Note #5177](https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf)
//! for the charstring format.

// Portions of this file derived from ttf-parser, licenced under Apache-2.0.
// https://github.com/RazrFalcon/ttf-parser/blob/439aaaebd50eb8aed66302e3c1b51fae047f85b2/src/tables/cff/charstring.rs

use std::convert::TryFrom;
use std::fmt;

use pathfinder_geometry::line_segment::LineSegment2F;
use pathfinder_geometry::vector::vec2f;

use crate::binary::read::{ReadCtxt, ReadScope};
use crate::cff::{Index, Operator, CFF, MAX_OPERANDS};
use crate::error::ParseError;
use crate::outline::{NullSink, OutlineBuilder, OutlineSink};

// Limits according to the Adobe Technical Note #5177 Appendix B.
const STACK_LIMIT: u8 = 10;

const TWO_BYTE_OPERATOR_MARK: u8 = 12;

/// Errors that can occur while interpreting a charstring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharStringError {
    ParseError(ParseError),
    InvalidOperator,
    UnsupportedOperator,
    MissingEndChar,
    DataAfterEndChar,
    NestingLimitReached,
    ArgumentsStackLimitReached,
    InvalidArgumentsStackLength,
    MissingMoveTo,
    InvalidSubroutineIndex,
    NoLocalSubroutines,
    InvalidGlyphId(u16),
}

/// Outlines of the glyphs of a CFF table.
///
/// ```
/// use fontgraft::cff::charstring::CFFOutlines;
/// use fontgraft::outline::{GlyphOutline, OutlineBuilder};
/// # use fontgraft::cff::CFF;
/// # fn outline(cff: &CFF) -> Result<GlyphOutline, fontgraft::cff::charstring::CharStringError> {
/// let mut outline = GlyphOutline::new();
/// CFFOutlines { table: cff }.visit(1, &mut outline)?;
/// # Ok(outline)
/// # }
/// ```
pub struct CFFOutlines<'a> {
    pub table: &'a CFF,
}

/// Storage for the operand stack while processing charstrings.
struct ArgumentsStack {
    data: [f32; MAX_OPERANDS],
    len: usize,
}

/// Pen state used to turn relative charstring operands into absolute drawing commands.
struct Pen<'a, B>
where
    B: OutlineSink,
{
    builder: &'a mut B,
    x: f32,
    y: f32,
    // Used to track if a moveto operator has been encountered before other path building operators.
    has_move_to: bool,
    // The initial moveto of a charstring is relative to (0, 0), subsequent ones to the current
    // point. When not the first, a moveto closes the previous subpath.
    is_first_move_to: bool,
}

struct Interpreter<'a, 'b, B>
where
    B: OutlineSink,
{
    cff: &'a CFF,
    local_subr_index: Option<&'a Index>,
    stack: ArgumentsStack,
    pen: Pen<'b, B>,
    width: Option<f32>,
    width_parsed: bool,
    stems_len: usize,
    has_endchar: bool,
}

impl OutlineBuilder for CFFOutlines<'_> {
    type Error = CharStringError;

    fn visit<S: OutlineSink>(&mut self, glyph_index: u16, sink: &mut S) -> Result<(), Self::Error> {
        interpret(self.table, glyph_index, sink).map(|_width| ())
    }
}

impl CFFOutlines<'_> {
    /// The advance width of `glyph_id` in font units.
    ///
    /// Glyphs that don't encode a width use `defaultWidthX` of their Private DICT, otherwise the
    /// encoded value is relative to `nominalWidthX`.
    pub fn advance_width(&self, glyph_id: u16) -> Result<f32, CharStringError> {
        let (private_dict, _) = self
            .table
            .font
            .private_dict(glyph_id)
            .ok_or(CharStringError::InvalidGlyphId(glyph_id))?;
        let width = match interpret(self.table, glyph_id, &mut NullSink)? {
            Some(width) => {
                let nominal = private_dict
                    .get_f64(Operator::NominalWidthX)
                    .unwrap_or(Ok(0.))?;
                nominal as f32 + width
            }
            None => private_dict
                .get_f64(Operator::DefaultWidthX)
                .unwrap_or(Ok(0.))? as f32,
        };
        Ok(width)
    }
}

/// Interpret the charstring of `glyph_id`, drawing it into `sink`.
///
/// Returns the width operand of the charstring if it has one.
fn interpret<S: OutlineSink>(
    cff: &CFF,
    glyph_id: u16,
    sink: &mut S,
) -> Result<Option<f32>, CharStringError> {
    let char_string = cff
        .font
        .char_strings_index
        .read_object(usize::from(glyph_id))
        .ok_or(CharStringError::InvalidGlyphId(glyph_id))?;
    let (_, local_subr_index) = cff
        .font
        .private_dict(glyph_id)
        .ok_or(CharStringError::InvalidGlyphId(glyph_id))?;

    let mut interpreter = Interpreter {
        cff,
        local_subr_index,
        stack: ArgumentsStack::new(),
        pen: Pen {
            builder: sink,
            x: 0.0,
            y: 0.0,
            has_move_to: false,
            is_first_move_to: true,
        },
        width: None,
        width_parsed: false,
        stems_len: 0,
        has_endchar: false,
    };
    interpreter.run(char_string, 0)?;
    if !interpreter.has_endchar {
        return Err(CharStringError::MissingEndChar);
    }

    Ok(interpreter.width)
}

impl<B: OutlineSink> Interpreter<'_, '_, B> {
    fn run(&mut self, char_string: &[u8], depth: u8) -> Result<(), CharStringError> {
        let mut s = ReadScope::new(char_string).ctxt();
        while s.bytes_available() {
            let op = s.read_u8()?;
            match op {
                0 | 2 | 9 | 13 | 15 | 16 | 17 => {
                    // Reserved.
                    return Err(CharStringError::InvalidOperator);
                }
                operator::HORIZONTAL_STEM
                | operator::VERTICAL_STEM
                | operator::HORIZONTAL_STEM_HINT_MASK
                | operator::VERTICAL_STEM_HINT_MASK => {
                    // If the stack length is uneven, then the first value is a `width`.
                    self.handle_width(self.stack.len() % 2 == 1);
                    self.stems_len += self.stack.len() / 2;
                    self.stack.clear();
                }
                operator::VERTICAL_MOVE_TO => {
                    self.handle_width(self.stack.len() == 2);
                    self.pen.parse_vertical_move_to(&mut self.stack)?;
                }
                operator::LINE_TO => self.pen.parse_line_to(&mut self.stack)?,
                operator::HORIZONTAL_LINE_TO => self.pen.parse_alternating_line_to(&mut self.stack, true)?,
                operator::VERTICAL_LINE_TO => self.pen.parse_alternating_line_to(&mut self.stack, false)?,
                operator::CURVE_TO => self.pen.parse_curve_to(&mut self.stack)?,
                operator::CALL_LOCAL_SUBROUTINE => {
                    let local_subrs = self
                        .local_subr_index
                        .ok_or(CharStringError::NoLocalSubroutines)?;
                    self.call_subroutine(local_subrs, depth)?;
                    if self.has_endchar {
                        if s.bytes_available() {
                            return Err(CharStringError::DataAfterEndChar);
                        }
                        break;
                    }
                }
                operator::CALL_GLOBAL_SUBROUTINE => {
                    let cff = self.cff;
                    self.call_subroutine(&cff.global_subr_index, depth)?;
                    if self.has_endchar {
                        if s.bytes_available() {
                            return Err(CharStringError::DataAfterEndChar);
                        }
                        break;
                    }
                }
                operator::RETURN => break,
                TWO_BYTE_OPERATOR_MARK => {
                    let op2 = s.read_u8()?;
                    match op2 {
                        operator::HFLEX => self.pen.parse_hflex(&mut self.stack)?,
                        operator::FLEX => self.pen.parse_flex(&mut self.stack)?,
                        operator::HFLEX1 => self.pen.parse_hflex1(&mut self.stack)?,
                        operator::FLEX1 => self.pen.parse_flex1(&mut self.stack)?,
                        _ => return Err(CharStringError::UnsupportedOperator),
                    }
                }
                operator::ENDCHAR => {
                    self.handle_width(self.stack.len() == 1 || self.stack.len() == 5);
                    if !self.stack.is_empty() {
                        // Accented characters built with `seac` are not supported
                        return Err(CharStringError::UnsupportedOperator);
                    }
                    if s.bytes_available() {
                        return Err(CharStringError::DataAfterEndChar);
                    }
                    if !self.pen.is_first_move_to {
                        self.pen.is_first_move_to = true;
                        self.pen.builder.close();
                    }
                    self.has_endchar = true;
                    break;
                }
                operator::HINT_MASK | operator::COUNTER_MASK => {
                    // Stem hints may precede the mask in place of a vstemhm
                    self.handle_width(self.stack.len() % 2 == 1);
                    self.stems_len += self.stack.len() / 2;
                    self.stack.clear();
                    let _mask = s.read_slice((self.stems_len + 7) >> 3)?;
                }
                operator::MOVE_TO => {
                    self.handle_width(self.stack.len() == 3);
                    self.pen.parse_move_to(&mut self.stack)?;
                }
                operator::HORIZONTAL_MOVE_TO => {
                    self.handle_width(self.stack.len() == 2);
                    self.pen.parse_horizontal_move_to(&mut self.stack)?;
                }
                operator::CURVE_LINE => self.pen.parse_curve_line(&mut self.stack)?,
                operator::LINE_CURVE => self.pen.parse_line_curve(&mut self.stack)?,
                operator::VV_CURVE_TO => self.pen.parse_vv_curve_to(&mut self.stack)?,
                operator::HH_CURVE_TO => self.pen.parse_hh_curve_to(&mut self.stack)?,
                operator::VH_CURVE_TO => self.pen.parse_alternating_curve_to(&mut self.stack, false)?,
                operator::HV_CURVE_TO => self.pen.parse_alternating_curve_to(&mut self.stack, true)?,
                operator::SHORT_INT => {
                    let n = s.read_i16be()?;
                    self.stack.push(f32::from(n))?;
                }
                32..=246 => self.stack.push(parse_int1(op))?,
                247..=250 => self.stack.push(parse_int2(op, &mut s)?)?,
                251..=254 => self.stack.push(parse_int3(op, &mut s)?)?,
                operator::FIXED_16_16 => self.stack.push(parse_fixed(&mut s)?)?,
            }
        }

        Ok(())
    }

    // The width is only ever the first operand of the first stack clearing operator
    fn handle_width(&mut self, cond: bool) {
        if !self.width_parsed {
            self.width_parsed = true;
            if cond {
                self.width = Some(self.stack.remove_first());
            }
        }
    }

    fn call_subroutine(&mut self, subrs: &Index, depth: u8) -> Result<(), CharStringError> {
        if self.stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        if depth == STACK_LIMIT {
            return Err(CharStringError::NestingLimitReached);
        }

        let bias = calc_subroutine_bias(subrs.len());
        let index = conv_subroutine_index(self.stack.pop(), bias)
            .ok_or(CharStringError::InvalidSubroutineIndex)?;
        let char_string = subrs
            .read_object(index)
            .ok_or(CharStringError::InvalidSubroutineIndex)?;
        self.run(char_string, depth + 1)
    }
}

impl<B: OutlineSink> Pen<'_, B> {
    fn move_to(&mut self, dx: f32, dy: f32) {
        if self.is_first_move_to {
            self.is_first_move_to = false;
        } else {
            self.builder.close();
        }
        self.has_move_to = true;
        self.x += dx;
        self.y += dy;
        self.builder.move_to(vec2f(self.x, self.y));
    }

    fn line_to(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
        self.builder.line_to(vec2f(self.x, self.y));
    }

    #[allow(clippy::too_many_arguments)]
    fn curve_to(&mut self, dxa: f32, dya: f32, dxb: f32, dyb: f32, dxc: f32, dyc: f32) {
        let x1 = self.x + dxa;
        let y1 = self.y + dya;
        let x2 = x1 + dxb;
        let y2 = y1 + dyb;
        self.x = x2 + dxc;
        self.y = y2 + dyc;
        self.builder.cubic_curve_to(
            LineSegment2F::new(vec2f(x1, y1), vec2f(x2, y2)),
            vec2f(self.x, self.y),
        );
    }

    fn check_move_to(&self) -> Result<(), CharStringError> {
        if self.has_move_to {
            Ok(())
        } else {
            Err(CharStringError::MissingMoveTo)
        }
    }

    fn parse_move_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1 dy1
        if stack.len() != 2 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        self.move_to(stack.at(0), stack.at(1));
        stack.clear();
        Ok(())
    }

    fn parse_horizontal_move_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1
        if stack.len() != 1 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        self.move_to(stack.at(0), 0.0);
        stack.clear();
        Ok(())
    }

    fn parse_vertical_move_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dy1
        if stack.len() != 1 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }
        self.move_to(0.0, stack.at(0));
        stack.clear();
        Ok(())
    }

    fn parse_line_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // {dxa dya}+
        self.check_move_to()?;
        if stack.is_empty() || stack.len() % 2 == 1 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        for pair in stack.all().chunks_exact(2) {
            self.line_to(pair[0], pair[1]);
        }

        stack.clear();
        Ok(())
    }

    /// hlineto and vlineto: lines alternate between horizontal and vertical.
    fn parse_alternating_line_to(
        &mut self,
        stack: &mut ArgumentsStack,
        mut horizontal: bool,
    ) -> Result<(), CharStringError> {
        // dx1 {dya dxb}* / {dxa dyb}+ (hlineto), dy1 {dxa dyb}* / {dya dxb}+ (vlineto)
        self.check_move_to()?;
        if stack.is_empty() {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        for &delta in stack.all() {
            if horizontal {
                self.line_to(delta, 0.0);
            } else {
                self.line_to(0.0, delta);
            }
            horizontal = !horizontal;
        }

        stack.clear();
        Ok(())
    }

    fn parse_curve_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // {dxa dya dxb dyb dxc dyc}+
        self.check_move_to()?;
        if stack.is_empty() || stack.len() % 6 != 0 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        for c in stack.all().chunks_exact(6) {
            self.curve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
        }

        stack.clear();
        Ok(())
    }

    fn parse_curve_line(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // {dxa dya dxb dyb dxc dyc}+ dxd dyd
        self.check_move_to()?;
        if stack.len() < 8 || (stack.len() - 2) % 6 != 0 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let (curves, line) = stack.all().split_at(stack.len() - 2);
        for c in curves.chunks_exact(6) {
            self.curve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
        }
        self.line_to(line[0], line[1]);

        stack.clear();
        Ok(())
    }

    fn parse_line_curve(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // {dxa dya}+ dxb dyb dxc dyc dxd dyd
        self.check_move_to()?;
        if stack.len() < 8 || (stack.len() - 6) % 2 == 1 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let (lines, c) = stack.all().split_at(stack.len() - 6);
        for pair in lines.chunks_exact(2) {
            self.line_to(pair[0], pair[1]);
        }
        self.curve_to(c[0], c[1], c[2], c[3], c[4], c[5]);

        stack.clear();
        Ok(())
    }

    fn parse_hh_curve_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dy1? {dxa dxb dyb dxc}+
        self.check_move_to()?;

        let mut args = stack.all();
        let mut dy1 = 0.0;
        // The odd argument count indicates a Y position.
        if args.len() % 2 == 1 {
            dy1 = args[0];
            args = &args[1..];
        }
        if args.is_empty() || args.len() % 4 != 0 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        for c in args.chunks_exact(4) {
            self.curve_to(c[0], dy1, c[1], c[2], c[3], 0.0);
            dy1 = 0.0;
        }

        stack.clear();
        Ok(())
    }

    fn parse_vv_curve_to(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1? {dya dxb dyb dyc}+
        self.check_move_to()?;

        let mut args = stack.all();
        let mut dx1 = 0.0;
        // The odd argument count indicates an X position.
        if args.len() % 2 == 1 {
            dx1 = args[0];
            args = &args[1..];
        }
        if args.is_empty() || args.len() % 4 != 0 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        for c in args.chunks_exact(4) {
            self.curve_to(dx1, c[0], c[1], c[2], 0.0, c[3]);
            dx1 = 0.0;
        }

        stack.clear();
        Ok(())
    }

    /// hvcurveto and vhcurveto: curves alternate between starting horizontal and vertical.
    fn parse_alternating_curve_to(
        &mut self,
        stack: &mut ArgumentsStack,
        mut horizontal: bool,
    ) -> Result<(), CharStringError> {
        // dx1 dx2 dy2 dy3 {dya dxb dyb dxc dxd dxe dye dyf}* dxf? (hvcurveto)
        // dy1 dx2 dy2 dx3 {dxa dxb dyb dyc dyd dxe dye dxf}* dyf? (vhcurveto)
        self.check_move_to()?;
        if stack.len() < 4 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let args = stack.all();
        let mut i = 0;
        while i < args.len() {
            let remaining = args.len() - i;
            if remaining < 4 {
                return Err(CharStringError::InvalidArgumentsStackLength);
            }
            // The last curve may take a final extra argument
            let last = if remaining == 5 { args[i + 4] } else { 0.0 };
            let c = &args[i..i + 4];
            if horizontal {
                self.curve_to(c[0], 0.0, c[1], c[2], last, c[3]);
            } else {
                self.curve_to(0.0, c[0], c[1], c[2], c[3], last);
            }
            i += if remaining == 5 { 5 } else { 4 };
            horizontal = !horizontal;
        }

        stack.clear();
        Ok(())
    }

    fn parse_flex(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1 dy1 dx2 dy2 dx3 dy3 dx4 dy4 dx5 dy5 dx6 dy6 fd
        self.check_move_to()?;
        if stack.len() != 13 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let a = stack.all();
        self.curve_to(a[0], a[1], a[2], a[3], a[4], a[5]);
        self.curve_to(a[6], a[7], a[8], a[9], a[10], a[11]);

        stack.clear();
        Ok(())
    }

    fn parse_flex1(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1 dy1 dx2 dy2 dx3 dy3 dx4 dy4 dx5 dy5 d6
        self.check_move_to()?;
        if stack.len() != 11 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let a = stack.all();
        let dx: f32 = a[..10].iter().step_by(2).sum();
        let dy: f32 = a[1..10].iter().step_by(2).sum();
        // d6 is along whichever axis moved furthest, the other returns to the start
        let (dx6, dy6) = if dx.abs() > dy.abs() {
            (a[10], -dy)
        } else {
            (-dx, a[10])
        };
        self.curve_to(a[0], a[1], a[2], a[3], a[4], a[5]);
        self.curve_to(a[6], a[7], a[8], a[9], dx6, dy6);

        stack.clear();
        Ok(())
    }

    fn parse_hflex(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1 dx2 dy2 dx3 dx4 dx5 dx6
        self.check_move_to()?;
        if stack.len() != 7 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let a = stack.all();
        self.curve_to(a[0], 0.0, a[1], a[2], a[3], 0.0);
        self.curve_to(a[4], 0.0, a[5], -a[2], a[6], 0.0);

        stack.clear();
        Ok(())
    }

    fn parse_hflex1(&mut self, stack: &mut ArgumentsStack) -> Result<(), CharStringError> {
        // dx1 dy1 dx2 dy2 dx3 dx4 dx5 dy5 dx6
        self.check_move_to()?;
        if stack.len() != 9 {
            return Err(CharStringError::InvalidArgumentsStackLength);
        }

        let a = stack.all();
        // The curve ends at the starting y
        let dy6 = -(a[1] + a[3] + a[7]);
        self.curve_to(a[0], a[1], a[2], a[3], a[4], 0.0);
        self.curve_to(a[5], 0.0, a[6], a[7], a[8], dy6);

        stack.clear();
        Ok(())
    }
}

impl ArgumentsStack {
    fn new() -> Self {
        ArgumentsStack {
            data: [0.0; MAX_OPERANDS],
            len: 0,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, n: f32) -> Result<(), CharStringError> {
        if self.len == MAX_OPERANDS {
            Err(CharStringError::ArgumentsStackLimitReached)
        } else {
            self.data[self.len] = n;
            self.len += 1;
            Ok(())
        }
    }

    fn at(&self, index: usize) -> f32 {
        self.data[index]
    }

    fn pop(&mut self) -> f32 {
        debug_assert!(!self.is_empty());
        self.len -= 1;
        self.data[self.len]
    }

    /// Remove the bottom of the stack, which must not be empty.
    fn remove_first(&mut self) -> f32 {
        let first = self.data[0];
        self.data.copy_within(1..self.len, 0);
        self.len -= 1;
        first
    }

    fn all(&self) -> &[f32] {
        &self.data[..self.len]
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

// CharString number parsing functions
fn parse_int1(op: u8) -> f32 {
    f32::from(i16::from(op) - 139)
}

fn parse_int2(op: u8, s: &mut ReadCtxt<'_>) -> Result<f32, CharStringError> {
    let b1 = s.read_u8()?;
    let n = (i16::from(op) - 247) * 256 + i16::from(b1) + 108;
    Ok(f32::from(n))
}

fn parse_int3(op: u8, s: &mut ReadCtxt<'_>) -> Result<f32, CharStringError> {
    let b1 = s.read_u8()?;
    let n = -(i16::from(op) - 251) * 256 - i16::from(b1) - 108;
    Ok(f32::from(n))
}

fn parse_fixed(s: &mut ReadCtxt<'_>) -> Result<f32, CharStringError> {
    let n = s.read_i32be()?;
    Ok(n as f32 / 65536.0)
}

// Conversion from a biased subr index operand to an unbiased index
fn conv_subroutine_index(index: f32, bias: u16) -> Option<usize> {
    let index = i32::try_from(index as i64).ok()?;
    let index = index.checked_add(i32::from(bias))?;
    usize::try_from(index).ok()
}

// Adobe Technical Note #5176, Chapter 16 "Local / Global Subrs INDEXes"
fn calc_subroutine_bias(len: usize) -> u16 {
    if len < 1240 {
        107
    } else if len < 33900 {
        1131
    } else {
        32768
    }
}

impl From<ParseError> for CharStringError {
    fn from(error: ParseError) -> CharStringError {
        CharStringError::ParseError(error)
    }
}

impl From<crate::binary::read::ReadEof> for CharStringError {
    fn from(_error: crate::binary::read::ReadEof) -> CharStringError {
        CharStringError::ParseError(ParseError::BadEof)
    }
}

impl fmt::Display for CharStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharStringError::ParseError(parse_error) => {
                write!(f, "parse error: ")?;
                parse_error.fmt(f)
            }
            CharStringError::InvalidOperator => write!(f, "an invalid operator occurred"),
            CharStringError::UnsupportedOperator => write!(f, "an unsupported operator occurred"),
            CharStringError::MissingEndChar => write!(f, "the 'endchar' operator is missing"),
            CharStringError::DataAfterEndChar => {
                write!(f, "unused data left after 'endchar' operator")
            }
            CharStringError::NestingLimitReached => write!(f, "subroutines nesting limit reached"),
            CharStringError::ArgumentsStackLimitReached => {
                write!(f, "arguments stack limit reached")
            }
            CharStringError::InvalidArgumentsStackLength => {
                write!(f, "an invalid amount of items are in an arguments stack")
            }
            CharStringError::MissingMoveTo => write!(f, "missing moveto operator"),
            CharStringError::InvalidSubroutineIndex => write!(f, "an invalid subroutine index"),
            CharStringError::NoLocalSubroutines => write!(f, "no local subroutines"),
            CharStringError::InvalidGlyphId(glyph_id) => write!(f, "invalid glyph id {}", glyph_id),
        }
    }
}

impl std::error::Error for CharStringError {}

/// Operators defined in Adobe Technical Note #5177, The Type 2 Charstring Format.
pub(crate) mod operator {
    pub const HORIZONTAL_STEM: u8 = 1;
    pub const VERTICAL_STEM: u8 = 3;
    pub const VERTICAL_MOVE_TO: u8 = 4;
    pub const LINE_TO: u8 = 5;
    pub const HORIZONTAL_LINE_TO: u8 = 6;
    pub const VERTICAL_LINE_TO: u8 = 7;
    pub const CURVE_TO: u8 = 8;
    pub const CALL_LOCAL_SUBROUTINE: u8 = 10;
    pub const RETURN: u8 = 11;
    pub const ENDCHAR: u8 = 14;
    pub const HORIZONTAL_STEM_HINT_MASK: u8 = 18;
    pub const HINT_MASK: u8 = 19;
    pub const COUNTER_MASK: u8 = 20;
    pub const MOVE_TO: u8 = 21;
    pub const HORIZONTAL_MOVE_TO: u8 = 22;
    pub const VERTICAL_STEM_HINT_MASK: u8 = 23;
    pub const CURVE_LINE: u8 = 24;
    pub const LINE_CURVE: u8 = 25;
    pub const VV_CURVE_TO: u8 = 26;
    pub const HH_CURVE_TO: u8 = 27;
    pub const SHORT_INT: u8 = 28;
    pub const CALL_GLOBAL_SUBROUTINE: u8 = 29;
    pub const VH_CURVE_TO: u8 = 30;
    pub const HV_CURVE_TO: u8 = 31;
    pub const HFLEX: u8 = 34;
    pub const FLEX: u8 = 35;
    pub const HFLEX1: u8 = 36;
    pub const FLEX1: u8 = 37;
    pub const FIXED_16_16: u8 = 255;
}
