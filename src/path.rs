//! Decoding of outline descriptions submitted for new glyphs.
//!
//! Outlines arrive as a list of subpaths, each a list of tagged commands with absolute
//! coordinates. In JSON a command is an array holding the tag followed by its arguments:
//!
//! ```json
//! [[["M", 0, 0], ["L", 100, 0], ["L", 100, 100], ["Z"]]]
//! ```
//!
//! | Tag | Arguments              | Command                  |
//! |-----|------------------------|--------------------------|
//! | `M` | `x y`                  | move                     |
//! | `L` | `x y`                  | line                     |
//! | `C` | `x1 y1 x2 y2 x y`      | cubic Bézier curve       |
//! | `Q` | `x1 y1 x y`            | quadratic Bézier curve   |
//! | `Z` |                        | close                    |
//!
//! [decode] validates the commands and produces a [GlyphOutline] made up of the closed set of
//! [PathCommand] variants, so nothing past this module has to deal with unknown tags.

use std::fmt;

use pathfinder_geometry::line_segment::LineSegment2F;
use pathfinder_geometry::vector::{vec2f, Vector2F};
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MalformedPathError, PathErrorKind};
use crate::outline::{GlyphOutline, PathCommand};

/// A drawing command as supplied by the caller, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
    pub tag: String,
    pub args: Vec<f64>,
}

impl RawCommand {
    pub fn new(tag: impl Into<String>, args: Vec<f64>) -> Self {
        RawCommand {
            tag: tag.into(),
            args,
        }
    }
}

/// Split a flat command list into subpaths, starting a new subpath at every move.
///
/// Commands before the first move form a subpath of their own, which [decode] will reject.
pub fn split_subpaths(commands: Vec<RawCommand>) -> Vec<Vec<RawCommand>> {
    let mut subpaths: Vec<Vec<RawCommand>> = Vec::new();
    for command in commands {
        match subpaths.last_mut() {
            Some(subpath) if command.tag != "M" => subpath.push(command),
            _ => subpaths.push(vec![command]),
        }
    }
    subpaths
}

/// Validate `subpaths` and convert them into an outline.
pub fn decode(subpaths: &[Vec<RawCommand>]) -> Result<GlyphOutline, MalformedPathError> {
    let subpaths = subpaths
        .iter()
        .enumerate()
        .map(|(index, subpath)| decode_subpath(index, subpath))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GlyphOutline { subpaths })
}

fn decode_subpath(
    subpath_index: usize,
    subpath: &[RawCommand],
) -> Result<Vec<PathCommand>, MalformedPathError> {
    if subpath.is_empty() {
        return Err(MalformedPathError {
            subpath: subpath_index,
            command: None,
            tag: String::new(),
            kind: PathErrorKind::EmptySubpath,
        });
    }

    let mut commands = Vec::with_capacity(subpath.len());
    for (index, raw) in subpath.iter().enumerate() {
        let error = |kind| MalformedPathError {
            subpath: subpath_index,
            command: Some(index),
            tag: raw.tag.clone(),
            kind,
        };

        let expected = arity(&raw.tag).ok_or_else(|| error(PathErrorKind::UnknownCommand))?;
        match (index, raw.tag.as_str()) {
            (0, "M") => {}
            (0, _) => return Err(error(PathErrorKind::MissingMoveTo)),
            (_, "M") => return Err(error(PathErrorKind::MoveInsideSubpath)),
            _ => {}
        }
        if let Some(PathCommand::Close) = commands.last() {
            return Err(error(PathErrorKind::CommandAfterClose));
        }
        if raw.args.len() != expected {
            return Err(error(PathErrorKind::BadArity {
                expected,
                found: raw.args.len(),
            }));
        }
        let points = raw
            .args
            .chunks_exact(2)
            .map(|xy| point(xy[0], xy[1]))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| error(PathErrorKind::NonFiniteCoordinate))?;

        let command = match (raw.tag.as_str(), points.as_slice()) {
            ("M", &[to]) => PathCommand::MoveTo(to),
            ("L", &[to]) => PathCommand::LineTo(to),
            ("C", &[ctrl1, ctrl2, to]) => {
                PathCommand::CubicCurveTo(LineSegment2F::new(ctrl1, ctrl2), to)
            }
            ("Q", &[ctrl, to]) => PathCommand::QuadraticCurveTo(ctrl, to),
            ("Z", &[]) => PathCommand::Close,
            _ => return Err(error(PathErrorKind::UnknownCommand)),
        };
        commands.push(command);
    }

    Ok(commands)
}

fn arity(tag: &str) -> Option<usize> {
    match tag {
        "M" | "L" => Some(2),
        "C" => Some(6),
        "Q" => Some(4),
        "Z" => Some(0),
        _ => None,
    }
}

fn point(x: f64, y: f64) -> Option<Vector2F> {
    let (x, y) = (x as f32, y as f32);
    (x.is_finite() && y.is_finite()).then(|| vec2f(x, y))
}

impl Serialize for RawCommand {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(1 + self.args.len()))?;
        seq.serialize_element(&self.tag)?;
        for arg in &self.args {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RawCommand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CommandVisitor;

        impl<'de> Visitor<'de> for CommandVisitor {
            type Value = RawCommand;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "an array of a command tag followed by numbers")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<RawCommand, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let tag: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let mut args = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(arg) = seq.next_element::<f64>()? {
                    args.push(arg);
                }
                Ok(RawCommand { tag, args })
            }
        }

        deserializer.deserialize_seq(CommandVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmd(tag: &str, args: &[f64]) -> RawCommand {
        RawCommand::new(tag, args.to_vec())
    }

    fn box_path() -> Vec<Vec<RawCommand>> {
        vec![vec![
            cmd("M", &[0., 0.]),
            cmd("L", &[100., 0.]),
            cmd("L", &[100., 100.]),
            cmd("L", &[0., 100.]),
            cmd("Z", &[]),
        ]]
    }

    #[test]
    fn test_decode_box() {
        let outline = decode(&box_path()).unwrap();
        assert_eq!(
            outline.subpaths,
            vec![vec![
                PathCommand::MoveTo(vec2f(0., 0.)),
                PathCommand::LineTo(vec2f(100., 0.)),
                PathCommand::LineTo(vec2f(100., 100.)),
                PathCommand::LineTo(vec2f(0., 100.)),
                PathCommand::Close,
            ]]
        );
    }

    #[test]
    fn test_decode_curves() {
        let subpaths = vec![vec![
            cmd("M", &[0., 0.]),
            cmd("C", &[10., 0., 20., 10., 20., 20.]),
            cmd("Q", &[20., 40., 0., 40.]),
        ]];
        let outline = decode(&subpaths).unwrap();
        assert_eq!(
            outline.subpaths[0][1],
            PathCommand::CubicCurveTo(
                LineSegment2F::new(vec2f(10., 0.), vec2f(20., 10.)),
                vec2f(20., 20.)
            )
        );
        assert_eq!(
            outline.subpaths[0][2],
            PathCommand::QuadraticCurveTo(vec2f(20., 40.), vec2f(0., 40.))
        );
    }

    #[test]
    fn test_json() {
        let json = r#"[[["M", 0, 0], ["L", 100, 0], ["L", 100, 100], ["L", 0, 100], ["Z"]]]"#;
        let subpaths: Vec<Vec<RawCommand>> = serde_json::from_str(json).unwrap();
        assert_eq!(subpaths, box_path());
        assert_eq!(
            serde_json::to_string(&subpaths[0][1]).unwrap(),
            r#"["L",100.0,0.0]"#
        );
    }

    #[test]
    fn test_json_rejects_non_numeric_argument() {
        let json = r#"["M", "zero", 0]"#;
        assert!(serde_json::from_str::<RawCommand>(json).is_err());
        assert!(serde_json::from_str::<RawCommand>("[]").is_err());
    }

    #[test]
    fn test_missing_move() {
        let subpaths = vec![box_path().remove(0), vec![cmd("L", &[1., 1.])]];
        let err = decode(&subpaths).unwrap_err();
        assert_eq!(err.subpath, 1);
        assert_eq!(err.command, Some(0));
        assert_eq!(err.tag, "L");
        assert_eq!(err.kind, PathErrorKind::MissingMoveTo);
    }

    #[test]
    fn test_unknown_command() {
        let subpaths = vec![vec![cmd("M", &[0., 0.]), cmd("X", &[1., 1.])]];
        let err = decode(&subpaths).unwrap_err();
        assert_eq!(err.tag, "X");
        assert_eq!(err.kind, PathErrorKind::UnknownCommand);
        assert_eq!(
            err.to_string(),
            "malformed path: subpath 0, command 1 ('X'): unrecognised command"
        );
    }

    #[test]
    fn test_unknown_first_command() {
        let err = decode(&[vec![cmd("X", &[])]]).unwrap_err();
        assert_eq!(err.kind, PathErrorKind::UnknownCommand);
    }

    #[test]
    fn test_bad_arity() {
        let subpaths = vec![vec![cmd("M", &[0., 0.]), cmd("C", &[1., 2., 3., 4.])]];
        assert_eq!(
            decode(&subpaths).unwrap_err().kind,
            PathErrorKind::BadArity {
                expected: 6,
                found: 4
            }
        );
        let subpaths = vec![vec![cmd("M", &[0., 0.]), cmd("Z", &[1.])]];
        assert_eq!(
            decode(&subpaths).unwrap_err().kind,
            PathErrorKind::BadArity {
                expected: 0,
                found: 1
            }
        );
    }

    #[test]
    fn test_empty_subpath() {
        let err = decode(&[vec![]]).unwrap_err();
        assert_eq!(err.kind, PathErrorKind::EmptySubpath);
        assert_eq!(err.command, None);
    }

    #[test]
    fn test_move_inside_subpath() {
        let subpaths = vec![vec![cmd("M", &[0., 0.]), cmd("M", &[5., 5.])]];
        assert_eq!(
            decode(&subpaths).unwrap_err().kind,
            PathErrorKind::MoveInsideSubpath
        );
    }

    #[test]
    fn test_command_after_close() {
        let subpaths = vec![vec![
            cmd("M", &[0., 0.]),
            cmd("L", &[5., 5.]),
            cmd("Z", &[]),
            cmd("L", &[9., 9.]),
        ]];
        let err = decode(&subpaths).unwrap_err();
        assert_eq!(err.command, Some(3));
        assert_eq!(err.kind, PathErrorKind::CommandAfterClose);
    }

    #[test]
    fn test_non_finite() {
        let subpaths = vec![vec![cmd("M", &[0., f64::NAN])]];
        assert_eq!(
            decode(&subpaths).unwrap_err().kind,
            PathErrorKind::NonFiniteCoordinate
        );
        // Too large for the outline's coordinate type
        let subpaths = vec![vec![cmd("M", &[0., 1e300])]];
        assert_eq!(
            decode(&subpaths).unwrap_err().kind,
            PathErrorKind::NonFiniteCoordinate
        );
    }

    #[test]
    fn test_split_subpaths() {
        let commands = vec![
            cmd("M", &[0., 0.]),
            cmd("L", &[1., 0.]),
            cmd("Z", &[]),
            cmd("M", &[5., 5.]),
            cmd("L", &[6., 5.]),
        ];
        let subpaths = split_subpaths(commands);
        assert_eq!(subpaths.len(), 2);
        assert_eq!(subpaths[1][0], cmd("M", &[5., 5.]));
        assert_eq!(subpaths[1].len(), 2);
    }

    #[test]
    fn test_split_leading_draw() {
        let subpaths = split_subpaths(vec![cmd("L", &[1., 0.]), cmd("M", &[0., 0.])]);
        assert_eq!(subpaths.len(), 2);
        assert_eq!(
            decode(&subpaths).unwrap_err().kind,
            PathErrorKind::MissingMoveTo
        );
    }
}
