//! Type 2 charstrings: tokens, encoding, and an interpreter to check our work.
//!
//! See <https://adobe-type-tools.github.io/font-tech-notes/pdfs/5177.Type2.pdf>.

use std::fmt::Display;

use kiln_ir::ir::{Contour, Segment};
use kurbo::Point;
use serde::{Deserialize, Serialize};

use super::Flavor;

/// Subroutines may call subroutines this deep, and no deeper.
pub const NESTING_LIMIT: usize = 10;

/// An operand. Fixed is 16.16.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Number {
    Int(i32),
    Fixed(i32),
}

impl Number {
    pub fn from_f64(value: f64) -> Number {
        if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
            Number::Int(value as i32)
        } else {
            Number::Fixed((value * 65536.0).round() as i32)
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Fixed(v) => v as f64 / 65536.0,
        }
    }

    pub fn is_zero(self) -> bool {
        matches!(self, Number::Int(0) | Number::Fixed(0))
    }

    /// Shortest Type 2 encoding.
    pub fn encode(self, out: &mut Vec<u8>) {
        match self {
            Number::Int(v @ -107..=107) => out.push((v + 139) as u8),
            Number::Int(v @ 108..=1131) => {
                let v = v - 108;
                out.extend([(v / 256 + 247) as u8, (v % 256) as u8]);
            }
            Number::Int(v @ -1131..=-108) => {
                let v = -v - 108;
                out.extend([(v / 256 + 251) as u8, (v % 256) as u8]);
            }
            Number::Int(v @ -32768..=32767) => {
                out.push(28);
                out.extend((v as i16).to_be_bytes());
            }
            Number::Int(v) => {
                out.push(255);
                out.extend(v.saturating_mul(65536).to_be_bytes());
            }
            Number::Fixed(v) => {
                out.push(255);
                out.extend(v.to_be_bytes());
            }
        }
    }

    pub fn encoded_size(self) -> usize {
        match self {
            Number::Int(-107..=107) => 1,
            Number::Int(-1131..=1131) => 2,
            Number::Int(-32768..=32767) => 3,
            _ => 5,
        }
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    RMoveTo,
    HMoveTo,
    VMoveTo,
    RLineTo,
    HLineTo,
    VLineTo,
    RRCurveTo,
    HHCurveTo,
    VVCurveTo,
    HVCurveTo,
    VHCurveTo,
    RCurveLine,
    RLineCurve,
    CallSubr,
    CallGSubr,
    Return,
    EndChar,
    /// CFF2: pick the item variation data later blends use
    VsIndex,
    /// CFF2: replace defaults and their deltas with values for the current location
    Blend,
}

impl Operator {
    pub fn code(self) -> u8 {
        match self {
            Operator::VMoveTo => 4,
            Operator::RLineTo => 5,
            Operator::HLineTo => 6,
            Operator::VLineTo => 7,
            Operator::RRCurveTo => 8,
            Operator::CallSubr => 10,
            Operator::Return => 11,
            Operator::EndChar => 14,
            Operator::VsIndex => 15,
            Operator::Blend => 16,
            Operator::RMoveTo => 21,
            Operator::HMoveTo => 22,
            Operator::RCurveLine => 24,
            Operator::RLineCurve => 25,
            Operator::VVCurveTo => 26,
            Operator::HHCurveTo => 27,
            Operator::CallGSubr => 29,
            Operator::VHCurveTo => 30,
            Operator::HVCurveTo => 31,
        }
    }

    pub fn is_moveto(self) -> bool {
        matches!(self, Operator::RMoveTo | Operator::HMoveTo | Operator::VMoveTo)
    }
}

/// A call to a subroutine, by its unbiased index in the global or local table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubrRef {
    pub global: bool,
    pub index: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Number(Number),
    Operator(Operator),
    /// Index operand and call operator together
    Call(SubrRef),
}

impl Token {
    pub fn is_operator(self) -> bool {
        !matches!(self, Token::Number(..))
    }
}

/// The bias added to a subroutine number, per the size of its table.
pub fn bias(num_subrs: usize) -> usize {
    if num_subrs < 1240 {
        107
    } else if num_subrs < 33900 {
        1131
    } else {
        32768
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CharString(pub Vec<Token>);

impl CharString {
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn push(&mut self, operands: &[Number], op: Operator) {
        self.0.extend(operands.iter().map(|n| Token::Number(*n)));
        self.0.push(Token::Operator(op));
    }

    /// A generic program, rmoveto/rlineto/rrcurveto only, for cubic contours.
    ///
    /// Coordinates within `round_tolerance` of an integer are snapped to it.
    pub fn from_contours(contours: &[Contour], round_tolerance: f64, flavor: Flavor) -> CharString {
        let round = |v: f64| {
            let rounded = (v + 0.5).floor();
            if (v - rounded).abs() <= round_tolerance {
                rounded
            } else {
                v
            }
        };
        let round_pt = |p: Point| Point::new(round(p.x), round(p.y));

        let mut cs = CharString::default();
        let mut current = Point::ZERO;
        let rel = |p: Point, current: &mut Point| {
            let p = round_pt(p);
            let d = p - *current;
            *current = p;
            [Number::from_f64(d.x), Number::from_f64(d.y)]
        };
        for contour in contours.iter().filter(|c| !c.is_empty()) {
            let segments = contour.segments();
            let Some(first) = segments.first() else {
                continue;
            };
            let start = first.start();
            cs.push(&rel(start, &mut current), Operator::RMoveTo);
            let last = segments.len() - 1;
            for (i, segment) in segments.iter().enumerate() {
                match segment {
                    // closing is implied
                    Segment::Line(_, p1) if i == last && round_pt(*p1) == round_pt(start) => (),
                    Segment::Line(_, p1) => cs.push(&rel(*p1, &mut current), Operator::RLineTo),
                    Segment::Cubic(_, p1, p2, p3) => {
                        let mut args = Vec::with_capacity(6);
                        for p in [p1, p2, p3] {
                            args.extend(rel(*p, &mut current));
                        }
                        cs.push(&args, Operator::RRCurveTo);
                    }
                    Segment::Quad(..) => {
                        for quad in segment.quads() {
                            let cubic = quad.raise();
                            let mut args = Vec::with_capacity(6);
                            for p in [cubic.p1, cubic.p2, cubic.p3] {
                                args.extend(rel(p, &mut current));
                            }
                            cs.push(&args, Operator::RRCurveTo);
                        }
                    }
                }
            }
        }
        if flavor == Flavor::Cff {
            cs.push(&[], Operator::EndChar);
        }
        cs
    }

    /// Split into (operands, operator) commands; calls have no operands.
    pub fn commands(&self) -> Vec<(Vec<Number>, Token)> {
        let mut commands = Vec::new();
        let mut operands = Vec::new();
        for token in self.0.iter() {
            match token {
                Token::Number(n) => operands.push(*n),
                op => commands.push((std::mem::take(&mut operands), *op)),
            }
        }
        commands
    }

    /// Binary form, with call indices biased per the subroutine table sizes.
    pub fn encode(&self, num_global: usize, num_local: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for token in self.0.iter() {
            match token {
                Token::Number(n) => n.encode(&mut out),
                Token::Operator(op) => out.push(op.code()),
                Token::Call(subr) => {
                    let (count, op) = if subr.global {
                        (num_global, Operator::CallGSubr)
                    } else {
                        (num_local, Operator::CallSubr)
                    };
                    Number::Int(subr.index as i32 - bias(count) as i32).encode(&mut out);
                    out.push(op.code());
                }
            }
        }
        out
    }

    pub fn encoded_size(&self, num_global: usize, num_local: usize) -> usize {
        self.encode(num_global, num_local).len()
    }
}

/// Absolute drawing commands, what a charstring means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CurveTo(Point, Point, Point),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ExecError {
    StackOverflow(usize),
    StackUnderflow(Operator),
    BadArgumentCount(Operator, usize),
    NoSuchSubroutine(SubrRef),
    NestingTooDeep,
    /// Operators the flavor doesn't have, e.g. return in CFF2
    Unsupported(Operator),
    OperandsLeftOver(usize),
    /// vsindex picked item variation data we have no scalars for
    NoVariationData(usize),
}

impl Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::StackOverflow(limit) => write!(f, "more than {limit} operands"),
            ExecError::StackUnderflow(op) => write!(f, "{op:?} wants operands"),
            ExecError::BadArgumentCount(op, n) => write!(f, "{op:?} can't take {n} operands"),
            ExecError::NoSuchSubroutine(subr) => write!(f, "no subroutine {subr:?}"),
            ExecError::NestingTooDeep => {
                write!(f, "subroutines nest deeper than {NESTING_LIMIT}")
            }
            ExecError::Unsupported(op) => write!(f, "{op:?} isn't allowed here"),
            ExecError::OperandsLeftOver(n) => write!(f, "{n} operands with no operator"),
            ExecError::NoVariationData(idx) => write!(f, "vsindex {idx} has no variation data"),
        }
    }
}

struct Interpreter<'a> {
    flavor: Flavor,
    global_subrs: &'a [CharString],
    local_subrs: &'a [CharString],
    /// Per item variation data, how much each of its regions applies
    scalars: &'a [Vec<f64>],
    vsindex: usize,
    stack: Vec<f64>,
    current: Point,
    path: Vec<PathCommand>,
    done: bool,
}

impl Interpreter<'_> {
    fn rel(&mut self, dx: f64, dy: f64) -> Point {
        self.current = Point::new(self.current.x + dx, self.current.y + dy);
        self.current
    }

    fn line(&mut self, dx: f64, dy: f64) {
        let p = self.rel(dx, dy);
        self.path.push(PathCommand::LineTo(p));
    }

    fn curve(&mut self, [dxa, dya, dxb, dyb, dxc, dyc]: [f64; 6]) {
        let a = self.rel(dxa, dya);
        let b = self.rel(dxb, dyb);
        let c = self.rel(dxc, dyc);
        self.path.push(PathCommand::CurveTo(a, b, c));
    }

    /// hvcurveto and vhcurveto, curves alternating between starting horizontal and vertical
    fn alternating_curves(
        &mut self,
        args: &[f64],
        mut horizontal: bool,
        op: Operator,
    ) -> Result<(), ExecError> {
        if args.len() < 4 || !(args.len() % 4 == 0 || args.len() % 4 == 1) {
            return Err(ExecError::BadArgumentCount(op, args.len()));
        }
        let mut i = 0;
        while i + 4 <= args.len() {
            // an odd operand at the very end belongs to the last curve
            let extra = if i + 5 == args.len() { args[i + 4] } else { 0.0 };
            let [a, b, c, d] = [args[i], args[i + 1], args[i + 2], args[i + 3]];
            let curve = if horizontal {
                [a, 0.0, b, c, extra, d]
            } else {
                [0.0, a, b, c, d, extra]
            };
            self.curve(curve);
            horizontal = !horizontal;
            i += 4;
        }
        Ok(())
    }

    /// Collapses n defaults, their deltas and n into n values.
    fn blend(&mut self) -> Result<(), ExecError> {
        let op = Operator::Blend;
        if self.flavor != Flavor::Cff2 {
            return Err(ExecError::Unsupported(op));
        }
        let scalars = self
            .scalars
            .get(self.vsindex)
            .ok_or(ExecError::NoVariationData(self.vsindex))?;
        let Some(count) = self.stack.pop() else {
            return Err(ExecError::StackUnderflow(op));
        };
        if count < 0.0 || count.fract() != 0.0 {
            return Err(ExecError::BadArgumentCount(op, self.stack.len() + 1));
        }
        let n = count as usize;
        let needed = n * (scalars.len() + 1);
        if self.stack.len() < needed {
            return Err(ExecError::StackUnderflow(op));
        }
        let values = self.stack.split_off(self.stack.len() - needed);
        let (defaults, deltas) = values.split_at(n);
        for (i, default) in defaults.iter().enumerate() {
            let region_deltas = &deltas[i * scalars.len()..(i + 1) * scalars.len()];
            let value = region_deltas
                .iter()
                .zip(scalars)
                .fold(*default, |value, (delta, scalar)| value + delta * scalar);
            self.stack.push(value);
        }
        Ok(())
    }

    fn run(&mut self, charstring: &CharString, depth: usize) -> Result<(), ExecError> {
        if depth > NESTING_LIMIT {
            return Err(ExecError::NestingTooDeep);
        }
        let max_stack = self.flavor.max_stack();
        for token in charstring.tokens() {
            if self.done {
                break;
            }
            let op = match token {
                Token::Number(n) => {
                    self.stack.push(n.to_f64());
                    if self.stack.len() > max_stack {
                        return Err(ExecError::StackOverflow(max_stack));
                    }
                    continue;
                }
                Token::Call(subr) => {
                    // the encoded subroutine number sits on the stack until the call
                    if self.stack.len() + 1 > max_stack {
                        return Err(ExecError::StackOverflow(max_stack));
                    }
                    let table = if subr.global {
                        self.global_subrs
                    } else {
                        self.local_subrs
                    };
                    let body = table
                        .get(subr.index)
                        .ok_or(ExecError::NoSuchSubroutine(*subr))?;
                    self.run(body, depth + 1)?;
                    continue;
                }
                Token::Operator(op) => *op,
            };
            let args = std::mem::take(&mut self.stack);
            let n = args.len();
            let bad = || ExecError::BadArgumentCount(op, n);
            match op {
                Operator::RMoveTo | Operator::HMoveTo | Operator::VMoveTo => {
                    let (dx, dy) = match (op, args.as_slice()) {
                        (Operator::RMoveTo, [dx, dy]) => (*dx, *dy),
                        (Operator::HMoveTo, [dx]) => (*dx, 0.0),
                        (Operator::VMoveTo, [dy]) => (0.0, *dy),
                        _ => return Err(bad()),
                    };
                    let p = self.rel(dx, dy);
                    self.path.push(PathCommand::MoveTo(p));
                }
                Operator::RLineTo => {
                    if n == 0 || n % 2 != 0 {
                        return Err(bad());
                    }
                    for pair in args.chunks(2) {
                        self.line(pair[0], pair[1]);
                    }
                }
                Operator::HLineTo | Operator::VLineTo => {
                    if n == 0 {
                        return Err(bad());
                    }
                    let mut horizontal = op == Operator::HLineTo;
                    for d in args {
                        if horizontal {
                            self.line(d, 0.0);
                        } else {
                            self.line(0.0, d);
                        }
                        horizontal = !horizontal;
                    }
                }
                Operator::RRCurveTo => {
                    if n == 0 || n % 6 != 0 {
                        return Err(bad());
                    }
                    for c in args.chunks(6) {
                        self.curve([c[0], c[1], c[2], c[3], c[4], c[5]]);
                    }
                }
                Operator::HHCurveTo | Operator::VVCurveTo => {
                    if n < 4 || n % 4 > 1 {
                        return Err(bad());
                    }
                    let (mut first, rest) = if n % 4 == 1 {
                        (args[0], &args[1..])
                    } else {
                        (0.0, &args[..])
                    };
                    for c in rest.chunks(4) {
                        let curve = if op == Operator::HHCurveTo {
                            [c[0], first, c[1], c[2], c[3], 0.0]
                        } else {
                            [first, c[0], c[1], c[2], 0.0, c[3]]
                        };
                        self.curve(curve);
                        first = 0.0;
                    }
                }
                Operator::HVCurveTo | Operator::VHCurveTo => {
                    self.alternating_curves(&args, op == Operator::HVCurveTo, op)?
                }
                Operator::RCurveLine => {
                    if n < 8 || (n - 2) % 6 != 0 {
                        return Err(bad());
                    }
                    for c in args[..n - 2].chunks(6) {
                        self.curve([c[0], c[1], c[2], c[3], c[4], c[5]]);
                    }
                    self.line(args[n - 2], args[n - 1]);
                }
                Operator::RLineCurve => {
                    if n < 8 || (n - 6) % 2 != 0 {
                        return Err(bad());
                    }
                    for pair in args[..n - 6].chunks(2) {
                        self.line(pair[0], pair[1]);
                    }
                    let c = &args[n - 6..];
                    self.curve([c[0], c[1], c[2], c[3], c[4], c[5]]);
                }
                Operator::Return => {
                    if self.flavor == Flavor::Cff2 || depth == 0 {
                        return Err(ExecError::Unsupported(op));
                    }
                    self.stack = args;
                    return Ok(());
                }
                Operator::EndChar => {
                    if self.flavor == Flavor::Cff2 {
                        return Err(ExecError::Unsupported(op));
                    }
                    self.done = true;
                }
                Operator::Blend => {
                    self.stack = args;
                    self.blend()?;
                }
                Operator::VsIndex => {
                    if self.flavor != Flavor::Cff2 {
                        return Err(ExecError::Unsupported(op));
                    }
                    match args.as_slice() {
                        [idx] if *idx >= 0.0 && idx.fract() == 0.0 => self.vsindex = *idx as usize,
                        _ => return Err(bad()),
                    }
                }
                // raw calls never appear, calls are Token::Call
                Operator::CallSubr | Operator::CallGSubr => {
                    return Err(ExecError::Unsupported(op));
                }
            }
        }
        Ok(())
    }
}

/// Run a charstring and report the path it draws.
pub fn execute(
    charstring: &CharString,
    global_subrs: &[CharString],
    local_subrs: &[CharString],
    flavor: Flavor,
) -> Result<Vec<PathCommand>, ExecError> {
    execute_blended(charstring, global_subrs, local_subrs, flavor, &[])
}

/// Run a CFF2 charstring somewhere in variation space.
///
/// `scalars` has, per item variation data, how much each of its regions applies
/// there; all zeros draws the default.
pub fn execute_blended(
    charstring: &CharString,
    global_subrs: &[CharString],
    local_subrs: &[CharString],
    flavor: Flavor,
    scalars: &[Vec<f64>],
) -> Result<Vec<PathCommand>, ExecError> {
    let mut interpreter = Interpreter {
        flavor,
        global_subrs,
        local_subrs,
        scalars,
        vsindex: 0,
        stack: Vec::new(),
        current: Point::ZERO,
        path: Vec::new(),
        done: false,
    };
    interpreter.run(charstring, 0)?;
    if !interpreter.stack.is_empty() {
        return Err(ExecError::OperandsLeftOver(interpreter.stack.len()));
    }
    Ok(interpreter.path)
}

#[cfg(test)]
mod tests {
    use kiln_ir::ir::{Contour, ContourPoint};
    use kurbo::Point;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::cff::Flavor;

    use super::*;

    fn cubic_contour() -> Contour {
        Contour::new(vec![
            ContourPoint::on(10.0, 10.0),
            ContourPoint::on(10.0, 110.0),
            ContourPoint::cubic(40.0, 140.0),
            ContourPoint::cubic(80.0, 140.0),
            ContourPoint::on(110.0, 110.0),
            ContourPoint::on(110.2, 10.0),
        ])
    }

    #[rstest]
    #[case(0, vec![139])]
    #[case(107, vec![246])]
    #[case(-107, vec![32])]
    #[case(108, vec![247, 0])]
    #[case(1131, vec![250, 255])]
    #[case(-108, vec![251, 0])]
    #[case(-1131, vec![254, 255])]
    #[case(1132, vec![28, 0x04, 0x6c])]
    fn int_encoding(#[case] value: i32, #[case] expected: Vec<u8>) {
        let mut out = Vec::new();
        Number::Int(value).encode(&mut out);
        assert_eq!(expected.len(), Number::Int(value).encoded_size());
        assert_eq!(expected, out);
    }

    #[test]
    fn fixed_encoding() {
        let mut out = Vec::new();
        Number::from_f64(0.5).encode(&mut out);
        assert_eq!(vec![255, 0, 0, 0x80, 0], out);
    }

    #[rstest]
    #[case(10, 107)]
    #[case(1239, 107)]
    #[case(1240, 1131)]
    #[case(33900, 32768)]
    fn biases(#[case] count: usize, #[case] expected: usize) {
        assert_eq!(expected, bias(count));
    }

    #[test]
    fn generic_program() {
        let cs = CharString::from_contours(&[cubic_contour()], 0.5, Flavor::Cff);
        let ops: Vec<_> = cs
            .commands()
            .into_iter()
            .map(|(args, op)| (args.iter().map(|n| n.to_f64()).collect::<Vec<_>>(), op))
            .collect();
        assert_eq!(
            vec![
                (vec![10.0, 10.0], Token::Operator(Operator::RMoveTo)),
                (vec![0.0, 100.0], Token::Operator(Operator::RLineTo)),
                (
                    vec![30.0, 30.0, 40.0, 0.0, 30.0, -30.0],
                    Token::Operator(Operator::RRCurveTo)
                ),
                (vec![0.0, -100.0], Token::Operator(Operator::RLineTo)),
                (vec![], Token::Operator(Operator::EndChar)),
            ],
            ops
        );
    }

    #[test]
    fn no_rounding_keeps_fractions() {
        let cs = CharString::from_contours(&[cubic_contour()], 0.0, Flavor::Cff2);
        assert!(cs.tokens().contains(&Token::Number(Number::from_f64(0.2))));
        assert!(!cs.tokens().contains(&Token::Operator(Operator::EndChar)));
    }

    #[test]
    fn executes_generic_program() {
        let cs = CharString::from_contours(&[cubic_contour()], 0.5, Flavor::Cff);
        let path = execute(&cs, &[], &[], Flavor::Cff).unwrap();
        assert_eq!(
            vec![
                PathCommand::MoveTo(Point::new(10.0, 10.0)),
                PathCommand::LineTo(Point::new(10.0, 110.0)),
                PathCommand::CurveTo(
                    Point::new(40.0, 140.0),
                    Point::new(80.0, 140.0),
                    Point::new(110.0, 110.0)
                ),
                PathCommand::LineTo(Point::new(110.0, 10.0)),
            ],
            path
        );
    }

    #[test]
    fn executes_alternating_curves() {
        let mut cs = CharString::default();
        let args: Vec<Number> = [10, 20, 30, 40, 50, 60, 70, 80, 5]
            .into_iter()
            .map(Number::Int)
            .collect();
        cs.push(&args, Operator::HVCurveTo);
        let path = execute(&cs, &[], &[], Flavor::Cff2).unwrap();
        assert_eq!(
            vec![
                PathCommand::CurveTo(
                    Point::new(10.0, 0.0),
                    Point::new(30.0, 30.0),
                    Point::new(30.0, 70.0)
                ),
                PathCommand::CurveTo(
                    Point::new(30.0, 120.0),
                    Point::new(90.0, 190.0),
                    Point::new(170.0, 195.0)
                ),
            ],
            path
        );
    }

    #[test]
    fn calls_subroutines() {
        let mut subr = CharString::default();
        subr.push(&[Number::Int(0), Number::Int(50)], Operator::RLineTo);
        subr.push(&[], Operator::Return);
        let mut cs = CharString::default();
        cs.push(&[Number::Int(5), Number::Int(5)], Operator::RMoveTo);
        cs.0.push(Token::Call(SubrRef {
            global: true,
            index: 0,
        }));
        cs.push(&[], Operator::EndChar);
        let path = execute(&cs, &[subr], &[], Flavor::Cff).unwrap();
        assert_eq!(PathCommand::LineTo(Point::new(5.0, 55.0)), path[1]);
    }

    #[test]
    fn call_encoding_is_biased() {
        let cs = CharString(vec![Token::Call(SubrRef {
            global: false,
            index: 0,
        })]);
        // 0 - 107 encodes in one byte
        assert_eq!(vec![32, 10], cs.encode(0, 3));
    }

    #[test]
    fn runaway_recursion() {
        let looping = CharString(vec![Token::Call(SubrRef {
            global: true,
            index: 0,
        })]);
        assert_eq!(
            Err(ExecError::NestingTooDeep),
            execute(&looping, &[looping.clone()], &[], Flavor::Cff2)
        );
    }

    #[test]
    fn stack_limit() {
        let mut cs = CharString::default();
        let args = vec![Number::Int(1); 50];
        cs.push(&args, Operator::RLineTo);
        assert_eq!(
            Err(ExecError::StackOverflow(48)),
            execute(&cs, &[], &[], Flavor::Cff)
        );
        assert!(execute(&cs, &[], &[], Flavor::Cff2).is_ok());
    }

    #[test]
    fn call_operand_counts_against_the_stack() {
        let mut subr = CharString::default();
        subr.push(&[], Operator::RLineTo);
        subr.push(&[], Operator::Return);
        let at_limit = |n: usize| {
            let mut cs = CharString(vec![Token::Number(Number::Int(1)); n]);
            cs.0.push(Token::Call(SubrRef {
                global: true,
                index: 0,
            }));
            cs
        };
        assert_eq!(
            Err(ExecError::StackOverflow(48)),
            execute(&at_limit(48), &[subr.clone()], &[], Flavor::Cff)
        );
        assert!(execute(&at_limit(46), &[subr], &[], Flavor::Cff).is_ok());
    }

    fn blended_line() -> CharString {
        // a line of (10, 20) at the default, with deltas for two regions
        let mut cs = CharString::default();
        cs.push(&[Number::Int(0), Number::Int(0)], Operator::RMoveTo);
        let operands: Vec<Number> = [10, 20, 5, -5, 0, 8, 2]
            .into_iter()
            .map(Number::Int)
            .collect();
        cs.push(&operands, Operator::Blend);
        cs.push(&[], Operator::RLineTo);
        cs
    }

    #[rstest]
    #[case(vec![0.0, 0.0], Point::new(10.0, 20.0))]
    #[case(vec![1.0, 0.0], Point::new(15.0, 20.0))]
    #[case(vec![0.5, 1.0], Point::new(7.5, 28.0))]
    fn blend_applies_scalars(#[case] scalars: Vec<f64>, #[case] expected: Point) {
        let path = execute_blended(&blended_line(), &[], &[], Flavor::Cff2, &[scalars]).unwrap();
        assert_eq!(PathCommand::LineTo(expected), path[1]);
    }

    #[test]
    fn blend_needs_variation_data() {
        assert_eq!(
            Err(ExecError::NoVariationData(0)),
            execute(&blended_line(), &[], &[], Flavor::Cff2)
        );
        let mut cs = CharString::default();
        cs.push(&[Number::Int(1)], Operator::VsIndex);
        cs.0.extend(blended_line().0);
        assert_eq!(
            Err(ExecError::NoVariationData(1)),
            execute_blended(&cs, &[], &[], Flavor::Cff2, &[vec![0.0, 0.0]])
        );
    }

    #[test]
    fn blend_is_cff2_only() {
        assert_eq!(
            Err(ExecError::Unsupported(Operator::Blend)),
            execute_blended(&blended_line(), &[], &[], Flavor::Cff, &[vec![0.0, 0.0]])
        );
    }
}
