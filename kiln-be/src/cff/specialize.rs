//! Rewrite generic charstrings with the specialized operators.
//!
//! Loosely follows fontTools' specializer: pick the shortest operator for each
//! command, then merge neighbours as long as the operand stack allows.

use log::trace;

use super::{
    charstring::{CharString, Number, Operator, Token},
    Flavor,
};

#[derive(Debug, Clone, PartialEq)]
struct Command {
    op: Operator,
    args: Vec<Number>,
}

impl Command {
    fn new(op: Operator, args: Vec<Number>) -> Command {
        Command { op, args }
    }
}

fn specialize_command(op: Operator, args: Vec<Number>) -> Command {
    let zero = |i: usize| args[i].is_zero();
    match (op, args.len()) {
        (Operator::RMoveTo, 2) if zero(0) => Command::new(Operator::VMoveTo, vec![args[1]]),
        (Operator::RMoveTo, 2) if zero(1) => Command::new(Operator::HMoveTo, vec![args[0]]),
        (Operator::RLineTo, 2) if zero(1) => Command::new(Operator::HLineTo, vec![args[0]]),
        (Operator::RLineTo, 2) if zero(0) => Command::new(Operator::VLineTo, vec![args[1]]),
        (Operator::RRCurveTo, 6) => {
            let [dxa, dya, dxb, dyb, dxc, dyc] =
                [args[0], args[1], args[2], args[3], args[4], args[5]];
            let (op, args) = if zero(0) && zero(4) {
                (Operator::VVCurveTo, vec![dya, dxb, dyb, dyc])
            } else if zero(1) && zero(5) {
                (Operator::HHCurveTo, vec![dxa, dxb, dyb, dxc])
            } else if zero(1) && zero(4) {
                (Operator::HVCurveTo, vec![dxa, dxb, dyb, dyc])
            } else if zero(0) && zero(5) {
                (Operator::VHCurveTo, vec![dya, dxb, dyb, dxc])
            } else if zero(4) {
                (Operator::VVCurveTo, vec![dxa, dya, dxb, dyb, dyc])
            } else if zero(5) {
                (Operator::HHCurveTo, vec![dya, dxa, dxb, dyb, dxc])
            } else if zero(1) {
                (Operator::HVCurveTo, vec![dxa, dxb, dyb, dyc, dxc])
            } else if zero(0) {
                (Operator::VHCurveTo, vec![dya, dxb, dyb, dxc, dyc])
            } else {
                (Operator::RRCurveTo, args.clone())
            };
            Command::new(op, args)
        }
        _ => Command::new(op, args),
    }
}

fn is_line(op: Operator) -> bool {
    matches!(op, Operator::HLineTo | Operator::VLineTo)
}

fn is_hv_curve(op: Operator) -> bool {
    matches!(op, Operator::HVCurveTo | Operator::VHCurveTo)
}

/// The merged command, if `next` can join `prev`.
fn merge(prev: &Command, next: &Command, max_stack: usize) -> Option<Command> {
    // operands left on the stack by blend aren't counted in args
    if prev.args.is_empty() || next.args.is_empty() {
        return None;
    }
    if prev.args.len() + next.args.len() > max_stack {
        return None;
    }
    let joined = || prev.args.iter().chain(next.args.iter()).copied().collect::<Vec<_>>();
    let op = match (prev.op, next.op) {
        (Operator::RLineTo, Operator::RLineTo) | (Operator::RRCurveTo, Operator::RRCurveTo) => {
            prev.op
        }
        // only the first curve of a run may have the odd leading operand
        (Operator::HHCurveTo, Operator::HHCurveTo) | (Operator::VVCurveTo, Operator::VVCurveTo)
            if next.args.len() == 4 =>
        {
            prev.op
        }
        (a, b) if is_line(a) && is_line(b) && next.args.len() == 1 => {
            let next_horizontal = (a == Operator::HLineTo) == (prev.args.len() % 2 == 0);
            if next_horizontal != (b == Operator::HLineTo) {
                return None;
            }
            a
        }
        // only the last curve of a run may have the odd trailing operand
        (a, b) if is_hv_curve(a) && is_hv_curve(b) && prev.args.len() % 4 == 0 => {
            let curves = prev.args.len() / 4;
            let next_horizontal = (a == Operator::HVCurveTo) == (curves % 2 == 0);
            if next_horizontal != (b == Operator::HVCurveTo) {
                return None;
            }
            a
        }
        (Operator::RRCurveTo, Operator::RLineTo) if next.args.len() == 2 => Operator::RCurveLine,
        (Operator::RLineTo, Operator::RRCurveTo) if next.args.len() == 6 => Operator::RLineCurve,
        _ => return None,
    };
    Some(Command::new(op, joined()))
}

/// Specialize a generic charstring; calls, if any, are left alone.
pub fn specialize(charstring: &CharString, flavor: Flavor) -> CharString {
    let max_stack = flavor.max_stack();
    let mut commands: Vec<Command> = Vec::new();
    let mut out = CharString::default();
    let flush = |commands: &mut Vec<Command>, out: &mut CharString| {
        for command in commands.drain(..) {
            out.push(&command.args, command.op);
        }
    };

    for (args, token) in charstring.commands() {
        let Token::Operator(op) = token else {
            flush(&mut commands, &mut out);
            out.0.extend(args.into_iter().map(Token::Number));
            out.0.push(token);
            continue;
        };
        let command = specialize_command(op, args);
        if let Some(merged) = commands.last().and_then(|prev| merge(prev, &command, max_stack)) {
            if let Some(last) = commands.last_mut() {
                *last = merged;
            }
        } else {
            commands.push(command);
        }
    }
    flush(&mut commands, &mut out);
    trace!(
        "Specialized {} tokens to {}",
        charstring.tokens().len(),
        out.tokens().len()
    );
    out
}
