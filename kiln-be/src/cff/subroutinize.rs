//! Shrink charstrings by moving repeated token sequences into subroutines.
//!
//! Each round finds candidate patterns across the whole corpus in parallel,
//! picks a set of them on a single thread, then substitutes calls in parallel.
//! Later rounds see the bodies of earlier subroutines as part of the corpus, so
//! subroutines can end up calling subroutines.

use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
    fmt::Debug,
};

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    charstring::{CharString, Operator, SubrRef, Token, NESTING_LIMIT},
    Flavor,
};

/// Longest pattern considered, in operators.
const MAX_PATTERN_UNITS: usize = 16;

/// Estimated bytes for a call: index operand plus operator.
const CALL_COST: usize = 3;

/// Estimated bytes for a subroutine's entry in the INDEX offset array.
const INDEX_COST: usize = 2;

pub const COMPREFFOR: &str = "compreffor";
pub const CFFSUBR: &str = "cffsubr";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Subroutine {
    pub body: CharString,
    pub uses: usize,
}

/// Charstrings plus the subroutines they call.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Subroutinized {
    pub charstrings: Vec<CharString>,
    pub global_subrs: Vec<Subroutine>,
    pub local_subrs: Vec<Subroutine>,
}

impl Subroutinized {
    /// Charstrings that call nothing.
    pub fn plain(charstrings: Vec<CharString>) -> Subroutinized {
        Subroutinized {
            charstrings,
            ..Default::default()
        }
    }

    pub fn global_bodies(&self) -> Vec<CharString> {
        self.global_subrs.iter().map(|s| s.body.clone()).collect()
    }

    pub fn local_bodies(&self) -> Vec<CharString> {
        self.local_subrs.iter().map(|s| s.body.clone()).collect()
    }

    /// Encoded bytes of every charstring and subroutine.
    pub fn total_size(&self) -> usize {
        let (g, l) = (self.global_subrs.len(), self.local_subrs.len());
        self.charstrings
            .iter()
            .chain(self.global_subrs.iter().map(|s| &s.body))
            .chain(self.local_subrs.iter().map(|s| &s.body))
            .map(|cs| cs.encoded_size(g, l))
            .sum()
    }
}

/// A way to pick subroutines.
pub trait Subroutinizer: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, flavor: Flavor) -> bool;

    fn subroutinize(&self, charstrings: Vec<CharString>, flavor: Flavor) -> Subroutinized;
}

/// Greedy by estimated savings, CFF only.
#[derive(Debug, Default)]
pub struct Compreffor;

impl Subroutinizer for Compreffor {
    fn name(&self) -> &'static str {
        COMPREFFOR
    }

    fn supports(&self, flavor: Flavor) -> bool {
        flavor == Flavor::Cff
    }

    fn subroutinize(&self, charstrings: Vec<CharString>, flavor: Flavor) -> Subroutinized {
        Engine::new(flavor, Strategy::BySavings).run(charstrings)
    }
}

/// Longest pattern first, CFF and CFF2.
#[derive(Debug, Default)]
pub struct Cffsubr;

impl Subroutinizer for Cffsubr {
    fn name(&self) -> &'static str {
        CFFSUBR
    }

    fn supports(&self, _: Flavor) -> bool {
        true
    }

    fn subroutinize(&self, charstrings: Vec<CharString>, flavor: Flavor) -> Subroutinized {
        Engine::new(flavor, Strategy::LongestFirst).run(charstrings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Strategy {
    BySavings,
    LongestFirst,
}

fn token_cost(token: &Token) -> usize {
    match token {
        Token::Number(n) => n.encoded_size(),
        Token::Operator(..) => 1,
        Token::Call(..) => CALL_COST,
    }
}

/// [start, end) of each operator-terminated run of tokens, plus whether it
/// may be part of a subroutine.
fn units(tokens: &[Token]) -> Vec<(usize, usize, bool)> {
    let mut units = Vec::new();
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_operator() {
            let eligible = !matches!(
                token,
                Token::Operator(Operator::EndChar | Operator::Return | Operator::VsIndex)
            );
            units.push((start, i + 1, eligible));
            start = i + 1;
        }
    }
    units
}

#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    count: usize,
    owners: usize,
}

#[derive(Debug, Clone)]
struct Engine {
    flavor: Flavor,
    strategy: Strategy,
    /// Corpus: charstrings first
    charstrings: Vec<Vec<Token>>,
    /// Subroutines by id, None once inlined away; calls are Call(SubrRef { index: id, .. })
    subrs: Vec<Option<Vec<Token>>>,
}

impl Engine {
    fn new(flavor: Flavor, strategy: Strategy) -> Engine {
        Engine {
            flavor,
            strategy,
            charstrings: Vec::new(),
            subrs: Vec::new(),
        }
    }

    fn return_cost(&self) -> usize {
        match self.flavor {
            Flavor::Cff => 1,
            Flavor::Cff2 => 0,
        }
    }

    fn savings(&self, size: usize, count: usize) -> isize {
        let overhead = size + self.return_cost() + INDEX_COST;
        (count * size.saturating_sub(CALL_COST)) as isize - overhead as isize
    }

    fn corpus(&self) -> Vec<&Vec<Token>> {
        self.charstrings
            .iter()
            .chain(self.subrs.iter().flatten())
            .collect()
    }

    /// Count every unit-aligned pattern in the corpus, in parallel.
    fn discover(&self) -> HashMap<Vec<Token>, Stats> {
        self.corpus()
            .par_iter()
            .map(|tokens| {
                let units = units(tokens);
                let mut seen: HashMap<Vec<Token>, Stats> = HashMap::new();
                for start in 0..units.len() {
                    for len in 1..=MAX_PATTERN_UNITS.min(units.len() - start) {
                        let run = &units[start..start + len];
                        if !run.iter().all(|(_, _, eligible)| *eligible) {
                            break;
                        }
                        let pattern = &tokens[run[0].0..run[len - 1].1];
                        if pattern.len() < 2 {
                            continue;
                        }
                        let stats = seen.entry(pattern.to_vec()).or_default();
                        stats.count += 1;
                        stats.owners = 1;
                    }
                }
                seen
            })
            .reduce(HashMap::new, |mut a, b| {
                for (pattern, stats) in b {
                    let merged = a.entry(pattern).or_default();
                    merged.count += stats.count;
                    merged.owners += stats.owners;
                }
                a
            })
    }

    /// Pick the patterns to turn into subroutines.
    fn select(&self, candidates: HashMap<Vec<Token>, Stats>) -> Vec<Vec<Token>> {
        let mut candidates: Vec<(Vec<Token>, usize, usize, isize)> = candidates
            .into_iter()
            .filter(|(_, stats)| stats.count >= 2)
            .map(|(pattern, stats)| {
                let size = pattern.iter().map(token_cost).sum();
                let savings = self.savings(size, stats.count);
                (pattern, stats.count, size, savings)
            })
            .filter(|(.., savings)| *savings > 0)
            .collect();
        match self.strategy {
            Strategy::BySavings => candidates.sort_by(|a, b| {
                (Reverse(a.3), Reverse(a.2), &a.0).cmp(&(Reverse(b.3), Reverse(b.2), &b.0))
            }),
            Strategy::LongestFirst => candidates.sort_by(|a, b| {
                (Reverse(a.0.len()), Reverse(a.3), &a.0)
                    .cmp(&(Reverse(b.0.len()), Reverse(b.3), &b.0))
            }),
        }

        let mut selected: Vec<(Vec<Token>, usize)> = Vec::new();
        for (pattern, count, size, _) in candidates {
            // occurrences inside patterns already chosen are gone
            let consumed: usize = selected
                .iter()
                .map(|(chosen, uses)| occurrences(&pattern, chosen) * uses)
                .sum();
            let remaining = count.saturating_sub(consumed);
            if remaining >= 2 && self.savings(size, remaining) > 0 {
                selected.push((pattern, remaining));
            }
        }
        trace!("Selected {} patterns", selected.len());
        selected.into_iter().map(|(pattern, _)| pattern).collect()
    }

    fn run(mut self, charstrings: Vec<CharString>) -> Subroutinized {
        self.charstrings = charstrings.into_iter().map(|cs| cs.0).collect();

        for round in 0..NESTING_LIMIT {
            let selected = self.select(self.discover());
            if selected.is_empty() {
                break;
            }
            let before = self.clone();
            let first_id = self.subrs.len();
            let ids: HashMap<Vec<Token>, usize> = selected
                .iter()
                .enumerate()
                .map(|(i, pattern)| (pattern.clone(), first_id + i))
                .collect();

            let substitute_all = |corpus: &mut Vec<Vec<Token>>| {
                corpus
                    .par_iter_mut()
                    .for_each(|tokens| *tokens = substitute(tokens, &ids));
            };
            substitute_all(&mut self.charstrings);
            let mut bodies: Vec<Vec<Token>> = self.subrs.iter().flatten().cloned().collect();
            substitute_all(&mut bodies);
            let mut bodies = bodies.into_iter();
            for subr in self.subrs.iter_mut().flatten() {
                if let Some(body) = bodies.next() {
                    *subr = body;
                }
            }
            self.subrs.extend(selected.into_iter().map(Some));
            self.prune();

            if self.max_depth() > NESTING_LIMIT {
                debug!("Round {round} nests too deep, keeping the previous round");
                self = before;
                break;
            }
            trace!(
                "Round {round}: {} subroutines",
                self.subrs.iter().flatten().count()
            );
        }
        self.finish()
    }

    fn uses(&self) -> Vec<usize> {
        let mut uses = vec![0; self.subrs.len()];
        for token in self.corpus().into_iter().flatten() {
            if let Token::Call(subr) = token {
                uses[subr.index] += 1;
            }
        }
        uses
    }

    /// Inline subroutines that don't pay for themselves.
    fn prune(&mut self) {
        loop {
            let uses = self.uses();
            let Some(id) = self.subrs.iter().enumerate().find_map(|(id, body)| {
                let body = body.as_ref()?;
                let size = body.iter().map(token_cost).sum();
                (uses[id] < 2 || self.savings(size, uses[id]) <= 0).then_some(id)
            }) else {
                return;
            };
            let Some(body) = self.subrs[id].take() else {
                return;
            };
            let inline = |tokens: &mut Vec<Token>| {
                if !tokens.contains(&Token::Call(SubrRef { global: true, index: id })) {
                    return;
                }
                *tokens = tokens
                    .iter()
                    .flat_map(|t| match t {
                        Token::Call(subr) if subr.index == id => body.clone(),
                        other => vec![*other],
                    })
                    .collect();
            };
            self.charstrings.iter_mut().for_each(&inline);
            self.subrs.iter_mut().flatten().for_each(&inline);
        }
    }

    fn depth(&self, id: usize, memo: &mut HashMap<usize, usize>) -> usize {
        if let Some(depth) = memo.get(&id) {
            return *depth;
        }
        let depth = 1 + self.subrs[id]
            .iter()
            .flatten()
            .filter_map(|t| match t {
                Token::Call(subr) => Some(self.depth(subr.index, memo)),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        memo.insert(id, depth);
        depth
    }

    fn max_depth(&self) -> usize {
        let mut memo = HashMap::new();
        (0..self.subrs.len())
            .filter(|id| self.subrs[*id].is_some())
            .map(|id| self.depth(id, &mut memo))
            .max()
            .unwrap_or(0)
    }

    /// Split into global and local tables, number by use, and renumber calls.
    fn finish(self) -> Subroutinized {
        let uses = self.uses();
        let mut callers: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        let mut called_by_subr: BTreeSet<usize> = BTreeSet::new();
        for (cs_idx, tokens) in self.charstrings.iter().enumerate() {
            for token in tokens {
                if let Token::Call(subr) = token {
                    callers.entry(subr.index).or_default().insert(cs_idx);
                }
            }
        }
        for token in self.subrs.iter().flatten().flatten() {
            if let Token::Call(subr) = token {
                called_by_subr.insert(subr.index);
            }
        }

        let live: Vec<usize> = (0..self.subrs.len())
            .filter(|id| self.subrs[*id].is_some())
            .collect();
        let is_local = |id: &usize| {
            !called_by_subr.contains(id) && callers.get(id).map(|c| c.len()) == Some(1)
        };
        let by_use = |mut ids: Vec<usize>| {
            ids.sort_by_key(|id| (Reverse(uses[*id]), *id));
            ids
        };
        let locals = by_use(live.iter().copied().filter(is_local).collect());
        let globals = by_use(live.iter().copied().filter(|id| !is_local(id)).collect());

        let mut refs: HashMap<usize, SubrRef> = HashMap::new();
        for (index, id) in globals.iter().enumerate() {
            refs.insert(*id, SubrRef { global: true, index });
        }
        for (index, id) in locals.iter().enumerate() {
            refs.insert(*id, SubrRef { global: false, index });
        }
        let renumber = |tokens: &[Token]| -> CharString {
            CharString(
                tokens
                    .iter()
                    .map(|t| match t {
                        Token::Call(subr) => {
                            Token::Call(refs.get(&subr.index).copied().unwrap_or(*subr))
                        }
                        other => *other,
                    })
                    .collect(),
            )
        };
        let subroutine = |id: &usize| {
            let mut body = renumber(self.subrs[*id].as_deref().unwrap_or_default());
            if self.flavor == Flavor::Cff {
                body.0.push(Token::Operator(Operator::Return));
            }
            Subroutine {
                body,
                uses: uses[*id],
            }
        };

        let result = Subroutinized {
            charstrings: self.charstrings.iter().map(|t| renumber(t)).collect(),
            global_subrs: globals.iter().map(subroutine).collect(),
            local_subrs: locals.iter().map(subroutine).collect(),
        };
        debug!(
            "{} global and {} local subroutines",
            result.global_subrs.len(),
            result.local_subrs.len()
        );
        result
    }
}

/// How many times `needle` appears in `haystack`.
fn occurrences(needle: &[Token], haystack: &[Token]) -> usize {
    if needle.len() > haystack.len() {
        return 0;
    }
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

/// Replace the longest known pattern at each unit, left to right.
fn substitute(tokens: &[Token], ids: &HashMap<Vec<Token>, usize>) -> Vec<Token> {
    let units = units(tokens);
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < units.len() {
        let max_len = MAX_PATTERN_UNITS.min(units.len() - i);
        let found = (1..=max_len).rev().find_map(|len| {
            let key = &tokens[units[i].0..units[i + len - 1].1];
            ids.get(key).map(|id| (len, *id))
        });
        match found {
            Some((len, id)) => {
                out.push(Token::Call(SubrRef {
                    global: true,
                    index: id,
                }));
                i += len;
            }
            None => {
                out.extend_from_slice(&tokens[units[i].0..units[i].1]);
                i += 1;
            }
        }
    }
    // trailing operands with no operator
    if let Some((_, end, _)) = units.last() {
        out.extend_from_slice(&tokens[*end..]);
    } else {
        out.extend_from_slice(tokens);
    }
    out
}
