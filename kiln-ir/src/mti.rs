//! Reads layout rules written in a tab separated, FontDame style, text format.
//!
//! ```text
//! % comments start with a percent sign
//! feature table begin
//! 0	liga	ligatures
//! 1	kern	kerning, 2
//! feature table end
//!
//! lookup	ligatures	ligature
//! f_i	f	i
//! lookup end
//!
//! lookup	kerning	pair
//! T	o	-40
//! lookup end
//!
//! lookup	marks	mark to base
//! mark	acutecomb	top	100	500
//! base	a	top	250	500
//! lookup end
//! ```
//!
//! Lookups are `single`, `ligature`, `pair`, `mark to base` or `mark to mark`.
//! Features reference lookups by name or by zero based index. Lookup flag lines
//! such as `RightToLeft	no` are accepted and ignored.

use std::path::Path;

use kiln_types::types::{GlyphName, Tag};
use log::debug;

use crate::{
    error::Error,
    layout::{LayoutRules, Ligature, LookupKind, MarkAttachment, MarkRecord, PairAdjustment},
    source::read_to_string,
};

const LOOKUP_FLAGS: &[&str] = &[
    "RightToLeft",
    "IgnoreBaseGlyphs",
    "IgnoreLigatures",
    "IgnoreMarks",
    "MarkAttachmentType",
];

pub fn load_mti(path: &Path) -> Result<LayoutRules, Error> {
    let raw = read_to_string(path)?;
    let rules = parse_mti(&raw)?;
    debug!(
        "{} has {} lookups in {} features",
        path.display(),
        rules.lookups.len(),
        rules.features.len()
    );
    Ok(rules)
}

fn err(line: usize, message: impl Into<String>) -> Error {
    Error::MtiParse {
        line,
        message: message.into(),
    }
}

enum Section {
    Top,
    // a table we have no use for, e.g. the script table
    Skip,
    Features,
    Lookup(PendingLookup),
}

struct PendingLookup {
    name: String,
    kind: LookupKind,
}

pub fn parse_mti(text: &str) -> Result<LayoutRules, Error> {
    let mut rules = LayoutRules::default();
    // (line, tag, lookup references)
    let mut features: Vec<(usize, Tag, Vec<String>)> = Vec::new();
    let mut section = Section::Top;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('%').next().unwrap_or_default().trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();

        section = match section {
            Section::Top => match fields.as_slice() {
                ["feature table begin"] => Section::Features,
                ["lookup", name, kind] => Section::Lookup(PendingLookup {
                    name: name.to_string(),
                    kind: empty_lookup(line_no, kind)?,
                }),
                [table] if table.ends_with("table begin") => Section::Skip,
                [header] if header.starts_with("FontDame") => Section::Top,
                _ => return Err(err(line_no, format!("unexpected '{line}'"))),
            },
            Section::Skip => match fields.as_slice() {
                [end] if end.ends_with("table end") => Section::Top,
                _ => Section::Skip,
            },
            Section::Features => match fields.as_slice() {
                ["feature table end"] => Section::Top,
                [_, tag, lookups] => {
                    let tag = Tag::new_checked(tag.as_bytes())
                        .map_err(|e| err(line_no, format!("bad feature tag '{tag}': {e}")))?;
                    let lookups = lookups
                        .split(',')
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty())
                        .collect();
                    features.push((line_no, tag, lookups));
                    Section::Features
                }
                _ => return Err(err(line_no, "feature rows are index, tag, lookups")),
            },
            Section::Lookup(mut pending) => {
                if fields.as_slice() == ["lookup end"] {
                    rules.add_lookup(pending.name, pending.kind, &[]);
                    Section::Top
                } else {
                    if !LOOKUP_FLAGS.contains(&fields[0]) {
                        add_rule(line_no, &mut pending.kind, &fields)?;
                    }
                    Section::Lookup(pending)
                }
            }
        };
    }

    match section {
        Section::Top => (),
        Section::Skip | Section::Features => {
            return Err(err(text.lines().count(), "unterminated table"))
        }
        Section::Lookup(pending) => {
            return Err(err(
                text.lines().count(),
                format!("lookup '{}' has no end", pending.name),
            ))
        }
    }

    let names: Vec<String> = rules.lookups.iter().map(|l| l.name.clone()).collect();
    for (line_no, tag, references) in features {
        let mut resolved = Vec::new();
        for reference in references {
            let name = if names.contains(&reference) {
                reference
            } else {
                reference
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| names.get(i).cloned())
                    .ok_or_else(|| err(line_no, format!("no lookup '{reference}'")))?
            };
            resolved.push(name);
        }
        for name in resolved {
            let Some(kind) = rules.lookup(&name).map(|l| l.kind.clone()) else {
                continue;
            };
            rules.add_lookup(name, kind, &[tag]);
        }
    }
    Ok(rules)
}

fn empty_lookup(line_no: usize, kind: &str) -> Result<LookupKind, Error> {
    Ok(match kind {
        "single" => LookupKind::SingleSubst(Vec::new()),
        "ligature" => LookupKind::LigatureSubst(Vec::new()),
        "pair" => LookupKind::PairPos(Vec::new()),
        "mark to base" => LookupKind::MarkToBase(Vec::new()),
        "mark to mark" => LookupKind::MarkToMark(Vec::new()),
        _ => return Err(err(line_no, format!("unsupported lookup type '{kind}'"))),
    })
}

fn number(line_no: usize, raw: &str) -> Result<f64, Error> {
    raw.parse::<f64>()
        .map_err(|_| err(line_no, format!("'{raw}' is not a number")))
}

fn add_rule(line_no: usize, kind: &mut LookupKind, fields: &[&str]) -> Result<(), Error> {
    match kind {
        LookupKind::SingleSubst(subs) => match fields {
            [from, to] => subs.push((GlyphName::new(from), GlyphName::new(to))),
            _ => return Err(err(line_no, "single substitutions are 'from<TAB>to'")),
        },
        LookupKind::LigatureSubst(ligs) => match fields {
            [ligature, components @ ..] if components.len() >= 2 => ligs.push(Ligature {
                components: components.iter().map(GlyphName::new).collect(),
                ligature: GlyphName::new(ligature),
            }),
            _ => {
                return Err(err(
                    line_no,
                    "ligatures are 'ligature<TAB>component<TAB>component...'",
                ))
            }
        },
        LookupKind::PairPos(pairs) => match fields {
            [first, second, value] => pairs.push(PairAdjustment {
                first: vec![GlyphName::new(first)],
                second: vec![GlyphName::new(second)],
                x_advance: number(line_no, value)?,
            }),
            _ => return Err(err(line_no, "pairs are 'first<TAB>second<TAB>value'")),
        },
        LookupKind::MarkToBase(attachments) | LookupKind::MarkToMark(attachments) => {
            let [role, glyph, class, x, y] = fields else {
                return Err(err(
                    line_no,
                    "attachments are 'mark|base<TAB>glyph<TAB>class<TAB>x<TAB>y'",
                ));
            };
            let record = MarkRecord {
                glyph: GlyphName::new(glyph),
                x: number(line_no, x)?,
                y: number(line_no, y)?,
            };
            let idx = match attachments.iter().position(|a| a.class_name == *class) {
                Some(idx) => idx,
                None => {
                    attachments.push(MarkAttachment {
                        class_name: class.to_string(),
                        marks: Vec::new(),
                        bases: Vec::new(),
                    });
                    attachments.len() - 1
                }
            };
            match *role {
                "mark" => attachments[idx].marks.push(record),
                "base" => attachments[idx].bases.push(record),
                _ => return Err(err(line_no, format!("expected mark or base, got '{role}'"))),
            }
        }
        LookupKind::Cursive(..) => return Err(err(line_no, "cursive lookups are not supported")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use kiln_types::types::{GlyphName, Tag};
    use pretty_assertions::assert_eq;

    use crate::{error::Error, layout::LookupKind};

    use super::parse_mti;

    const SAMPLE: &str = "FontDame GPOS table\n\
        % a comment\n\
        \n\
        script table begin\n\
        latn\tdefault\t\t0, 1\n\
        script table end\n\
        \n\
        feature table begin\n\
        0\tliga\tligatures\n\
        1\tkern\t1\n\
        2\tmark\tmarks\n\
        feature table end\n\
        \n\
        lookup\tligatures\tligature\n\
        RightToLeft\tno\n\
        f_i\tf\ti\t% trailing comment\n\
        lookup end\n\
        \n\
        lookup\tkerning\tpair\n\
        T\to\t-40\n\
        lookup end\n\
        \n\
        lookup\tmarks\tmark to base\n\
        mark\tacutecomb\ttop\t100\t500\n\
        base\ta\ttop\t250\t500\n\
        base\to\ttop\t260\t510\n\
        lookup end\n";

    #[test]
    fn parses_sample() {
        let rules = parse_mti(SAMPLE).unwrap();
        assert_eq!(
            vec!["ligatures", "kerning", "marks"],
            rules.lookups.iter().map(|l| l.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(
            vec!["kerning".to_string()],
            rules.feature(Tag::new(b"kern")).unwrap().lookups
        );
        let LookupKind::LigatureSubst(ligs) = &rules.lookup("ligatures").unwrap().kind else {
            panic!("wrong kind");
        };
        assert_eq!(GlyphName::from("f_i"), ligs[0].ligature);
        assert_eq!(vec![GlyphName::from("f"), GlyphName::from("i")], ligs[0].components);

        let LookupKind::MarkToBase(attachments) = &rules.lookup("marks").unwrap().kind else {
            panic!("wrong kind");
        };
        assert_eq!(1, attachments.len());
        assert_eq!(2, attachments[0].bases.len());
        assert_eq!(260.0, attachments[0].bases[1].x);
    }

    #[test]
    fn reports_line_of_bad_number() {
        let text = "lookup\tk\tpair\nT\to\tabc\nlookup end\n";
        match parse_mti(text) {
            Err(Error::MtiParse { line, .. }) => assert_eq!(2, line),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_lookup_reference() {
        let text = "feature table begin\n0\tliga\tnope\nfeature table end\n";
        match parse_mti(text) {
            Err(Error::MtiParse { line, .. }) => assert_eq!(2, line),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_lookup() {
        assert!(matches!(
            parse_mti("lookup\ts\tsingle\na\tb\n"),
            Err(Error::MtiParse { .. })
        ));
    }
}
