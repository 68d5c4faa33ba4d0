//! CSS selector subset for the headless document
//!
//! Supported: type selectors, `*`, `#id`, `.class`, compounds of those,
//! descendant (whitespace) and child (`>`) combinators, and comma groups.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

/// One comma-separated alternative, read left to right
///
/// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Complex {
    pub compounds: Vec<Compound>,
    pub combinators: Vec<Combinator>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Selector {
    pub alternatives: Vec<Complex>,
}

impl Selector {
    /// Parse a selector; `None` if any part of it is malformed
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let alternatives = input
            .split(',')
            .map(parse_complex)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }
}

fn parse_complex(input: &str) -> Option<Complex> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;
    let mut token = String::new();

    for c in input.chars() {
        if c.is_whitespace() {
            finish_compound(&mut token, &mut pending, &mut compounds, &mut combinators)?;
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
        } else if c == '>' {
            finish_compound(&mut token, &mut pending, &mut compounds, &mut combinators)?;
            if compounds.is_empty() || pending == Some(Combinator::Child) {
                return None;
            }
            pending = Some(Combinator::Child);
        } else {
            token.push(c);
        }
    }
    finish_compound(&mut token, &mut pending, &mut compounds, &mut combinators)?;

    if compounds.is_empty() || pending == Some(Combinator::Child) {
        return None;
    }
    Some(Complex {
        compounds,
        combinators,
    })
}

fn finish_compound(
    token: &mut String,
    pending: &mut Option<Combinator>,
    compounds: &mut Vec<Compound>,
    combinators: &mut Vec<Combinator>,
) -> Option<()> {
    if token.is_empty() {
        return Some(());
    }
    let compound = parse_compound(token)?;
    token.clear();
    if !compounds.is_empty() {
        combinators.push(pending.take().unwrap_or(Combinator::Descendant));
    } else if pending.is_some() {
        // Leading combinator such as "> a"
        return None;
    }
    compounds.push(compound);
    Some(())
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut chars = token.chars().peekable();

    if chars.peek() == Some(&'*') {
        chars.next();
    } else {
        let mut tag = String::new();
        while let Some(&c) = chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            tag.push(c.to_ascii_lowercase());
            chars.next();
        }
        if !tag.is_empty() {
            compound.tag = Some(tag);
        }
    }

    while let Some(marker) = chars.next() {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            return None;
        }
        match marker {
            '#' if compound.id.is_none() => compound.id = Some(name),
            '.' => compound.classes.push(name),
            _ => return None,
        }
    }
    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound_forms() {
        let selector = Selector::parse("a.nerdbox#x.big").unwrap();
        let compound = &selector.alternatives[0].compounds[0];
        assert_eq!(compound.tag.as_deref(), Some("a"));
        assert_eq!(compound.id.as_deref(), Some("x"));
        assert_eq!(compound.classes, vec!["nerdbox", "big"]);
    }

    #[test]
    fn test_parse_combinators() {
        let selector = Selector::parse("#nerdbox .content > p").unwrap();
        let complex = &selector.alternatives[0];
        assert_eq!(complex.compounds.len(), 3);
        assert_eq!(
            complex.combinators,
            vec![Combinator::Descendant, Combinator::Child]
        );
    }

    #[test]
    fn test_parse_groups() {
        let selector = Selector::parse("#nerdbox .close, #nerdbox .overlay").unwrap();
        assert_eq!(selector.alternatives.len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Selector::parse("#").is_none());
        assert!(Selector::parse("").is_none());
        assert!(Selector::parse("> a").is_none());
        assert!(Selector::parse("a >").is_none());
        assert!(Selector::parse("a[href]").is_none());
        assert!(Selector::parse("a, ").is_none());
    }
}
