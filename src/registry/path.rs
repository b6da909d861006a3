//! The XPath-like dialect accepted by `resolvePath`/`pathValidation`
//! (`spec.md` §4.2): a sequence of descendant-axis steps, each with an
//! optional element name and zero or more `[@attr="value"]` predicates.

use regex::Regex;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static PRED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[@([A-Za-z_][A-Za-z0-9_]*)="([^"]*)"\]"#).unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: Option<String>,
    pub predicates: Vec<(String, String)>,
}

/// A single node in a dataitem's root-to-leaf chain: `Device`, each ancestor
/// `Component` (tag = componentType), and finally the dataitem itself
/// (tag = its MTConnect type, e.g. `VOLTAGE`), plus a generic `DataItem`
/// alias node layered on top of the leaf so queries can address it by
/// either its concrete type or the generic element name.
#[derive(Debug, Clone)]
pub struct ChainNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

/// Parse a query like `//Axes//DataItem[@type="VOLTAGE"]` into steps.
/// Unrecognized syntax degrades to an empty step list (resolves nothing,
/// rather than erroring — matches "unknown attribute predicates match
/// nothing, not an error").
pub fn parse_steps(query: &str) -> Vec<Step> {
    query
        .split("//")
        .filter(|s| !s.is_empty())
        .map(|seg| {
            let name = NAME_RE.find(seg).map(|m| m.as_str().to_string());
            let predicates = PRED_RE
                .captures_iter(seg)
                .map(|c| (c[1].to_string(), c[2].to_string()))
                .collect();
            Step { name, predicates }
        })
        .collect()
}

fn step_matches(step: &Step, node: &ChainNode) -> bool {
    if let Some(name) = &step.name {
        if name != &node.tag && name != "DataItem" {
            return false;
        }
        if name == "DataItem" && node.tag.is_empty() {
            return false;
        }
    }
    step.predicates.iter().all(|(attr, val)| {
        node.attrs
            .iter()
            .any(|(a, v)| a == attr && v == val)
    })
}

/// True if `steps` matches somewhere along `chain` as an ordered,
/// non-contiguous subsequence (descendant axis only — the only axis this
/// dialect supports).
pub fn matches_chain(steps: &[Step], chain: &[ChainNode]) -> bool {
    if steps.is_empty() {
        return false;
    }
    let mut cursor = 0usize;
    for step in steps {
        let Some(found) = chain[cursor..].iter().position(|n| step_matches(step, n)) else {
            return false;
        };
        cursor += found + 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<ChainNode> {
        vec![
            ChainNode { tag: "Device".into(), attrs: vec![("uuid".into(), "000".into())] },
            ChainNode { tag: "Axes".into(), attrs: vec![("id".into(), "ax1".into())] },
            ChainNode { tag: "VOLTAGE".into(), attrs: vec![("id".into(), "va".into()), ("type".into(), "VOLTAGE".into())] },
        ]
    }

    #[test]
    fn matches_by_component_and_predicate() {
        let steps = parse_steps(r#"//Axes//DataItem[@type="VOLTAGE"]"#);
        assert!(matches_chain(&steps, &chain()));
    }

    #[test]
    fn mismatched_predicate_fails() {
        let steps = parse_steps(r#"//DataItem[@type="AVAILABILITY"]"#);
        assert!(!matches_chain(&steps, &chain()));
    }

    #[test]
    fn unknown_attribute_matches_nothing_not_an_error() {
        let steps = parse_steps(r#"//DataItem[@nonsense="x"]"#);
        assert!(!matches_chain(&steps, &chain()));
    }

    #[test]
    fn empty_query_resolves_nothing() {
        assert!(!matches_chain(&parse_steps(""), &chain()));
    }
}
