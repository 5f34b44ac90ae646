//! Regex name resolution for joints, bodies and per-name parameter maps.
//!
//! Patterns are full-match regular expressions. Every pattern must match at
//! least one name and no name may be claimed by two patterns.

use regex::Regex;

use crate::error::ConfigError;
use crate::ordered::OrderedMap;

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Resolve `patterns` against `names`.
///
/// Returns matched indices and names. Results follow the order of `names`
/// unless `preserve_order` is set, in which case they are grouped by pattern
/// in the order the patterns were given.
pub fn resolve_matching_names(
    patterns: &[String],
    names: &[String],
    preserve_order: bool,
) -> Result<(Vec<usize>, Vec<String>), ConfigError> {
    let (indices, matched, _) = resolve_impl(patterns, names, preserve_order)?;
    Ok((indices, matched))
}

/// Resolve a pattern-to-value map against `names`.
///
/// Each matched name receives the value of the pattern that matched it.
pub fn resolve_matching_names_values<V: Clone>(
    data: &OrderedMap<V>,
    names: &[String],
    preserve_order: bool,
) -> Result<(Vec<usize>, Vec<String>, Vec<V>), ConfigError> {
    let patterns: Vec<String> = data.keys().map(str::to_string).collect();
    let values: Vec<&V> = data.values().collect();
    let (indices, matched, owners) = resolve_impl(&patterns, names, preserve_order)?;
    let resolved = owners.into_iter().map(|p| values[p].clone()).collect();
    Ok((indices, matched, resolved))
}

/// Shared matcher: returns `(name index, name, pattern index)` triples.
fn resolve_impl(
    patterns: &[String],
    names: &[String],
    preserve_order: bool,
) -> Result<(Vec<usize>, Vec<String>, Vec<usize>), ConfigError> {
    let compiled = patterns
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut owner: Vec<Option<usize>> = vec![None; names.len()];
    let mut hits = vec![0usize; patterns.len()];

    for (ni, name) in names.iter().enumerate() {
        let matching: Vec<usize> = compiled
            .iter()
            .enumerate()
            .filter(|(_, re)| re.is_match(name))
            .map(|(pi, _)| pi)
            .collect();
        if matching.len() > 1 {
            return Err(ConfigError::AmbiguousMatch {
                name: name.clone(),
                patterns: matching.iter().map(|&pi| patterns[pi].clone()).collect(),
            });
        }
        if let Some(&pi) = matching.first() {
            owner[ni] = Some(pi);
            hits[pi] += 1;
        }
    }

    if let Some(pi) = hits.iter().position(|&h| h == 0) {
        return Err(ConfigError::UnmatchedPattern {
            pattern: patterns[pi].clone(),
            available: names.to_vec(),
        });
    }

    let mut order: Vec<(usize, usize)> = owner
        .iter()
        .enumerate()
        .filter_map(|(ni, o)| o.map(|pi| (ni, pi)))
        .collect();
    if preserve_order {
        // Stable: names stay in declaration order within one pattern.
        order.sort_by_key(|&(_, pi)| pi);
    }

    let indices = order.iter().map(|&(ni, _)| ni).collect();
    let matched = order.iter().map(|&(ni, _)| names[ni].clone()).collect();
    let owners = order.iter().map(|&(_, pi)| pi).collect();
    Ok((indices, matched, owners))
}
