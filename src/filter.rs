use crate::domain::{Classification, ContentUnit, FilteredIssue, Issue, Label, UnitKind};

/// Drops ad-labeled units at or above the confidence threshold and rebuilds
/// the document from the survivors, in original order. Headings left with
/// nothing underneath are pruned as well, deepest-first, so emptying a
/// subsection can orphan (and remove) its parent heading. The source issue
/// is never mutated.
pub fn filter_issue(
    issue: &Issue,
    units: &[ContentUnit],
    results: &[Classification],
    threshold: f64,
) -> FilteredIssue {
    debug_assert_eq!(units.len(), results.len());

    let mut keep: Vec<bool> = units
        .iter()
        .zip(results)
        .map(|(_, result)| !(result.label == Label::Ad && result.confidence >= threshold))
        .collect();

    prune_orphan_headings(units, &mut keep);

    let mut content = String::new();
    let mut kept_units = 0usize;
    let mut dropped_units = Vec::new();
    let mut prev_was_item = false;
    for (unit, kept) in units.iter().zip(&keep) {
        if *kept {
            let is_item = matches!(unit.kind, UnitKind::ListItem { .. });
            if !content.is_empty() {
                // Adjacent surviving list items stay a tight list.
                content.push_str(if prev_was_item && is_item { "\n" } else { "\n\n" });
            }
            content.push_str(unit.raw.trim_end());
            kept_units += 1;
            prev_was_item = is_item;
        } else {
            dropped_units.push(unit.ordinal);
        }
    }
    if !content.is_empty() {
        content.push('\n');
    }

    FilteredIssue {
        id: issue.id.clone(),
        content,
        kept_units,
        dropped_units,
    }
}

/// A heading survives only if some surviving non-heading unit follows it
/// before the next heading of the same or a higher level. Scanning from the
/// back lets an emptied subsection take its parent heading down with it.
fn prune_orphan_headings(units: &[ContentUnit], keep: &mut [bool]) {
    for index in (0..units.len()).rev() {
        if !keep[index] {
            continue;
        }
        let UnitKind::Heading { level } = units[index].kind else {
            continue;
        };
        let mut has_content = false;
        for (unit, kept) in units.iter().zip(keep.iter()).skip(index + 1) {
            if !*kept {
                continue;
            }
            match unit.kind {
                UnitKind::Heading { level: inner } if inner <= level => break,
                UnitKind::Heading { .. } => continue,
                // Prose-free blocks (thematic breaks, link definitions)
                // cannot keep a section alive on their own.
                _ if unit.text.is_empty() => continue,
                _ => {
                    has_content = true;
                    break;
                }
            }
        }
        if !has_content {
            keep[index] = false;
        }
    }
}
