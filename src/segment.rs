use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use thiserror::Error;

use crate::domain::{ContentUnit, UnitKind};

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("unbalanced block structure in source document")]
    UnbalancedStructure,
    #[error("block span {start}..{end} is outside the source document")]
    InvalidSpan { start: usize, end: usize },
}

fn parse_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

struct UnitBuilder {
    span: Range<usize>,
    depth: usize,
    kind: UnitKind,
    text: String,
    links: Vec<String>,
}

impl UnitBuilder {
    fn open(span: Range<usize>, depth: usize, kind: UnitKind) -> Self {
        Self {
            span,
            depth,
            kind,
            text: String::new(),
            links: Vec::new(),
        }
    }

    fn finish(self, src: &str) -> Result<(Range<usize>, ContentUnit), SegmentError> {
        let raw = src
            .get(self.span.clone())
            .ok_or(SegmentError::InvalidSpan {
                start: self.span.start,
                end: self.span.end,
            })?
            .to_string();
        let unit = ContentUnit {
            ordinal: 0,
            raw,
            text: collapse_whitespace(&self.text),
            kind: self.kind,
            section_heading: None,
            links: self.links,
        };
        Ok((self.span, unit))
    }
}

/// Splits one issue's Markdown into an ordered sequence of block-level
/// units. Each unit's `raw` field is the exact source slice for its block,
/// so emitting every unit back out in order reproduces the document up to
/// whitespace. Pure function of the input text.
pub fn segment(src: &str) -> Result<Vec<ContentUnit>, SegmentError> {
    let mut blocks: Vec<(Range<usize>, ContentUnit)> = Vec::new();
    let mut current: Option<UnitBuilder> = None;
    let mut depth: usize = 0;
    // Ordered flag of the currently open top-level list, if any. Nested
    // lists live inside an item unit and never reach this state.
    let mut list_ordered: Option<bool> = None;

    for (event, span) in Parser::new_ext(src, parse_options()).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if current.is_none() {
                    match tag {
                        Tag::List(start) => list_ordered = Some(start.is_some()),
                        Tag::Heading { level, .. } => {
                            current = Some(UnitBuilder::open(
                                span,
                                depth,
                                UnitKind::Heading { level: level as u8 },
                            ));
                        }
                        Tag::Item => {
                            current = Some(UnitBuilder::open(
                                span,
                                depth,
                                UnitKind::ListItem {
                                    ordered: list_ordered.unwrap_or(false),
                                },
                            ));
                        }
                        Tag::Paragraph => {
                            current = Some(UnitBuilder::open(span, depth, UnitKind::Paragraph));
                        }
                        _ => {
                            current = Some(UnitBuilder::open(span, depth, UnitKind::Other));
                        }
                    }
                } else if let Some(unit) = current.as_mut() {
                    if let Tag::Link { dest_url, .. } = &tag {
                        unit.links.push(dest_url.to_string());
                    }
                }
                depth += 1;
            }
            Event::End(end) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(SegmentError::UnbalancedStructure)?;
                if matches!(end, TagEnd::List(_)) && current.is_none() {
                    list_ordered = None;
                }
                let closed = current.as_ref().is_some_and(|unit| unit.depth == depth);
                if closed {
                    let builder = current.take().ok_or(SegmentError::UnbalancedStructure)?;
                    blocks.push(builder.finish(src)?);
                } else if let Some(unit) = current.as_mut() {
                    // Word boundary between nested blocks of the same unit.
                    if matches!(end, TagEnd::Paragraph | TagEnd::Item | TagEnd::Heading(_)) {
                        unit.text.push(' ');
                    }
                }
            }
            Event::Text(chunk) | Event::Code(chunk) => {
                if let Some(unit) = current.as_mut() {
                    unit.text.push_str(&chunk);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(unit) = current.as_mut() {
                    unit.text.push(' ');
                }
            }
            Event::Rule => {
                if current.is_none() {
                    let raw = src
                        .get(span.clone())
                        .ok_or(SegmentError::InvalidSpan {
                            start: span.start,
                            end: span.end,
                        })?
                        .to_string();
                    blocks.push((
                        span,
                        ContentUnit {
                            ordinal: 0,
                            raw,
                            text: String::new(),
                            kind: UnitKind::Other,
                            section_heading: None,
                            links: Vec::new(),
                        },
                    ));
                }
            }
            // Raw HTML is kept in the unit's source slice but contributes
            // no prose tokens.
            Event::Html(_) | Event::InlineHtml(_) => {}
            _ => {}
        }
    }

    if current.is_some() {
        return Err(SegmentError::UnbalancedStructure);
    }

    sweep_uncovered(src, &mut blocks)?;
    blocks.sort_by_key(|(span, _)| span.start);

    let mut units = Vec::with_capacity(blocks.len());
    let mut section_heading: Option<String> = None;
    for (ordinal, (_, mut unit)) in blocks.into_iter().enumerate() {
        unit.ordinal = ordinal;
        if matches!(unit.kind, UnitKind::Heading { .. }) {
            section_heading = Some(unit.text.clone());
        } else {
            unit.section_heading = section_heading.clone();
        }
        units.push(unit);
    }
    Ok(units)
}

/// The parser emits no events for link-reference definitions
/// (`[1]: https://…`), so their lines fall between block spans. Sweeping
/// every non-blank uncovered stretch into an `Other` unit keeps reassembly
/// lossless and reference-style links resolvable.
fn sweep_uncovered(
    src: &str,
    blocks: &mut Vec<(Range<usize>, ContentUnit)>,
) -> Result<(), SegmentError> {
    let mut gaps: Vec<Range<usize>> = Vec::new();
    let mut cursor = 0usize;
    for (span, _) in blocks.iter() {
        if span.start > cursor {
            gaps.push(cursor..span.start);
        }
        cursor = cursor.max(span.end);
    }
    if cursor < src.len() {
        gaps.push(cursor..src.len());
    }

    for gap in gaps {
        let slice = src.get(gap.clone()).ok_or(SegmentError::InvalidSpan {
            start: gap.start,
            end: gap.end,
        })?;
        let body = slice.trim();
        if body.is_empty() {
            continue;
        }
        let start = gap.start + (slice.len() - slice.trim_start().len());
        blocks.push((
            start..start + body.len(),
            ContentUnit {
                ordinal: 0,
                raw: body.to_string(),
                text: String::new(),
                kind: UnitKind::Other,
                section_heading: None,
                links: Vec::new(),
            },
        ));
    }
    Ok(())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-insensitive view of a document, used to compare a reassembled
/// issue against its source.
pub fn normalize_whitespace(text: &str) -> String {
    collapse_whitespace(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Weekly Issue 42

Intro paragraph with a [link](https://example.com/a).

## Articles

- [First](https://example.com/1), a compiler writeup
- [Second](https://example.com/2), database internals

## Sponsor

Buy our amazing course, discount code inside.
";

    #[test]
    fn segments_blocks_in_order() {
        let units = segment(SAMPLE).unwrap();
        let kinds: Vec<UnitKind> = units.iter().map(|u| u.kind).collect();
        assert_eq!(
            kinds,
            vec![
                UnitKind::Heading { level: 1 },
                UnitKind::Paragraph,
                UnitKind::Heading { level: 2 },
                UnitKind::ListItem { ordered: false },
                UnitKind::ListItem { ordered: false },
                UnitKind::Heading { level: 2 },
                UnitKind::Paragraph,
            ]
        );
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.ordinal, i);
        }
    }

    #[test]
    fn tracks_section_headings_and_links() {
        let units = segment(SAMPLE).unwrap();
        assert_eq!(units[1].section_heading.as_deref(), Some("Weekly Issue 42"));
        assert_eq!(units[3].section_heading.as_deref(), Some("Articles"));
        assert_eq!(units[6].section_heading.as_deref(), Some("Sponsor"));
        assert!(units[0].section_heading.is_none());
        assert_eq!(units[1].links, vec!["https://example.com/a".to_string()]);
        assert_eq!(units[3].links, vec!["https://example.com/1".to_string()]);
    }

    #[test]
    fn reassembly_reconstructs_source_modulo_whitespace() {
        let units = segment(SAMPLE).unwrap();
        let rebuilt = units
            .iter()
            .map(|u| u.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(normalize_whitespace(&rebuilt), normalize_whitespace(SAMPLE));
    }

    #[test]
    fn empty_input_yields_no_units() {
        assert!(segment("").unwrap().is_empty());
        assert!(segment("   \n\n  ").unwrap().is_empty());
    }

    #[test]
    fn trailing_block_without_newline_is_emitted() {
        let units = segment("final paragraph, no newline").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].raw, "final paragraph, no newline");
        assert_eq!(units[0].kind, UnitKind::Paragraph);
    }

    #[test]
    fn ordered_list_items_are_marked_ordered() {
        let units = segment("1. one\n2. two\n").unwrap();
        assert_eq!(units.len(), 2);
        assert!(units
            .iter()
            .all(|u| u.kind == UnitKind::ListItem { ordered: true }));
    }

    #[test]
    fn nested_list_stays_inside_its_item() {
        let src = "- outer\n  - inner one\n  - inner two\n- second\n";
        let units = segment(src).unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].text.contains("inner one"));
    }

    #[test]
    fn link_reference_definitions_survive_reassembly() {
        let src = "A story about [compilers][1].\n\n[1]: https://example.com/compilers\n";
        let units = segment(src).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].kind, UnitKind::Paragraph);
        assert_eq!(
            units[0].links,
            vec!["https://example.com/compilers".to_string()]
        );
        assert_eq!(units[1].kind, UnitKind::Other);
        assert_eq!(units[1].raw, "[1]: https://example.com/compilers");
        assert!(units[1].text.is_empty());
        assert_eq!(units[1].ordinal, 1);

        let rebuilt = units
            .iter()
            .map(|u| u.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(normalize_whitespace(&rebuilt), normalize_whitespace(src));
    }

    #[test]
    fn link_reference_definitions_inherit_their_section() {
        let src = "\
## Reading

See [the post][p].

[p]: https://example.com/post

## Next

More text.
";
        let units = segment(src).unwrap();
        let definition = units
            .iter()
            .find(|u| u.raw.starts_with("[p]:"))
            .expect("definition unit emitted");
        assert_eq!(definition.section_heading.as_deref(), Some("Reading"));
        // The sweep keeps ordinals dense and in source order.
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.ordinal, i);
        }
        let next = units.iter().position(|u| u.text == "Next").unwrap();
        assert!(definition.ordinal < next);
    }

    #[test]
    fn heading_unit_text_is_plain() {
        let units = segment("## A *styled* [head](https://h.example)\n").unwrap();
        assert_eq!(units[0].text, "A styled head");
        assert_eq!(units[0].links, vec!["https://h.example".to_string()]);
    }
}
