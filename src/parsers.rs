//! Parsers (§4.4): every function here is total and has a documented
//! fallback. None of them suspend, panic, or return `Result` — a parse
//! failure is recovered locally by falling back, never surfaced (§7
//! `ParseError`).

use crate::model::Label;

/// Locate `FINAL RANKING:` (case-insensitive, on its own line) and read the
/// following `N. Response X` lines in order. Falls back to a global scan for
/// every `Response [A-Z]` occurrence, deduplicated on first occurrence (§4.4, §8 S5).
pub fn parse_ranking(text: &str) -> Vec<Label> {
    let lines: Vec<&str> = text.lines().collect();
    let header_idx = lines
        .iter()
        .position(|l| l.trim().eq_ignore_ascii_case("final ranking:"));

    if let Some(idx) = header_idx {
        let mut ordered = Vec::new();
        for line in &lines[idx + 1..] {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(label) = parse_numbered_response_line(trimmed) {
                ordered.push(label);
            } else {
                break;
            }
        }
        if !ordered.is_empty() {
            return ordered;
        }
    }

    global_scan_labels(text)
}

/// Parse a line of the form `N. Response X` (any amount of surrounding
/// whitespace), returning `X`.
fn parse_numbered_response_line(line: &str) -> Option<Label> {
    let after_dot = line.splitn(2, '.').nth(1)?.trim();
    let after_prefix = after_dot.strip_prefix("Response")?.trim();
    after_prefix.chars().next().filter(|c| c.is_ascii_alphabetic())
}

/// Scan the whole text for `Response [A-Z]` occurrences, returning labels in
/// first-occurrence order with duplicates removed (§4.4 ranking-parser fallback, §8 S5).
fn global_scan_labels(text: &str) -> Vec<Label> {
    let mut seen = Vec::new();
    let bytes = text.as_bytes();
    let needle = b"Response ";
    let mut i = 0;
    while i + needle.len() < bytes.len() {
        if &bytes[i..i + needle.len()] == needle {
            let candidate = bytes[i + needle.len()] as char;
            if candidate.is_ascii_alphabetic() && !seen.contains(&candidate) {
                seen.push(candidate);
            }
        }
        i += 1;
    }
    seen
}

/// Split on `## Revised Response` and return the trimmed tail. Falls back to
/// the full defense content when the header is absent (§4.4, I2).
pub fn parse_revised_answer(defense_content: &str) -> String {
    match defense_content.split_once("## Revised Response") {
        Some((_, tail)) => {
            let trimmed = tail.trim();
            if trimmed.is_empty() {
                defense_content.trim().to_string()
            } else {
                trimmed.to_string()
            }
        }
        None => defense_content.trim().to_string(),
    }
}

/// Extract every `## Critique of <target>` section (case-insensitive match on
/// the trailing identifier, tolerant of surrounding whitespace/punctuation),
/// concatenated with source-attribution headers (§4.4).
pub fn extract_critiques_of(critique_responses: &[(String, String)], target: &str) -> String {
    let mut out = String::new();
    let target_norm = normalize_identifier(target);

    for (source_model, content) in critique_responses {
        for section in split_into_critique_sections(content) {
            if normalize_identifier(&section.heading_identifier) == target_norm {
                out.push_str(&format!(
                    "From {}:\n{}\n\n",
                    source_model,
                    section.body.trim()
                ));
            }
        }
    }
    out
}

struct CritiqueSection {
    heading_identifier: String,
    body: String,
}

fn split_into_critique_sections(content: &str) -> Vec<CritiqueSection> {
    let marker = "## Critique of";
    let mut sections = Vec::new();
    let mut rest = content;

    while let Some(pos) = rest.find(marker) {
        let after_marker = &rest[pos + marker.len()..];
        let line_end = after_marker.find('\n').unwrap_or(after_marker.len());
        let heading_identifier = after_marker[..line_end].trim().to_string();

        let body_start = &after_marker[line_end..];
        let next_marker_pos = body_start.find(marker).unwrap_or(body_start.len());
        let body = body_start[..next_marker_pos].to_string();

        sections.push(CritiqueSection { heading_identifier, body });
        rest = &after_marker[line_end..];
        if next_marker_pos == body_start.len() {
            break;
        }
    }

    sections
}

/// Loose case/punctuation-insensitive comparison key for a participant id as
/// it appears in a markdown heading.
fn normalize_identifier(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// A ReAct suspension boundary: thought, terminal/tool action name, and
/// optional action argument, any of which may be absent (§4.4, §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReActStep {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub action_arg: Option<String>,
}

/// Extract the first `Thought:` block and the first `Action:` block.
/// Recognizes `respond()`/`synthesize()` as terminal actions and
/// `search_web("...")` (single or double quotes) as the tool action (§4.4).
pub fn parse_react_step(text: &str) -> ReActStep {
    let thought = extract_labeled_block(text, "Thought:");
    let action_block = extract_labeled_block(text, "Action:");

    let (action, action_arg) = match &action_block {
        Some(block) => parse_action(block),
        None => (None, None),
    };

    ReActStep { thought, action, action_arg }
}

fn extract_labeled_block(text: &str, label: &str) -> Option<String> {
    let pos = text.find(label)?;
    let after = &text[pos + label.len()..];
    let end = after.find('\n').unwrap_or(after.len());
    let value = after[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_action(block: &str) -> (Option<String>, Option<String>) {
    let trimmed = block.trim();
    if trimmed.starts_with("respond()") {
        return (Some("respond".to_string()), None);
    }
    if trimmed.starts_with("synthesize()") {
        return (Some("synthesize".to_string()), None);
    }
    if let Some(rest) = trimmed.strip_prefix("search_web(") {
        let rest = rest.trim_start();
        let quote = rest.chars().next();
        if let Some(q) = quote {
            if q == '"' || q == '\'' {
                if let Some(close) = rest[1..].find(q) {
                    let arg = rest[1..1 + close].to_string();
                    return (Some("search_web".to_string()), Some(arg));
                }
            }
        }
        return (Some("search_web".to_string()), None);
    }
    (None, None)
}

/// Split content on `## Synthesis`: head becomes `reflection`, tail becomes
/// `synthesis`. Absent boundary yields an empty reflection and the whole
/// content as synthesis (§4.4, §4.9, §8 B4/S6).
pub fn parse_reflection_split(content: &str) -> (String, String) {
    match content.split_once("## Synthesis") {
        Some((head, tail)) => (head.trim().to_string(), tail.trim().to_string()),
        None => (String::new(), content.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_primary_path() {
        let text = "Some analysis.\nFINAL RANKING:\n1. Response B\n2. Response A\n3. Response C";
        assert_eq!(parse_ranking(text), vec!['B', 'A', 'C']);
    }

    #[test]
    fn ranking_fallback_s5() {
        let text = "Response C beats Response A which beats Response B";
        assert_eq!(parse_ranking(text), vec!['C', 'A', 'B']);
    }

    #[test]
    fn revised_answer_fallback_never_empty() {
        assert_eq!(parse_revised_answer("no headers here"), "no headers here");
    }

    #[test]
    fn revised_answer_primary_path() {
        let text = "## Addressing Critiques\nok\n## Revised Response\nThe final answer.";
        assert_eq!(parse_revised_answer(text), "The final answer.");
    }

    #[test]
    fn critique_extraction_concatenates_sources() {
        let responses = vec![
            ("p2".to_string(), "## Critique of p1\ngood job\n## Critique of p3\nmeh".to_string()),
            ("p3".to_string(), "## Critique of p1\nneeds work".to_string()),
        ];
        let out = extract_critiques_of(&responses, "p1");
        assert!(out.contains("good job"));
        assert!(out.contains("needs work"));
        assert!(!out.contains("meh"));
    }

    #[test]
    fn react_parses_search_web_with_double_quotes() {
        let text = "Thought: need latest rate.\nAction: search_web(\"usd to eur today\")";
        let step = parse_react_step(text);
        assert_eq!(step.thought.as_deref(), Some("need latest rate."));
        assert_eq!(step.action.as_deref(), Some("search_web"));
        assert_eq!(step.action_arg.as_deref(), Some("usd to eur today"));
    }

    #[test]
    fn react_parses_respond_with_no_arg() {
        let step = parse_react_step("Thought: I know this.\nAction: respond()");
        assert_eq!(step.action.as_deref(), Some("respond"));
        assert_eq!(step.action_arg, None);
    }

    #[test]
    fn reflection_split_boundary_present() {
        let (reflection, synthesis) = parse_reflection_split("analysis here\n## Synthesis\nfinal answer");
        assert_eq!(reflection, "analysis here");
        assert_eq!(synthesis, "final answer");
    }

    #[test]
    fn reflection_split_boundary_absent_s6() {
        let (reflection, synthesis) = parse_reflection_split("The answers agree on …");
        assert_eq!(reflection, "");
        assert_eq!(synthesis, "The answers agree on …");
    }
}
