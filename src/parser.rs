use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::metrics::FALLBACK_ANSWERS;
use crate::prompt::ANSWER_MARKER;

pub const FALLBACK_ANSWER: &str = "I couldn't generate an answer for this question.";

lazy_static! {
    // ANSWER_3: / **ANSWER_3:** / *ANSWER_3*: at the start of a line
    static ref MARKER: Regex = Regex::new(&format!(
        r"(?m)^[ \t]*\*{{0,2}}{ANSWER_MARKER}(\d+)\*{{0,2}}[ \t]*:\*{{0,2}}"
    ))
    .unwrap();
    static ref SEPARATOR_LINE: Regex = Regex::new(r"(?m)^[ \t]*(?:-{3,}|={3,}|\*{3,}|_{3,})[ \t]*$").unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
    static ref LEADING_ENUMERATION: Regex = Regex::new(r"^\s*\d+[.)]\s+").unwrap();
}

// Always exactly `expected` answers, in question order
pub fn parse_batch_response(response: &str, expected: usize) -> Vec<String> {
    let mut answers = match split_on_markers(response, expected) {
        Some(answers) => answers,
        None => {
            warn!("No answer markers in batch response, falling back to heuristic split");
            split_heuristically(response, expected)
        }
    };

    answers.truncate(expected);
    answers.resize(expected, None);

    answers
        .into_iter()
        .enumerate()
        .map(|(i, answer)| {
            answer.unwrap_or_else(|| {
                debug!("No answer recovered for question {}", i + 1);
                FALLBACK_ANSWERS.inc();
                FALLBACK_ANSWER.to_string()
            })
        })
        .collect()
}

// None when the response contains no markers at all.
fn split_on_markers(response: &str, expected: usize) -> Option<Vec<Option<String>>> {
    let markers: Vec<_> = MARKER.captures_iter(response).collect();
    if markers.is_empty() {
        return None;
    }

    let mut answers = vec![None; expected];
    for (i, caps) in markers.iter().enumerate() {
        let whole = caps.get(0)?;
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(response.len(), |m| m.start());

        let Some(index) = caps[1].parse::<usize>().ok().filter(|n| (1..=expected).contains(n)) else {
            debug!("Ignoring out-of-range answer marker {}", &caps[0]);
            continue;
        };

        let slot = &mut answers[index - 1];
        if slot.is_some() {
            continue;
        }
        let text = response[whole.end()..end].trim();
        if !text.is_empty() {
            *slot = Some(text.to_string());
        }
    }
    Some(answers)
}

fn split_heuristically(response: &str, expected: usize) -> Vec<Option<String>> {
    let segments = non_empty_segments(&SEPARATOR_LINE, response);
    let segments = if segments.len() > 1 {
        segments
    } else {
        non_empty_segments(&BLANK_LINES, response)
    };

    segments
        .into_iter()
        .take(expected)
        .map(|s| Some(LEADING_ENUMERATION.replace(&s, "").trim().to_string()))
        .map(|s| s.filter(|s| !s.is_empty()))
        .collect()
}

fn non_empty_segments(splitter: &Regex, text: &str) -> Vec<String> {
    splitter
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_recover_payloads_in_order() {
        let response = "ANSWER_1: A\nANSWER_2: B\nANSWER_3: C";
        assert_eq!(parse_batch_response(response, 3), vec!["A", "B", "C"]);
    }

    #[test]
    fn payloads_may_span_lines_and_mention_answer() {
        let response = "Sure, here you go.\n\
            ANSWER_1: The ANSWER is in chapter two.\nIt continues here.\n\n\
            ANSWER_2: Another ANSWER: with a colon\n- bullet one\n- bullet two\n\n\
            ANSWER_3: as in MY_ANSWER_1: above, see ANSWER_2: too";
        let answers = parse_batch_response(response, 3);
        assert_eq!(
            answers,
            vec![
                "The ANSWER is in chapter two.\nIt continues here.",
                "Another ANSWER: with a colon\n- bullet one\n- bullet two",
                "as in MY_ANSWER_1: above, see ANSWER_2: too",
            ]
        );
    }

    #[test]
    fn markers_are_matched_by_index_not_position() {
        let response = "ANSWER_2: second\nANSWER_1: first";
        assert_eq!(parse_batch_response(response, 2), vec!["first", "second"]);
    }

    #[test]
    fn markdown_bold_markers_are_recognised() {
        let response = "**ANSWER_1:** bold one\n**ANSWER_2**: bold two";
        assert_eq!(parse_batch_response(response, 2), vec!["bold one", "bold two"]);
    }

    #[test]
    fn missing_and_extra_answers_are_normalised() {
        let response = "ANSWER_1: only one\nANSWER_7: out of range";
        assert_eq!(
            parse_batch_response(response, 3),
            vec!["only one", FALLBACK_ANSWER, FALLBACK_ANSWER]
        );

        let response = "ANSWER_1: a\nANSWER_2: b\nANSWER_3: c";
        assert_eq!(parse_batch_response(response, 2), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_marker_keeps_first_answer() {
        let response = "ANSWER_1: first\nANSWER_1: again";
        assert_eq!(parse_batch_response(response, 1), vec!["first"]);
    }

    #[test]
    fn unmarked_response_splits_on_blank_lines() {
        let response = "1. Paris is the capital.\n\n2) Berlin.\n\n";
        assert_eq!(
            parse_batch_response(response, 3),
            vec!["Paris is the capital.", "Berlin.", FALLBACK_ANSWER]
        );
    }

    #[test]
    fn leading_numbers_in_unmarked_answers_are_kept() {
        let response = "3.14 is the value of pi.\n\n2024: the year it shipped.\n\n3) listed item";
        assert_eq!(
            parse_batch_response(response, 3),
            vec!["3.14 is the value of pi.", "2024: the year it shipped.", "listed item"]
        );
    }

    #[test]
    fn indented_markers_are_recognised() {
        let response = "Answers:\n  ANSWER_1: one\n\t**ANSWER_2:** two";
        assert_eq!(parse_batch_response(response, 2), vec!["one", "two"]);
    }

    #[test]
    fn unmarked_response_prefers_separator_lines() {
        let response = "first part\n\nstill first\n---\nsecond part\n---\nthird\n---\nfourth";
        assert_eq!(
            parse_batch_response(response, 3),
            vec!["first part\n\nstill first", "second part", "third"]
        );
    }

    #[test]
    fn any_response_yields_exactly_expected_answers() {
        for response in ["", "   ", "no structure at all", "ANSWER_", "ANSWER_x: nope\n\n\n"] {
            for expected in 0..5 {
                assert_eq!(parse_batch_response(response, expected).len(), expected);
            }
        }
    }
}
