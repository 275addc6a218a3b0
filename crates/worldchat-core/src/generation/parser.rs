//! Model output to per-agent utterances

use crate::storage::Agent;

/// One line attributed to a group member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub agent_id: String,
    pub agent_name: String,
    pub content: String,
}

/// Split `raw` into utterances by speaker-name prefix
///
/// Each non-blank line is attributed to the first member, in membership order,
/// whose name prefixes the line case-insensitively. The name and exactly one
/// separator character are stripped and the remainder trimmed. Lines with no
/// matching member or no content are dropped.
pub fn parse_response(raw: &str, members: &[Agent]) -> Vec<Utterance> {
    raw.split('\n')
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            members.iter().find_map(|member| {
                let rest = strip_name_prefix(line, &member.name)?;
                Some((member, rest))
            })
        })
        .filter_map(|(member, rest)| {
            let content = skip_one_char(rest).trim();
            if content.is_empty() {
                return None;
            }
            Some(Utterance {
                agent_id: member.id.clone(),
                agent_name: member.name.clone(),
                content: content.to_string(),
            })
        })
        .collect()
}

/// Remainder of `line` after a case-insensitive `name` prefix
fn strip_name_prefix<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }

    let mut line_chars = line.char_indices();
    for expected in name.chars() {
        let (_, actual) = line_chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }

    let offset = line_chars.next().map(|(i, _)| i).unwrap_or(line.len());
    Some(&line[offset..])
}

fn skip_one_char(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next();
    chars.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            is_public: false,
            created_at: Utc::now(),
            user_id: None,
        }
    }

    #[test]
    fn test_parses_named_lines_and_drops_garbage() {
        let members = vec![agent("a1", "Alice"), agent("b1", "Bob")];
        let utterances = parse_response("Alice: hello\nBob: hi there\ngarbage line", &members);

        assert_eq!(
            utterances,
            vec![
                Utterance {
                    agent_id: "a1".into(),
                    agent_name: "Alice".into(),
                    content: "hello".into(),
                },
                Utterance {
                    agent_id: "b1".into(),
                    agent_name: "Bob".into(),
                    content: "hi there".into(),
                },
            ]
        );
    }

    #[test]
    fn test_zero_matches_is_empty() {
        let members = vec![agent("a1", "Alice")];
        assert!(parse_response("The wind howls.\n\n  \nNobody speaks.", &members).is_empty());
        assert!(parse_response("", &members).is_empty());
        assert!(parse_response("Alice: hi", &[]).is_empty());
    }

    #[test]
    fn test_case_insensitive_and_any_separator() {
        let members = vec![agent("z1", "Zed")];
        let utterances = parse_response("zed： 你好\nZED - waves\r\n", &members);

        assert_eq!(utterances.len(), 2);
        assert_eq!(utterances[0].content, "你好");
        assert_eq!(utterances[1].content, "- waves");
    }

    #[test]
    fn test_first_member_wins_on_prefix_collision() {
        let members = vec![agent("al", "Al"), agent("alice", "Alice")];
        let utterances = parse_response("Alice: hi", &members);

        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].agent_id, "al");
        assert_eq!(utterances[0].content, "ce: hi");

        let reordered = vec![agent("alice", "Alice"), agent("al", "Al")];
        let utterances = parse_response("Alice: hi", &reordered);
        assert_eq!(utterances[0].agent_id, "alice");
        assert_eq!(utterances[0].content, "hi");
    }

    #[test]
    fn test_empty_content_is_dropped() {
        let members = vec![agent("a1", "Alice")];
        assert!(parse_response("Alice:\nAlice:   \nAlice", &members).is_empty());
    }

    #[test]
    fn test_leading_whitespace_does_not_match() {
        let members = vec![agent("a1", "Alice")];
        assert!(parse_response("  Alice: hi", &members).is_empty());
    }

    #[test]
    fn test_multibyte_names() {
        let members = vec![agent("l1", "李白")];
        let utterances = parse_response("李白：举杯邀明月", &members);
        assert_eq!(utterances[0].content, "举杯邀明月");
    }
}
