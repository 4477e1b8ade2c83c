//! Username Classification and Glob Matching
//!
//! Decides which usernames belong to the operator (and may be reaped) and
//! matches ACL username patterns the way the Aiven control plane expands them.

use regex::Regex;
use std::sync::LazyLock;

/// Usernames minted by the operator: `<team>_<app>_<x>_<rest>` or anything dotted
static OPERATOR_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"^[^_]+_[^_]+_[^_]+_.+").expect("operator username pattern is valid"),
        Regex::new(r"\.").expect("legacy username pattern is valid"),
    ]
});

/// Whether a username is subject to automated cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameClass {
    OperatorManaged,
    Unmanaged,
}

/// Classify a username against the fixed operator patterns
pub fn classify(username: &str) -> UsernameClass {
    if OPERATOR_PATTERNS.iter().any(|p| p.is_match(username)) {
        UsernameClass::OperatorManaged
    } else {
        UsernameClass::Unmanaged
    }
}

pub fn is_operator_managed(username: &str) -> bool {
    classify(username) == UsernameClass::OperatorManaged
}

/// Team scoping is a plain prefix filter; no team means everything is in scope
pub fn in_team_scope(username: &str, team: Option<&str>) -> bool {
    match team {
        Some(team) if !team.is_empty() => username.starts_with(team),
        _ => true,
    }
}

/// True when the pattern has no wildcard or character class
pub fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '['])
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::AnyRun => false,
            Token::Class { negated, ranges } => {
                let hit = ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi);
                hit != *negated
            }
        }
    }
}

/// A compiled shell-style pattern
///
/// `*` matches any run of characters, `?` exactly one, `[...]` a character
/// class (`[!...]` negated, `a-z` ranges). Matching is anchored at both ends
/// and case-sensitive; `/` has no special meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    tokens: Vec<Token>,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        Self {
            tokens: tokenize(pattern),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let value: Vec<char> = candidate.chars().collect();
        let tokens = &self.tokens;

        let (mut ti, mut vi) = (0, 0);
        // Backtrack point for the most recent `*`
        let mut star: Option<usize> = None;
        let mut resume = 0;

        while vi < value.len() {
            match tokens.get(ti) {
                Some(Token::AnyRun) => {
                    star = Some(ti);
                    resume = vi;
                    ti += 1;
                    continue;
                }
                Some(t) if t.matches(value[vi]) => {
                    ti += 1;
                    vi += 1;
                    continue;
                }
                _ => {}
            }

            match star {
                Some(s) => {
                    ti = s + 1;
                    resume += 1;
                    vi = resume;
                }
                None => return false,
            }
        }

        tokens[ti..].iter().all(|t| *t == Token::AnyRun)
    }
}

/// Match `candidate` against a shell-style `pattern`
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    if is_literal(pattern) {
        return pattern == candidate;
    }
    Glob::new(pattern).matches(candidate)
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if tokens.last() != Some(&Token::AnyRun) {
                    tokens.push(Token::AnyRun);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '[' => match parse_class(&chars, i + 1) {
                Some((class, next)) => {
                    tokens.push(class);
                    i = next;
                }
                // Unterminated class is a literal bracket
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }

    tokens
}

fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut j = start;
    let negated = chars.get(j) == Some(&'!');
    if negated {
        j += 1;
    }

    let body_start = j;
    // A leading `]` is a member, not the terminator
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    if j >= chars.len() {
        return None;
    }

    let body = &chars[body_start..j];
    let mut ranges = Vec::new();
    let mut k = 0;
    while k < body.len() {
        if k + 2 < body.len() && body[k + 1] == '-' {
            ranges.push((body[k], body[k + 2]));
            k += 3;
        } else {
            ranges.push((body[k], body[k]));
            k += 1;
        }
    }

    Some((Token::Class { negated, ranges }, j + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_operator_usernames() {
        assert_eq!(classify("team_app_a_b_consumer"), UsernameClass::OperatorManaged);
        assert_eq!(classify("aura_dataproduct_f0a1_9c"), UsernameClass::OperatorManaged);
        assert_eq!(classify("orphan.user"), UsernameClass::OperatorManaged);
        assert_eq!(classify("avnadmin"), UsernameClass::Unmanaged);
        assert_eq!(classify("team_app_x"), UsernameClass::Unmanaged);
        // Fourth segment must be non-empty
        assert_eq!(classify("team_app_x_"), UsernameClass::Unmanaged);
        assert!(!is_operator_managed("_app_x_y"));
    }

    #[test]
    fn test_team_scope() {
        assert!(in_team_scope("aura_app_x_y", Some("aura")));
        assert!(!in_team_scope("teamb_app_x_y", Some("aura")));
        assert!(in_team_scope("teamb_app_x_y", None));
        assert!(in_team_scope("teamb_app_x_y", Some("")));
    }

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("test", "test"));
        assert!(!glob_match("test", "testing"));
        assert!(!glob_match("Test", "test"));
    }

    #[test]
    fn test_glob_match_star() {
        assert!(glob_match("team_app_*", "team_app_a_b_consumer"));
        assert!(glob_match("*", ""));
        assert!(glob_match("*_consumer", "team_app_a_b_consumer"));
        assert!(glob_match("team_*_b_*", "team_app_a_b_consumer"));
        assert!(!glob_match("team_app_*", "other_app_a"));
        assert!(glob_match("a/*", "a/b/c"));
    }

    #[test]
    fn test_glob_match_single_char() {
        assert!(glob_match("user-?", "user-1"));
        assert!(!glob_match("user-?", "user-12"));
        assert!(!glob_match("user-?", "user-"));
    }

    #[test]
    fn test_glob_match_classes() {
        assert!(glob_match("app[0-9]", "app7"));
        assert!(!glob_match("app[0-9]", "appx"));
        assert!(glob_match("app[!0-9]", "appx"));
        assert!(glob_match("x[]]", "x]"));
        assert!(glob_match("x[a-]", "x-"));
        // Unterminated bracket is literal
        assert!(glob_match("x[ab", "x[ab"));
        assert!(!glob_match("x[ab", "xa"));
    }

    #[test]
    fn test_literal_detection() {
        assert!(is_literal("team_app_a_b"));
        assert!(!is_literal("team_*"));
        assert!(!is_literal("team_?"));
        assert!(!is_literal("team_[ab]"));
    }
}
