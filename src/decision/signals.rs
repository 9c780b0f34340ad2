use super::games::contains_keyword;

pub fn is_question(text: &str, openers: &[String]) -> bool {
    if text.contains('?') {
        return true;
    }
    let first = text
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .unwrap_or_default();
    openers.iter().any(|o| o.eq_ignore_ascii_case(first))
}

pub fn gaming_keyword<'a>(text: &str, keywords: &'a [String]) -> Option<&'a str> {
    keywords
        .iter()
        .find(|kw| contains_keyword(text, kw))
        .map(String::as_str)
}

/// Returns the first marker found in the model reply, case-insensitively.
pub fn spam_flag<'a>(reply: &str, markers: &'a [String]) -> Option<&'a str> {
    let upper = reply.to_uppercase();
    markers
        .iter()
        .find(|m| upper.contains(&m.to_uppercase()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Decision;

    #[test]
    fn test_question_detection() {
        let d = Decision::default();
        assert!(is_question("Anyone have Valorant Jett tips?", &d.question_openers));
        assert!(is_question("how do you hold b site on ascent", &d.question_openers));
        assert!(is_question("What. A. Clutch.", &d.question_openers));
        assert!(!is_question("Just hit diamond", &d.question_openers));
        assert!(!is_question("", &d.question_openers));
    }

    #[test]
    fn test_gaming_keyword() {
        let d = Decision::default();
        assert_eq!(
            gaming_keyword("new patch nerfed my main", &d.gaming_keywords),
            Some("patch")
        );
        assert_eq!(gaming_keyword("lunch was great", &d.gaming_keywords), None);
    }

    #[test]
    fn test_spam_flag_is_case_insensitive() {
        let d = Decision::default();
        assert_eq!(spam_flag("No, this is off-topic", &d.spam_markers), Some("OFF-TOPIC"));
        assert_eq!(spam_flag("NO - not gaming related", &d.spam_markers), Some("NOT GAMING"));
        assert_eq!(spam_flag("NO thanks", &d.spam_markers), None);
    }
}
