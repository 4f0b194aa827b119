pub const CLASSIFY: &str = include_str!("../data/prompts/classify.txt");
pub const ANALYZE_SIMPLE: &str = include_str!("../data/prompts/analyze_simple.txt");
pub const ANALYZE_COMPLEX: &str = include_str!("../data/prompts/analyze_complex.txt");
pub const TUTOR_SYSTEM: &str = include_str!("../data/prompts/tutor_system.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_var() {
        assert_eq!(
            render("Hello {{name}}!", &[("name", "Maya")]),
            "Hello Maya!"
        );
    }

    #[test]
    fn test_render_repeated_var() {
        assert_eq!(
            render("{{a}} then {{a}}", &[("a", "ask")]),
            "ask then ask"
        );
    }

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(!CLASSIFY.is_empty());
        assert!(!ANALYZE_SIMPLE.is_empty());
        assert!(!ANALYZE_COMPLEX.is_empty());
        assert!(!TUTOR_SYSTEM.is_empty());
    }

    #[test]
    fn test_complex_prompt_asks_for_rich_fields() {
        for field in ["rootCause", "stepByStep", "visualAid", "focusAreas"] {
            assert!(ANALYZE_COMPLEX.contains(field), "missing {}", field);
            assert!(!ANALYZE_SIMPLE.contains(field), "unexpected {}", field);
        }
    }

    #[test]
    fn test_tutor_system_has_placeholders() {
        for key in ["{{name}}", "{{grade}}", "{{problem}}", "{{marker}}"] {
            assert!(TUTOR_SYSTEM.contains(key), "missing {}", key);
        }
    }
}
