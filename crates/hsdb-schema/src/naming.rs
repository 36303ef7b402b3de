//! Resource naming: model names to kebab-case singular and plural forms.

use convert_case::{Case, Casing};

/// Kebab-case resource name of a model (`CourseSection` -> `course-section`).
pub fn resource_name(model_name: &str) -> String {
    model_name.to_case(Case::Kebab)
}

/// Pluralize the last segment of a kebab-case name.
pub fn pluralize(name: &str) -> String {
    let (head, last) = match name.rfind('-') {
        Some(pos) => name.split_at(pos + 1),
        None => ("", name),
    };
    format!("{head}{}", pluralize_word(last))
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        let vowel_before = stem
            .chars()
            .last()
            .map_or(false, |c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'));
        if !stem.is_empty() && !vowel_before {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}
