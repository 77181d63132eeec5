//! Lexical similarity stage of the AI Mapping Engine (spec.md §4.6).

use strsim::jaro_winkler;

/// Splits a field name on camelCase boundaries, `snake_case`/`kebab-case`
/// separators, and digit/letter boundaries, lowercasing every token.
pub fn tokenize(field_name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_is_lower = false;

    for ch in field_name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' || ch == '.' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_is_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_is_lower {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(ch.to_ascii_lowercase());
        prev_is_lower = ch.is_lowercase();
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Normalized token-overlap score in `[0, 1]`: the fraction of the smaller
/// token set found in the larger one, giving a baseline lexical signal
/// before the embedding stage runs (spec.md §4.6).
pub fn token_overlap_score(source_field: &str, target_field: &str) -> f64 {
    let source_tokens = tokenize(source_field);
    let target_tokens = tokenize(target_field);
    if source_tokens.is_empty() || target_tokens.is_empty() {
        return 0.0;
    }

    let overlap = source_tokens.iter().filter(|t| target_tokens.contains(t)).count();
    let smaller = source_tokens.len().min(target_tokens.len());
    overlap as f64 / smaller as f64
}

/// Secondary lexical signal: Jaro-Winkler similarity of the full,
/// untokenized field names.
pub fn jaro_winkler_score(source_field: &str, target_field: &str) -> f64 {
    jaro_winkler(&source_field.to_lowercase(), &target_field.to_lowercase())
}

/// Combined lexical score: token overlap weighted more heavily than the
/// whole-string Jaro-Winkler signal, since exact token matches are a much
/// stronger indicator than generic string similarity for field names.
pub fn lexical_score(source_field: &str, target_field: &str) -> f64 {
    0.7 * token_overlap_score(source_field, target_field) + 0.3 * jaro_winkler_score(source_field, target_field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_camel_case() {
        assert_eq!(tokenize("firstName"), vec!["first", "name"]);
    }

    #[test]
    fn tokenizes_snake_case() {
        assert_eq!(tokenize("first_name"), vec!["first", "name"]);
    }

    #[test]
    fn identical_tokens_score_one() {
        assert_eq!(token_overlap_score("first_name", "firstName"), 1.0);
    }

    #[test]
    fn disjoint_tokens_score_zero() {
        assert_eq!(token_overlap_score("patient_id", "gender"), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let score = token_overlap_score("birth_date", "date_of_birth");
        assert!(score > 0.0 && score < 1.0);
    }
}
