//! Validation of the `city` query parameter.

/// Longest accepted city name, in characters, after trimming.
pub const MAX_CITY_LEN: usize = 100;

/// Check a city name and return every rule it breaks.
///
/// An empty vector means the name is acceptable. Rules are evaluated on the
/// trimmed input and are not short-circuited, so a caller sees all problems
/// at once.
pub fn validate_city(city: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let trimmed = city.trim();

    if trimmed.is_empty() {
        problems.push("city cannot be empty".to_string());
    }

    if trimmed.chars().count() > MAX_CITY_LEN {
        problems.push("city name is too long".to_string());
    }

    if trimmed.chars().any(|c| !c.is_alphabetic() && !c.is_whitespace()) {
        problems.push("city contains invalid characters".to_string());
    }

    problems
}
