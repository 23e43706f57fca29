/// Object tags recognised in free-text image descriptions.
pub const VOCABULARY: &[&str] = &[
    "person", "people", "man", "woman", "child", "face", "animal", "dog", "cat", "bird", "horse",
    "pet", "food", "fruit", "meal", "landscape", "nature", "mountain", "beach", "tree", "forest",
    "sky", "sunset", "building", "architecture", "house", "city", "bridge", "text", "document",
    "sign", "vehicle", "car",
];

fn canonical(word: &str) -> Option<&'static str> {
    let irregular = match word {
        "men" => Some("man"),
        "women" => Some("woman"),
        "children" => Some("child"),
        "persons" => Some("person"),
        "faces" => Some("face"),
        "trees" => Some("tree"),
        "houses" => Some("house"),
        "cities" => Some("city"),
        _ => None,
    };
    if irregular.is_some() {
        return irregular;
    }

    VOCABULARY.iter().copied().find(|term| {
        word == *term
            || word.strip_suffix('s') == Some(*term)
            || word.strip_suffix("es") == Some(*term)
    })
}

/// Vocabulary terms mentioned in `description`, in order of first mention.
pub fn extract_objects(description: &str) -> Vec<String> {
    let lowered = description.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for word in lowered.split(|c: char| !c.is_alphabetic()) {
        if word.is_empty() {
            continue;
        }
        if let Some(term) = canonical(word) {
            if !found.iter().any(|f| f == term) {
                found.push(term.to_string());
            }
        }
    }
    found
}
