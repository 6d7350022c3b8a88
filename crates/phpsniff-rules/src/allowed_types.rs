//! Types accepted in `@var` docblock annotations

/// Built-in types accepted in docblocks
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "array", "boolean", "float", "integer", "mixed", "object", "string", "resource", "callable",
];

/// Ordered, duplicate-free list of allowed type names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedTypes {
    types: Vec<String>,
}

impl AllowedTypes {
    pub fn defaults() -> Self {
        Self {
            types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Append types not already present, keeping their order
    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in extra {
            let name = name.as_ref().trim();
            if !name.is_empty() && !self.contains(name) {
                self.types.push(name.to_string());
            }
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Whether every alternative of an annotation like `string|int[]` is
    /// allowed; array suffixes and a leading `?` are ignored
    pub fn accepts(&self, annotation: &str) -> bool {
        let annotation = annotation.trim().trim_start_matches('?');
        !annotation.is_empty()
            && annotation
                .split('|')
                .map(|part| part.trim().trim_end_matches("[]"))
                .all(|part| self.contains(part))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for AllowedTypes {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_types_are_appended_once() {
        let types = AllowedTypes::defaults().with_extra(["int", "bool", "string", "int"]);
        assert_eq!(types.len(), DEFAULT_ALLOWED_TYPES.len() + 2);
        assert_eq!(types.iter().last(), Some("bool"));
        assert!(types.contains("int"));
    }

    #[test]
    fn test_defaults_are_not_shared() {
        let extended = AllowedTypes::defaults().with_extra(["int"]);
        assert!(extended.contains("int"));
        assert!(!AllowedTypes::defaults().contains("int"));
    }

    #[test]
    fn test_accepts_annotations() {
        let types = AllowedTypes::defaults().with_extra(["int"]);
        assert!(types.accepts("string"));
        assert!(types.accepts("?int"));
        assert!(types.accepts("string|integer[]"));
        assert!(!types.accepts("bool"));
        assert!(!types.accepts("string|Foo"));
        assert!(!types.accepts(""));
    }
}
