use crate::config::DEFAULT_ALT_NAME_TYPE;
use crate::models::Citation;
use once_cell::sync::Lazy;
use regex::Regex;

/// `Given /Surname/ Suffix`, slashes optional on the closing side.
static SLASHED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<given>[^/]*)/(?P<surname>[^/]*)/?(?P<suffix>.*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameKind {
    Primary,
    /// Secondary name with its display type, e.g. "Married Name".
    Alternate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub kind: NameKind,
    pub given: Option<String>,
    pub surname: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub note_citations: Vec<Citation>,
    pub source_citations: Vec<Citation>,
}

impl Name {
    pub fn primary() -> Self {
        Self::with_kind(NameKind::Primary)
    }

    pub fn alternate(name_type: &str) -> Self {
        Self::with_kind(NameKind::Alternate(name_type.to_string()))
    }

    fn with_kind(kind: NameKind) -> Self {
        Self {
            kind,
            given: None,
            surname: None,
            prefix: None,
            suffix: None,
            note_citations: Vec::new(),
            source_citations: Vec::new(),
        }
    }

    /// Element name the serializer prints this name under.
    pub fn tag(&self) -> &'static str {
        match self.kind {
            NameKind::Primary => "name",
            NameKind::Alternate(_) => "alt_name",
        }
    }

    pub fn name_type(&self) -> Option<&str> {
        match &self.kind {
            NameKind::Primary => None,
            NameKind::Alternate(t) => Some(t),
        }
    }

    pub fn set_type(&mut self, name_type: &str) {
        if let NameKind::Alternate(t) = &mut self.kind {
            *t = name_type.to_string();
        }
    }

    /// Sets given/surname from a raw GEDCOM name value.
    ///
    /// A whitespace-free alternate name is a bare given name; everything else
    /// goes through the full split.
    pub fn set_name(&mut self, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }
        if matches!(self.kind, NameKind::Alternate(_)) && !raw.chars().any(char::is_whitespace) {
            self.given = Some(raw.to_string());
            return;
        }
        self.parse_full(raw);
    }

    fn parse_full(&mut self, raw: &str) {
        if let Some(caps) = SLASHED_NAME.captures(raw) {
            self.given = non_empty(&caps["given"]);
            self.surname = non_empty(&caps["surname"]);
            if let Some(suffix) = non_empty(&caps["suffix"]) {
                self.suffix = Some(suffix);
            }
            return;
        }

        let mut tokens: Vec<&str> = raw.split_whitespace().collect();
        self.surname = tokens.pop().map(str::to_string);
        self.given = if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" "))
        };
    }

    pub fn set_given(&mut self, given: &str) {
        if let Some(given) = non_empty(given) {
            self.given = Some(given);
        }
    }

    pub fn set_surname(&mut self, surname: &str) {
        if let Some(surname) = non_empty(surname) {
            self.surname = Some(surname);
        }
    }

    /// SPFX: "van", "de la", ... in front of the surname.
    pub fn add_surname_prefix(&mut self, prefix: &str) {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return;
        }
        self.surname = Some(match self.surname.take() {
            Some(surname) if !surname.starts_with(prefix) => format!("{} {}", prefix, surname),
            Some(surname) => surname,
            None => prefix.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.given.is_none() && self.surname.is_none()
    }
}

/// Maps a NAME.TYPE value onto the alternate-name label.
pub fn alternate_type_label(value: &str) -> &'static str {
    match value.trim().to_ascii_lowercase().as_str() {
        "married" | "married name" | "_marnm" => "Married Name",
        "nickname" | "nick" => "Nickname",
        "birth" | "maiden" => "Birth Name",
        _ => DEFAULT_ALT_NAME_TYPE,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_single_token_is_given() {
        let mut name = Name::alternate(DEFAULT_ALT_NAME_TYPE);
        name.set_name("Bob");
        assert_eq!(name.given.as_deref(), Some("Bob"));
        assert_eq!(name.surname, None);
    }

    #[test]
    fn alternate_with_whitespace_is_fully_parsed() {
        let mut name = Name::alternate(DEFAULT_ALT_NAME_TYPE);
        name.set_name("Bob Smith");
        assert_eq!(name.given.as_deref(), Some("Bob"));
        assert_eq!(name.surname.as_deref(), Some("Smith"));
    }

    #[test]
    fn alternate_hyphenated_token_stays_given() {
        let mut name = Name::alternate("Married Name");
        name.set_name("Smith-Jones");
        assert_eq!(name.given.as_deref(), Some("Smith-Jones"));
        assert_eq!(name.surname, None);
    }

    #[test]
    fn primary_single_token_is_surname() {
        let mut name = Name::primary();
        name.set_name("Bob");
        assert_eq!(name.given, None);
        assert_eq!(name.surname.as_deref(), Some("Bob"));
    }

    #[test]
    fn slashed_name_with_suffix() {
        let mut name = Name::primary();
        name.set_name("John Henry /Smith/ Jr.");
        assert_eq!(name.given.as_deref(), Some("John Henry"));
        assert_eq!(name.surname.as_deref(), Some("Smith"));
        assert_eq!(name.suffix.as_deref(), Some("Jr."));
    }

    #[test]
    fn slashed_surname_only() {
        let mut name = Name::primary();
        name.set_name("/Smith/");
        assert_eq!(name.given, None);
        assert_eq!(name.surname.as_deref(), Some("Smith"));
    }

    #[test]
    fn tag_discriminates_kind() {
        assert_eq!(Name::primary().tag(), "name");
        let alt = Name::alternate("Nickname");
        assert_eq!(alt.tag(), "alt_name");
        assert_eq!(alt.name_type(), Some("Nickname"));
        assert_eq!(Name::primary().name_type(), None);
    }

    #[test]
    fn set_type_ignores_primary() {
        let mut name = Name::primary();
        name.set_type("Married Name");
        assert_eq!(name.kind, NameKind::Primary);
    }

    #[test]
    fn surname_prefix_prepends_once() {
        let mut name = Name::primary();
        name.set_name("Jan /Berg/");
        name.add_surname_prefix("van");
        assert_eq!(name.surname.as_deref(), Some("van Berg"));
        name.add_surname_prefix("van");
        assert_eq!(name.surname.as_deref(), Some("van Berg"));
    }

    #[test]
    fn type_labels() {
        assert_eq!(alternate_type_label("married"), "Married Name");
        assert_eq!(alternate_type_label("AKA"), DEFAULT_ALT_NAME_TYPE);
        assert_eq!(alternate_type_label("nickname"), "Nickname");
    }
}
