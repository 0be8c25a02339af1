//! Typed facts about a subject.
//!
//! A [`Fact`] is one assertion about the subject a descriptor is grounded
//! on. Entity names inside facts are short names, resolved against the same
//! store as the subject. Facts are totally ordered so fact sets iterate in a
//! stable order.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A set of facts. Duplicates collapse.
pub type FactSet = BTreeSet<Fact>;

/// The four fact kinds a descriptor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactKind {
    /// Subject is an instance of a class.
    Type,
    /// Subject is linked to another individual through an object property.
    ObjectRelation,
    /// Subject is linked to a literal through a data property.
    DataRelation,
    /// Subject (a class) is a subclass of another class.
    SubClassOf,
}

impl FactKind {
    /// Every kind, in declaration order.
    pub const ALL: [FactKind; 4] = [
        FactKind::Type,
        FactKind::ObjectRelation,
        FactKind::DataRelation,
        FactKind::SubClassOf,
    ];

    /// Whether facts of this kind point at another subject.
    pub fn is_relational(self) -> bool {
        !matches!(self, FactKind::DataRelation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FactKind::Type => "type",
            FactKind::ObjectRelation => "object-relation",
            FactKind::DataRelation => "data-relation",
            FactKind::SubClassOf => "subclass-of",
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown fact kind \"{s}\""))
    }
}

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// Datatype of a literal.
///
/// The common XSD types get their own variant; anything else keeps its IRI
/// so literals written by other tools read back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Datatype {
    String,
    Integer,
    Double,
    Boolean,
    Decimal,
    Float,
    /// `rdf:langString`; the tag lives on the [`Literal`].
    LangString,
    Other(String),
}

impl Datatype {
    /// The datatype IRI.
    pub fn iri(&self) -> &str {
        match self {
            Datatype::String => "http://www.w3.org/2001/XMLSchema#string",
            Datatype::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            Datatype::Double => "http://www.w3.org/2001/XMLSchema#double",
            Datatype::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            Datatype::Decimal => "http://www.w3.org/2001/XMLSchema#decimal",
            Datatype::Float => "http://www.w3.org/2001/XMLSchema#float",
            Datatype::LangString => RDF_LANG_STRING,
            Datatype::Other(iri) => iri,
        }
    }

    /// Map a datatype IRI back to a datatype. `iri(from_iri(x)) == x` for
    /// every IRI.
    pub fn from_iri(iri: &str) -> Self {
        if iri == RDF_LANG_STRING {
            return Datatype::LangString;
        }
        match iri.strip_prefix(XSD) {
            Some("string") => Datatype::String,
            Some("integer") => Datatype::Integer,
            Some("double") => Datatype::Double,
            Some("boolean") => Datatype::Boolean,
            Some("decimal") => Datatype::Decimal,
            Some("float") => Datatype::Float,
            _ => Datatype::Other(iri.to_string()),
        }
    }
}

/// A typed literal kept in its lexical form, so it can be ordered and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: String,
    datatype: Datatype,
    #[serde(default)]
    language: Option<String>,
}

impl Literal {
    pub fn new(lexical: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
            language: None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value, Datatype::String)
    }

    /// A language-tagged string (`"Flur"@de`). Tags are lowercased, as RDF
    /// stores normalize them.
    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: value.into(),
            datatype: Datatype::LangString,
            language: Some(language.into().to_ascii_lowercase()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Self::new(value.to_string(), Datatype::Integer)
    }

    pub fn double(value: f64) -> Self {
        Self::new(value.to_string(), Datatype::Double)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value.to_string(), Datatype::Boolean)
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Parse as an integer, if the datatype says it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self.datatype {
            Datatype::Integer => self.lexical.parse().ok(),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self.datatype {
            Datatype::Double | Datatype::Float | Datatype::Decimal | Datatype::Integer => {
                self.lexical.parse().ok()
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.datatype {
            Datatype::Boolean => self.lexical.parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.datatype, &self.language) {
            (Datatype::LangString, Some(lang)) => write!(f, "\"{}\"@{lang}", self.lexical),
            (Datatype::String, _) => write!(f, "\"{}\"", self.lexical),
            (Datatype::Other(iri), _) => write!(f, "\"{}\"^^<{iri}>", self.lexical),
            _ => write!(f, "{}", self.lexical),
        }
    }
}

/// One typed assertion about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fact {
    /// Subject is-a `class`.
    Type { class: String },
    /// Subject --`property`--> `target`.
    ObjectRelation { property: String, target: String },
    /// Subject --`property`--> literal `value`.
    DataRelation { property: String, value: Literal },
    /// Subject (a class) is a subclass of `class`.
    SubClassOf { class: String },
}

impl Fact {
    pub fn of_type(class: impl Into<String>) -> Self {
        Fact::Type {
            class: class.into(),
        }
    }

    pub fn object(property: impl Into<String>, target: impl Into<String>) -> Self {
        Fact::ObjectRelation {
            property: property.into(),
            target: target.into(),
        }
    }

    pub fn data(property: impl Into<String>, value: Literal) -> Self {
        Fact::DataRelation {
            property: property.into(),
            value,
        }
    }

    pub fn sub_class_of(class: impl Into<String>) -> Self {
        Fact::SubClassOf {
            class: class.into(),
        }
    }

    pub fn kind(&self) -> FactKind {
        match self {
            Fact::Type { .. } => FactKind::Type,
            Fact::ObjectRelation { .. } => FactKind::ObjectRelation,
            Fact::DataRelation { .. } => FactKind::DataRelation,
            Fact::SubClassOf { .. } => FactKind::SubClassOf,
        }
    }

    /// The property of a relation fact.
    pub fn property(&self) -> Option<&str> {
        match self {
            Fact::ObjectRelation { property, .. } | Fact::DataRelation { property, .. } => {
                Some(property)
            }
            _ => None,
        }
    }

    /// The other subject this fact points at, if any.
    ///
    /// Targets of object relations are individuals; the classes of type and
    /// subclass facts are classes. Data relations point at literals, not
    /// subjects.
    pub fn related(&self) -> Option<&str> {
        match self {
            Fact::Type { class } | Fact::SubClassOf { class } => Some(class),
            Fact::ObjectRelation { target, .. } => Some(target),
            Fact::DataRelation { .. } => None,
        }
    }

    /// Whether two facts occupy the same slot (same kind and property).
    ///
    /// Used by singleton replacement: a new value evicts every fact in the slot.
    pub fn same_slot(&self, other: &Fact) -> bool {
        self.kind() == other.kind() && self.property() == other.property()
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fact::Type { class } => write!(f, "∈ {class}"),
            Fact::ObjectRelation { property, target } => write!(f, "{property} → {target}"),
            Fact::DataRelation { property, value } => write!(f, "{property} = {value}"),
            Fact::SubClassOf { class } => write!(f, "⊑ {class}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_of_each_variant() {
        assert_eq!(Fact::of_type("Robot").kind(), FactKind::Type);
        assert_eq!(
            Fact::object("isIn", "Corridor1").kind(),
            FactKind::ObjectRelation
        );
        assert_eq!(
            Fact::data("hasBattery", Literal::integer(80)).kind(),
            FactKind::DataRelation
        );
        assert_eq!(Fact::sub_class_of("Location").kind(), FactKind::SubClassOf);
    }

    #[test]
    fn duplicate_facts_collapse() {
        let mut set = FactSet::new();
        set.insert(Fact::object("isIn", "Corridor1"));
        set.insert(Fact::object("isIn", "Corridor1"));
        set.insert(Fact::of_type("Robot"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn related_subjects() {
        assert_eq!(Fact::object("isIn", "Corridor1").related(), Some("Corridor1"));
        assert_eq!(Fact::of_type("Robot").related(), Some("Robot"));
        assert_eq!(Fact::data("name", Literal::string("r1")).related(), None);
    }

    #[test]
    fn same_slot_depends_on_property() {
        let a = Fact::object("isIn", "Corridor1");
        let b = Fact::object("isIn", "Room1");
        let c = Fact::object("isLinkedTo", "Room1");
        assert!(a.same_slot(&b));
        assert!(!a.same_slot(&c));
        assert!(Fact::of_type("A").same_slot(&Fact::of_type("B")));
    }

    #[test]
    fn kind_parse_and_display() {
        for kind in FactKind::ALL {
            assert_eq!(kind.to_string().parse::<FactKind>().unwrap(), kind);
        }
        assert!("nonsense".parse::<FactKind>().is_err());
        assert!(!FactKind::DataRelation.is_relational());
    }

    #[test]
    fn literal_accessors() {
        assert_eq!(Literal::integer(42).as_integer(), Some(42));
        assert_eq!(Literal::boolean(true).as_bool(), Some(true));
        assert_eq!(Literal::double(0.5).as_double(), Some(0.5));
        assert_eq!(Literal::string("x").as_integer(), None);
        assert_eq!(
            Datatype::from_iri(Datatype::Integer.iri()),
            Datatype::Integer
        );
        assert_eq!(Literal::new("1.5", Datatype::Decimal).as_double(), Some(1.5));
    }

    #[test]
    fn datatype_iri_is_preserved() {
        for iri in [
            "http://www.w3.org/2001/XMLSchema#decimal",
            "http://www.w3.org/2001/XMLSchema#float",
            "http://www.w3.org/2001/XMLSchema#int",
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString",
            "http://example.org#custom",
        ] {
            assert_eq!(Datatype::from_iri(iri).iri(), iri);
        }
        assert_eq!(Datatype::from_iri("http://www.w3.org/2001/XMLSchema#float"), Datatype::Float);
        assert_ne!(
            Literal::new("1.5", Datatype::Decimal),
            Literal::new("1.5", Datatype::Double)
        );
    }

    #[test]
    fn language_tag_is_part_of_the_literal() {
        let de = Literal::lang_string("Flur", "DE");
        assert_eq!(de.language(), Some("de"));
        assert_eq!(de.to_string(), "\"Flur\"@de");
        assert_ne!(de, Literal::lang_string("Flur", "en"));
        assert_ne!(de, Literal::string("Flur"));
    }

    #[test]
    fn fact_json_is_tagged() {
        let json = serde_json::to_string(&Fact::object("isIn", "Corridor1")).unwrap();
        assert!(json.contains("\"object-relation\""));
        let back: Fact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Fact::object("isIn", "Corridor1"));
    }
}
