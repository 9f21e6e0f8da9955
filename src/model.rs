//! Structural axiom model for the OWL 2 EL fragment.
//!
//! This is the input vocabulary of the reasoner: plain owned values that can be
//! built in code or deserialized from JSON. The index turns them into canonical
//! shared nodes; nothing here is interned.

use serde::{Deserialize, Serialize};

/// IRI of the top class.
pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
/// IRI of the bottom class.
pub const OWL_NOTHING: &str = "http://www.w3.org/2002/07/owl#Nothing";

/// A typed data literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: String,
}

/// Data ranges admitted in `DataSomeValuesFrom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRange {
    Datatype(String),
    LengthRestriction {
        datatype: String,
        #[serde(default)]
        min_length: Option<u32>,
        #[serde(default)]
        max_length: Option<u32>,
    },
}

/// Class expressions of the EL profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassExpression {
    Class(String),
    Thing,
    Nothing,
    IntersectionOf(Vec<ClassExpression>),
    SomeValuesFrom {
        property: String,
        filler: Box<ClassExpression>,
    },
    HasValue {
        property: String,
        individual: String,
    },
    OneOf(String),
    DataHasValue {
        property: String,
        literal: Literal,
    },
    DataSomeValuesFrom {
        property: String,
        range: DataRange,
    },
}

impl ClassExpression {
    pub fn class(iri: impl Into<String>) -> Self {
        Self::Class(iri.into())
    }

    pub fn and(operands: impl IntoIterator<Item = ClassExpression>) -> Self {
        Self::IntersectionOf(operands.into_iter().collect())
    }

    pub fn some(property: impl Into<String>, filler: ClassExpression) -> Self {
        Self::SomeValuesFrom {
            property: property.into(),
            filler: Box::new(filler),
        }
    }

    pub fn has_value(property: impl Into<String>, individual: impl Into<String>) -> Self {
        Self::HasValue {
            property: property.into(),
            individual: individual.into(),
        }
    }

    pub fn nominal(individual: impl Into<String>) -> Self {
        Self::OneOf(individual.into())
    }
}

/// Object property expressions: a named property or a composition chain.
/// Chains are only meaningful as the sub-property of `SubObjectPropertyOf`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyExpression {
    Property(String),
    Chain(Vec<String>),
}

impl PropertyExpression {
    pub fn named(iri: impl Into<String>) -> Self {
        Self::Property(iri.into())
    }

    pub fn chain(properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Chain(properties.into_iter().map(Into::into).collect())
    }
}

/// Declarable entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Class(String),
    ObjectProperty(String),
    NamedIndividual(String),
}

/// Logical axioms understood by the reasoner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axiom {
    Declaration(Entity),
    SubClassOf {
        sub: ClassExpression,
        sup: ClassExpression,
    },
    EquivalentClasses(Vec<ClassExpression>),
    DisjointClasses(Vec<ClassExpression>),
    ClassAssertion {
        class: ClassExpression,
        individual: String,
    },
    ObjectPropertyAssertion {
        property: String,
        subject: String,
        object: String,
    },
    SubObjectPropertyOf {
        sub: PropertyExpression,
        sup: String,
    },
    EquivalentObjectProperties(Vec<String>),
    TransitiveObjectProperty(String),
}

impl Axiom {
    /// `SubClassOf` between two named classes.
    pub fn sub_class_of(sub: impl Into<String>, sup: impl Into<String>) -> Self {
        Self::SubClassOf {
            sub: ClassExpression::class(sub),
            sup: ClassExpression::class(sup),
        }
    }

    /// `DisjointClasses` over named classes.
    pub fn disjoint(classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::DisjointClasses(classes.into_iter().map(ClassExpression::class).collect())
    }

    /// `EquivalentClasses` over arbitrary expressions.
    pub fn equivalent(classes: impl IntoIterator<Item = ClassExpression>) -> Self {
        Self::EquivalentClasses(classes.into_iter().collect())
    }

    /// Whether this axiom affects the object property hierarchy.
    pub fn is_property_axiom(&self) -> bool {
        matches!(
            self,
            Self::SubObjectPropertyOf { .. }
                | Self::EquivalentObjectProperties(_)
                | Self::TransitiveObjectProperty(_)
        )
    }

    /// Short name of the axiom type, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Declaration(_) => "Declaration",
            Self::SubClassOf { .. } => "SubClassOf",
            Self::EquivalentClasses(_) => "EquivalentClasses",
            Self::DisjointClasses(_) => "DisjointClasses",
            Self::ClassAssertion { .. } => "ClassAssertion",
            Self::ObjectPropertyAssertion { .. } => "ObjectPropertyAssertion",
            Self::SubObjectPropertyOf { .. } => "SubObjectPropertyOf",
            Self::EquivalentObjectProperties(_) => "EquivalentObjectProperties",
            Self::TransitiveObjectProperty(_) => "TransitiveObjectProperty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_axioms_are_recognized() {
        assert!(Axiom::TransitiveObjectProperty("partOf".into()).is_property_axiom());
        assert!(
            Axiom::SubObjectPropertyOf {
                sub: PropertyExpression::chain(["hasParent", "hasBrother"]),
                sup: "hasUncle".into(),
            }
            .is_property_axiom()
        );
        assert!(!Axiom::sub_class_of("A", "B").is_property_axiom());
    }

    #[test]
    fn axioms_deserialize_from_json() {
        let json = r#"[
            {"sub_class_of": {"sub": {"class": "A"}, "sup": {"some_values_from": {"property": "r", "filler": "thing"}}}},
            {"disjoint_classes": [{"class": "A"}, {"class": "B"}]},
            {"class_assertion": {"class": {"class": "A"}, "individual": "a"}}
        ]"#;
        let axioms: Vec<Axiom> = serde_json::from_str(json).unwrap();
        assert_eq!(axioms.len(), 3);
        assert_eq!(
            axioms[0],
            Axiom::SubClassOf {
                sub: ClassExpression::class("A"),
                sup: ClassExpression::some("r", ClassExpression::Thing),
            }
        );
        assert_eq!(axioms[1], Axiom::disjoint(["A", "B"]));
    }
}
