// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # el-classifier
//!
//! A concurrent, consequence-based classifier for the OWL 2 EL profile.
//!
//! ## Architecture
//!
//! - **Axiom model** (`model`): structural axioms and class expressions, serde ready
//! - **Ontology index** (`index`): hash-consed expressions, occurrence counts, rule chains
//! - **Saturation** (`saturation`): per-root contexts saturated by a parallel engine,
//!   with retraction for delete/rederive maintenance
//! - **Stages** (`stages`): dependency-ordered, restartable units of work
//! - **Taxonomy** (`taxonomy`): transitive reduction, realization, validation
//! - **Reasoner** (`reasoner`): the facade tying it together
//!
//! ## Library usage
//!
//! ```no_run
//! use el_classifier::config::ReasonerConfig;
//! use el_classifier::model::{Axiom, ClassExpression};
//! use el_classifier::reasoner::Reasoner;
//!
//! let mut reasoner = Reasoner::new(ReasonerConfig::default()).unwrap();
//! reasoner.add_axiom(&Axiom::sub_class_of("Dog", "Mammal")).unwrap();
//! reasoner
//!     .add_axiom(&Axiom::SubClassOf {
//!         sub: ClassExpression::class("Mammal"),
//!         sup: ClassExpression::some("hasPart", ClassExpression::class("Spine")),
//!     })
//!     .unwrap();
//! let supers = reasoner.super_classes("Dog", true).unwrap();
//! assert!(supers.contains("Mammal"));
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod interrupt;
pub mod model;
pub mod provenance;
pub mod reasoner;
pub mod saturation;
pub mod stages;
pub mod taxonomy;

pub use config::ReasonerConfig;
pub use error::{ReasonerError, ReasonerResult};
pub use interrupt::InterruptHandle;
pub use reasoner::Reasoner;
pub use taxonomy::{InstanceTaxonomy, Taxonomy};
