//! Rich diagnostic error types for the classifier.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. An inconsistent ontology is not an
//! error: it is reported through satisfiability flags and the taxonomy.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the classifier.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasonerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Saturation(#[from] SaturationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl ReasonerError {
    /// Whether this error is a cooperative interruption that can be resumed.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Saturation(SaturationError::Interrupted { .. }))
    }
}

// ---------------------------------------------------------------------------
// Indexing errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IndexingError {
    #[error("structural hash collision between `{first}` and `{second}` (hash {hash:#018x})")]
    #[diagnostic(
        code(el::index::hash_collision),
        help(
            "Conjunctions are binarized by ordering their operands by structural hash. \
             Two distinct operands share a hash, so the canonical order is ambiguous and \
             indexing was aborted before anything was committed. Rename one of the \
             classes involved or report the collision."
        )
    )]
    HashCollision {
        first: String,
        second: String,
        hash: u64,
    },

    #[error("empty intersection of class expressions")]
    #[diagnostic(
        code(el::index::empty_intersection),
        help("ObjectIntersectionOf needs at least one operand; use owl:Thing for an empty conjunction.")
    )]
    EmptyIntersection,

    #[error("empty object property chain")]
    #[diagnostic(
        code(el::index::empty_chain),
        help("A property chain on the left of SubObjectPropertyOf needs at least one property.")
    )]
    EmptyPropertyChain,
}

/// Result type for indexing operations.
pub type IndexingResult<T> = std::result::Result<T, IndexingError>;

// ---------------------------------------------------------------------------
// Saturation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SaturationError {
    #[error("saturation interrupted during stage `{stage}`")]
    #[diagnostic(
        code(el::saturation::interrupted),
        help(
            "The computation was cancelled through its interrupt handle. Contexts are left \
             in a resumable state: clear the interrupt and call the operation again."
        )
    )]
    Interrupted { stage: &'static str },

    #[error("failed to build the worker pool: {message}")]
    #[diagnostic(
        code(el::saturation::thread_pool),
        help("Check the `workers` setting; the operating system refused to spawn the threads.")
    )]
    ThreadPool { message: String },
}

/// Result type for saturation operations.
pub type SaturationResult<T> = std::result::Result<T, SaturationError>;

// ---------------------------------------------------------------------------
// Taxonomy errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TaxonomyError {
    #[error("taxonomy contains a cycle through node `{node}`")]
    #[diagnostic(
        code(el::taxonomy::cycle),
        help("Equivalent classes must collapse into one node; a cycle means the reduction is broken.")
    )]
    Cycle { node: String },

    #[error("redundant direct edge `{sub}` -> `{redundant}`, already implied through `{via}`")]
    #[diagnostic(
        code(el::taxonomy::redundant_edge),
        help("Direct super-nodes must be minimal: no direct super may be reachable from another.")
    )]
    RedundantEdge {
        sub: String,
        redundant: String,
        via: String,
    },

    #[error("asymmetric link between `{node}` and `{other}`")]
    #[diagnostic(
        code(el::taxonomy::link_mismatch),
        help("Every direct super-node link must be mirrored by a direct sub-node link.")
    )]
    LinkMismatch { node: String, other: String },

    #[error("indexed class `{class}` is missing from the taxonomy")]
    #[diagnostic(
        code(el::taxonomy::missing_class),
        help("Every indexed class must belong to exactly one taxonomy node.")
    )]
    MissingClass { class: String },

    #[error("class `{class}` belongs to more than one taxonomy node")]
    #[diagnostic(
        code(el::taxonomy::duplicate_member),
        help("Taxonomy nodes are equivalence classes and must be pairwise disjoint.")
    )]
    DuplicateMember { class: String },

    #[error("node index for `{class}` points to a node that does not contain it")]
    #[diagnostic(
        code(el::taxonomy::index_mismatch),
        help("The class-to-node lookup table is out of sync with node members.")
    )]
    IndexMismatch { class: String },
}

/// Result type for taxonomy operations.
pub type TaxonomyResult<T> = std::result::Result<T, TaxonomyError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(el::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}")]
    #[diagnostic(
        code(el::config::write),
        help("Check that the parent directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(el::config::parse),
        help("The config file must be valid TOML with the fields of `ReasonerConfig`.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(el::config::invalid),
        help("Check the ReasonerConfig fields against their documented ranges.")
    )]
    Invalid { message: String },
}

/// Convenience alias for functions returning classifier results.
pub type ReasonerResult<T> = std::result::Result<T, ReasonerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_error_converts_to_reasoner_error() {
        let err = IndexingError::EmptyIntersection;
        let top: ReasonerError = err.into();
        assert!(matches!(top, ReasonerError::Indexing(IndexingError::EmptyIntersection)));
    }

    #[test]
    fn interruption_is_recognized() {
        let top: ReasonerError = SaturationError::Interrupted { stage: "saturation" }.into();
        assert!(top.is_interrupted());

        let other: ReasonerError = ConfigError::Invalid {
            message: "workers must be > 0".into(),
        }
        .into();
        assert!(!other.is_interrupted());
    }

    #[test]
    fn collision_message_names_both_operands() {
        let err = IndexingError::HashCollision {
            first: "A".into(),
            second: "B".into(),
            hash: 42,
        };
        let msg = format!("{err}");
        assert!(msg.contains("`A`"));
        assert!(msg.contains("`B`"));
        assert!(msg.contains("0x000000000000002a"));
    }
}
