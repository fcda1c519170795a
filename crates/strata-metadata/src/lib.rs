//! Strata Metadata
//!
//! This crate provides the data contracts used when resolving pipeline
//! artifacts at execution time:
//!
//! - [`Execution`] records as persisted by the metadata store, with their
//!   loosely-typed [`PropertyValue`] custom properties
//! - [`TaskGraph`] snapshots mapping task names to executions
//! - [`OutputArtifactsMapping`] and [`ArtifactSelector`], the serialized
//!   indirections carried by composite (DAG) executions
//! - [`OutputArtifact`] records produced by leaf executions and the
//!   [`RuntimeArtifact`] descriptor they convert into
//!
//! The [`ArtifactReader`] trait is the narrow read contract against the
//! metadata store. Implementations live with the store; this crate ships an
//! in-memory reader and a JSON file reader.

mod artifact;
mod error;
mod execution;
mod graph;
mod property;
mod reader;
mod selector;

pub use artifact::{Artifact, ArtifactSchema, ConversionError, OutputArtifact, RuntimeArtifact};
pub use error::Error;
pub use execution::{
  CONTAINER_EXECUTION, DAG_EXECUTION, Execution, ExecutionType, IMPORTER_EXECUTION,
  MappingError, OUTPUT_ARTIFACTS_PROPERTY,
};
pub use graph::{GraphError, TaskGraph};
pub use property::PropertyValue;
pub use reader::{ArtifactReader, InMemoryArtifactReader, JsonFileArtifactReader};
pub use selector::{ArtifactSelector, DagOutputArtifactSpec, OutputArtifactsMapping};
