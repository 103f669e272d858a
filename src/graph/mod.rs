//! Schema and the mutable in-memory graph it describes.

pub mod mutable_graph;
pub mod schema;

pub use mutable_graph::MutableGraph;
pub use schema::{EdgeTripletSchema, Schema, SchemaBuilder, VertexLabelSchema};
