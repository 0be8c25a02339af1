// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ontoloop
//!
//! Ontology descriptors: a local buffer of typed facts about one subject,
//! reconciled with an external fact store only when the caller asks.
//!
//! ## Architecture
//!
//! - **Descriptors** (`descriptor`): buffer, read, write, query, and build
//!   related descriptors; bounded BFS traversal over relations
//! - **Fact model** (`fact`, `subject`): typed facts, literals, IRIs
//! - **Buffers and intents** (`buffer`, `sync`): per-kind fact sets and the
//!   diff every synchronization computes
//! - **Stores** (`store`): the `FactStore` trait, an in-memory adapter with
//!   redb snapshots, and an oxigraph RDF adapter
//! - **Reasoning** (`reason`): class hierarchy closure (petgraph) plus
//!   functional-property and disjoint-class checks
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ontoloop::descriptor::Descriptor;
//! use ontoloop::fact::{Fact, FactKind};
//! use ontoloop::store::MemFactStore;
//!
//! let store = Arc::new(MemFactStore::new("owloopTest", "http://www.example.org/owloopTest"));
//! let mut robot = Descriptor::individual("Robot1", Arc::clone(&store));
//! robot.add_fact(Fact::of_type("Robot")).unwrap();
//! robot.add_fact(Fact::object("isIn", "Corridor1")).unwrap();
//! robot.write_semantic().unwrap();
//!
//! let mut copy = Descriptor::individual("Robot1", store);
//! copy.read_semantic().unwrap();
//! assert_eq!(copy.facts(FactKind::Type).len(), 1);
//! ```

pub mod buffer;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod fact;
pub mod reason;
pub mod store;
pub mod subject;
pub mod sync;
