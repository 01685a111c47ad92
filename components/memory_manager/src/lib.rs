//! Memory Manager - Garbage collector and heap management
//!
//! This component provides:
//! - A typed object heap addressed by `ObjectRef` handles
//! - Tri-color incremental marking with bounded work slices
//! - A Dijkstra-style write barrier for mutation during marking
//! - Root set tracking and collection statistics

pub mod heap;
pub mod marking;
pub mod trace;

// Re-export main types
pub use heap::{GcStats, Heap, HeapConfig, IncrementalConfig, RootSet};
pub use marking::{AtomicMarkColor, GcPhase, MarkColor, MarkStack};
pub use trace::{Trace, Visitor};
