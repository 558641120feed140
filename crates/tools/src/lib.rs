//! Graph tooling for GraphWeaver.
//!
//! - `builtin`: the hand-authored graph tools and their phases
//! - `schema`: tool synthesis from the storage service's API description
//! - `catalog`: TTL-cached snapshot of everything offered to the model
//! - `dispatch`: routes a tool call to its executor
//! - `graph_lock`: one writer per graph document at a time
//! - `truncate`: bounds tool results before they re-enter the conversation

pub mod builtin;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod graph;
pub mod graph_lock;
pub mod schema;
pub mod template;
pub mod truncate;

pub use builtin::{phase_of, BuiltinTool, GraphTools, Phase};
pub use catalog::{CatalogSnapshot, DescriptionSource, ToolCatalog, ToolOrigin};
pub use context::{ProgressNote, ToolContext};
pub use dispatch::ToolDispatcher;
pub use graph::GraphClient;
pub use template::TemplateStore;
pub use truncate::Truncator;
