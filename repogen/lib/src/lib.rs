//! Generates MongoDB repositories from annotated schema structs.
//!
//! For every struct in a [`PluginRequest`] two Rust files are produced under
//! `<out_dir>/<dao_dir>/<package>/`:
//!
//! - `<name>_repo_mongo.rs`: a `<Name>RepoMongo` struct over a
//!   `mongodb::Collection` with one method per catalogue operation
//! - `<name>_repo_doc.rs`: the `<Name>Repository` trait listing the same
//!   operations plus any declared or hand-written methods, and its `impl`
//!   for `<Name>RepoMongo` (both files are expected to be sibling modules)
//!
//! When both files already exist the run is an update. Methods added to the
//! interface by hand are carried into the regenerated trait verbatim, and
//! the implementation keeps its previous text unchanged, only gaining
//! bodies for methods it did not have.
//!
//! ## Pipeline
//!
//! ```text
//! PluginRequest ─► args ─► extract ─► planner ─► render ─► imports ─► PluginResponse
//!                            │
//!                            └─ existing (prior interface file)
//! ```
//!
//! ## Examples
//!
//! ```no_run
//! use repogen_lib::{PluginRequest, handle_request};
//!
//! let request: PluginRequest = serde_json::from_str(r#"{
//!     "parameters": ["out_dir=.", "gen_base=true"],
//!     "structs": [{
//!         "name": "Video",
//!         "package": "video",
//!         "fields": [{"name": "title", "type": "String", "tag": "index=true"}]
//!     }]
//! }"#).unwrap();
//!
//! let response = handle_request(&request);
//! assert!(response.error.is_none());
//! ```

pub mod args;
pub mod driver;
pub mod error;
pub mod existing;
pub mod extract;
pub mod imports;
pub mod model;
pub mod naming;
pub mod output;
pub mod planner;
pub mod render;
pub mod request;
pub mod tools;

pub use args::{Arguments, Formatter};
pub use driver::{Generator, handle_request, run};
pub use error::{RepogenError, Result, ToolError};
pub use output::{write_all_or_nothing, write_atomic};
pub use request::{GeneratedFile, PluginRequest, PluginResponse, RawField, RawStruct};
