//! SmiGen: arbitration tree generator for SMI memory buses.

// # Tries to deny all lints (`rustc -W help`).
#![deny(absolute_paths_not_starting_with_crate)]
#![deny(anonymous_parameters)]
#![deny(explicit_outlives_requirements)]
#![deny(keyword_idents)]
#![deny(macro_use_extern_crate)]
#![deny(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![deny(rust_2018_idioms)]
#![deny(trivial_numeric_casts)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_extern_crates)]
#![deny(unused_import_braces)]
//
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::invalid_rust_codeblocks)]
#![deny(rustdoc::bare_urls)]
#![deny(unreachable_pub)]
//
#![allow(clippy::to_string_trait_impl)]

pub mod codegen;
pub mod model;
pub mod package;
pub mod synth;
pub mod utils;
pub mod vir;
pub mod virgen;

pub use codegen::{gen_module, Codegen, RenderError};
pub use model::*;
pub use package::{generate_arbitration_tree, Package, PackageError};
pub use synth::{arbitration_tree_module_name, synthesize, ScalingFactor, SynthError};
pub use utils::*;
pub use virgen::{render, Fragments, Virgen};
