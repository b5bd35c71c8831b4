//! Writes generated modules to the file system.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::codegen::RenderError;
use crate::model::TreeConfig;
use crate::synth::{synthesize, ScalingFactor, SynthError};
use crate::virgen::{render, Fragments};

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("cannot open {path:?}: {error}")]
    SinkOpen { path: PathBuf, error: io::Error },

    #[error("cannot write {path:?}: {error}")]
    Write { path: PathBuf, error: io::Error },

    #[error("module {0} is contained in the package more than once")]
    DuplicateModule(String),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Package of arbitration tree modules sharing one set of fragments.
#[derive(Debug, Default)]
pub struct Package {
    /// Modules.
    pub trees: Vec<TreeConfig>,

    fragments: Fragments,
}

impl Package {
    /// Creates new package rendered with the given fragments.
    pub fn new(fragments: Fragments) -> Self { Self { trees: Vec::new(), fragments } }

    /// Adds the given module to package.
    pub fn add(&mut self, tree: TreeConfig) { self.trees.push(tree); }

    /// Synthesizes an arbitration tree and adds it to the package.
    pub fn add_tree(
        &mut self, module_name: &str, num_clients: usize, scaling: ScalingFactor,
    ) -> Result<(), PackageError> {
        self.add(synthesize(module_name, num_clients, scaling)?);
        Ok(())
    }

    /// Renders every module, without touching the file system.
    pub fn render(&self) -> Result<Vec<(String, String)>, PackageError> {
        let mut names = HashSet::new();
        self.trees
            .iter()
            .map(|tree| {
                if !names.insert(tree.module_name.as_str()) {
                    return Err(PackageError::DuplicateModule(tree.module_name.clone()));
                }
                Ok((tree.module_name.clone(), render(&self.fragments, tree)?))
            })
            .collect()
    }

    /// Generates Verilog code at the given directory path, one `{module_name}.v` file per module.
    ///
    /// All modules are rendered before the first file is created, so a rendering error leaves the directory
    /// untouched. If a file cannot be written, the files already written by this call are removed again. Returns the
    /// paths of the written files.
    pub fn gen_vir<P: AsRef<Path>>(&self, path_dir: P) -> Result<Vec<PathBuf>, PackageError> {
        let modules = self.render()?;

        let path_dir = path_dir.as_ref();
        fs::create_dir_all(path_dir).map_err(|error| PackageError::SinkOpen { path: path_dir.to_path_buf(), error })?;

        let mut written: Vec<PathBuf> = Vec::with_capacity(modules.len());
        for (name, text) in modules {
            let path = path_dir.join(format!("{}.v", name));
            if let Err(error) = write_artifact(&path, &text) {
                for path in &written {
                    remove_artifact(path);
                }
                return Err(error);
            }
            written.push(path);
        }

        Ok(written)
    }
}

/// Writes `text` to a new file at `path`. A file that could not be written completely is removed.
fn write_artifact(path: &Path, text: &str) -> Result<(), PackageError> {
    info!("writing {}", path.display());
    let mut file = File::create(path).map_err(|error| PackageError::SinkOpen { path: path.to_path_buf(), error })?;

    if let Err(error) = file.write_all(text.as_bytes()).and_then(|()| file.flush()) {
        drop(file);
        remove_artifact(path);
        return Err(PackageError::Write { path: path.to_path_buf(), error });
    }

    Ok(())
}

fn remove_artifact(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        warn!("cannot remove {}: {}", path.display(), error);
    }
}

/// Generates an SMI memory arbitration tree module with `num_clients` client ports and writes it to `path`.
///
/// Client side flits are 8 bytes wide; the server side is `scaling_factor` times wider, for a scaling factor of 1,
/// 2, 4 or 8. Nothing is written unless the module is synthesized and rendered successfully.
pub fn generate_arbitration_tree<P: AsRef<Path>>(
    path: P, module_name: &str, num_clients: usize, scaling_factor: usize,
) -> Result<(), PackageError> {
    let scaling = ScalingFactor::try_from(scaling_factor)?;
    let config = synthesize(module_name, num_clients, scaling)?;
    let text = render(&Fragments::default(), &config)?;
    write_artifact(path.as_ref(), &text)
}
