//! Ties the passes together: parse a source file into routine graphs, lower
//! them to assembly and write the result next to the input (or into an
//! output directory).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    backend::{
        targets::{CodeGenerator, Target},
        CodegenOptions,
    },
    diagnostics::Diagnostics,
    frontend::{
        parser::{parse_program, Program},
        SourceFile, SourceFileOrigin,
    },
    middle::pretty_print::pretty_print_routine,
};

/// Upper bounds on the size of a compilation. Crossing one is reported as a
/// diagnostic instead of exhausting memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Live nodes per routine graph
    pub max_nodes: usize,
    /// Live variable bindings per routine
    pub max_bindings: usize,
    pub max_routines: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nodes: 1 << 20,
            max_bindings: 1 << 16,
            max_routines: 1 << 12,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub limits: Limits,
    pub codegen: CodegenOptions,
    /// Print every routine graph to stdout after parsing
    pub dump_ir: bool,
}

#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub diagnostics: Diagnostics,
    /// Only produced when there were no diagnostics
    pub assembly: Option<String>,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("could not read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("`{}` failed to compile with {count} error(s)", path.display())]
    Compilation { path: PathBuf, count: usize },
}

pub fn compile_source(source: &SourceFile, options: &CompileOptions) -> Compilation {
    let (program, diagnostics) = parse_program(source, options);

    if options.dump_ir {
        for routine in &program.routines {
            pretty_print_routine(&routine.name, &routine.body.graph, routine.body.end);
        }
    }

    let assembly = diagnostics.is_empty().then(|| {
        Target::x86_64LinuxGnu
            .get_code_generator()
            .translate_to_asm(&program, &options.codegen)
    });

    Compilation {
        program,
        diagnostics,
        assembly,
    }
}

/// Where the assembly for `path` is written: `<stem>.asm` inside
/// `output_directory`, or next to the source
pub fn output_path(path: &Path, output_directory: Option<&Path>) -> PathBuf {
    let file_name = Path::new(path.file_stem().unwrap_or(path.as_os_str())).with_extension("asm");

    match output_directory {
        Some(directory) => directory.join(file_name),
        None => path.with_file_name(file_name),
    }
}

/// Compiles one file. Diagnostics are printed to stderr as they are found;
/// the assembly is only written when there were none.
pub fn compile_file(
    path: &Path,
    output_directory: Option<&Path>,
    options: &CompileOptions,
) -> Result<PathBuf, DriverError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DriverError::Read {
        path: path.to_owned(),
        source,
    })?;

    let source = SourceFile {
        contents,
        origin: SourceFileOrigin::File(path.to_owned()),
    };

    let compilation = compile_source(&source, options);
    compilation.diagnostics.report(&source);

    let Some(assembly) = compilation.assembly else {
        return Err(DriverError::Compilation {
            path: path.to_owned(),
            count: compilation.diagnostics.len(),
        });
    };

    let output = output_path(path, output_directory);
    std::fs::write(&output, assembly).map_err(|source| DriverError::Write {
        path: output.clone(),
        source,
    })?;

    log::info!("wrote {}", output.display());

    Ok(output)
}
