/*!
Renders a crate's `README.md` from the rustdoc at the top of its `src/main.rs` or `src/lib.rs`.
The crates in this workspace call it from their `build.rs`, with a `README.tpl` next to it.

Set `SKIP_README` in the environment to leave the README alone.
*/

use snafu::ResultExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, error::Error>;

pub mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Failed to render README from '{}': {}", file.display(), message))]
        Render { file: PathBuf, message: String },

        #[snafu(display("Failed to open '{}': {}", file.display(), source))]
        SourceOpen {
            file: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Failed to open README template '{}': {}", TEMPLATE, source))]
        TemplateOpen { source: std::io::Error },

        #[snafu(display("Failed to write '{}': {}", README, source))]
        ReadmeWrite { source: std::io::Error },
    }

    pub(super) const TEMPLATE: &str = "README.tpl";
    pub(super) const README: &str = "README.md";
}

/// Renders `README.md` from the docs of `src/main.rs`.
pub fn from_main() -> Result<()> {
    from_file("src/main.rs")
}

/// Renders `README.md` from the docs of `src/lib.rs`.
pub fn from_lib() -> Result<()> {
    from_file("src/lib.rs")
}

/// Renders `README.md` next to `build.rs` from the crate-level docs in `rust_file`, using
/// `README.tpl` as the template.
pub fn from_file<P>(rust_file: P) -> Result<()>
where
    P: AsRef<Path>,
{
    if std::env::var_os("SKIP_README").is_some() {
        return Ok(());
    }
    let rust_file = rust_file.as_ref();

    let mut source = File::open(rust_file).context(error::SourceOpenSnafu { file: rust_file })?;
    let mut template = File::open(error::TEMPLATE).context(error::TemplateOpenSnafu)?;

    // Title, badges and license come from the template, so only heading indentation is asked for.
    let mut content = cargo_readme::generate_readme(
        &PathBuf::from("."),
        &mut source,
        Some(&mut template),
        true,
        false,
        false,
        true,
    )
    .map_err(|message| {
        error::RenderSnafu {
            file: rust_file,
            message,
        }
        .build()
    })?;

    if !content.ends_with('\n') {
        content.push('\n');
    }
    fs::write(error::README, content).context(error::ReadmeWriteSnafu)
}
