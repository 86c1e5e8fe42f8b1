//! TOML file source.

use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::Path;

/// Add a TOML file to the builder; `required` controls whether it must exist.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        File::from(path)
            .format(FileFormat::Toml)
            .required(required),
    )
}
