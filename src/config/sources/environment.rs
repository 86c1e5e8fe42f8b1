//! Environment variable source: MOLDSTORE_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "MOLDSTORE";

/// Add environment variable overlay to builder.
/// Uses MOLDSTORE_ prefix and __ as separator for nested keys, e.g.
/// `MOLDSTORE__STORE__GITHUB__REPO`. CORS origins accept a comma-separated list.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("server.cors_allowed_origins"),
    )
}
