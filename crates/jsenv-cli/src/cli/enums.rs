use clap::ValueEnum;
use jsenv_bundler::{BuildFormat, SourcemapMode};

/// Module format of the built JavaScript.
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Format {
    /// ECMAScript modules
    #[value(name = "esmodule", alias = "esm")]
    EsModule,

    /// System.register modules, needs a format plugin
    #[value(name = "systemjs")]
    SystemJs,

    /// Classic script assigning globals, needs a format plugin
    #[value(name = "global", alias = "iife")]
    Global,

    /// CommonJS, needs a format plugin
    #[value(name = "commonjs", alias = "cjs")]
    CommonJs,
}

impl Format {
    /// Name used in `jsenv.toml`.
    pub fn as_config_str(&self) -> &'static str {
        BuildFormat::from(*self).as_str()
    }
}

impl From<Format> for BuildFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::EsModule => BuildFormat::EsModule,
            Format::SystemJs => BuildFormat::SystemJs,
            Format::Global => BuildFormat::Global,
            Format::CommonJs => BuildFormat::CommonJs,
        }
    }
}

/// Sourcemap output of a build.
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum SourcemapArg {
    /// No sourcemaps
    #[value(name = "none")]
    None,

    /// Embedded as a data: URL
    #[value(name = "inline")]
    Inline,

    /// Written next to each file as <file>.map
    #[value(name = "file")]
    File,
}

impl SourcemapArg {
    pub fn as_config_str(&self) -> &'static str {
        match self {
            SourcemapArg::None => "none",
            SourcemapArg::Inline => "inline",
            SourcemapArg::File => "file",
        }
    }
}

impl From<SourcemapArg> for SourcemapMode {
    fn from(mode: SourcemapArg) -> Self {
        match mode {
            SourcemapArg::None => SourcemapMode::None,
            SourcemapArg::Inline => SourcemapMode::Inline,
            SourcemapArg::File => SourcemapMode::File,
        }
    }
}
