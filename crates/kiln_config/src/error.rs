//! Error types for configuration loading and resolution.

/// Errors raised while loading `kiln.toml` or resolving build options.
///
/// Resolution errors abort compilation creation: they mean the user asked
/// for something the target cannot provide.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A non-default machine code model was requested without the LLVM
    /// back-end to honor it.
    #[error("machine code model '{model}' is only supported by the LLVM back-end")]
    MachineCodeModelNotSupported {
        /// The requested model name.
        model: String,
    },

    /// Static linking was requested but the configuration forces dynamic
    /// linking (system libraries, or libc on a target that ships it shared).
    #[error("static linking is not possible: {reason}")]
    UnableToStaticLink {
        /// Why the link must be dynamic.
        reason: String,
    },

    /// `pic = false` was requested but the target mandates
    /// position-independent code.
    #[error("target {target} requires position independent code")]
    TargetRequiresPic {
        /// The offending target triple.
        target: String,
    },

    /// Linking libc was requested but no installation was provided and the
    /// target's libc cannot be built from source.
    #[error("no C library installation available for target {target}")]
    LibcInstallationNotAvailable {
        /// The offending target triple.
        target: String,
    },

    /// The provided libc installation lacks the CRT directory needed to
    /// link executables.
    #[error("C library installation is missing its CRT directory")]
    LibcInstallationMissingCrtDir,

    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A required field is missing from the configuration file.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}
