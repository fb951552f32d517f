use snafu::Snafu;
use std::io;
use std::path::PathBuf;

/// Possible errors from hook environment operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to execute '{}': {}", command, source))]
    ExecutionFailure { command: String, source: io::Error },

    #[snafu(display("'{}' failed - stderr: {}", command, stderr))]
    CommandFailure { command: String, stderr: String },

    #[snafu(display("Failed to write to stdin of '{}': {}", command, source))]
    CommandStdin { command: String, source: io::Error },

    #[snafu(display("Error deserializing output of '{}' as JSON: {}", command, source))]
    CommandJson {
        command: String,
        source: serde_json::Error,
    },

    #[snafu(display("Error serializing relation settings: {}", source))]
    SettingsSerialize { source: serde_json::Error },

    #[snafu(display("No relation id given and JUJU_RELATION_ID is not set"))]
    NoRelationContext,

    #[snafu(display("Unit has no private address"))]
    MissingPrivateAddress,

    #[snafu(display("Failed to read config store '{}': {}", path.display(), source))]
    ConfigRead { path: PathBuf, source: io::Error },

    #[snafu(display("Config store '{}' is not a JSON object: {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Error serializing config store: {}", source))]
    ConfigSerialize { source: serde_json::Error },

    #[snafu(display("Unable to create temporary file in '{}': {}", dir.display(), source))]
    CreateTempfile { dir: PathBuf, source: io::Error },

    #[snafu(display("Failed to write temporary file for '{}': {}", path.display(), source))]
    TempfileWrite { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to move temporary file into place at '{}': {}", path.display(), source))]
    PersistFile {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("Failed to set permissions on '{}': {}", path.display(), source))]
    SetPermissions { path: PathBuf, source: io::Error },

    #[snafu(display("Option '{}' is not valid YAML: {}", key, source))]
    OptionYaml {
        key: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Option '{}' must be a string or a list of strings", key))]
    OptionShape { key: String },

    #[snafu(display("Install sources ({}) and keys ({}) have different lengths", sources, keys))]
    SourcesKeysMismatch { sources: usize, keys: usize },

    #[snafu(display("Unknown cloud archive pocket '{}'", pocket))]
    CloudArchive { pocket: String },

    #[snafu(display("Failed to write apt source list '{}': {}", path.display(), source))]
    SourceListWrite { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to read '{}': {}", path.display(), source))]
    IniRead { path: PathBuf, source: io::Error },

    #[snafu(display("Invalid line {} in '{}': {}", line_number, path.display(), line))]
    IniSyntax {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    #[snafu(display("Failed to create directory '{}': {}", path.display(), source))]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[snafu(display("'{}' exists and is not a directory", path.display()))]
    NotADirectory { path: PathBuf },

    #[snafu(display("Failed to walk '{}': {}", path.display(), source))]
    WalkDirectory {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[snafu(display("Failed to copy '{}' to '{}': {}", from.display(), to.display(), source))]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[snafu(display("Error building copy destination: {}", source))]
    StripPrefix { source: std::path::StripPrefixError },

    #[snafu(display("Unable to determine the hook name from '{}'", arg))]
    HookName { arg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
