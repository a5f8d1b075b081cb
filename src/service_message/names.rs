// src/service_message/names.rs

//! Message names and attribute keys scripts can emit

pub const SET_VARIABLE: &str = "setVariable";
pub const PROGRESS: &str = "progress";
pub const CREATE_ARTIFACT: &str = "createArtifact";
pub const RESULT_MESSAGE: &str = "resultMessage";
pub const CALAMARI_FOUND_PACKAGE: &str = "calamari-found-package";
pub const FOUND_PACKAGE: &str = "foundPackage";
pub const DELTA_VERIFICATION: &str = "deltaVerification";

/// Messages asking the orchestrator to create accounts or targets
///
/// The agent only collects them for the caller.
pub const SCRIPT_OUTPUT_ACTIONS: &[&str] = &[
    "create-tokenaccount",
    "create-userpassaccount",
    "create-awsaccount",
    "create-azureaccount",
    "create-azurecloudservicetarget",
    "create-azureservicefabrictarget",
    "create-azurewebapptarget",
    "create-kubernetestarget",
];

/// Attribute keys
pub mod attr {
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
    pub const SENSITIVE: &str = "sensitive";
    pub const PERCENTAGE: &str = "percentage";
    pub const MESSAGE: &str = "message";
    pub const PATH: &str = "path";
    pub const LENGTH: &str = "length";
    pub const ID: &str = "id";
    pub const VERSION: &str = "version";
    pub const VERSION_FORMAT: &str = "versionFormat";
    pub const HASH: &str = "hash";
    pub const REMOTE_PATH: &str = "remotePath";
    pub const FILE_EXTENSION: &str = "fileExtension";
    pub const SIZE: &str = "size";
    pub const ERROR: &str = "error";
}

/// Where a stream's plain lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    /// Log at this level
    Log(crate::log::LogLevel),
    /// Drop the line
    Ignore,
}

/// Every message name the sink acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    SetVariable,
    Progress,
    CreateArtifact,
    ResultMessage,
    CalamariFoundPackage,
    FoundPackage,
    DeltaVerification,
    /// `stdout-*`: route subsequent stdout lines
    Stdout(StreamTarget),
    /// `stderr-*`: route subsequent stderr lines
    Stderr(StreamTarget),
    /// One of [`SCRIPT_OUTPUT_ACTIONS`]
    ScriptOutputAction,
}

impl MessageKind {
    /// Recognize a message name (exact match)
    pub fn from_name(name: &str) -> Option<Self> {
        use crate::log::LogLevel;

        let kind = match name {
            SET_VARIABLE => Self::SetVariable,
            PROGRESS => Self::Progress,
            CREATE_ARTIFACT => Self::CreateArtifact,
            RESULT_MESSAGE => Self::ResultMessage,
            CALAMARI_FOUND_PACKAGE => Self::CalamariFoundPackage,
            FOUND_PACKAGE => Self::FoundPackage,
            DELTA_VERIFICATION => Self::DeltaVerification,
            "stdout-default" => Self::Stdout(StreamTarget::Log(LogLevel::Info)),
            "stdout-error" => Self::Stdout(StreamTarget::Log(LogLevel::Error)),
            "stdout-ignore" => Self::Stdout(StreamTarget::Ignore),
            "stdout-verbose" => Self::Stdout(StreamTarget::Log(LogLevel::Verbose)),
            "stdout-warning" => Self::Stdout(StreamTarget::Log(LogLevel::Warn)),
            "stdout-highlight" => Self::Stdout(StreamTarget::Log(LogLevel::Highlight)),
            "stdout-wait" => Self::Stdout(StreamTarget::Log(LogLevel::Wait)),
            "stderr-ignore" => Self::Stderr(StreamTarget::Ignore),
            "stderr-progress" => Self::Stderr(StreamTarget::Log(LogLevel::Verbose)),
            "stderr-error" | "stderr-default" => Self::Stderr(StreamTarget::Log(LogLevel::Error)),
            other if SCRIPT_OUTPUT_ACTIONS.contains(&other) => Self::ScriptOutputAction,
            _ => return None,
        };
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogLevel;

    #[test]
    fn test_from_name() {
        assert_eq!(MessageKind::from_name("setVariable"), Some(MessageKind::SetVariable));
        assert_eq!(MessageKind::from_name("SETVARIABLE"), None);
        assert_eq!(
            MessageKind::from_name("stdout-warning"),
            Some(MessageKind::Stdout(StreamTarget::Log(LogLevel::Warn)))
        );
        assert_eq!(
            MessageKind::from_name("create-kubernetestarget"),
            Some(MessageKind::ScriptOutputAction)
        );
        assert_eq!(MessageKind::from_name("somethingElse"), None);
    }
}
