// src/variables/names.rs

//! Well-known variable names
//!
//! These names are the data contract with the orchestrator that produces
//! variables files and the scripts that read them back, so they are kept
//! exactly as the orchestrator spells them.

/// Prefix for variables imported from the agent's environment
pub const ENVIRONMENT_PREFIX: &str = "env:";

/// Inline script body for run-script
pub const SCRIPT_BODY: &str = "Octopus.Action.Script.ScriptBody";

/// File name the inline script body is staged under
pub const SCRIPT_FILE_NAME: &str = "Octopus.Action.Script.ScriptFileName";

/// Syntax of the inline script (Bash, Python, PowerShell)
pub const SCRIPT_SYNTAX: &str = "Octopus.Action.Script.Syntax";

/// Extra command-line parameters passed to the script
pub const SCRIPT_PARAMETERS: &str = "Octopus.Action.Script.ScriptParameters";

/// Variables with this prefix are exported to the script environment
pub const SCRIPT_ENVIRONMENT_PREFIX: &str = "Octopus.Action.Script.Environment.";

/// Whether PreDeploy/Deploy/PostDeploy scripts in a package are run
pub const RUN_PACKAGE_SCRIPTS: &str = "Octopus.Action.Package.RunScripts";

/// Where the package was extracted
pub const INSTALLATION_DIRECTORY: &str = "Octopus.Action.Package.InstallationDirectoryPath";

/// Number of files extracted from the package
pub const EXTRACTED_FILE_COUNT: &str = "Package.ExtractedFileCount";

/// Enables `#{..}` substitution in target files
pub const SUBSTITUTE_IN_FILES_ENABLED: &str = "Octopus.Action.SubstituteInFiles.Enabled";

/// Newline-separated globs of files to substitute into
pub const SUBSTITUTE_IN_FILES_TARGETS: &str = "Octopus.Action.SubstituteInFiles.TargetFiles";

/// Result message set by the last `resultMessage` service message
pub const RESULT_MESSAGE: &str = "Octopus.Action.Script.ResultMessage";

/// Proxy settings the agent receives from its host, as imported environment variables
pub mod proxy {
    /// Use the system proxy
    pub const USE_DEFAULT: &str = "env:TentacleUseDefaultProxy";
    /// Custom proxy host
    pub const HOST: &str = "env:TentacleProxyHost";
    /// Custom proxy port
    pub const PORT: &str = "env:TentacleProxyPort";
    /// Custom proxy user name
    pub const USERNAME: &str = "env:TentacleProxyUsername";
    /// Custom proxy password
    pub const PASSWORD: &str = "env:TentacleProxyPassword";
}

/// Path to an extra plain variables file merged after the others
pub const ADDITIONAL_VARIABLES_PATH: &str = "AdditionalVariablesPath";

/// Account credentials used by steps that talk to remote services
pub mod account {
    /// Names the account whose `<account>.Username`/`.Password` are used
    pub const VARIABLE: &str = "Octopus.Action.Account.Variable";
    /// Prefix of directly supplied account credentials
    pub const PREFIX: &str = "Octopus.Action.Account";
    /// Resolved user name, for later steps
    pub const USERNAME: &str = "Octopus.Action.Account.Username";
    /// Resolved password, for later steps (sensitive)
    pub const PASSWORD: &str = "Octopus.Action.Account.Password";
    /// Agent environment variables consulted last
    pub const ENVIRONMENT_USERNAME: &str = "CONVEYOR_ACCOUNT_USERNAME";
    pub const ENVIRONMENT_PASSWORD: &str = "CONVEYOR_ACCOUNT_PASSWORD";
}
