use console::style;
use std::fmt;
use streetmetrics_core::error::{ErrorKind, StreetmetricsError};

/// Error with remediation hints, printed instead of the bare error chain
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self, json: bool) {
        if json {
            let output = serde_json::json!({
                "status": "error",
                "message": self.message,
                "context": self.context,
                "suggestions": self.suggestions,
            });
            eprintln!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            return;
        }

        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Create error for database connection failure
pub fn database_connection_failed(error: &str) -> CliError {
    CliError::new("Cannot connect to PostgreSQL")
        .with_context(format!("DATABASE_URL is not set or connection failed.\n\nError: {}", error))
        .with_suggestion(
            "Set DATABASE_URL: export DATABASE_URL=\"postgresql://localhost/streetmetrics\"",
        )
        .with_suggestion("Or run against the in-memory store: --storage memory")
        .with_help("Run: streetmetrics --help")
}

/// Create error for a district the store does not know
pub fn district_not_found(id: u64) -> CliError {
    CliError::new(format!("District {} not found", id))
        .with_context("The district is not in the store or has never been refreshed.")
        .with_suggestion("List known districts: streetmetrics status")
        .with_suggestion(
            "Refresh it first: streetmetrics refresh --districts <PATH> --roads <PATH>",
        )
        .with_help("Run: streetmetrics refresh --help")
}

/// Create error for invalid configuration
pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check streetmetrics.toml and STREETMETRICS_* environment variables")
        .with_suggestion("Show effective values: streetmetrics inspect config")
        .with_help("Run: streetmetrics inspect config --help")
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let error = match error.downcast::<CliError>() {
        Ok(cli_error) => return cli_error,
        Err(error) => error,
    };

    if let Some(domain) = error.chain().find_map(|e| e.downcast_ref::<StreetmetricsError>()) {
        match (domain.kind(), domain) {
            (_, StreetmetricsError::ConfigInvalid { key, reason }) => {
                return invalid_config(key, reason);
            }
            (ErrorKind::Infrastructure, _) => {
                return CliError::new("Store unavailable")
                    .with_context(format!("Error: {:#}", error))
                    .with_suggestion("Check that the database is reachable and retry the batch");
            }
            _ => {}
        }
    }

    let message = format!("{:#}", error);
    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check the file path and try again")
    } else if message.contains("Connection refused") || message.contains("could not connect") {
        database_connection_failed(&message)
    } else {
        CliError::new(message)
    }
}
