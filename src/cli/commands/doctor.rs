//! Doctor command - verify configuration and API access.

use crate::cli::Output;
use crate::config::Settings;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    hint: Option<String>,
}

#[derive(Debug, PartialEq)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Fortell Doctor");
    println!();

    let mut checks = Vec::new();

    println!("{}", style("API Configuration").bold());
    checks.push(check_api_key());
    if std::env::var("LLM_BASE_URL").is_ok() {
        checks.push(CheckResult::ok(
            "LLM_BASE_URL",
            &std::env::var("LLM_BASE_URL").unwrap_or_default(),
        ));
    }
    for check in &checks {
        check.print();
    }

    println!();
    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    let prompts_check = check_custom_prompts(settings);
    prompts_check.print();
    checks.push(prompts_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Fortell.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Fortell is ready to use.");
    }

    Ok(())
}

/// Check that an LLM API key is configured, masking the value.
fn check_api_key() -> CheckResult {
    for var in ["LLM_API_KEY", "OPENAI_API_KEY"] {
        match std::env::var(var) {
            Ok(key) if key.len() > 12 => {
                let masked = format!("{}...{}", &key[..6], &key[key.len() - 4..]);
                return CheckResult::ok(var, &format!("configured ({})", masked));
            }
            Ok(key) if !key.is_empty() => {
                return CheckResult::warning(
                    var,
                    "set but suspiciously short",
                    "Expected a full API key",
                );
            }
            _ => continue,
        }
    }
    CheckResult::error(
        "API key",
        "not set",
        "Set with: export OPENAI_API_KEY='sk-...' (or LLM_API_KEY)",
    )
}

/// Check whether a config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: fortell config edit",
        )
    }
}

/// Check the custom prompts directory, if configured.
fn check_custom_prompts(settings: &Settings) -> CheckResult {
    match settings.prompts.custom_dir.as_deref() {
        Some(dir) => {
            let path = Settings::expand_path(dir);
            if path.is_dir() {
                CheckResult::ok("Custom prompts", &format!("{}", path.display()))
            } else {
                CheckResult::error(
                    "Custom prompts",
                    &format!("{} does not exist", path.display()),
                    "Fix prompts.custom_dir in the config, or remove it",
                )
            }
        }
        None => CheckResult::ok("Custom prompts", "not configured (using built-in templates)"),
    }
}
