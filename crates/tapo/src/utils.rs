use std::io::IsTerminal;

use serde::Serialize;
use serde_json::{Map, Value};
use tapo_core::Credentials;

/// Environment variable checked for the password before prompting.
pub const PASSWORD_ENV: &str = "TAPO_PASSWORD";

/// Read password securely based on the provided options.
///
/// # Priority
///
/// 1. If `password_stdin` is true, read a line from stdin
/// 2. Otherwise, prompt interactively (if terminal is available)
pub fn read_password(password_stdin: bool, prompt: &str) -> Result<String, String> {
    if password_stdin {
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| format!("Failed to read password from stdin: {}", e))?;
        return Ok(input.trim().to_string());
    }

    if std::io::stdin().is_terminal() {
        eprint!("{}: ", prompt);
        rpassword::read_password().map_err(|e| format!("Failed to read password: {}", e))
    } else {
        Err("No password provided. Use --password-stdin when piping input.".to_string())
    }
}

/// Get credentials from CLI options and environment.
///
/// Password is read from TAPO_PASSWORD env var, stdin (if --password-stdin),
/// or interactively prompted.
pub fn get_credentials(username: Option<String>, password_stdin: bool) -> Result<Credentials, String> {
    let Some(user) = username.filter(|u| !u.is_empty()) else {
        return Err("No username provided. Use -u or set TAPO_EMAIL.".to_string());
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(pass) if !pass.is_empty() && !password_stdin => pass,
        _ => read_password(password_stdin, &format!("Password for {}", user))?,
    };

    Ok(Credentials::new(user, password))
}

/// Parses the argument of `set` into a property map.
pub fn parse_properties(json: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Properties must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON: {}", e)),
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize response: {}", e))?;
    println!("{}", output);
    Ok(())
}
