// file: src/cli/output.rs
// version: 1.0.0
// guid: 7f2a9d05-b36e-4c18-9e74-a50c8b1d6e29

//! Rendering of summaries and results, human readable or JSON

use crate::installer::{ExecutionResult, InstallResult, RunOutcome};
use crate::steps::StepStatus;
use crate::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};

/// Replacement shown for any field named `password`
pub const PASSWORD_MASK: &str = "********";

/// Copy of `value` with every `password` field replaced by the mask
pub fn mask_parameters(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let masked = if key == "password" {
                        Value::String(PASSWORD_MASK.to_string())
                    } else {
                        mask_parameters(v)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask_parameters).collect()),
        other => other.clone(),
    }
}

/// Indented listing of collected parameters with passwords masked
pub fn format_parameters<T: Serialize>(params: &T) -> Result<String> {
    let value = mask_parameters(&serde_json::to_value(params)?);
    let mut out = String::new();
    write_value(&mut out, &value, 2);
    Ok(out)
}

fn write_value(out: &mut String, value: &Value, indent: usize) {
    let prefix = " ".repeat(indent);
    let Value::Object(map) = value else {
        out.push_str(&format!("{}{}\n", prefix, scalar(value)));
        return;
    };

    for (key, v) in map {
        match v {
            Value::Null => {}
            Value::Object(_) => {
                out.push_str(&format!("{}{}:\n", prefix, key));
                write_value(out, v, indent + 2);
            }
            Value::Array(items) => {
                out.push_str(&format!("{}{}:\n", prefix, key));
                for (i, item) in items.iter().enumerate() {
                    out.push_str(&format!("{}  [{}]\n", prefix, i + 1));
                    write_value(out, item, indent + 4);
                }
            }
            _ => out.push_str(&format!("{}{}: {}\n", prefix, key, scalar(v))),
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_summary<T: Serialize>(title: &str, params: &T) -> Result<()> {
    eprintln!("\n{}", title.bold());
    eprintln!("{}", "-".repeat(40));
    eprint!("{}", format_parameters(params)?);
    eprintln!("{}", "-".repeat(40));
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report a failure that happened before any installer ran
pub fn print_error(message: &str, error: &str, json_output: bool) -> Result<()> {
    if json_output {
        print_json(&json!({ "success": false, "message": message, "error": error }))
    } else {
        eprintln!("{} {}", "✗".red().bold(), message.red().bold());
        eprintln!("  {}", error);
        Ok(())
    }
}

pub fn print_execution_result(result: &ExecutionResult, json_output: bool) -> Result<()> {
    if json_output {
        return print_json(result);
    }

    print_step_log(result);
    if result.success {
        println!("{} {}", "✓".green().bold(), result.message.green().bold());
        if let Some(join) = &result.join_command {
            println!("\nJoin commands:\n{}", join);
        }
    } else {
        print_failure(&result.message, result.error.as_deref());
    }
    Ok(())
}

pub fn print_install_result(result: &InstallResult, json_output: bool) -> Result<()> {
    if json_output {
        return print_json(result);
    }

    print_step_log(result);
    if result.success {
        println!("{} {}", "✓".green().bold(), result.message.green().bold());
        if let Some(os_family) = result.os_family {
            println!("  OS family:         {}", os_family);
        }
        if let Some(url) = &result.elasticsearch_url {
            println!("  Elasticsearch URL: {}", url);
        }
        if let Some(url) = &result.kibana_url {
            println!("  Kibana URL:        {}", url);
        }
        if let Some(password) = &result.elastic_password {
            println!("  elastic password:  {}", password.yellow());
        }
    } else {
        print_failure(&result.message, result.error.as_deref());
    }
    Ok(())
}

fn print_failure(message: &str, error: Option<&str>) {
    println!("{} {}", "✗".red().bold(), message.red().bold());
    if let Some(error) = error {
        println!("  {}", error);
    }
}

/// One line per recorded step with its status and duration
pub fn print_step_log(outcome: &dyn RunOutcome) {
    let steps = outcome.steps();
    if steps.is_empty() {
        return;
    }

    let failed = steps.iter().filter(|s| s.status == StepStatus::Failed).count();
    eprintln!(
        "\n{} step(s) run, {} failed",
        steps.len(),
        if failed == 0 { failed.to_string().green() } else { failed.to_string().red() }
    );
    for step in steps {
        let status = match step.status {
            StepStatus::Success => "ok".green(),
            StepStatus::Failed => "failed".red(),
            other => other.to_string().yellow(),
        };
        let elapsed = step
            .elapsed()
            .map(|d| format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0))
            .unwrap_or_default();
        eprintln!("  {:>6} {:>7}  [{}] {}", status, elapsed, step.node, step.name);
    }
    eprintln!();
}
