//! `cairn check` and `cairn eval`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;
use serde_json::{Map, Value};

use cairn_core::workflow::condition::Condition;
use cairn_types::error::ConditionError;

/// Parse `expression`, printing the error with a caret under the failing position.
fn parse(expression: &str, json: bool) -> Result<Condition> {
    Condition::parse(expression).map_err(|err| {
        if !json {
            print_parse_error(&err);
        }
        anyhow::Error::new(err)
    })
}

fn print_parse_error(err: &ConditionError) {
    eprintln!();
    eprintln!("  {} {}", style("✗").red().bold(), err);
    eprintln!("    {}", err.text());
    eprintln!("    {}{}", " ".repeat(err.pos()), style("^").red().bold());
    eprintln!();
}

/// Validate a condition and show its canonical text and referenced names.
pub fn check(expression: &str, json: bool) -> Result<()> {
    let condition = parse(expression, json)?;
    let canonical = condition.to_string();
    let names = condition.names();

    if json {
        let report = serde_json::json!({
            "condition": canonical,
            "names": names,
            "always": condition.is_always(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("✓").green().bold(), style(&canonical).cyan());
    if canonical != expression.trim() {
        println!("    {} {}", style("input:").dim(), expression);
    }
    if names.is_empty() {
        println!("    {}", style("references no inputs").dim());
    } else {
        println!("    {} {}", style("inputs:").dim(), names.join(", "));
    }
    println!();
    Ok(())
}

/// Decode the inputs of `cairn eval` into a JSON object.
pub fn read_inputs(inline: Option<&str>, file: Option<&Path>) -> Result<Map<String, Value>> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Ok(Map::new()),
    };
    match serde_json::from_str(&text).context("inputs are not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("inputs must be a JSON object, got: {other}"),
    }
}

/// Evaluate a condition and report each referenced input.
pub fn eval(expression: &str, inputs: &Map<String, Value>, json: bool) -> Result<bool> {
    let condition = parse(expression, json)?;
    let result = condition.is_true(inputs);
    let missing: Vec<String> = condition
        .names()
        .into_iter()
        .filter(|name| !inputs.contains_key(name))
        .collect();
    tracing::debug!(condition = %condition, result, "evaluated condition");

    if json {
        let report = serde_json::json!({
            "condition": condition.to_string(),
            "result": result,
            "missing": missing,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(result);
    }

    println!();
    let verdict = if result {
        style("true").green().bold()
    } else {
        style("false").red().bold()
    };
    println!("  {} {}", style(condition.to_string()).cyan(), verdict);
    for name in condition.names() {
        match inputs.get(&name) {
            Some(value) => println!("    {name} = {value}"),
            None => println!("    {name} {}", style("(missing, treated as false)").dim()),
        }
    }
    println!();
    Ok(result)
}
