//! `cairn manifest`: publish the demo service and render what it registers.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use cairn_core::prelude::*;
use cairn_core::workflow::step::Over;
use cairn_types::config::SdkConfig;
use cairn_types::definition::{ServiceManifest, TypeCatalog};

use super::demo;

/// One table row per step, depth-first.
#[derive(Debug, PartialEq)]
struct StepRow {
    depth: usize,
    name: String,
    style: &'static str,
    when: String,
    inputs: String,
    detail: String,
}

fn collect_rows(step: &Step, depth: usize, rows: &mut Vec<StepRow>) {
    let detail = match step {
        Step::Workflow(workflow) => format!("{} steps", workflow.children.len()),
        Step::Resource(resource) => resource.resource_type().to_string(),
        Step::StateHandler(handler) => handler.interface.type_name.clone(),
        Step::Action(action) => action.interface(),
        Step::Iterator(iterator) => match &iterator.over {
            Over::Value(value) => format!("{} {value} into {}", iterator.style, iterator.into),
            Over::Parameter(parameter) => {
                format!("{} ${} into {}", iterator.style, parameter.name, iterator.into)
            }
        },
        Step::Call(call) => format!("-> {}", call.target),
        Step::Reference(reference) => format!("=> {}", reference.target),
    };
    rows.push(StepRow {
        depth,
        name: step.name().to_string(),
        style: step.style().as_str(),
        when: if step.when().is_always() {
            String::new()
        } else {
            step.when().to_string()
        },
        inputs: step.required_inputs().join(", "),
        detail,
    });
    for child in step.children() {
        collect_rows(child, depth + 1, rows);
    }
}

fn style_color(style: &str) -> Color {
    match style {
        "workflow" => Color::Cyan,
        "resource" => Color::Green,
        "state_handler" => Color::Magenta,
        "action" => Color::Yellow,
        "iterator" => Color::Blue,
        _ => Color::DarkGrey,
    }
}

fn print_steps(rows: &[StepRow]) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Step").fg(Color::White),
        Cell::new("Style").fg(Color::White),
        Cell::new("When").fg(Color::White),
        Cell::new("Inputs").fg(Color::White),
        Cell::new("Detail").fg(Color::White),
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(format!("{}{}", "  ".repeat(row.depth), row.name)),
            Cell::new(row.style).fg(style_color(row.style)),
            Cell::new(&row.when),
            Cell::new(&row.inputs).fg(Color::DarkGrey),
            Cell::new(&row.detail),
        ]);
    }
    println!("{table}");
}

fn print_types(catalog: &TypeCatalog) {
    println!();
    println!(
        "  {} {}",
        style("── Types ──").dim(),
        style(&catalog.namespace).dim()
    );
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Type").fg(Color::White),
        Cell::new("Field").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Alias").fg(Color::White),
    ]);
    for (name, definition) in &catalog.types {
        for (index, field) in definition.fields.iter().enumerate() {
            let type_cell = if index == 0 {
                Cell::new(name).fg(Color::Cyan)
            } else {
                Cell::new("")
            };
            table.add_row(vec![
                type_cell,
                Cell::new(&field.name),
                Cell::new(&field.type_name),
                Cell::new(field.alias.as_deref().unwrap_or("")),
            ]);
        }
    }
    println!("{table}");
}

fn manifest_json(manifest: &ServiceManifest) -> Result<serde_json::Value> {
    let definitions = manifest
        .records()?
        .into_iter()
        .map(|(key, record)| serde_json::json!({ "key": key, "record": record }))
        .collect::<Vec<_>>();
    Ok(serde_json::json!({
        "service": manifest.service,
        "definitions": definitions,
        "types": manifest.types,
    }))
}

/// Build, publish, and print the demo service.
pub fn show(config: SdkConfig, types: bool, json: bool) -> Result<()> {
    let registry = demo::build(config)?;
    let mut rows = Vec::new();
    for name in registry.step_names() {
        if let Some(step) = registry.step(&name) {
            collect_rows(&step, 0, &mut rows);
        }
    }
    let manifest = registry.publish()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest_json(&manifest)?)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Service {} ({} definitions)",
        style("⚡").bold(),
        style(&manifest.service).cyan().bold(),
        manifest.definitions.len()
    );
    println!();
    print_steps(&rows);
    if types {
        print_types(&manifest.types);
    }
    println!();
    Ok(())
}
