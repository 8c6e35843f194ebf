use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use rpatch_engine::{standalone_host, EngineConfig, RecipeService, ReloadReport};
use rpatch_registry::Visibility;
use rpatch_store::StoredRecipe;
use rpatch_types::RecipeId;

use crate::cli::*;

const DEFAULT_CONFIG: &str = "rpatch.toml";

pub fn run_command(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let host = standalone_host(&config)?;
    let service = RecipeService::open(&config, host)
        .with_context(|| format!("opening store at {}", config.store_root.display()))?;
    let report = service.reload_from_store()?;

    let out = Output { format: cli.format };
    let result = match cli.command {
        Command::List => cmd_list(&service, out),
        Command::Show(args) => cmd_show(&service, out, args),
        Command::Add(args) => cmd_add(&service, out, args),
        Command::Delete(args) => cmd_delete(&service, out, args),
        Command::Override(args) => cmd_override(&service, out, args.action),
        Command::Blacklist(args) => cmd_blacklist(&service, out, args.action),
        Command::Reload => cmd_reload(out, &report),
    };
    service.shutdown();
    result
}

fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => EngineConfig::load(DEFAULT_CONFIG)?,
        None => EngineConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store_root = store.clone();
    }
    if let Some(base) = &cli.base {
        config.base_snapshot = Some(base.clone());
    }
    debug!(?config, "resolved config");
    Ok(config)
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(self) -> bool {
        self.format == OutputFormat::Json
    }

    fn print_json(self, value: serde_json::Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }

    /// Report a yes/no outcome of a mutation.
    fn changed(self, action: &str, id: &str, changed: bool) -> Result<()> {
        if self.json() {
            return self.print_json(json!({ "action": action, "id": id, "changed": changed }));
        }
        if changed {
            println!("{} {} {}", "✓".green().bold(), action, id.yellow());
        } else {
            println!("{} {} {} (no change)", "-".dimmed(), action, id.yellow());
        }
        Ok(())
    }

    fn cleared(self, what: &str, count: usize) -> Result<()> {
        if self.json() {
            return self.print_json(json!({ "cleared": what, "count": count }));
        }
        println!("{} Cleared {} {}", "✓".green().bold(), count.to_string().bold(), what);
        Ok(())
    }

    fn ids<'a>(self, ids: impl IntoIterator<Item = &'a RecipeId>) -> Result<()> {
        let ids: Vec<String> = ids.into_iter().map(ToString::to_string).collect();
        if self.json() {
            return self.print_json(json!(ids));
        }
        if ids.is_empty() {
            println!("{}", "(none)".dimmed());
        }
        for id in &ids {
            println!("{id}");
        }
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<RecipeId> {
    RecipeId::parse(raw).with_context(|| format!("invalid recipe id {raw:?}"))
}

fn read_record(path: &Path) -> Result<StoredRecipe> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_list(service: &RecipeService, out: Output) -> Result<()> {
    let ids = service.list_ids();
    out.ids(&ids)?;
    if !out.json() {
        println!("{} recipes", ids.len().to_string().bold());
    }
    Ok(())
}

fn cmd_show(service: &RecipeService, out: Output, args: ShowArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let visibility = service.visibility(&id)?;
    let Some(descriptor) = service.get(&id) else {
        if out.json() {
            return out.print_json(json!({ "id": id.to_string(), "visible": false }));
        }
        println!("{} is not visible", id.to_string().yellow());
        return Ok(());
    };
    let origin = match &visibility {
        Visibility::Visible { origin, .. } => origin.as_str(),
        Visibility::Absent => "unknown",
    };
    if out.json() {
        return out.print_json(json!({
            "id": id.to_string(),
            "visible": true,
            "origin": origin,
            "type": descriptor.recipe_type().as_str(),
            "record": StoredRecipe::encode(&id, &descriptor),
        }));
    }
    let result = descriptor.result();
    println!("{}", id.to_string().yellow().bold());
    println!("  Kind: {} ({})", descriptor.kind_name().cyan(), descriptor.recipe_type().as_str());
    println!("  Result: {} x{}", result.item, result.count);
    println!("  Ingredients: {}", descriptor.ingredient_count());
    println!("  Origin: {}", origin.green());
    Ok(())
}

fn cmd_add(service: &RecipeService, out: Output, args: AddArgs) -> Result<()> {
    let record = read_record(&args.file)?;
    let id = args.id.as_deref().map(parse_id).transpose()?;
    let added = service.add_record(&record, id)?;
    out.changed("added", &added.to_string(), true)
}

fn cmd_delete(service: &RecipeService, out: Output, args: DeleteArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let existed = service.delete_recipe(&id)?;
    out.changed("deleted", &args.id, existed)
}

fn cmd_override(service: &RecipeService, out: Output, action: OverrideAction) -> Result<()> {
    match action {
        OverrideAction::Add { id, file } => {
            let parsed = parse_id(&id)?;
            let descriptor = read_record(&file)?
                .descriptor()
                .with_context(|| format!("decoding {}", file.display()))?;
            let created = service.add_override(&parsed, descriptor)?;
            out.changed(if created { "overrode" } else { "replaced override" }, &id, true)
        }
        OverrideAction::Remove { id } => {
            let removed = service.remove_override(&parse_id(&id)?)?;
            out.changed("removed override", &id, removed)
        }
        OverrideAction::Clear => out.cleared("overrides", service.clear_overrides()?),
        OverrideAction::List => out.ids(&service.list_overrides()?),
    }
}

fn cmd_blacklist(service: &RecipeService, out: Output, action: BlacklistAction) -> Result<()> {
    match action {
        BlacklistAction::Add { id } => {
            let added = service.add_to_blacklist(&parse_id(&id)?)?;
            out.changed("blacklisted", &id, added)
        }
        BlacklistAction::Remove { id } => {
            let removed = service.remove_from_blacklist(&parse_id(&id)?)?;
            out.changed("unblacklisted", &id, removed)
        }
        BlacklistAction::Clear => out.cleared("blacklist entries", service.clear_blacklist()?),
        BlacklistAction::List => out.ids(&service.list_blacklist()?),
    }
}

fn cmd_reload(out: Output, report: &ReloadReport) -> Result<()> {
    if out.json() {
        return out.print_json(serde_json::to_value(report)?);
    }
    println!("{} Reloaded: {}", "✓".green().bold(), report);
    Ok(())
}
