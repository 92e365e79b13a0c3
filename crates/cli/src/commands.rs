//! Command implementations
//!
//! Each command returns the text to print so it can be tested without
//! capturing stdout.

use crate::config::{apply_overrides, load_settings};
use crate::{Artifact, DatabaseArg, QueryArgs, SynthesizeArgs};
use anyhow::{Context, anyhow};
use colored::Colorize;
use metaquery_codegen::ddl::{catalog_ddl, render_script};
use metaquery_codegen::{MetadataResolver, SynthesizedQuery, Synthesizer};
use metaquery_core::EngineError;
use metaquery_ir::{JoinQueryConfig, SchemaCatalog, load_catalog};
use std::path::Path;

// ============================================================================
// Inputs
// ============================================================================

fn read_catalog(path: &Path) -> anyhow::Result<SchemaCatalog> {
    load_catalog(path).with_context(|| format!("failed to load catalog '{}'", path.display()))
}

fn read_query(path: &Path) -> anyhow::Result<JoinQueryConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read query '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid query '{}'", path.display()))
}

fn synthesizer(args: &QueryArgs, target: Option<crate::TargetArg>) -> anyhow::Result<Synthesizer> {
    let settings = load_settings(args.config.as_deref())?;
    let settings = apply_overrides(settings, args.database.map(Into::into), target.map(Into::into));
    Ok(Synthesizer::new(settings))
}

/// Lists every violation of a failed validation
fn engine_error(err: EngineError) -> anyhow::Error {
    if !err.is_validation() {
        return anyhow::Error::new(err);
    }
    let mut message = format!("{} violation(s):", err.violations().len());
    for v in err.violations() {
        message.push_str(&format!("\n  {} {}", "✗".red(), v));
    }
    anyhow!(message)
}

// ============================================================================
// synthesize
// ============================================================================

pub async fn synthesize(args: &SynthesizeArgs) -> anyhow::Result<String> {
    let synth = synthesizer(&args.query, args.target)?;
    let catalog = read_catalog(&args.query.catalog)?;
    let query = read_query(&args.query.query)?;

    let out = synth
        .synthesize(&catalog, &query)
        .await
        .map_err(engine_error)?;

    if args.json {
        render_json(&out, args.artifact)
    } else {
        render_text(&out, args.artifact)
    }
}

fn render_json(out: &SynthesizedQuery, artifact: Artifact) -> anyhow::Result<String> {
    let json = match artifact {
        Artifact::All => serde_json::to_string_pretty(out)?,
        Artifact::Sql => serde_json::to_string_pretty(&out.sql)?,
        Artifact::Orm => out.orm.to_json_pretty(),
        Artifact::Types => serde_json::to_string_pretty(&out.type_declaration)?,
        Artifact::Scaffold => serde_json::to_string_pretty(&out.scaffold)?,
        Artifact::Docs => serde_json::to_string_pretty(&out.scaffold.docs)?,
    };
    Ok(json)
}

fn render_text(out: &SynthesizedQuery, artifact: Artifact) -> anyhow::Result<String> {
    let docs = || {
        out.scaffold
            .docs
            .clone()
            .ok_or_else(|| anyhow!("documentation is disabled (generate_docs = false)"))
    };

    let text = match artifact {
        Artifact::Sql => sql_text(out),
        Artifact::Orm => out.orm.to_json_pretty(),
        Artifact::Types => out.type_declaration.source.clone(),
        Artifact::Scaffold => out.scaffold.source.clone(),
        Artifact::Docs => docs()?,
        Artifact::All => {
            let mut sections = vec![
                section("SQL", &sql_text(out)),
                section("ORM descriptor", &out.orm.to_json_pretty()),
                section(
                    &format!("Types ({})", out.type_declaration.target),
                    &out.type_declaration.source,
                ),
                section(
                    &format!("Scaffold (GET {})", out.scaffold.route),
                    &out.scaffold.source,
                ),
            ];
            if let Some(docs) = &out.scaffold.docs {
                sections.push(section("Docs", docs));
            }
            sections.join("\n")
        }
    };
    Ok(text)
}

fn section(title: &str, body: &str) -> String {
    format!("{}\n{}\n", format!("── {} ──", title).bold().cyan(), body.trim_end())
}

fn sql_text(out: &SynthesizedQuery) -> String {
    let mut text = out.sql.text.clone();
    for (i, value) in out.sql.params.iter().enumerate() {
        text.push_str(&format!("\n-- ${} = {}", i + 1, value.display_literal()));
    }
    text
}

// ============================================================================
// validate
// ============================================================================

pub async fn validate(args: &QueryArgs) -> anyhow::Result<String> {
    let synth = synthesizer(args, None)?;
    let catalog = read_catalog(&args.catalog)?;
    let query = read_query(&args.query)?;

    let ctx = MetadataResolver::new()
        .resolve(&catalog, &query)
        .await
        .map_err(engine_error)?;
    let validated = synth.validator().validate(&query, &ctx).map_err(engine_error)?;

    Ok(format!(
        "{} Query on '{}' is valid: {} join(s), {} field(s), {} filter(s)",
        "✓".green(),
        ctx.entity(query.main_entity_id)
            .map(|e| e.code.as_str())
            .unwrap_or_default(),
        validated.joins().len(),
        query.select_fields.len(),
        query.filter_conditions.len()
    ))
}

// ============================================================================
// ddl
// ============================================================================

pub fn ddl(
    catalog: &Path,
    database: Option<DatabaseArg>,
    config: Option<&Path>,
) -> anyhow::Result<String> {
    let settings = apply_overrides(load_settings(config)?, database.map(Into::into), None);
    let catalog = read_catalog(catalog)?;
    let statements = catalog_ddl(&catalog, settings.database);
    Ok(render_script(&statements))
}

// ============================================================================
// info
// ============================================================================

pub fn info(catalog: &Path) -> anyhow::Result<String> {
    let catalog = read_catalog(catalog)?;
    let mut lines = vec![format!(
        "{} {} entities, {} relations",
        "Catalog:".bold(),
        catalog.entity_count(),
        catalog.relation_count()
    )];

    lines.push(String::new());
    lines.push("Entities".bold().to_string());
    for entity in catalog.entities() {
        lines.push(format!(
            "  {} (table {}, {} fields, {})",
            entity.code.green(),
            entity.table_name,
            entity.fields.len(),
            entity.status
        ));
    }

    lines.push(String::new());
    lines.push("Relations".bold().to_string());
    for relation in catalog.relations() {
        let code = |id| {
            catalog
                .entity(id)
                .map(|e| e.code.clone())
                .unwrap_or_else(|| "?".to_string())
        };
        lines.push(format!(
            "  {} {} {} -> {}",
            relation.name.yellow(),
            relation.relation_type,
            code(relation.source_entity_id),
            code(relation.target_entity_id)
        ));
    }

    Ok(lines.join("\n"))
}

// ============================================================================
// Tests
// ============================================================================
