//! `modlink resolve` - load a program and link its symbols.

use super::{absolute, SearchArgs};
use modlink::ast::AccessModifier;
use modlink::{LoadedProgram, ModuleError, ModuleSession, OutlineParser, SymbolInfo};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct ProgramSummary {
    pub root: String,
    pub modules: Vec<ModuleSummary>,
    pub resolved: ReportSummary,
}

#[derive(Debug, Serialize)]
pub struct ModuleSummary {
    pub uri: String,
    pub dependencies: Vec<String>,
    pub symbols: Vec<SymbolSummary>,
}

#[derive(Debug, Serialize)]
pub struct SymbolSummary {
    pub name: String,
    pub origin: &'static str,
    pub kind: Option<&'static str>,
    pub access: Option<&'static str>,
    /// Declaring module, when known
    pub declared_in: Option<String>,
    pub line: u32,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub imports: usize,
    pub wildcard_symbols: usize,
    pub links: usize,
    pub port_bindings: usize,
}

#[derive(Debug, Serialize)]
struct ErrorSummary {
    errors: Vec<String>,
}

/// Returns `Ok(false)` when the program failed to resolve.
pub fn execute(file: &Path, search: &SearchArgs, json: bool) -> anyhow::Result<bool> {
    let config = search.to_config()?;
    let path = absolute(file)?;
    let session = ModuleSession::new(config, OutlineParser::new());

    match session.load_path(&path) {
        Ok(program) => {
            let summary = summarize(&program);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(true)
        }
        Err(err) => {
            let errors = error_messages(&err);
            if json {
                println!("{}", serde_json::to_string_pretty(&ErrorSummary { errors })?);
            } else {
                for message in &errors {
                    eprintln!("error: {}", message);
                }
                eprintln!("\n{} error(s) while resolving {}", errors.len(), path.display());
            }
            Ok(false)
        }
    }
}

pub fn error_messages(err: &ModuleError) -> Vec<String> {
    err.diagnostics().iter().map(|e| e.to_string()).collect()
}

pub fn summarize(program: &LoadedProgram) -> ProgramSummary {
    let modules = program
        .modules()
        .map(|module| {
            let symbols = module.symbols();
            ModuleSummary {
                uri: module.uri().to_string(),
                dependencies: program
                    .dependencies(module.uri())
                    .iter()
                    .map(|uri| uri.to_string())
                    .collect(),
                symbols: symbols.iter().map(|info| summarize_symbol(info, module.uri())).collect(),
            }
        })
        .collect();

    let report = program.report();
    ProgramSummary {
        root: program.root().uri().to_string(),
        modules,
        resolved: ReportSummary {
            imports: report.imports,
            wildcard_symbols: report.wildcard_symbols,
            links: report.links,
            port_bindings: report.port_bindings,
        },
    }
}

fn summarize_symbol(info: &SymbolInfo, module: &modlink::ModuleUri) -> SymbolSummary {
    let declaration = info.declaration();
    let (origin, declared_in) = match info {
        SymbolInfo::Local(_) => ("local", Some(module.to_string())),
        SymbolInfo::Imported(imported) => (
            "imported",
            imported.target.resolved().map(|target| target.module.to_string()),
        ),
    };
    SymbolSummary {
        name: info.name().to_string(),
        origin,
        kind: declaration.map(|d| d.kind_name()),
        access: declaration.map(|d| match d.access {
            AccessModifier::Public => "public",
            AccessModifier::Private => "private",
        }),
        declared_in,
        line: info.context().line,
    }
}

fn print_summary(summary: &ProgramSummary) {
    for module in &summary.modules {
        println!("{}", module.uri);
        for dependency in &module.dependencies {
            println!("  imports {}", dependency);
        }
        for symbol in &module.symbols {
            let kind = symbol.kind.unwrap_or("?");
            match (&symbol.declared_in, symbol.origin) {
                (_, "local") => println!(
                    "  {:<24} {} {}",
                    symbol.name,
                    symbol.access.unwrap_or("public"),
                    kind
                ),
                (Some(from), _) => println!("  {:<24} {} from {}", symbol.name, kind, from),
                (None, _) => println!("  {:<24} unresolved", symbol.name),
            }
        }
    }
    println!(
        "\n{} module(s), {} import(s), {} wildcard symbol(s), {} link(s), {} port binding(s) resolved",
        summary.modules.len(),
        summary.resolved.imports,
        summary.resolved.wildcard_symbols,
        summary.resolved.links,
        summary.resolved.port_bindings
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlink::{ModuleConfig, ModuleRecordCache};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_summarize_program() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("main.ol"), "from .types import Id\ntype Order { id: Id }\n").unwrap();
        fs::write(root.join("types.ol"), "type Id: string\nprivate type Raw: raw\n").unwrap();

        let cache = ModuleRecordCache::new();
        let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);
        let program = session.load_path(&root.join("main.ol")).unwrap();
        let summary = summarize(&program);

        assert_eq!(summary.modules.len(), 2);
        assert!(summary.root.ends_with("main.ol"));
        assert_eq!(summary.modules[0].dependencies.len(), 1);

        let id = &summary.modules[0].symbols[0];
        assert_eq!(id.name, "Id");
        assert_eq!(id.origin, "imported");
        assert_eq!(id.kind, Some("type"));
        assert!(id.declared_in.as_deref().unwrap().ends_with("types.ol"));

        let raw = summary.modules[1].symbols.iter().find(|s| s.name == "Raw").unwrap();
        assert_eq!(raw.access, Some("private"));
        assert_eq!(raw.line, 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["resolved"]["imports"], 1);
    }

    #[test]
    fn test_error_messages_are_flattened() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("main.ol"), "type A: Missing\ntype B: AlsoMissing\n").unwrap();

        let cache = ModuleRecordCache::new();
        let session = ModuleSession::with_cache(ModuleConfig::new(&root), OutlineParser::new(), &cache);
        let err = session.load_path(&root.join("main.ol")).unwrap_err();

        let messages = error_messages(&err);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("Missing"));
    }
}
