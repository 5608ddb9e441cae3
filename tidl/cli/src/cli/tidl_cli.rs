use std::fmt::Write;

use crate::{
    cli::{
        args::{Cli, CliError, CliInputArgs, CliSubcommand},
        utils::{read_config, read_schema},
    },
    loader::SchemaLoader,
};
use anyhow::Result;
use clap::Parser as ClapParser;
use lang::{Field, SemanticAnalyzer, StructFingerprint, TypeGraph, TypeId, print_report};
use log::debug;
use miette::Report;

pub struct TidlCli;

impl TidlCli {
    pub fn new() -> Self {
        Self {}
    }

    /// Runs the command described by `cli_args` and returns what should go to stdout.
    pub fn run(&self, cli_args: &[&str]) -> Result<String> {
        let args = Cli::parse_from(cli_args);

        let output = match &args.command {
            CliSubcommand::Check { args } => {
                let graph = Self::analyze(args)?;
                format!("{}: {} structured types ok\n", args.input.display(), graph.struct_ids().len())
            }
            CliSubcommand::Fingerprint { args, struct_name } => {
                let graph = Self::analyze(args)?;
                Self::fingerprints(&graph, struct_name.as_deref())?
            }
            CliSubcommand::Fields { args, struct_name, all } => {
                let graph = Self::analyze(args)?;
                Self::fields(&graph, struct_name.as_deref(), *all)?
            }
        };
        Ok(output)
    }

    pub fn analyze(args: &CliInputArgs) -> Result<TypeGraph, CliError> {
        let config = read_config(args.config.as_deref())?;
        debug!("Loading schema '{}'", args.input.display());
        let doc = read_schema(&args.input)?;

        let graph = match SchemaLoader::new(&config).load(&doc) {
            Ok(graph) => graph,
            Err(errs) => {
                for e in errs {
                    print_report(&Report::new(e))?;
                }
                return Err(CliError::LoadError);
            }
        };
        if let Err(errs) = SemanticAnalyzer::new().analyze(&graph) {
            for e in errs {
                print_report(&Report::new(e))?;
            }
            return Err(CliError::SemanticAnalysisError);
        }
        Ok(graph)
    }

    fn selected_structs(graph: &TypeGraph, struct_name: Option<&str>) -> Result<Vec<TypeId>, CliError> {
        let Some(name) = struct_name else {
            return Ok(graph.struct_ids());
        };
        graph
            .find(name)
            .filter(|&id| graph.struct_def(id).is_some())
            .map(|id| vec![id])
            .ok_or_else(|| CliError::BadInput(format!("no structured type named `{name}`")))
    }

    fn fingerprints(graph: &TypeGraph, struct_name: Option<&str>) -> Result<String, CliError> {
        let mut output = String::new();
        for id in Self::selected_structs(graph, struct_name)? {
            let (Some(def), Some(fingerprint)) = (graph.struct_def(id), StructFingerprint::compute(graph, id)) else {
                continue;
            };
            writeln!(output, "{} {} {}", def.name(), fingerprint.short_hex(), fingerprint.material())?;
        }
        Ok(output)
    }

    fn fields(graph: &TypeGraph, struct_name: Option<&str>, include_hidden: bool) -> Result<String, CliError> {
        let mut output = String::new();
        for id in Self::selected_structs(graph, struct_name)? {
            let Some(def) = graph.struct_def(id) else {
                continue;
            };
            writeln!(output, "{} {}", def.kind(), def.name())?;
            for field in def.members_in_key_order().filter(|f| include_hidden || !f.has_hidden_annotation()) {
                writeln!(output, "  {}", Self::describe_field(graph, field))?;
            }
        }
        Ok(output)
    }

    fn describe_field(graph: &TypeGraph, field: &Field) -> String {
        let mut line = format!("{}: {} {} {}", field.key(), field.requiredness(), graph.type_name(field.ty()), field.name());
        if let Some(value) = field.default_value() {
            line.push_str(&format!(" = {value}"));
        }

        let mut flags = Vec::new();
        if field.has_key_annotation() {
            flags.push("key");
        }
        if field.has_hidden_annotation() {
            flags.push("hidden");
        }
        if field.auto_generated() {
            flags.push("auto");
        }
        if !flags.is_empty() {
            line.push_str(&format!(" [{}]", flags.join(", ")));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_snapshot;

    use super::*;
    use crate::loader::SchemaDocument;

    fn graph_from(src: &str) -> TypeGraph {
        let doc: SchemaDocument = serde_yaml::from_str(src).unwrap();
        SchemaLoader::new(&config::TidlConfig::default()).load(&doc).unwrap()
    }

    const SCHEMA: &str = indoc! {r#"
        structs:
          - name: User
            fields:
              - { name: email, key: 2, type: string, requiredness: optional, annotations: { key: users } }
              - { name: id, key: 1, type: i64, requiredness: required }
              - { name: token, key: 3, type: binary, annotations: { hidden: "true" } }
          - name: Result
            kind: union
            fields:
              - { name: ok, key: 1, type: User }
              - { name: code, key: 2, type: i32, default: 0 }
    "#};

    #[test]
    fn test_fields_listing() {
        let graph = graph_from(SCHEMA);
        assert_snapshot!(TidlCli::fields(&graph, None, false).unwrap(), @r#"
        struct User
          1: required i64 id
          2: optional string email [key]
        union Result
          1: optional User ok
          2: optional i32 code = 0
        "#);
    }

    #[test]
    fn test_fields_listing_with_hidden() {
        let graph = graph_from(SCHEMA);
        let listing = TidlCli::fields(&graph, Some("User"), true).unwrap();
        assert!(listing.contains("3: opt-in-req-out binary token [hidden]"));
        assert!(!listing.contains("union Result"));
    }

    #[test]
    fn test_fingerprint_lines() {
        let graph = graph_from(SCHEMA);
        let output = TidlCli::fingerprints(&graph, None).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let user: Vec<&str> = lines[0].split(' ').collect();
        assert_eq!(user[0], "User");
        assert_eq!(user[1].len(), 16);
        assert_eq!(user[2], "{1:i64;2:opt-string;3:binary;}");
        assert_eq!(lines[1].split(' ').nth(2), Some("{1:opt-{1:i64;2:opt-string;3:binary;};2:opt-i32;}"));
    }

    #[test]
    fn test_unknown_struct_is_bad_input() {
        let graph = graph_from(SCHEMA);
        assert!(matches!(TidlCli::fingerprints(&graph, Some("Missing")), Err(CliError::BadInput(_))));
    }
}
