//! lierre-cli/src/lib.rs — CLI du pont lierre
//!
//! Sous-commandes :
//!   - args    : lit un manifeste lierre.toml et imprime l'argv qui serait
//!               passé au compilateur, un jeton par ligne
//!   - locate  : convertit un offset d'octet en position ligne:colonne
//!   - relpath : imprime le chemin projet (`./…`) d'un fichier rapporté
//!
//! La CLI ne lance pas de compilation elle-même : c'est un outil d'inspection
//! du pont, utile pour vérifier un manifeste ou rejouer un diagnostic.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use lierre_core::{
    assemble_args, line_col_at, project_relative, BuildProfile, CompileRequest, OptValue, Options,
};

/// Point d'entrée du binaire (à appeler depuis src/main.rs)
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Args { manifest } => cmd_args(manifest),
        Cmd::Locate { file, offset } => cmd_locate(file, offset),
        Cmd::Relpath { file, base, root } => cmd_relpath(&file, &base, &root),
    }
}

#[derive(Parser, Debug)]
#[command(name = "lierre", version, about = "Bundler-to-wasm-compiler bridge tool")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Imprime l'argv compilateur dérivé d'un manifeste lierre.toml
    Args {
        /// Chemin vers lierre.toml
        #[arg(default_value = "lierre.toml")]
        manifest: PathBuf,
    },
    /// Convertit un offset d'octet en position 1-based ligne:colonne
    Locate {
        /// Fichier source à inspecter
        file: PathBuf,
        /// Offset d'octet dans le fichier
        offset: usize,
    },
    /// Imprime le chemin projet d'un fichier tel qu'un diagnostic le nommerait
    Relpath {
        /// Nom de fichier tel que le compilateur le rapporte
        file: String,
        /// Répertoire de base du compilateur
        #[arg(long, default_value = ".")]
        base: Utf8PathBuf,
        /// Racine du projet
        #[arg(long, default_value = ".")]
        root: Utf8PathBuf,
    },
}

/// Manifeste minimal : une section `[build]` et des options libres.
#[derive(Debug, Deserialize)]
struct Manifest {
    build: Build,
    /// Options transmises telles quelles au compilateur, sans schéma.
    #[serde(default)]
    options: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Build {
    /// Chemin du module source à compiler.
    source: PathBuf,
    /// Radical des artefacts ; par défaut le nom du source sans extension.
    #[serde(default)]
    out_stem: Option<String>,
    /// `dev` ou `release`.
    #[serde(default = "default_profile")]
    profile: String,
    #[serde(default)]
    source_map: bool,
}

fn default_profile() -> String {
    "dev".into()
}

fn read_manifest(path: &Utf8Path) -> Result<Manifest> {
    let s = fs::read_to_string(path).with_context(|| format!("lecture {}", path))?;
    let m: Manifest = toml::from_str(&s).with_context(|| "TOML invalide")?;
    Ok(m)
}

/// Traduit une table TOML libre en options ordonnées du pont.
///
/// Les tables imbriquées deviennent des groupes `Nested` ; les tableaux sont
/// convertis élément par élément en chaînes.
fn table_to_options(table: &toml::Table) -> Result<Options> {
    let mut opts = Options::new();
    for (key, value) in table {
        opts.set(key.as_str(), value_to_opt(key, value)?);
    }
    Ok(opts)
}

fn value_to_opt(key: &str, value: &toml::Value) -> Result<OptValue> {
    Ok(match value {
        toml::Value::Boolean(b) => OptValue::Flag(*b),
        toml::Value::String(s) => OptValue::Text(s.clone()),
        toml::Value::Integer(i) => OptValue::Number(*i as f64),
        toml::Value::Float(f) => OptValue::Number(*f),
        toml::Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    toml::Value::String(s) => list.push(s.clone()),
                    toml::Value::Integer(i) => list.push(i.to_string()),
                    toml::Value::Float(f) => list.push(f.to_string()),
                    toml::Value::Boolean(b) => list.push(b.to_string()),
                    other => bail!("option `{key}`: élément de liste non supporté ({})", other.type_str()),
                }
            }
            OptValue::List(list)
        }
        toml::Value::Table(inner) => OptValue::Nested(table_to_options(inner)?),
        toml::Value::Datetime(_) => bail!("option `{key}`: les dates n'ont pas de forme argv"),
    })
}

fn cmd_args(manifest: PathBuf) -> Result<()> {
    let manifest =
        Utf8PathBuf::from_path_buf(manifest).map_err(|_| anyhow!("chemin non UTF-8"))?;
    let m = read_manifest(&manifest)?;

    let stem = match &m.build.out_stem {
        Some(s) => s.clone(),
        None => m
            .build
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("source sans nom de fichier: {}", m.build.source.display()))?,
    };

    let mut req = CompileRequest::new(&m.build.source, stem);
    req.profile = match m.build.profile.as_str() {
        "dev" => BuildProfile::Debug,
        "release" => BuildProfile::Release,
        other => bail!("profil inconnu `{other}` (attendu: dev | release)"),
    };
    req.source_map = m.build.source_map;
    req.options = table_to_options(&m.options)?;

    log::debug!("manifeste {} chargé, profil {:?}", manifest, req.profile);
    for token in assemble_args(&req) {
        println!("{token}");
    }
    Ok(())
}

fn cmd_locate(file: PathBuf, offset: usize) -> Result<()> {
    let text = fs::read_to_string(&file).with_context(|| format!("lecture {}", file.display()))?;
    match line_col_at(&text, offset) {
        Some(pos) => {
            println!("{}:{}", pos.line, pos.col);
            Ok(())
        }
        None => bail!(
            "offset {offset} hors du fichier ({} octets)",
            text.len()
        ),
    }
}

fn cmd_relpath(file: &str, base: &Utf8Path, root: &Utf8Path) -> Result<()> {
    println!("{}", project_relative(file, base.as_std_path(), root.as_std_path()));
    Ok(())
}

/* ───────────────────────────── Tests ───────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use lierre_core::map_options_to_args;
    use pretty_assertions::assert_eq;

    #[test]
    fn manifest_parses_with_defaults() {
        let m: Manifest = toml::from_str(
            r#"
            [build]
            source = "src/index.ts"
            "#,
        )
        .unwrap();
        assert_eq!(m.build.profile, "dev");
        assert!(!m.build.source_map);
        assert!(m.build.out_stem.is_none());
        assert!(m.options.is_empty());
    }

    #[test]
    fn options_table_keeps_document_order() {
        let m: Manifest = toml::from_str(
            r#"
            [build]
            source = "src/index.ts"

            [options]
            runtime = "stub"
            importMemory = true
            optimizeLevel = 2
            transform = ["a", "b"]
            "#,
        )
        .unwrap();
        let opts = table_to_options(&m.options).unwrap();
        assert_eq!(
            map_options_to_args(&opts),
            vec![
                "--runtime",
                "stub",
                "--importMemory",
                "--optimizeLevel",
                "2",
                "--transform",
                "a,b"
            ]
        );
    }

    #[test]
    fn nested_table_becomes_nested_group() {
        let m: Manifest = toml::from_str(
            r#"
            [build]
            source = "src/index.ts"

            [options]
            debug = true

            [options.advanced]
            exportTable = true
            "#,
        )
        .unwrap();
        let opts = table_to_options(&m.options).unwrap();
        // Le groupe imbriqué s'aplatit sans préfixe parent.
        assert_eq!(map_options_to_args(&opts), vec!["--debug", "--exportTable"]);
    }

    #[test]
    fn datetime_option_is_rejected() {
        let m: Manifest = toml::from_str(
            r#"
            [build]
            source = "src/index.ts"

            [options]
            since = 2024-01-01
            "#,
        )
        .unwrap();
        assert!(table_to_options(&m.options).is_err());
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let tmp = tempfile_manifest(
            r#"
            [build]
            source = "src/index.ts"
            profile = "turbo"
            "#,
        );
        let err = cmd_args(tmp.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("profil inconnu"));
    }

    #[test]
    fn args_derive_stem_from_source() {
        let m: Manifest = toml::from_str(
            r#"
            [build]
            source = "src/index.ts"
            profile = "release"
            "#,
        )
        .unwrap();
        let mut req = CompileRequest::new(&m.build.source, "index");
        req.profile = BuildProfile::Release;
        let args = assemble_args(&req);
        assert_eq!(args[0], "index.ts");
        let out = args.iter().position(|a| a == "--outFile").unwrap();
        assert_eq!(args[out + 1], "index.wasm");
    }

    fn tempfile_manifest(content: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }
}
