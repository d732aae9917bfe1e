//! lierre-core — Cœur du pont bundler ↔ compilateur wasm
//!
//! Le bundler invoque le pont une fois par module source ; le pont présente
//! au compilateur un système de fichiers virtuel (overlay mémoire par-dessus
//! le disque réel), traduit ses diagnostics en erreurs normalisées
//! (positions 1-based, chemins projet), et traduit une configuration
//! structurée vers sa forme argv plate.
//!
//! ## Modules
//! - `options`  : mappage config structurée → jetons argv.
//! - `paths`    : normalisation de chemins entre les deux repères.
//! - `host`     : hôte de fichiers virtuel (overlay + disque + dépendances).
//! - `diag`     : diagnostics bruts → diagnostics résolus.
//! - `compiler` : la couture vers le point d'entrée du compilateur externe.
//! - `pipeline` : une invocation complète, de la requête aux artefacts.
//!
//! Modèle d'exécution : une invocation = une unité séquentielle, un hôte
//! neuf à chaque fois. Le parallélisme entre modules et l'ordonnancement
//! watch appartiennent à l'orchestrateur externe.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod compiler;
pub mod diag;
pub mod host;
pub mod options;
pub mod paths;
pub mod pipeline;

// ---------- Reexports de confort ----------
pub use compiler::Compiler;
pub use diag::{line_col_at, Diagnostic, LineCol, Location, ResolvedDiagnostic, Severity, SourceRange};
pub use host::{BuildContext, CompilerHost, DiskContext, SandboxHost, DEFAULT_SOURCE_EXT};
pub use options::{map_options_to_args, OptValue, Options};
pub use paths::{normalize_lexical, project_relative, relative_to, resolve_against};
pub use pipeline::{
    assemble_args, compile, BuildProfile, CompileError, CompileOutput, CompileRequest,
};

// ---------- Version ----------
/// Version du crate (lisible, via Cargo).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Renvoie une jolie bannière de version (utile pour logs/outils).
pub fn version() -> String {
    format!("lierre-core {VERSION}")
}
