//! pipeline.rs — Une invocation complète, de la requête aux artefacts.
//!
//! Séquence :
//!   1. assembler l'argv (options utilisateur + réglages du profil) ;
//!   2. construire un hôte NEUF (un hôte = une invocation, jamais réutilisé) ;
//!   3. invoquer le compilateur ; un crash remonte tel quel ;
//!   4. résoudre les diagnostics, réconcilier le comptage d'erreurs ;
//!   5. relire les artefacts depuis l'overlay.
//!
//! Réconciliation : certaines versions du compilateur n'émettent que des
//! diagnostics structurés, d'autres écrivent aussi (ou seulement) des blocs
//! texte colorés sur stderr. Le compte d'erreurs effectif est le MAX des
//! deux surfaces ; prendre une seule source sous- ou sur-compterait selon
//! la famille de versions. Les positions, elles, viennent toujours des
//! diagnostics structurés.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;

use crate::compiler::Compiler;
use crate::diag::ResolvedDiagnostic;
use crate::host::{BuildContext, SandboxHost};
use crate::options::{map_options_to_args, Options};

/// Profil de build : pilote les réglages par défaut passés au compilateur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProfile {
    /// Dev : `--debug`, aucune optimisation.
    Debug,
    /// Release : optimisation max, shrink, converge, asserts retirés.
    Release,
}

/// Requête de compilation d'un module.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Chemin du module source (le répertoire parent devient le répertoire
    /// de base du compilateur pour cette invocation).
    pub source_path: PathBuf,
    /// Radical des artefacts. Le hachage de contenu éventuel du nom est
    /// l'affaire de l'appelant, pas du pont.
    pub out_stem: String,
    pub profile: BuildProfile,
    /// Demande l'émission d'une source map (son absence est tolérée).
    pub source_map: bool,
    /// Options utilisateur, transmises telles quelles au compilateur.
    pub options: Options,
}

impl CompileRequest {
    pub fn new(source_path: impl Into<PathBuf>, out_stem: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            out_stem: out_stem.into(),
            profile: BuildProfile::Debug,
            source_map: false,
            options: Options::new(),
        }
    }

    /// Répertoire de base du compilateur pour cette invocation.
    pub fn base_dir(&self) -> &Path {
        self.source_path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn wasm_name(&self) -> String {
        format!("{}.wasm", self.out_stem)
    }

    pub fn bindings_name(&self) -> String {
        format!("{}.js", self.out_stem)
    }

    pub fn map_name(&self) -> String {
        format!("{}.wasm.map", self.out_stem)
    }
}

/// Résultat d'une invocation réussie.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Le binaire wasm émis.
    pub wasm: Bytes,
    /// Le module de liaison hôte (« bindings » bruts) émis à côté.
    pub bindings: String,
    /// Source map, si demandée ET émise.
    pub source_map: Option<Bytes>,
    /// Tous les diagnostics résolus (avertissements inclus), dans l'ordre.
    pub diagnostics: Vec<ResolvedDiagnostic>,
}

/// Échec d'une invocation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Au moins une erreur sur l'une des deux surfaces de diagnostic.
    #[error("Compilation failed - found {errors} error(s).")]
    Failed {
        errors: usize,
        /// Les diagnostics résolus, pour affichage par module côté appelant.
        diagnostics: Vec<ResolvedDiagnostic>,
    },

    /// Le compilateur a annoncé un succès mais n'a produit aucun wasm.
    /// Incohérence interne, jamais tolérée en silence.
    #[error("no wasm emitted for `{stem}`")]
    MissingWasm { stem: String },

    /// Succès annoncé mais pas de module de liaison.
    #[error("no raw bindings emitted for `{stem}`")]
    MissingBindings { stem: String },

    /// Crash du compilateur lui-même, propagé tel quel.
    #[error(transparent)]
    Compiler(#[from] anyhow::Error),
}

/// Assemble l'argv complet d'une requête : nom de fichier source, puis les
/// options utilisateur, puis les réglages imposés par le pont (qui écrasent
/// une option utilisateur homonyme sans la déplacer).
pub fn assemble_args(req: &CompileRequest) -> Vec<String> {
    let release = matches!(req.profile, BuildProfile::Release);

    let mut opts = req.options.clone();
    opts.set("baseDir", req.base_dir().to_string_lossy().into_owned())
        .set("outFile", req.wasm_name())
        .set_list("bindings", ["raw"])
        .set("debug", !release)
        .set("optimizeLevel", if release { 3.0 } else { 0.0 })
        .set("shrinkLevel", if release { 2.0 } else { 0.0 })
        .set("converge", release)
        .set("noAssert", release)
        .set("sourceMap", req.source_map);

    let basename = req
        .source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| req.source_path.to_string_lossy().into_owned());

    let mut args = vec![basename];
    args.extend(map_options_to_args(&opts));
    args
}

/// Compile un module à travers le pont.
pub fn compile(
    compiler: &dyn Compiler,
    ctx: &dyn BuildContext,
    req: &CompileRequest,
) -> Result<CompileOutput, CompileError> {
    let args = assemble_args(req);
    log::debug!("compilation de {} : argv = {:?}", req.source_path.display(), args);

    // Hôte neuf à chaque invocation : pas d'overlay partagé, pas de
    // diagnostics hérités d'un build précédent.
    let host = SandboxHost::new(ctx);
    compiler.run(&args, &host)?;

    let base = req.base_dir();
    let raw = host.diagnostics();
    let diagnostics: Vec<ResolvedDiagnostic> = raw
        .iter()
        .map(|d| ResolvedDiagnostic::resolve(d, &host, base, ctx.root()))
        .collect();

    let structured = diagnostics.iter().filter(|d| d.is_fatal()).count();
    let textual = count_error_lines(&host.stderr_string());
    let errors = structured.max(textual);
    log::debug!(
        "diagnostics: {} structurés dont {} erreurs, {} erreurs texte",
        diagnostics.len(),
        structured,
        textual
    );
    if errors > 0 {
        return Err(CompileError::Failed { errors, diagnostics });
    }

    let wasm = host
        .read_back(&req.wasm_name(), base)
        .ok_or_else(|| CompileError::MissingWasm { stem: req.out_stem.clone() })?;

    let bindings = host
        .read_back(&req.bindings_name(), base)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .ok_or_else(|| CompileError::MissingBindings { stem: req.out_stem.clone() })?;

    let source_map = if req.source_map {
        host.read_back(&req.map_name(), base)
    } else {
        None
    };

    Ok(CompileOutput { wasm, bindings, source_map, diagnostics })
}

/// Compte les lignes d'erreur de la surface texte (stderr), séquences ANSI
/// retirées : une ligne compte si son texte épuré commence par `ERROR`.
pub fn count_error_lines(stderr: &str) -> usize {
    strip_ansi(stderr)
        .lines()
        .filter(|line| line.trim_start().starts_with("ERROR"))
        .count()
}

/// Retire les séquences d'échappement ANSI CSI (`ESC [ … <finale>`).
/// Balayage manuel : inutile d'embarquer une regex pour ça.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next(); // '['
            // Paramètres + intermédiaires, jusqu'à l'octet final (@..~).
            for f in chars.by_ref() {
                if ('\u{40}'..='\u{7e}').contains(&f) {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/* ───────────────────────────── Tests ───────────────────────────── */
