//! diag.rs — Diagnostics bruts du compilateur et leur résolution.
//!
//! Le compilateur rapporte des messages structurés : gravité, texte, et pour
//! certains une plage d'offsets dans un fichier source nommé. Le bundler, lui,
//! attend des positions 1-based ligne:colonne et des chemins relatifs à la
//! racine du projet. `ResolvedDiagnostic::resolve` fait cette traduction, en
//! relisant le source à travers l'hôte (l'overlay a priorité, donc un fichier
//! intermédiaire écrit pendant la compilation se relit tel quel).
//!
//! Unité d'offset : des **octets** dans du texte UTF-8. Le calcul de position
//! soustrait des indices d'octets de `\n` ; un compilateur qui compte en
//! unités UTF-16 doit convertir avant de rapporter.

use std::fmt;
use std::path::Path;

use crate::host::CompilerHost;
use crate::paths::project_relative;

/// Gravité d'un diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Seule la catégorie `Error` fait échouer la compilation.
    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// Plage source d'un diagnostic : offsets d'octets demi-ouverts `[start, end)`
/// dans le fichier `file` (chemin tel que le compilateur le nomme, relatif à
/// son répertoire de base).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub file: String,
    pub start: usize,
    pub end: usize,
}

/// Diagnostic brut, tel que rapporté par le compilateur via l'hôte.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub range: Option<SourceRange>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into(), range: None }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into(), range: None }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { severity: Severity::Info, message: message.into(), range: None }
    }

    pub fn with_range(mut self, file: impl Into<String>, start: usize, end: usize) -> Self {
        self.range = Some(SourceRange { file: file.into(), start, end });
        self
    }
}

/// Position 1-based : colonne 1 = premier caractère de la ligne.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Convertit un offset d'octet en position 1-based.
///
/// `None` si l'offset tombe hors du texte (`offset >= source.len()`) : une
/// borne invalide donne « pas de position », jamais une erreur.
pub fn line_col_at(source: &str, offset: usize) -> Option<LineCol> {
    if offset >= source.len() {
        return None;
    }
    let mut line: u32 = 1;
    let mut last_nl: Option<usize> = None;
    // Seuls les retours à la ligne strictement avant l'offset comptent.
    for (i, b) in source.as_bytes()[..offset].iter().enumerate() {
        if *b == b'\n' {
            line += 1;
            last_nl = Some(i);
        }
    }
    let col = match last_nl {
        Some(i) => offset - i,
        None => offset + 1,
    } as u32;
    Some(LineCol { line, col })
}

/// Localisation résolue. Présente dès qu'une des deux bornes a pu être
/// convertie ; une borne hors texte reste simplement absente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub start: Option<LineCol>,
    pub end: Option<LineCol>,
}

/// Diagnostic normalisé pour le bundler : message, chemin projet (`./…`,
/// séparateurs `/`), positions 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDiagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub location: Option<Location>,
}

impl ResolvedDiagnostic {
    /// Résout un diagnostic brut.
    ///
    /// - Pas de plage → message seul.
    /// - Fichier illisible via l'hôte → ni fichier ni position (inutile de
    ///   nommer un fichier qu'on ne peut pas montrer).
    /// - Fichier lisible → chemin projet + bornes converties une à une ; si
    ///   aucune borne n'est valide, le fichier reste rapporté sans position
    ///   (diagnostics « fichier entier »).
    pub fn resolve(
        diag: &Diagnostic,
        host: &dyn CompilerHost,
        base_dir: &Path,
        root: &Path,
    ) -> Self {
        let mut file = None;
        let mut location = None;

        if let Some(range) = &diag.range {
            if let Some(content) = host.read_file(&range.file, base_dir) {
                let text = String::from_utf8_lossy(&content);
                let start = line_col_at(&text, range.start);
                let end = line_col_at(&text, range.end);
                if start.is_some() || end.is_some() {
                    location = Some(Location { start, end });
                }
                file = Some(project_relative(&range.file, base_dir, root));
            } else {
                log::debug!(
                    "diagnostic sur fichier illisible, position abandonnée: {}",
                    range.file
                );
            }
        }

        Self {
            severity: diag.severity,
            message: diag.message.clone(),
            file,
            location,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity.is_fatal()
    }
}

impl fmt::Display for ResolvedDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{file}")?;
            if let Some(loc) = &self.location {
                if let Some(start) = loc.start {
                    write!(f, " {}:{}", start.line, start.col)?;
                    if let Some(end) = loc.end {
                        write!(f, "-{}:{}", end.line, end.col)?;
                    }
                }
            }
            write!(f, " {}", self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/* ───────────────────────────── Tests ───────────────────────────── */
