//! host.rs — Hôte de fichiers virtuel présenté au compilateur.
//!
//! Le compilateur ne touche jamais le disque directement : toutes ses E/S
//! passent par un [`SandboxHost`], qui superpose deux niveaux de lecture :
//!
//! 1. l'**overlay** mémoire, alimenté uniquement par les écritures du
//!    compilateur pendant l'invocation (jamais par des lectures disque) ;
//! 2. le système de fichiers réel du contexte de build, en second recours.
//!
//! L'overlay gagne toujours : un artefact intermédiaire écrit puis relu par
//! le compilateur fait l'aller-retour sans toucher le disque, et c'est aussi
//! par là que l'appelant récupère les artefacts finaux après la compilation.
//!
//! L'hôte ne lève jamais : chaque opération rend un sentinelle (`None`) ou
//! enregistre silencieusement. Un échec de lecture n'est PAS une erreur,
//! c'est « fichier absent » pour la résolution de modules du compilateur,
//! qui sonde légitimement plusieurs chemins candidats.
//!
//! Un hôte = une invocation. On ne réutilise jamais un hôte d'une
//! compilation à l'autre (un overlay périmé fuirait dans un build sans
//! rapport, typiquement en mode watch).

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::diag::Diagnostic;
use crate::paths::resolve_against;

/// Extension source par défaut (fichiers `.ts`, déclarations `.d.ts` exclues).
pub const DEFAULT_SOURCE_EXT: &str = "ts";

/// Ce que le pont consomme du contexte de build externe.
///
/// `Sync` exigé : l'orchestrateur peut faire tourner plusieurs invocations
/// indépendantes en parallèle, chacune avec son propre hôte.
pub trait BuildContext: Sync {
    /// Lecture d'un fichier réel par chemin absolu.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Listing d'un répertoire réel par chemin absolu (noms d'entrées bruts).
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Déclare `path` comme dépendance du module en cours de build : le
    /// watch/rebuild externe se re-déclenchera quand ce fichier changera.
    fn add_dependency(&self, path: &Path);

    /// Répertoire racine du projet, ancre des chemins rapportés.
    fn root(&self) -> &Path;
}

/// Contexte de build de production, sur le système de fichiers réel.
///
/// Les dépendances enregistrées sont dédupliquées (une lecture répétée du
/// même chemin ne compte qu'une fois) et relisibles en fin d'invocation.
pub struct DiskContext {
    root: PathBuf,
    deps: Mutex<BTreeSet<PathBuf>>,
}

impl DiskContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), deps: Mutex::new(BTreeSet::new()) }
    }

    /// Instantané trié des dépendances enregistrées jusqu'ici.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.deps.lock().iter().cloned().collect()
    }
}

impl BuildContext for DiskContext {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn add_dependency(&self, path: &Path) {
        self.deps.lock().insert(path.to_path_buf());
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Le contrat d'E/S que le compilateur consomme (object-safe, `&self` partout).
pub trait CompilerHost: Sync {
    /// Lit `name` résolu contre `base_dir`. Overlay d'abord, disque ensuite.
    /// `None` = fichier absent (pas une erreur).
    fn read_file(&self, name: &str, base_dir: &Path) -> Option<Bytes>;

    /// Écrit dans l'overlay, en écrasant sans condition. Ne touche jamais le
    /// disque.
    fn write_file(&self, name: &str, contents: &[u8], base_dir: &Path);

    /// Liste les sources d'un répertoire réel (extension source, fichiers de
    /// déclaration `.d.<ext>` exclus). `None` = répertoire absent.
    fn list_files(&self, dir_name: &str, base_dir: &Path) -> Option<Vec<String>>;

    /// Ajoute un diagnostic à la suite. Jamais d'échec, jamais de dédup.
    fn report_diagnostic(&self, diag: Diagnostic);

    /// Capture texte de la sortie standard du compilateur.
    fn write_stdout(&self, text: &str);

    /// Capture texte de la sortie d'erreur du compilateur.
    fn write_stderr(&self, text: &str);
}

/// Hôte d'une invocation : overlay + diagnostics + capture stdout/stderr,
/// le tout derrière des mutex pour rester utilisable en `&self` et `Sync`.
pub struct SandboxHost<'ctx> {
    ctx: &'ctx dyn BuildContext,
    source_ext: String,
    overlay: Mutex<HashMap<PathBuf, Bytes>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl<'ctx> SandboxHost<'ctx> {
    /// Hôte neuf, lié au contexte de build, extension source par défaut.
    pub fn new(ctx: &'ctx dyn BuildContext) -> Self {
        Self::with_source_ext(ctx, DEFAULT_SOURCE_EXT)
    }

    /// Variante avec extension source explicite (sans le point).
    pub fn with_source_ext(ctx: &'ctx dyn BuildContext, ext: &str) -> Self {
        Self {
            ctx,
            source_ext: ext.trim_start_matches('.').to_string(),
            overlay: Mutex::new(HashMap::new()),
            diagnostics: Mutex::new(Vec::new()),
            stdout: Mutex::new(String::new()),
            stderr: Mutex::new(String::new()),
        }
    }

    fn read_file_impl(&self, name: &str, base_dir: &Path) -> Option<Bytes> {
        let path = resolve_against(base_dir, name);

        if let Some(content) = self.overlay.lock().get(&path) {
            log::trace!("hôte: lecture overlay {}", path.display());
            return Some(content.clone());
        }

        match self.ctx.read(&path) {
            Ok(content) => {
                // Lecture disque réussie → dépendance du build.
                self.ctx.add_dependency(&path);
                log::trace!("hôte: lecture disque {}", path.display());
                Some(Bytes::from(content))
            }
            Err(_) => None,
        }
    }

    fn write_file_impl(&self, name: &str, contents: &[u8], base_dir: &Path) {
        let path = resolve_against(base_dir, name);
        log::trace!("hôte: écriture overlay {} ({} octets)", path.display(), contents.len());
        self.overlay.lock().insert(path, Bytes::copy_from_slice(contents));
    }

    fn list_files_impl(&self, dir_name: &str, base_dir: &Path) -> Option<Vec<String>> {
        let dir = resolve_against(base_dir, dir_name);
        let ext_suffix = format!(".{}", self.source_ext);
        let decl_suffix = format!(".d.{}", self.source_ext);
        match self.ctx.read_dir(&dir) {
            Ok(entries) => Some(
                entries
                    .into_iter()
                    .filter(|n| n.ends_with(&ext_suffix) && !n.ends_with(&decl_suffix))
                    .collect(),
            ),
            Err(_) => None,
        }
    }

    /// Instantané des diagnostics rapportés, dans l'ordre d'arrivée.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Texte stdout accumulé.
    pub fn stdout_string(&self) -> String {
        self.stdout.lock().clone()
    }

    /// Texte stderr accumulé.
    pub fn stderr_string(&self) -> String {
        self.stderr.lock().clone()
    }

    /// Relecture post-compilation d'un artefact (mêmes règles que
    /// `read_file` : overlay d'abord).
    pub fn read_back(&self, name: &str, base_dir: &Path) -> Option<Bytes> {
        self.read_file_impl(name, base_dir)
    }

    /// Nombre d'entrées dans l'overlay (utile pour les invariants de tests).
    pub fn overlay_len(&self) -> usize {
        self.overlay.lock().len()
    }
}

impl CompilerHost for SandboxHost<'_> {
    fn read_file(&self, name: &str, base_dir: &Path) -> Option<Bytes> {
        self.read_file_impl(name, base_dir)
    }

    fn write_file(&self, name: &str, contents: &[u8], base_dir: &Path) {
        self.write_file_impl(name, contents, base_dir);
    }

    fn list_files(&self, dir_name: &str, base_dir: &Path) -> Option<Vec<String>> {
        self.list_files_impl(dir_name, base_dir)
    }

    fn report_diagnostic(&self, diag: Diagnostic) {
        self.diagnostics.lock().push(diag);
    }

    fn write_stdout(&self, text: &str) {
        self.stdout.lock().push_str(text);
    }

    fn write_stderr(&self, text: &str) {
        self.stderr.lock().push_str(text);
    }
}

/* ───────────────────────────── Tests ───────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Severity;
    use std::collections::BTreeMap;

    /// Contexte en mémoire pour les tests : fichiers figés + dépendances.
    struct MemContext {
        root: PathBuf,
        files: BTreeMap<PathBuf, Vec<u8>>,
        deps: Mutex<Vec<PathBuf>>,
    }

    impl MemContext {
        fn new(root: &str) -> Self {
            Self {
                root: PathBuf::from(root),
                files: BTreeMap::new(),
                deps: Mutex::new(Vec::new()),
            }
        }

        fn with_file(mut self, path: &str, content: &[u8]) -> Self {
            self.files.insert(PathBuf::from(path), content.to_vec());
            self
        }

        fn deps(&self) -> Vec<PathBuf> {
            self.deps.lock().clone()
        }
    }

    impl BuildContext for MemContext {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
            let names: Vec<String> = self
                .files
                .keys()
                .filter(|p| p.parent() == Some(path))
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect();
            if names.is_empty() {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such dir"))
            } else {
                Ok(names)
            }
        }

        fn add_dependency(&self, path: &Path) {
            self.deps.lock().push(path.to_path_buf());
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }

    #[test]
    fn overlay_wins_over_real_file() {
        let ctx = MemContext::new("/proj").with_file("/proj/src/a.ts", b"disk");
        let host = SandboxHost::new(&ctx);
        let base = Path::new("/proj/src");

        host.write_file("a.ts", b"overlay", base);
        let got = host.read_file("a.ts", base).unwrap();
        assert_eq!(&got[..], b"overlay");
        // Et pas de dépendance : on n'a jamais touché le disque.
        assert!(ctx.deps().is_empty());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let ctx = MemContext::new("/proj");
        let host = SandboxHost::new(&ctx);
        let base = Path::new("/proj/src");

        host.write_file("out.wasm", &[0, 97, 115, 109], base);
        let got = host.read_back("out.wasm", base).unwrap();
        assert_eq!(&got[..], &[0, 97, 115, 109]);
    }

    #[test]
    fn real_read_registers_dependency_once_per_path() {
        let ctx = MemContext::new("/proj").with_file("/proj/src/a.ts", b"x");
        let host = SandboxHost::new(&ctx);
        let base = Path::new("/proj/src");

        assert!(host.read_file("a.ts", base).is_some());
        assert!(host.read_file("./a.ts", base).is_some());
        // Deux orthographes, un seul chemin résolu : l'enregistrement ne doit
        // jamais sous-compter (la dédup éventuelle est l'affaire du contexte).
        let deps = ctx.deps();
        assert!(!deps.is_empty());
        assert!(deps.iter().all(|p| p == Path::new("/proj/src/a.ts")));
    }

    #[test]
    fn missing_file_is_a_sentinel_not_an_error() {
        let ctx = MemContext::new("/proj");
        let host = SandboxHost::new(&ctx);
        assert!(host.read_file("nope.ts", Path::new("/proj")).is_none());
        assert!(ctx.deps().is_empty());
    }

    #[test]
    fn list_files_filters_declarations() {
        let ctx = MemContext::new("/proj")
            .with_file("/proj/src/a.ts", b"")
            .with_file("/proj/src/a.d.ts", b"")
            .with_file("/proj/src/b.js", b"")
            .with_file("/proj/src/c.ts", b"");
        let host = SandboxHost::new(&ctx);

        let mut names = host.list_files("src", Path::new("/proj")).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.ts", "c.ts"]);
    }

    #[test]
    fn list_files_missing_dir_is_none() {
        let ctx = MemContext::new("/proj");
        let host = SandboxHost::new(&ctx);
        assert!(host.list_files("nowhere", Path::new("/proj")).is_none());
    }

    #[test]
    fn diagnostics_accumulate_in_order_without_dedup() {
        let ctx = MemContext::new("/proj");
        let host = SandboxHost::new(&ctx);

        host.report_diagnostic(Diagnostic::error("one"));
        host.report_diagnostic(Diagnostic::error("one"));
        host.report_diagnostic(Diagnostic::warning("two"));

        let diags = host.diagnostics();
        assert_eq!(diags.len(), 3);
        assert_eq!(diags[0].message, "one");
        assert_eq!(diags[2].severity, Severity::Warning);
    }

    #[test]
    fn stdout_and_stderr_are_independent() {
        let ctx = MemContext::new("/proj");
        let host = SandboxHost::new(&ctx);

        host.write_stdout("progress 1\n");
        host.write_stderr("ERROR x\n");
        host.write_stdout("progress 2\n");

        assert_eq!(host.stdout_string(), "progress 1\nprogress 2\n");
        assert_eq!(host.stderr_string(), "ERROR x\n");
    }

    #[test]
    fn two_hosts_do_not_share_overlays() {
        let ctx = MemContext::new("/proj");
        let a = SandboxHost::new(&ctx);
        let b = SandboxHost::new(&ctx);
        let base = Path::new("/proj");

        a.write_file("m.wasm", b"aaaa", base);
        b.write_file("m.wasm", b"bbbb", base);

        assert_eq!(&a.read_back("m.wasm", base).unwrap()[..], b"aaaa");
        assert_eq!(&b.read_back("m.wasm", base).unwrap()[..], b"bbbb");
    }

    #[test]
    fn disk_context_reads_and_lists() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join("a.ts"), b"export {}").unwrap();
        std::fs::write(dir.join("a.d.ts"), b"").unwrap();

        let ctx = DiskContext::new(dir);
        let host = SandboxHost::new(&ctx);
        let base = dir;

        let content = host.read_file("a.ts", base).unwrap();
        assert_eq!(&content[..], b"export {}");
        assert_eq!(ctx.dependencies(), vec![crate::paths::resolve_against(base, "a.ts")]);

        let mut names = host.list_files(".", base).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.ts"]);
    }
}
