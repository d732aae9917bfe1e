//! paths.rs — Normalisation de chemins entre les deux repères.
//!
//! Deux systèmes de coordonnées cohabitent : le bundler ancre ses chemins sur
//! le répertoire racine du projet, le compilateur sur un répertoire de base
//! propre à chaque module. Règle unique, appliquée à chaque traversée de
//! frontière : résoudre en absolu à l'entrée, relativiser (et forcer les `/`)
//! à la sortie.
//!
//! Tout est lexical : aucun accès disque, aucune résolution de liens
//! symboliques. L'overlay mémoire n'a pas de vue inode, donc deux écritures
//! sur le même chemin logique doivent tomber sur la même clé quel que soit
//! l'état du disque.

use std::path::{Component, Path, PathBuf};

/// Replie lexicalement `.` et `..` sans toucher au disque.
///
/// Sur un chemin absolu, un `..` en butée de racine est absorbé (`/..` == `/`).
/// Sur un chemin relatif qui remonte au-delà de son origine, les `..` de tête
/// sont conservés.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut stack: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => stack.push(comp),
            },
            other => stack.push(other),
        }
    }
    stack.iter().map(|c| c.as_os_str()).collect()
}

/// Résout `name` contre `base` et replie le résultat.
///
/// Un `name` déjà absolu ignore la base ; une base vide laisse `name` tel
/// quel (replié). C'est le point d'entrée unique du pont : toute clé
/// d'overlay et toute lecture disque passent par ici, pour qu'un même
/// fichier logique n'ait qu'une seule orthographe interne.
pub fn resolve_against(base: &Path, name: &str) -> PathBuf {
    let name_path = Path::new(name);
    if name_path.is_absolute() || base.as_os_str().is_empty() {
        normalize_lexical(name_path)
    } else {
        normalize_lexical(&base.join(name_path))
    }
}

/// Relativise `path` par rapport à `base`, avec des sauts `..` si `path`
/// sort de `base`. Purement lexical, les deux chemins sont repliés d'abord.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = normalize_lexical(path);
    let base = normalize_lexical(base);

    let pcs: Vec<Component<'_>> = path.components().collect();
    let bcs: Vec<Component<'_>> = base.components().collect();

    let mut common = 0;
    while common < pcs.len() && common < bcs.len() && pcs[common] == bcs[common] {
        common += 1;
    }

    let mut out = PathBuf::new();
    for _ in common..bcs.len() {
        out.push("..");
    }
    for comp in &pcs[common..] {
        out.push(comp.as_os_str());
    }
    out
}

/// Forme rapportée au bundler : `file_name` (relatif au `base_dir` du
/// compilateur) ré-exprimé sous la racine `root` du projet, séparateurs
/// forcés à `/`, préfixe `./`.
///
/// C'est la seule orthographe qui sort du pont, identique quel que soit l'OS.
pub fn project_relative(file_name: &str, base_dir: &Path, root: &Path) -> String {
    let base_url = relative_to(base_dir, root);
    let joined = normalize_lexical(&base_url.join(file_name));
    let mut text = joined.to_string_lossy().replace('\\', "/");
    if text.is_empty() {
        text.push('.');
    }
    format!("./{text}")
}

/* ───────────────────────────── Tests ───────────────────────────── */
