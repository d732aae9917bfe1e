//! options.rs — Mappage d'une configuration structurée vers l'argv du compilateur.
//!
//! Le compilateur ne consomme qu'une liste plate de jetons `--clé [valeur]`.
//! Côté bundler, la configuration est un objet imbriqué. `map_options_to_args`
//! fait la traduction, clé par clé, dans l'ordre d'insertion.
//!
//! Règles d'émission :
//! - `Flag(true)`      → `--clé` seul ; `Flag(false)` → rien du tout.
//! - `Text` / `Number` → `--clé` puis la valeur en chaîne.
//! - `List`            → `--clé` puis les éléments joints par `,`
//!                       (pas d'aplatissement récursif des éléments).
//! - `Nested`          → les clés internes sont émises telles quelles,
//!                       **sans** préfixe parent (voir la note plus bas).
//!
//! Aucune validation de schéma ici : une clé inconnue passe au compilateur,
//! qui signalera lui-même un drapeau non reconnu. Le pont ne doit pas figer
//! la liste des options d'une version donnée du compilateur.

use indexmap::IndexMap;

/// Valeur d'option — variante fermée, résolue par pattern matching.
///
/// La variante couvre tout ce que l'argv plat sait représenter ; il n'y a
/// volontairement pas de variante « autre » (pas d'inspection dynamique).
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    /// Drapeau booléen. Seul `true` émet quelque chose.
    Flag(bool),
    /// Valeur textuelle libre.
    Text(String),
    /// Valeur numérique. `3.0` s'émet `3` (affichage f64 standard).
    Number(f64),
    /// Séquence ordonnée, jointe par `,` à l'émission.
    List(Vec<String>),
    /// Groupe imbriqué, aplati récursivement à l'émission.
    Nested(Options),
}

impl From<bool> for OptValue {
    fn from(v: bool) -> Self {
        OptValue::Flag(v)
    }
}
impl From<&str> for OptValue {
    fn from(v: &str) -> Self {
        OptValue::Text(v.to_string())
    }
}
impl From<String> for OptValue {
    fn from(v: String) -> Self {
        OptValue::Text(v)
    }
}
impl From<f64> for OptValue {
    fn from(v: f64) -> Self {
        OptValue::Number(v)
    }
}
impl From<i64> for OptValue {
    fn from(v: i64) -> Self {
        OptValue::Number(v as f64)
    }
}
impl From<Vec<String>> for OptValue {
    fn from(v: Vec<String>) -> Self {
        OptValue::List(v)
    }
}
impl From<Options> for OptValue {
    fn from(v: Options) -> Self {
        OptValue::Nested(v)
    }
}

/// Configuration ordonnée : l'ordre d'insertion EST l'ordre d'émission.
///
/// Réinsérer une clé existante remplace la valeur mais conserve la position
/// d'origine — c'est ce qui permet à un appelant d'écraser une option
/// utilisateur sans en changer la place dans l'argv.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    entries: IndexMap<String, OptValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insère (ou remplace) une option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptValue>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Raccourci pour une liste (éléments convertis en chaînes à l'insertion).
    pub fn set_list<I, S>(&mut self, key: impl Into<String>, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = items.into_iter().map(Into::into).collect::<Vec<String>>();
        self.set(key, OptValue::List(items))
    }

    pub fn get(&self, key: &str) -> Option<&OptValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Traduit `options` en liste plate de jetons pour l'entrée argv du compilateur.
///
/// Note sur `Nested` : les clés d'un groupe imbriqué sont émises comme des
/// drapeaux de premier niveau, sans reprendre le préfixe du parent.
/// C'est surprenant mais assumé : le namespace d'argv du compilateur est
/// plat, et re-préfixer changerait les drapeaux réellement vus.
pub fn map_options_to_args(options: &Options) -> Vec<String> {
    let mut args = Vec::new();
    push_args(options, &mut args);
    args
}

fn push_args(options: &Options, args: &mut Vec<String>) {
    for (key, value) in options.iter() {
        match value {
            OptValue::Flag(true) => args.push(format!("--{key}")),
            OptValue::Flag(false) => {}
            OptValue::Text(v) => {
                args.push(format!("--{key}"));
                args.push(v.clone());
            }
            OptValue::Number(n) => {
                args.push(format!("--{key}"));
                args.push(n.to_string());
            }
            OptValue::List(items) => {
                args.push(format!("--{key}"));
                args.push(items.join(","));
            }
            OptValue::Nested(inner) => push_args(inner, args),
        }
    }
}

/* ───────────────────────────── Tests ───────────────────────────── */
