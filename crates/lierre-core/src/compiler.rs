//! compiler.rs — Couture vers le compilateur externe.
//!
//! Le pont ne connaît du compilateur que son point d'entrée : une forme argv
//! plate et un hôte d'E/S. Tout le reste (versions, passes internes,
//! formats) lui est opaque.

use crate::host::CompilerHost;

/// Point d'entrée du compilateur externe.
pub trait Compiler {
    /// Lance une compilation complète. `args` suit la forme argv du binaire
    /// du compilateur ; toutes les E/S (sources, artefacts, diagnostics,
    /// sorties texte) passent par `host`.
    ///
    /// Un `Err` ici est un crash du compilateur lui-même, pas un diagnostic :
    /// sa structure est opaque pour le pont, il est propagé tel quel, sans
    /// emballage. Les erreurs de compilation ordinaires passent par
    /// `host.report_diagnostic`.
    fn run(&self, args: &[String], host: &dyn CompilerHost) -> anyhow::Result<()>;
}
