//! Debate topology — which peers each panel member sees during reflection.
//!
//! The reflection router consumes this trait rather than hardcoding the
//! everyone-sees-everyone-else rule, so ring or adversarial topologies can
//! slot in without touching the round builder.

/// Strategy for selecting the peers visible to a reflection recipient.
pub trait Topology: Send + Sync {
    /// Ordered subset of `panel` whose prior-round responses `recipient`
    /// may see. Must never include `recipient` itself; order must be
    /// stable across runs for reproducibility.
    fn visible_peers<'a>(&self, panel: &'a [String], recipient: &str) -> Vec<&'a str>;
}

/// Full-mesh topology: every member sees every other member, panel order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullMesh;

impl Topology for FullMesh {
    fn visible_peers<'a>(&self, panel: &'a [String], recipient: &str) -> Vec<&'a str> {
        panel
            .iter()
            .map(String::as_str)
            .filter(|id| *id != recipient)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_full_mesh_excludes_recipient() {
        let panel = panel();
        let peers = FullMesh.visible_peers(&panel, "b");
        assert_eq!(peers, vec!["a", "c"]);
    }

    #[test]
    fn test_full_mesh_preserves_panel_order() {
        let panel = panel();
        let peers = FullMesh.visible_peers(&panel, "a");
        assert_eq!(peers, vec!["b", "c"]);
    }

    #[test]
    fn test_unknown_recipient_sees_whole_panel() {
        // A synthesizer outside the panel is a valid recipient.
        let panel = panel();
        let peers = FullMesh.visible_peers(&panel, "external");
        assert_eq!(peers, vec!["a", "b", "c"]);
    }
}
