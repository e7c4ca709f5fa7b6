//! JSON rendering of chains for `to-dtmc --format json`.

use serde::Serialize;

use stochex_graph::Dtmc;

/// Serializable view of a [`Dtmc`], nodes by display name.
#[derive(Debug, Serialize)]
pub struct DtmcJson {
    pub initial: String,
    pub finals: Vec<String>,
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeJson>,
}

#[derive(Debug, Serialize)]
pub struct EdgeJson {
    pub from: String,
    pub to: String,
    pub label: String,
    pub probability: f64,
}

impl DtmcJson {
    pub fn from_dtmc(dtmc: &Dtmc) -> Self {
        Self {
            initial: dtmc.display_name(dtmc.initial()),
            finals: dtmc.finals().iter().map(|&n| dtmc.display_name(n)).collect(),
            nodes: dtmc.nodes().map(|n| dtmc.display_name(n)).collect(),
            edges: dtmc
                .edges()
                .map(|(key, probability)| EdgeJson {
                    from: dtmc.display_name(key.from),
                    to: dtmc.display_name(key.to),
                    label: key.label.clone(),
                    probability,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_serializes_by_name() {
        let mut dtmc = Dtmc::with_initial_name("s");
        let s = dtmc.initial();
        let t = dtmc.add_named_node("t");
        dtmc.add_edge(s, t, "a", 1.0).unwrap();
        dtmc.make_final(t).unwrap();

        let value = serde_json::to_value(DtmcJson::from_dtmc(&dtmc)).unwrap();
        assert_eq!(value["initial"], "s");
        assert_eq!(value["finals"][0], "t");
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["edges"][0]["from"], "s");
        assert_eq!(value["edges"][0]["to"], "t");
        assert_eq!(value["edges"][0]["label"], "a");
        assert_eq!(value["edges"][0]["probability"], 1.0);
    }
}
