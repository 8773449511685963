//! Seeded stand-in graph used when the real data source is unavailable.
//!
//! Produces a plausible obsolescence picture: programs use assemblies,
//! assemblies contain components, components are supplied by manufacturers,
//! alternates stand in for components and end-of-life notices affect them.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::model::Graph;
use super::sanitize::{RawGraph, RawLink, RawNode, sanitize};

const MIN_NODES: usize = 12;

const PART_FAMILIES: [&str; 8] = [
    "Op-amp", "FPGA", "DC-DC converter", "EEPROM", "Connector", "Oscillator", "MOSFET", "ADC",
];
const SUPPLIERS: [&str; 6] = [
    "Analog Devices",
    "Microchip",
    "Texas Instruments",
    "Amphenol",
    "Vishay",
    "Renesas",
];

struct Builder {
    raw: RawGraph,
}

impl Builder {
    fn node(&mut self, id: String, kind: &str, label: String) -> String {
        self.raw.nodes.push(RawNode {
            kind: Some(kind.to_owned()),
            label: Some(label),
            ..RawNode::new(&id)
        });
        id
    }

    fn link(&mut self, source: &str, target: &str, kind: &str, weight: f32) {
        self.raw.links.push(RawLink {
            kind: Some(kind.to_owned()),
            weight: Some(weight),
            ..RawLink::new(source, target)
        });
    }
}

/// Same `seed` and `node_count` always produce the same graph.
pub fn generate(seed: u64, node_count: usize) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let total = node_count.max(MIN_NODES);

    let programs = (total / 40).clamp(1, 4);
    let assemblies = (total / 10).max(1);
    let suppliers = (total / 12).clamp(1, SUPPLIERS.len() * 4);
    let notices = (total / 12).max(1);
    let alternates = total / 10;
    let components = total - programs - assemblies - suppliers - notices - alternates;

    let mut builder = Builder {
        raw: RawGraph::default(),
    };

    let program_ids = (0..programs)
        .map(|index| {
            builder.node(
                format!("PRG-{:02}", index + 1),
                "program",
                format!("Program {}", (b'A' + index as u8) as char),
            )
        })
        .collect::<Vec<_>>();

    let assembly_ids = (0..assemblies)
        .map(|index| {
            let id = builder.node(
                format!("ASM-{:03}", index + 1),
                "assembly",
                format!("Line replaceable unit {}", index + 1),
            );
            let program = &program_ids[index % program_ids.len()];
            builder.link(program, &id, "uses", 1.0);
            id
        })
        .collect::<Vec<_>>();

    let supplier_ids = (0..suppliers)
        .map(|index| {
            let name = SUPPLIERS[index % SUPPLIERS.len()];
            builder.node(
                format!("MFR-{:02}", index + 1),
                "supplier",
                format!("{name} #{}", index / SUPPLIERS.len() + 1),
            )
        })
        .collect::<Vec<_>>();

    let mut component_ids = Vec::with_capacity(components);
    for index in 0..components {
        let family = PART_FAMILIES.choose(&mut rng).copied().unwrap_or("Part");
        let id = builder.node(
            format!("PN-{:05}", 10_000 + index * 7 + rng.gen_range(0..7)),
            "component",
            format!("{family} {}", rng.gen_range(100..999)),
        );

        let assembly = &assembly_ids[rng.gen_range(0..assembly_ids.len())];
        builder.link(assembly, &id, "contains", 1.0 + rng.gen_range(0.0..1.5));

        // Round-robin first so no manufacturer is left without parts.
        let supplier = if index < supplier_ids.len() {
            &supplier_ids[index]
        } else {
            &supplier_ids[rng.gen_range(0..supplier_ids.len())]
        };
        builder.link(&id, supplier, "supplied_by", 1.0);
        if rng.gen_bool(0.2) {
            let second = &supplier_ids[rng.gen_range(0..supplier_ids.len())];
            if second != supplier {
                builder.link(&id, second, "supplied_by", 0.6);
            }
        }
        component_ids.push(id);
    }

    for index in 0..alternates {
        let original = &component_ids[rng.gen_range(0..component_ids.len())];
        let id = builder.node(
            format!("ALT-{:04}", index + 1),
            "alternate",
            format!("Form-fit-function alternate {}", index + 1),
        );
        builder.link(&id, original, "alternate_for", 1.5);
    }

    let mut notice_ids = Vec::<String>::with_capacity(notices);
    for index in 0..notices {
        let kind_label = if rng.gen_bool(0.5) { "EOL notice" } else { "PCN" };
        let id = builder.node(
            format!("NTC-{:04}", index + 1),
            "notice",
            format!("{kind_label} {}", 2020 + rng.gen_range(0..6)),
        );
        let affected = rng.gen_range(1..=3).min(component_ids.len());
        for component in component_ids.choose_multiple(&mut rng, affected) {
            builder.link(&id, component, "affects", 1.2);
        }
        if let Some(previous) = notice_ids.last()
            && rng.gen_bool(0.4)
        {
            builder.link(&id, previous, "cites", 0.4);
        }
        notice_ids.push(id);
    }

    sanitize(&builder.raw)
}

#[cfg(test)]
mod tests {
    use super::super::sanitize::integrity_check;
    use super::*;

    #[test]
    fn generated_graph_is_clean_and_sized() {
        for node_count in [20, 64, 300] {
            let graph = generate(7, node_count);
            assert_eq!(graph.node_count(), node_count);
            assert!(integrity_check(&RawGraph::from(&graph)).is_clean());
        }
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        assert_eq!(generate(42, 80), generate(42, 80));
        assert_ne!(generate(42, 80), generate(43, 80));
    }

    #[test]
    fn every_node_except_programs_has_a_link() {
        let graph = generate(3, 120);
        for (index, node) in graph.nodes().iter().enumerate() {
            if node.kind == "program" {
                continue;
            }
            assert!(graph.degree(index) > 0, "{} is isolated", node.id);
        }
    }

    #[test]
    fn notices_cite_the_previous_notice() {
        let graph = generate(11, 300);
        let cites = graph
            .links()
            .iter()
            .filter(|link| link.kind == "cites")
            .collect::<Vec<_>>();
        assert!(!cites.is_empty());
        for link in cites {
            assert!(link.source.starts_with("NTC-") && link.target.starts_with("NTC-"));
            assert!(link.target < link.source, "{} cites a later notice", link.source);
        }
    }

    #[test]
    fn tiny_requests_are_raised_to_the_minimum() {
        assert_eq!(generate(1, 0).node_count(), MIN_NODES);
    }
}
