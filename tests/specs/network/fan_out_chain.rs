//! Ten nodes chained with branches.
//!
//! A single counting source fans out across two branches, one of which
//! fans out again before reaching its leaves. Once the source has run its
//! configured number of process cycles it signals end of data; every
//! downstream node must eventually reach `stopped` and the network's
//! `run()` must return.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use clypsalot_core::{link_ports, ObjectConfig, ObjectState};
use clypsalot_network::Network;

use crate::prelude::*;

#[test]
fn ten_node_fan_out_drains_completely_and_run_returns() {
    let pool = pool(4);
    let network = Network::new(Arc::clone(&pool));
    let port_type = unit_port_type();

    let (source_hooks, processed) = CountingSource::with_shared_counter();
    let source = new_object(&pool, "source", source_hooks);
    source.add_property(max_process_property());
    let source_out_a = source.add_output("out-a", Arc::clone(&port_type)).unwrap();
    let source_out_b = source.add_output("out-b", Arc::clone(&port_type)).unwrap();
    source.configure(&ObjectConfig::new().with("max_process", 5i64)).unwrap();

    // Branch A fans out to four leaves.
    let branch_a = new_object(&pool, "branch-a", Passthrough);
    let branch_a_in = branch_a.add_input("in", Arc::clone(&port_type), true).unwrap();
    let branch_a_out = branch_a.add_output("out", Arc::clone(&port_type)).unwrap();
    branch_a.configure(&ObjectConfig::new()).unwrap();

    let mut nodes = vec![source.clone(), branch_a.clone()];
    let mut leaf_a_ins = Vec::new();
    let mut leaf_handles = vec![source, branch_a];

    for i in 0..4 {
        let leaf = new_object(&pool, &format!("leaf-a{i}"), Passthrough);
        let leaf_in = leaf.add_input("in", Arc::clone(&port_type), true).unwrap();
        leaf.configure(&ObjectConfig::new()).unwrap();
        nodes.push(leaf.clone());
        leaf_a_ins.push(leaf_in);
        leaf_handles.push(leaf);
    }

    // Branch B forwards to one leaf, which itself forwards one hop further.
    let branch_b = new_object(&pool, "branch-b", Passthrough);
    let branch_b_in = branch_b.add_input("in", Arc::clone(&port_type), true).unwrap();
    let branch_b_out = branch_b.add_output("out", Arc::clone(&port_type)).unwrap();
    branch_b.configure(&ObjectConfig::new()).unwrap();
    nodes.push(branch_b.clone());

    let leaf_b1 = new_object(&pool, "leaf-b1", Passthrough);
    let leaf_b1_in = leaf_b1.add_input("in", Arc::clone(&port_type), true).unwrap();
    let leaf_b1_out = leaf_b1.add_output("out", Arc::clone(&port_type)).unwrap();
    leaf_b1.configure(&ObjectConfig::new()).unwrap();
    nodes.push(leaf_b1.clone());

    let leaf_b1_1 = new_object(&pool, "leaf-b1-1", Passthrough);
    let leaf_b1_1_in = leaf_b1_1.add_input("in", Arc::clone(&port_type), true).unwrap();
    leaf_b1_1.configure(&ObjectConfig::new()).unwrap();
    nodes.push(leaf_b1_1.clone());

    assert_eq!(nodes.len(), 10, "fixture must exercise ten managed nodes");

    let mut pairs = vec![(source_out_a, branch_a_in), (source_out_b, branch_b_in), (leaf_b1_out, leaf_b1_1_in)];
    for leaf_in in leaf_a_ins {
        pairs.push((Arc::clone(&branch_a_out), leaf_in));
    }
    pairs.push((branch_b_out, leaf_b1_in));
    link_ports(&pairs).unwrap();

    leaf_handles.push(branch_b);
    leaf_handles.push(leaf_b1);
    leaf_handles.push(leaf_b1_1);
    for handle in leaf_handles {
        network.add_object(handle).unwrap();
    }

    network.run().unwrap();

    assert_eq!(processed.load(Ordering::SeqCst), 5);
    assert!(!network.is_running());
    for node in &nodes {
        assert_eq!(node.state(), ObjectState::Stopped, "node {} did not reach stopped", node.kind());
    }
}
