//! Linking a batch of port pairs is all-or-nothing.
//!
//! Two compatible pairs and one pair whose port types reject each other
//! are submitted together. The whole batch must fail and leave every port
//! exactly as unlinked as it started.

use std::sync::Arc;

use clypsalot_core::{link_ports, Error, ObjectConfig, ObjectHandle, Port, PortType};

use crate::prelude::*;

struct NoopBehavior;
impl clypsalot_core::ObjectHooks for NoopBehavior {}

fn fixture(
    pool: &Arc<clypsalot_core::WorkerPool>,
    port_type: &Arc<PortType>,
    index: usize,
) -> (ObjectHandle, ObjectHandle, Arc<clypsalot_core::OutputPort>, Arc<clypsalot_core::InputPort>) {
    let source = new_object(pool, &format!("source-{index}"), NoopBehavior);
    let output = source.add_output("out", Arc::clone(port_type)).unwrap();
    source.configure(&ObjectConfig::new()).unwrap();

    let sink = new_object(pool, &format!("sink-{index}"), NoopBehavior);
    let input = sink.add_input("in", Arc::clone(port_type), true).unwrap();
    sink.configure(&ObjectConfig::new()).unwrap();

    (source, sink, output, input)
}

#[test]
fn one_incompatible_pair_rolls_back_the_whole_batch() {
    let pool = pool(1);
    let good_type = unit_port_type();
    let bad_type = mismatched_port_type();

    let (_src1, _sink1, out1, in1) = fixture(&pool, &good_type, 1);
    let (_src2, _sink2, out2, in2) = fixture(&pool, &good_type, 2);
    let (_src3, _sink3, out3, in3) = fixture(&pool, &bad_type, 3);

    let pairs = vec![(Arc::clone(&out1), Arc::clone(&in1)), (Arc::clone(&out2), Arc::clone(&in2)), (Arc::clone(&out3), Arc::clone(&in3))];

    let err = link_ports(&pairs).unwrap_err();

    assert!(matches!(err, Error::Type(_)));
    assert!(out1.links().is_empty());
    assert!(in1.links().is_empty());
    assert!(out2.links().is_empty());
    assert!(in2.links().is_empty());
    assert!(out3.links().is_empty());
    assert!(in3.links().is_empty());
}
