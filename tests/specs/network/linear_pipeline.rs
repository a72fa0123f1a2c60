//! One source linked to one sink through a single port pair.
//!
//! After the source reaches its configured process count it marks its
//! output link's end of data. The sink observes that on its input link,
//! stops, and the network's `run()` returns once both nodes are quiescent.

use std::sync::Arc;

use clypsalot_core::{link_ports, ObjectConfig, ObjectState};
use clypsalot_network::Network;

use crate::prelude::*;

#[test]
fn source_end_of_data_drains_through_the_sink_and_run_returns() {
    let pool = pool(2);
    let network = Network::new(Arc::clone(&pool));
    let port_type = unit_port_type();

    let source = new_object(&pool, "source", CountingSource::new());
    source.add_property(max_process_property());
    let output = source.add_output("out", Arc::clone(&port_type)).unwrap();
    source.configure(&ObjectConfig::new().with("max_process", 3i64)).unwrap();

    let sink = new_object(&pool, "sink", Passthrough);
    let input = sink.add_input("in", Arc::clone(&port_type), true).unwrap();
    sink.configure(&ObjectConfig::new()).unwrap();

    link_ports(&[(output, input)]).unwrap();

    let source_arc = source.clone();
    let sink_arc = sink.clone();
    network.add_object(source).unwrap();
    network.add_object(sink).unwrap();

    network.run().unwrap();

    assert_eq!(source_arc.state(), ObjectState::Stopped);
    assert_eq!(sink_arc.state(), ObjectState::Stopped);
    assert!(!network.is_running());
}
