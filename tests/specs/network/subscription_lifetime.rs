//! A network's shutdown subscription on a managed node lasts only as long
//! as the network itself. Dropping the whole network stops every managed
//! node that is still running, without anyone having to unregister first.

use std::sync::Arc;

use clypsalot_core::ObjectConfig;
use clypsalot_network::Network;

use crate::prelude::*;

struct NoopBehavior;
impl clypsalot_core::ObjectHooks for NoopBehavior {}

#[test]
fn dropping_the_network_stops_every_managed_node() {
    let pool = pool(2);
    let network = Network::new(Arc::clone(&pool));

    let object = new_object(&pool, "node", NoopBehavior);
    object.configure(&ObjectConfig::new()).unwrap();
    let object_arc = object.clone();

    network.add_object(object).unwrap();
    network.start().unwrap();
    wait_for(|| object_arc.state() == clypsalot_core::ObjectState::Waiting);

    drop(network);

    wait_for(|| object_arc.state() == clypsalot_core::ObjectState::Stopped);
}
