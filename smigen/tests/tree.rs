use std::collections::HashMap;

use smigen::synth::MAX_CLIENTS;
use smigen::*;

/// Counts how often each request name is used on the client and on the server side of a component.
fn endpoint_uses(config: &TreeConfig) -> (HashMap<String, usize>, HashMap<String, usize>) {
    fn count(map: &mut HashMap<String, usize>, conn: &Connection) {
        *map.entry(conn.req_name.clone()).or_insert(0) += 1;
    }

    let mut as_client = HashMap::new();
    let mut as_server = HashMap::new();

    for component in config.components() {
        match component {
            Component::Assignment(assignment) => {
                count(&mut as_client, &assignment.client);
                count(&mut as_server, &assignment.server);
            }
            Component::WidthScaler(scaler) => {
                count(&mut as_client, &scaler.client);
                count(&mut as_server, &scaler.server);
            }
            Component::Arbiter(arbiter) => {
                for client in &arbiter.clients {
                    count(&mut as_client, client);
                }
                count(&mut as_server, &arbiter.server);
            }
        }
    }

    (as_client, as_server)
}

#[test]
fn every_supported_configuration_is_well_formed() {
    for num_clients in 1..=MAX_CLIENTS {
        for scaling in ScalingFactor::ALL {
            let name = arbitration_tree_module_name(num_clients, scaling);
            let config = synthesize(&name, num_clients, scaling).unwrap();

            assert_eq!(config.module_name, name);
            assert_eq!(config.client_conns, (0..num_clients).map(Connection::client).collect::<Vec<_>>());
            assert_eq!(config.server_conn(), Some(&Connection::server(scaling.server_flit_width())));
            assert!(config.has_unique_names(), "{}", name);

            // Every client and wire feeds exactly one component, every wire and the server is driven by exactly one.
            let (as_client, as_server) = endpoint_uses(&config);
            for conn in config.client_conns.iter().chain(config.wire_conns.iter()) {
                assert_eq!(as_client.get(&conn.req_name), Some(&1), "{}: {}", name, conn.req_name);
            }
            for conn in config.server_conns.iter().chain(config.wire_conns.iter()) {
                assert_eq!(as_server.get(&conn.req_name), Some(&1), "{}: {}", name, conn.req_name);
            }
            assert_eq!(as_client.len(), num_clients + config.wire_conns.len());

            assert!(render(&Fragments::default(), &config).is_ok(), "{}", name);
        }
    }
}

#[test]
fn client_count_limits() {
    for scaling in ScalingFactor::ALL {
        assert_eq!(synthesize("m", 0, scaling), Err(SynthError::InvalidClientCount(0)));
        assert_eq!(synthesize("m", MAX_CLIENTS + 1, scaling), Err(SynthError::UnsupportedClientCount(65)));
        assert_eq!(synthesize("m", 1000, scaling), Err(SynthError::UnsupportedClientCount(1000)));
        assert!(synthesize("m", MAX_CLIENTS, scaling).is_ok());
    }
}
